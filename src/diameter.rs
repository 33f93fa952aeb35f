//! Diameter message and header, per RFC 6733 §3.

use crate::avp::Avp;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use std::io::Read;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Command flag bits, laid out in the flags octet of the message header.
pub mod flags {
    pub const REQUEST: u8 = 0x80;
    pub const PROXYABLE: u8 = 0x40;
    pub const ERROR: u8 = 0x20;
    pub const RETRANSMIT: u8 = 0x10;
}

const HEADER_LENGTH: u32 = 20;

/// Diameter command codes. Well-known commands get a named variant; anything
/// else round-trips through `Unknown` so decoding never fails on an
/// application-defined or not-yet-supported command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    CapabilitiesExchange,
    ReAuth,
    AA,
    Accounting,
    CreditControl,
    AbortSession,
    SessionTerminate,
    DeviceWatchdog,
    DisconnectPeer,
    SpendingLimit,
    SpendingStatusNotification,
    Unknown(u32),
}

impl CommandCode {
    pub fn code(&self) -> u32 {
        match self {
            CommandCode::CapabilitiesExchange => 257,
            CommandCode::ReAuth => 258,
            CommandCode::AA => 265,
            CommandCode::Accounting => 271,
            CommandCode::CreditControl => 272,
            CommandCode::AbortSession => 274,
            CommandCode::SessionTerminate => 275,
            CommandCode::DeviceWatchdog => 280,
            CommandCode::DisconnectPeer => 282,
            CommandCode::SpendingLimit => 8388635,
            CommandCode::SpendingStatusNotification => 8388636,
            CommandCode::Unknown(code) => *code,
        }
    }

    pub fn from_code(code: u32) -> CommandCode {
        match code {
            257 => CommandCode::CapabilitiesExchange,
            258 => CommandCode::ReAuth,
            265 => CommandCode::AA,
            271 => CommandCode::Accounting,
            272 => CommandCode::CreditControl,
            274 => CommandCode::AbortSession,
            275 => CommandCode::SessionTerminate,
            280 => CommandCode::DeviceWatchdog,
            282 => CommandCode::DisconnectPeer,
            8388635 => CommandCode::SpendingLimit,
            8388636 => CommandCode::SpendingStatusNotification,
            other => CommandCode::Unknown(other),
        }
    }
}

/// Diameter application identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationId {
    Common,
    Accounting,
    CreditControl,
    Gx,
    Rx,
    Sy,
    Unknown(u32),
}

impl ApplicationId {
    pub fn code(&self) -> u32 {
        match self {
            ApplicationId::Common => 0,
            ApplicationId::Accounting => 3,
            ApplicationId::CreditControl => 4,
            ApplicationId::Rx => 16777236,
            ApplicationId::Gx => 16777238,
            ApplicationId::Sy => 16777302,
            ApplicationId::Unknown(id) => *id,
        }
    }

    pub fn from_code(code: u32) -> ApplicationId {
        match code {
            0 => ApplicationId::Common,
            3 => ApplicationId::Accounting,
            4 => ApplicationId::CreditControl,
            16777236 => ApplicationId::Rx,
            16777238 => ApplicationId::Gx,
            16777302 => ApplicationId::Sy,
            other => ApplicationId::Unknown(other),
        }
    }

    /// Vendor an application is specific to, for CER/CEA
    /// Vendor-Specific-Application-Id negotiation. `None` for the IETF base
    /// applications, which negotiate via bare Auth/Acct-Application-Id.
    pub fn vendor_id(&self) -> Option<u32> {
        match self {
            ApplicationId::Gx | ApplicationId::Rx | ApplicationId::Sy => Some(10415),
            ApplicationId::Common | ApplicationId::Accounting | ApplicationId::CreditControl => {
                None
            }
            ApplicationId::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiameterHeader {
    pub version: u8,
    pub length: u32,
    pub flags: u8,
    pub code: CommandCode,
    pub application_id: ApplicationId,
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
}

impl DiameterHeader {
    pub fn decode_from<R: Read>(reader: &mut R) -> Result<DiameterHeader> {
        let mut b = [0u8; HEADER_LENGTH as usize];
        reader.read_exact(&mut b)?;

        let version = b[0];
        if version != 1 {
            return Err(Error::UnsupportedVersion(version));
        }

        let length = u32::from_be_bytes([0, b[1], b[2], b[3]]);
        if (length as usize) < HEADER_LENGTH as usize {
            return Err(Error::MalformedMessage(format!(
                "message length {} shorter than header",
                length
            )));
        }

        let flags = b[4];
        let code = u32::from_be_bytes([0, b[5], b[6], b[7]]);
        let application_id = u32::from_be_bytes([b[8], b[9], b[10], b[11]]);
        let hop_by_hop_id = u32::from_be_bytes([b[12], b[13], b[14], b[15]]);
        let end_to_end_id = u32::from_be_bytes([b[16], b[17], b[18], b[19]]);

        Ok(DiameterHeader {
            version,
            length,
            flags,
            code: CommandCode::from_code(code),
            application_id: ApplicationId::from_code(application_id),
            hop_by_hop_id,
            end_to_end_id,
        })
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.version])?;
        writer.write_all(&self.length.to_be_bytes()[1..4])?;
        writer.write_all(&[self.flags])?;
        writer.write_all(&self.code.code().to_be_bytes()[1..4])?;
        writer.write_all(&self.application_id.code().to_be_bytes())?;
        writer.write_all(&self.hop_by_hop_id.to_be_bytes())?;
        writer.write_all(&self.end_to_end_id.to_be_bytes())?;
        Ok(())
    }
}

/// A decoded or in-progress Diameter message. Carries the dictionary it was
/// built or decoded with, so `Display` and AVP lookups can resolve names
/// without the caller threading one through on every call.
#[derive(Debug, Clone)]
pub struct DiameterMessage {
    header: DiameterHeader,
    avps: Vec<Avp>,
    dict: Arc<Dictionary>,
}

impl DiameterMessage {
    pub fn new(
        code: CommandCode,
        application_id: ApplicationId,
        flags: u8,
        hop_by_hop_id: u32,
        end_to_end_id: u32,
        dict: Arc<Dictionary>,
    ) -> DiameterMessage {
        DiameterMessage {
            header: DiameterHeader {
                version: 1,
                length: HEADER_LENGTH,
                flags,
                code,
                application_id,
                hop_by_hop_id,
                end_to_end_id,
            },
            avps: Vec::new(),
            dict,
        }
    }

    pub fn header(&self) -> &DiameterHeader {
        &self.header
    }

    pub fn avps(&self) -> &[Avp] {
        &self.avps
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dict
    }

    pub fn get_command_code(&self) -> CommandCode {
        self.header.code
    }

    pub fn get_application_id(&self) -> ApplicationId {
        self.header.application_id
    }

    pub fn get_flags(&self) -> u8 {
        self.header.flags
    }

    pub fn get_hop_by_hop_id(&self) -> u32 {
        self.header.hop_by_hop_id
    }

    pub fn get_end_to_end_id(&self) -> u32 {
        self.header.end_to_end_id
    }

    pub fn is_request(&self) -> bool {
        self.header.flags & flags::REQUEST != 0
    }

    pub fn is_proxyable(&self) -> bool {
        self.header.flags & flags::PROXYABLE != 0
    }

    pub fn is_error(&self) -> bool {
        self.header.flags & flags::ERROR != 0
    }

    pub fn is_retransmit(&self) -> bool {
        self.header.flags & flags::RETRANSMIT != 0
    }

    pub fn add_avp(&mut self, avp: Avp) -> &mut Self {
        self.avps.push(avp);
        self
    }

    pub fn get_avp(&self, code: u32) -> Option<&Avp> {
        self.avps.iter().find(|avp| avp.get_code() == code)
    }

    pub fn get_avps(&self, code: u32) -> impl Iterator<Item = &Avp> {
        self.avps.iter().filter(move |avp| avp.get_code() == code)
    }

    /// Depth-first search for every AVP with `code`, at the top level and
    /// inside any nested grouped AVP (e.g. Auth-Application-Id folded
    /// inside a Vendor-Specific-Application-Id).
    pub fn find_avps(&self, code: u32) -> Vec<&Avp> {
        let mut found = Vec::new();
        for avp in &self.avps {
            if avp.get_code() == code {
                found.push(avp);
            }
            if let Some(grouped) = avp.get_grouped() {
                found.extend(grouped.find_avps(code));
            }
        }
        found
    }

    pub fn decode_from<R: Read>(reader: &mut R, dict: Arc<Dictionary>) -> Result<DiameterMessage> {
        let header = DiameterHeader::decode_from(reader)?;

        let mut remaining = header.length as usize - HEADER_LENGTH as usize;
        let mut avps = Vec::new();
        while remaining > 0 {
            let avp = Avp::decode_from(reader, &dict)?;
            let consumed = avp.get_length() as usize + avp.get_padding() as usize;
            if consumed > remaining {
                return Err(Error::MalformedMessage(
                    "AVP extends past message length".into(),
                ));
            }
            remaining -= consumed;
            avps.push(avp);
        }

        Ok(DiameterMessage { header, avps, dict })
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut body = Vec::new();
        for avp in &self.avps {
            avp.encode_to(&mut body)?;
        }

        let length = HEADER_LENGTH + body.len() as u32;
        let header = DiameterHeader {
            length,
            ..self.header.clone()
        };
        header.encode_to(writer)?;
        writer.write_all(&body)?;
        Ok(())
    }
}

/// Generates Session-Id values per RFC 6733 §8.8:
/// `{origin-host};{high32};{low32}`. `high32` is derived from process start
/// time; `low32` starts at a random value and increments monotonically,
/// wrapping modulo 2^32.
pub struct SessionIdGenerator {
    origin_host: String,
    high32: u32,
    low32: AtomicU32,
}

impl SessionIdGenerator {
    pub fn new(origin_host: impl Into<String>) -> SessionIdGenerator {
        let high32 = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        SessionIdGenerator {
            origin_host: origin_host.into(),
            high32,
            low32: AtomicU32::new(rand::random()),
        }
    }

    pub fn next(&self) -> String {
        let low32 = self.low32.fetch_add(1, Ordering::Relaxed);
        format!("{};{};{}", self.origin_host, self.high32, low32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp;
    use crate::avp::flags::M;
    use crate::avp::{Identity, UTF8String};
    use crate::dictionary;
    use std::io::Cursor;

    fn test_dict() -> Arc<Dictionary> {
        Arc::new(Dictionary::new(&[&dictionary::DEFAULT_DICT_XML]))
    }

    #[test]
    fn test_command_code_round_trip() {
        assert_eq!(CommandCode::from_code(272).code(), 272);
        assert_eq!(CommandCode::from_code(272), CommandCode::CreditControl);
        assert_eq!(CommandCode::from_code(9999), CommandCode::Unknown(9999));
    }

    #[test]
    fn test_encode_decode_message() {
        let dict = test_dict();
        let mut msg = DiameterMessage::new(
            CommandCode::CreditControl,
            ApplicationId::CreditControl,
            flags::REQUEST,
            1123158611,
            3102381851,
            Arc::clone(&dict),
        );
        msg.add_avp(avp!(264, None, M, Identity::new("host.example.com")));
        msg.add_avp(avp!(263, None, M, UTF8String::new("ses;123")));

        let mut encoded = Vec::new();
        msg.encode_to(&mut encoded).unwrap();

        let mut cursor = Cursor::new(&encoded);
        let decoded = DiameterMessage::decode_from(&mut cursor, dict).unwrap();

        assert_eq!(decoded.get_command_code(), CommandCode::CreditControl);
        assert_eq!(decoded.get_application_id(), ApplicationId::CreditControl);
        assert!(decoded.is_request());
        assert!(!decoded.is_error());
        assert_eq!(decoded.get_hop_by_hop_id(), 1123158611);
        assert_eq!(decoded.avps().len(), 2);
        assert_eq!(
            decoded.get_avp(264).unwrap().get_value().to_string(),
            "host.example.com"
        );
    }

    #[test]
    fn test_truncated_message_errors() {
        let dict = test_dict();
        let mut msg = DiameterMessage::new(
            CommandCode::DeviceWatchdog,
            ApplicationId::Common,
            flags::REQUEST,
            1,
            1,
            Arc::clone(&dict),
        );
        msg.add_avp(avp!(264, None, M, Identity::new("host.example.com")));

        let mut encoded = Vec::new();
        msg.encode_to(&mut encoded).unwrap();
        encoded.truncate(encoded.len() - 4);

        let mut cursor = Cursor::new(&encoded);
        let result = DiameterMessage::decode_from(&mut cursor, dict);
        assert!(result.is_err());
    }

    #[test]
    fn test_session_id_generator_monotonic() {
        let gen = SessionIdGenerator::new("host.example.com");
        let first = gen.next();
        let second = gen.next();

        let first_low: u32 = first.rsplit(';').next().unwrap().parse().unwrap();
        let second_low: u32 = second.rsplit(';').next().unwrap().parse().unwrap();
        assert_eq!(second_low, first_low.wrapping_add(1));
        assert!(first.starts_with("host.example.com;"));
    }
}
