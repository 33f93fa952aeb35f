/*
 * AVP format:
 *   0                   1                   2                   3
 *   0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                         Command-Code                          |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |  Flags       |                 AVP Length                     |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                         Vendor ID (optional)                  |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                             Data                              |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *  |                             Data             |    Padding     |
 *  +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
 *
 * AVP Flags:
 *   0 1 2 3 4 5 6 7
 *  +-+-+-+-+-+-+-+-+  V(endor), M(andatory), P(rivate)
 *  |V M P r r r r r|  r(eserved)
 *  +-+-+-+-+-+-+-+-+
 *
 */

pub mod address;
pub mod enumerated;
pub mod float32;
pub mod float64;
pub mod group;
pub mod identity;
pub mod integer32;
pub mod integer64;
pub mod ipv4;
pub mod ipv6;
pub mod octetstring;
pub mod time;
pub mod unsigned32;
pub mod unsigned64;
pub mod uri;
pub mod utf8string;

use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use core::fmt;
use std::io::Read;
use std::io::Write;

pub use self::address::Address;
pub use self::enumerated::Enumerated;
pub use self::float32::Float32;
pub use self::float64::Float64;
pub use self::group::Grouped;
pub use self::identity::Identity;
pub use self::integer32::Integer32;
pub use self::integer64::Integer64;
pub use self::ipv4::IPv4;
pub use self::ipv6::IPv6;
pub use self::octetstring::OctetString;
pub use self::time::Time;
pub use self::unsigned32::Unsigned32;
pub use self::unsigned64::Unsigned64;
pub use self::uri::DiameterURI;
pub use self::utf8string::UTF8String;

/// AVP flag bits, laid out in the flags octet of the AVP header.
pub mod flags {
    pub const V: u8 = 0x80;
    pub const M: u8 = 0x40;
    pub const P: u8 = 0x20;
}

#[derive(Debug, Clone)]
pub struct Avp {
    code: u32,
    vendor_id: Option<u32>,
    flags: u8,
    value: AvpValue,
}

#[derive(Debug, Clone)]
pub enum AvpType {
    Unknown,
    Address,
    AddressIPv4,
    AddressIPv6,
    Identity,
    DiameterURI,
    Enumerated,
    Float32,
    Float64,
    Grouped,
    Integer32,
    Integer64,
    OctetString,
    Time,
    Unsigned32,
    Unsigned64,
    UTF8String,
}

#[derive(Debug, Clone)]
pub enum AvpValue {
    Address(Address),
    AddressIPv4(IPv4),
    AddressIPv6(IPv6),
    Identity(Identity),
    DiameterURI(DiameterURI),
    Enumerated(Enumerated),
    Float32(Float32),
    Float64(Float64),
    Grouped(Grouped),
    Integer32(Integer32),
    Integer64(Integer64),
    OctetString(OctetString),
    Time(Time),
    Unsigned32(Unsigned32),
    Unsigned64(Unsigned64),
    UTF8String(UTF8String),
}

impl fmt::Display for AvpValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AvpValue::Address(v) => v.fmt(f),
            AvpValue::AddressIPv4(v) => v.fmt(f),
            AvpValue::AddressIPv6(v) => v.fmt(f),
            AvpValue::Float32(v) => v.fmt(f),
            AvpValue::Float64(v) => v.fmt(f),
            AvpValue::Enumerated(v) => v.fmt(f),
            AvpValue::Grouped(v) => v.fmt(f),
            AvpValue::Integer32(v) => v.fmt(f),
            AvpValue::Integer64(v) => v.fmt(f),
            AvpValue::Unsigned32(v) => v.fmt(f),
            AvpValue::Unsigned64(v) => v.fmt(f),
            AvpValue::UTF8String(v) => v.fmt(f),
            AvpValue::OctetString(v) => v.fmt(f),
            AvpValue::Identity(v) => v.fmt(f),
            AvpValue::DiameterURI(v) => v.fmt(f),
            AvpValue::Time(v) => v.fmt(f),
        }
    }
}

impl AvpValue {
    pub fn length(&self) -> u32 {
        match self {
            AvpValue::Address(v) => v.length(),
            AvpValue::AddressIPv4(v) => v.length(),
            AvpValue::AddressIPv6(v) => v.length(),
            AvpValue::Float32(v) => v.length(),
            AvpValue::Float64(v) => v.length(),
            AvpValue::Enumerated(v) => v.length(),
            AvpValue::Grouped(v) => v.length(),
            AvpValue::Integer32(v) => v.length(),
            AvpValue::Integer64(v) => v.length(),
            AvpValue::Unsigned32(v) => v.length(),
            AvpValue::Unsigned64(v) => v.length(),
            AvpValue::UTF8String(v) => v.length(),
            AvpValue::OctetString(v) => v.length(),
            AvpValue::Identity(v) => v.length(),
            AvpValue::DiameterURI(v) => v.length(),
            AvpValue::Time(v) => v.length(),
        }
    }

    pub fn get_type_name(&self) -> &'static str {
        match self {
            AvpValue::Address(_) => "Address",
            AvpValue::AddressIPv4(_) => "AddressIPv4",
            AvpValue::AddressIPv6(_) => "AddressIPv6",
            AvpValue::Float32(_) => "Float32",
            AvpValue::Float64(_) => "Float64",
            AvpValue::Enumerated(_) => "Enumerated",
            AvpValue::Grouped(_) => "Grouped",
            AvpValue::Integer32(_) => "Integer32",
            AvpValue::Integer64(_) => "Integer64",
            AvpValue::Unsigned32(_) => "Unsigned32",
            AvpValue::Unsigned64(_) => "Unsigned64",
            AvpValue::UTF8String(_) => "UTF8String",
            AvpValue::OctetString(_) => "OctetString",
            AvpValue::Identity(_) => "Identity",
            AvpValue::DiameterURI(_) => "DiameterURI",
            AvpValue::Time(_) => "Time",
        }
    }

    fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            AvpValue::Address(v) => v.encode_to(writer),
            AvpValue::AddressIPv4(v) => v.encode_to(writer),
            AvpValue::AddressIPv6(v) => v.encode_to(writer),
            AvpValue::Float32(v) => v.encode_to(writer),
            AvpValue::Float64(v) => v.encode_to(writer),
            AvpValue::Enumerated(v) => v.encode_to(writer),
            AvpValue::Grouped(v) => v.encode_to(writer),
            AvpValue::Integer32(v) => v.encode_to(writer),
            AvpValue::Integer64(v) => v.encode_to(writer),
            AvpValue::Unsigned32(v) => v.encode_to(writer),
            AvpValue::Unsigned64(v) => v.encode_to(writer),
            AvpValue::UTF8String(v) => v.encode_to(writer),
            AvpValue::OctetString(v) => v.encode_to(writer),
            AvpValue::Identity(v) => v.encode_to(writer),
            AvpValue::DiameterURI(v) => v.encode_to(writer),
            AvpValue::Time(v) => v.encode_to(writer),
        }
    }
}

macro_rules! impl_from_avp_value {
    ($variant:ident, $ty:ty) => {
        impl From<$ty> for AvpValue {
            fn from(v: $ty) -> Self {
                AvpValue::$variant(v)
            }
        }
    };
}

impl_from_avp_value!(Address, Address);
impl_from_avp_value!(AddressIPv4, IPv4);
impl_from_avp_value!(AddressIPv6, IPv6);
impl_from_avp_value!(Identity, Identity);
impl_from_avp_value!(DiameterURI, DiameterURI);
impl_from_avp_value!(Enumerated, Enumerated);
impl_from_avp_value!(Float32, Float32);
impl_from_avp_value!(Float64, Float64);
impl_from_avp_value!(Grouped, Grouped);
impl_from_avp_value!(Integer32, Integer32);
impl_from_avp_value!(Integer64, Integer64);
impl_from_avp_value!(OctetString, OctetString);
impl_from_avp_value!(Time, Time);
impl_from_avp_value!(Unsigned32, Unsigned32);
impl_from_avp_value!(Unsigned64, Unsigned64);
impl_from_avp_value!(UTF8String, UTF8String);

impl Avp {
    /// Builds a new AVP. The `V` bit is derived from `vendor_id`, overriding
    /// whatever was passed in `flags`.
    pub fn new(code: u32, vendor_id: Option<u32>, flags: u8, value: AvpValue) -> Avp {
        let flags = if vendor_id.is_some() {
            flags | self::flags::V
        } else {
            flags & !self::flags::V
        };
        Avp {
            code,
            vendor_id,
            flags,
            value,
        }
    }

    pub fn get_code(&self) -> u32 {
        self.code
    }

    pub fn get_vendor_id(&self) -> Option<u32> {
        self.vendor_id
    }

    pub fn get_flags(&self) -> u8 {
        self.flags
    }

    pub fn is_vendor(&self) -> bool {
        self.flags & self::flags::V != 0
    }

    pub fn is_mandatory(&self) -> bool {
        self.flags & self::flags::M != 0
    }

    pub fn is_private(&self) -> bool {
        self.flags & self::flags::P != 0
    }

    pub fn get_value(&self) -> &AvpValue {
        &self.value
    }

    pub fn get_value_mut(&mut self) -> &mut AvpValue {
        &mut self.value
    }

    fn header_size(&self) -> u32 {
        if self.vendor_id.is_some() {
            12
        } else {
            8
        }
    }

    /// Wire length of header plus value, excluding padding.
    pub fn get_length(&self) -> u32 {
        self.header_size() + self.value.length()
    }

    /// Zero-padding bytes appended after the value to reach a 4-byte boundary.
    pub fn get_padding(&self) -> u8 {
        Avp::pad_to_32_bits(self.value.length())
    }

    pub fn get_integer32(&self) -> Option<i32> {
        match &self.value {
            AvpValue::Integer32(v) => Some(v.value()),
            _ => None,
        }
    }

    pub fn get_unsigned32(&self) -> Option<u32> {
        match &self.value {
            AvpValue::Unsigned32(v) => Some(v.value()),
            _ => None,
        }
    }

    pub fn get_utf8string(&self) -> Option<&str> {
        match &self.value {
            AvpValue::UTF8String(v) => Some(v.value()),
            _ => None,
        }
    }

    pub fn get_grouped(&self) -> Option<&Grouped> {
        match &self.value {
            AvpValue::Grouped(v) => Some(v),
            _ => None,
        }
    }

    fn pad_to_32_bits(length: u32) -> u8 {
        ((4 - (length & 0b11)) % 4) as u8
    }

    pub fn decode_from<R: Read>(reader: &mut R, dict: &Dictionary) -> Result<Avp> {
        let mut b = [0; 8];
        reader.read_exact(&mut b)?;

        let code = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let raw_flags = b[4];
        let length = u32::from_be_bytes([0, b[5], b[6], b[7]]);

        let has_vendor = raw_flags & self::flags::V != 0;
        let header_size = if has_vendor { 12 } else { 8 };
        if length < header_size {
            return Err(Error::MalformedAvp(format!(
                "AVP {} length {} shorter than header {}",
                code, length, header_size
            )));
        }

        let vendor_id = if has_vendor {
            let mut vb = [0; 4];
            reader.read_exact(&mut vb)?;
            Some(u32::from_be_bytes(vb))
        } else {
            None
        };

        let value_length = (length - header_size) as usize;
        let avp_type = dict
            .get_avp_type(code, vendor_id)
            .unwrap_or(&AvpType::Unknown);

        let value = match avp_type {
            AvpType::Address => AvpValue::Address(Address::decode_from(reader, value_length)?),
            AvpType::AddressIPv4 => AvpValue::AddressIPv4(IPv4::decode_from(reader)?),
            AvpType::AddressIPv6 => AvpValue::AddressIPv6(IPv6::decode_from(reader)?),
            AvpType::Float32 => AvpValue::Float32(Float32::decode_from(reader)?),
            AvpType::Float64 => AvpValue::Float64(Float64::decode_from(reader)?),
            AvpType::Enumerated => AvpValue::Enumerated(Enumerated::decode_from(reader)?),
            AvpType::Grouped => AvpValue::Grouped(Grouped::decode_from(reader, value_length, dict)?),
            AvpType::Integer32 => AvpValue::Integer32(Integer32::decode_from(reader)?),
            AvpType::Integer64 => AvpValue::Integer64(Integer64::decode_from(reader)?),
            AvpType::Unsigned32 => AvpValue::Unsigned32(Unsigned32::decode_from(reader)?),
            AvpType::Unsigned64 => AvpValue::Unsigned64(Unsigned64::decode_from(reader)?),
            AvpType::UTF8String => {
                AvpValue::UTF8String(UTF8String::decode_from(reader, value_length)?)
            }
            AvpType::OctetString => {
                AvpValue::OctetString(OctetString::decode_from(reader, value_length)?)
            }
            AvpType::Identity => AvpValue::Identity(Identity::decode_from(reader, value_length)?),
            AvpType::DiameterURI => {
                AvpValue::DiameterURI(DiameterURI::decode_from(reader, value_length)?)
            }
            AvpType::Time => AvpValue::Time(Time::decode_from(reader)?),
            AvpType::Unknown => {
                AvpValue::OctetString(OctetString::decode_from(reader, value_length)?)
            }
        };

        let padding = Avp::pad_to_32_bits(value_length as u32);
        if padding > 0 {
            let mut discard = [0u8; 3];
            reader.read_exact(&mut discard[..padding as usize])?;
        }

        Ok(Avp {
            code,
            vendor_id,
            flags: raw_flags,
            value,
        })
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.code.to_be_bytes())?;
        writer.write_all(&[self.flags])?;
        let length_bytes = self.get_length().to_be_bytes();
        writer.write_all(&length_bytes[1..4])?;
        if let Some(vendor_id) = self.vendor_id {
            writer.write_all(&vendor_id.to_be_bytes())?;
        }
        self.value.encode_to(writer)?;
        for _ in 0..self.get_padding() {
            writer.write_all(&[0])?;
        }
        Ok(())
    }

    pub(crate) fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
        depth: usize,
        dict: &Dictionary,
    ) -> fmt::Result {
        let indent = "  ".repeat(depth + 1);
        let name = dict
            .get_avp_name(self.code, self.vendor_id)
            .unwrap_or("Unknown");
        write!(
            f,
            "{indent}{:<32} {:>5} {}{}{}  {:<11}  {}",
            name,
            self.code,
            if self.is_vendor() { "V" } else { "-" },
            if self.is_mandatory() { "M" } else { "-" },
            if self.is_private() { "P" } else { "-" },
            self.value.get_type_name(),
            self.value,
        )
    }
}

impl fmt::Display for Avp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dict = crate::dictionary::Dictionary::new(&[&crate::dictionary::DEFAULT_DICT_XML]);
        self.fmt(f, 0, &dict)
    }
}

/// Constructs an [`Avp`] from `(code, vendor_id, flags, value)`.
#[macro_export]
macro_rules! avp {
    ($code:expr, $vendor_id:expr, $flags:expr, $value:expr) => {
        $crate::avp::Avp::new($code, $vendor_id, $flags, $value.into())
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{self, Dictionary};
    use std::io::Cursor;

    fn test_dict() -> Dictionary {
        Dictionary::new(&[&dictionary::DEFAULT_DICT_XML])
    }

    #[test]
    fn test_decode_encode_session_id() {
        // code=461 is outside the base dictionary and decodes as OctetString.
        let data = [
            0x00, 0x00, 0x01, 0xCD, // code 461
            0x40, 0x00, 0x00, 0x16, // flags M, length 22
            0x33, 0x32, 0x32, 0x35, 0x31, 0x40, 0x33, 0x67, 0x70, 0x70, 0x2E, 0x6F, 0x72, 0x67,
            0x00, 0x00,
        ];
        let dict = test_dict();
        let mut cursor = Cursor::new(&data);
        let avp = Avp::decode_from(&mut cursor, &dict).unwrap();
        assert_eq!(avp.get_code(), 461);
        assert!(avp.is_mandatory());
        assert!(!avp.is_vendor());

        let mut encoded = Vec::new();
        avp.encode_to(&mut encoded).unwrap();
        assert_eq!(encoded, data);
    }

    #[test]
    fn test_zero_length_payload() {
        let dict = test_dict();
        let avp = Avp::new(9999, None, flags::M, OctetString::new(vec![]).into());
        assert_eq!(avp.get_length(), 8);
        assert_eq!(avp.get_padding(), 0);

        let mut encoded = Vec::new();
        avp.encode_to(&mut encoded).unwrap();
        assert_eq!(encoded.len(), 8);

        let mut cursor = Cursor::new(&encoded);
        let decoded = Avp::decode_from(&mut cursor, &dict).unwrap();
        assert_eq!(decoded.get_length(), 8);
    }

    #[test]
    fn test_vendor_flag_forced_by_vendor_id() {
        let avp = Avp::new(1, Some(10415), 0, Unsigned32::new(1).into());
        assert!(avp.is_vendor());

        let avp = Avp::new(1, None, flags::V, Unsigned32::new(1).into());
        assert!(!avp.is_vendor());
    }

    #[test]
    fn test_round_trip_with_vendor() {
        let dict = test_dict();
        let avp = Avp::new(571, Some(10415), flags::V, Integer32::new(-5).into());
        let mut encoded = Vec::new();
        avp.encode_to(&mut encoded).unwrap();
        assert_eq!(encoded.len(), 16);

        let mut cursor = Cursor::new(&encoded);
        let decoded = Avp::decode_from(&mut cursor, &dict).unwrap();
        assert_eq!(decoded.get_vendor_id(), Some(10415));
        assert_eq!(decoded.get_integer32(), Some(-5));
    }
}
