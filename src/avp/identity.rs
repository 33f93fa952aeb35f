use crate::avp::OctetString;
use crate::error::Result;
use std::fmt;
use std::io::Read;
use std::io::Write;

/// DiameterIdentity: an OctetString holding a fully-qualified host or realm
/// name (FQDN), used for Origin-Host, Origin-Realm, Destination-Host, etc.
#[derive(Debug, Clone)]
pub struct Identity(OctetString);

impl Identity {
    pub fn new<S: Into<Vec<u8>>>(value: S) -> Identity {
        Identity(OctetString::new(value.into()))
    }

    pub fn value(&self) -> &[u8] {
        self.0.value()
    }

    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(self.0.value())
            .map_err(|e| crate::error::Error::MalformedAvp(format!("invalid Identity: {}", e)))
    }

    pub fn decode_from<R: Read>(reader: &mut R, len: usize) -> Result<Identity> {
        Ok(Identity(OctetString::decode_from(reader, len)?))
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.0.encode_to(writer)
    }

    pub fn length(&self) -> u32 {
        self.0.length()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(self.0.value()) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => self.0.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode_ascii() {
        let avp = Identity::new("example.com");
        let mut encoded = Vec::new();
        avp.encode_to(&mut encoded).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let avp = Identity::decode_from(&mut cursor, encoded.len()).unwrap();
        assert_eq!(avp.as_str().unwrap(), "example.com");
    }
}
