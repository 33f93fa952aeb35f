use crate::error::{Error, Result};
use std::fmt;
use std::io::Read;
use std::io::Write;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Address Format per RFC 6733 §4.3.1: a 2-byte IANA Address Family
/// number followed by the address bytes. AF 1 is IPv4, AF 2 is IPv6;
/// anything else is carried opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    IPv4(Ipv4Addr),
    IPv6(Ipv6Addr),
    Other(u16, Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct Address(Value);

impl Address {
    pub fn new(value: Value) -> Address {
        Address(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn decode_from<R: Read>(reader: &mut R, len: usize) -> Result<Address> {
        if len < 2 {
            return Err(Error::MalformedAvp(
                "Address AVP shorter than the address-family tag".into(),
            ));
        }
        let mut af = [0u8; 2];
        reader.read_exact(&mut af)?;
        let family = u16::from_be_bytes(af);

        let mut data = vec![0u8; len - 2];
        reader.read_exact(&mut data)?;

        let value = match family {
            1 if data.len() == 4 => Value::IPv4(Ipv4Addr::new(data[0], data[1], data[2], data[3])),
            2 if data.len() == 16 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&data);
                Value::IPv6(Ipv6Addr::from(octets))
            }
            _ => Value::Other(family, data),
        };
        Ok(Address(value))
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        match &self.0 {
            Value::IPv4(ip) => {
                writer.write_all(&1u16.to_be_bytes())?;
                writer.write_all(&ip.octets())?;
            }
            Value::IPv6(ip) => {
                writer.write_all(&2u16.to_be_bytes())?;
                writer.write_all(&ip.octets())?;
            }
            Value::Other(family, data) => {
                writer.write_all(&family.to_be_bytes())?;
                writer.write_all(data)?;
            }
        }
        Ok(())
    }

    pub fn length(&self) -> u32 {
        2 + match &self.0 {
            Value::IPv4(_) => 4,
            Value::IPv6(_) => 16,
            Value::Other(_, data) => data.len() as u32,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::IPv4(ip) => write!(f, "{}", ip),
            Value::IPv6(ip) => write!(f, "{}", ip),
            Value::Other(family, data) => {
                write!(f, "af={}", family)?;
                for b in data {
                    write!(f, " {:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}
