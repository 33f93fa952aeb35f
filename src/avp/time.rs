use crate::error::{Error, Result};
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use std::fmt;
use std::io::Read;
use std::io::Write;

/// Diffence between the NTP/RFC 868 epoch (1900-01-01) and the Unix epoch
/// (1970-01-01), in seconds.
const RFC868_OFFSET: i64 = 2_208_988_800;

#[derive(Debug, Clone)]
pub struct Time(DateTime<Utc>);

impl Time {
    pub fn new(time: DateTime<Utc>) -> Self {
        Time(time)
    }

    pub fn value(&self) -> &DateTime<Utc> {
        &self.0
    }

    pub fn decode_from<R: Read>(reader: &mut R) -> Result<Time> {
        let mut b = [0; 4];
        reader.read_exact(&mut b)?;

        // The 32-bit NTP seconds counter wraps in 2036; values below the
        // 1970 epoch are assumed to be post-wrap rather than pre-1970.
        let raw = u32::from_be_bytes(b) as i64;
        let unix_timestamp = if raw < RFC868_OFFSET {
            raw + (u32::MAX as i64 + 1) - RFC868_OFFSET
        } else {
            raw - RFC868_OFFSET
        };
        let timestamp = Utc
            .timestamp_opt(unix_timestamp, 0)
            .single()
            .ok_or_else(|| Error::MalformedAvp("invalid Time value".to_string()))?;

        Ok(Time(timestamp))
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let unix_timestamp = self.0.timestamp();
        let diameter_timestamp = unix_timestamp + RFC868_OFFSET;
        if !(0..=u32::MAX as i64).contains(&diameter_timestamp) {
            return Err(Error::EncodeError(
                "time value does not fit the Diameter Time format".to_string(),
            ));
        }
        writer.write_all(&(diameter_timestamp as u32).to_be_bytes())?;
        Ok(())
    }

    pub fn length(&self) -> u32 {
        4
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_encode_decode() {
        let now: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 10, 10, 35, 58).unwrap();
        let avp = Time::new(now);
        let mut encoded = Vec::new();
        avp.encode_to(&mut encoded).unwrap();
        let mut cursor = Cursor::new(&encoded);
        let avp = Time::decode_from(&mut cursor).unwrap();
        assert_eq!(*avp.value(), now);
    }
}
