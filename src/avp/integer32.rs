use crate::error::Result;
use std::fmt;
use std::io::Read;
use std::io::Write;

#[derive(Debug, Clone)]
pub struct Integer32(i32);

impl Integer32 {
    pub fn new(value: i32) -> Integer32 {
        Integer32(value)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    pub fn decode_from<R: Read>(reader: &mut R) -> Result<Integer32> {
        let mut b = [0; 4];
        reader.read_exact(&mut b)?;
        Ok(Integer32(i32::from_be_bytes(b)))
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.0.to_be_bytes())?;
        Ok(())
    }

    pub fn length(&self) -> u32 {
        4
    }
}

impl fmt::Display for Integer32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
