use crate::avp::Avp;
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use std::io::Read;
use std::io::Write;

use super::AvpValue;

#[derive(Debug, Clone)]
pub struct Grouped {
    avps: Vec<Avp>,
}

impl Grouped {
    pub fn new(avps: Vec<Avp>) -> Grouped {
        Grouped { avps }
    }

    pub fn avps(&self) -> &[Avp] {
        &self.avps
    }

    pub fn add(&mut self, avp: Avp) {
        self.avps.push(avp);
    }

    pub fn add_avp(&mut self, code: u32, vendor_id: Option<u32>, flags: u8, value: AvpValue) {
        self.add(Avp::new(code, vendor_id, flags, value));
    }

    /// Depth-first search for every AVP with `code`, at this level and
    /// inside any nested grouped AVP.
    pub fn find_avps(&self, code: u32) -> Vec<&Avp> {
        let mut found = Vec::new();
        collect_matching(&self.avps, code, &mut found);
        found
    }

    pub fn decode_from<R: Read>(reader: &mut R, len: usize, dict: &Dictionary) -> Result<Grouped> {
        let mut avps = Vec::new();

        let mut offset = 0;
        while offset < len {
            let avp = Avp::decode_from(reader, dict)?;
            offset += avp.get_length() as usize;
            offset += avp.get_padding() as usize;
            avps.push(avp);
        }

        if offset != len {
            return Err(Error::MalformedAvp(
                "grouped AVP length mismatch".into(),
            ));
        }

        Ok(Grouped { avps })
    }

    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        for avp in &self.avps {
            avp.encode_to(writer)?;
        }
        Ok(())
    }

    pub fn length(&self) -> u32 {
        self.avps
            .iter()
            .map(|avp| avp.get_length() + avp.get_padding() as u32)
            .sum()
    }

    pub(crate) fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        depth: usize,
        dict: &Dictionary,
    ) -> std::fmt::Result {
        for avp in &self.avps {
            writeln!(f)?;
            avp.fmt(f, depth + 1, dict)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Grouped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dict = Dictionary::new(&[&crate::dictionary::DEFAULT_DICT_XML]);
        self.fmt(f, 0, &dict)
    }
}

fn collect_matching<'a>(avps: &'a [Avp], code: u32, found: &mut Vec<&'a Avp>) {
    for avp in avps {
        if avp.get_code() == code {
            found.push(avp);
        }
        if let Some(grouped) = avp.get_grouped() {
            collect_matching(&grouped.avps, code, found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp::enumerated::Enumerated;
    use crate::avp::unsigned32::Unsigned32;
    use crate::avp::AvpValue;
    use crate::{avp, dictionary};

    #[test]
    fn test_new_grouped_avp() {
        let mut grouped_avp = Grouped::new(vec![]);
        grouped_avp.add_avp(416, None, 0, Enumerated::new(1).into());
        grouped_avp.add_avp(415, None, 0, Unsigned32::new(1000).into());

        assert_eq!(grouped_avp.avps().len(), 2);
        assert_eq!(grouped_avp.avps()[0].get_code(), 416);
        assert_eq!(grouped_avp.avps()[1].get_code(), 415);
    }

    #[test]
    fn test_encode_decode() {
        let dict = dictionary::Dictionary::new(&[&dictionary::DEFAULT_DICT_XML]);

        let avp = Grouped::new(vec![
            avp!(416, None, 0, Enumerated::new(1)),
            avp!(415, None, 0, Unsigned32::new(1000)),
        ]);
        assert_eq!(avp.avps().len(), 2);
        let mut encoded = Vec::new();
        avp.encode_to(&mut encoded).unwrap();
        let mut cursor = std::io::Cursor::new(&encoded);
        let avp = Grouped::decode_from(&mut cursor, encoded.len(), &dict).unwrap();
        assert_eq!(avp.avps().len(), 2);
        assert_eq!(avp.avps()[0].get_code(), 416);
        assert_eq!(avp.avps()[1].get_code(), 415);

        match avp.avps()[0].get_value() {
            AvpValue::Enumerated(v) => assert_eq!(v.value(), 1),
            _ => panic!("invalid value, expected Enumerated"),
        }
        match avp.avps()[1].get_value() {
            AvpValue::Unsigned32(v) => assert_eq!(v.value(), 1000),
            _ => panic!("invalid value, expected Unsigned32"),
        }
    }
}
