use crate::diameter::{flags, ApplicationId, CommandCode, DiameterHeader, DiameterMessage};
use std::fmt;

impl fmt::Display for DiameterMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        writeln!(
            f,
            "  {:<32} {:>5} {}{}{}  {:<11}  {}",
            "AVP", "Code", "V", "M", "P", "Type", "Value"
        )?;

        for avp in self.avps() {
            avp.fmt(f, 0, self.dictionary())?;
            writeln!(f)?;
        }

        Ok(())
    }
}

impl fmt::Display for DiameterHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request_flag = if self.flags & flags::REQUEST != 0 {
            "Request"
        } else {
            "Answer"
        };
        let error_flag = if self.flags & flags::ERROR != 0 {
            "Error"
        } else {
            ""
        };
        let proxyable_flag = if self.flags & flags::PROXYABLE != 0 {
            "Proxyable"
        } else {
            ""
        };
        let retransmit_flag = if self.flags & flags::RETRANSMIT != 0 {
            "Retransmit"
        } else {
            ""
        };

        write!(
            f,
            "{}({}) {}({}) {}{}{}{} {}, {}",
            self.code,
            self.code.code(),
            self.application_id,
            self.application_id.code(),
            request_flag,
            error_flag,
            proxyable_flag,
            retransmit_flag,
            self.hop_by_hop_id,
            self.end_to_end_id
        )
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avp;
    use crate::avp::flags::M;
    use crate::avp::{Identity, Integer32};
    use crate::dictionary::{self, Dictionary};
    use std::sync::Arc;

    #[test]
    fn test_display_message() {
        let dict = Arc::new(Dictionary::new(&[&dictionary::DEFAULT_DICT_XML]));
        let mut message = DiameterMessage::new(
            CommandCode::CreditControl,
            ApplicationId::CreditControl,
            flags::REQUEST,
            1123158610,
            3102381851,
            dict,
        );
        message.add_avp(avp!(296, None, M, Integer32::new(123456)));
        message.add_avp(avp!(264, Some(10415), M, Identity::new("ses;12345888")));

        let rendered = message.to_string();
        assert!(rendered.contains("CreditControl"));
        assert!(rendered.contains("Request"));
    }
}
