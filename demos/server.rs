//! A Diameter server: accepts inbound peer connections and answers
//! Credit-Control-Request with a canned Credit-Control-Answer.

use chrono::Local;
use diameter::avp;
use diameter::avp::flags::M;
use diameter::avp::{Enumerated, Grouped, Identity, UTF8String, Unsigned32};
use diameter::dictionary::{self, Dictionary};
use diameter::flags;
use diameter::node::NodeConfig;
use diameter::{Application, ApplicationId, DiameterMessage, Node};
use std::fs;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

struct CreditControlApp {
    dict: Arc<Dictionary>,
}

#[async_trait::async_trait]
impl Application for CreditControlApp {
    async fn handle_request(
        &self,
        req: DiameterMessage,
    ) -> diameter::Result<DiameterMessage> {
        log::info!("received request: {}", req);

        let mut res = DiameterMessage::new(
            req.get_command_code(),
            req.get_application_id(),
            req.get_flags() ^ flags::REQUEST,
            req.get_hop_by_hop_id(),
            req.get_end_to_end_id(),
            Arc::clone(&self.dict),
        );

        res.add_avp(avp!(264, None, M, Identity::new("host.example.com")));
        res.add_avp(avp!(296, None, M, Identity::new("realm.example.com")));
        if let Some(session_id) = req.get_avp(263) {
            res.add_avp(session_id.clone());
        }
        res.add_avp(avp!(416, None, M, Enumerated::new(1)));
        res.add_avp(avp!(415, None, M, Unsigned32::new(1000)));
        res.add_avp(avp!(268, None, M, Unsigned32::new(2001)));

        let mut mscc = Grouped::new(vec![]);
        mscc.add_avp(439, None, M, Unsigned32::new(7786).into());
        mscc.add_avp(432, None, M, Unsigned32::new(7786).into());
        mscc.add_avp(268, None, M, Unsigned32::new(2001).into());
        res.add_avp(avp!(456, None, M, mscc));

        Ok(res)
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::new()
        .format(|buf, record| {
            let now = Local::now();
            let thread = thread::current();
            writeln!(
                buf,
                "{} [{}] {:?} - ({}): {}",
                now.format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                thread.id(),
                thread.name().unwrap_or("unnamed"),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .init();

    let dict = Arc::new(Dictionary::new(&[
        &dictionary::DEFAULT_DICT_XML,
        &fs::read_to_string("dict/3gpp-ro-rf.xml").unwrap(),
    ]));

    let config = NodeConfig {
        origin_host: "host.example.com".into(),
        origin_realm: "realm.example.com".into(),
        vendor_id: 35838,
        product_name: "diameter-stack".into(),
        ip_addresses: vec!["0.0.0.0".parse().unwrap()],
        tcp_port: 3868,
        sctp_port: 0,
        auth_application_ids: vec![ApplicationId::CreditControl.code()],
        acct_application_ids: vec![],
        wakeup_interval: Duration::from_secs(10),
        auto_add_peers: true,
    };

    let node = Node::new(config, Arc::clone(&dict));
    node.register_application(
        ApplicationId::CreditControl.code(),
        Arc::new(CreditControlApp { dict }),
    );

    log::info!("listening at 0.0.0.0:3868");
    node.listen().await.unwrap();
}
