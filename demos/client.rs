//! A Diameter client: connects to a peer, waits for the handshake to
//! complete, then sends a single Credit-Control-Request.

use diameter::avp;
use diameter::avp::address::Value::IPv4;
use diameter::avp::flags::M;
use diameter::avp::{Address, Identity, UTF8String, Unsigned32};
use diameter::dictionary::{self, Dictionary};
use diameter::flags;
use diameter::node::{NodeConfig, PeerConfig};
use diameter::peer::PeerTimers;
use diameter::transport::TransportKind;
use diameter::{ApplicationId, CommandCode, DiameterMessage, Node};
use std::fs;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let dict = Arc::new(Dictionary::new(&[
        &dictionary::DEFAULT_DICT_XML,
        &fs::read_to_string("dict/3gpp-ro-rf.xml").unwrap(),
    ]));

    let config = NodeConfig {
        origin_host: "client.example.com".into(),
        origin_realm: "realm.example.com".into(),
        vendor_id: 35838,
        product_name: "diameter-stack".into(),
        ip_addresses: vec!["127.0.0.1".parse().unwrap()],
        tcp_port: 0,
        sctp_port: 0,
        auth_application_ids: vec![ApplicationId::CreditControl.code()],
        acct_application_ids: vec![],
        wakeup_interval: Duration::from_secs(10),
        auto_add_peers: false,
    };

    let node = Node::new(config, Arc::clone(&dict));
    node.add_peer(PeerConfig {
        origin_host: "host.example.com".into(),
        realm: "realm.example.com".into(),
        addresses: vec!["127.0.0.1".parse().unwrap()],
        port: 3868,
        transport: TransportKind::Tcp,
        persistent: false,
        timers: PeerTimers::default(),
    });

    // The connect/CER-CEA handshake runs in the background; give it a
    // moment before routing a request through it.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let ccr = build_ccr(Arc::clone(&dict));
    match node.send_request(ccr, Duration::from_secs(5)).await {
        Ok(answer) => log::info!("received answer: {}", answer),
        Err(e) => log::error!("request failed: {:?}", e),
    }
}

fn build_ccr(dict: Arc<Dictionary>) -> DiameterMessage {
    let mut ccr = DiameterMessage::new(
        CommandCode::CreditControl,
        ApplicationId::CreditControl,
        flags::REQUEST,
        0,
        0,
        dict,
    );
    ccr.add_avp(avp!(263, None, M, UTF8String::new("ses;000000001")));
    ccr.add_avp(avp!(264, None, M, Identity::new("client.example.com")));
    ccr.add_avp(avp!(296, None, M, Identity::new("realm.example.com")));
    ccr.add_avp(avp!(
        257,
        None,
        M,
        Address::new(IPv4(Ipv4Addr::new(127, 0, 0, 1)))
    ));
    ccr.add_avp(avp!(416, None, M, Unsigned32::new(1)));
    ccr.add_avp(avp!(415, None, M, Unsigned32::new(0)));
    ccr
}
