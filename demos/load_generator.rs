//! Fires a batch of Credit-Control-Request-Initial/Terminate pairs through
//! a single `Node` connection, concurrently, and reports round-trip timing
//! via `Node::statistics`.

use chrono::Local;
use diameter::avp;
use diameter::avp::address::Value::IPv4;
use diameter::avp::flags::M;
use diameter::avp::{Address, Enumerated, Identity, UTF8String, Unsigned32};
use diameter::dictionary::{self, Dictionary};
use diameter::flags;
use diameter::node::{NodeConfig, PeerConfig};
use diameter::peer::PeerTimers;
use diameter::transport::TransportKind;
use diameter::{ApplicationId, CommandCode, DiameterMessage, Node};
use std::fs;
use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const BATCH_SIZE: usize = 10;

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
        origin_host: "loadgen.example.com".into(),
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
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut ccri_handles = Vec::with_capacity(BATCH_SIZE);
    for i in 0..BATCH_SIZE {
        let session_id = format!("ses;{:09}", i);
        let node = Arc::clone(&node);
        let dict = Arc::clone(&dict);
        ccri_handles.push(tokio::spawn(async move {
            send_ccr_i(&node, dict, session_id).await
        }));
    }

    let mut ccrt_handles = Vec::with_capacity(BATCH_SIZE);
    for handle in ccri_handles {
        if let Ok(session_id) = handle.await {
            let node = Arc::clone(&node);
            let dict = Arc::clone(&dict);
            ccrt_handles.push(tokio::spawn(async move {
                send_ccr_t(&node, dict, session_id).await
            }));
        }
    }
    for handle in ccrt_handles {
        let _ = handle.await;
    }

    let stats = node.statistics();
    log::info!(
        "overall average response time: {:?}",
        stats.overall_average_response_time
    );
}

fn base_ccr(dict: Arc<Dictionary>, session_id: &str, request_type: u32) -> DiameterMessage {
    let mut ccr = DiameterMessage::new(
        CommandCode::CreditControl,
        ApplicationId::CreditControl,
        flags::REQUEST,
        0,
        0,
        dict,
    );
    ccr.add_avp(avp!(264, None, M, Identity::new("loadgen.example.com")));
    ccr.add_avp(avp!(296, None, M, Identity::new("realm.example.com")));
    ccr.add_avp(avp!(263, None, M, UTF8String::new(session_id)));
    ccr.add_avp(avp!(416, None, M, Enumerated::new(request_type as i32)));
    ccr.add_avp(avp!(415, None, M, Unsigned32::new(1000)));
    ccr.add_avp(avp!(
        1228,
        Some(10415),
        M,
        Address::new(IPv4(Ipv4Addr::new(127, 0, 0, 1)))
    ));
    ccr
}

async fn send_ccr_i(node: &Arc<Node>, dict: Arc<Dictionary>, session_id: String) -> String {
    let ccr = base_ccr(dict, &session_id, 1);
    log::info!("CCR-I request sent session_id: {}", session_id);
    match node.send_request(ccr, Duration::from_secs(5)).await {
        Ok(cca) => log::info!(
            "CCR-I response recv session_id: {}",
            cca.get_avp(263)
                .and_then(|avp| avp.get_utf8string())
                .map(|s| s.to_string())
                .unwrap_or_default()
        ),
        Err(e) => log::error!("CCR-I failed for {}: {:?}", session_id, e),
    }
    session_id
}

async fn send_ccr_t(node: &Arc<Node>, dict: Arc<Dictionary>, session_id: String) {
    let ccr = base_ccr(dict, &session_id, 3);
    log::info!("CCR-T request sent session_id: {}", session_id);
    match node.send_request(ccr, Duration::from_secs(5)).await {
        Ok(_) => log::info!("CCR-T response recv session_id: {}", session_id),
        Err(e) => log::error!("CCR-T failed for {}: {:?}", session_id, e),
    }
}
