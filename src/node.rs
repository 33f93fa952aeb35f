//! Node: owns the peer table, listener socket, outbound connection loop, and
//! the per-connection event loop that drives the peer state machine and
//! routes application traffic. RFC 6733 §2.6/§5.

use crate::application::{default_answer, Application};
use crate::diameter::{CommandCode, DiameterMessage, SessionIdGenerator};
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use crate::peer::{
    Action, Direction, LocalCapabilities, PeerConnection, PeerState, PeerTimers,
    RESULT_APPLICATION_UNSUPPORTED, RESULT_UNABLE_TO_COMPLY,
};
use crate::statistics::{NodeStatistics, PeerStatistics, StatisticsSnapshot};
use crate::transport::{self, Codec, TransportKind};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};

const AVP_ORIGIN_HOST: u32 = 264;
const AVP_DESTINATION_HOST: u32 = 293;
const AVP_DESTINATION_REALM: u32 = 283;
const AVP_RESULT_CODE: u32 = 268;

/// Static configuration for a peer the node should maintain a connection to,
/// or recognize on inbound connect.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub origin_host: String,
    pub realm: String,
    pub addresses: Vec<IpAddr>,
    pub port: u16,
    pub transport: TransportKind,
    pub persistent: bool,
    pub timers: PeerTimers,
}

/// Node-wide configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub origin_host: String,
    pub origin_realm: String,
    pub vendor_id: u32,
    pub product_name: String,
    pub ip_addresses: Vec<IpAddr>,
    pub tcp_port: u16,
    /// 0 disables SCTP listening. Non-zero always fails at `listen` time,
    /// since this crate has no OS-level libsctp binding (see
    /// `transport::TransportKind`).
    pub sctp_port: u16,
    pub auth_application_ids: Vec<u32>,
    pub acct_application_ids: Vec<u32>,
    pub wakeup_interval: Duration,
    pub auto_add_peers: bool,
}

impl NodeConfig {
    fn local_capabilities(&self) -> LocalCapabilities {
        LocalCapabilities {
            origin_host: self.origin_host.clone(),
            origin_realm: self.origin_realm.clone(),
            host_ip_addresses: self.ip_addresses.clone(),
            vendor_id: self.vendor_id,
            product_name: self.product_name.clone(),
            auth_application_ids: self.auth_application_ids.iter().copied().collect(),
            acct_application_ids: self.acct_application_ids.iter().copied().collect(),
        }
    }
}

struct PendingRequest {
    waiter: oneshot::Sender<DiameterMessage>,
    end_to_end_id: u32,
}

struct Peer {
    config: Mutex<PeerConfig>,
    connection: Mutex<Option<Arc<PeerConnection>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<DiameterMessage>>>,
    in_flight: AtomicUsize,
    last_connect: Mutex<Option<Instant>>,
    last_disconnect: Mutex<Option<Instant>>,
    stats: Arc<PeerStatistics>,
}

impl Peer {
    fn new(config: PeerConfig) -> Peer {
        Peer {
            config: Mutex::new(config),
            connection: Mutex::new(None),
            outbound: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            last_connect: Mutex::new(None),
            last_disconnect: Mutex::new(None),
            stats: Arc::new(PeerStatistics::new()),
        }
    }

    fn is_ready(&self) -> bool {
        self.connection
            .lock()
            .unwrap()
            .as_ref()
            .map(|c| c.is_ready())
            .unwrap_or(false)
    }
}

/// Generates end-to-end identifiers per RFC 6733 §3: high 12 bits from the
/// node's start time in seconds, low 20 bits from a randomly-seeded
/// monotonic counter.
struct EndToEndIdGenerator {
    high: u32,
    low: AtomicU32,
}

impl EndToEndIdGenerator {
    fn new() -> EndToEndIdGenerator {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        EndToEndIdGenerator {
            high: (secs & 0xFFF) << 20,
            low: AtomicU32::new(rand::random::<u32>() & 0xFFFFF),
        }
    }

    fn next(&self) -> u32 {
        let low = self.low.fetch_add(1, Ordering::Relaxed) & 0xFFFFF;
        self.high | low
    }
}

/// Owns every peer connection, the pending-request correlation table, and
/// the application registry. Cloned around as `Arc<Node>`.
pub struct Node {
    pub config: NodeConfig,
    pub dict: Arc<Dictionary>,
    pub session_ids: SessionIdGenerator,
    peers: Mutex<HashMap<String, Arc<Peer>>>,
    applications: Mutex<HashMap<u32, Arc<dyn Application>>>,
    pending: Mutex<HashMap<(String, u32), PendingRequest>>,
    end_to_end: EndToEndIdGenerator,
    statistics: NodeStatistics,
}

impl Node {
    pub fn new(config: NodeConfig, dict: Arc<Dictionary>) -> Arc<Node> {
        let session_ids = SessionIdGenerator::new(config.origin_host.clone());
        let node = Arc::new(Node {
            config,
            dict,
            session_ids,
            peers: Mutex::new(HashMap::new()),
            applications: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            end_to_end: EndToEndIdGenerator::new(),
            statistics: NodeStatistics::new(),
        });
        let snapshotter = Arc::clone(&node);
        tokio::spawn(async move { snapshotter.run_snapshotter().await });
        node
    }

    async fn run_snapshotter(self: Arc<Node>) {
        let mut tick = tokio::time::interval(NodeStatistics::snapshot_interval());
        loop {
            tick.tick().await;
            let peers: Vec<Arc<Peer>> = self.peers.lock().unwrap().values().cloned().collect();
            let snapshot = self
                .statistics
                .aggregate(peers.iter().map(|p| p.stats.as_ref()), SystemTime::now());
            self.statistics.push_snapshot(snapshot);
        }
    }

    /// Current aggregate statistics across every known peer.
    pub fn statistics(&self) -> StatisticsSnapshot {
        let peers: Vec<Arc<Peer>> = self.peers.lock().unwrap().values().cloned().collect();
        self.statistics
            .aggregate(peers.iter().map(|p| p.stats.as_ref()), SystemTime::now())
    }

    /// The last 24 hours of 60-second aggregate snapshots.
    pub fn statistics_history(&self) -> Vec<StatisticsSnapshot> {
        self.statistics.history()
    }

    pub fn register_application(&self, application_id: u32, application: Arc<dyn Application>) {
        self.applications
            .lock()
            .unwrap()
            .insert(application_id, application);
    }

    pub fn next_end_to_end_id(&self) -> u32 {
        self.end_to_end.next()
    }

    /// Registers a statically configured peer and, if persistent, starts the
    /// reconnect loop immediately.
    pub fn add_peer(self: &Arc<Node>, config: PeerConfig) {
        let persistent = config.persistent;
        let origin_host = config.origin_host.clone();
        let peer = Arc::new(Peer::new(config));
        self.peers.lock().unwrap().insert(origin_host, peer.clone());
        if persistent {
            let node = Arc::clone(self);
            tokio::spawn(async move { node.connect_loop(peer).await });
        }
    }

    async fn connect_loop(self: Arc<Node>, peer: Arc<Peer>) {
        loop {
            let (addr, port, kind, reconnect_wait, always_reconnect, persistent) = {
                let cfg = peer.config.lock().unwrap();
                (
                    cfg.addresses.first().copied(),
                    cfg.port,
                    cfg.transport,
                    cfg.timers.reconnect_wait,
                    cfg.timers.always_reconnect,
                    cfg.persistent,
                )
            };
            let Some(addr) = addr else { return };

            match transport::connect(kind, addr, port).await {
                Ok(stream) => {
                    *peer.last_connect.lock().unwrap() = Some(Instant::now());
                    self.clone().run_connection(peer.clone(), stream, Direction::Sender).await;
                }
                Err(_) => {}
            }

            *peer.last_disconnect.lock().unwrap() = Some(Instant::now());
            if !(persistent || always_reconnect) {
                return;
            }
            tokio::time::sleep(reconnect_wait).await;
        }
    }

    /// Binds the TCP listener and accepts inbound connections indefinitely.
    /// Also attempts an SCTP listener when `sctp_port` is non-zero; absent
    /// OS-level libsctp support, that attempt always fails and is logged
    /// without aborting the TCP listener.
    pub async fn listen(self: &Arc<Node>) -> Result<()> {
        if self.config.sctp_port != 0 {
            match transport::listen(TransportKind::Sctp, &self.config.ip_addresses, self.config.sctp_port).await {
                Ok(_) => unreachable!("SCTP listen cannot succeed without OS support"),
                Err(e) => log::warn!("SCTP listener on port {} unavailable: {}", self.config.sctp_port, e),
            }
        }

        let listener = TcpListener::bind(("0.0.0.0", self.config.tcp_port)).await?;
        loop {
            let (stream, _addr) = listener.accept().await?;
            let node = Arc::clone(self);
            tokio::spawn(async move {
                node.run_inbound_connection(stream).await;
            });
        }
    }

    async fn run_inbound_connection(self: Arc<Node>, stream: TcpStream) {
        let timers = PeerTimers::default();
        let local = self.config.local_capabilities();
        let conn = Arc::new(PeerConnection::new(
            Direction::Receiver,
            timers,
            local,
            Arc::clone(&self.dict),
        ));

        let (mut reader, mut writer) = tokio::io::split(stream);
        let first = match Codec::decode(&mut reader, Arc::clone(&self.dict)).await {
            Ok(msg) => msg,
            Err(_) => return,
        };
        if first.get_command_code() != CommandCode::CapabilitiesExchange {
            return;
        }

        let accept = self.config.auto_add_peers
            || first
                .get_avp(AVP_ORIGIN_HOST)
                .map(|avp| avp.get_value().to_string())
                .map(|host| self.peers.lock().unwrap().contains_key(&host))
                .unwrap_or(false);

        let cea = match conn.on_cer_received(&first, accept, self.next_end_to_end_id()) {
            Ok(cea) => cea,
            Err(_) => return,
        };
        if Codec::encode(&mut writer, &cea).await.is_err() {
            return;
        }
        if !accept {
            return;
        }

        let origin_host = match first.get_avp(AVP_ORIGIN_HOST) {
            Some(avp) => avp.get_value().to_string(),
            None => return,
        };

        let peer = {
            let mut peers = self.peers.lock().unwrap();
            peers
                .entry(origin_host.clone())
                .or_insert_with(|| {
                    Arc::new(Peer::new(PeerConfig {
                        origin_host: origin_host.clone(),
                        realm: String::new(),
                        addresses: Vec::new(),
                        port: 0,
                        transport: TransportKind::Tcp,
                        persistent: false,
                        timers: PeerTimers::default(),
                    }))
                })
                .clone()
        };

        self.drive_connection(peer, conn, reader, writer).await;
    }

    async fn run_connection<S: AsyncRead + AsyncWrite + Send + Unpin + 'static>(
        self: Arc<Node>,
        peer: Arc<Peer>,
        stream: S,
        direction: Direction,
    ) {
        let timers = peer.config.lock().unwrap().timers.clone();
        let local = self.config.local_capabilities();
        let conn = Arc::new(PeerConnection::new(
            direction,
            timers,
            local,
            Arc::clone(&self.dict),
        ));

        let (mut reader, mut writer) = tokio::io::split(stream);
        let cer = conn.on_connected(conn.next_hop_by_hop_id(), self.next_end_to_end_id());
        if Codec::encode(&mut writer, &cer).await.is_err() {
            return;
        }

        self.drive_connection(peer, conn, reader, writer).await;
    }

    async fn drive_connection<R, W>(
        self: Arc<Node>,
        peer: Arc<Peer>,
        conn: Arc<PeerConnection>,
        mut reader: R,
        mut writer: W,
    ) where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<DiameterMessage>();
        *peer.outbound.lock().unwrap() = Some(tx);
        *peer.connection.lock().unwrap() = Some(Arc::clone(&conn));

        let mut idle_tick = tokio::time::interval(self.config.wakeup_interval);
        loop {
            tokio::select! {
                decoded = Codec::decode(&mut reader, Arc::clone(&self.dict)) => {
                    match decoded {
                        Ok(msg) => {
                            if !self.clone().handle_inbound(&peer, &conn, msg, &tx).await {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
                Some(out) = rx.recv() => {
                    if Codec::encode(&mut writer, &out).await.is_err() {
                        break;
                    }
                }
                _ = idle_tick.tick() => {
                    if conn.idle_elapsed_since_last_activity() {
                        match conn.on_idle_elapsed(conn.next_hop_by_hop_id(), self.next_end_to_end_id()) {
                            Action::Send(dwr) => {
                                if Codec::encode(&mut writer, &dwr).await.is_err() {
                                    break;
                                }
                            }
                            Action::CloseTransport(_) => break,
                            Action::None => {}
                        }
                    }
                }
            }
            if conn.state() == PeerState::Closed {
                break;
            }
        }

        *peer.connection.lock().unwrap() = None;
        *peer.outbound.lock().unwrap() = None;
        self.fail_pending_for_peer(&peer, &conn);
    }

    /// Returns `false` when the connection should be torn down.
    async fn handle_inbound(
        self: Arc<Node>,
        peer: &Arc<Peer>,
        conn: &Arc<PeerConnection>,
        msg: DiameterMessage,
        tx: &mpsc::UnboundedSender<DiameterMessage>,
    ) -> bool {
        match msg.get_command_code() {
            CommandCode::CapabilitiesExchange if !msg.is_request() => {
                matches!(conn.on_cea_received(&msg), Action::None)
            }
            CommandCode::DeviceWatchdog if msg.is_request() => {
                let dwa = conn.on_dwr_received(msg.get_hop_by_hop_id(), msg.get_end_to_end_id());
                tx.send(dwa).is_ok()
            }
            CommandCode::DeviceWatchdog => {
                matches!(conn.on_dwa_received(), Action::None)
            }
            CommandCode::DisconnectPeer if msg.is_request() => {
                let dpa = conn.on_dpr_received(msg.get_hop_by_hop_id(), msg.get_end_to_end_id());
                let _ = tx.send(dpa);
                false
            }
            CommandCode::DisconnectPeer => {
                conn.on_dpa_received();
                false
            }
            _ if !msg.is_request() => {
                self.complete_pending(peer, msg);
                true
            }
            _ => {
                self.dispatch_request(peer, msg, tx).await;
                true
            }
        }
    }

    async fn dispatch_request(
        self: Arc<Node>,
        peer: &Arc<Peer>,
        msg: DiameterMessage,
        tx: &mpsc::UnboundedSender<DiameterMessage>,
    ) {
        let request_type = msg.get_command_code().to_string();
        let started = Instant::now();
        let application_id = msg.get_application_id().code();
        let app = self.applications.lock().unwrap().get(&application_id).cloned();
        let answer = match app {
            Some(app) => {
                let fallback = msg.clone();
                match app.handle_request(msg).await {
                    Ok(answer) => answer,
                    Err(_) => default_answer(&fallback, RESULT_UNABLE_TO_COMPLY, &self.config),
                }
            }
            None => default_answer(&msg, RESULT_APPLICATION_UNSUPPORTED, &self.config),
        };
        peer.stats.record_request(request_type, started.elapsed());
        if let Some(result_code) = answer.get_avp(AVP_RESULT_CODE).and_then(|avp| avp.get_unsigned32()) {
            peer.stats.record_result(result_code);
        }
        let _ = tx.send(answer);
    }

    fn complete_pending(&self, peer: &Arc<Peer>, msg: DiameterMessage) {
        let key = (peer_key(peer), msg.get_hop_by_hop_id());
        let pending = self.pending.lock().unwrap().remove(&key);
        if let Some(pending) = pending {
            if pending.end_to_end_id != msg.get_end_to_end_id() {
                log::warn!("end-to-end id mismatch for hop-by-hop {}", msg.get_hop_by_hop_id());
                return;
            }
            let _ = pending.waiter.send(msg);
        }
    }

    fn fail_pending_for_peer(&self, peer: &Arc<Peer>, _conn: &Arc<PeerConnection>) {
        let host = peer_key(peer);
        let mut pending = self.pending.lock().unwrap();
        pending.retain(|(h, _), _| h != &host);
    }

    /// Chooses a READY peer for an outbound request per RFC 6733 §6.1.6:
    /// exact Destination-Host match first, else Destination-Realm filter,
    /// least-loaded among the remainder.
    fn route_request(&self, msg: &DiameterMessage) -> Result<Arc<Peer>> {
        let peers = self.peers.lock().unwrap();
        let application_id = msg.get_application_id().code();

        let ready: Vec<&Arc<Peer>> = peers
            .values()
            .filter(|p| p.is_ready())
            .filter(|p| {
                p.connection
                    .lock()
                    .unwrap()
                    .as_ref()
                    .map(|c| c.supports_application(application_id))
                    .unwrap_or(false)
            })
            .collect();

        if let Some(dest_host) = msg.get_avp(AVP_DESTINATION_HOST) {
            let dest_host = dest_host.get_value().to_string();
            return ready
                .into_iter()
                .find(|p| p.config.lock().unwrap().origin_host == dest_host)
                .cloned()
                .ok_or(Error::NoRoute);
        }

        let candidates: Vec<&Arc<Peer>> = if let Some(realm) = msg.get_avp(AVP_DESTINATION_REALM) {
            let realm = realm.get_value().to_string();
            ready
                .into_iter()
                .filter(|p| p.config.lock().unwrap().realm == realm)
                .collect()
        } else {
            ready
        };

        candidates
            .into_iter()
            .min_by_key(|p| p.in_flight.load(Ordering::Relaxed))
            .cloned()
            .ok_or(Error::NoRoute)
    }

    /// Sends `msg` to a routed peer and awaits the matching answer, or fails
    /// with `RequestTimeout` after `timeout` elapses.
    pub async fn send_request(
        self: &Arc<Node>,
        mut msg: DiameterMessage,
        timeout: Duration,
    ) -> Result<DiameterMessage> {
        let peer = self.route_request(&msg)?;
        let conn = peer
            .connection
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::NoRoute)?;

        let request_type = msg.get_command_code().to_string();
        let started = Instant::now();
        let hop_by_hop_id = conn.next_hop_by_hop_id();
        let end_to_end_id = self.next_end_to_end_id();
        msg = rebuild_with_ids(msg, hop_by_hop_id, end_to_end_id);

        let (tx, rx) = oneshot::channel();
        let key = (peer_key(&peer), hop_by_hop_id);
        self.pending.lock().unwrap().insert(
            key.clone(),
            PendingRequest {
                waiter: tx,
                end_to_end_id,
            },
        );
        peer.in_flight.fetch_add(1, Ordering::Relaxed);

        let sender = peer
            .outbound
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::NoRoute)?;
        if sender.send(msg).is_err() {
            self.pending.lock().unwrap().remove(&key);
            peer.in_flight.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::PeerDisconnected);
        }

        let result = tokio::time::timeout(timeout, rx).await;
        peer.in_flight.fetch_sub(1, Ordering::Relaxed);
        match result {
            Ok(Ok(answer)) => {
                peer.stats.record_request(request_type, started.elapsed());
                if let Some(result_code) =
                    answer.get_avp(AVP_RESULT_CODE).and_then(|avp| avp.get_unsigned32())
                {
                    peer.stats.record_result(result_code);
                }
                Ok(answer)
            }
            Ok(Err(_)) => Err(Error::PeerDisconnected),
            Err(_) => {
                self.pending.lock().unwrap().remove(&key);
                Err(Error::RequestTimeout)
            }
        }
    }

    /// Sends DPR to every OPEN peer and waits up to `timeout` for DPA or
    /// outbound-queue drain. `force` closes connections unconditionally
    /// after at most one `wakeup_interval`.
    pub async fn stop(self: &Arc<Node>, timeout: Duration, force: bool) {
        let peers: Vec<Arc<Peer>> = self.peers.lock().unwrap().values().cloned().collect();
        for peer in &peers {
            let conn = peer.connection.lock().unwrap().clone();
            let Some(conn) = conn else { continue };
            if conn.state() != PeerState::Open {
                continue;
            }
            let dpr = conn.start_disconnect(conn.next_hop_by_hop_id(), self.next_end_to_end_id());
            if let Some(tx) = peer.outbound.lock().unwrap().clone() {
                let _ = tx.send(dpr);
            }
        }

        let deadline = if force {
            self.config.wakeup_interval.min(timeout)
        } else {
            timeout
        };
        tokio::time::sleep(deadline).await;
    }
}

fn peer_key(peer: &Arc<Peer>) -> String {
    peer.config.lock().unwrap().origin_host.clone()
}

fn rebuild_with_ids(msg: DiameterMessage, hop_by_hop_id: u32, end_to_end_id: u32) -> DiameterMessage {
    let mut rebuilt = DiameterMessage::new(
        msg.get_command_code(),
        msg.get_application_id(),
        msg.get_flags(),
        hop_by_hop_id,
        end_to_end_id,
        Arc::clone(msg.dictionary()),
    );
    for avp in msg.avps() {
        rebuilt.add_avp(avp.clone());
    }
    rebuilt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::SyncApplication;
    use crate::avp::flags::M;
    use crate::avp::Identity;
    use crate::diameter::{flags, ApplicationId};
    use crate::dictionary::{self, Dictionary};
    use crate::peer::RESULT_SUCCESS;
    use std::collections::HashSet;

    fn dict() -> Arc<Dictionary> {
        Arc::new(Dictionary::new(&[&dictionary::DEFAULT_DICT_XML]))
    }

    fn node_config() -> NodeConfig {
        NodeConfig {
            origin_host: "node.example.net".into(),
            origin_realm: "example.net".into(),
            vendor_id: 10415,
            product_name: "diameter-stack".into(),
            ip_addresses: vec!["10.0.0.2".parse().unwrap()],
            tcp_port: 3868,
            sctp_port: 0,
            auth_application_ids: vec![4],
            acct_application_ids: vec![],
            wakeup_interval: Duration::from_secs(30),
            auto_add_peers: true,
        }
    }

    /// Builds a `Peer` already in `Open` state with `application_id`
    /// negotiated, no real socket attached. Good enough to exercise routing
    /// and request/answer correlation without running an event loop.
    fn open_peer(origin_host: &str, realm: &str, application_id: u32) -> Arc<Peer> {
        let peer = Arc::new(Peer::new(PeerConfig {
            origin_host: origin_host.into(),
            realm: realm.into(),
            addresses: vec!["127.0.0.1".parse().unwrap()],
            port: 3868,
            transport: TransportKind::Tcp,
            persistent: false,
            timers: PeerTimers::default(),
        }));
        let conn = PeerConnection::new(
            Direction::Sender,
            PeerTimers::default(),
            LocalCapabilities {
                origin_host: "node.example.net".into(),
                origin_realm: "example.net".into(),
                host_ip_addresses: vec![],
                vendor_id: 10415,
                product_name: "diameter-stack".into(),
                auth_application_ids: HashSet::from([application_id]),
                acct_application_ids: HashSet::new(),
            },
            dict(),
        );
        let _ = conn.on_connected(1, 1);
        let mut cea = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            0,
            1,
            1,
            dict(),
        );
        cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, crate::avp::Unsigned32::new(RESULT_SUCCESS)));
        cea.add_avp(crate::avp!(258, None, M, crate::avp::Unsigned32::new(application_id)));
        conn.on_cea_received(&cea);
        assert!(conn.is_ready());
        *peer.connection.lock().unwrap() = Some(Arc::new(conn));
        peer
    }

    fn request(application_id: ApplicationId, hop_by_hop: u32) -> DiameterMessage {
        DiameterMessage::new(
            CommandCode::CreditControl,
            application_id,
            flags::REQUEST,
            hop_by_hop,
            hop_by_hop,
            dict(),
        )
    }

    #[test]
    fn test_route_request_destination_host_exact_match() {
        let node = Node::new(node_config(), dict());
        let a = open_peer("a.example.net", "example.net", 4);
        let b = open_peer("b.example.net", "example.net", 4);
        node.peers.lock().unwrap().insert("a.example.net".into(), a);
        node.peers.lock().unwrap().insert("b.example.net".into(), b);

        let mut msg = request(ApplicationId::CreditControl, 1);
        msg.add_avp(crate::avp!(
            AVP_DESTINATION_HOST,
            None,
            M,
            Identity::new("b.example.net")
        ));

        let chosen = node.route_request(&msg).unwrap();
        assert_eq!(peer_key(&chosen), "b.example.net");
    }

    #[test]
    fn test_route_request_destination_host_without_application_support_fails_no_route() {
        let node = Node::new(node_config(), dict());
        // Ready, but only negotiated Accounting (3), not CreditControl (4).
        let b = open_peer("b.example.net", "example.net", 3);
        node.peers.lock().unwrap().insert("b.example.net".into(), b);

        let mut msg = request(ApplicationId::CreditControl, 1);
        msg.add_avp(crate::avp!(
            AVP_DESTINATION_HOST,
            None,
            M,
            Identity::new("b.example.net")
        ));

        assert!(matches!(node.route_request(&msg), Err(Error::NoRoute)));
    }

    #[test]
    fn test_route_request_destination_realm_least_in_flight() {
        let node = Node::new(node_config(), dict());
        let a = open_peer("a.example.net", "example.net", 4);
        let b = open_peer("b.example.net", "example.net", 4);
        a.in_flight.store(3, Ordering::Relaxed);
        node.peers.lock().unwrap().insert("a.example.net".into(), a);
        node.peers.lock().unwrap().insert("b.example.net".into(), b);

        let mut msg = request(ApplicationId::CreditControl, 1);
        msg.add_avp(crate::avp!(
            AVP_DESTINATION_REALM,
            None,
            M,
            Identity::new("example.net")
        ));

        let chosen = node.route_request(&msg).unwrap();
        assert_eq!(peer_key(&chosen), "b.example.net");
    }

    #[test]
    fn test_route_request_no_candidates_fails_with_no_route() {
        let node = Node::new(node_config(), dict());
        let msg = request(ApplicationId::CreditControl, 1);
        assert!(matches!(node.route_request(&msg), Err(Error::NoRoute)));
    }

    #[tokio::test]
    async fn test_send_request_times_out_when_unanswered() {
        let node = Node::new(node_config(), dict());
        let peer = open_peer("a.example.net", "example.net", 4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        *peer.outbound.lock().unwrap() = Some(tx);
        node.peers.lock().unwrap().insert("a.example.net".into(), peer);

        let msg = request(ApplicationId::CreditControl, 1);
        let result = node.send_request(msg, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(Error::RequestTimeout)));
        assert!(rx.try_recv().is_ok());
        assert!(node.pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_request_unknown_application_answers_3007() {
        let node = Node::new(node_config(), dict());
        let peer = open_peer("a.example.net", "example.net", 4);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let msg = request(ApplicationId::CreditControl, 9);

        node.dispatch_request(&peer, msg, &tx).await;
        let answer = rx.try_recv().unwrap();
        assert_eq!(
            answer.get_avp(AVP_RESULT_CODE).unwrap().get_unsigned32(),
            Some(RESULT_APPLICATION_UNSUPPORTED)
        );
        assert_eq!(
            peer.stats.result_code_buckets(Duration::from_secs(60)).r3xxx,
            1
        );
    }

    #[tokio::test]
    async fn test_dispatch_request_registered_application_runs_handler() {
        let node = Node::new(node_config(), dict());
        let peer = open_peer("a.example.net", "example.net", 4);
        node.register_application(
            4,
            Arc::new(SyncApplication::new(|req: DiameterMessage| {
                let mut answer = DiameterMessage::new(
                    req.get_command_code(),
                    req.get_application_id(),
                    0,
                    req.get_hop_by_hop_id(),
                    req.get_end_to_end_id(),
                    Arc::clone(req.dictionary()),
                );
                answer.add_avp(crate::avp!(
                    AVP_RESULT_CODE,
                    None,
                    M,
                    crate::avp::Unsigned32::new(RESULT_SUCCESS)
                ));
                Ok(answer)
            })),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let msg = request(ApplicationId::CreditControl, 9);

        node.dispatch_request(&peer, msg, &tx).await;
        let answer = rx.try_recv().unwrap();
        assert_eq!(
            answer.get_avp(AVP_RESULT_CODE).unwrap().get_unsigned32(),
            Some(RESULT_SUCCESS)
        );
        assert_eq!(peer.stats.average_response_time("CreditControl").is_some(), true);
    }
}

