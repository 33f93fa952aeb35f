//! Peer connection state machine: capabilities exchange, watchdog keep-alive,
//! and orderly disconnect, per RFC 6733 §5.

use crate::avp::flags::M;
use crate::avp::{Enumerated, Grouped, Identity, Unsigned32};
use crate::diameter::{flags, ApplicationId, CommandCode, DiameterMessage};
use crate::dictionary::Dictionary;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

pub const RESULT_SUCCESS: u32 = 2001;
pub const RESULT_COMMAND_UNSUPPORTED: u32 = 3001;
pub const RESULT_APPLICATION_UNSUPPORTED: u32 = 3007;
pub const RESULT_INVALID_HDR_BITS: u32 = 3008;
pub const RESULT_UNKNOWN_PEER: u32 = 3010;
pub const RESULT_UNABLE_TO_COMPLY: u32 = 5012;
pub const RESULT_MISSING_AVP: u32 = 5005;

const AVP_SESSION_ID: u32 = 263;
const AVP_ORIGIN_HOST: u32 = 264;
const AVP_ORIGIN_REALM: u32 = 296;
const AVP_HOST_IP_ADDRESS: u32 = 257;
const AVP_VENDOR_ID: u32 = 266;
const AVP_PRODUCT_NAME: u32 = 269;
const AVP_RESULT_CODE: u32 = 268;
const AVP_AUTH_APPLICATION_ID: u32 = 258;
const AVP_ACCT_APPLICATION_ID: u32 = 259;
const AVP_VENDOR_SPECIFIC_APPLICATION_ID: u32 = 260;
const AVP_DISCONNECT_CAUSE: u32 = 273;

/// Direction a `PeerConnection` was established in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sender,
    Receiver,
}

/// RFC 6733 §5.6 peer state machine states, collapsed to the subset this
/// crate drives directly (the RFC's Elect/R-Open/I-Open split into a single
/// negotiated `Open`, since this crate has no election tie-break to make).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Closed,
    WaitConnAck,
    WaitCea,
    WaitCer,
    Open,
    OpenPendingDwa,
    Closing,
}

impl PeerState {
    pub fn is_ready(self) -> bool {
        matches!(self, PeerState::Open | PeerState::OpenPendingDwa)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Transport,
    CeaTimeout,
    CapabilityMismatch,
    DwaTimeout,
    DpaTimeout,
    LocalShutdown,
    PeerDpr,
}

#[derive(Debug, Clone)]
pub struct PeerTimers {
    pub cea: Duration,
    pub cer: Duration,
    pub dwa: Duration,
    pub idle: Duration,
    pub reconnect_wait: Duration,
    pub always_reconnect: bool,
}

impl Default for PeerTimers {
    fn default() -> PeerTimers {
        PeerTimers {
            cea: Duration::from_secs(10),
            cer: Duration::from_secs(10),
            dwa: Duration::from_secs(6),
            idle: Duration::from_secs(30),
            reconnect_wait: Duration::from_secs(30),
            always_reconnect: false,
        }
    }
}

/// What a state transition asks the caller (the node's event loop) to do.
#[derive(Debug)]
pub enum Action {
    Send(DiameterMessage),
    CloseTransport(DisconnectReason),
    None,
}

/// Local node identity and offered applications, presented in CER/CEA.
#[derive(Debug, Clone)]
pub struct LocalCapabilities {
    pub origin_host: String,
    pub origin_realm: String,
    pub host_ip_addresses: Vec<IpAddr>,
    pub vendor_id: u32,
    pub product_name: String,
    pub auth_application_ids: HashSet<u32>,
    pub acct_application_ids: HashSet<u32>,
}

/// Adds one Auth/Acct-Application-Id AVP per id in `ids` (`code` is
/// `AVP_AUTH_APPLICATION_ID` or `AVP_ACCT_APPLICATION_ID`). An id whose
/// `ApplicationId::vendor_id()` is `Some` is wrapped in a
/// Vendor-Specific-Application-Id grouped AVP instead of a bare one.
fn add_application_ids(msg: &mut DiameterMessage, code: u32, ids: &HashSet<u32>) {
    for id in ids {
        match ApplicationId::from_code(*id).vendor_id() {
            Some(vendor_id) => {
                let mut vsai = Grouped::new(vec![]);
                vsai.add_avp(AVP_VENDOR_ID, None, M, Unsigned32::new(vendor_id).into());
                vsai.add_avp(code, None, M, Unsigned32::new(*id).into());
                msg.add_avp(crate::avp!(AVP_VENDOR_SPECIFIC_APPLICATION_ID, None, M, vsai));
            }
            None => {
                msg.add_avp(crate::avp!(code, None, M, Unsigned32::new(*id)));
            }
        }
    }
}

/// Reads every `code` application id out of `msg`, both bare AVPs and ones
/// nested inside a Vendor-Specific-Application-Id grouped AVP.
fn extract_application_ids(msg: &DiameterMessage, code: u32) -> HashSet<u32> {
    msg.find_avps(code)
        .into_iter()
        .filter_map(|avp| avp.get_unsigned32())
        .collect()
}

/// Drives one peer connection's protocol-level state. Pure with respect to
/// I/O: callers feed it received protocol messages and timer ticks, and it
/// returns an `Action` describing what to send or whether to close.
pub struct PeerConnection {
    pub direction: Direction,
    state: Mutex<PeerState>,
    timers: PeerTimers,
    local: LocalCapabilities,
    negotiated_auth: Mutex<HashSet<u32>>,
    negotiated_acct: Mutex<HashSet<u32>>,
    hop_by_hop_seq: AtomicU32,
    last_activity: Mutex<Instant>,
    disconnect_reason: Mutex<Option<DisconnectReason>>,
    dict: Arc<Dictionary>,
}

impl PeerConnection {
    pub fn new(
        direction: Direction,
        timers: PeerTimers,
        local: LocalCapabilities,
        dict: Arc<Dictionary>,
    ) -> PeerConnection {
        let initial_state = match direction {
            Direction::Sender => PeerState::WaitConnAck,
            Direction::Receiver => PeerState::WaitCer,
        };
        PeerConnection {
            direction,
            state: Mutex::new(initial_state),
            timers,
            local,
            negotiated_auth: Mutex::new(HashSet::new()),
            negotiated_acct: Mutex::new(HashSet::new()),
            hop_by_hop_seq: AtomicU32::new(rand::random()),
            last_activity: Mutex::new(Instant::now()),
            disconnect_reason: Mutex::new(None),
            dict,
        }
    }

    pub fn state(&self) -> PeerState {
        *self.state.lock().unwrap()
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        *self.disconnect_reason.lock().unwrap()
    }

    pub fn negotiated_auth_application_ids(&self) -> HashSet<u32> {
        self.negotiated_auth.lock().unwrap().clone()
    }

    pub fn negotiated_acct_application_ids(&self) -> HashSet<u32> {
        self.negotiated_acct.lock().unwrap().clone()
    }

    pub fn supports_application(&self, application_id: u32) -> bool {
        self.negotiated_auth.lock().unwrap().contains(&application_id)
            || self.negotiated_acct.lock().unwrap().contains(&application_id)
    }

    /// Returns the next hop-by-hop id on this connection, seeded randomly
    /// and monotonic for the life of the connection.
    pub fn next_hop_by_hop_id(&self) -> u32 {
        self.hop_by_hop_seq.fetch_add(1, Ordering::Relaxed)
    }

    fn touch(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    fn transition(&self, state: PeerState) {
        *self.state.lock().unwrap() = state;
    }

    fn fail(&self, reason: DisconnectReason) -> Action {
        *self.disconnect_reason.lock().unwrap() = Some(reason);
        self.transition(PeerState::Closed);
        Action::CloseTransport(reason)
    }

    fn capabilities_message(
        &self,
        code: CommandCode,
        request: bool,
        hop_by_hop_id: u32,
        end_to_end_id: u32,
    ) -> DiameterMessage {
        let msg_flags = if request { flags::REQUEST } else { 0 };
        let mut msg = DiameterMessage::new(
            code,
            ApplicationId::Common,
            msg_flags,
            hop_by_hop_id,
            end_to_end_id,
            Arc::clone(&self.dict),
        );
        msg.add_avp(crate::avp!(
            AVP_ORIGIN_HOST,
            None,
            M,
            Identity::new(self.local.origin_host.clone())
        ));
        msg.add_avp(crate::avp!(
            AVP_ORIGIN_REALM,
            None,
            M,
            Identity::new(self.local.origin_realm.clone())
        ));
        msg
    }

    /// Builds the CER to send after the outbound transport connects.
    /// Transitions `WAIT_CONN_ACK` -> `WAIT_CEA`.
    pub fn on_connected(&self, hop_by_hop_id: u32, end_to_end_id: u32) -> DiameterMessage {
        let mut cer = self.capabilities_message(
            CommandCode::CapabilitiesExchange,
            true,
            hop_by_hop_id,
            end_to_end_id,
        );
        for ip in &self.local.host_ip_addresses {
            let value = match ip {
                IpAddr::V4(v4) => crate::avp::Address::new(crate::avp::address::Value::IPv4(*v4)),
                IpAddr::V6(v6) => crate::avp::Address::new(crate::avp::address::Value::IPv6(*v6)),
            };
            cer.add_avp(crate::avp!(AVP_HOST_IP_ADDRESS, None, M, value));
        }
        cer.add_avp(crate::avp!(
            AVP_VENDOR_ID,
            None,
            M,
            Unsigned32::new(self.local.vendor_id)
        ));
        cer.add_avp(crate::avp!(
            AVP_PRODUCT_NAME,
            None,
            0,
            crate::avp::UTF8String::new(self.local.product_name.clone())
        ));
        add_application_ids(&mut cer, AVP_AUTH_APPLICATION_ID, &self.local.auth_application_ids);
        add_application_ids(&mut cer, AVP_ACCT_APPLICATION_ID, &self.local.acct_application_ids);
        self.transition(PeerState::WaitCea);
        self.touch();
        cer
    }

    /// Handles an inbound CER on the receiver side. Returns the CEA to send.
    /// `accept` decides whether an unknown origin-host is allowed to connect.
    pub fn on_cer_received(
        &self,
        cer: &DiameterMessage,
        accept: bool,
        end_to_end_id: u32,
    ) -> Result<DiameterMessage> {
        let hop_by_hop_id = cer.get_hop_by_hop_id();
        if !accept {
            let mut cea = self.capabilities_message(
                CommandCode::CapabilitiesExchange,
                false,
                hop_by_hop_id,
                end_to_end_id,
            );
            cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_UNKNOWN_PEER)));
            self.transition(PeerState::Closing);
            return Ok(cea);
        }

        let peer_auth = extract_application_ids(cer, AVP_AUTH_APPLICATION_ID);
        let peer_acct = extract_application_ids(cer, AVP_ACCT_APPLICATION_ID);
        *self.negotiated_auth.lock().unwrap() = peer_auth;
        *self.negotiated_acct.lock().unwrap() = peer_acct;

        let mut cea = self.capabilities_message(
            CommandCode::CapabilitiesExchange,
            false,
            hop_by_hop_id,
            end_to_end_id,
        );
        cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_SUCCESS)));
        add_application_ids(&mut cea, AVP_AUTH_APPLICATION_ID, &self.local.auth_application_ids);
        add_application_ids(&mut cea, AVP_ACCT_APPLICATION_ID, &self.local.acct_application_ids);

        self.transition(PeerState::Open);
        self.touch();
        Ok(cea)
    }

    /// Handles an inbound CEA on the sender side. Negotiated application ids
    /// are the intersection of locally offered and peer-advertised ids
    /// (including ones nested in Vendor-Specific-Application-Id). Transitions
    /// to `Open` only if that intersection is non-empty.
    pub fn on_cea_received(&self, cea: &DiameterMessage) -> Action {
        let result_code = cea.get_avp(AVP_RESULT_CODE).and_then(|avp| avp.get_unsigned32());
        if result_code != Some(RESULT_SUCCESS) {
            return self.fail(DisconnectReason::CeaTimeout);
        }

        let peer_auth = extract_application_ids(cea, AVP_AUTH_APPLICATION_ID);
        let peer_acct = extract_application_ids(cea, AVP_ACCT_APPLICATION_ID);

        let auth: HashSet<u32> = self
            .local
            .auth_application_ids
            .intersection(&peer_auth)
            .copied()
            .collect();
        let acct: HashSet<u32> = self
            .local
            .acct_application_ids
            .intersection(&peer_acct)
            .copied()
            .collect();

        if auth.is_empty() && acct.is_empty() {
            let peer_host = cea
                .get_avp(AVP_ORIGIN_HOST)
                .map(|avp| avp.get_value().to_string())
                .unwrap_or_default();
            log::warn!(
                "{}",
                Error::CapabilityMismatch(format!("no overlapping application ids with {}", peer_host))
            );
            return self.fail(DisconnectReason::CapabilityMismatch);
        }

        *self.negotiated_auth.lock().unwrap() = auth;
        *self.negotiated_acct.lock().unwrap() = acct;

        self.transition(PeerState::Open);
        self.touch();
        Action::None
    }

    /// Idle timer expired: sends a DWR and moves to `OPEN_PENDING_DWA`, or
    /// (if already pending) the DWA timer expired and the connection closes.
    pub fn on_idle_elapsed(&self, hop_by_hop_id: u32, end_to_end_id: u32) -> Action {
        match self.state() {
            PeerState::Open => {
                let dwr = self.capabilities_message(
                    CommandCode::DeviceWatchdog,
                    true,
                    hop_by_hop_id,
                    end_to_end_id,
                );
                self.transition(PeerState::OpenPendingDwa);
                Action::Send(dwr)
            }
            PeerState::OpenPendingDwa => self.fail(DisconnectReason::DwaTimeout),
            _ => Action::None,
        }
    }

    pub fn idle_elapsed_since_last_activity(&self) -> bool {
        self.last_activity.lock().unwrap().elapsed() >= self.timers.idle
    }

    pub fn on_dwr_received(&self, hop_by_hop_id: u32, end_to_end_id: u32) -> DiameterMessage {
        self.touch();
        let mut dwa = self.capabilities_message(
            CommandCode::DeviceWatchdog,
            false,
            hop_by_hop_id,
            end_to_end_id,
        );
        dwa.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_SUCCESS)));
        dwa
    }

    pub fn on_dwa_received(&self) -> Action {
        self.touch();
        if self.state() == PeerState::OpenPendingDwa {
            self.transition(PeerState::Open);
        }
        Action::None
    }

    /// Initiates an orderly local shutdown, returning the DPR to send.
    pub fn start_disconnect(&self, hop_by_hop_id: u32, end_to_end_id: u32) -> DiameterMessage {
        let mut dpr = self.capabilities_message(
            CommandCode::DisconnectPeer,
            true,
            hop_by_hop_id,
            end_to_end_id,
        );
        dpr.add_avp(crate::avp!(AVP_DISCONNECT_CAUSE, None, M, Enumerated::new(0)));
        self.transition(PeerState::Closing);
        dpr
    }

    pub fn on_dpr_received(&self, hop_by_hop_id: u32, end_to_end_id: u32) -> DiameterMessage {
        let mut dpa = self.capabilities_message(
            CommandCode::DisconnectPeer,
            false,
            hop_by_hop_id,
            end_to_end_id,
        );
        dpa.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_SUCCESS)));
        *self.disconnect_reason.lock().unwrap() = Some(DisconnectReason::PeerDpr);
        self.transition(PeerState::Closing);
        dpa
    }

    pub fn on_dpa_received(&self) -> Action {
        self.transition(PeerState::Closed);
        Action::CloseTransport(
            self.disconnect_reason()
                .unwrap_or(DisconnectReason::LocalShutdown),
        )
    }

    pub fn on_transport_error(&self) -> Action {
        self.fail(DisconnectReason::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{self, Dictionary};

    fn local(auth: &[u32]) -> LocalCapabilities {
        LocalCapabilities {
            origin_host: "client.example.net".into(),
            origin_realm: "example.net".into(),
            host_ip_addresses: vec!["10.0.0.1".parse().unwrap()],
            vendor_id: 10415,
            product_name: "diameter-stack".into(),
            auth_application_ids: auth.iter().copied().collect(),
            acct_application_ids: HashSet::new(),
        }
    }

    fn dict() -> Arc<Dictionary> {
        Arc::new(Dictionary::new(&[&dictionary::DEFAULT_DICT_XML]))
    }

    #[test]
    fn test_sender_handshake_reaches_open() {
        let conn = PeerConnection::new(
            Direction::Sender,
            PeerTimers::default(),
            local(&[4]),
            dict(),
        );
        assert_eq!(conn.state(), PeerState::WaitConnAck);

        let cer = conn.on_connected(1, 1);
        assert_eq!(conn.state(), PeerState::WaitCea);
        assert!(cer.is_request());

        let mut cea = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            0,
            1,
            1,
            dict(),
        );
        cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_SUCCESS)));
        cea.add_avp(crate::avp!(AVP_AUTH_APPLICATION_ID, None, M, Unsigned32::new(4)));

        conn.on_cea_received(&cea);
        assert_eq!(conn.state(), PeerState::Open);
        assert!(conn.is_ready());
        assert!(conn.supports_application(4));
    }

    #[test]
    fn test_cea_failure_closes() {
        let conn = PeerConnection::new(
            Direction::Sender,
            PeerTimers::default(),
            local(&[4]),
            dict(),
        );
        conn.on_connected(1, 1);

        let mut cea = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            0,
            1,
            1,
            dict(),
        );
        cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(5012)));

        let action = conn.on_cea_received(&cea);
        assert_eq!(conn.state(), PeerState::Closed);
        assert!(matches!(action, Action::CloseTransport(DisconnectReason::CeaTimeout)));
    }

    #[test]
    fn test_receiver_accepts_cer() {
        let conn = PeerConnection::new(
            Direction::Receiver,
            PeerTimers::default(),
            local(&[4]),
            dict(),
        );
        let mut cer = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            flags::REQUEST,
            1,
            1,
            dict(),
        );
        cer.add_avp(crate::avp!(AVP_AUTH_APPLICATION_ID, None, M, Unsigned32::new(4)));

        let cea = conn.on_cer_received(&cer, true, 1).unwrap();
        assert_eq!(conn.state(), PeerState::Open);
        assert_eq!(cea.get_avp(AVP_RESULT_CODE).unwrap().get_unsigned32(), Some(RESULT_SUCCESS));
        assert!(conn.supports_application(4));
    }

    #[test]
    fn test_receiver_rejects_unknown_peer() {
        let conn = PeerConnection::new(
            Direction::Receiver,
            PeerTimers::default(),
            local(&[4]),
            dict(),
        );
        let cer = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            flags::REQUEST,
            1,
            1,
            dict(),
        );
        let cea = conn.on_cer_received(&cer, false, 1).unwrap();
        assert_eq!(
            cea.get_avp(AVP_RESULT_CODE).unwrap().get_unsigned32(),
            Some(RESULT_UNKNOWN_PEER)
        );
        assert_eq!(conn.state(), PeerState::Closing);
    }

    #[test]
    fn test_watchdog_round_trip() {
        let conn = PeerConnection::new(
            Direction::Sender,
            PeerTimers::default(),
            local(&[4]),
            dict(),
        );
        conn.on_connected(1, 1);
        let mut cea = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            0,
            1,
            1,
            dict(),
        );
        cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_SUCCESS)));
        cea.add_avp(crate::avp!(AVP_AUTH_APPLICATION_ID, None, M, Unsigned32::new(4)));
        conn.on_cea_received(&cea);

        let action = conn.on_idle_elapsed(2, 2);
        assert_eq!(conn.state(), PeerState::OpenPendingDwa);
        assert!(matches!(action, Action::Send(_)));

        let action = conn.on_dwa_received();
        assert_eq!(conn.state(), PeerState::Open);
        assert!(matches!(action, Action::None));
    }

    #[test]
    fn test_dwa_timeout_closes() {
        let conn = PeerConnection::new(
            Direction::Sender,
            PeerTimers::default(),
            local(&[4]),
            dict(),
        );
        conn.on_connected(1, 1);
        let mut cea = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            0,
            1,
            1,
            dict(),
        );
        cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_SUCCESS)));
        cea.add_avp(crate::avp!(AVP_AUTH_APPLICATION_ID, None, M, Unsigned32::new(4)));
        conn.on_cea_received(&cea);
        conn.on_idle_elapsed(2, 2);

        let action = conn.on_idle_elapsed(3, 3);
        assert_eq!(conn.state(), PeerState::Closed);
        assert!(matches!(
            action,
            Action::CloseTransport(DisconnectReason::DwaTimeout)
        ));
    }

    #[test]
    fn test_local_shutdown_then_dpa_closes() {
        let conn = PeerConnection::new(
            Direction::Sender,
            PeerTimers::default(),
            local(&[4]),
            dict(),
        );
        conn.on_connected(1, 1);
        let mut cea = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            0,
            1,
            1,
            dict(),
        );
        cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_SUCCESS)));
        cea.add_avp(crate::avp!(AVP_AUTH_APPLICATION_ID, None, M, Unsigned32::new(4)));
        conn.on_cea_received(&cea);

        let dpr = conn.start_disconnect(5, 5);
        assert_eq!(conn.state(), PeerState::Closing);
        assert!(dpr.is_request());

        let action = conn.on_dpa_received();
        assert_eq!(conn.state(), PeerState::Closed);
        assert!(matches!(action, Action::CloseTransport(_)));
    }

    #[test]
    fn test_cea_with_no_overlapping_application_ids_fails_capability_mismatch() {
        let conn = PeerConnection::new(
            Direction::Sender,
            PeerTimers::default(),
            local(&[4]),
            dict(),
        );
        conn.on_connected(1, 1);

        let mut cea = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            0,
            1,
            1,
            dict(),
        );
        cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_SUCCESS)));
        cea.add_avp(crate::avp!(AVP_AUTH_APPLICATION_ID, None, M, Unsigned32::new(16777238)));

        let action = conn.on_cea_received(&cea);
        assert_eq!(conn.state(), PeerState::Closed);
        assert!(matches!(
            action,
            Action::CloseTransport(DisconnectReason::CapabilityMismatch)
        ));
        assert!(!conn.is_ready());
    }

    #[test]
    fn test_cea_negotiates_vendor_specific_application_id() {
        let conn = PeerConnection::new(
            Direction::Sender,
            PeerTimers::default(),
            local(&[16777238]), // Gx, vendor 10415
            dict(),
        );
        let cer = conn.on_connected(1, 1);
        let vsai = cer.get_avp(AVP_VENDOR_SPECIFIC_APPLICATION_ID).unwrap();
        let grouped = vsai.get_grouped().unwrap();
        assert!(grouped
            .avps()
            .iter()
            .any(|avp| avp.get_code() == AVP_VENDOR_ID && avp.get_unsigned32() == Some(10415)));
        assert!(grouped.avps().iter().any(
            |avp| avp.get_code() == AVP_AUTH_APPLICATION_ID && avp.get_unsigned32() == Some(16777238)
        ));

        let mut cea = DiameterMessage::new(
            CommandCode::CapabilitiesExchange,
            ApplicationId::Common,
            0,
            1,
            1,
            dict(),
        );
        cea.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(RESULT_SUCCESS)));
        let mut peer_vsai = Grouped::new(vec![]);
        peer_vsai.add_avp(AVP_VENDOR_ID, None, M, Unsigned32::new(10415).into());
        peer_vsai.add_avp(AVP_AUTH_APPLICATION_ID, None, M, Unsigned32::new(16777238).into());
        cea.add_avp(crate::avp!(AVP_VENDOR_SPECIFIC_APPLICATION_ID, None, M, peer_vsai));

        conn.on_cea_received(&cea);
        assert_eq!(conn.state(), PeerState::Open);
        assert!(conn.supports_application(16777238));
    }
}
