//! Application-level request handling: the handler trait two built-in
//! executors, and default-answer construction for the error paths in
//! RFC 6733 §7 that a `Node` generates on the application's behalf.

use crate::avp::flags::M;
use crate::avp::{Identity, Unsigned32};
use crate::diameter::{ApplicationId, CommandCode, DiameterMessage};
use crate::error::{Error, Result};
use crate::node::NodeConfig;
use std::sync::Arc;
use tokio::sync::Semaphore;

const AVP_SESSION_ID: u32 = 263;
const AVP_ORIGIN_HOST: u32 = 264;
const AVP_ORIGIN_REALM: u32 = 296;
const AVP_RESULT_CODE: u32 = 268;
const AVP_PROXY_INFO: u32 = 284;
const AVP_ROUTE_RECORD: u32 = 282;

/// Handles inbound requests for one application-id. Implementations decide
/// their own concurrency model; `SyncApplication` runs inline, in the
/// connection's own task, `WorkerPoolApplication` hands off to a bounded
/// pool of blocking workers.
#[async_trait::async_trait]
pub trait Application: Send + Sync {
    async fn handle_request(&self, request: DiameterMessage) -> Result<DiameterMessage>;
}

/// Runs the handler inline. Suitable for handlers that don't block --
/// anything that does will stall the connection's read/write loop.
pub struct SyncApplication<F> {
    handler: F,
}

impl<F> SyncApplication<F>
where
    F: Fn(DiameterMessage) -> Result<DiameterMessage> + Send + Sync,
{
    pub fn new(handler: F) -> SyncApplication<F> {
        SyncApplication { handler }
    }
}

#[async_trait::async_trait]
impl<F> Application for SyncApplication<F>
where
    F: Fn(DiameterMessage) -> Result<DiameterMessage> + Send + Sync,
{
    async fn handle_request(&self, request: DiameterMessage) -> Result<DiameterMessage> {
        (self.handler)(request)
    }
}

/// Runs the handler on a bounded pool of blocking workers, so a slow
/// handler (a database call, a CPU-bound computation) can't stall other
/// peers' connections.
pub struct WorkerPoolApplication<F> {
    handler: Arc<F>,
    semaphore: Arc<Semaphore>,
}

impl<F> WorkerPoolApplication<F>
where
    F: Fn(DiameterMessage) -> Result<DiameterMessage> + Send + Sync + 'static,
{
    pub fn new(handler: F, workers: usize) -> WorkerPoolApplication<F> {
        WorkerPoolApplication {
            handler: Arc::new(handler),
            semaphore: Arc::new(Semaphore::new(workers)),
        }
    }
}

#[async_trait::async_trait]
impl<F> Application for WorkerPoolApplication<F>
where
    F: Fn(DiameterMessage) -> Result<DiameterMessage> + Send + Sync + 'static,
{
    async fn handle_request(&self, request: DiameterMessage) -> Result<DiameterMessage> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::ServerError("worker pool closed".into()))?;
        let handler = Arc::clone(&self.handler);
        let result = tokio::task::spawn_blocking(move || handler(request))
            .await
            .map_err(|e| Error::ServerError(format!("worker pool task panicked: {e}")));
        drop(permit);
        result?
    }
}

/// Builds a default answer for `request`: same command/application/ids,
/// `Result-Code` set to `result_code`, Session-Id echoed back if present,
/// Origin-Host/Origin-Realm set to this node's identity, and any
/// Proxy-Info/Route-Record AVPs echoed per RFC 6733 §6.1.8/§6.5.1.
pub fn default_answer(
    request: &DiameterMessage,
    result_code: u32,
    config: &NodeConfig,
) -> DiameterMessage {
    let mut answer = DiameterMessage::new(
        request.get_command_code(),
        request.get_application_id(),
        0,
        request.get_hop_by_hop_id(),
        request.get_end_to_end_id(),
        Arc::clone(request.dictionary()),
    );

    if let Some(session_id) = request.get_avp(AVP_SESSION_ID) {
        answer.add_avp(session_id.clone());
    }
    answer.add_avp(crate::avp!(
        AVP_ORIGIN_HOST,
        None,
        M,
        Identity::new(config.origin_host.clone())
    ));
    answer.add_avp(crate::avp!(
        AVP_ORIGIN_REALM,
        None,
        M,
        Identity::new(config.origin_realm.clone())
    ));
    answer.add_avp(crate::avp!(AVP_RESULT_CODE, None, M, Unsigned32::new(result_code)));
    for avp in request.get_avps(AVP_PROXY_INFO) {
        answer.add_avp(avp.clone());
    }
    for avp in request.get_avps(AVP_ROUTE_RECORD) {
        answer.add_avp(avp.clone());
    }
    answer
}
