//! In-memory transport for exercising session flows without a media engine

use super::peer::{CandidateSet, PeerSession, Transport};
use super::{SessionError, SignalingMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Records the order of engine operations and can be told to fail one of
/// them, so tests can check both the happy path and failure handling.
pub(crate) struct StubTransport {
    pub(crate) candidates: Arc<CandidateSet>,
    pub(crate) gathered: Vec<String>,
    pub(crate) local: Mutex<Option<SignalingMessage>>,
    pub(crate) remote: Mutex<Option<SignalingMessage>>,
    pub(crate) ops: Mutex<Vec<&'static str>>,
    pub(crate) fail_on: Option<&'static str>,
    closed: AtomicBool,
}

impl StubTransport {
    pub(crate) fn new(candidates: Arc<CandidateSet>) -> Self {
        Self {
            candidates,
            gathered: vec!["candidate:1 1 udp 2130706431 192.0.2.1 5000 typ host".to_string()],
            local: Mutex::new(None),
            remote: Mutex::new(None),
            ops: Mutex::new(Vec::new()),
            fail_on: None,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn failing(candidates: Arc<CandidateSet>, op: &'static str) -> Self {
        let mut stub = Self::new(candidates);
        stub.fail_on = Some(op);
        stub
    }

    pub(crate) fn op_index(&self, op: &'static str) -> Option<usize> {
        self.ops.lock().unwrap().iter().position(|o| *o == op)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn log(&self, op: &'static str) -> Result<(), SessionError> {
        self.ops.lock().unwrap().push(op);
        if self.fail_on == Some(op) {
            return Err(SessionError::SdpError(format!("stub failed {}", op)));
        }
        Ok(())
    }
}

impl Transport for StubTransport {
    async fn create_offer(&self) -> Result<String, SessionError> {
        self.log("create_offer")?;
        Ok("v=0\r\nstub offer".to_string())
    }

    async fn create_answer(&self) -> Result<String, SessionError> {
        self.log("create_answer")?;
        Ok("v=0\r\nstub answer".to_string())
    }

    async fn set_local_description(&self, desc: &SignalingMessage) -> Result<(), SessionError> {
        self.log("set_local_description")?;
        *self.local.lock().unwrap() = Some(desc.clone());
        Ok(())
    }

    async fn set_remote_description(&self, desc: &SignalingMessage) -> Result<(), SessionError> {
        self.log("set_remote_description")?;
        *self.remote.lock().unwrap() = Some(desc.clone());
        Ok(())
    }

    async fn wait_gathering_complete(&self) {
        let _ = self.log("gathering_complete");
        for c in &self.gathered {
            self.candidates.record(c.clone());
        }
    }

    async fn local_description(&self) -> Option<SignalingMessage> {
        let _ = self.log("local_description");
        self.local.lock().unwrap().clone()
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.log("close")?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Session wired to a fresh stub transport
pub(crate) fn stub_session() -> PeerSession<StubTransport> {
    let candidates = Arc::new(CandidateSet::new());
    PeerSession::new(StubTransport::new(Arc::clone(&candidates)), candidates)
}

/// Session whose transport fails the named operation
pub(crate) fn failing_session(op: &'static str) -> PeerSession<StubTransport> {
    let candidates = Arc::new(CandidateSet::new());
    PeerSession::new(
        StubTransport::failing(Arc::clone(&candidates), op),
        candidates,
    )
}
