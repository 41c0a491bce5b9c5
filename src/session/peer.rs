//! Peer session state machine
//!
//! Owns the local/remote description lifecycle. The one correctness-critical
//! synchronization point lives here: the local description snapshot is taken
//! only after the transport reports gathering-complete, because there is no
//! trickle path for candidates discovered later.

#![allow(dead_code)]

use super::{SessionError, SignalingMessage};
use log::{debug, info, warn};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle of a peer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no descriptions set
    New,
    /// Remote offer applied (answerer only)
    RemoteDescSet,
    /// Local description created and applied
    LocalDescSet,
    /// Candidate gathering in progress
    Gathering,
    /// Local description finalized after gathering completed
    LocalFinal,
    /// Both descriptions in place
    Established,
    /// Torn down by explicit stop
    Closed,
    /// Terminal negotiation failure
    Failed,
}

impl SessionState {
    /// Legal forward transitions; everything else is rejected
    fn can_advance(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (New, RemoteDescSet)
                | (New, LocalDescSet)
                | (RemoteDescSet, LocalDescSet)
                | (LocalDescSet, Gathering)
                | (Gathering, LocalFinal)
                | (LocalFinal, Established)
        )
    }

    /// States from which no further negotiation is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::New => "new",
            SessionState::RemoteDescSet => "remote-description-set",
            SessionState::LocalDescSet => "local-description-set",
            SessionState::Gathering => "gathering",
            SessionState::LocalFinal => "local-final",
            SessionState::Established => "established",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Default)]
struct CandidateSetInner {
    values: Vec<String>,
    complete: bool,
}

/// Ordered, append-only collection of discovered path candidates.
///
/// Appends are accepted until [`CandidateSet::freeze`] marks gathering
/// complete; afterwards the collection is immutable and late candidates are
/// dropped.
#[derive(Debug, Default)]
pub struct CandidateSet {
    inner: Mutex<CandidateSetInner>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a discovered candidate
    pub fn record(&self, candidate: String) {
        let mut inner = self.inner.lock().unwrap();
        if inner.complete {
            debug!("Dropping candidate discovered after gathering completed: {}", candidate);
            return;
        }
        inner.values.push(candidate);
    }

    /// Mark gathering complete
    pub fn freeze(&self) {
        self.inner.lock().unwrap().complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.inner.lock().unwrap().complete
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the collected candidates in discovery order
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().unwrap().values.clone()
    }
}

/// Negotiation operations the session drives on its transport engine.
///
/// The production binding is [`super::WebRtcTransport`]; tests drive the
/// state machine with an in-memory stand-in.
pub trait Transport: Send + Sync + 'static {
    /// Create the local offer SDP
    fn create_offer(&self) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Create the local answer SDP
    fn create_answer(&self) -> impl Future<Output = Result<String, SessionError>> + Send;

    /// Apply the local description, starting candidate gathering
    fn set_local_description(
        &self,
        desc: &SignalingMessage,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Apply the peer's description
    fn set_remote_description(
        &self,
        desc: &SignalingMessage,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Resolve once the engine reports that gathering is complete
    fn wait_gathering_complete(&self) -> impl Future<Output = ()> + Send;

    /// Snapshot of the current local description, candidate-augmented
    fn local_description(&self) -> impl Future<Output = Option<SignalingMessage>> + Send;

    /// Tear down the transport
    fn close(&self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// One negotiation session between this process and its peer.
///
/// Exactly one exists per process; it is created by the role runner and
/// handed to whatever needs it (no globals). Transitions are one-directional
/// and non-retryable: any negotiation error leaves the session `Failed`.
pub struct PeerSession<T: Transport> {
    id: Uuid,
    transport: T,
    state: RwLock<SessionState>,
    candidates: Arc<CandidateSet>,
    // Serializes whole negotiation flows; a second caller sees a clean
    // InvalidState instead of an interleaved engine.
    negotiation: tokio::sync::Mutex<()>,
}

impl<T: Transport> PeerSession<T> {
    pub fn new(transport: T, candidates: Arc<CandidateSet>) -> Self {
        Self {
            id: Uuid::new_v4(),
            transport,
            state: RwLock::new(SessionState::New),
            candidates,
            negotiation: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn candidates(&self) -> Arc<CandidateSet> {
        Arc::clone(&self.candidates)
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Offerer half: create the offer, gather, snapshot the final description
    pub async fn negotiate_as_offerer(&self) -> Result<SignalingMessage, SessionError> {
        let _guard = self.negotiation.lock().await;
        self.ensure(SessionState::New, "creating an offer").await?;

        match self.offerer_flow().await {
            Ok(offer) => Ok(offer),
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// Offerer completion: apply the answer returned by the exchange
    pub async fn complete_offer(&self, answer: &SignalingMessage) -> Result<(), SessionError> {
        let _guard = self.negotiation.lock().await;
        self.ensure(SessionState::LocalFinal, "applying an answer").await?;

        if !matches!(answer, SignalingMessage::Answer { .. }) {
            return Err(SessionError::SdpError(format!(
                "Expected an answer, got {}",
                answer.kind()
            )));
        }

        match self.transport.set_remote_description(answer).await {
            Ok(()) => {
                self.advance(SessionState::Established).await?;
                info!("Session {} established", self.id);
                Ok(())
            }
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// Answerer half: apply the remote offer, create and finalize the answer
    pub async fn negotiate_as_answerer(
        &self,
        offer: &SignalingMessage,
    ) -> Result<SignalingMessage, SessionError> {
        let _guard = self.negotiation.lock().await;
        self.ensure(SessionState::New, "answering an offer").await?;

        if !matches!(offer, SignalingMessage::Offer { .. }) {
            return Err(SessionError::SdpError(format!(
                "Expected an offer, got {}",
                offer.kind()
            )));
        }

        match self.answerer_flow(offer).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                self.fail(&e).await;
                Err(e)
            }
        }
    }

    /// Explicit stop. Idempotent; tears down the transport, which ends the
    /// inbound packet stream and invalidates the outbound track.
    pub async fn close(&self) -> Result<(), SessionError> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Closed => return Ok(()),
                SessionState::Failed => {}
                current => {
                    info!("Session {}: closing from state {}", self.id, current);
                    *state = SessionState::Closed;
                }
            }
        }
        self.transport.close().await
    }

    async fn offerer_flow(&self) -> Result<SignalingMessage, SessionError> {
        let sdp = self.transport.create_offer().await?;
        let offer = SignalingMessage::offer(sdp);
        self.transport.set_local_description(&offer).await?;
        self.advance(SessionState::LocalDescSet).await?;

        self.finalize_local_description().await
    }

    async fn answerer_flow(
        &self,
        offer: &SignalingMessage,
    ) -> Result<SignalingMessage, SessionError> {
        self.transport.set_remote_description(offer).await?;
        self.advance(SessionState::RemoteDescSet).await?;

        let sdp = self.transport.create_answer().await?;
        let answer = SignalingMessage::answer(sdp);
        self.transport.set_local_description(&answer).await?;
        self.advance(SessionState::LocalDescSet).await?;

        let local = self.finalize_local_description().await?;
        self.advance(SessionState::Established).await?;
        info!("Session {} established", self.id);
        Ok(local)
    }

    /// The gathering barrier: block until no more candidates will appear,
    /// then snapshot the candidate-augmented local description.
    async fn finalize_local_description(&self) -> Result<SignalingMessage, SessionError> {
        self.advance(SessionState::Gathering).await?;
        info!("Session {}: waiting for candidate gathering to complete", self.id);
        self.transport.wait_gathering_complete().await;
        self.candidates.freeze();
        debug!(
            "Session {}: gathering complete with {} candidates",
            self.id,
            self.candidates.len()
        );

        let local = self.transport.local_description().await.ok_or_else(|| {
            SessionError::SdpError("No local description after gathering".to_string())
        })?;
        self.advance(SessionState::LocalFinal).await?;
        Ok(local)
    }

    async fn ensure(&self, expected: SessionState, op: &str) -> Result<(), SessionError> {
        let state = *self.state.read().await;
        if state == SessionState::Closed {
            return Err(SessionError::SessionClosed);
        }
        if state != expected {
            return Err(SessionError::InvalidState(format!(
                "{} requires a {} session, current state is {}",
                op, expected, state
            )));
        }
        Ok(())
    }

    async fn advance(&self, next: SessionState) -> Result<(), SessionError> {
        let mut state = self.state.write().await;
        if !state.can_advance(next) {
            return Err(SessionError::InvalidState(format!(
                "illegal transition {} -> {}",
                state, next
            )));
        }
        debug!("Session {}: {} -> {}", self.id, state, next);
        *state = next;
        Ok(())
    }

    /// Mark the session as terminally failed. Negotiation methods call this
    /// on engine errors; the exchange caller uses it when the round trip
    /// itself fails.
    pub async fn fail(&self, err: &SessionError) {
        let mut state = self.state.write().await;
        if !state.is_terminal() {
            warn!("Session {} failed in state {}: {}", self.id, state, err);
            *state = SessionState::Failed;
        }
    }
}
