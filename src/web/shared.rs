//! Shared state for the signaling handlers

use crate::session::{PeerSession, Transport};
use std::sync::Arc;
use tokio::sync::Notify;

/// State shared across signaling handlers
pub struct SharedState<T: Transport> {
    /// The process-wide peer session
    pub session: Arc<PeerSession<T>>,

    /// Signals the media pipeline to stop
    pub stop: Arc<Notify>,
}

impl<T: Transport> SharedState<T> {
    pub fn new(session: Arc<PeerSession<T>>) -> Self {
        Self {
            session,
            stop: Arc::new(Notify::new()),
        }
    }
}
