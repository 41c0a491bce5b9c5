//! Session negotiation core
//!
//! This module owns the offer/answer lifecycle between the two endpoints:
//! - Signaling wire format and JSON codec
//! - Peer session state machine with the gathering barrier
//! - WebRTC transport binding
//! - Offer exchange client

#![allow(dead_code)]

pub mod exchange;
pub mod peer;
pub mod signaling;
#[cfg(test)]
pub(crate) mod testing;
pub mod transport;

pub use peer::{CandidateSet, PeerSession, SessionState, Transport};
pub use signaling::SignalingMessage;
pub use transport::WebRtcTransport;

use std::error::Error;
use std::fmt;

/// Session negotiation errors
#[derive(Debug)]
pub enum SessionError {
    /// Peer connection setup or teardown failed
    ConnectionFailed(String),
    /// SDP processing failed
    SdpError(String),
    /// ICE processing failed
    IceError(String),
    /// Offer exchange round-trip failed
    ExchangeError(String),
    /// Operation not legal in the current state
    InvalidState(String),
    /// The session was already torn down
    SessionClosed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            SessionError::SdpError(msg) => write!(f, "SDP error: {}", msg),
            SessionError::IceError(msg) => write!(f, "ICE error: {}", msg),
            SessionError::ExchangeError(msg) => write!(f, "Exchange error: {}", msg),
            SessionError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            SessionError::SessionClosed => write!(f, "Session is closed"),
        }
    }
}

impl Error for SessionError {}
