//! rtc-relay - Point-to-point WebRTC media relay
//!
//! Captures a raw video stream from an external process, sends it to a
//! single peer over a WebRTC track, and on the receiving side persists the
//! inbound stream to a file. One offer/answer exchange per process, with
//! candidate gathering completed before the local description is shared.

pub mod args;
pub mod config;
pub mod media;
pub mod session;
pub mod web;

// Re-exports
pub use config::{Config, MediaConfig, VideoCodec};
pub use media::PipelineError;
pub use session::{
    CandidateSet, PeerSession, SessionError, SessionState, SignalingMessage, Transport,
    WebRtcTransport,
};
