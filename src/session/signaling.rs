//! Signaling wire format
//!
//! One JSON object per exchange, `{"type": "offer"|"answer", "sdp": "..."}`,
//! carried as the body of a single POST and its response.

use super::SessionError;
use serde::{Deserialize, Serialize};
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Session description as it travels between the endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalingMessage {
    /// SDP offer from the requester
    Offer { sdp: String },

    /// SDP answer from the responder
    Answer { sdp: String },
}

impl SignalingMessage {
    /// Parse a signaling message from JSON
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        serde_json::from_str(json)
            .map_err(|e| SessionError::SdpError(format!("Invalid signaling message: {}", e)))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, SessionError> {
        serde_json::to_string(self)
            .map_err(|e| SessionError::SdpError(format!("Failed to serialize message: {}", e)))
    }

    /// Create an offer message
    pub fn offer(sdp: String) -> Self {
        SignalingMessage::Offer { sdp }
    }

    /// Create an answer message
    pub fn answer(sdp: String) -> Self {
        SignalingMessage::Answer { sdp }
    }

    /// The wire tag of this message
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingMessage::Offer { .. } => "offer",
            SignalingMessage::Answer { .. } => "answer",
        }
    }

    /// The raw SDP body
    pub fn sdp(&self) -> &str {
        match self {
            SignalingMessage::Offer { sdp } => sdp,
            SignalingMessage::Answer { sdp } => sdp,
        }
    }

    /// Convert into the engine's description type
    pub fn to_description(&self) -> Result<RTCSessionDescription, SessionError> {
        match self {
            SignalingMessage::Offer { sdp } => RTCSessionDescription::offer(sdp.clone())
                .map_err(|e| SessionError::SdpError(format!("Invalid SDP offer: {}", e))),
            SignalingMessage::Answer { sdp } => RTCSessionDescription::answer(sdp.clone())
                .map_err(|e| SessionError::SdpError(format!("Invalid SDP answer: {}", e))),
        }
    }

    /// Convert from the engine's description type
    pub fn from_description(desc: &RTCSessionDescription) -> Result<Self, SessionError> {
        match desc.sdp_type {
            RTCSdpType::Offer => Ok(SignalingMessage::offer(desc.sdp.clone())),
            RTCSdpType::Answer => Ok(SignalingMessage::answer(desc.sdp.clone())),
            other => Err(SessionError::SdpError(format!(
                "Unsupported description type: {}",
                other
            ))),
        }
    }
}
