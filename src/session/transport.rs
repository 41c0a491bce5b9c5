//! webrtc-rs binding for the session transport
//!
//! Builds the peer connection with the codec and interceptor setup both
//! roles share, then wires the role-specific media path: the sender feeds an
//! outbound sample track, the receiver forwards inbound packet payloads to
//! the sink pipeline.

use crate::config::{IceConfig, MediaConfig, VideoCodec};
use crate::session::peer::{CandidateSet, Transport};
use crate::session::{SessionError, SignalingMessage};
use bytes::Bytes;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_H264, MIME_TYPE_VP8, MIME_TYPE_VP9};
use webrtc::api::setting_engine::SettingEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Session transport backed by a webrtc-rs peer connection
pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    // Receiver created alongside set_local_description so the completion
    // signal cannot be missed if gathering finishes before the wait starts.
    gather_rx: tokio::sync::Mutex<Option<mpsc::Receiver<()>>>,
}

impl WebRtcTransport {
    /// Build the sending side: outbound sample track bound before
    /// negotiation so the offer and answer carry its media line.
    pub async fn for_sender(
        ice: &IceConfig,
        candidates: Arc<CandidateSet>,
        track: Arc<TrackLocalStaticSample>,
    ) -> Result<Self, SessionError> {
        let pc = new_peer_connection(ice, candidates).await?;

        let rtp_sender = pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| {
                SessionError::ConnectionFailed(format!("Failed to add video track: {}", e))
            })?;

        // Drain RTCP reports so the interceptors keep running.
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
        });

        Ok(Self {
            pc,
            gather_rx: tokio::sync::Mutex::new(None),
        })
    }

    /// Build the receiving side: a recvonly video transceiver declared
    /// before the offer is created, and inbound packet payloads forwarded
    /// over `payload_tx` in arrival order.
    pub async fn for_receiver(
        ice: &IceConfig,
        candidates: Arc<CandidateSet>,
        payload_tx: mpsc::Sender<Bytes>,
    ) -> Result<Self, SessionError> {
        let pc = new_peer_connection(ice, candidates).await?;

        let init = RTCRtpTransceiverInit {
            direction: RTCRtpTransceiverDirection::Recvonly,
            send_encodings: vec![],
        };
        pc.add_transceiver_from_kind(RTPCodecType::Video, Some(init))
            .await
            .map_err(|e| {
                SessionError::ConnectionFailed(format!("Failed to add video transceiver: {}", e))
            })?;

        // One video track is expected; the sender moves out of this slot on
        // first use so the channel closes when the read loop ends.
        let slot = Arc::new(Mutex::new(Some(payload_tx)));
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let slot = Arc::clone(&slot);
            Box::pin(async move {
                if track.kind() != RTPCodecType::Video {
                    warn!("Ignoring unexpected {} track", track.kind());
                    return;
                }
                let Some(tx) = slot.lock().unwrap().take() else {
                    warn!("Ignoring additional video track, ssrc {}", track.ssrc());
                    return;
                };
                info!(
                    "Receiving {} track, ssrc {}",
                    track.codec().capability.mime_type,
                    track.ssrc()
                );
                // The read loop gets its own task; blocking here would hold
                // the engine's track handler lock and starve later events.
                tokio::spawn(async move {
                    let mut count = 0u64;
                    loop {
                        match track.read_rtp().await {
                            Ok((packet, _)) => {
                                count += 1;
                                if tx.send(packet.payload).await.is_err() {
                                    debug!("Payload channel closed, stopping track reader");
                                    break;
                                }
                            }
                            Err(e) => {
                                debug!("Track read ended after {} packets: {}", count, e);
                                break;
                            }
                        }
                    }
                });
            })
        }));

        Ok(Self {
            pc,
            gather_rx: tokio::sync::Mutex::new(None),
        })
    }
}

impl Transport for WebRtcTransport {
    async fn create_offer(&self) -> Result<String, SessionError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| SessionError::SdpError(format!("Failed to create offer: {}", e)))?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String, SessionError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| SessionError::SdpError(format!("Failed to create answer: {}", e)))?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, desc: &SignalingMessage) -> Result<(), SessionError> {
        let gather_rx = self.pc.gathering_complete_promise().await;
        self.pc
            .set_local_description(desc.to_description()?)
            .await
            .map_err(|e| {
                SessionError::SdpError(format!("Failed to set local description: {}", e))
            })?;
        *self.gather_rx.lock().await = Some(gather_rx);
        Ok(())
    }

    async fn set_remote_description(&self, desc: &SignalingMessage) -> Result<(), SessionError> {
        self.pc
            .set_remote_description(desc.to_description()?)
            .await
            .map_err(|e| {
                SessionError::SdpError(format!("Failed to set remote description: {}", e))
            })
    }

    async fn wait_gathering_complete(&self) {
        if let Some(mut rx) = self.gather_rx.lock().await.take() {
            let _ = rx.recv().await;
        }
    }

    async fn local_description(&self) -> Option<SignalingMessage> {
        let desc = self.pc.local_description().await?;
        SignalingMessage::from_description(&desc).ok()
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.pc.close().await.map_err(|e| {
            SessionError::ConnectionFailed(format!("Failed to close connection: {}", e))
        })
    }
}

async fn new_peer_connection(
    ice: &IceConfig,
    candidates: Arc<CandidateSet>,
) -> Result<Arc<RTCPeerConnection>, SessionError> {
    let setting_engine = SettingEngine::default();

    let mut media_engine = MediaEngine::default();
    register_video_codecs(&mut media_engine)?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
        SessionError::ConnectionFailed(format!("Failed to register interceptors: {}", e))
    })?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .with_setting_engine(setting_engine)
        .build();

    let ice_servers = if ice.servers.is_empty() {
        vec![]
    } else {
        vec![RTCIceServer {
            urls: ice.servers.clone(),
            ..Default::default()
        }]
    };

    let rtc_config = RTCConfiguration {
        ice_servers,
        ..Default::default()
    };

    let pc = api.new_peer_connection(rtc_config).await.map_err(|e| {
        SessionError::ConnectionFailed(format!("Failed to create peer connection: {}", e))
    })?;
    let pc = Arc::new(pc);

    pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
        let candidates = Arc::clone(&candidates);
        Box::pin(async move {
            if let Some(c) = candidate {
                match c.to_json() {
                    Ok(json) => {
                        debug!("Discovered ICE candidate: {}", json.candidate);
                        candidates.record(json.candidate);
                    }
                    Err(e) => warn!("Failed to serialize ICE candidate: {}", e),
                }
            }
        })
    }));

    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        Box::pin(async move {
            match state {
                RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected => {
                    warn!("Peer connection state changed: {}", state);
                }
                _ => info!("Peer connection state changed: {}", state),
            }
        })
    }));

    Ok(pc)
}

/// Register the supported video codecs in the media engine
fn register_video_codecs(media_engine: &mut MediaEngine) -> Result<(), SessionError> {
    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_H264.to_string(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f".to_string(),
                    rtcp_feedback: vec![],
                },
                payload_type: 96,
                ..Default::default()
            },
            RTPCodecType::Video,
        )
        .map_err(|e| SessionError::ConnectionFailed(format!("Failed to register H264: {}", e)))?;

    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_string(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: "".to_string(),
                    rtcp_feedback: vec![],
                },
                payload_type: 97,
                ..Default::default()
            },
            RTPCodecType::Video,
        )
        .map_err(|e| SessionError::ConnectionFailed(format!("Failed to register VP8: {}", e)))?;

    media_engine
        .register_codec(
            RTCRtpCodecParameters {
                capability: RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP9.to_string(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: "profile-id=0".to_string(),
                    rtcp_feedback: vec![],
                },
                payload_type: 98,
                ..Default::default()
            },
            RTPCodecType::Video,
        )
        .map_err(|e| SessionError::ConnectionFailed(format!("Failed to register VP9: {}", e)))?;

    Ok(())
}

/// Build the outbound sample track for the configured codec
pub fn create_video_track(media: &MediaConfig) -> Arc<TrackLocalStaticSample> {
    let (mime_type, fmtp) = match media.codec {
        VideoCodec::H264 => (
            MIME_TYPE_H264,
            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f",
        ),
        VideoCodec::VP8 => (MIME_TYPE_VP8, ""),
        VideoCodec::VP9 => (MIME_TYPE_VP9, "profile-id=0"),
    };

    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: mime_type.to_string(),
            clock_rate: 90000,
            channels: 0,
            sdp_fmtp_line: fmtp.to_string(),
            rtcp_feedback: vec![],
        },
        "video".to_string(),
        "relay".to_string(),
    ))
}
