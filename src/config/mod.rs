//! Configuration management for rtc-relay

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Video codec selection for the outbound track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    VP8,
    VP9,
    H264,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::VP8 => "vp8",
            VideoCodec::VP9 => "vp9",
            VideoCodec::H264 => "h264",
        }
    }

    #[allow(dead_code)]
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::VP8 => "video/VP8",
            VideoCodec::VP9 => "video/VP9",
            VideoCodec::H264 => "video/H264",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Signaling endpoints
    #[serde(default)]
    pub signaling: SignalingConfig,

    /// Raw frame geometry and timing
    #[serde(default)]
    pub media: MediaConfig,

    /// Capture source process
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Persistence sink
    #[serde(default)]
    pub sink: SinkConfig,

    /// ICE servers
    #[serde(default)]
    pub ice: IceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingConfig {
    /// Address the sender's signaling server binds
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Offer endpoint the receiver submits its description to
    #[serde(default = "default_offer_url")]
    pub offer_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Raw frame width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Raw frame height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Target frame rate
    #[serde(default = "default_framerate")]
    pub framerate: u32,

    /// Outbound track codec
    #[serde(default)]
    pub codec: VideoCodec,
}

impl MediaConfig {
    /// Bytes per raw frame (YUV420P: two chroma samples per four luma)
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3 / 2
    }

    /// Wall-clock duration of one frame at the target rate
    pub fn sample_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.framerate as f64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Command producing raw frames on stdout. Its output geometry must
    /// match the [media] section; the framer trusts the configured size.
    #[serde(default = "default_capture_command")]
    pub command: String,

    /// Arguments passed to the capture command
    #[serde(default = "default_capture_args")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// File the receiver appends inbound payloads to
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceConfig {
    /// STUN/TURN URLs, e.g. "stun:stun.l.google.com:19302". Empty means
    /// host candidates only.
    #[serde(default)]
    pub servers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signaling: SignalingConfig::default(),
            media: MediaConfig::default(),
            capture: CaptureConfig::default(),
            sink: SinkConfig::default(),
            ice: IceConfig::default(),
        }
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            offer_url: default_offer_url(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            framerate: default_framerate(),
            codec: VideoCodec::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            command: default_capture_command(),
            args: default_capture_args(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
        }
    }
}

impl Default for IceConfig {
    fn default() -> Self {
        Self { servers: Vec::new() }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.media.width == 0 || self.media.height == 0 {
            return Err("Frame dimensions must be non-zero".into());
        }

        if self.media.width % 2 != 0 || self.media.height % 2 != 0 {
            return Err("Frame dimensions must be even for 4:2:0 sampling".into());
        }

        if self.media.framerate == 0 {
            return Err("Frame rate must be non-zero".into());
        }

        if self.capture.command.trim().is_empty() {
            return Err("Capture command must not be empty".into());
        }

        if self.signaling.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err("Signaling listen_addr must be in ip:port format".into());
        }

        if !self.signaling.offer_url.starts_with("http://")
            && !self.signaling.offer_url.starts_with("https://")
        {
            return Err("Signaling offer_url must be an http(s) URL".into());
        }

        if self.sink.output_path.as_os_str().is_empty() {
            return Err("Sink output_path must not be empty".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use std::time::Duration;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn frame_size_matches_yuv420_geometry() {
        let cfg = Config::default();
        assert_eq!(cfg.media.frame_size(), 640 * 480 * 3 / 2);
        assert_eq!(cfg.media.frame_size(), 460_800);
    }

    #[test]
    fn sample_duration_is_frame_interval() {
        let cfg = Config::default();
        assert_eq!(cfg.media.sample_duration(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn validate_rejects_zero_dimensions() {
        let mut cfg = Config::default();
        cfg.media.width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_odd_dimensions() {
        let mut cfg = Config::default();
        cfg.media.height = 481;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_listen_addr() {
        let mut cfg = Config::default();
        cfg.signaling.listen_addr = "not-an-addr".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn codec_tags_parse_from_toml() {
        let cfg: Config = toml::from_str("[media]\ncodec = \"h264\"\n").unwrap();
        assert_eq!(cfg.media.codec.as_str(), "h264");
        assert_eq!(cfg.media.codec.mime_type(), "video/H264");
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_offer_url() -> String {
    "http://localhost:8080/offer".to_string()
}

fn default_capture_command() -> String {
    "ffmpeg".to_string()
}

fn default_capture_args() -> Vec<String> {
    [
        "-f",
        "v4l2",
        "-i",
        "/dev/video0",
        "-pix_fmt",
        "yuv420p",
        "-s",
        "640x480",
        "-f",
        "rawvideo",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("video.raw")
}

fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_framerate() -> u32 { 30 }
