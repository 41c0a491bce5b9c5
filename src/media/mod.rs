//! Media pipelines
//!
//! The sending half turns the capture process's raw byte stream into
//! fixed-size video samples; the receiving half persists inbound payload
//! units in arrival order.

pub mod framer;
pub mod writer;

pub use framer::{feed_track, run_framer, spawn_capture};
pub use writer::run_writer;

use std::error::Error;
use std::fmt;

/// Media pipeline errors
#[derive(Debug)]
pub enum PipelineError {
    /// Capture process or stream failure
    Capture(String),
    /// The capture stream ended inside a frame
    ShortFrame { got: usize, want: usize },
    /// Output file failure
    Sink(String),
    /// Outbound track failure
    Track(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Capture(msg) => write!(f, "Capture error: {}", msg),
            PipelineError::ShortFrame { got, want } => write!(
                f,
                "Incomplete frame from capture: got {} bytes, want {}",
                got, want
            ),
            PipelineError::Sink(msg) => write!(f, "Sink error: {}", msg),
            PipelineError::Track(msg) => write!(f, "Track error: {}", msg),
        }
    }
}

impl Error for PipelineError {}
