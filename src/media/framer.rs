//! Capture framing pipeline
//!
//! Reads the capture process's stdout as a stream of fixed-size raw frames
//! and emits them as timed video samples. Frame boundaries matter: a stream
//! that ends exactly on a boundary is a normal end of capture, a stream that
//! ends inside a frame is a capture failure.

use super::PipelineError;
use crate::config::CaptureConfig;
use bytes::Bytes;
use log::{debug, info};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use webrtc::media::Sample;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Start the capture process with its stdout piped
pub fn spawn_capture(config: &CaptureConfig) -> Result<(Child, ChildStdout), PipelineError> {
    info!("Starting capture: {} {}", config.command, config.args.join(" "));
    let mut child = Command::new(&config.command)
        .args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            PipelineError::Capture(format!("Failed to start {}: {}", config.command, e))
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| PipelineError::Capture("Capture process has no stdout".to_string()))?;

    Ok((child, stdout))
}

/// Cut the byte stream into `frame_size` units and send them downstream.
///
/// Each frame is filled completely before it is emitted, regardless of how
/// the underlying reads are chunked. Returns the number of frames emitted
/// once the stream ends on a frame boundary or the receiver goes away.
pub async fn run_framer<R>(
    mut reader: R,
    frame_size: usize,
    duration: Duration,
    tx: mpsc::Sender<Sample>,
) -> Result<u64, PipelineError>
where
    R: AsyncRead + Unpin,
{
    let mut frames = 0u64;
    let mut buf = vec![0u8; frame_size];

    loop {
        let mut filled = 0usize;
        while filled < frame_size {
            let n = reader
                .read(&mut buf[filled..])
                .await
                .map_err(|e| PipelineError::Capture(format!("Failed to read frame: {}", e)))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            debug!("Capture stream ended after {} frames", frames);
            return Ok(frames);
        }
        if filled < frame_size {
            return Err(PipelineError::ShortFrame {
                got: filled,
                want: frame_size,
            });
        }

        let sample = Sample {
            data: Bytes::copy_from_slice(&buf),
            duration,
            ..Default::default()
        };
        if tx.send(sample).await.is_err() {
            debug!("Frame channel closed, stopping capture reader");
            return Ok(frames);
        }
        frames += 1;
    }
}

/// Drain framed samples into the outbound track
pub async fn feed_track(
    mut rx: mpsc::Receiver<Sample>,
    track: Arc<TrackLocalStaticSample>,
) -> Result<u64, PipelineError> {
    let mut sent = 0u64;
    while let Some(sample) = rx.recv().await {
        track
            .write_sample(&sample)
            .await
            .map_err(|e| PipelineError::Track(format!("Failed to write sample: {}", e)))?;
        sent += 1;
    }
    debug!("Track feed finished after {} samples", sent);
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;
    use webrtc::api::media_engine::MIME_TYPE_VP8;
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

    /// Reader that hands out at most `chunk` bytes per call, to exercise
    /// frame filling across short reads.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
    }

    impl AsyncRead for Trickle {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            let this = self.get_mut();
            let end = (this.pos + this.chunk).min(this.data.len());
            let n = (end - this.pos).min(buf.remaining());
            buf.put_slice(&this.data[this.pos..this.pos + n]);
            this.pos += n;
            Poll::Ready(Ok(()))
        }
    }

    fn frame_bytes(count: usize, size: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(count * size);
        for i in 0..count {
            data.extend(std::iter::repeat(i as u8).take(size));
        }
        data
    }

    #[tokio::test]
    async fn emits_exactly_the_framed_units_in_order() {
        let data = frame_bytes(3, 8);
        let (tx, mut rx) = mpsc::channel(8);

        let frames = run_framer(&data[..], 8, Duration::from_millis(40), tx)
            .await
            .unwrap();
        assert_eq!(frames, 3);

        for i in 0..3u8 {
            let sample = rx.recv().await.unwrap();
            assert_eq!(sample.data.len(), 8);
            assert!(sample.data.iter().all(|b| *b == i));
            assert_eq!(sample.duration, Duration::from_millis(40));
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn fills_frames_across_short_reads() {
        let reader = Trickle {
            data: frame_bytes(2, 10),
            pos: 0,
            chunk: 3,
        };
        let (tx, mut rx) = mpsc::channel(8);

        let frames = run_framer(reader, 10, Duration::from_millis(33), tx)
            .await
            .unwrap();
        assert_eq!(frames, 2);
        assert_eq!(rx.recv().await.unwrap().data.len(), 10);
        assert_eq!(rx.recv().await.unwrap().data.len(), 10);
    }

    #[tokio::test]
    async fn stream_ending_inside_a_frame_is_an_error() {
        let mut data = frame_bytes(2, 8);
        data.truncate(12);
        let (tx, _rx) = mpsc::channel(8);

        let err = run_framer(&data[..], 8, Duration::from_millis(33), tx)
            .await
            .unwrap_err();
        match err {
            PipelineError::ShortFrame { got, want } => {
                assert_eq!(got, 4);
                assert_eq!(want, 8);
            }
            other => panic!("Expected ShortFrame, got {}", other),
        }
    }

    #[tokio::test]
    async fn empty_stream_is_a_clean_end() {
        let (tx, mut rx) = mpsc::channel(8);
        let frames = run_framer(&[][..], 8, Duration::from_millis(33), tx)
            .await
            .unwrap();
        assert_eq!(frames, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn closed_channel_stops_the_framer() {
        let data = frame_bytes(4, 8);
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        let frames = run_framer(&data[..], 8, Duration::from_millis(33), tx)
            .await
            .unwrap();
        assert_eq!(frames, 0);
    }

    #[tokio::test]
    async fn feed_counts_every_sample_until_the_channel_closes() {
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_string(),
                clock_rate: 90000,
                ..Default::default()
            },
            "video".to_string(),
            "relay".to_string(),
        ));
        let (tx, rx) = mpsc::channel(8);

        let feed = tokio::spawn(feed_track(rx, track));
        for _ in 0..3 {
            tx.send(Sample {
                data: Bytes::from_static(b"frame"),
                duration: Duration::from_millis(33),
                ..Default::default()
            })
            .await
            .unwrap();
        }
        drop(tx);

        let sent = feed.await.unwrap().unwrap();
        assert_eq!(sent, 3);
    }
}
