//! rtc-relay - Main entry point
//!
//! One process per role: the sender captures raw video frames and answers
//! the peer's offer, the receiver offers, then persists the inbound stream.

mod args;
mod config;
mod media;
mod session;
mod web;

use args::{Args, Role};
use clap::Parser;
use config::Config;
use log::{error, info, warn};
use media::PipelineError;
use session::exchange::ExchangeClient;
use session::{CandidateSet, PeerSession, WebRtcTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{mpsc, Notify};
use tokio::task;
use web::SharedState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging with noise filtering for third-party WebRTC crates
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::new()
        .parse_filters(&std::env::var("RELAY_LOG").unwrap_or_else(|_| log_level.to_string()))
        .filter_module("webrtc_ice", log::LevelFilter::Error)
        .filter_module("webrtc_dtls", log::LevelFilter::Error)
        .filter_module("webrtc_mdns", log::LevelFilter::Error)
        .init();

    info!("rtc-relay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match args.load_config() {
        Ok(cfg) => {
            info!("Loaded configuration from {:?}", args.config);
            cfg
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            Config::default()
        }
    };

    // Apply command line overrides
    if let Some(ref addr) = args.listen_addr {
        config.signaling.listen_addr = addr.clone();
    }
    if let Some(ref url) = args.offer_url {
        config.signaling.offer_url = url.clone();
    }
    if let Some(ref output) = args.output {
        config.sink.output_path = output.clone();
    }

    config.validate()?;

    match args.role {
        Role::Sender => run_sender(config).await,
        Role::Receiver => run_receiver(config).await,
    }
}

/// Capture-and-send role: serve the signaling endpoints, answer one offer,
/// and stream framed capture output until the capture ends or a stop
/// arrives.
async fn run_sender(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Running as sender: {}x{} {} at {} fps",
        config.media.width,
        config.media.height,
        config.media.codec.as_str(),
        config.media.framerate
    );

    let candidates = Arc::new(CandidateSet::new());
    let track = session::transport::create_video_track(&config.media);
    let transport =
        WebRtcTransport::for_sender(&config.ice, Arc::clone(&candidates), Arc::clone(&track))
            .await?;
    let session = Arc::new(PeerSession::new(transport, candidates));
    let state = Arc::new(SharedState::new(session));

    // Media pipeline: capture stdout -> framer -> outbound track. Frames
    // produced before the session is established are dropped by the unbound
    // track, so the peer joins the live stream.
    let (mut capture_child, capture_stdout) = media::spawn_capture(&config.capture)?;
    let frame_size = config.media.frame_size();
    let frame_duration = config.media.sample_duration();

    let (frame_tx, frame_rx) = mpsc::channel(4);
    let mut framer_handle = task::spawn(async move {
        media::run_framer(capture_stdout, frame_size, frame_duration, frame_tx).await
    });
    let mut feed_handle = task::spawn(media::feed_track(frame_rx, track));

    let http_shutdown = Arc::new(Notify::new());
    let http_state = state.clone();
    let http_stop = Arc::clone(&http_shutdown);
    let listen_addr = config.signaling.listen_addr.clone();
    let mut http_handle = task::spawn(async move {
        if let Err(e) = web::run_http_server(&listen_addr, http_state, http_stop).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Run until the capture ends, a stop arrives, or the process is signaled
    let mut fault: Option<PipelineError> = None;
    let mut stopped = false;
    let mut framer_done = false;
    let mut feed_done = false;
    let mut http_done = false;
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Initiating graceful shutdown...");
            stopped = true;
        }
        _ = state.stop.notified() => {
            info!("Stop requested, halting capture");
            stopped = true;
        }
        result = &mut framer_handle => {
            framer_done = true;
            fault = pipeline_outcome("Capture framer", result);
        }
        result = &mut feed_handle => {
            feed_done = true;
            fault = pipeline_outcome("Track feed", result);
        }
        result = &mut http_handle => {
            http_done = true;
            if let Err(e) = result {
                error!("HTTP server task ended abnormally: {}", e);
            }
        }
    }

    // Tear down the media path. Closing the session ends the peer's inbound
    // stream so its sink can finalize.
    let _ = capture_child.kill().await;
    if let Err(e) = state.session.close().await {
        warn!("Session close failed: {}", e);
    }

    if stopped {
        // The short tail from killing the capture mid-frame is not a fault
        if !framer_done {
            framer_handle.abort();
            let _ = framer_handle.await;
        }
        if !feed_done {
            feed_handle.abort();
            let _ = feed_handle.await;
        }
    } else {
        if !framer_done {
            let late = reap_pipeline("Capture framer", &mut framer_handle).await;
            if fault.is_none() {
                fault = late;
            }
        }
        if !feed_done {
            let late = reap_pipeline("Track feed", &mut feed_handle).await;
            if fault.is_none() {
                fault = late;
            }
        }
    }

    http_shutdown.notify_one();
    if !http_done {
        let _ = http_handle.await;
    }

    match fault {
        Some(e) => Err(Box::new(e)),
        None => {
            info!("Sender shut down");
            Ok(())
        }
    }
}

/// Receive-and-persist role: offer to the peer, then write the inbound
/// stream to the output file until it ends.
async fn run_receiver(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Running as receiver, writing to {:?}",
        config.sink.output_path
    );

    let candidates = Arc::new(CandidateSet::new());
    let (payload_tx, payload_rx) = mpsc::channel(64);
    let transport =
        WebRtcTransport::for_receiver(&config.ice, Arc::clone(&candidates), payload_tx).await?;
    let session = Arc::new(PeerSession::new(transport, candidates));

    let output_path = config.sink.output_path.clone();
    let mut writer_handle =
        task::spawn(async move { media::run_writer(payload_rx, &output_path).await });

    if let Err(e) = establish_receiver_session(&session, &config.signaling.offer_url).await {
        writer_handle.abort();
        let _ = writer_handle.await;
        return Err(e);
    }
    info!("Session established, receiving media");

    // Run until the inbound stream ends or the process is signaled
    let mut fault: Option<PipelineError> = None;
    let mut writer_done = false;
    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutting down, finalizing output...");
        }
        result = &mut writer_handle => {
            writer_done = true;
            fault = pipeline_outcome("Sink writer", result);
        }
    }

    if let Err(e) = session.close().await {
        warn!("Session close failed: {}", e);
    }

    // Closing the transport ends the inbound sequence; give the writer a
    // bounded window to drain and finalize.
    if !writer_done {
        match tokio::time::timeout(Duration::from_secs(5), &mut writer_handle).await {
            Ok(result) => {
                let late = pipeline_outcome("Sink writer", result);
                if fault.is_none() {
                    fault = late;
                }
            }
            Err(_) => {
                warn!("Writer did not finalize in time, aborting");
                writer_handle.abort();
                let _ = writer_handle.await;
            }
        }
    }

    match fault {
        Some(e) => Err(Box::new(e)),
        None => {
            info!("Receiver shut down");
            Ok(())
        }
    }
}

/// Drive the offer through the exchange and apply the peer's answer
async fn establish_receiver_session(
    session: &PeerSession<WebRtcTransport>,
    offer_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let offer = session.negotiate_as_offerer().await?;

    let exchange = ExchangeClient::new(offer_url);
    let answer = match exchange.exchange(&offer).await {
        Ok(answer) => answer,
        Err(e) => {
            session.fail(&e).await;
            return Err(Box::new(e));
        }
    };

    session.complete_offer(&answer).await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Shutdown signal received");
}

/// Log a finished pipeline task and surface its fault, if any
fn pipeline_outcome(
    name: &str,
    result: Result<Result<u64, PipelineError>, task::JoinError>,
) -> Option<PipelineError> {
    match result {
        Ok(Ok(units)) => {
            info!("{} finished after {} units", name, units);
            None
        }
        Ok(Err(e)) => {
            error!("{} failed: {}", name, e);
            Some(e)
        }
        Err(e) => {
            error!("{} task ended abnormally: {}", name, e);
            None
        }
    }
}

/// Collect a pipeline task the main select did not consume: a finished task
/// yields its outcome, a running one is aborted.
async fn reap_pipeline(
    name: &str,
    handle: &mut task::JoinHandle<Result<u64, PipelineError>>,
) -> Option<PipelineError> {
    if handle.is_finished() {
        pipeline_outcome(name, handle.await)
    } else {
        handle.abort();
        let _ = handle.await;
        None
    }
}
