//! Receive-side sink
//!
//! Appends inbound payload units to the output file in arrival order and
//! finalizes the file when the stream ends.

use super::PipelineError;
use bytes::Bytes;
use log::info;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Drain payload units into `path` until the channel closes.
///
/// Returns the total number of bytes written. The file is created up front
/// so an unwritable sink fails the pipeline before any media arrives.
pub async fn run_writer(mut rx: mpsc::Receiver<Bytes>, path: &Path) -> Result<u64, PipelineError> {
    let mut file = File::create(path).await.map_err(|e| {
        PipelineError::Sink(format!("Failed to create {}: {}", path.display(), e))
    })?;
    info!("Writing received media to {}", path.display());

    let mut written = 0u64;
    while let Some(payload) = rx.recv().await {
        file.write_all(&payload).await.map_err(|e| {
            PipelineError::Sink(format!("Failed to write to {}: {}", path.display(), e))
        })?;
        written += payload.len() as u64;
    }

    file.flush().await.map_err(|e| {
        PipelineError::Sink(format!("Failed to flush {}: {}", path.display(), e))
    })?;
    info!("Sink finalized, {} bytes written", written);
    Ok(written)
}
