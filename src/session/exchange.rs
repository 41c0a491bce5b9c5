//! Offer/answer exchange client
//!
//! The receiver posts its finalized offer to the peer's signaling endpoint
//! and decodes the answer from the response body. One round trip, no retry:
//! any exchange failure fails the session.

use super::{SessionError, SignalingMessage};
use log::{debug, info};
use reqwest::Client;

/// HTTP client for the single offer/answer round trip
pub struct ExchangeClient {
    client: Client,
    offer_url: String,
}

impl ExchangeClient {
    pub fn new(offer_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            offer_url: offer_url.into(),
        }
    }

    /// Deliver the offer and decode the peer's answer
    pub async fn exchange(
        &self,
        offer: &SignalingMessage,
    ) -> Result<SignalingMessage, SessionError> {
        info!("Posting offer to {}", self.offer_url);
        let response = self
            .client
            .post(&self.offer_url)
            .json(offer)
            .send()
            .await
            .map_err(|e| SessionError::ExchangeError(format!("Failed to deliver offer: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::ExchangeError(format!(
                "Peer rejected the offer with {}: {}",
                status,
                body.trim()
            )));
        }

        let answer: SignalingMessage = response.json().await.map_err(|e| {
            SessionError::ExchangeError(format!("Failed to decode answer: {}", e))
        })?;

        if !matches!(answer, SignalingMessage::Answer { .. }) {
            return Err(SessionError::ExchangeError(format!(
                "Expected an answer, got {}",
                answer.kind()
            )));
        }

        debug!("Received answer from peer");
        Ok(answer)
    }
}
