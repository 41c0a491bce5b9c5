//! HTTP server for the offer/answer exchange
//!
//! `/offer` accepts the peer's offer and replies with the candidate-complete
//! answer; `/stop` ends the media session. Error responses keep the decode,
//! negotiation and busy cases distinct so the peer can tell a bad request
//! from a dead session.

use crate::session::{SessionError, SignalingMessage, Transport};
use crate::web::shared::SharedState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use log::{info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// Build the signaling router
pub fn build_router<T: Transport>(state: Arc<SharedState<T>>) -> Router {
    Router::new()
        .route("/offer", post(offer_handler))
        .route("/stop", post(stop_handler))
        .with_state(state)
}

/// Run the signaling server until `shutdown` fires; in-flight responses
/// complete before the server returns.
pub async fn run_http_server<T: Transport>(
    listen_addr: &str,
    state: Arc<SharedState<T>>,
    shutdown: Arc<Notify>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    info!("Signaling server listening on http://{}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)?;

    Ok(())
}

/// Offer handler: decode, negotiate, reply with the finalized answer
async fn offer_handler<T: Transport>(
    State(state): State<Arc<SharedState<T>>>,
    body: String,
) -> Response {
    let offer = match SignalingMessage::from_json(&body) {
        Ok(msg @ SignalingMessage::Offer { .. }) => msg,
        Ok(other) => {
            warn!("Rejecting {} posted to /offer", other.kind());
            return (StatusCode::BAD_REQUEST, "Error decoding offer").into_response();
        }
        Err(e) => {
            warn!("Rejecting undecodable offer: {}", e);
            return (StatusCode::BAD_REQUEST, "Error decoding offer").into_response();
        }
    };

    match state.session.negotiate_as_answerer(&offer).await {
        Ok(answer) => Json(answer).into_response(),
        Err(e @ (SessionError::InvalidState(_) | SessionError::SessionClosed)) => {
            warn!("Offer rejected: {}", e);
            (StatusCode::CONFLICT, "Session already in use").into_response()
        }
        Err(e) => {
            warn!("Negotiation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to negotiate: {}", e),
            )
                .into_response()
        }
    }
}

/// Stop handler: halt the media pipeline and close the session
async fn stop_handler<T: Transport>(State(state): State<Arc<SharedState<T>>>) -> Response {
    info!("Stop requested");
    state.stop.notify_one();

    match state.session.close().await {
        Ok(()) => (StatusCode::OK, "Stream stopped").into_response(),
        Err(e) => {
            warn!("Session close failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to stop: {}", e),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{failing_session, stub_session, StubTransport};
    use crate::session::SessionState;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn stub_state() -> Arc<SharedState<StubTransport>> {
        Arc::new(SharedState::new(Arc::new(stub_session())))
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn malformed_offer_is_rejected_without_touching_the_session() {
        let state = stub_state();
        let app = build_router(state.clone());

        let response = app.oneshot(post("/offer", "not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Error decoding offer");
        assert_eq!(state.session.state().await, SessionState::New);
    }

    #[tokio::test]
    async fn answer_payload_on_the_offer_route_is_a_decode_error() {
        let state = stub_state();
        let app = build_router(state.clone());

        let body = r#"{"type": "answer", "sdp": "v=0\r\nx"}"#;
        let response = app.oneshot(post("/offer", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.session.state().await, SessionState::New);
    }

    #[tokio::test]
    async fn valid_offer_yields_a_json_answer_and_establishes_the_session() {
        let state = stub_state();
        let app = build_router(state.clone());

        let body = r#"{"type": "offer", "sdp": "v=0\r\npeer offer"}"#;
        let response = app.oneshot(post("/offer", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let decoded: serde_json::Value =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(decoded["type"], "answer");
        assert_eq!(decoded["sdp"], "v=0\r\nstub answer");
        assert_eq!(state.session.state().await, SessionState::Established);
    }

    #[tokio::test]
    async fn second_offer_conflicts_while_the_session_is_in_use() {
        let state = stub_state();
        let app = build_router(state.clone());
        let body = r#"{"type": "offer", "sdp": "v=0\r\npeer offer"}"#;

        let first = app.clone().oneshot(post("/offer", body)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(post("/offer", body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_string(second).await, "Session already in use");
    }

    #[tokio::test]
    async fn negotiation_failure_reports_server_error_and_fails_the_session() {
        let state = Arc::new(SharedState::new(Arc::new(failing_session("create_answer"))));
        let app = build_router(state.clone());
        let body = r#"{"type": "offer", "sdp": "v=0\r\npeer offer"}"#;

        let response = app.clone().oneshot(post("/offer", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("Failed to negotiate"));
        assert_eq!(state.session.state().await, SessionState::Failed);

        let retry = app.oneshot(post("/offer", body)).await.unwrap();
        assert_eq!(retry.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn stop_closes_the_session_and_later_offers_conflict() {
        let state = stub_state();
        let app = build_router(state.clone());

        let response = app.clone().oneshot(post("/stop", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Stream stopped");
        assert_eq!(state.session.state().await, SessionState::Closed);
        assert!(state.session.transport().is_closed());

        let offer = r#"{"type": "offer", "sdp": "v=0\r\npeer offer"}"#;
        let rejected = app.oneshot(post("/offer", offer)).await.unwrap();
        assert_eq!(rejected.status(), StatusCode::CONFLICT);
    }
}
