//! HTTP signaling surface
//!
//! Serves the offer/answer exchange and the stop control for the sending
//! role.

pub mod shared;
pub use shared::SharedState;

pub mod http_server;
pub use http_server::{build_router, run_http_server};
