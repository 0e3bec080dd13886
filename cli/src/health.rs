//! The HTTP health endpoint.
//!
//! Only reports that the process is up; it says nothing about the upstream
//! connection or the database.

use axum::{routing::get, Router};

/// Body returned by `GET /`.
pub const RUNNING_MESSAGE: &str = "NapCatQQ Message Receiver Service is running";

/// Build the health router: `GET /` and nothing else.
pub fn router() -> Router {
    Router::new().route("/", get(index))
}

async fn index() -> &'static str {
    RUNNING_MESSAGE
}
