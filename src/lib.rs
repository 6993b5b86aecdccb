//! Review dashboard backend for logged assistant conversations.
//!
//! The server side loads chat archives through [`catalog::ArchiveSource`], normalizes
//! their histories ([`normalize`]) and stores reviewer feedback in rocksdb ([`db`]).
//! [`client`] talks to the HTTP API from the reviewer's side.

pub mod api;
pub mod bridge;
pub mod catalog;
pub mod client;
pub mod config;
pub mod db;
pub mod export;
pub mod model;
pub mod normalize;
pub mod state;
pub mod stats;
pub mod timestamp;
pub mod view;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// The full application router with CORS and request tracing attached.
pub fn app(state: AppState) -> Router {
    api::router()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}
