// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! The transport layer (spec §6): an authenticated HTTP + WebSocket API in
//! front of the Kernel Façade. `build_router` is the single entry point;
//! `main.rs` attaches tracing/CORS layers and serves it.

mod approvals;
mod auth;
mod devices;
mod error;
mod hook;
mod repos;
mod runs;
mod ws;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::Config;
use crate::kernel::Facade;

/// Shared state every handler is given. Cheap to clone (an `Arc` and a
/// config snapshot); axum clones it once per request.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<Facade>,
    pub config: Arc<Config>,
}

/// Build the complete router, wired to `state`. Middleware layers (CORS,
/// tracing) are applied by the caller so tests can exercise the bare router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/repos", post(repos::create_repo).get(repos::list_repos))
        .route("/api/repos/{id}", get(repos::get_repo).delete(repos::delete_repo))
        .route("/api/repos/{repo_id}/runs", post(runs::start_run).get(runs::list_runs))
        .route("/api/runs/{id}", get(runs::get_run))
        .route("/api/runs/{id}/cancel", post(runs::cancel_run))
        .route("/api/runs/{id}/input", post(runs::send_input))
        .route("/api/runs/{id}/events", get(ws::run_events))
        .route("/api/approvals/pending", get(approvals::list_pending))
        .route("/api/approvals/{id}", get(approvals::get_approval))
        .route("/api/approvals/{id}/resolve", post(approvals::resolve_approval))
        .route("/api/devices", post(devices::register_device))
        .route("/api/devices/{token}", delete(devices::unregister_device))
        .route("/api/internal/interaction-request", post(hook::interaction_request))
        .with_state(state)
}

/// Attach the middleware layers production and the HTTP smoke test share.
pub fn with_layers(router: Router) -> Router {
    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
}
