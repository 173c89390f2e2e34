//! wardgated: Hospital front-desk daemon.
//!
//! Serves the registration pages, stores patient and visitor records with
//! their photos, and checks departing visitors' faces against the photos
//! taken at registration.

pub mod config;
pub mod engine;
pub mod error;
pub mod mailer;
pub mod pages;
pub mod payload;
pub mod routes;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use wardgate_store::{MediaStore, RecordStore};

use crate::engine::EngineHandle;
use crate::mailer::Mailer;

/// Everything a handler can reach.
pub struct AppState {
    pub store: RecordStore,
    pub media: MediaStore,
    /// `None` when the face models could not be loaded.
    pub engine: Option<EngineHandle>,
    /// `None` when email is disabled.
    pub mailer: Option<Mailer>,
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/patient", get(pages::patient))
        .route("/visitor", get(pages::visitor))
        .route("/check", get(pages::check))
        .route("/exit", get(pages::exit))
        .route("/register", post(routes::register_patient))
        .route("/register_visitor", post(routes::register_visitor))
        .route("/check_patient/:code", get(routes::check_patient))
        .route("/verify_exit_face", post(routes::verify_exit_face))
        .route("/status", get(routes::status))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
