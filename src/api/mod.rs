use crate::link::ConnectivitySupervisor;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use std::sync::{Arc, RwLock};

pub mod handlers;
pub mod responses;

/// Shared handles the read-only status API serves from.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub app: Arc<RwLock<AppState>>,
    pub link: Arc<ConnectivitySupervisor>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/slots", get(handlers::get_slots))
        .route("/api/summary", get(handlers::get_summary))
        .route("/api/connectivity", get(handlers::get_connectivity))
        .with_state(state)
}
