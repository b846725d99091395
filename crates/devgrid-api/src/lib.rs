//! devgrid-api — REST API for devgrid slots.
//!
//! Thin translation layer: every handler maps one request onto one slot
//! operation and the slot's answer back onto a JSON response. No slot
//! logic lives here.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/agents/:agent_id/slots` | List slots |
//! | GET | `/api/v1/agents/:agent_id/slots/:slot_id` | Get a slot |
//! | PATCH | `/api/v1/agents/:agent_id/slots/:slot_id` | Set user enablement (`{"enabled": bool}`) |
//! | POST | `/api/v1/agents/:agent_id/slots/:slot_id/enable` | Enable a slot |
//! | POST | `/api/v1/agents/:agent_id/slots/:slot_id/disable` | Disable a slot |
//!
//! Any other method on these paths gets a 405 with the usual error body.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use devgrid_agent::Agent;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<Agent>,
}

/// Build the API router for one agent's slots.
pub fn build_router(agent: Arc<Agent>) -> Router {
    let api_state = ApiState { agent };

    let api_routes = Router::new()
        .route(
            "/agents/{agent_id}/slots",
            get(handlers::list_slots).fallback(handlers::method_not_supported),
        )
        .route(
            "/agents/{agent_id}/slots/{slot_id}",
            get(handlers::get_slot)
                .patch(handlers::patch_slot)
                .fallback(handlers::method_not_supported),
        )
        .route(
            "/agents/{agent_id}/slots/{slot_id}/enable",
            post(handlers::enable_slot).fallback(handlers::method_not_supported),
        )
        .route(
            "/agents/{agent_id}/slots/{slot_id}/disable",
            post(handlers::disable_slot).fallback(handlers::method_not_supported),
        )
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
