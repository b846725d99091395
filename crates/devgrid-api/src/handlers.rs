//! REST API handlers.
//!
//! Each handler resolves the addressed slot through the `Agent` and
//! returns JSON responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use devgrid_agent::{SlotError, SlotHandle};
use devgrid_core::SlotPatch;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn slot_error_response(err: &SlotError) -> Response {
    let status = match err {
        SlotError::SlotNotFound(_) | SlotError::ContainerNotFound(_) => StatusCode::NOT_FOUND,
        SlotError::MailboxClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
        SlotError::ContractViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&err.to_string(), status)
}

/// Resolve `agent_id/slot_id` to a slot handle or a 404.
fn lookup(state: &ApiState, agent_id: &str, slot_id: &str) -> Result<SlotHandle, Response> {
    if agent_id != state.agent.id() {
        return Err(error_response(
            &format!("agent not found: {agent_id}"),
            StatusCode::NOT_FOUND,
        ));
    }
    state.agent.slot(slot_id).map_err(|e| slot_error_response(&e))
}

// ── Slots ──────────────────────────────────────────────────────

/// GET /api/v1/agents/:agent_id/slots
pub async fn list_slots(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
) -> impl IntoResponse {
    if agent_id != state.agent.id() {
        return error_response(&format!("agent not found: {agent_id}"), StatusCode::NOT_FOUND);
    }
    match state.agent.list_slots().await {
        Ok(slots) => ApiResponse::ok(slots).into_response(),
        Err(e) => slot_error_response(&e),
    }
}

/// GET /api/v1/agents/:agent_id/slots/:slot_id
pub async fn get_slot(
    State(state): State<ApiState>,
    Path((agent_id, slot_id)): Path<(String, String)>,
) -> impl IntoResponse {
    let handle = match lookup(&state, &agent_id, &slot_id) {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };
    match handle.summarize().await {
        Ok(summary) => ApiResponse::ok(summary).into_response(),
        Err(e) => slot_error_response(&e),
    }
}

/// PATCH /api/v1/agents/:agent_id/slots/:slot_id
///
/// Returns 204 on success; a malformed body never reaches the slot.
pub async fn patch_slot(
    State(state): State<ApiState>,
    Path((agent_id, slot_id)): Path<(String, String)>,
    payload: Result<Json<SlotPatch>, JsonRejection>,
) -> impl IntoResponse {
    let handle = match lookup(&state, &agent_id, &slot_id) {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };
    let Json(patch) = match payload {
        Ok(patch) => patch,
        Err(rejection) => {
            debug!(%agent_id, %slot_id, error = %rejection.body_text(), "rejected slot patch");
            return error_response(
                &format!("error patching slot: {}", rejection.body_text()),
                StatusCode::BAD_REQUEST,
            );
        }
    };
    match handle.set_user_enabled(patch.enabled).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => slot_error_response(&e),
    }
}

/// POST /api/v1/agents/:agent_id/slots/:slot_id/enable
pub async fn enable_slot(
    State(state): State<ApiState>,
    Path((agent_id, slot_id)): Path<(String, String)>,
) -> impl IntoResponse {
    set_user_enabled(&state, &agent_id, &slot_id, true).await
}

/// POST /api/v1/agents/:agent_id/slots/:slot_id/disable
pub async fn disable_slot(
    State(state): State<ApiState>,
    Path((agent_id, slot_id)): Path<(String, String)>,
) -> impl IntoResponse {
    set_user_enabled(&state, &agent_id, &slot_id, false).await
}

async fn set_user_enabled(
    state: &ApiState,
    agent_id: &str,
    slot_id: &str,
    enabled: bool,
) -> Response {
    let handle = match lookup(state, agent_id, slot_id) {
        Ok(handle) => handle,
        Err(resp) => return resp,
    };
    match handle.set_user_enabled(enabled).await {
        Ok(summary) => ApiResponse::ok(summary).into_response(),
        Err(e) => slot_error_response(&e),
    }
}

/// Any method other than GET/PATCH on a slot.
pub async fn method_not_supported(method: Method) -> impl IntoResponse {
    error_response(
        &format!("method not supported: {method}"),
        StatusCode::METHOD_NOT_ALLOWED,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use devgrid_agent::{Agent, AgentSettings, HostRef};
    use devgrid_core::config::SlotDefaults;
    use devgrid_core::{Device, DeviceType};
    use devgrid_scheduler::ClusterRef;

    fn test_state() -> ApiState {
        let (cluster, _scheduler) = ClusterRef::channel();
        let (host, _kills) = HostRef::channel();
        let settings = AgentSettings {
            agent_id: "agent-1".to_string(),
            devices: vec![Device {
                id: 0,
                brand: "NVIDIA A100".to_string(),
                uuid: "GPU-0".to_string(),
                kind: DeviceType::Gpu,
            }],
            slot_defaults: SlotDefaults::default(),
            mailbox_capacity: 4,
        };
        ApiState {
            agent: Arc::new(Agent::start(settings, Arc::new(cluster), Arc::new(host))),
        }
    }

    fn path(agent: &str, slot: &str) -> Path<(String, String)> {
        Path((agent.to_string(), slot.to_string()))
    }

    #[tokio::test]
    async fn list_slots_ok() {
        let state = test_state();
        let resp = list_slots(State(state), Path("agent-1".to_string())).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_slots_unknown_agent() {
        let state = test_state();
        let resp = list_slots(State(state), Path("agent-9".to_string())).await;
        assert_eq!(resp.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_slot_ok() {
        let state = test_state();
        let resp = get_slot(State(state), path("agent-1", "0")).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn get_nonexistent_slot() {
        let state = test_state();
        let resp = get_slot(State(state), path("agent-1", "3")).await;
        assert_eq!(resp.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_disables_slot() {
        let state = test_state();
        let resp = patch_slot(
            State(state.clone()),
            path("agent-1", "0"),
            Ok(Json(SlotPatch { enabled: false })),
        )
        .await;
        assert_eq!(resp.into_response().status(), StatusCode::NO_CONTENT);

        let summary = state.agent.slot("0").unwrap().summarize().await.unwrap();
        assert!(!summary.enabled);
    }

    #[tokio::test]
    async fn disable_then_enable_returns_summary() {
        let state = test_state();
        let resp = disable_slot(State(state.clone()), path("agent-1", "0")).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
        assert!(!state.agent.slot("0").unwrap().summarize().await.unwrap().enabled);

        let resp = enable_slot(State(state.clone()), path("agent-1", "0")).await;
        assert_eq!(resp.into_response().status(), StatusCode::OK);
        assert!(state.agent.slot("0").unwrap().summarize().await.unwrap().enabled);
    }

    #[tokio::test]
    async fn stopped_agent_is_unavailable() {
        let state = test_state();
        state.agent.shutdown().await;
        let resp = get_slot(State(state), path("agent-1", "0")).await;
        assert_eq!(
            resp.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn unsupported_method() {
        let resp = method_not_supported(Method::DELETE).await;
        assert_eq!(resp.into_response().status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
