use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::phase::GroupSummary, phase::PhaseSnapshot, services::phase_service, state::SharedState,
};

/// Public read-only endpoints exposing the phase state.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/phase", get(get_phase))
        .route("/phase/groups", get(list_groups))
}

#[utoipa::path(
    get,
    path = "/phase",
    tag = "public",
    responses((status = 200, description = "Current phase state", body = PhaseSnapshot))
)]
/// Return the active group, current phase and its countdown.
pub async fn get_phase(State(state): State<SharedState>) -> Json<PhaseSnapshot> {
    Json(phase_service::snapshot(&state).await)
}

#[utoipa::path(
    get,
    path = "/phase/groups",
    tag = "public",
    responses((status = 200, description = "Registered phase groups", body = [GroupSummary]))
)]
/// Return every registered group with its phases.
pub async fn list_groups(State(state): State<SharedState>) -> Json<Vec<GroupSummary>> {
    Json(phase_service::groups(&state).await)
}
