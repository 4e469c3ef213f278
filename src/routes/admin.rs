use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use validator::Validate;

use crate::{
    dto::{
        location::{LocationEntry, SetLocationRequest},
        phase::{SetPhaseRequest, SkipRequest, StartGroupRequest, TimerRequest},
    },
    error::AppError,
    phase::PhaseSnapshot,
    services::{auth_service, location_service, phase_service},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Operator endpoints driving the phases and setting named locations.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/phase/set", post(set_phase))
        .route("/admin/phase/start", post(start_group))
        .route("/admin/phase/skip", post(skip))
        .route("/admin/phase/timer", post(set_timer))
        .route("/admin/locations", get(list_locations))
        .route("/admin/locations/{name}", put(set_location))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Set or start a phase of the active group.
#[utoipa::path(
    post,
    path = "/admin/phase/set",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Operator token from the configuration")),
    request_body = SetPhaseRequest,
    responses(
        (status = 200, description = "Phase changed", body = PhaseSnapshot),
        (status = 404, description = "Unknown phase"),
        (status = 409, description = "No active group, phase outside it, or unset locations")
    )
)]
pub async fn set_phase(
    State(state): State<SharedState>,
    Json(payload): Json<SetPhaseRequest>,
) -> Result<Json<PhaseSnapshot>, AppError> {
    payload.validate()?;
    Ok(Json(phase_service::set_phase(&state, payload).await?))
}

/// Activate a phase group, optionally jumping to one of its phases.
#[utoipa::path(
    post,
    path = "/admin/phase/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Operator token from the configuration")),
    request_body = StartGroupRequest,
    responses(
        (status = 200, description = "Group started", body = PhaseSnapshot),
        (status = 400, description = "Phase is not part of the group"),
        (status = 404, description = "Unknown group"),
        (status = 409, description = "Unset locations")
    )
)]
pub async fn start_group(
    State(state): State<SharedState>,
    Json(payload): Json<StartGroupRequest>,
) -> Result<Json<PhaseSnapshot>, AppError> {
    payload.validate()?;
    Ok(Json(phase_service::start_group(&state, payload).await?))
}

/// Start the next phase of the active group, possibly several times.
#[utoipa::path(
    post,
    path = "/admin/phase/skip",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Operator token from the configuration")),
    request_body = SkipRequest,
    responses(
        (status = 200, description = "Phases skipped", body = PhaseSnapshot),
        (status = 409, description = "Nothing left to start")
    )
)]
pub async fn skip(
    State(state): State<SharedState>,
    Json(payload): Json<SkipRequest>,
) -> Result<Json<PhaseSnapshot>, AppError> {
    payload.validate()?;
    Ok(Json(phase_service::skip(&state, payload).await?))
}

/// Change how many seconds the current phase has left.
#[utoipa::path(
    post,
    path = "/admin/phase/timer",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Operator token from the configuration")),
    request_body = TimerRequest,
    responses(
        (status = 200, description = "Timer changed", body = PhaseSnapshot),
        (status = 409, description = "No current phase or no countdown")
    )
)]
pub async fn set_timer(
    State(state): State<SharedState>,
    Json(payload): Json<TimerRequest>,
) -> Result<Json<PhaseSnapshot>, AppError> {
    payload.validate()?;
    Ok(Json(phase_service::set_timer(&state, payload).await?))
}

/// List declared locations and their values.
#[utoipa::path(
    get,
    path = "/admin/locations",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Operator token from the configuration")),
    responses((status = 200, description = "Declared locations", body = [LocationEntry]))
)]
pub async fn list_locations(State(state): State<SharedState>) -> Json<Vec<LocationEntry>> {
    Json(location_service::list_locations(&state))
}

/// Set a declared location.
#[utoipa::path(
    put,
    path = "/admin/locations/{name}",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Operator token from the configuration"),
        ("name" = String, Path, description = "Declared location name")
    ),
    request_body = SetLocationRequest,
    responses(
        (status = 200, description = "Location saved", body = LocationEntry),
        (status = 404, description = "Location is not declared")
    )
)]
pub async fn set_location(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(payload): Json<SetLocationRequest>,
) -> Result<Json<LocationEntry>, AppError> {
    payload.validate()?;
    Ok(Json(location_service::set_location(
        &state,
        &name,
        payload.into(),
    )?))
}

/// Reject requests whose `X-Admin-Token` header does not match the configured token.
pub(crate) async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    auth_service::verify_admin_token(&state, provided)?;
    Ok(next.run(req).await)
}
