use axum::{Json, Router, extract::State, http::StatusCode, middleware, routing::post};
use validator::Validate;

use crate::{
    dto::player::PlayerEventRequest, error::AppError, routes::admin::require_admin_token,
    services::phase_service, state::SharedState,
};

/// Join and leave notifications pushed by the game host.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/host/players/join", post(player_joined))
        .route("/host/players/leave", post(player_left))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Forward a player join to the current phase.
#[utoipa::path(
    post,
    path = "/host/players/join",
    tag = "host",
    params(("X-Admin-Token" = String, Header, description = "Operator token from the configuration")),
    request_body = PlayerEventRequest,
    responses(
        (status = 204, description = "Forwarded"),
        (status = 500, description = "The phase rejected the player")
    )
)]
pub async fn player_joined(
    State(state): State<SharedState>,
    Json(payload): Json<PlayerEventRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    phase_service::player_joined(&state, payload.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Forward a player leave to the current phase.
#[utoipa::path(
    post,
    path = "/host/players/leave",
    tag = "host",
    params(("X-Admin-Token" = String, Header, description = "Operator token from the configuration")),
    request_body = PlayerEventRequest,
    responses((status = 204, description = "Forwarded"))
)]
pub async fn player_left(
    State(state): State<SharedState>,
    Json(payload): Json<PlayerEventRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    phase_service::player_left(&state, payload.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}
