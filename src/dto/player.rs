use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::phase::Player;

/// Join or leave notification sent by the game host.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerEventRequest {
    /// Stable player id.
    pub id: Uuid,
    /// Display name.
    #[validate(length(min = 1, max = 32))]
    pub name: String,
}

impl From<PlayerEventRequest> for Player {
    fn from(value: PlayerEventRequest) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}
