use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dto::validation::validate_name, world::SafeLocation};

/// Payload setting a named location.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SetLocationRequest {
    /// World the location belongs to.
    #[validate(custom(function = "validate_name"))]
    pub world: String,
    /// Horizontal coordinates are bounded by the host's world border.
    /// East-west coordinate.
    #[validate(range(min = -30000000.0, max = 30000000.0))]
    pub x: f64,
    /// Height.
    #[validate(range(min = -2048.0, max = 4096.0))]
    pub y: f64,
    /// North-south coordinate.
    #[validate(range(min = -30000000.0, max = 30000000.0))]
    pub z: f64,
    /// Horizontal facing, in degrees.
    #[serde(default)]
    pub yaw: f32,
    /// Vertical facing, in degrees.
    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0))]
    pub pitch: f32,
}

impl From<SetLocationRequest> for SafeLocation {
    fn from(value: SetLocationRequest) -> Self {
        Self {
            world: value.world,
            x: value.x,
            y: value.y,
            z: value.z,
            yaw: value.yaw,
            pitch: value.pitch,
        }
    }
}

/// A declared location and its value, if set.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationEntry {
    /// Declared location name.
    pub name: String,
    /// `null` until an operator sets it.
    pub location: Option<SafeLocation>,
}
