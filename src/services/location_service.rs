use tracing::info;

use crate::{
    dto::location::LocationEntry, error::ServiceError, state::SharedState, world::SafeLocation,
};

/// Every declared location with its value, sorted by name.
pub fn list_locations(state: &SharedState) -> Vec<LocationEntry> {
    state
        .locations()
        .entries()
        .into_iter()
        .map(|(name, location)| LocationEntry { name, location })
        .collect()
}

/// Set a declared location and persist the registry.
pub fn set_location(
    state: &SharedState,
    name: &str,
    location: SafeLocation,
) -> Result<LocationEntry, ServiceError> {
    if !state.locations().set(name, location.clone())? {
        return Err(ServiceError::NotFound(format!("location `{name}` is not declared")));
    }
    info!(location = %name, world = %location.world, "location set");
    Ok(LocationEntry {
        name: name.to_owned(),
        location: Some(location),
    })
}
