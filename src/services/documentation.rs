use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the event conductor.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::public::get_phase,
        crate::routes::public::list_groups,
        crate::routes::admin::set_phase,
        crate::routes::admin::start_group,
        crate::routes::admin::skip,
        crate::routes::admin::set_timer,
        crate::routes::admin::list_locations,
        crate::routes::admin::set_location,
        crate::routes::host::player_joined,
        crate::routes::host::player_left,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::phase::SetPhaseRequest,
            crate::dto::phase::StartGroupRequest,
            crate::dto::phase::SkipRequest,
            crate::dto::phase::TimerRequest,
            crate::dto::phase::GroupSummary,
            crate::dto::location::SetLocationRequest,
            crate::dto::location::LocationEntry,
            crate::dto::player::PlayerEventRequest,
            crate::dto::sse::Handshake,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::BarTitleEvent,
            crate::dto::sse::AnnouncementEvent,
            crate::phase::PhaseSnapshot,
            crate::phase::PhaseDuration,
            crate::phase::GroupOrdering,
            crate::world::SafeLocation,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "public", description = "Read-only phase state"),
        (name = "admin", description = "Operator commands driving the phases"),
        (name = "host", description = "Notifications from the game host"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_operator_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in ["/phase", "/admin/phase/start", "/admin/locations/{name}", "/host/players/join"] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {expected}");
        }
    }
}
