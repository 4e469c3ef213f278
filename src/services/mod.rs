/// Operator token checks.
pub mod auth_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Named location management.
pub mod location_service;
/// Operator commands on the phase manager.
pub mod phase_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Fixed-period tick driver.
pub mod ticker;
