use serde::Serialize;
use utoipa::ToSchema;

use crate::phase::PhaseSnapshot;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name; `None` sends an unnamed message.
    pub event: Option<String>,
    /// Payload, usually JSON.
    pub data: String,
}

impl ServerEvent {
    /// Build an event carrying a raw text payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Phase state at connection time.
    pub phase: PhaseSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever the current phase or group changes.
pub struct PhaseChangedEvent(pub PhaseSnapshot);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the event bar title changes.
pub struct BarTitleEvent {
    /// Text now shown on the event bar.
    pub title: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// Player-facing announcement made by a phase or group.
pub struct AnnouncementEvent {
    /// Text to show to everyone.
    pub message: String,
}
