use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

use crate::{
    dto::sse::{AnnouncementEvent, BarTitleEvent, PhaseChangedEvent, ServerEvent},
    phase::{EventBar, PhaseSnapshot, configured::Announcer},
    state::{SharedState, SseHub},
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_BAR_TITLE: &str = "bar.title";
const EVENT_ANNOUNCEMENT: &str = "announcement";

/// Broadcast a phase change notification carrying the new snapshot.
pub fn broadcast_phase_changed(state: &SharedState, snapshot: &PhaseSnapshot) {
    let payload = PhaseChangedEvent(snapshot.clone());
    send_event(state.public_sse(), EVENT_PHASE_CHANGED, &payload);
}

fn send_event(hub: &SseHub, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => hub.broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

/// Event bar rendered by SSE clients. Only title changes are sent.
pub struct BroadcastEventBar {
    hub: SseHub,
    last: Mutex<Option<String>>,
}

impl BroadcastEventBar {
    /// Publish titles on `hub`.
    pub fn new(hub: SseHub) -> Self {
        Self {
            hub,
            last: Mutex::new(None),
        }
    }
}

impl EventBar for BroadcastEventBar {
    fn set_title(&self, title: &str) {
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_deref() == Some(title) {
                return;
            }
            *last = Some(title.to_owned());
        }
        let payload = BarTitleEvent {
            title: title.to_owned(),
        };
        send_event(&self.hub, EVENT_BAR_TITLE, &payload);
    }
}

/// Announcements delivered as SSE events.
pub struct SseAnnouncer {
    hub: SseHub,
}

impl SseAnnouncer {
    /// Publish announcements on `hub`.
    pub fn new(hub: SseHub) -> Self {
        Self { hub }
    }
}

impl Announcer for SseAnnouncer {
    fn announce(&self, message: &str) {
        let payload = AnnouncementEvent {
            message: message.to_owned(),
        };
        send_event(&self.hub, EVENT_ANNOUNCEMENT, &payload);
    }
}
