//! Fixed-period driver calling [`PhaseManager::tick`](crate::phase::PhaseManager::tick).

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use crate::{
    phase::{PhaseError, PhaseSnapshot, TickReport},
    services::sse_events,
    state::SharedState,
};

/// Run one tick and announce the new snapshot when a phase was started.
///
/// A phase restarting itself (a single-phase loop) counts as a change.
pub async fn tick_once(state: &SharedState) -> Result<TickReport, PhaseError> {
    let (result, changed) = {
        let mut manager = state.phases().lock().await;
        let before = manager.snapshot();
        let result = manager.tick();
        let after = manager.snapshot();
        let changed = phase_started(&before, &after).then_some(after);
        (result, changed)
    };

    if let Some(snapshot) = changed {
        sse_events::broadcast_phase_changed(state, &snapshot);
    }
    result
}

/// Anything but the counter moving up by one means a transition happened.
fn phase_started(before: &PhaseSnapshot, after: &PhaseSnapshot) -> bool {
    before.group != after.group
        || before.phase != after.phase
        || before.next_phase != after.next_phase
        || after.seconds_passed <= before.seconds_passed
}

/// Tick every `period` until `shutdown` is cancelled. The first tick fires one
/// full period after the call.
pub async fn run(state: SharedState, period: Duration, shutdown: CancellationToken) {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(period_ms = period.as_millis() as u64, "phase ticker started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                match tick_once(&state).await {
                    Ok(TickReport::Advanced { from, to }) => info!(%from, %to, "phase ran out"),
                    Ok(TickReport::Exhausted { phase }) => {
                        trace!(%phase, "phase ran out with nothing left to start")
                    }
                    Ok(_) => {}
                    Err(err) => error!(error = %err, "phase tick failed"),
                }
            }
        }
    }

    info!("phase ticker stopped");
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::Receiver;

    use super::*;
    use crate::{dto::sse::ServerEvent, state::testing::test_state};

    fn phase_changes(receiver: &mut Receiver<ServerEvent>) -> usize {
        let mut count = 0;
        while let Ok(event) = receiver.try_recv() {
            if event.event.as_deref() == Some("phase_changed") {
                count += 1;
            }
        }
        count
    }

    #[tokio::test]
    async fn idle_tick_is_silent() {
        let state = test_state();
        let mut receiver = state.public_sse().subscribe();
        assert_eq!(tick_once(&state).await.unwrap(), TickReport::Idle);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_advances_countdown_and_stops_on_cancel() {
        let state = test_state();
        {
            let mut manager = state.phases().lock().await;
            manager.set_phase_group("lobby_to_game").unwrap();
            manager.start_phase("countdown").unwrap();
        }
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(
            state.clone(),
            Duration::from_secs(1),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        let snapshot = state.phases().lock().await.snapshot();
        assert_eq!(snapshot.phase.as_deref(), Some("match"));
        assert_eq!(snapshot.seconds_passed, 0);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn advancing_tick_broadcasts_phase_change() {
        let state = test_state();
        {
            let mut manager = state.phases().lock().await;
            manager.set_phase_group("lobby_to_game").unwrap();
            manager.start_phase("countdown").unwrap();
            manager.set_seconds_remaining(1).unwrap();
        }
        let mut receiver = state.public_sse().subscribe();

        let report = tick_once(&state).await.unwrap();
        assert_eq!(
            report,
            TickReport::Advanced {
                from: "countdown".into(),
                to: "match".into()
            }
        );

        let mut names = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            names.extend(event.event);
        }
        assert!(names.iter().any(|name| name == "phase_changed"));
    }

    #[tokio::test]
    async fn single_phase_loop_restart_is_announced() {
        let state = test_state();
        {
            let mut manager = state.phases().lock().await;
            manager.set_phase_group("duels").unwrap();
            manager.start_phase("duel").unwrap();
            manager.set_seconds_remaining(2).unwrap();
        }
        let mut receiver = state.public_sse().subscribe();

        assert!(matches!(
            tick_once(&state).await.unwrap(),
            TickReport::Continued { .. }
        ));
        assert_eq!(phase_changes(&mut receiver), 0);

        let report = tick_once(&state).await.unwrap();
        assert_eq!(
            report,
            TickReport::Advanced {
                from: "duel".into(),
                to: "duel".into()
            }
        );
        assert_eq!(phase_changes(&mut receiver), 1);
        assert_eq!(state.phases().lock().await.snapshot().seconds_passed, 0);
    }
}
