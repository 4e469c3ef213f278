//! Operator commands driving the phase manager: set, start, skip and timer,
//! plus the read-only views and the join/leave forwarding.

use tracing::info;

use crate::{
    dto::phase::{GroupSummary, SetPhaseRequest, SkipRequest, StartGroupRequest, TimerRequest},
    error::ServiceError,
    phase::{PhaseManager, PhaseRef, PhaseSnapshot, Player},
    services::sse_events,
    state::SharedState,
};

/// Current phase state.
pub async fn snapshot(state: &SharedState) -> PhaseSnapshot {
    state.phases().lock().await.snapshot()
}

/// Every registered group, in registration order.
pub async fn groups(state: &SharedState) -> Vec<GroupSummary> {
    let manager = state.phases().lock().await;
    manager.groups().map(GroupSummary::from).collect()
}

/// Set or start a phase of the active group.
///
/// Refused when the phase requires unset locations, unless `force` is given.
pub async fn set_phase(
    state: &SharedState,
    request: SetPhaseRequest,
) -> Result<PhaseSnapshot, ServiceError> {
    transition(state, |manager| {
        let phase = manager
            .find_phase(&request.phase)
            .ok_or_else(|| ServiceError::NotFound(format!("phase `{}`", request.phase)))?;
        if request.timer.is_some() {
            ensure_countdown(&phase)?;
        }
        if !request.force {
            ensure_locations(state, phase.spec().required_locations())?;
        }

        if request.raw {
            manager.set_phase(&request.phase)?;
        } else {
            manager.start_phase(&request.phase)?;
        }
        if let Some(seconds) = request.timer {
            manager.set_seconds_remaining(seconds)?;
        }
        info!(phase = %request.phase, raw = request.raw, "phase changed by operator");
        Ok(())
    })
    .await
}

/// Activate a group.
///
/// Without `phase`, or when `phase` is what the group would start next anyway,
/// the group is started with its start script. Otherwise the group is only set
/// and `phase` is set or started directly.
pub async fn start_group(
    state: &SharedState,
    request: StartGroupRequest,
) -> Result<PhaseSnapshot, ServiceError> {
    transition(state, |manager| {
        let group = manager
            .group(&request.group)
            .ok_or_else(|| ServiceError::NotFound(format!("phase group `{}`", request.group)))?;
        if let Some(phase) = request.phase.as_deref().filter(|p| !group.contains(p)) {
            return Err(ServiceError::InvalidInput(format!(
                "phase `{phase}` is not part of group `{}`",
                request.group
            )));
        }
        if !request.force {
            ensure_locations(state, &group.required_event_locations())?;
        }

        let next = group.peek_next();
        let jump = request
            .phase
            .as_deref()
            .filter(|phase| next.as_ref().map(|p| p.name()) != Some(*phase));
        if request.timer.is_some() {
            let target = match jump {
                Some(phase) => group.phase(phase).cloned(),
                None => next,
            };
            if let Some(target) = target {
                ensure_countdown(&target)?;
            }
        }

        match jump {
            Some(phase) => {
                manager.set_phase_group(&request.group)?;
                if request.raw {
                    manager.set_phase(phase)?;
                } else {
                    manager.start_phase(phase)?;
                }
            }
            None => {
                manager.start_phase_group(&request.group)?;
            }
        }
        if let Some(seconds) = request.timer {
            manager.set_seconds_remaining(seconds)?;
        }
        info!(group = %request.group, phase = ?jump, "phase group started by operator");
        Ok(())
    })
    .await
}

/// Start the next phase `count` times in a row.
///
/// Fails with [`ServiceError::Exhausted`] only when not even one phase could be started.
pub async fn skip(state: &SharedState, request: SkipRequest) -> Result<PhaseSnapshot, ServiceError> {
    transition(state, |manager| {
        for skipped in 0..request.count {
            if manager.start_next_phase()?.is_none() {
                if skipped == 0 {
                    return Err(ServiceError::Exhausted);
                }
                break;
            }
        }
        Ok(())
    })
    .await
}

/// Change the countdown of the current phase.
pub async fn set_timer(
    state: &SharedState,
    request: TimerRequest,
) -> Result<PhaseSnapshot, ServiceError> {
    transition(state, |manager| {
        manager.set_seconds_remaining(request.seconds)?;
        Ok(())
    })
    .await
}

/// Forward a join to the current phase.
pub async fn player_joined(state: &SharedState, player: Player) -> Result<(), ServiceError> {
    state.phases().lock().await.player_joined(&player)?;
    Ok(())
}

/// Forward a leave to the current phase.
pub async fn player_left(state: &SharedState, player: Player) -> Result<(), ServiceError> {
    state.phases().lock().await.player_left(&player)?;
    Ok(())
}

/// Run `op` under the manager lock and announce the new snapshot when it differs.
///
/// The announcement also goes out when `op` fails half-way, since hooks may
/// fail after the transition was applied.
async fn transition<F>(state: &SharedState, op: F) -> Result<PhaseSnapshot, ServiceError>
where
    F: FnOnce(&mut PhaseManager) -> Result<(), ServiceError>,
{
    let (outcome, before, after) = {
        let mut manager = state.phases().lock().await;
        let before = manager.snapshot();
        let outcome = op(&mut manager);
        (outcome, before, manager.snapshot())
    };

    if before != after {
        sse_events::broadcast_phase_changed(state, &after);
    }
    outcome.map(|()| after)
}

fn ensure_countdown(phase: &PhaseRef) -> Result<(), ServiceError> {
    if phase.duration().is_infinite() {
        return Err(ServiceError::InvalidInput(format!(
            "phase `{}` has no countdown, a timer cannot be applied",
            phase.name()
        )));
    }
    Ok(())
}

fn ensure_locations(state: &SharedState, required: &[String]) -> Result<(), ServiceError> {
    let unset = state.locations().unset(required);
    if unset.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::MissingLocations(unset))
    }
}
