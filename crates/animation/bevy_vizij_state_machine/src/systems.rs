use bevy::prelude::*;

use crate::components::{StateMachinePlayer, StateMachineSamples};
use crate::resources::{SetStateMachineParameter, StateMachineTimeStep};

pub fn apply_parameter_events_system(
    mut events: EventReader<SetStateMachineParameter>,
    mut players: Query<&mut StateMachinePlayer>,
) {
    for e in events.read() {
        let Ok(mut player) = players.get_mut(e.entity) else {
            warn!("parameter '{}' sent to {:?}, which has no state machine", e.name, e.entity);
            continue;
        };
        if !player.params.set(&e.name, e.value) {
            warn!("state machine on {:?} has no {:?} parameter '{}'", e.entity, e.value.kind(), e.name);
        }
    }
}

/// Advance every player in parallel and stage its sampling request.
pub fn advance_state_machines_system(
    time: Res<Time>,
    step: Res<StateMachineTimeStep>,
    mut players: Query<(&mut StateMachinePlayer, &mut StateMachineSamples)>,
) {
    let dt = step.0.unwrap_or_else(|| time.delta_seconds());
    players.par_iter_mut().for_each(|(mut player, mut out)| {
        let StateMachinePlayer {
            blob,
            instance,
            params,
        } = &mut *player;
        let tick = instance.advance(blob.as_ref(), dt, params);
        out.phase = tick.phase;
        out.state_index = tick.state_index;
        out.samples.clear();
        out.samples.extend_from_slice(tick.samples);
    });
}
