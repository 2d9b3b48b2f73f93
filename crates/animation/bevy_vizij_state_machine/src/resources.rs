use bevy::prelude::*;
use vizij_state_machine_core::{Config, ParameterValue};

/// Fixed seconds per tick. `None` follows `Time::delta_seconds`.
#[derive(Resource, Default, Clone, Copy, Debug)]
pub struct StateMachineTimeStep(pub Option<f32>);

/// Config hosts pass to `StateMachineBundle::new` when spawning players.
#[derive(Resource, Default, Clone, Debug)]
pub struct StateMachineConfig(pub Config);

/// Set a parameter on one entity's state machine by name.
#[derive(Event, Clone, Debug)]
pub struct SetStateMachineParameter {
    pub entity: Entity,
    pub name: String,
    pub value: ParameterValue,
}
