//! Bevy adapter for `vizij-state-machine-core`.
//!
//! Each entity carrying a `StateMachinePlayer` is advanced once per `Update`; the resulting
//! pose-sampling request lands in its `StateMachineSamples` for an animation system to consume.

use bevy::prelude::*;

pub mod components;
pub mod resources;
pub mod systems;

pub use components::{StateMachineBundle, StateMachinePlayer, StateMachineSamples};
pub use resources::{SetStateMachineParameter, StateMachineConfig, StateMachineTimeStep};

pub struct VizijStateMachinePlugin;

impl Plugin for VizijStateMachinePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StateMachineTimeStep>()
            .init_resource::<StateMachineConfig>()
            .add_event::<SetStateMachineParameter>()
            .add_systems(
                Update,
                (
                    systems::apply_parameter_events_system,
                    systems::advance_state_machines_system,
                )
                    .chain(),
            );
    }
}
