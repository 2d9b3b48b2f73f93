use std::sync::Arc;

use bevy::prelude::*;
use vizij_state_machine_core::{
    ClipSample, Config, ParameterBuffers, Phase, StateMachineBlob, StateMachineInstance,
};

/// One running state machine. The blob is shared; the instance and parameters are per entity.
#[derive(Component)]
pub struct StateMachinePlayer {
    pub blob: Arc<StateMachineBlob>,
    pub instance: StateMachineInstance,
    pub params: ParameterBuffers,
}

impl StateMachinePlayer {
    pub fn new(blob: Arc<StateMachineBlob>, cfg: &Config) -> Self {
        let instance = StateMachineInstance::new(&blob, cfg);
        let params = ParameterBuffers::from_layout(&blob.parameters);
        Self {
            blob,
            instance,
            params,
        }
    }
}

/// Pose-sampling request written by the advance system every frame.
#[derive(Component, Debug, Clone)]
pub struct StateMachineSamples {
    pub phase: Phase,
    pub state_index: u32,
    pub samples: Vec<ClipSample>,
}

impl Default for StateMachineSamples {
    fn default() -> Self {
        Self {
            phase: Phase::Steady,
            state_index: 0,
            samples: Vec::new(),
        }
    }
}

/// Player plus its output slot.
#[derive(Bundle)]
pub struct StateMachineBundle {
    pub player: StateMachinePlayer,
    pub samples: StateMachineSamples,
}

impl StateMachineBundle {
    pub fn new(blob: Arc<StateMachineBlob>, cfg: &Config) -> Self {
        Self {
            player: StateMachinePlayer::new(blob, cfg),
            samples: StateMachineSamples::default(),
        }
    }
}
