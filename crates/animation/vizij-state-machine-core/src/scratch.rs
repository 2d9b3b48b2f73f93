//! Per-instance scratch buffers and frame lifecycle.
//!
//! Buffers are sized once from the blob (largest state clip count) so that steady-state
//! ticks reuse their capacity and never allocate.

use crate::blob::StateMachineBlob;
use crate::config::Config;
use crate::runtime::ClipSample;

#[derive(Debug, Default, Clone)]
pub struct Scratch {
    /// Pose-sampling request built during the current tick.
    pub samples: Vec<ClipSample>,
    /// Blend weights of the state being evaluated, one per clip.
    pub weights: Vec<f32>,
}

impl Scratch {
    pub fn new(cfg: &Config, blob: &StateMachineBlob) -> Self {
        let per_state = (blob.max_clips_per_state as usize).max(1);
        Self {
            // A transition samples two states at once.
            samples: Vec::with_capacity(cfg.scratch_samples.max(2 * per_state)),
            weights: vec![0.0; per_state],
        }
    }

    #[inline]
    pub fn begin_frame(&mut self) {
        self.samples.clear();
    }
}
