//! Core configuration for vizij-state-machine-core.

use serde::{Deserialize, Serialize};

/// Bake policy and runtime sizing hints.
/// Keep this minimal; expand as needed without breaking API.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fail the bake on unresolvable entry states and transition targets instead of
    /// logging a warning and falling back to state index 0.
    pub strict_resolution: bool,

    /// Warn when a sub-machine declares exit states without exit transitions (or the
    /// reverse). Such sub-machines never produce an exit group either way.
    pub warn_incomplete_exit_groups: bool,

    /// Size of the global clip index space. Baked clip indices are `u16`.
    pub max_clips: usize,

    /// Initial capacity hint for each instance's sampling scratch buffer.
    pub scratch_samples: usize,

    /// Initial capacity hint for each instance's navigation stack.
    pub initial_navigation_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strict_resolution: false,
            warn_incomplete_exit_groups: true,
            max_clips: u16::MAX as usize + 1,
            scratch_samples: 16,
            initial_navigation_depth: 4,
        }
    }
}

impl Config {
    /// Default config with strict reference resolution turned on.
    pub fn strict() -> Self {
        Self {
            strict_resolution: true,
            ..Self::default()
        }
    }
}
