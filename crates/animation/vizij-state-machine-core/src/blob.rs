//! Baked state machine blob: flat, index-addressed arrays with no internal pointers.
//!
//! Variable-length lists (a state's transitions, a transition's conditions and curve
//! keyframes, a blend state's clips, an exit group's states) are `IndexRange`s into
//! shared pools owned by the blob, so the whole artifact is a handful of contiguous
//! arrays that can be bulk-copied or serialized as-is. The converter is the only writer.

use serde::{Deserialize, Serialize};

use crate::curve::PackedKeyframe;
use crate::error::BakeError;
use crate::graph::{Blend2DAlgorithm, IntComparator};
use crate::parameters::{NumericParameter, ParameterKind, ParameterLayout};

/// `[start, start + len)` into one of the blob's pools.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: u32,
    pub len: u32,
}

impl IndexRange {
    pub const EMPTY: IndexRange = IndexRange { start: 0, len: 0 };

    /// Range at `start` in a pool; both ends must fit the 32-bit offsets.
    pub fn new(start: usize, len: usize) -> Result<Self, BakeError> {
        match (u32::try_from(start), u32::try_from(len)) {
            (Ok(s), Ok(l)) if s.checked_add(l).is_some() => Ok(Self { start: s, len: l }),
            _ => {
                let count = start.saturating_add(len);
                log::error!("baked pool would hold {count} entries");
                Err(BakeError::PoolOverflow {
                    count,
                    max: u32::MAX as usize,
                })
            }
        }
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.start as usize + self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn of<'b, T>(&self, pool: &'b [T]) -> &'b [T] {
        &pool[self.start as usize..self.end()]
    }

    fn fits(&self, pool_len: usize) -> bool {
        self.end() <= pool_len
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    SingleClip,
    LinearBlend,
    Directional2DBlend,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakedState {
    pub state_type: StateType,
    /// Index into the per-type array selected by `state_type`.
    pub type_index: u32,
    pub looping: bool,
    pub speed: f32,
    /// Float parameter multiplied into `speed`.
    pub speed_parameter: Option<u16>,
    /// Range into `StateMachineBlob::transitions`.
    pub transitions: IndexRange,
    pub exit_transition_group_index: i32,
    pub sub_machine_index: i32,
    pub name_hash: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SingleClipState {
    pub clip_index: u16,
}

/// Linear blend state. Its `clips` range addresses the three parallel
/// `linear_blend_*` pools, sorted ascending by threshold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearBlendState {
    pub blend_parameter: NumericParameter,
    pub clips: IndexRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Directional2DClipEntry {
    pub clip_index: u16,
    pub position: [f32; 2],
    pub speed: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Directional2DBlendState {
    pub parameter_x: u16,
    pub parameter_y: u16,
    pub algorithm: Blend2DAlgorithm,
    /// Range into `directional_2d_clips`.
    pub clips: IndexRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakedBoolCondition {
    pub parameter_index: u16,
    pub comparison_value: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakedIntCondition {
    pub parameter_index: u16,
    pub comparator: IntComparator,
    pub comparison_value: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakedTransition {
    pub to_state_index: u32,
    /// Blend duration in seconds.
    pub duration: f32,
    pub has_end_time: bool,
    /// Normalized exit time of the source state.
    pub end_time: f32,
    /// Normalized start time of the target state.
    pub offset: f32,
    pub bool_conditions: IndexRange,
    pub int_conditions: IndexRange,
    /// Range into `curve_keyframes`; empty means linear.
    pub curve: IndexRange,
    pub can_transition_to_self: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExitTransitionGroup {
    pub sub_machine_index: u32,
    /// Range into `exit_state_indices`.
    pub exit_states: IndexRange,
    /// Range into `transitions`.
    pub transitions: IndexRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakedSubMachine {
    pub parent: i32,
    pub level: u16,
    pub entry_state_index: u32,
    pub name_hash: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakedClip {
    pub duration: f32,
    pub name_hash: u32,
}

/// Immutable compiled state machine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMachineBlob {
    pub name_hash: u32,
    pub default_state_index: u32,
    pub parameters: ParameterLayout,

    pub states: Vec<BakedState>,
    pub single_clip_states: Vec<SingleClipState>,
    pub linear_blend_states: Vec<LinearBlendState>,
    pub linear_blend_clip_indexes: Vec<u16>,
    pub linear_blend_thresholds: Vec<f32>,
    pub linear_blend_speeds: Vec<f32>,
    pub directional_2d_blend_states: Vec<Directional2DBlendState>,
    pub directional_2d_clips: Vec<Directional2DClipEntry>,

    /// Pool of every transition: per-state, any-state and exit transitions.
    pub transitions: Vec<BakedTransition>,
    pub bool_conditions: Vec<BakedBoolCondition>,
    pub int_conditions: Vec<BakedIntCondition>,
    pub curve_keyframes: Vec<PackedKeyframe>,

    /// Range into `transitions`.
    pub any_state_transitions: IndexRange,
    pub exit_transition_groups: Vec<ExitTransitionGroup>,
    pub exit_state_indices: Vec<u32>,

    pub sub_machines: Vec<BakedSubMachine>,
    pub clips: Vec<BakedClip>,
    /// Largest clip count of any single state; sizes per-instance scratch.
    pub max_clips_per_state: u32,
}

impl StateMachineBlob {
    #[inline]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn transitions_of(&self, state: &BakedState) -> &[BakedTransition] {
        state.transitions.of(&self.transitions)
    }

    #[inline]
    pub fn any_state_transitions(&self) -> &[BakedTransition] {
        self.any_state_transitions.of(&self.transitions)
    }

    #[inline]
    pub fn bool_conditions_of(&self, t: &BakedTransition) -> &[BakedBoolCondition] {
        t.bool_conditions.of(&self.bool_conditions)
    }

    #[inline]
    pub fn int_conditions_of(&self, t: &BakedTransition) -> &[BakedIntCondition] {
        t.int_conditions.of(&self.int_conditions)
    }

    #[inline]
    pub fn curve_of(&self, t: &BakedTransition) -> &[PackedKeyframe] {
        t.curve.of(&self.curve_keyframes)
    }

    #[inline]
    pub fn exit_states_of(&self, group: &ExitTransitionGroup) -> &[u32] {
        group.exit_states.of(&self.exit_state_indices)
    }

    #[inline]
    pub fn exit_transitions_of(&self, group: &ExitTransitionGroup) -> &[BakedTransition] {
        group.transitions.of(&self.transitions)
    }

    /// Sorted `(clip indexes, thresholds, speeds)` of a linear blend state.
    #[inline]
    pub fn linear_blend_clips(&self, blend: &LinearBlendState) -> (&[u16], &[f32], &[f32]) {
        (
            blend.clips.of(&self.linear_blend_clip_indexes),
            blend.clips.of(&self.linear_blend_thresholds),
            blend.clips.of(&self.linear_blend_speeds),
        )
    }

    #[inline]
    pub fn directional_clips(&self, blend: &Directional2DBlendState) -> &[Directional2DClipEntry] {
        blend.clips.of(&self.directional_2d_clips)
    }

    /// Number of clips a state samples.
    pub fn clip_count_of(&self, state: &BakedState) -> usize {
        match state.state_type {
            StateType::SingleClip => 1,
            StateType::LinearBlend => self.linear_blend_states[state.type_index as usize].clips.len as usize,
            StateType::Directional2DBlend => {
                self.directional_2d_blend_states[state.type_index as usize].clips.len as usize
            }
        }
    }

    /// Re-check that every stored index is in bounds for its target array.
    ///
    /// The converter guarantees this by construction; the runtime never calls it per tick.
    pub fn validate(&self) -> Result<(), String> {
        let n_states = self.states.len();
        if n_states > 0 && self.default_state_index as usize >= n_states {
            return Err(format!("default state {} out of range", self.default_state_index));
        }
        for (i, s) in self.states.iter().enumerate() {
            let type_len = match s.state_type {
                StateType::SingleClip => self.single_clip_states.len(),
                StateType::LinearBlend => self.linear_blend_states.len(),
                StateType::Directional2DBlend => self.directional_2d_blend_states.len(),
            };
            if s.type_index as usize >= type_len {
                return Err(format!("state {i}: type index {} out of range", s.type_index));
            }
            if !s.transitions.fits(self.transitions.len()) {
                return Err(format!("state {i}: transition range out of bounds"));
            }
            if s.exit_transition_group_index >= self.exit_transition_groups.len() as i32 {
                return Err(format!("state {i}: exit group out of range"));
            }
            if s.sub_machine_index >= self.sub_machines.len() as i32 {
                return Err(format!("state {i}: sub-machine out of range"));
            }
            if let Some(p) = s.speed_parameter {
                if p as usize >= self.parameters.floats.len() {
                    return Err(format!("state {i}: speed parameter out of range"));
                }
            }
        }
        for (i, s) in self.single_clip_states.iter().enumerate() {
            if s.clip_index as usize >= self.clips.len() {
                return Err(format!("single clip state {i}: clip out of range"));
            }
        }
        for (i, b) in self.linear_blend_states.iter().enumerate() {
            let pool = self.linear_blend_clip_indexes.len();
            if !b.clips.fits(pool)
                || self.linear_blend_thresholds.len() != pool
                || self.linear_blend_speeds.len() != pool
            {
                return Err(format!("linear blend {i}: clip range out of bounds"));
            }
            if !self.numeric_in_range(b.blend_parameter) {
                return Err(format!("linear blend {i}: blend parameter out of range"));
            }
            let (clips, thresholds, _) = self.linear_blend_clips(b);
            if clips.iter().any(|c| *c as usize >= self.clips.len()) {
                return Err(format!("linear blend {i}: clip out of range"));
            }
            if thresholds.windows(2).any(|w| w[0] > w[1]) {
                return Err(format!("linear blend {i}: thresholds not sorted"));
            }
        }
        for (i, b) in self.directional_2d_blend_states.iter().enumerate() {
            if !b.clips.fits(self.directional_2d_clips.len()) {
                return Err(format!("2d blend {i}: clip range out of bounds"));
            }
            let floats = self.parameters.floats.len();
            if b.parameter_x as usize >= floats || b.parameter_y as usize >= floats {
                return Err(format!("2d blend {i}: parameter out of range"));
            }
            if self
                .directional_clips(b)
                .iter()
                .any(|c| c.clip_index as usize >= self.clips.len())
            {
                return Err(format!("2d blend {i}: clip out of range"));
            }
        }
        if !self.any_state_transitions.fits(self.transitions.len()) {
            return Err("any-state transition range out of bounds".into());
        }
        for (i, t) in self.transitions.iter().enumerate() {
            if t.to_state_index as usize >= n_states {
                return Err(format!("transition {i}: target {} out of range", t.to_state_index));
            }
            if !t.bool_conditions.fits(self.bool_conditions.len())
                || !t.int_conditions.fits(self.int_conditions.len())
                || !t.curve.fits(self.curve_keyframes.len())
            {
                return Err(format!("transition {i}: pool range out of bounds"));
            }
        }
        if self
            .bool_conditions
            .iter()
            .any(|c| c.parameter_index as usize >= self.parameters.bools.len())
        {
            return Err("bool condition parameter out of range".into());
        }
        if self
            .int_conditions
            .iter()
            .any(|c| c.parameter_index as usize >= self.parameters.ints.len())
        {
            return Err("int condition parameter out of range".into());
        }
        for (i, g) in self.exit_transition_groups.iter().enumerate() {
            if !g.exit_states.fits(self.exit_state_indices.len()) || !g.transitions.fits(self.transitions.len()) {
                return Err(format!("exit group {i}: range out of bounds"));
            }
            if g.sub_machine_index as usize >= self.sub_machines.len() {
                return Err(format!("exit group {i}: sub-machine out of range"));
            }
        }
        if self.exit_state_indices.iter().any(|s| *s as usize >= n_states) {
            return Err("exit state index out of range".into());
        }
        for (i, m) in self.sub_machines.iter().enumerate() {
            if m.parent >= i as i32 {
                return Err(format!("sub-machine {i}: parent must precede it"));
            }
            if m.entry_state_index as usize >= n_states.max(1) {
                return Err(format!("sub-machine {i}: entry state out of range"));
            }
        }
        Ok(())
    }

    fn numeric_in_range(&self, p: NumericParameter) -> bool {
        match p.kind {
            ParameterKind::Int => (p.index as usize) < self.parameters.ints.len(),
            ParameterKind::Float => (p.index as usize) < self.parameters.floats.len(),
            ParameterKind::Bool => false,
        }
    }
}

/// Export a blob as serde_json::Value.
pub fn export_blob_json(blob: &StateMachineBlob) -> serde_json::Value {
    serde_json::to_value(blob).unwrap_or(serde_json::Value::Null)
}
