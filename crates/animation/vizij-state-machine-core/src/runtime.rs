//! Runtime evaluator: advances one instance of a baked state machine per tick.
//!
//! Per tick, in order:
//! 1. When Steady, pick the first passing transition from: any-state transitions, then the
//!    current state's transitions, then its exit group's transitions (if it is an exit state).
//! 2. While Transitioning, advance the blend. Raw progress `p = elapsed / duration`; at
//!    `p >= 1` the instance snaps to Steady in the target state.
//! 3. Advance playback time of every sampled state and emit the pose-sampling request.
//!
//! The blob is trusted: indices are not re-validated per tick. An out-of-range transition
//! target trips a debug assertion and is ignored in release builds. Nothing here allocates
//! once the instance is constructed.

use serde::{Deserialize, Serialize};

use crate::blend::{directional_blend_weights, linear_blend_weights};
use crate::blob::{BakedState, BakedTransition, StateMachineBlob, StateType};
use crate::config::Config;
use crate::curve::transition_weight;
use crate::navigation::NavigationStack;
use crate::parameters::ParameterBuffers;
use crate::scratch::Scratch;

const MIN_DURATION: f32 = 1e-6;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Steady,
    Transitioning,
}

/// Which list a transition was selected from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionSource {
    AnyState,
    State,
    ExitGroup,
}

/// One clip to sample this tick.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipSample {
    pub clip_index: u16,
    /// Sample time in seconds within the clip.
    pub time: f32,
    /// Wrapped (looping) or clamped normalized time of the owning state.
    pub normalized_time: f32,
    pub weight: f32,
}

/// Playback position of one state.
///
/// Completed loops are counted separately from the position inside the current loop,
/// so time resolution does not degrade however long a looping state plays.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatePlayback {
    pub state_index: u32,
    pub loops: u32,
    /// Position within the current loop, in [0, 1).
    /// Non-looping states never count loops and stop at 1.
    pub fraction: f32,
}

impl StatePlayback {
    /// Playback of `state_index` starting at an unwrapped `normalized_time`.
    pub fn at(state_index: u32, normalized_time: f32, looping: bool) -> Self {
        let mut playback = Self {
            state_index,
            loops: 0,
            fraction: 0.0,
        };
        playback.step(normalized_time, looping);
        playback
    }

    /// Unwrapped normalized time: 1.5 is halfway through the second loop.
    #[inline]
    pub fn normalized_time(&self) -> f32 {
        self.loops as f32 + self.fraction
    }

    /// Move by `delta` normalized units.
    #[inline]
    fn step(&mut self, delta: f32, looping: bool) {
        let t = self.fraction + delta;
        if !looping {
            self.fraction = t.clamp(0.0, 1.0);
            return;
        }
        let whole = t.floor();
        self.fraction = t - whole;
        if self.fraction >= 1.0 {
            self.fraction = 0.0;
        }
        if whole >= 0.0 {
            self.loops = self.loops.saturating_add(whole as u32);
        } else {
            // playing backwards
            self.loops = self.loops.saturating_sub((-whole) as u32);
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveTransition {
    pub from: StatePlayback,
    /// Index into `StateMachineBlob::transitions`.
    pub transition_index: u32,
    pub source: TransitionSource,
    pub elapsed: f32,
    pub duration: f32,
}

/// Result of one `advance` call.
#[derive(Debug, PartialEq)]
pub struct Tick<'a> {
    pub phase: Phase,
    /// Current state (the target while transitioning).
    pub state_index: u32,
    /// Weight of the current state; 1 when steady.
    pub blend_weight: f32,
    /// Set when a transition was selected during this tick.
    pub started: Option<TransitionSource>,
    pub samples: &'a [ClipSample],
}

/// Evaluate a transition's exit-time gate and condition conjunction.
#[inline]
pub fn transition_passes(
    blob: &StateMachineBlob,
    t: &BakedTransition,
    normalized_time: f32,
    params: &ParameterBuffers,
) -> bool {
    if t.has_end_time && normalized_time < t.end_time {
        return false;
    }
    blob.bool_conditions_of(t)
        .iter()
        .all(|c| params.bool(c.parameter_index) == c.comparison_value)
        && blob
            .int_conditions_of(t)
            .iter()
            .all(|c| c.comparator.holds(params.int(c.parameter_index), c.comparison_value))
}

/// First passing transition for a steady instance, as a global transition index.
pub fn select_transition(
    blob: &StateMachineBlob,
    current: &StatePlayback,
    params: &ParameterBuffers,
) -> Option<(u32, TransitionSource)> {
    let state = blob.states.get(current.state_index as usize)?;
    let time = current.normalized_time();

    let any = blob.any_state_transitions;
    for (i, t) in blob.any_state_transitions().iter().enumerate() {
        if t.to_state_index == current.state_index && !t.can_transition_to_self {
            continue;
        }
        if transition_passes(blob, t, time, params) {
            return Some((any.start + i as u32, TransitionSource::AnyState));
        }
    }

    for (i, t) in blob.transitions_of(state).iter().enumerate() {
        if transition_passes(blob, t, time, params) {
            return Some((state.transitions.start + i as u32, TransitionSource::State));
        }
    }

    if state.exit_transition_group_index >= 0 {
        let group = &blob.exit_transition_groups[state.exit_transition_group_index as usize];
        for (i, t) in blob.exit_transitions_of(group).iter().enumerate() {
            if transition_passes(blob, t, time, params) {
                return Some((group.transitions.start + i as u32, TransitionSource::ExitGroup));
            }
        }
    }
    None
}

/// Fill `weights[..n]` with the per-clip blend weights of `state`; returns `n`.
fn state_weights(
    blob: &StateMachineBlob,
    state: &BakedState,
    params: &ParameterBuffers,
    weights: &mut [f32],
) -> usize {
    match state.state_type {
        StateType::SingleClip => {
            weights[0] = 1.0;
            1
        }
        StateType::LinearBlend => {
            let blend = &blob.linear_blend_states[state.type_index as usize];
            let (_, thresholds, _) = blob.linear_blend_clips(blend);
            let n = thresholds.len();
            linear_blend_weights(thresholds, params.numeric(blend.blend_parameter), &mut weights[..n]);
            n
        }
        StateType::Directional2DBlend => {
            let blend = &blob.directional_2d_blend_states[state.type_index as usize];
            let clips = blob.directional_clips(blend);
            let n = clips.len();
            let input = [params.float(blend.parameter_x), params.float(blend.parameter_y)];
            directional_blend_weights(clips, input, blend.algorithm, &mut weights[..n]);
            n
        }
    }
}

/// Clip index, duration and playback speed of clip `i` of `state`.
#[inline]
fn clip_at(blob: &StateMachineBlob, state: &BakedState, i: usize) -> (u16, f32, f32) {
    let (clip_index, speed) = match state.state_type {
        StateType::SingleClip => (blob.single_clip_states[state.type_index as usize].clip_index, 1.0),
        StateType::LinearBlend => {
            let blend = &blob.linear_blend_states[state.type_index as usize];
            let (clips, _, speeds) = blob.linear_blend_clips(blend);
            (clips[i], speeds[i])
        }
        StateType::Directional2DBlend => {
            let blend = &blob.directional_2d_blend_states[state.type_index as usize];
            let c = blob.directional_clips(blend)[i];
            (c.clip_index, c.speed)
        }
    };
    (clip_index, blob.clips[clip_index as usize].duration, speed)
}

/// Weighted state duration in seconds (clip durations scaled by their clip speeds).
fn weighted_duration(blob: &StateMachineBlob, state: &BakedState, weights: &[f32]) -> f32 {
    let mut duration = 0.0;
    for (i, w) in weights.iter().enumerate() {
        if *w <= 0.0 {
            continue;
        }
        let (_, clip_duration, speed) = clip_at(blob, state, i);
        let speed = if speed.abs() > MIN_DURATION { speed.abs() } else { 1.0 };
        duration += w * clip_duration / speed;
    }
    duration
}

/// Advance one state's playback by `dt` and append its clips, scaled by `scale`, to the request.
fn advance_and_emit(
    blob: &StateMachineBlob,
    playback: &mut StatePlayback,
    dt: f32,
    params: &ParameterBuffers,
    scale: f32,
    scratch: &mut Scratch,
) {
    let state = &blob.states[playback.state_index as usize];
    let n = state_weights(blob, state, params, &mut scratch.weights);
    let weights = &scratch.weights[..n];

    let mut speed = state.speed;
    if let Some(p) = state.speed_parameter {
        speed *= params.float(p);
    }
    let duration = weighted_duration(blob, state, weights);
    if duration > MIN_DURATION {
        playback.step(dt * speed / duration, state.looping);
    }

    if scale <= 0.0 {
        return;
    }
    let normalized = playback.fraction;
    for (i, w) in weights.iter().enumerate() {
        if *w <= 0.0 {
            continue;
        }
        let (clip_index, clip_duration, _) = clip_at(blob, state, i);
        scratch.samples.push(ClipSample {
            clip_index,
            time: normalized * clip_duration,
            normalized_time: normalized,
            weight: w * scale,
        });
    }
}

/// Mutable per-instance state. Exclusively owned by one running instance.
#[derive(Clone, Debug)]
pub struct StateMachineInstance {
    current: StatePlayback,
    transition: Option<ActiveTransition>,
    blend_weight: f32,
    navigation: NavigationStack,
    scratch: Scratch,
}

impl StateMachineInstance {
    /// Start Steady in the blob's default state.
    pub fn new(blob: &StateMachineBlob, cfg: &Config) -> Self {
        let mut instance = Self {
            current: StatePlayback::at(blob.default_state_index, 0.0, false),
            transition: None,
            blend_weight: 1.0,
            navigation: NavigationStack::new(cfg.initial_navigation_depth),
            scratch: Scratch::new(cfg, blob),
        };
        if !blob.states.is_empty() {
            instance
                .navigation
                .sync_to_state(blob, blob.default_state_index as usize);
        }
        instance
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        if self.transition.is_some() {
            Phase::Transitioning
        } else {
            Phase::Steady
        }
    }

    #[inline]
    pub fn current_state_index(&self) -> u32 {
        self.current.state_index
    }

    #[inline]
    pub fn current(&self) -> &StatePlayback {
        &self.current
    }

    #[inline]
    pub fn active_transition(&self) -> Option<&ActiveTransition> {
        self.transition.as_ref()
    }

    #[inline]
    pub fn navigation(&self) -> &NavigationStack {
        &self.navigation
    }

    /// Last emitted sampling request.
    #[inline]
    pub fn samples(&self) -> &[ClipSample] {
        &self.scratch.samples
    }

    /// Jump straight to `state_index` (editor preview, respawn), cancelling any transition.
    pub fn force_state(&mut self, blob: &StateMachineBlob, state_index: u32, normalized_time: f32) {
        if state_index as usize >= blob.states.len() {
            debug_assert!(false, "state index {state_index} out of range");
            return;
        }
        self.transition = None;
        self.blend_weight = 1.0;
        let looping = blob.states[state_index as usize].looping;
        self.current = StatePlayback::at(state_index, normalized_time, looping);
        self.navigation.sync_to_state(blob, state_index as usize);
    }

    fn begin_transition(&mut self, blob: &StateMachineBlob, transition_index: u32, source: TransitionSource) -> bool {
        let t = &blob.transitions[transition_index as usize];
        if t.to_state_index as usize >= blob.states.len() {
            debug_assert!(false, "transition target {} out of range", t.to_state_index);
            return false;
        }
        let from = self.current;
        let looping = blob.states[t.to_state_index as usize].looping;
        self.current = StatePlayback::at(t.to_state_index, t.offset, looping);
        self.navigation.sync_to_state(blob, t.to_state_index as usize);
        if t.duration > 0.0 {
            self.transition = Some(ActiveTransition {
                from,
                transition_index,
                source,
                elapsed: 0.0,
                duration: t.duration,
            });
            self.blend_weight = 0.0;
        } else {
            self.transition = None;
            self.blend_weight = 1.0;
        }
        true
    }

    /// Advance by `dt` seconds against live `params` and return the sampling request.
    pub fn advance(&mut self, blob: &StateMachineBlob, dt: f32, params: &ParameterBuffers) -> Tick<'_> {
        self.scratch.begin_frame();
        if blob.states.is_empty() {
            return Tick {
                phase: Phase::Steady,
                state_index: 0,
                blend_weight: 1.0,
                started: None,
                samples: &self.scratch.samples,
            };
        }

        let mut started = None;
        if self.transition.is_none() {
            if let Some((index, source)) = select_transition(blob, &self.current, params) {
                if self.begin_transition(blob, index, source) {
                    started = Some(source);
                }
            }
        }

        if let Some(mut active) = self.transition {
            active.elapsed += dt;
            let p = active.elapsed / active.duration;
            if p >= 1.0 {
                self.transition = None;
                self.blend_weight = 1.0;
            } else {
                let curve = blob.curve_of(&blob.transitions[active.transition_index as usize]);
                self.blend_weight = transition_weight(curve, p);
                self.transition = Some(active);
            }
        }

        if let Some(active) = self.transition.as_mut() {
            advance_and_emit(
                blob,
                &mut active.from,
                dt,
                params,
                1.0 - self.blend_weight,
                &mut self.scratch,
            );
        }
        advance_and_emit(blob, &mut self.current, dt, params, self.blend_weight, &mut self.scratch);

        Tick {
            phase: self.phase(),
            state_index: self.current.state_index,
            blend_weight: self.blend_weight,
            started,
            samples: &self.scratch.samples,
        }
    }
}
