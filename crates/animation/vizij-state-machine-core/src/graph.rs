//! Authoring-time state graph model.
//!
//! A `StateMachineAsset` owns its states; a `SubStateMachine` state owns a nested
//! `StateMachineAsset`. Transitions, entry states and exit states reference states by
//! `StateId`, which is unique across the whole graph, so a reference may point at any
//! nesting level (including at a sub-machine container, which the flattener redirects
//! to that container's entry leaf).

use serde::{Deserialize, Serialize};

use crate::curve::BlendCurve;
use crate::ids::StateId;
use crate::parameters::ParameterAsset;

fn default_true() -> bool {
    true
}

fn default_speed() -> f32 {
    1.0
}

/// Clip reference owned by a leaf state. Its global clip index is assigned by the flattener.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipAsset {
    pub name: String,
    /// Clip length in seconds.
    pub duration: f32,
}

impl ClipAsset {
    pub fn new(name: &str, duration: f32) -> Self {
        Self {
            name: name.to_string(),
            duration,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearBlendClip {
    pub clip: ClipAsset,
    pub threshold: f32,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Directional2DClip {
    pub clip: ClipAsset,
    pub position: [f32; 2],
    #[serde(default = "default_speed")]
    pub speed: f32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Blend2DAlgorithm {
    #[default]
    SimpleDirectional,
    FreeformCartesian,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoolCondition {
    pub parameter: String,
    pub comparison_value: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntComparator {
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl IntComparator {
    #[inline]
    pub fn holds(self, value: i32, comparison: i32) -> bool {
        match self {
            IntComparator::Equal => value == comparison,
            IntComparator::NotEqual => value != comparison,
            IntComparator::Greater => value > comparison,
            IntComparator::Less => value < comparison,
            IntComparator::GreaterOrEqual => value >= comparison,
            IntComparator::LessOrEqual => value <= comparison,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntCondition {
    pub parameter: String,
    pub comparator: IntComparator,
    pub comparison_value: i32,
}

/// Transition leaving a state (the source is the state that owns it).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateOutTransition {
    pub to_state: StateId,
    /// All conditions must hold (conjunction). Empty means unconditional.
    #[serde(default)]
    pub bool_conditions: Vec<BoolCondition>,
    #[serde(default)]
    pub int_conditions: Vec<IntCondition>,
    /// Normalized exit-time gate of the source state.
    #[serde(default)]
    pub end_time: Option<f32>,
    /// Blend duration in seconds.
    #[serde(default)]
    pub duration: f32,
    /// Non-linear blend curve; `None` blends linearly.
    #[serde(default)]
    pub blend_curve: Option<BlendCurve>,
    /// Normalized start time inside the target state.
    #[serde(default)]
    pub offset: f32,
}

impl StateOutTransition {
    pub fn to(target: StateId) -> Self {
        Self {
            to_state: target,
            bool_conditions: Vec::new(),
            int_conditions: Vec::new(),
            end_time: None,
            duration: 0.0,
            blend_curve: None,
            offset: 0.0,
        }
    }

    pub fn with_bool(mut self, parameter: &str, value: bool) -> Self {
        self.bool_conditions.push(BoolCondition {
            parameter: parameter.to_string(),
            comparison_value: value,
        });
        self
    }

    pub fn with_int(mut self, parameter: &str, comparator: IntComparator, value: i32) -> Self {
        self.int_conditions.push(IntCondition {
            parameter: parameter.to_string(),
            comparator,
            comparison_value: value,
        });
        self
    }

    pub fn with_end_time(mut self, end_time: f32) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_curve(mut self, curve: BlendCurve) -> Self {
        self.blend_curve = Some(curve);
        self
    }

    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }
}

/// Global transition evaluated against whatever the current state is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnyStateTransition {
    #[serde(flatten)]
    pub transition: StateOutTransition,
    #[serde(default)]
    pub can_transition_to_self: bool,
}

impl AnyStateTransition {
    pub fn new(transition: StateOutTransition) -> Self {
        Self {
            transition,
            can_transition_to_self: false,
        }
    }

    pub fn allow_self(mut self) -> Self {
        self.can_transition_to_self = true;
        self
    }
}

/// Sub-machine container: a nested graph plus its entry and exit surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubStateMachineAsset {
    /// `None` marks an incomplete sub-machine; it is skipped with a warning.
    #[serde(default)]
    pub machine: Option<Box<StateMachineAsset>>,
    #[serde(default)]
    pub entry_state: Option<StateId>,
    #[serde(default)]
    pub exit_states: Vec<StateId>,
    #[serde(default)]
    pub exit_transitions: Vec<StateOutTransition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateKind {
    SingleClip {
        clip: ClipAsset,
    },
    LinearBlend {
        blend_parameter: String,
        clips: Vec<LinearBlendClip>,
    },
    #[serde(rename = "directional_2d_blend")]
    Directional2DBlend {
        parameter_x: String,
        parameter_y: String,
        #[serde(default)]
        algorithm: Blend2DAlgorithm,
        clips: Vec<Directional2DClip>,
    },
    SubStateMachine(SubStateMachineAsset),
}

impl StateKind {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        !matches!(self, StateKind::SubStateMachine(_))
    }

    /// Number of clips a leaf contributes to the global clip index space.
    pub fn clip_count(&self) -> usize {
        match self {
            StateKind::SingleClip { .. } => 1,
            StateKind::LinearBlend { clips, .. } => clips.len(),
            StateKind::Directional2DBlend { clips, .. } => clips.len(),
            StateKind::SubStateMachine(_) => 0,
        }
    }
}

/// Authoring node: a leaf state or a sub-machine container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationStateAsset {
    pub id: StateId,
    pub name: String,
    #[serde(rename = "loop", default = "default_true")]
    pub looping: bool,
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Optional Float parameter multiplied into `speed`.
    #[serde(default)]
    pub speed_parameter: Option<String>,
    /// Ordered out transitions (ignored on sub-machine containers).
    #[serde(default)]
    pub transitions: Vec<StateOutTransition>,
    pub kind: StateKind,
}

impl AnimationStateAsset {
    fn with_kind(id: StateId, name: &str, kind: StateKind) -> Self {
        Self {
            id,
            name: name.to_string(),
            looping: true,
            speed: 1.0,
            speed_parameter: None,
            transitions: Vec::new(),
            kind,
        }
    }

    pub fn single_clip(id: StateId, name: &str, clip: ClipAsset) -> Self {
        Self::with_kind(id, name, StateKind::SingleClip { clip })
    }

    pub fn linear_blend(
        id: StateId,
        name: &str,
        blend_parameter: &str,
        clips: Vec<LinearBlendClip>,
    ) -> Self {
        Self::with_kind(
            id,
            name,
            StateKind::LinearBlend {
                blend_parameter: blend_parameter.to_string(),
                clips,
            },
        )
    }

    pub fn directional_2d_blend(
        id: StateId,
        name: &str,
        parameters: (&str, &str),
        algorithm: Blend2DAlgorithm,
        clips: Vec<Directional2DClip>,
    ) -> Self {
        Self::with_kind(
            id,
            name,
            StateKind::Directional2DBlend {
                parameter_x: parameters.0.to_string(),
                parameter_y: parameters.1.to_string(),
                algorithm,
                clips,
            },
        )
    }

    pub fn sub_machine(
        id: StateId,
        name: &str,
        machine: StateMachineAsset,
        entry_state: StateId,
    ) -> Self {
        Self::with_kind(
            id,
            name,
            StateKind::SubStateMachine(SubStateMachineAsset {
                machine: Some(Box::new(machine)),
                entry_state: Some(entry_state),
                exit_states: Vec::new(),
                exit_transitions: Vec::new(),
            }),
        )
    }

    pub fn with_transition(mut self, transition: StateOutTransition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn with_loop(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_speed_parameter(mut self, parameter: &str) -> Self {
        self.speed_parameter = Some(parameter.to_string());
        self
    }

    /// Declare an exit state and/or exit transition on a sub-machine container.
    /// No-op on leaf states.
    pub fn with_exit(mut self, exit_states: &[StateId], transitions: Vec<StateOutTransition>) -> Self {
        if let StateKind::SubStateMachine(sub) = &mut self.kind {
            sub.exit_states.extend_from_slice(exit_states);
            sub.exit_transitions.extend(transitions);
        }
        self
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }
}

/// A (possibly nested) state machine graph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMachineAsset {
    pub name: String,
    /// Parameter declarations; only the root machine's list is consulted.
    #[serde(default)]
    pub parameters: Vec<ParameterAsset>,
    #[serde(default)]
    pub states: Vec<AnimationStateAsset>,
    #[serde(default)]
    pub default_state: Option<StateId>,
    /// Only the root machine's any-state transitions are baked.
    #[serde(default)]
    pub any_state_transitions: Vec<AnyStateTransition>,
}

impl StateMachineAsset {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterAsset) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_state(mut self, state: AnimationStateAsset) -> Self {
        if self.default_state.is_none() {
            self.default_state = Some(state.id);
        }
        self.states.push(state);
        self
    }

    pub fn with_default_state(mut self, id: StateId) -> Self {
        self.default_state = Some(id);
        self
    }

    pub fn with_any_state_transition(mut self, transition: AnyStateTransition) -> Self {
        self.any_state_transitions.push(transition);
        self
    }

    /// Visit every state in the graph, depth-first, with an explicit stack.
    pub fn for_each_state<'a>(&'a self, mut f: impl FnMut(&'a AnimationStateAsset)) {
        let mut stack: Vec<std::slice::Iter<'a, AnimationStateAsset>> = vec![self.states.iter()];
        while let Some(top) = stack.last_mut() {
            match top.next() {
                Some(state) => {
                    f(state);
                    if let StateKind::SubStateMachine(SubStateMachineAsset {
                        machine: Some(nested),
                        ..
                    }) = &state.kind
                    {
                        stack.push(nested.states.iter());
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
    }

    /// Find a state anywhere in the graph by id.
    pub fn find_state(&self, id: StateId) -> Option<&AnimationStateAsset> {
        let mut found = None;
        self.for_each_state(|s| {
            if found.is_none() && s.id == id {
                found = Some(s);
            }
        });
        found
    }

    /// Total leaf states across all nesting levels.
    pub fn leaf_count(&self) -> usize {
        let mut n = 0;
        self.for_each_state(|s| {
            if s.is_leaf() {
                n += 1;
            }
        });
        n
    }

    /// Parse an authoring graph from JSON.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
