//! Blob converter: flattened graph → immutable `StateMachineBlob`.
//!
//! Two phases:
//! 1. `StateMachineConverter::from_flattened` resolves every parameter reference, clip
//!    index and transition target into growable, nested conversion lists. Any unresolved
//!    parameter fails the bake.
//! 2. `build_blob` walks each list exactly once and copies it into the blob's flat pools.
//!
//! The converter must be disposed by the bake that created it (`dispose`, also run on
//! drop). Disposal releases nested lists innermost first and is guarded by `is_created`,
//! so disposing a partially built or already disposed converter is a no-op.

use crate::blob::{
    BakedBoolCondition, BakedClip, BakedIntCondition, BakedState, BakedSubMachine, BakedTransition,
    Directional2DBlendState, Directional2DClipEntry, ExitTransitionGroup, IndexRange,
    LinearBlendState, SingleClipState, StateMachineBlob, StateType,
};
use crate::config::Config;
use crate::curve::PackedKeyframe;
use crate::error::BakeError;
use crate::flatten::{flatten, FlattenedGraph, ResolvedTransition};
use crate::graph::{Blend2DAlgorithm, StateKind, StateMachineAsset};
use crate::ids::name_hash;
use crate::parameters::{NumericParameter, ParameterAsset, ParameterKind, ParameterLayout, ParameterTable};

/// Transition with every reference resolved, conditions still in their own lists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransitionConversionData {
    pub to_state_index: u32,
    pub duration: f32,
    pub has_end_time: bool,
    pub end_time: f32,
    pub offset: f32,
    pub can_transition_to_self: bool,
    pub bool_conditions: Vec<BakedBoolCondition>,
    pub int_conditions: Vec<BakedIntCondition>,
    pub curve_keyframes: Vec<PackedKeyframe>,
}

impl TransitionConversionData {
    fn dispose(&mut self) {
        drop(std::mem::take(&mut self.bool_conditions));
        drop(std::mem::take(&mut self.int_conditions));
        drop(std::mem::take(&mut self.curve_keyframes));
    }
}

/// One clip of a linear blend: `(clip index, threshold, speed)`.
pub type LinearBlendEntry = (u16, f32, f32);

#[derive(Clone, Debug, PartialEq)]
pub enum StateTypeData {
    SingleClip {
        clip_index: u16,
    },
    LinearBlend {
        blend_parameter: NumericParameter,
        /// Sorted ascending by threshold.
        clips: Vec<LinearBlendEntry>,
    },
    Directional2DBlend {
        parameter_x: u16,
        parameter_y: u16,
        algorithm: Blend2DAlgorithm,
        clips: Vec<Directional2DClipEntry>,
    },
}

impl StateTypeData {
    fn dispose(&mut self) {
        match self {
            StateTypeData::SingleClip { .. } => {}
            StateTypeData::LinearBlend { clips, .. } => drop(std::mem::take(clips)),
            StateTypeData::Directional2DBlend { clips, .. } => drop(std::mem::take(clips)),
        }
    }

    fn clip_count(&self) -> usize {
        match self {
            StateTypeData::SingleClip { .. } => 1,
            StateTypeData::LinearBlend { clips, .. } => clips.len(),
            StateTypeData::Directional2DBlend { clips, .. } => clips.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StateConversionData {
    pub type_data: StateTypeData,
    pub looping: bool,
    pub speed: f32,
    pub speed_parameter: Option<u16>,
    pub transitions: Vec<TransitionConversionData>,
    pub exit_group_index: i32,
    pub sub_machine_index: i32,
    pub name_hash: u32,
}

impl StateConversionData {
    fn dispose(&mut self) {
        for t in self.transitions.iter_mut() {
            t.dispose();
        }
        drop(std::mem::take(&mut self.transitions));
        self.type_data.dispose();
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExitGroupConversionData {
    pub sub_machine_index: u32,
    pub exit_state_indices: Vec<u32>,
    pub transitions: Vec<TransitionConversionData>,
}

impl ExitGroupConversionData {
    fn dispose(&mut self) {
        drop(std::mem::take(&mut self.exit_state_indices));
        for t in self.transitions.iter_mut() {
            t.dispose();
        }
        drop(std::mem::take(&mut self.transitions));
    }
}

#[derive(Debug, Default)]
struct ConverterLists {
    states: Vec<StateConversionData>,
    any_state_transitions: Vec<TransitionConversionData>,
    exit_groups: Vec<ExitGroupConversionData>,
    sub_machines: Vec<BakedSubMachine>,
    clips: Vec<BakedClip>,
}

/// Mutable accumulator for one bake.
#[derive(Debug)]
pub struct StateMachineConverter {
    lists: Option<ConverterLists>,
    parameters: ParameterLayout,
    name_hash: u32,
    default_state_index: u32,
}

fn convert_transition(
    resolved: &ResolvedTransition<'_>,
    table: &ParameterTable,
    context: &str,
    can_transition_to_self: bool,
) -> Result<TransitionConversionData, BakeError> {
    let t = resolved.transition;
    let mut out = TransitionConversionData {
        to_state_index: resolved.to_state_index as u32,
        duration: t.duration.max(0.0),
        has_end_time: t.end_time.is_some(),
        end_time: t.end_time.unwrap_or(0.0),
        offset: t.offset,
        can_transition_to_self,
        bool_conditions: Vec::with_capacity(t.bool_conditions.len()),
        int_conditions: Vec::with_capacity(t.int_conditions.len()),
        curve_keyframes: Vec::new(),
    };
    for c in &t.bool_conditions {
        out.bool_conditions.push(BakedBoolCondition {
            parameter_index: table.resolve(&c.parameter, ParameterKind::Bool, context)?,
            comparison_value: c.comparison_value,
        });
    }
    for c in &t.int_conditions {
        out.int_conditions.push(BakedIntCondition {
            parameter_index: table.resolve(&c.parameter, ParameterKind::Int, context)?,
            comparator: c.comparator,
            comparison_value: c.comparison_value,
        });
    }
    if let Some(curve) = &t.blend_curve {
        out.curve_keyframes = curve.pack();
    }
    Ok(out)
}

fn checked_clip_duration(duration: f32, clip: &str, path: &str) -> f32 {
    if !(duration.is_finite() && duration > 0.0) {
        log::warn!("clip '{clip}' in state '{path}' has non-positive duration {duration}");
    }
    duration
}

impl StateMachineConverter {
    /// Phase 1: resolve the flattened graph against the parameter table.
    pub fn from_flattened(graph: &FlattenedGraph<'_>, table: &ParameterTable) -> Result<Self, BakeError> {
        let mut converter = Self {
            lists: Some(ConverterLists::default()),
            parameters: table.layout().clone(),
            name_hash: name_hash(&graph.root.name),
            default_state_index: graph.default_state_index as u32,
        };
        // On error the partially filled converter is dropped here, which disposes it.
        converter.fill(graph, table)?;
        Ok(converter)
    }

    fn fill(&mut self, graph: &FlattenedGraph<'_>, table: &ParameterTable) -> Result<(), BakeError> {
        let lists = self.lists.as_mut().ok_or(BakeError::ConverterDisposed)?;

        for flat in &graph.states {
            let asset = flat.asset;
            let context = format!("state '{}'", flat.path);
            debug_assert_eq!(lists.clips.len(), flat.clip_offset);

            let speed_parameter = match &asset.speed_parameter {
                Some(name) => Some(table.resolve(name, ParameterKind::Float, &context)?),
                None => None,
            };

            let type_data = match &asset.kind {
                StateKind::SingleClip { clip } => {
                    lists.clips.push(BakedClip {
                        duration: checked_clip_duration(clip.duration, &clip.name, &flat.path),
                        name_hash: name_hash(&clip.name),
                    });
                    StateTypeData::SingleClip {
                        clip_index: flat.clip_offset as u16,
                    }
                }
                StateKind::LinearBlend {
                    blend_parameter,
                    clips,
                } => {
                    let blend_parameter = table.resolve_numeric(blend_parameter, &context)?;
                    let mut entries: Vec<LinearBlendEntry> = Vec::with_capacity(clips.len());
                    for (i, c) in clips.iter().enumerate() {
                        lists.clips.push(BakedClip {
                            duration: checked_clip_duration(c.clip.duration, &c.clip.name, &flat.path),
                            name_hash: name_hash(&c.clip.name),
                        });
                        entries.push(((flat.clip_offset + i) as u16, c.threshold, c.speed));
                    }
                    // The runtime scans for the bracketing pair and relies on this order.
                    entries.sort_by(|a, b| a.1.total_cmp(&b.1));
                    StateTypeData::LinearBlend {
                        blend_parameter,
                        clips: entries,
                    }
                }
                StateKind::Directional2DBlend {
                    parameter_x,
                    parameter_y,
                    algorithm,
                    clips,
                } => {
                    let parameter_x = table.resolve(parameter_x, ParameterKind::Float, &context)?;
                    let parameter_y = table.resolve(parameter_y, ParameterKind::Float, &context)?;
                    let mut entries = Vec::with_capacity(clips.len());
                    for (i, c) in clips.iter().enumerate() {
                        lists.clips.push(BakedClip {
                            duration: checked_clip_duration(c.clip.duration, &c.clip.name, &flat.path),
                            name_hash: name_hash(&c.clip.name),
                        });
                        entries.push(Directional2DClipEntry {
                            clip_index: (flat.clip_offset + i) as u16,
                            position: c.position,
                            speed: c.speed,
                        });
                    }
                    StateTypeData::Directional2DBlend {
                        parameter_x,
                        parameter_y,
                        algorithm: *algorithm,
                        clips: entries,
                    }
                }
                StateKind::SubStateMachine(_) => {
                    return Err(BakeError::InvalidGraph(format!(
                        "'{}' was flattened as a leaf but is a sub-machine",
                        flat.path
                    )))
                }
            };
            if type_data.clip_count() == 0 {
                log::warn!("state '{}' has no clips and samples nothing", flat.path);
            }

            let resolved = graph.resolve_transitions(&asset.transitions)?;
            let mut transitions = Vec::with_capacity(resolved.len());
            for r in &resolved {
                transitions.push(convert_transition(r, table, &context, false)?);
            }

            lists.states.push(StateConversionData {
                type_data,
                looping: asset.looping,
                speed: asset.speed,
                speed_parameter,
                transitions,
                exit_group_index: flat.exit_group_index,
                sub_machine_index: flat.sub_machine_index,
                name_hash: name_hash(&asset.name),
            });
        }

        let mut any_state = graph.root.any_state_transitions.as_slice();
        if graph.states.is_empty() && !any_state.is_empty() {
            // Nothing to transition to.
            log::warn!(
                "state machine '{}' has no states; dropping {} any-state transition(s)",
                graph.root.name,
                any_state.len()
            );
            any_state = &[];
        }
        for any in any_state {
            let resolved = ResolvedTransition {
                to_state_index: graph.resolve_target(any.transition.to_state)?,
                transition: &any.transition,
            };
            lists.any_state_transitions.push(convert_transition(
                &resolved,
                table,
                "any-state transition",
                any.can_transition_to_self,
            )?);
        }

        for info in &graph.exit_transition_infos {
            let context = format!("exit transition of '{}'", graph.sub_machines[info.sub_machine_index].path);
            let mut transitions = Vec::with_capacity(info.transitions.len());
            for r in &info.transitions {
                transitions.push(convert_transition(r, table, &context, false)?);
            }
            lists.exit_groups.push(ExitGroupConversionData {
                sub_machine_index: info.sub_machine_index as u32,
                exit_state_indices: info.exit_state_indices.iter().map(|i| *i as u32).collect(),
                transitions,
            });
        }

        for sub in &graph.sub_machines {
            lists.sub_machines.push(BakedSubMachine {
                parent: sub.parent,
                level: sub.level,
                entry_state_index: sub.entry_state_index as u32,
                name_hash: name_hash(&sub.asset.name),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.lists.is_some()
    }

    /// Conversion data of every leaf, in flattened order. Empty once disposed.
    pub fn states(&self) -> &[StateConversionData] {
        self.lists.as_ref().map(|l| l.states.as_slice()).unwrap_or(&[])
    }

    pub fn exit_groups(&self) -> &[ExitGroupConversionData] {
        self.lists.as_ref().map(|l| l.exit_groups.as_slice()).unwrap_or(&[])
    }

    /// Phase 2: copy every accumulated list into a fresh blob.
    pub fn build_blob(&self) -> Result<StateMachineBlob, BakeError> {
        let lists = self.lists.as_ref().ok_or(BakeError::ConverterDisposed)?;
        let mut blob = StateMachineBlob {
            name_hash: self.name_hash,
            default_state_index: self.default_state_index,
            parameters: self.parameters.clone(),
            clips: lists.clips.clone(),
            sub_machines: lists.sub_machines.clone(),
            ..StateMachineBlob::default()
        };

        for state in &lists.states {
            let (state_type, type_index) = match &state.type_data {
                StateTypeData::SingleClip { clip_index } => {
                    blob.single_clip_states.push(SingleClipState {
                        clip_index: *clip_index,
                    });
                    (StateType::SingleClip, blob.single_clip_states.len() - 1)
                }
                StateTypeData::LinearBlend {
                    blend_parameter,
                    clips,
                } => {
                    let range = IndexRange::new(blob.linear_blend_clip_indexes.len(), clips.len())?;
                    for (clip, threshold, speed) in clips {
                        blob.linear_blend_clip_indexes.push(*clip);
                        blob.linear_blend_thresholds.push(*threshold);
                        blob.linear_blend_speeds.push(*speed);
                    }
                    blob.linear_blend_states.push(LinearBlendState {
                        blend_parameter: *blend_parameter,
                        clips: range,
                    });
                    (StateType::LinearBlend, blob.linear_blend_states.len() - 1)
                }
                StateTypeData::Directional2DBlend {
                    parameter_x,
                    parameter_y,
                    algorithm,
                    clips,
                } => {
                    let range = IndexRange::new(blob.directional_2d_clips.len(), clips.len())?;
                    blob.directional_2d_clips.extend_from_slice(clips);
                    blob.directional_2d_blend_states.push(Directional2DBlendState {
                        parameter_x: *parameter_x,
                        parameter_y: *parameter_y,
                        algorithm: *algorithm,
                        clips: range,
                    });
                    (StateType::Directional2DBlend, blob.directional_2d_blend_states.len() - 1)
                }
            };
            blob.max_clips_per_state = blob.max_clips_per_state.max(state.type_data.clip_count() as u32);
            let transitions = push_transitions(&mut blob, &state.transitions)?;
            blob.states.push(BakedState {
                state_type,
                type_index: type_index as u32,
                looping: state.looping,
                speed: state.speed,
                speed_parameter: state.speed_parameter,
                transitions,
                exit_transition_group_index: state.exit_group_index,
                sub_machine_index: state.sub_machine_index,
                name_hash: state.name_hash,
            });
        }

        blob.any_state_transitions = push_transitions(&mut blob, &lists.any_state_transitions)?;

        for group in &lists.exit_groups {
            let exit_states = IndexRange::new(blob.exit_state_indices.len(), group.exit_state_indices.len())?;
            blob.exit_state_indices.extend_from_slice(&group.exit_state_indices);
            let transitions = push_transitions(&mut blob, &group.transitions)?;
            blob.exit_transition_groups.push(ExitTransitionGroup {
                sub_machine_index: group.sub_machine_index,
                exit_states,
                transitions,
            });
        }

        debug_assert_eq!(blob.validate(), Ok(()));
        log::debug!(
            "built blob {:#010x}: {} states, {} transitions, {} clips",
            blob.name_hash,
            blob.states.len(),
            blob.transitions.len(),
            blob.clips.len()
        );
        Ok(blob)
    }

    /// Release every nested list, innermost first. Safe to call more than once.
    pub fn dispose(&mut self) {
        let Some(mut lists) = self.lists.take() else {
            return;
        };
        for state in lists.states.iter_mut() {
            state.dispose();
        }
        for t in lists.any_state_transitions.iter_mut() {
            t.dispose();
        }
        for group in lists.exit_groups.iter_mut() {
            group.dispose();
        }
        drop(lists);
    }
}

impl Drop for StateMachineConverter {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn push_transitions(
    blob: &mut StateMachineBlob,
    transitions: &[TransitionConversionData],
) -> Result<IndexRange, BakeError> {
    let range = IndexRange::new(blob.transitions.len(), transitions.len())?;
    for t in transitions {
        let bool_conditions = IndexRange::new(blob.bool_conditions.len(), t.bool_conditions.len())?;
        blob.bool_conditions.extend_from_slice(&t.bool_conditions);
        let int_conditions = IndexRange::new(blob.int_conditions.len(), t.int_conditions.len())?;
        blob.int_conditions.extend_from_slice(&t.int_conditions);
        let curve = IndexRange::new(blob.curve_keyframes.len(), t.curve_keyframes.len())?;
        blob.curve_keyframes.extend_from_slice(&t.curve_keyframes);
        blob.transitions.push(BakedTransition {
            to_state_index: t.to_state_index,
            duration: t.duration,
            has_end_time: t.has_end_time,
            end_time: t.end_time,
            offset: t.offset,
            bool_conditions,
            int_conditions,
            curve,
            can_transition_to_self: t.can_transition_to_self,
        });
    }
    Ok(range)
}

/// Bake a state machine against its own parameter declarations.
pub fn bake_state_machine(asset: &StateMachineAsset, cfg: &Config) -> Result<StateMachineBlob, BakeError> {
    bake_with_parameters(asset, &asset.parameters, cfg)
}

/// Bake a state machine against an externally owned parameter list (used by layers).
pub fn bake_with_parameters(
    asset: &StateMachineAsset,
    parameters: &[ParameterAsset],
    cfg: &Config,
) -> Result<StateMachineBlob, BakeError> {
    let table = ParameterTable::build(parameters)?;
    let graph = flatten(asset, cfg)?;
    let mut converter = StateMachineConverter::from_flattened(&graph, &table)?;
    let blob = converter.build_blob();
    converter.dispose();
    blob
}
