//! State flattener: inlines every nested sub-machine into one global, index-addressed list.
//!
//! Passes:
//! 1. Depth-first walk (explicit stack) over the root's states. Leaves get the next global
//!    index and a clip offset equal to the clips contributed by every earlier leaf at any
//!    level. Sub-machines get a preorder index, their parent and nesting level.
//! 2. Entry resolution for every sub-machine (chains through nested sub-machines, bounded
//!    by the sub-machine count so cycles terminate).
//! 3. Exit-transition infos, collected in post-order (inner sub-machines first) for every
//!    sub-machine that declares both exit states and exit transitions.
//! 4. Exit-group indices written back onto the flattened leaves.
//!
//! Every reference resolution either succeeds, degrades to index 0 with a warning, or
//! (with `Config::strict_resolution`) fails the bake.

use hashbrown::HashMap;

use crate::config::Config;
use crate::error::BakeError;
use crate::graph::{AnimationStateAsset, StateKind, StateMachineAsset, StateOutTransition};
use crate::ids::StateId;

/// One leaf state in the global index space.
#[derive(Clone, Debug)]
pub struct FlattenedState<'a> {
    pub index: usize,
    pub clip_offset: usize,
    /// Debug path, e.g. `Player/Locomotion/Walk`.
    pub path: String,
    /// Exit group this leaf triggers, or -1.
    pub exit_group_index: i32,
    /// Innermost enclosing sub-machine, or -1 for root-level leaves.
    pub sub_machine_index: i32,
    pub asset: &'a AnimationStateAsset,
}

/// One sub-machine container, indexed in preorder.
#[derive(Clone, Debug)]
pub struct FlattenedSubMachine<'a> {
    pub index: usize,
    pub parent: i32,
    /// Nesting level; root-level sub-machines are level 1.
    pub level: u16,
    pub entry_state_index: usize,
    pub path: String,
    pub asset: &'a AnimationStateAsset,
}

/// A transition whose target has been resolved to a flattened leaf index.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedTransition<'a> {
    pub to_state_index: usize,
    pub transition: &'a StateOutTransition,
}

/// Exit surface of one sub-machine: which leaves may leave it, and how.
#[derive(Clone, Debug)]
pub struct ExitTransitionInfo<'a> {
    pub sub_machine_index: usize,
    pub exit_state_indices: Vec<usize>,
    pub transitions: Vec<ResolvedTransition<'a>>,
}

/// Result of flattening one root machine. Lives only for the duration of a bake.
#[derive(Debug)]
pub struct FlattenedGraph<'a> {
    pub root: &'a StateMachineAsset,
    pub states: Vec<FlattenedState<'a>>,
    pub sub_machines: Vec<FlattenedSubMachine<'a>>,
    pub asset_to_index: HashMap<StateId, usize>,
    pub sub_machine_lookup: HashMap<StateId, usize>,
    pub exit_transition_infos: Vec<ExitTransitionInfo<'a>>,
    pub clip_count: usize,
    pub default_state_index: usize,
    strict: bool,
}

struct Frame<'a> {
    states: std::slice::Iter<'a, AnimationStateAsset>,
    sub_machine: i32,
    level: u16,
    path: String,
}

/// Flatten `root` into a contiguous leaf index space.
pub fn flatten<'a>(root: &'a StateMachineAsset, cfg: &Config) -> Result<FlattenedGraph<'a>, BakeError> {
    let mut graph = FlattenedGraph {
        root,
        states: Vec::new(),
        sub_machines: Vec::new(),
        asset_to_index: HashMap::new(),
        sub_machine_lookup: HashMap::new(),
        exit_transition_infos: Vec::new(),
        clip_count: 0,
        default_state_index: 0,
        strict: cfg.strict_resolution,
    };

    let post_order = graph.collect_states(root);

    // Baked clip indices are u16.
    let max_clips = cfg.max_clips.min(u16::MAX as usize + 1);
    if graph.clip_count > max_clips {
        log::error!(
            "state machine '{}' needs {} clips; the clip index space holds {}",
            root.name,
            graph.clip_count,
            max_clips
        );
        return Err(BakeError::ClipIndexOverflow {
            count: graph.clip_count,
            max: max_clips,
        });
    }

    for i in 0..graph.sub_machines.len() {
        graph.sub_machines[i].entry_state_index = graph.resolve_sub_machine_entry(i)?;
    }

    for sub_index in post_order {
        graph.collect_exit_info(sub_index, cfg)?;
    }
    graph.assign_exit_groups();

    graph.default_state_index = match root.default_state {
        _ if graph.states.is_empty() => 0,
        Some(id) => graph.resolve_target(id)?,
        None => graph.degrade(BakeError::MissingDefaultState)?,
    };

    log::debug!(
        "flattened '{}': {} leaves, {} sub-machines, {} clips, {} exit groups",
        root.name,
        graph.states.len(),
        graph.sub_machines.len(),
        graph.clip_count,
        graph.exit_transition_infos.len()
    );
    Ok(graph)
}

impl<'a> FlattenedGraph<'a> {
    /// Pass 1. Returns the sub-machine indices in post-order.
    fn collect_states(&mut self, root: &'a StateMachineAsset) -> Vec<usize> {
        let mut post_order = Vec::new();
        let mut stack = vec![Frame {
            states: root.states.iter(),
            sub_machine: -1,
            level: 0,
            path: root.name.clone(),
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(state) = frame.states.next() else {
                let done = stack.pop();
                if let Some(done) = done {
                    if done.sub_machine >= 0 {
                        post_order.push(done.sub_machine as usize);
                    }
                }
                continue;
            };
            let path = format!("{}/{}", frame.path, state.name);
            let parent = frame.sub_machine;
            let level = frame.level;

            match &state.kind {
                StateKind::SubStateMachine(sub) => {
                    if !state.transitions.is_empty() {
                        log::warn!(
                            "sub-machine '{path}' declares out transitions; they are ignored (use exit transitions)"
                        );
                    }
                    let Some(nested) = sub.machine.as_deref() else {
                        log::warn!("sub-machine '{path}' has no nested state machine; skipping it");
                        continue;
                    };
                    if !nested.parameters.is_empty() || !nested.any_state_transitions.is_empty() {
                        log::warn!(
                            "sub-machine '{path}' declares parameters or any-state transitions; only the root machine's are baked"
                        );
                    }
                    let index = self.sub_machines.len();
                    self.sub_machines.push(FlattenedSubMachine {
                        index,
                        parent,
                        level: level + 1,
                        entry_state_index: 0,
                        path: path.clone(),
                        asset: state,
                    });
                    self.sub_machine_lookup.insert(state.id, index);
                    stack.push(Frame {
                        states: nested.states.iter(),
                        sub_machine: index as i32,
                        level: level + 1,
                        path,
                    });
                }
                kind => {
                    let index = self.states.len();
                    if self.asset_to_index.insert(state.id, index).is_some() {
                        log::warn!("state id {} is used more than once; '{path}' shadows the earlier state", state.id);
                    }
                    self.states.push(FlattenedState {
                        index,
                        clip_offset: self.clip_count,
                        path,
                        exit_group_index: -1,
                        sub_machine_index: parent,
                        asset: state,
                    });
                    self.clip_count += kind.clip_count();
                }
            }
        }
        post_order
    }

    /// Log `err` and fall back to index 0, or fail in strict mode.
    fn degrade(&self, err: BakeError) -> Result<usize, BakeError> {
        if self.strict {
            log::error!("{err}");
            Err(err)
        } else {
            log::warn!("{err}; falling back to state index 0");
            Ok(0)
        }
    }

    fn sub_machine_name(&self, sub_index: usize) -> String {
        self.sub_machines[sub_index].path.clone()
    }

    /// Follow entry references from `sub_index` until a leaf is reached.
    fn resolve_sub_machine_entry(&self, sub_index: usize) -> Result<usize, BakeError> {
        let mut current = sub_index;
        // A valid chain visits each sub-machine at most once.
        for _ in 0..=self.sub_machines.len() {
            let entry = match &self.sub_machines[current].asset.kind {
                StateKind::SubStateMachine(sub) => sub.entry_state,
                _ => None,
            };
            let Some(entry) = entry else {
                return self.degrade(BakeError::UnresolvedEntryState {
                    machine: self.sub_machine_name(sub_index),
                });
            };
            if let Some(&leaf) = self.asset_to_index.get(&entry) {
                return Ok(leaf);
            }
            match self.sub_machine_lookup.get(&entry) {
                Some(&next) => current = next,
                None => {
                    return self.degrade(BakeError::UnresolvedEntryState {
                        machine: self.sub_machine_name(sub_index),
                    })
                }
            }
        }
        self.degrade(BakeError::EntryStateCycle {
            machine: self.sub_machine_name(sub_index),
        })
    }

    /// Resolve a transition target: leaves map to themselves, sub-machines to their entry leaf.
    pub fn resolve_target(&self, target: StateId) -> Result<usize, BakeError> {
        if let Some(&leaf) = self.asset_to_index.get(&target) {
            return Ok(leaf);
        }
        match self.sub_machine_lookup.get(&target) {
            Some(&sub) => Ok(self.sub_machines[sub].entry_state_index),
            None => self.degrade(BakeError::UnresolvedTransitionTarget { target }),
        }
    }

    /// Whether `leaf` lies anywhere inside sub-machine `sub_index`.
    pub fn is_inside(&self, leaf: usize, sub_index: usize) -> bool {
        let mut current = self.states[leaf].sub_machine_index;
        while current >= 0 {
            if current as usize == sub_index {
                return true;
            }
            current = self.sub_machines[current as usize].parent;
        }
        false
    }

    /// Pass 3 for one sub-machine.
    fn collect_exit_info(&mut self, sub_index: usize, cfg: &Config) -> Result<(), BakeError> {
        let sub_state = self.sub_machines[sub_index].asset;
        let StateKind::SubStateMachine(sub) = &sub_state.kind else {
            return Ok(());
        };
        let path = &self.sub_machines[sub_index].path;
        match (sub.exit_states.is_empty(), sub.exit_transitions.is_empty()) {
            (false, false) => {}
            (true, true) => return Ok(()),
            (false, true) => {
                if cfg.warn_incomplete_exit_groups {
                    log::warn!("sub-machine '{path}' declares exit states but no exit transitions; no exit group is created");
                }
                return Ok(());
            }
            (true, false) => {
                if cfg.warn_incomplete_exit_groups {
                    log::warn!("sub-machine '{path}' declares exit transitions but no exit states; no exit group is created");
                }
                return Ok(());
            }
        }

        let mut exit_state_indices = Vec::with_capacity(sub.exit_states.len());
        for id in &sub.exit_states {
            match self.asset_to_index.get(id) {
                Some(&leaf) if self.is_inside(leaf, sub_index) => {
                    if !exit_state_indices.contains(&leaf) {
                        exit_state_indices.push(leaf);
                    }
                }
                Some(_) => {
                    log::warn!("exit state {id} of sub-machine '{path}' is not inside it; dropping it");
                }
                None => {
                    log::warn!("exit state {id} of sub-machine '{path}' is not a leaf state; dropping it");
                }
            }
        }
        if exit_state_indices.is_empty() {
            log::warn!("sub-machine '{path}' has no resolvable exit states; no exit group is created");
            return Ok(());
        }

        let mut transitions = Vec::with_capacity(sub.exit_transitions.len());
        for transition in &sub.exit_transitions {
            transitions.push(ResolvedTransition {
                to_state_index: self.resolve_target(transition.to_state)?,
                transition,
            });
        }
        self.exit_transition_infos.push(ExitTransitionInfo {
            sub_machine_index: sub_index,
            exit_state_indices,
            transitions,
        });
        Ok(())
    }

    /// Pass 4: each leaf keeps the first group that claims it.
    fn assign_exit_groups(&mut self) {
        for (group, info) in self.exit_transition_infos.iter().enumerate() {
            for &leaf in &info.exit_state_indices {
                let state = &mut self.states[leaf];
                if state.exit_group_index < 0 {
                    state.exit_group_index = group as i32;
                } else {
                    log::warn!(
                        "state '{}' is an exit state of more than one sub-machine; keeping exit group {}",
                        state.path,
                        state.exit_group_index
                    );
                }
            }
        }
    }

    /// Resolve every out transition of a leaf, in declaration order.
    pub fn resolve_transitions(
        &self,
        transitions: &'a [StateOutTransition],
    ) -> Result<Vec<ResolvedTransition<'a>>, BakeError> {
        transitions
            .iter()
            .map(|transition| {
                Ok(ResolvedTransition {
                    to_state_index: self.resolve_target(transition.to_state)?,
                    transition,
                })
            })
            .collect()
    }

    /// Debug path of a flattened leaf.
    pub fn path_of(&self, index: usize) -> Option<&str> {
        self.states.get(index).map(|s| s.path.as_str())
    }
}
