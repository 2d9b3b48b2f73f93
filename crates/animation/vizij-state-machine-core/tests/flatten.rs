use vizij_state_machine_core::{
    flatten, AnimationStateAsset, BakeError, ClipAsset, Config, StateId, StateKind, StateMachineAsset,
    StateOutTransition,
};

fn fixture(name: &str) -> StateMachineAsset {
    vizij_test_fixtures::state_machines::load(name).expect("load fixture")
}

fn clip(id: u32, name: &str) -> AnimationStateAsset {
    AnimationStateAsset::single_clip(StateId(id), name, ClipAsset::new(name, 1.0))
}

#[test]
fn leaves_are_contiguous_with_running_clip_offsets() {
    let asset = fixture("locomotion");
    let graph = flatten(&asset, &Config::default()).unwrap();

    let paths: Vec<&str> = graph.states.iter().map(|s| s.path.as_str()).collect();
    assert_eq!(
        paths,
        [
            "Locomotion/Idle",
            "Locomotion/Move",
            "Locomotion/Airborne/JumpStart",
            "Locomotion/Airborne/Fall",
            "Locomotion/Airborne/Land",
            "Locomotion/Strafe",
        ]
    );
    assert_eq!(graph.states.len(), asset.leaf_count());
    for (i, s) in graph.states.iter().enumerate() {
        assert_eq!(s.index, i);
        assert!(s.asset.is_leaf());
    }
    let offsets: Vec<usize> = graph.states.iter().map(|s| s.clip_offset).collect();
    assert_eq!(offsets, [0, 1, 3, 4, 5, 6]);
    assert_eq!(graph.clip_count, 11);

    let subs: Vec<i32> = graph.states.iter().map(|s| s.sub_machine_index).collect();
    assert_eq!(subs, [-1, -1, 0, 0, 0, -1]);
    assert_eq!(graph.sub_machines.len(), 1);
    assert_eq!(graph.sub_machines[0].level, 1);
    assert_eq!(graph.sub_machines[0].parent, -1);
    assert_eq!(graph.asset_to_index.get(&StateId(32)), Some(&4));
    assert_eq!(graph.path_of(3), Some("Locomotion/Airborne/Fall"));
}

#[test]
fn sub_machine_targets_redirect_to_entry_leaf() {
    let asset = fixture("locomotion");
    let graph = flatten(&asset, &Config::default()).unwrap();
    assert_eq!(graph.sub_machines[0].entry_state_index, 2);
    assert_eq!(graph.resolve_target(StateId(3)).unwrap(), 2);
    assert_eq!(graph.resolve_target(StateId(31)).unwrap(), 3);
    assert_eq!(graph.default_state_index, 0);
}

#[test]
fn exit_group_covers_declared_exit_states_only() {
    let asset = fixture("locomotion");
    let graph = flatten(&asset, &Config::default()).unwrap();
    assert_eq!(graph.exit_transition_infos.len(), 1);
    let info = &graph.exit_transition_infos[0];
    assert_eq!(info.sub_machine_index, 0);
    assert_eq!(info.exit_state_indices, vec![4]);
    assert_eq!(info.transitions[0].to_state_index, 0);

    let groups: Vec<i32> = graph.states.iter().map(|s| s.exit_group_index).collect();
    assert_eq!(groups, [-1, -1, -1, -1, 0, -1]);
}

#[test]
fn deeply_nested_entry_chains_resolve_through_every_level() {
    let asset = fixture("deep-nesting");
    let graph = flatten(&asset, &Config::default()).unwrap();
    assert_eq!(graph.sub_machines.len(), 2);
    assert_eq!(graph.sub_machines[1].parent, 0);
    assert_eq!(graph.sub_machines[1].level, 2);
    // L1 -> L2 -> Start
    assert_eq!(graph.sub_machines[0].entry_state_index, 0);
    assert_eq!(graph.default_state_index, 0);
    assert!(graph.is_inside(1, 0));
    assert!(graph.is_inside(1, 1));
    assert!(!graph.is_inside(2, 0));
    // Finish sits two levels down but is still an exit state of L1.
    assert_eq!(graph.exit_transition_infos[0].exit_state_indices, vec![1]);
    let finish = asset.find_state(StateId(301)).expect("nested lookup");
    assert_eq!(finish.name, "Finish");
    assert_eq!(graph.asset_to_index.get(&finish.id), Some(&1));
    assert!(asset.find_state(StateId(999)).is_none());
}

#[test]
fn cyclic_entry_degrades_to_zero_or_fails_when_strict() {
    let asset = fixture("cyclic-entry");
    let graph = flatten(&asset, &Config::default()).unwrap();
    assert_eq!(graph.sub_machines[0].entry_state_index, 0);
    assert_eq!(graph.sub_machines[1].entry_state_index, 0);
    assert_eq!(graph.resolve_target(StateId(10)).unwrap(), 0);

    let err = flatten(&asset, &Config::strict()).unwrap_err();
    assert_eq!(
        err,
        BakeError::EntryStateCycle {
            machine: "CyclicEntry/Outer".into()
        }
    );
}

#[test]
fn unresolved_target_defaults_unless_strict() {
    let asset = StateMachineAsset::new("M")
        .with_state(clip(1, "A").with_transition(StateOutTransition::to(StateId(99))))
        .with_state(clip(2, "B"));
    let graph = flatten(&asset, &Config::default()).unwrap();
    let resolved = graph.resolve_transitions(&graph.states[0].asset.transitions).unwrap();
    assert_eq!(resolved[0].to_state_index, 0);

    let graph = flatten(&asset, &Config::strict()).unwrap();
    assert_eq!(
        graph.resolve_target(StateId(99)).unwrap_err(),
        BakeError::UnresolvedTransitionTarget { target: StateId(99) }
    );
}

#[test]
fn incomplete_and_misplaced_exit_declarations_produce_no_group() {
    let inner = StateMachineAsset::new("Inner").with_state(clip(11, "X"));
    let only_states = AnimationStateAsset::sub_machine(StateId(10), "OnlyStates", inner, StateId(11))
        .with_exit(&[StateId(11)], Vec::new());

    let inner2 = StateMachineAsset::new("Inner2").with_state(clip(21, "Y"));
    // Exit state 1 lives outside this sub-machine and is dropped.
    let outside_exit = AnimationStateAsset::sub_machine(StateId(20), "Outside", inner2, StateId(21))
        .with_exit(&[StateId(1)], vec![StateOutTransition::to(StateId(1))]);

    let asset = StateMachineAsset::new("M")
        .with_state(clip(1, "A"))
        .with_state(only_states)
        .with_state(outside_exit);
    let graph = flatten(&asset, &Config::default()).unwrap();
    assert!(graph.exit_transition_infos.is_empty());
    assert!(graph.states.iter().all(|s| s.exit_group_index == -1));
}

#[test]
fn sub_machine_without_graph_is_skipped() {
    let mut broken = AnimationStateAsset::sub_machine(
        StateId(5),
        "Broken",
        StateMachineAsset::new("Broken"),
        StateId(6),
    );
    if let StateKind::SubStateMachine(sub) = &mut broken.kind {
        sub.machine = None;
    }
    let asset = StateMachineAsset::new("M")
        .with_state(clip(1, "A"))
        .with_state(broken)
        .with_state(clip(2, "B"));
    let graph = flatten(&asset, &Config::default()).unwrap();
    assert_eq!(graph.states.len(), 2);
    assert!(graph.sub_machines.is_empty());
    assert_eq!(graph.states[1].clip_offset, 1);
}

#[test]
fn clip_space_overflow_is_a_hard_error() {
    let asset = fixture("locomotion");
    let cfg = Config {
        max_clips: 3,
        ..Config::default()
    };
    assert_eq!(
        flatten(&asset, &cfg).unwrap_err(),
        BakeError::ClipIndexOverflow { count: 11, max: 3 }
    );
}

#[test]
fn empty_machine_flattens_to_nothing() {
    let asset = StateMachineAsset::new("Empty");
    let graph = flatten(&asset, &Config::strict()).unwrap();
    assert!(graph.states.is_empty());
    assert_eq!(graph.default_state_index, 0);
}
