use vizij_state_machine_core::{
    bake_state_machine, AnimationStateAsset, AnyStateTransition, ClipAsset, Config, IntComparator,
    ParameterAsset, ParameterBuffers, Phase, StateId, StateMachineAsset, StateMachineBlob,
    StateMachineInstance, StateOutTransition, TransitionSource,
};

fn approx(a: f32, b: f32) {
    assert!((a - b).abs() < 1e-4, "left={a} right={b}");
}

fn locomotion() -> (StateMachineBlob, ParameterBuffers, StateMachineInstance) {
    let asset: StateMachineAsset =
        vizij_test_fixtures::state_machines::load("locomotion").expect("load fixture");
    let cfg = Config::default();
    let blob = bake_state_machine(&asset, &cfg).expect("bake");
    let params = ParameterBuffers::from_layout(&blob.parameters);
    let instance = StateMachineInstance::new(&blob, &cfg);
    (blob, params, instance)
}

fn single(id: u32, name: &str, duration: f32) -> AnimationStateAsset {
    AnimationStateAsset::single_clip(StateId(id), name, ClipAsset::new(name, duration))
}

fn weight_sum(instance: &StateMachineInstance) -> f32 {
    instance.samples().iter().map(|s| s.weight).sum()
}

#[test]
fn starts_steady_in_default_state() {
    let (blob, params, mut inst) = locomotion();
    assert_eq!(inst.phase(), Phase::Steady);
    assert_eq!(inst.current_state_index(), 0);
    assert_eq!(inst.navigation().depth(), 0);

    let tick = inst.advance(&blob, 0.5, &params);
    assert_eq!(tick.phase, Phase::Steady);
    assert_eq!(tick.started, None);
    assert_eq!(tick.samples.len(), 1);
    let s = tick.samples[0];
    assert_eq!(s.clip_index, 0);
    approx(s.normalized_time, 0.25);
    approx(s.time, 0.5);
    approx(s.weight, 1.0);
}

#[test]
fn crossfade_splits_weight_between_source_and_target() {
    let (blob, mut params, mut inst) = locomotion();
    inst.advance(&blob, 0.5, &params);
    assert!(params.set_bool_by_name("Moving", true));

    let tick = inst.advance(&blob, 0.1, &params);
    assert_eq!(tick.phase, Phase::Transitioning);
    assert_eq!(tick.started, Some(TransitionSource::State));
    assert_eq!(tick.state_index, 1);
    // No curve: the weight is the raw progress.
    assert_eq!(tick.blend_weight, 0.1f32 / 0.25f32);
    assert_eq!(tick.samples.len(), 2);
    let (from, to) = (tick.samples[0], tick.samples[1]);
    assert_eq!(from.clip_index, 0);
    approx(from.weight, 0.6);
    approx(from.normalized_time, 0.3);
    // Speed 0 sits below the lowest threshold: walk only.
    assert_eq!(to.clip_index, 2);
    approx(to.weight, 0.4);
    approx(to.normalized_time, 0.1);
    approx(weight_sum(&inst), 1.0);

    let tick = inst.advance(&blob, 0.2, &params);
    assert_eq!(tick.phase, Phase::Steady);
    assert_eq!(tick.blend_weight, 1.0);
    assert_eq!(tick.samples.len(), 1);
    assert_eq!(tick.samples[0].clip_index, 2);
}

#[test]
fn any_state_transitions_take_priority_and_use_the_curve() {
    let (blob, mut params, mut inst) = locomotion();
    params.set_bool_by_name("Moving", true);
    params.set_bool_by_name("Jump", true);

    let tick = inst.advance(&blob, 0.05, &params);
    assert_eq!(tick.started, Some(TransitionSource::AnyState));
    // Airborne redirects to its entry leaf, JumpStart.
    assert_eq!(tick.state_index, 2);
    // Flat-tangent ease curve is symmetric around the midpoint.
    approx(tick.blend_weight, 0.5);
    assert_eq!(inst.navigation().depth(), 1);
    assert_eq!(inst.navigation().current().parent_sub_machine_index, 0);
}

#[test]
fn any_state_does_not_retrigger_into_current_state() {
    let (blob, mut params, mut inst) = locomotion();
    params.set_bool_by_name("Jump", true);
    inst.advance(&blob, 0.05, &params);
    let tick = inst.advance(&blob, 0.1, &params);
    assert_eq!(tick.phase, Phase::Steady);
    let tick = inst.advance(&blob, 0.1, &params);
    assert_eq!(tick.started, None);
    assert_eq!(tick.state_index, 2);
}

#[test]
fn exit_group_fires_only_from_declared_exit_states() {
    let (blob, mut params, mut inst) = locomotion();
    params.set_bool_by_name("Grounded", false);

    // Fall is inside Airborne but not an exit state.
    inst.force_state(&blob, 3, 0.95);
    assert_eq!(inst.navigation().depth(), 1);
    let tick = inst.advance(&blob, 0.01, &params);
    assert_eq!(tick.started, None);
    assert_eq!(tick.state_index, 3);

    // Land is the exit state; its exit transition is gated at 0.9.
    inst.force_state(&blob, 4, 0.5);
    let tick = inst.advance(&blob, 0.01, &params);
    assert_eq!(tick.started, None);

    inst.force_state(&blob, 4, 0.95);
    let tick = inst.advance(&blob, 0.01, &params);
    assert_eq!(tick.started, Some(TransitionSource::ExitGroup));
    assert_eq!(tick.state_index, 0);
    assert_eq!(inst.navigation().depth(), 0);
}

#[test]
fn jump_sequence_runs_through_the_sub_machine_and_back_out() {
    let (blob, mut params, mut inst) = locomotion();
    params.set_bool_by_name("Jump", true);
    inst.advance(&blob, 0.1, &params);
    params.set_bool_by_name("Jump", false);

    let mut visited = vec![inst.current_state_index()];
    for _ in 0..40 {
        inst.advance(&blob, 0.05, &params);
        if visited.last() != Some(&inst.current_state_index()) {
            visited.push(inst.current_state_index());
        }
    }
    // JumpStart -> Fall -> Land (grounded) -> Idle via the exit group.
    assert_eq!(visited, vec![2, 3, 4, 0]);
    assert_eq!(inst.navigation().depth(), 0);
}

#[test]
fn bool_and_int_conditions_are_a_conjunction() {
    let asset = StateMachineAsset::new("Conditions")
        .with_parameter(ParameterAsset::bool("Flag", false))
        .with_parameter(ParameterAsset::int("Count", 0))
        .with_state(
            single(1, "A", 1.0).with_transition(
                StateOutTransition::to(StateId(2))
                    .with_bool("Flag", true)
                    .with_int("Count", IntComparator::GreaterOrEqual, 2),
            ),
        )
        .with_state(single(2, "B", 1.0));
    let cfg = Config::default();
    let blob = bake_state_machine(&asset, &cfg).unwrap();

    for (flag, count, fires) in [(false, 0, false), (true, 0, false), (false, 3, false), (true, 3, true)] {
        let mut params = ParameterBuffers::from_layout(&blob.parameters);
        params.set_bool_by_name("Flag", flag);
        params.set_int_by_name("Count", count);
        let mut inst = StateMachineInstance::new(&blob, &cfg);
        let tick = inst.advance(&blob, 0.1, &params);
        assert_eq!(tick.started.is_some(), fires, "flag={flag} count={count}");
    }
}

#[test]
fn unconditional_transition_waits_for_exit_time_on_unwrapped_clock() {
    let asset = StateMachineAsset::new("ExitTime")
        .with_state(single(1, "A", 1.0).with_transition(StateOutTransition::to(StateId(2)).with_end_time(1.5)))
        .with_state(single(2, "B", 1.0));
    let cfg = Config::default();
    let blob = bake_state_machine(&asset, &cfg).unwrap();
    let params = ParameterBuffers::from_layout(&blob.parameters);
    let mut inst = StateMachineInstance::new(&blob, &cfg);

    for dt in [1.0, 0.4, 0.2] {
        let tick = inst.advance(&blob, dt, &params);
        assert_eq!(tick.started, None);
    }
    // Second loop: the sample wraps while the gate sees 1.6.
    approx(inst.samples()[0].normalized_time, 0.6);
    let tick = inst.advance(&blob, 0.01, &params);
    assert_eq!(tick.started, Some(TransitionSource::State));
    assert_eq!(tick.state_index, 1);
}

#[test]
fn zero_duration_transition_completes_immediately_at_offset() {
    let asset = StateMachineAsset::new("Snap")
        .with_state(single(1, "A", 1.0).with_transition(StateOutTransition::to(StateId(2)).with_offset(0.3)))
        .with_state(single(2, "B", 2.0));
    let cfg = Config::default();
    let blob = bake_state_machine(&asset, &cfg).unwrap();
    let params = ParameterBuffers::from_layout(&blob.parameters);
    let mut inst = StateMachineInstance::new(&blob, &cfg);

    let tick = inst.advance(&blob, 0.2, &params);
    assert_eq!(tick.phase, Phase::Steady);
    assert_eq!(tick.started, Some(TransitionSource::State));
    assert_eq!(tick.samples.len(), 1);
    let s = tick.samples[0];
    assert_eq!(s.clip_index, 1);
    approx(s.normalized_time, 0.4);
    approx(s.time, 0.8);
}

#[test]
fn speed_parameter_scales_playback_and_non_looping_states_clamp() {
    let (blob, mut params, mut inst) = locomotion();
    params.set_float_by_name("PlayRate", 0.5);
    inst.advance(&blob, 1.0, &params);
    approx(inst.current().normalized_time(), 0.25);

    // JumpStart does not loop.
    inst.force_state(&blob, 2, 0.0);
    params.set_bool_by_name("Grounded", false);
    inst.advance(&blob, 5.0, &params);
    approx(inst.current().normalized_time(), 1.0);
    approx(inst.samples()[0].time, 0.5);
}

#[test]
fn blend_states_emit_weighted_clips() {
    let (blob, mut params, mut inst) = locomotion();

    params.set_bool_by_name("Moving", true);
    inst.force_state(&blob, 1, 0.0);
    params.set_float_by_name("Speed", 2.0);
    inst.advance(&blob, 0.0, &params);
    let samples = inst.samples();
    assert_eq!(samples.len(), 2);
    approx(samples[0].weight, 0.5);
    approx(samples[1].weight, 0.5);

    params.set_int_by_name("Stance", 1);
    inst.force_state(&blob, 5, 0.0);
    params.set_float_by_name("MoveX", 1.0);
    inst.advance(&blob, 0.0, &params);
    assert_eq!(inst.samples().len(), 1);
    assert_eq!(inst.samples()[0].clip_index, 8);

    params.set_float_by_name("MoveX", 0.5);
    inst.advance(&blob, 0.0, &params);
    let mut clips: Vec<u16> = inst.samples().iter().map(|s| s.clip_index).collect();
    clips.sort_unstable();
    assert_eq!(clips, vec![6, 8]);
    approx(weight_sum(&inst), 1.0);
}

#[test]
fn any_state_self_transition_restarts_when_allowed() {
    let asset = StateMachineAsset::new("Self")
        .with_parameter(ParameterAsset::bool("Hit", false))
        .with_state(single(1, "A", 1.0))
        .with_any_state_transition(
            AnyStateTransition::new(StateOutTransition::to(StateId(1)).with_bool("Hit", true)).allow_self(),
        );
    let cfg = Config::default();
    let blob = bake_state_machine(&asset, &cfg).unwrap();
    let mut params = ParameterBuffers::from_layout(&blob.parameters);
    let mut inst = StateMachineInstance::new(&blob, &cfg);
    inst.advance(&blob, 0.5, &params);
    params.set_bool_by_name("Hit", true);
    let tick = inst.advance(&blob, 0.1, &params);
    assert_eq!(tick.started, Some(TransitionSource::AnyState));
    approx(inst.current().normalized_time(), 0.1);
}

#[test]
fn empty_blob_ticks_to_an_empty_request() {
    let cfg = Config::default();
    let blob = StateMachineBlob::default();
    let params = ParameterBuffers::from_layout(&blob.parameters);
    let mut inst = StateMachineInstance::new(&blob, &cfg);
    let tick = inst.advance(&blob, 0.1, &params);
    assert!(tick.samples.is_empty());
    assert_eq!(tick.phase, Phase::Steady);
}

#[test]
fn deep_nesting_navigation_tracks_entry_and_exit() {
    let asset: StateMachineAsset =
        vizij_test_fixtures::state_machines::load("deep-nesting").expect("load fixture");
    let cfg = Config::default();
    let blob = bake_state_machine(&asset, &cfg).unwrap();
    let mut params = ParameterBuffers::from_layout(&blob.parameters);
    let mut inst = StateMachineInstance::new(&blob, &cfg);
    assert_eq!(inst.navigation().depth(), 2);
    assert!(inst.navigation().validate());

    params.set_bool_by_name("Leave", true);
    // Start is not an exit state, so Leave has no effect until Finish.
    inst.advance(&blob, 0.3, &params);
    assert_eq!(inst.current_state_index(), 0);
    inst.advance(&blob, 0.3, &params);
    inst.advance(&blob, 0.01, &params);
    assert_eq!(inst.current_state_index(), 1);
    inst.advance(&blob, 0.01, &params);
    assert_eq!(inst.current_state_index(), 2);
    assert_eq!(inst.navigation().depth(), 0);
}

#[test]
fn long_running_loops_keep_full_time_resolution() {
    let asset = StateMachineAsset::new("Loop").with_state(single(1, "A", 1.0));
    let cfg = Config::default();
    let blob = bake_state_machine(&asset, &cfg).unwrap();
    let params = ParameterBuffers::from_layout(&blob.parameters);
    let mut inst = StateMachineInstance::new(&blob, &cfg);
    let dt = 1.0 / 60.0;

    inst.force_state(&blob, 0, 262_144.0);
    assert_eq!(inst.current().loops, 262_144);
    inst.advance(&blob, dt, &params);
    approx(inst.samples()[0].normalized_time, dt);
    inst.advance(&blob, dt, &params);
    approx(inst.samples()[0].normalized_time, 2.0 * dt);
    assert_eq!(inst.current().loops, 262_144);

    // Crossing a loop boundary bumps the counter and wraps the position.
    for _ in 0..60 {
        inst.advance(&blob, dt, &params);
    }
    assert_eq!(inst.current().loops, 262_145);
    approx(inst.samples()[0].normalized_time, 2.0 * dt);
    assert!(inst.current().normalized_time() >= 262_145.0);
}
