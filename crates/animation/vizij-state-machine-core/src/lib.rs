#![allow(dead_code)]
//! Vizij State Machine Core (engine-agnostic)
//!
//! Authoring graphs of animation states (single clips, 1D/2D blends, nested
//! sub-machines) are flattened into leaf-only index space, converted into a compact
//! pointer-free `StateMachineBlob`, and evaluated per tick by `StateMachineInstance`,
//! which emits a pose-sampling request for the host to blend.

pub mod blend;
pub mod blob;
pub mod config;
pub mod convert;
pub mod curve;
pub mod error;
pub mod flatten;
pub mod graph;
pub mod ids;
pub mod layers;
pub mod navigation;
pub mod parameters;
pub mod runtime;
pub mod scratch;

// Re-exports for consumers (adapters)
pub use blend::{directional_blend_weights, linear_blend_weights};
pub use blob::{
    export_blob_json, BakedClip, BakedState, BakedSubMachine, BakedTransition, ExitTransitionGroup,
    IndexRange, StateMachineBlob, StateType,
};
pub use config::Config;
pub use convert::{bake_state_machine, bake_with_parameters, StateMachineConverter};
pub use curve::{transition_weight, BlendCurve, CurveKeyframe, PackedKeyframe};
pub use error::{BakeError, NavigationError};
pub use flatten::{flatten, FlattenedGraph};
pub use graph::{
    AnimationStateAsset, AnyStateTransition, Blend2DAlgorithm, ClipAsset, Directional2DClip,
    IntComparator, LinearBlendClip, StateKind, StateMachineAsset, StateOutTransition,
    SubStateMachineAsset,
};
pub use ids::{name_hash, StateId};
pub use layers::{bake_animator, AnimatorAsset, AnimatorBlob, LayerAsset, LayerBlendMode, LayeredInstance};
pub use navigation::{NavigationStack, StateMachineContext};
pub use parameters::{parameter_hash, ParameterAsset, ParameterBuffers, ParameterKind, ParameterValue};
pub use runtime::{ClipSample, Phase, StateMachineInstance, Tick, TransitionSource};
pub use scratch::Scratch;
