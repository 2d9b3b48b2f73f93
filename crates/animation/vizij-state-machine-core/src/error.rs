//! Error types for baking and navigation.

use thiserror::Error;

use crate::ids::StateId;
use crate::parameters::ParameterKind;

/// Errors that abort the bake of a single state machine asset.
///
/// Soft problems (skipped sub-machines, dropped exit states) are logged and never
/// surface here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BakeError {
    #[error("unresolved {kind:?} parameter '{name}' referenced by {context}")]
    UnresolvedParameter {
        name: String,
        kind: ParameterKind,
        context: String,
    },
    #[error("parameter '{name}' is {found:?} but {expected:?} is required")]
    ParameterTypeMismatch {
        name: String,
        expected: ParameterKind,
        found: ParameterKind,
    },
    #[error("parameter '{name}' is declared more than once")]
    DuplicateParameter { name: String },
    #[error("entry state of sub-machine '{machine}' does not resolve to a leaf state")]
    UnresolvedEntryState { machine: String },
    #[error("entry state chain of sub-machine '{machine}' is cyclic")]
    EntryStateCycle { machine: String },
    #[error("transition target {target} is not a state of this machine")]
    UnresolvedTransitionTarget { target: StateId },
    #[error("clip count {count} exceeds the clip index space of {max}")]
    ClipIndexOverflow { count: usize, max: usize },
    #[error("{count} {kind:?} parameters exceed the typed index space of {max}")]
    ParameterIndexOverflow {
        kind: ParameterKind,
        count: usize,
        max: usize,
    },
    #[error("baked pool needs {count} entries; pool offsets hold at most {max}")]
    PoolOverflow { count: usize, max: usize },
    #[error("state machine has leaf states but no resolvable default state")]
    MissingDefaultState,
    #[error("converter was disposed before the blob was built")]
    ConverterDisposed,
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
}

/// Errors raised by the navigation stack.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NavigationError {
    #[error("the root context can never be popped")]
    CannotPopRoot,
    #[error("navigation stack has no root context")]
    InvalidRoot,
}
