//! Navigation stack: where an instance currently is inside nested sub-machines.
//!
//! One `StateMachineContext` per entered nesting level. Index 0 is always the root
//! (`parent_sub_machine_index == -1`). The stack is a plain growable vector: no depth
//! limit, no recursion.

use serde::{Deserialize, Serialize};

use crate::blob::StateMachineBlob;
use crate::error::NavigationError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineContext {
    /// Flattened leaf index last active at this level.
    pub current_state_index: i32,
    /// Sub-machine this level lives in; -1 for the root.
    pub parent_sub_machine_index: i32,
    pub level: u16,
}

impl StateMachineContext {
    pub const fn root(current_state_index: i32) -> Self {
        Self {
            current_state_index,
            parent_sub_machine_index: -1,
            level: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationStack {
    contexts: Vec<StateMachineContext>,
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new(4)
    }
}

impl NavigationStack {
    /// A stack holding only the root context.
    pub fn new(capacity: usize) -> Self {
        let mut contexts = Vec::with_capacity(capacity.max(1));
        contexts.push(StateMachineContext::root(0));
        Self { contexts }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Never true: the root context is always present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Nesting depth of the top context (root = 0).
    #[inline]
    pub fn depth(&self) -> usize {
        self.contexts.len() - 1
    }

    #[inline]
    pub fn contexts(&self) -> &[StateMachineContext] {
        &self.contexts
    }

    /// Enter a sub-machine.
    pub fn push(&mut self, context: StateMachineContext) {
        self.contexts.push(context);
    }

    /// Leave the innermost sub-machine. The root can never be popped.
    pub fn pop(&mut self) -> Result<StateMachineContext, NavigationError> {
        if self.contexts.len() <= 1 {
            return Err(NavigationError::CannotPopRoot);
        }
        self.contexts.pop().ok_or(NavigationError::InvalidRoot)
    }

    #[inline]
    pub fn current(&self) -> &StateMachineContext {
        &self.contexts[self.contexts.len() - 1]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut StateMachineContext {
        let last = self.contexts.len() - 1;
        &mut self.contexts[last]
    }

    /// Second-from-top context, if any.
    #[inline]
    pub fn parent(&self) -> Option<&StateMachineContext> {
        let n = self.contexts.len();
        if n >= 2 {
            self.contexts.get(n - 2)
        } else {
            None
        }
    }

    /// Every context's level matches its position and the root has no parent.
    pub fn validate(&self) -> bool {
        match self.contexts.first() {
            Some(root) if root.parent_sub_machine_index == -1 => {}
            _ => return false,
        }
        self.contexts
            .iter()
            .enumerate()
            .all(|(i, c)| c.level as usize == i)
    }

    /// Drop every level above the root and point the root at `state_index`.
    pub fn reset(&mut self, state_index: i32) {
        self.contexts.truncate(1);
        self.contexts[0] = StateMachineContext::root(state_index);
    }

    /// Re-sync the stack so its levels match the nesting of leaf `state_index`:
    /// pop levels that do not enclose the leaf, then push the levels entered on the way in.
    pub fn sync_to_state(&mut self, blob: &StateMachineBlob, state_index: usize) {
        let Some(state) = blob.states.get(state_index) else {
            debug_assert!(false, "state index {state_index} out of range");
            return;
        };
        let target = state.sub_machine_index;

        while self.contexts.len() > 1 && !encloses(blob, self.current().parent_sub_machine_index, target) {
            self.contexts.pop();
        }

        let target_level = if target >= 0 {
            blob.sub_machines[target as usize].level as usize
        } else {
            0
        };
        while self.depth() < target_level {
            let next_level = self.depth() + 1;
            let sub = ancestor_at_level(blob, target, next_level);
            self.contexts.push(StateMachineContext {
                current_state_index: state_index as i32,
                parent_sub_machine_index: sub,
                level: next_level as u16,
            });
        }
        self.current_mut().current_state_index = state_index as i32;
    }
}

/// Whether sub-machine `outer` is `inner` or one of its ancestors. -1 encloses everything.
fn encloses(blob: &StateMachineBlob, outer: i32, inner: i32) -> bool {
    if outer < 0 {
        return true;
    }
    let mut current = inner;
    while current >= 0 {
        if current == outer {
            return true;
        }
        current = blob.sub_machines[current as usize].parent;
    }
    false
}

/// The ancestor of `sub` (or `sub` itself) sitting at nesting `level`.
fn ancestor_at_level(blob: &StateMachineBlob, sub: i32, level: usize) -> i32 {
    let mut current = sub;
    while current >= 0 {
        let m = &blob.sub_machines[current as usize];
        if m.level as usize == level {
            return current;
        }
        current = m.parent;
    }
    -1
}
