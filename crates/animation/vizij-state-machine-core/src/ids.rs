//! Identifiers for authoring assets and the stable name hash shared by bake and runtime.

use serde::{Deserialize, Serialize};

/// Identity of an authored state asset (leaf or sub-machine).
///
/// Ids are unique across the whole authoring graph, including every nested
/// sub-machine, so transitions can reference states at any nesting level.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub u32);

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the UTF-8 bytes of `name`.
///
/// Used as the identity key for parameters, clips and sub-machines in the blob.
pub const fn name_hash(name: &str) -> u32 {
    let bytes = name.as_bytes();
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hash_matches_reference_vectors() {
        assert_eq!(name_hash(""), 0x811c_9dc5);
        assert_eq!(name_hash("a"), 0xe40c_292c);
        assert_eq!(name_hash("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn name_hash_is_usable_in_const_context() {
        const SPEED: u32 = name_hash("Speed");
        assert_eq!(SPEED, name_hash("Speed"));
        assert_ne!(SPEED, name_hash("speed"));
    }
}
