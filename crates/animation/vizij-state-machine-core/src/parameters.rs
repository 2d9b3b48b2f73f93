//! Typed parameters: the alphabet transition conditions and blend bindings are written against.
//!
//! Authoring declares parameters by name. The converter resolves every name once into a
//! typed index (the position inside that type's buffer) and bakes the index; the runtime
//! only ever reads `ParameterBuffers` by index.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::BakeError;
use crate::ids::name_hash;

/// Stable parameter identity, computed identically at bake and run time.
#[inline]
pub const fn parameter_hash(name: &str) -> u32 {
    name_hash(name)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Bool,
    Int,
    Float,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Bool(_) => ParameterKind::Bool,
            ParameterValue::Int(_) => ParameterKind::Int,
            ParameterValue::Float(_) => ParameterKind::Float,
        }
    }
}

/// Authored parameter declaration. The kind is carried by the default value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterAsset {
    pub name: String,
    pub default: ParameterValue,
}

impl ParameterAsset {
    pub fn bool(name: &str, default: bool) -> Self {
        Self {
            name: name.to_string(),
            default: ParameterValue::Bool(default),
        }
    }

    pub fn int(name: &str, default: i32) -> Self {
        Self {
            name: name.to_string(),
            default: ParameterValue::Int(default),
        }
    }

    pub fn float(name: &str, default: f32) -> Self {
        Self {
            name: name.to_string(),
            default: ParameterValue::Float(default),
        }
    }

    #[inline]
    pub fn kind(&self) -> ParameterKind {
        self.default.kind()
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        parameter_hash(&self.name)
    }
}

/// One baked parameter slot: stable hash plus default value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSlot<T> {
    pub hash: u32,
    pub default: T,
}

/// Baked parameter layout: one array per type, indexed by the typed indices stored in the blob.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterLayout {
    pub bools: Vec<ParameterSlot<bool>>,
    pub ints: Vec<ParameterSlot<i32>>,
    pub floats: Vec<ParameterSlot<f32>>,
}

impl ParameterLayout {
    pub fn len(&self) -> usize {
        self.bools.len() + self.ints.len() + self.floats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reference to a numeric parameter read as `f32` (floats directly, ints converted).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericParameter {
    pub kind: ParameterKind,
    pub index: u16,
}

/// Typed indices are baked as `u16`.
fn typed_index(kind: ParameterKind, position: usize) -> Result<u16, BakeError> {
    u16::try_from(position).map_err(|_| {
        let max = u16::MAX as usize + 1;
        log::error!("more than {max} {kind:?} parameters declared");
        BakeError::ParameterIndexOverflow {
            kind,
            count: position + 1,
            max,
        }
    })
}

/// Bake-time name resolution table built from a machine's parameter declarations.
#[derive(Debug, Default)]
pub struct ParameterTable {
    by_hash: HashMap<u32, (ParameterKind, u16)>,
    layout: ParameterLayout,
}

impl ParameterTable {
    /// Build the table, assigning typed indices in declaration order.
    pub fn build(parameters: &[ParameterAsset]) -> Result<Self, BakeError> {
        let mut table = Self::default();
        for param in parameters {
            let hash = param.hash();
            if table.by_hash.contains_key(&hash) {
                log::error!("parameter '{}' is declared more than once", param.name);
                return Err(BakeError::DuplicateParameter {
                    name: param.name.clone(),
                });
            }
            let index = match param.default {
                ParameterValue::Bool(v) => {
                    table.layout.bools.push(ParameterSlot { hash, default: v });
                    table.layout.bools.len() - 1
                }
                ParameterValue::Int(v) => {
                    table.layout.ints.push(ParameterSlot { hash, default: v });
                    table.layout.ints.len() - 1
                }
                ParameterValue::Float(v) => {
                    table.layout.floats.push(ParameterSlot { hash, default: v });
                    table.layout.floats.len() - 1
                }
            };
            table.by_hash.insert(hash, (param.kind(), typed_index(param.kind(), index)?));
        }
        Ok(table)
    }

    /// Resolve `name` to the typed index of a parameter of exactly `kind`.
    pub fn resolve(&self, name: &str, kind: ParameterKind, context: &str) -> Result<u16, BakeError> {
        match self.by_hash.get(&parameter_hash(name)) {
            Some((found, index)) if *found == kind => Ok(*index),
            Some((found, _)) => {
                log::error!("parameter '{name}' used by {context} is {found:?}, expected {kind:?}");
                Err(BakeError::ParameterTypeMismatch {
                    name: name.to_string(),
                    expected: kind,
                    found: *found,
                })
            }
            None => {
                log::error!("unresolved {kind:?} parameter '{name}' referenced by {context}");
                Err(BakeError::UnresolvedParameter {
                    name: name.to_string(),
                    kind,
                    context: context.to_string(),
                })
            }
        }
    }

    /// Resolve `name` to a Float or Int parameter (used by 1D blend bindings).
    pub fn resolve_numeric(&self, name: &str, context: &str) -> Result<NumericParameter, BakeError> {
        match self.by_hash.get(&parameter_hash(name)) {
            Some((ParameterKind::Bool, _)) => {
                log::error!("parameter '{name}' used by {context} is Bool, expected a number");
                Err(BakeError::ParameterTypeMismatch {
                    name: name.to_string(),
                    expected: ParameterKind::Float,
                    found: ParameterKind::Bool,
                })
            }
            Some((kind, index)) => Ok(NumericParameter {
                kind: *kind,
                index: *index,
            }),
            None => {
                log::error!("unresolved numeric parameter '{name}' referenced by {context}");
                Err(BakeError::UnresolvedParameter {
                    name: name.to_string(),
                    kind: ParameterKind::Float,
                    context: context.to_string(),
                })
            }
        }
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    pub fn into_layout(self) -> ParameterLayout {
        self.layout
    }
}

/// Live per-instance parameter values, laid out exactly like the blob's `ParameterLayout`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterBuffers {
    bools: Vec<bool>,
    ints: Vec<i32>,
    floats: Vec<f32>,
    bool_hashes: Vec<u32>,
    int_hashes: Vec<u32>,
    float_hashes: Vec<u32>,
}

impl ParameterBuffers {
    /// Buffers initialised with the layout's default values.
    pub fn from_layout(layout: &ParameterLayout) -> Self {
        Self {
            bools: layout.bools.iter().map(|p| p.default).collect(),
            ints: layout.ints.iter().map(|p| p.default).collect(),
            floats: layout.floats.iter().map(|p| p.default).collect(),
            bool_hashes: layout.bools.iter().map(|p| p.hash).collect(),
            int_hashes: layout.ints.iter().map(|p| p.hash).collect(),
            float_hashes: layout.floats.iter().map(|p| p.hash).collect(),
        }
    }

    #[inline]
    pub fn bool(&self, index: u16) -> bool {
        self.bools[index as usize]
    }

    #[inline]
    pub fn int(&self, index: u16) -> i32 {
        self.ints[index as usize]
    }

    #[inline]
    pub fn float(&self, index: u16) -> f32 {
        self.floats[index as usize]
    }

    #[inline]
    pub fn numeric(&self, param: NumericParameter) -> f32 {
        match param.kind {
            ParameterKind::Int => self.int(param.index) as f32,
            _ => self.float(param.index),
        }
    }

    #[inline]
    pub fn set_bool(&mut self, index: u16, value: bool) {
        self.bools[index as usize] = value;
    }

    #[inline]
    pub fn set_int(&mut self, index: u16, value: i32) {
        self.ints[index as usize] = value;
    }

    #[inline]
    pub fn set_float(&mut self, index: u16, value: f32) {
        self.floats[index as usize] = value;
    }

    /// Set a parameter by stable hash. Returns false when no parameter of that type matches.
    pub fn set_by_hash(&mut self, hash: u32, value: ParameterValue) -> bool {
        match value {
            ParameterValue::Bool(v) => match self.bool_hashes.iter().position(|h| *h == hash) {
                Some(i) => {
                    self.bools[i] = v;
                    true
                }
                None => false,
            },
            ParameterValue::Int(v) => match self.int_hashes.iter().position(|h| *h == hash) {
                Some(i) => {
                    self.ints[i] = v;
                    true
                }
                None => false,
            },
            ParameterValue::Float(v) => match self.float_hashes.iter().position(|h| *h == hash) {
                Some(i) => {
                    self.floats[i] = v;
                    true
                }
                None => false,
            },
        }
    }

    /// Set a parameter by name (hashes the name first).
    pub fn set(&mut self, name: &str, value: ParameterValue) -> bool {
        self.set_by_hash(parameter_hash(name), value)
    }

    pub fn set_bool_by_name(&mut self, name: &str, value: bool) -> bool {
        self.set(name, ParameterValue::Bool(value))
    }

    pub fn set_int_by_name(&mut self, name: &str, value: i32) -> bool {
        self.set(name, ParameterValue::Int(value))
    }

    pub fn set_float_by_name(&mut self, name: &str, value: f32) -> bool {
        self.set(name, ParameterValue::Float(value))
    }

    /// Look a parameter up by name, whatever its type.
    pub fn get(&self, name: &str) -> Option<ParameterValue> {
        let hash = parameter_hash(name);
        if let Some(i) = self.bool_hashes.iter().position(|h| *h == hash) {
            return Some(ParameterValue::Bool(self.bools[i]));
        }
        if let Some(i) = self.int_hashes.iter().position(|h| *h == hash) {
            return Some(ParameterValue::Int(self.ints[i]));
        }
        self.float_hashes
            .iter()
            .position(|h| *h == hash)
            .map(|i| ParameterValue::Float(self.floats[i]))
    }
}
