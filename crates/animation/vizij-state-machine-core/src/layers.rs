//! Animator layers: several state machines run side by side over one parameter set.
//!
//! Every layer is baked against the animator's shared parameter list, so a single
//! `ParameterBuffers` drives all of them. Combining the per-layer poses (override vs
//! additive, bone masks) is left to the pose-sampling host; this module only reports
//! each layer's request together with its weight, mode and mask.

use serde::{Deserialize, Serialize};

use crate::blob::StateMachineBlob;
use crate::config::Config;
use crate::convert::bake_with_parameters;
use crate::error::BakeError;
use crate::graph::StateMachineAsset;
use crate::ids::name_hash;
use crate::parameters::{ParameterAsset, ParameterBuffers, ParameterLayout, ParameterTable};
use crate::runtime::{ClipSample, Phase, StateMachineInstance};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerBlendMode {
    #[default]
    Override,
    Additive,
}

fn default_weight() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerAsset {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub blend_mode: LayerBlendMode,
    /// Bone names this layer affects; `None` means the whole skeleton.
    #[serde(default)]
    pub mask: Option<Vec<String>>,
    pub state_machine: StateMachineAsset,
}

impl LayerAsset {
    pub fn new(name: &str, state_machine: StateMachineAsset) -> Self {
        Self {
            name: name.to_string(),
            weight: 1.0,
            blend_mode: LayerBlendMode::Override,
            mask: None,
            state_machine,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn additive(mut self) -> Self {
        self.blend_mode = LayerBlendMode::Additive;
        self
    }

    pub fn with_mask(mut self, bones: &[&str]) -> Self {
        self.mask = Some(bones.iter().map(|b| b.to_string()).collect());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimatorAsset {
    pub parameters: Vec<ParameterAsset>,
    pub layers: Vec<LayerAsset>,
}

impl AnimatorAsset {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BakedLayer {
    pub name_hash: u32,
    pub weight: f32,
    pub blend_mode: LayerBlendMode,
    /// Hashed bone names; `None` affects every bone.
    pub mask: Option<Vec<u32>>,
    pub blob: StateMachineBlob,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimatorBlob {
    pub parameters: ParameterLayout,
    pub layers: Vec<BakedLayer>,
}

impl AnimatorBlob {
    pub fn parameter_buffers(&self) -> ParameterBuffers {
        ParameterBuffers::from_layout(&self.parameters)
    }
}

/// Bake every layer against the animator's shared parameters.
///
/// Parameters declared on a layer's own state machine are ignored; the animator list
/// is the single source of truth so that all layers agree on typed indices.
pub fn bake_animator(asset: &AnimatorAsset, cfg: &Config) -> Result<AnimatorBlob, BakeError> {
    let parameters = ParameterTable::build(&asset.parameters)?.into_layout();
    let mut layers = Vec::with_capacity(asset.layers.len());
    for layer in &asset.layers {
        if !layer.state_machine.parameters.is_empty() {
            log::warn!(
                "layer '{}' declares its own parameters; the animator's parameters are used instead",
                layer.name
            );
        }
        let blob = bake_with_parameters(&layer.state_machine, &asset.parameters, cfg)?;
        layers.push(BakedLayer {
            name_hash: name_hash(&layer.name),
            weight: layer.weight,
            blend_mode: layer.blend_mode,
            mask: layer
                .mask
                .as_ref()
                .map(|bones| bones.iter().map(|b| name_hash(b)).collect()),
            blob,
        });
    }
    log::debug!("baked animator with {} layers", layers.len());
    Ok(AnimatorBlob { parameters, layers })
}

/// Per-layer output of one `LayeredInstance::advance`.
#[derive(Debug, PartialEq)]
pub struct LayerOutput<'a> {
    pub layer_index: usize,
    pub weight: f32,
    pub blend_mode: LayerBlendMode,
    pub mask: Option<&'a [u32]>,
    pub phase: Phase,
    pub samples: &'a [ClipSample],
}

/// One `StateMachineInstance` per layer of an `AnimatorBlob`.
#[derive(Clone, Debug)]
pub struct LayeredInstance {
    instances: Vec<StateMachineInstance>,
}

impl LayeredInstance {
    pub fn new(blob: &AnimatorBlob, cfg: &Config) -> Self {
        Self {
            instances: blob
                .layers
                .iter()
                .map(|layer| StateMachineInstance::new(&layer.blob, cfg))
                .collect(),
        }
    }

    #[inline]
    pub fn layer_count(&self) -> usize {
        self.instances.len()
    }

    pub fn layer(&self, index: usize) -> Option<&StateMachineInstance> {
        self.instances.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut StateMachineInstance> {
        self.instances.get_mut(index)
    }

    /// Advance every layer by `dt` with the shared parameters.
    pub fn advance(&mut self, blob: &AnimatorBlob, dt: f32, params: &ParameterBuffers) {
        debug_assert_eq!(self.instances.len(), blob.layers.len());
        for (instance, layer) in self.instances.iter_mut().zip(&blob.layers) {
            instance.advance(&layer.blob, dt, params);
        }
    }

    /// Sampling requests produced by the last `advance`, in layer order.
    pub fn outputs<'a>(&'a self, blob: &'a AnimatorBlob) -> impl Iterator<Item = LayerOutput<'a>> + 'a {
        self.instances
            .iter()
            .zip(&blob.layers)
            .enumerate()
            .map(|(layer_index, (instance, layer))| LayerOutput {
                layer_index,
                weight: layer.weight,
                blend_mode: layer.blend_mode,
                mask: layer.mask.as_deref(),
                phase: instance.phase(),
                samples: instance.samples(),
            })
    }
}
