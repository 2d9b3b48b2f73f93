use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "state-machines")]
    state_machines: HashMap<String, StateMachineEntry>,
    #[serde(default)]
    animators: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StateMachineEntry {
    Path(String),
    Detailed {
        path: String,
        /// Free-form note on what the fixture exercises.
        #[serde(default)]
        covers: Option<String>,
    },
}

impl StateMachineEntry {
    fn as_path(&self) -> &str {
        match self {
            StateMachineEntry::Path(path) => path,
            StateMachineEntry::Detailed { path, .. } => path,
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod state_machines {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.state_machines.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.state_machines, "state machine", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.state_machines, "state machine", name)?;
        super::load_json(entry.as_path())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.state_machines, "state machine", name)?;
        Ok(resolve_path(entry.as_path()))
    }

    /// What the fixture is meant to exercise, when the manifest says so.
    pub fn covers(name: &str) -> Result<Option<String>> {
        let entry = lookup(&MANIFEST.state_machines, "state machine", name)?;
        Ok(match entry {
            StateMachineEntry::Path(_) => None,
            StateMachineEntry::Detailed { covers, .. } => covers.clone(),
        })
    }
}

pub mod animators {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.animators.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.animators, "animator", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&MANIFEST.animators, "animator", name)?;
        super::load_json(rel)
    }
}
