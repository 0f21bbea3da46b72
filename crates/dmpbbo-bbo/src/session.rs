//! Addressable artifact store for an optimization session.
//!
//! Every artifact is addressed by a name and optionally by the update index
//! and the sample label of the generation it belongs to. The driver only ever
//! talks to the store through [`LearningSession::ask`],
//! [`LearningSession::tell`] and [`LearningSession::exists`], so rollouts can
//! be produced by another process between two updates.

use dmpbbo_core::{DmpBboError, Result, SampleLabel};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Artifact names used by the optimization driver.
pub mod keys {
    pub const TASK: &str = "task";
    pub const TASK_SOLVER: &str = "task_solver";
    pub const UPDATER: &str = "updater";
    pub const N_SAMPLES_PER_UPDATE: &str = "n_samples_per_update";
    pub const SEED: &str = "seed";
    pub const DMP_INITIAL: &str = "dmp_initial";
    pub const DISTRIBUTION_INITIAL: &str = "distribution_initial";
    pub const DISTRIBUTION: &str = "distribution";
    pub const DISTRIBUTION_NEW: &str = "distribution_new";
    pub const SAMPLES: &str = "samples";
    pub const SAMPLE: &str = "sample";
    pub const DMP: &str = "dmp";
    pub const COST_VARS: &str = "cost_vars";
    pub const COSTS: &str = "costs";
    pub const WEIGHTS: &str = "weights";
    pub const UPDATE_SUMMARY: &str = "update_summary";
}

/// Address of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub name: String,
    pub i_update: Option<usize>,
    pub i_sample: Option<SampleLabel>,
}

impl ArtifactKey {
    pub fn new(name: impl Into<String>, i_update: Option<usize>, i_sample: Option<SampleLabel>) -> Self {
        Self {
            name: name.into(),
            i_update,
            i_sample,
        }
    }

    /// Session-wide artifact.
    pub fn global(name: impl Into<String>) -> Self {
        Self::new(name, None, None)
    }

    /// Artifact of one generation.
    pub fn update(name: impl Into<String>, i_update: usize) -> Self {
        Self::new(name, Some(i_update), None)
    }

    /// Artifact of one sample within a generation.
    pub fn sample(name: impl Into<String>, i_update: usize, i_sample: SampleLabel) -> Self {
        Self::new(name, Some(i_update), Some(i_sample))
    }

    fn missing(&self) -> DmpBboError {
        DmpBboError::missing(self.name.clone(), self.i_update, self.i_sample)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(i) = self.i_update {
            write!(f, "[update {}]", i)?;
        }
        if let Some(s) = self.i_sample {
            write!(f, "[sample {}]", s)?;
        }
        Ok(())
    }
}

/// Persistence medium for serialized artifacts.
pub trait ArtifactStore {
    fn read(&self, key: &ArtifactKey) -> Result<Option<String>>;

    fn write(&mut self, key: &ArtifactKey, json: String) -> Result<()>;

    fn contains(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(self.read(key)?.is_some())
    }
}

/// Artifacts kept in memory for in-process optimization and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    artifacts: BTreeMap<ArtifactKey, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ArtifactKey> {
        self.artifacts.keys()
    }
}

impl ArtifactStore for MemoryStore {
    fn read(&self, key: &ArtifactKey) -> Result<Option<String>> {
        Ok(self.artifacts.get(key).cloned())
    }

    fn write(&mut self, key: &ArtifactKey, json: String) -> Result<()> {
        self.artifacts.insert(key.clone(), json);
        Ok(())
    }

    fn contains(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(self.artifacts.contains_key(key))
    }
}

/// One JSON file per artifact below a root directory:
///
/// ```text
/// root/task.json
/// root/update_00003/distribution.json
/// root/update_00003/sample_007/cost_vars.json
/// root/update_00003/eval/cost_vars.json
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Opens (and creates if needed) a session directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, key: &ArtifactKey) -> Result<PathBuf> {
        let mut path = self.root.clone();
        match (key.i_update, key.i_sample) {
            (None, None) => {}
            (Some(i), None) => path.push(format!("update_{:05}", i)),
            (Some(i), Some(sample)) => {
                path.push(format!("update_{:05}", i));
                match sample {
                    SampleLabel::Index(s) => path.push(format!("sample_{:03}", s)),
                    SampleLabel::Eval => path.push("eval"),
                }
            }
            (None, Some(_)) => {
                return Err(DmpBboError::invalid_input(format!(
                    "artifact '{}' has a sample label but no update index",
                    key.name
                )));
            }
        }
        path.push(format!("{}.json", key.name));
        Ok(path)
    }
}

impl ArtifactStore for DirectoryStore {
    fn read(&self, key: &ArtifactKey) -> Result<Option<String>> {
        let path = self.path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn write(&mut self, key: &ArtifactKey, json: String) -> Result<()> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, json)?;
        Ok(())
    }

    fn contains(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(self.path(key)?.exists())
    }
}

/// Typed `ask`/`tell`/`exists` on top of an [`ArtifactStore`].
#[derive(Debug, Clone)]
pub struct LearningSession<S> {
    store: S,
}

impl<S: ArtifactStore> LearningSession<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Reads an artifact; `MissingData` if it was never written.
    pub fn ask<T: DeserializeOwned>(
        &self,
        name: &str,
        i_update: Option<usize>,
        i_sample: Option<SampleLabel>,
    ) -> Result<T> {
        self.ask_key(&ArtifactKey::new(name, i_update, i_sample))
    }

    pub fn ask_key<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<T> {
        let json = self.store.read(key)?.ok_or_else(|| key.missing())?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Writes an artifact, replacing any previous value, and returns its key.
    pub fn tell<T: Serialize + ?Sized>(
        &mut self,
        value: &T,
        name: &str,
        i_update: Option<usize>,
        i_sample: Option<SampleLabel>,
    ) -> Result<ArtifactKey> {
        let key = ArtifactKey::new(name, i_update, i_sample);
        let json = serde_json::to_string_pretty(value)?;
        self.store.write(&key, json)?;
        debug!("Stored {}", key);
        Ok(key)
    }

    pub fn exists(&self, name: &str, i_update: Option<usize>, i_sample: Option<SampleLabel>) -> Result<bool> {
        self.store.contains(&ArtifactKey::new(name, i_update, i_sample))
    }
}
