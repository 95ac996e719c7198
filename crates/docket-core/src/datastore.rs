use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::Snapshot;

pub const DEFAULT_SNAPSHOT_KEY: &str = "docket";

/// Keyed JSON documents under one data directory, one file per key.
#[derive(Debug, Clone)]
pub struct DataStore {
    pub data_dir: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened datastore");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        validate_key(key)?;
        Ok(self.data_dir.join(format!("{key}.json")))
    }

    /// `Ok(None)` when nothing was saved under `key` yet.
    #[tracing::instrument(skip(self))]
    pub fn load(&self, key: &str) -> anyhow::Result<Option<Snapshot>> {
        self.load_json(key)
    }

    #[tracing::instrument(skip(self, snapshot), fields(tasks = snapshot.tasks.len(), categories = snapshot.categories.len()))]
    pub fn save(&self, key: &str, snapshot: &Snapshot) -> anyhow::Result<()> {
        self.save_json(key, snapshot)
    }

    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            debug!(file = %path.display(), "no saved document");
            return Ok(None);
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", path.display()))?;
        debug!(file = %path.display(), "loaded document");
        Ok(Some(value))
    }

    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        save_json_atomic(&path, value).with_context(|| format!("failed to save {key}"))
    }
}

fn validate_key(key: &str) -> anyhow::Result<()> {
    let ok = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !key.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(anyhow!("invalid storage key: {key:?}"))
    }
}

#[tracing::instrument(skip(path, value))]
fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    debug!(file = %path.display(), "saving json atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, value)?;
    writeln!(temp)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
