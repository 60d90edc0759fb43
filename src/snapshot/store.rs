//! File-backed snapshot cache keyed by (category, key).

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::EffectiveConfig;
use crate::observability::metrics;

/// Errors raised by the local snapshot store.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Category or key cannot be used as a file name.
    #[error("invalid snapshot name: {0:?}")]
    InvalidName(String),

    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not hold a valid configuration.
    #[error("corrupt snapshot at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Stores [`EffectiveConfig`] snapshots as JSON files under a root directory.
///
/// Layout: `<root>/<category>/<key>.json`. Writes go to a temporary file
/// that is renamed over the target, so a crash never leaves a partial file.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStore {
    root: PathBuf,
}

impl LocalSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the snapshot file for `(category, key)`.
    pub fn path_of(&self, category: &str, key: &str) -> Result<PathBuf, SnapshotError> {
        check_name(category)?;
        check_name(key)?;
        Ok(self.root.join(category).join(format!("{}.json", key)))
    }

    /// Persist a snapshot, replacing any previous one.
    pub fn save(
        &self,
        category: &str,
        key: &str,
        config: &EffectiveConfig,
    ) -> Result<(), SnapshotError> {
        let path = self.path_of(category, key)?;
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| SnapshotError::Io { path, source }
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err(dir))?;
        }

        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp).map_err(io_err(&tmp))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, config).map_err(|source| {
                SnapshotError::Corrupt {
                    path: tmp.clone(),
                    source,
                }
            })?;
            writer.flush().map_err(io_err(&tmp))?;
            writer.get_ref().sync_all().map_err(io_err(&tmp))?;
        }
        fs::rename(&tmp, &path).map_err(io_err(&path))?;

        tracing::debug!(path = %path.display(), "Saved configuration snapshot");
        metrics::record_snapshot_saved();
        Ok(())
    }

    /// Load a snapshot, or `None` if none was saved.
    pub fn load(&self, category: &str, key: &str) -> Result<Option<EffectiveConfig>, SnapshotError> {
        let path = self.path_of(category, key)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(SnapshotError::Io { path, source }),
        };

        let config = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| SnapshotError::Corrupt {
                path: path.clone(),
                source,
            })?;

        tracing::info!(path = %path.display(), "Loaded configuration snapshot");
        Ok(Some(config))
    }

    /// Remove a snapshot. Returns whether one existed.
    pub fn delete(&self, category: &str, key: &str) -> Result<bool, SnapshotError> {
        let path = self.path_of(category, key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Deleted configuration snapshot");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SnapshotError::Io { path, source }),
        }
    }
}

fn check_name(name: &str) -> Result<(), SnapshotError> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(SnapshotError::InvalidName(name.to_string()))
    }
}
