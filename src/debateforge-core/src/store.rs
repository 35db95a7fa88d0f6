//! Dataset persistence.
//!
//! The dataset is a pretty-printed JSON array with sorted keys. Saves go to
//! a sibling `.tmp` file which is then renamed over the target, so the file
//! on disk is always either the previous snapshot or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::record::DebateRecord;

#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
}

/// A fully written temporary file that has not replaced the target yet.
#[derive(Debug)]
pub struct StagedWrite {
    temp: PathBuf,
    target: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Rename the temporary file over the target.
    pub fn commit(self) -> Result<(), StoreError> {
        fs::rename(&self.temp, &self.target).map_err(|source| {
            let _ = fs::remove_file(&self.temp);
            StoreError::Persist {
                path: self.target.clone(),
                source,
            }
        })
    }
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the dataset; a missing file is an empty dataset.
    pub fn load(&self) -> Result<Vec<DebateRecord>, StoreError> {
        let records = self
            .load_values()?
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<DebateRecord>, _>>()
            .map_err(|source| self.corrupt(source))?;
        info!(path = %self.path.display(), count = records.len(), "loaded existing dataset");
        Ok(records)
    }

    /// Read the dataset as raw JSON entries, exactly as they are on disk.
    ///
    /// Only the outer array is checked; entries may have any shape.
    pub fn load_values(&self) -> Result<Vec<Value>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no existing dataset");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| self.corrupt(source))
    }

    /// Atomically replace the dataset with `records`.
    pub fn save(&self, records: &[DebateRecord]) -> Result<(), StoreError> {
        self.stage(records)?.commit()?;
        info!(path = %self.path.display(), count = records.len(), "saved dataset");
        Ok(())
    }

    /// Write `records` to the temporary sibling without touching the target.
    pub fn stage(&self, records: &[DebateRecord]) -> Result<StagedWrite, StoreError> {
        stage_bytes(&self.path, &encode_dataset(records)?)
    }

    fn corrupt(&self, source: serde_json::Error) -> StoreError {
        StoreError::Corrupt {
            path: self.path.clone(),
            source,
        }
    }
}

/// Serialize with sorted keys, two-space indent and literal non-ASCII.
pub fn encode_dataset(records: &[DebateRecord]) -> Result<Vec<u8>, StoreError> {
    // Going through `Value` sorts object keys.
    let value = serde_json::to_value(records)?;
    let mut bytes = serde_json::to_vec_pretty(&value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Atomically replace `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    stage_bytes(path, bytes)?.commit()
}

fn stage_bytes(target: &Path, bytes: &[u8]) -> Result<StagedWrite, StoreError> {
    let temp = temp_sibling(target);
    let persist_err = |source| StoreError::Persist {
        path: target.to_path_buf(),
        source,
    };

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(persist_err)?;
    }

    let written = File::create(&temp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(source) = written {
        let _ = fs::remove_file(&temp);
        return Err(persist_err(source));
    }

    Ok(StagedWrite {
        temp,
        target: target.to_path_buf(),
    })
}

fn temp_sibling(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    target.with_file_name(name)
}
