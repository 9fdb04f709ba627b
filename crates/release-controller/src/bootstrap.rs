//! Seeding the store from JSON manifests.
//!
//! Every `*.json` file in the seed directory holds one record or an array of
//! records. Each record must carry a `kind`. Files are applied in name order
//! and records that already exist are left alone, so seeding is idempotent.

use std::path::{Path, PathBuf};

use release_storage::{DynStore, StorageError, object_kind};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to apply a record from {}: {source}", path.display())]
    Store {
        path: PathBuf,
        source: StorageError,
    },
}

/// Statistics from a seeding run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapStats {
    pub files: usize,
    pub created: usize,
    pub skipped: usize,
}

/// Loads every manifest in `dir` into `store`.
pub async fn load_seed_dir(store: &DynStore, dir: &Path) -> Result<BootstrapStats, BootstrapError> {
    info!(dir = %dir.display(), "Loading seed manifests");

    let io_err = |source| BootstrapError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();

    let mut stats = BootstrapStats::default();
    for path in files {
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| BootstrapError::Io {
                path: path.clone(),
                source,
            })?;
        let manifest: Value =
            serde_json::from_str(&content).map_err(|source| BootstrapError::Parse {
                path: path.clone(),
                source,
            })?;
        let records = match manifest {
            Value::Array(items) => items,
            single => vec![single],
        };

        for record in &records {
            match apply_record(store, record).await {
                Ok(true) => stats.created += 1,
                Ok(false) => stats.skipped += 1,
                Err(source) => {
                    return Err(BootstrapError::Store {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }
        stats.files += 1;
        debug!(path = %path.display(), records = records.len(), "Applied manifest");
    }

    info!(
        files = stats.files,
        created = stats.created,
        skipped = stats.skipped,
        "Seed manifests loaded"
    );
    Ok(stats)
}

/// Creates one record; `Ok(false)` when it already exists.
async fn apply_record(store: &DynStore, record: &Value) -> Result<bool, StorageError> {
    let kind = object_kind(record)?;
    match store.create(kind, record).await {
        Ok(stored) => {
            debug!(kind, key = %stored.key, "Seeded record");
            Ok(true)
        }
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}
