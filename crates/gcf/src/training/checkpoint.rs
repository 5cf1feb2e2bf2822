//! Best-model checkpoints.
//!
//! A checkpoint is a directory holding whatever the model writes through
//! [`GraphModel::save`] (parameters and optimizer state) plus `meta.json`
//! describing the evaluation that produced it. Every new best overwrites the
//! previous checkpoint in place. `meta.json` is removed before the model
//! files are rewritten and written back last, so a checkpoint without it is
//! incomplete and cannot be restored.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GcfError;
use crate::model::GraphModel;

/// Metadata saved alongside each checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// 1-based epoch of the best evaluation; `None` for the final evaluation.
    pub best_iteration: Option<usize>,
    /// Tracked metric name, e.g. `nDCG@10`.
    pub metric: String,
    pub value: f64,
}

/// Saves and restores the best model under one directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn meta_path(&self) -> PathBuf {
        self.dir.join("meta.json")
    }

    /// Whether a complete checkpoint has been written.
    pub fn exists(&self) -> bool {
        self.meta_path().is_file()
    }

    /// Persist model + optimizer state and metadata.
    ///
    /// Returns `Ok(false)` without touching the filesystem when there is no
    /// model to save.
    pub fn save<M: GraphModel>(&self, model: Option<&M>, meta: &CheckpointMeta) -> anyhow::Result<bool> {
        let Some(model) = model else {
            tracing::warn!("Saving weights FAILED. No model to save.");
            return Ok(false);
        };

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", self.dir.display()))?;
        let meta_path = self.meta_path();
        if meta_path.is_file() {
            std::fs::remove_file(&meta_path)
                .map_err(|e| anyhow::anyhow!("Failed to remove {}: {e}", meta_path.display()))?;
        }
        model.save(&self.dir)?;

        serde_json::to_writer_pretty(
            std::fs::File::create(&meta_path)
                .map_err(|e| anyhow::anyhow!("Failed to create {}: {e}", meta_path.display()))?,
            meta,
        )?;

        tracing::info!(
            dir = %self.dir.display(),
            best_iteration = ?meta.best_iteration,
            metric = %meta.metric,
            value = meta.value,
            "Checkpoint saved (model + optimizer + meta)"
        );
        Ok(true)
    }

    /// Read `meta.json`.
    pub fn read_meta(&self) -> anyhow::Result<CheckpointMeta> {
        let meta_path = self.meta_path();
        let meta: CheckpointMeta = serde_json::from_reader(
            std::fs::File::open(&meta_path)
                .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", meta_path.display()))?,
        )
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", meta_path.display()))?;
        Ok(meta)
    }

    /// Load the checkpoint into `model`. Every failure is reported as
    /// [`GcfError::Restore`].
    pub fn restore<M: GraphModel>(&self, model: &mut M) -> Result<CheckpointMeta, GcfError> {
        let meta = self.read_meta().map_err(GcfError::Restore)?;
        model.load(&self.dir).map_err(GcfError::Restore)?;
        tracing::info!(
            dir = %self.dir.display(),
            best_iteration = ?meta.best_iteration,
            "Restored model and optimizer state"
        );
        Ok(meta)
    }
}
