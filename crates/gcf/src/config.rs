//! Run configuration and TOML experiment loading.
//!
//! `configs/*.toml` files have a `[training]` section plus one optional
//! section per model (`[dgcf]`, `[egcfv2]`). Missing fields fall back to the
//! defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::GcfError;
use crate::plugins::dgcf::DgcfConfig;
use crate::plugins::egcfv2::EgcfV2Config;

/// Model-independent training and evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of passes over the training transactions.
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// Triples per optimization step, also the user slice size at
    /// evaluation. `0` means one batch of `num_users`.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Evaluate every `validation_rate` epochs.
    #[serde(default = "default_validation_rate")]
    pub validation_rate: usize,

    /// Metric name tracked for best-model selection.
    #[serde(default = "default_validation_metric")]
    pub validation_metric: String,

    /// Cutoff at which `validation_metric` is read.
    #[serde(default = "default_validation_k")]
    pub validation_k: usize,

    /// Save model + optimizer state whenever a new best is observed.
    #[serde(default)]
    pub save_weights: bool,

    /// Write test recommendations to `recs_dir` at each evaluation.
    #[serde(default)]
    pub save_recs: bool,

    /// Skip training, restore the checkpoint, and evaluate once.
    #[serde(default)]
    pub restore: bool,

    /// Checkpoint directory (model, optimizer, metadata).
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,

    /// Output directory for recommendation TSV files.
    #[serde(default = "default_recs_dir")]
    pub recs_dir: PathBuf,

    /// Show a per-epoch progress bar.
    #[serde(default = "default_verbose")]
    pub verbose: bool,

    /// Seed for the batch sampler.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_epochs() -> usize {
    10
}
fn default_batch_size() -> usize {
    512
}
fn default_validation_rate() -> usize {
    1
}
fn default_validation_metric() -> String {
    "nDCG".to_string()
}
fn default_validation_k() -> usize {
    10
}
fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints/gcf")
}
fn default_recs_dir() -> PathBuf {
    PathBuf::from("results/recs")
}
fn default_verbose() -> bool {
    true
}
fn default_seed() -> u64 {
    42
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: default_epochs(),
            batch_size: default_batch_size(),
            validation_rate: default_validation_rate(),
            validation_metric: default_validation_metric(),
            validation_k: default_validation_k(),
            save_weights: false,
            save_recs: false,
            restore: false,
            checkpoint_dir: default_checkpoint_dir(),
            recs_dir: default_recs_dir(),
            verbose: default_verbose(),
            seed: default_seed(),
        }
    }
}

impl TrainingConfig {
    /// Reject settings the epoch loop cannot run with.
    pub fn validate(&self) -> Result<(), GcfError> {
        if self.validation_rate == 0 {
            return Err(GcfError::InvalidConfig(
                "validation_rate must be at least 1".to_string(),
            ));
        }
        if self.validation_metric.is_empty() {
            return Err(GcfError::InvalidConfig(
                "validation_metric must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Batch size with `0` replaced by the number of users.
    pub fn resolved_batch_size(&self, num_users: usize) -> usize {
        if self.batch_size == 0 {
            num_users.max(1)
        } else {
            self.batch_size
        }
    }
}

/// Top-level structure of an experiment TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct ExperimentToml {
    #[serde(default)]
    pub training: TrainingConfig,
    pub dgcf: Option<DgcfConfig>,
    pub egcfv2: Option<EgcfV2Config>,
}

/// Load and deserialize an `ExperimentToml` from a TOML file.
pub fn load_experiment_toml(path: &Path) -> anyhow::Result<ExperimentToml> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", path.display()))?;
    let config: ExperimentToml = toml::from_str(&contents)?;
    config.training.validate()?;
    tracing::info!(
        path = %path.display(),
        dgcf = config.dgcf.is_some(),
        egcfv2 = config.egcfv2.is_some(),
        "Loaded experiment config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cfg = TrainingConfig::default();
        assert_eq!(cfg.epochs, 10);
        assert_eq!(cfg.batch_size, 512);
        assert_eq!(cfg.validation_rate, 1);
        assert_eq!(cfg.validation_metric, "nDCG");
        assert_eq!(cfg.validation_k, 10);
        assert!(!cfg.save_weights);
        assert!(!cfg.restore);
        assert!(cfg.verbose);
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn test_partial_training_section() {
        let toml_str = r#"
[training]
epochs = 3
batch_size = 0
save_recs = true
"#;
        let cfg: ExperimentToml = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.training.epochs, 3);
        assert_eq!(cfg.training.batch_size, 0);
        assert!(cfg.training.save_recs);
        assert_eq!(cfg.training.validation_k, 10);
        assert!(cfg.dgcf.is_none());
        assert!(cfg.egcfv2.is_none());
    }

    #[test]
    fn test_model_sections() {
        let toml_str = r#"
[training]
validation_metric = "Recall"

[dgcf]
lr = 0.001
intents = 4

[egcfv2]
emb = 32
edge_features_path = "data/edge_features.tsv"
"#;
        let cfg: ExperimentToml = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.training.validation_metric, "Recall");
        let dgcf = cfg.dgcf.unwrap();
        assert!((dgcf.lr - 0.001).abs() < 1e-12);
        assert_eq!(dgcf.intents, 4);
        assert_eq!(dgcf.factors, 64);
        let egcf = cfg.egcfv2.unwrap();
        assert_eq!(egcf.emb, 32);
        assert_eq!(
            egcf.edge_features_path.as_deref(),
            Some(Path::new("data/edge_features.tsv"))
        );
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let cfg = TrainingConfig {
            validation_rate: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(GcfError::InvalidConfig(_))));
    }

    #[test]
    fn test_resolved_batch_size() {
        let cfg = TrainingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(cfg.resolved_batch_size(37), 37);
        assert_eq!(TrainingConfig::default().resolved_batch_size(37), 512);
    }

    #[test]
    fn test_load_experiment_toml_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exp.toml");
        std::fs::write(&path, "[training]\nepochs = 2\n").unwrap();
        let cfg = load_experiment_toml(&path).unwrap();
        assert_eq!(cfg.training.epochs, 2);

        std::fs::write(&path, "[training]\nvalidation_rate = 0\n").unwrap();
        assert!(load_experiment_toml(&path).is_err());
    }
}
