//! EGCFv2 (Edge Graph Collaborative Filtering) plugin.
//!
//! Builds the symmetric node-node adjacency and loads the signed edge
//! features that label each training interaction.

use std::path::PathBuf;

use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use interactions::{load_edge_features, EdgeFeatures, InteractionData};
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::error::GcfError;
use crate::graph::{InteractionGraph, SparseAdjacency};
use crate::model::factor::{FactorModel, FactorModelConfig, FactorNet};
use crate::model::GraphModel;
use crate::plugins::ModelDescriptor;
use crate::recommend::Evaluator;
use crate::training::trainer::Trainer;

/// EGCFv2 hyperparameters (`[egcfv2]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgcfV2Config {
    #[serde(default = "default_lr")]
    pub lr: f64,
    #[serde(default = "default_emb")]
    pub emb: usize,
    #[serde(default = "default_n_layers")]
    pub n_layers: usize,
    #[serde(default = "default_l_w")]
    pub l_w: f64,
    /// TSV with `user`, `item`, `feature_path` columns. Required.
    #[serde(default)]
    pub edge_features_path: Option<PathBuf>,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_lr() -> f64 {
    0.0005
}
fn default_emb() -> usize {
    64
}
fn default_n_layers() -> usize {
    64
}
fn default_l_w() -> f64 {
    0.01
}
fn default_seed() -> u64 {
    42
}

impl Default for EgcfV2Config {
    fn default() -> Self {
        Self {
            lr: default_lr(),
            emb: default_emb(),
            n_layers: default_n_layers(),
            l_w: default_l_w(),
            edge_features_path: None,
            seed: default_seed(),
        }
    }
}

/// Everything an EGCFv2 model implementation needs at construction.
#[derive(Debug, Clone)]
pub struct EgcfV2Inputs {
    pub num_users: usize,
    pub num_items: usize,
    /// `(U+I) × (U+I)` adjacency with both edge directions.
    pub adjacency: SparseAdjacency,
    /// `(transactions × features)` signed feature matrix.
    pub edge_features: EdgeFeatures,
    /// User node of each training edge.
    pub rows: Vec<usize>,
    /// Item node (offset by `num_users`) of each training edge.
    pub cols: Vec<usize>,
    pub config: EgcfV2Config,
}

impl EgcfV2Inputs {
    pub fn factor_config(&self) -> FactorModelConfig {
        FactorModelConfig::new(self.num_users, self.num_items)
            .with_factors(self.config.emb)
            .with_lr(self.config.lr)
            .with_l_w(self.config.l_w)
            .with_seed(self.config.seed)
    }

    pub fn factor_backbone<B: AutodiffBackend>(
        &self,
        device: &B::Device,
    ) -> anyhow::Result<FactorModel<B, impl Optimizer<FactorNet<B>, B>>> {
        self.factor_config().init::<B>(device)
    }
}

/// EGCFv2 plugin entry point.
pub struct EgcfV2;

impl EgcfV2 {
    pub const NAME: &'static str = "EGCFv2";

    /// Run descriptor. The feature file path is left out of the name.
    pub fn descriptor(config: &EgcfV2Config) -> ModelDescriptor {
        ModelDescriptor::new(Self::NAME)
            .param("lr", config.lr)
            .param("emb", config.emb)
            .param("n_layers", config.n_layers)
            .param("l_w", config.l_w)
            .param("seed", config.seed)
    }

    pub fn inputs(data: &InteractionData, config: &EgcfV2Config) -> Result<EgcfV2Inputs, GcfError> {
        let path = config.edge_features_path.as_deref().ok_or_else(|| {
            GcfError::InvalidConfig("egcfv2 requires edge_features_path".to_string())
        })?;
        let graph = InteractionGraph::from_data(data);
        let edge_features = load_edge_features(path, data)?;

        Ok(EgcfV2Inputs {
            num_users: graph.num_users(),
            num_items: graph.num_items(),
            adjacency: graph.adjacency(),
            edge_features,
            rows: graph.rows().to_vec(),
            cols: graph.cols().to_vec(),
            config: config.clone(),
        })
    }

    /// Build graph inputs and edge features, hand them to `build_model`,
    /// and wrap the model in a trainer.
    pub fn build<M, E, F>(
        training: TrainingConfig,
        data: InteractionData,
        config: EgcfV2Config,
        evaluator: E,
        build_model: F,
    ) -> anyhow::Result<Trainer<M, E>>
    where
        M: GraphModel,
        E: Evaluator,
        F: FnOnce(EgcfV2Inputs) -> anyhow::Result<M>,
    {
        let inputs = Self::inputs(&data, &config)?;
        let (feature_rows, features) = inputs.edge_features.shape();
        tracing::info!(
            nnz = inputs.adjacency.nnz(),
            feature_rows,
            features,
            feature_entries = inputs.edge_features.nnz(),
            "Built EGCFv2 inputs"
        );
        let descriptor = Self::descriptor(&config);
        let model = build_model(inputs)?;
        Ok(Trainer::new(training, data, model, evaluator, descriptor)?)
    }
}
