//! DGCF (Disentangled Graph Collaborative Filtering) plugin.
//!
//! Builds the undirected user-item edge index the disentangled propagation
//! runs over and wires a model built from it into a [`Trainer`]. Intent
//! embeddings are flattened to `[n, intents * d]` before scoring.

use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use interactions::InteractionData;
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::graph::{EdgeIndex, InteractionGraph};
use crate::model::factor::{FactorModel, FactorModelConfig, FactorNet};
use crate::model::GraphModel;
use crate::plugins::ModelDescriptor;
use crate::recommend::Evaluator;
use crate::training::trainer::Trainer;

/// DGCF hyperparameters (`[dgcf]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DgcfConfig {
    #[serde(default = "default_lr")]
    pub lr: f64,
    /// Total embedding width, split evenly across intents.
    #[serde(default = "default_factors")]
    pub factors: usize,
    /// BPR regularization weight.
    #[serde(default = "default_l_w")]
    pub l_w_bpr: f64,
    /// Independence (distance correlation) loss weight.
    #[serde(default = "default_l_w")]
    pub l_w_ind: f64,
    /// Nodes sampled per step for the independence loss.
    #[serde(default = "default_ind_batch_size")]
    pub ind_batch_size: usize,
    #[serde(default = "default_n_layers")]
    pub n_layers: usize,
    #[serde(default = "default_intents")]
    pub intents: usize,
    #[serde(default = "default_routing_iterations")]
    pub routing_iterations: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_lr() -> f64 {
    0.0005
}
fn default_factors() -> usize {
    64
}
fn default_l_w() -> f64 {
    0.01
}
fn default_ind_batch_size() -> usize {
    512
}
fn default_n_layers() -> usize {
    3
}
fn default_intents() -> usize {
    16
}
fn default_routing_iterations() -> usize {
    2
}
fn default_seed() -> u64 {
    42
}

impl Default for DgcfConfig {
    fn default() -> Self {
        Self {
            lr: default_lr(),
            factors: default_factors(),
            l_w_bpr: default_l_w(),
            l_w_ind: default_l_w(),
            ind_batch_size: default_ind_batch_size(),
            n_layers: default_n_layers(),
            intents: default_intents(),
            routing_iterations: default_routing_iterations(),
            seed: default_seed(),
        }
    }
}

/// Everything a DGCF model implementation needs at construction.
#[derive(Debug, Clone)]
pub struct DgcfInputs {
    pub num_users: usize,
    pub num_items: usize,
    /// `[rows ++ cols, cols ++ rows]` over the unified node space.
    pub edge_index: EdgeIndex,
    pub config: DgcfConfig,
}

impl DgcfInputs {
    /// Factorization backbone settings matching these inputs.
    pub fn factor_config(&self) -> FactorModelConfig {
        FactorModelConfig::new(self.num_users, self.num_items)
            .with_factors(self.config.factors)
            .with_intents(self.config.intents)
            .with_lr(self.config.lr)
            .with_l_w(self.config.l_w_bpr)
            .with_seed(self.config.seed)
    }

    /// Build the shipped burn backbone on `device`.
    pub fn factor_backbone<B: AutodiffBackend>(
        &self,
        device: &B::Device,
    ) -> anyhow::Result<FactorModel<B, impl Optimizer<FactorNet<B>, B>>> {
        self.factor_config().init::<B>(device)
    }
}

/// DGCF plugin entry point.
pub struct Dgcf;

impl Dgcf {
    pub const NAME: &'static str = "DGCF";

    pub fn descriptor(config: &DgcfConfig) -> ModelDescriptor {
        ModelDescriptor::new(Self::NAME)
            .param("lr", config.lr)
            .param("factors", config.factors)
            .param("l_w_bpr", config.l_w_bpr)
            .param("l_w_ind", config.l_w_ind)
            .param("ind_batch_size", config.ind_batch_size)
            .param("n_layers", config.n_layers)
            .param("intents", config.intents)
            .param("routing_iterations", config.routing_iterations)
            .param("seed", config.seed)
    }

    pub fn inputs(data: &InteractionData, config: &DgcfConfig) -> DgcfInputs {
        let graph = InteractionGraph::from_data(data);
        DgcfInputs {
            num_users: graph.num_users(),
            num_items: graph.num_items(),
            edge_index: graph.undirected_edge_index(),
            config: config.clone(),
        }
    }

    /// Build graph inputs, hand them to `build_model`, and wrap the model
    /// in a trainer.
    pub fn build<M, E, F>(
        training: TrainingConfig,
        data: InteractionData,
        config: DgcfConfig,
        evaluator: E,
        build_model: F,
    ) -> anyhow::Result<Trainer<M, E>>
    where
        M: GraphModel,
        E: Evaluator,
        F: FnOnce(DgcfInputs) -> anyhow::Result<M>,
    {
        if config.intents == 0 || config.factors % config.intents != 0 {
            return Err(crate::error::GcfError::InvalidConfig(format!(
                "dgcf factors ({}) must be a positive multiple of intents ({})",
                config.factors, config.intents
            ))
            .into());
        }
        let inputs = Self::inputs(&data, &config);
        tracing::info!(
            edges = inputs.edge_index.num_edges(),
            intents = config.intents,
            factors = config.factors,
            "Built DGCF inputs"
        );
        let descriptor = Self::descriptor(&config);
        let model = build_model(inputs)?;
        Ok(Trainer::new(training, data, model, evaluator, descriptor)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GcfError;
    use crate::mocks::{MockEvaluator, MockModel};
    use burn::backend::ndarray::NdArray;

    fn data() -> InteractionData {
        let train: Vec<(String, String)> = [("u0", "i0"), ("u0", "i1"), ("u1", "i1")]
            .iter()
            .map(|(u, i)| (u.to_string(), i.to_string()))
            .collect();
        InteractionData::from_splits(&train, None, &[]).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = DgcfConfig::default();
        assert_eq!(cfg.factors, 64);
        assert_eq!(cfg.intents, 16);
        assert_eq!(cfg.n_layers, 3);
        assert_eq!(cfg.routing_iterations, 2);
        assert_eq!(cfg.ind_batch_size, 512);
        assert!((cfg.l_w_ind - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_inputs_edge_index() {
        let inputs = Dgcf::inputs(&data(), &DgcfConfig::default());
        assert_eq!(inputs.num_users, 2);
        assert_eq!(inputs.num_items, 2);
        assert_eq!(inputs.edge_index.sources, vec![0, 0, 1, 2, 3, 3]);
        assert_eq!(inputs.edge_index.targets, vec![2, 3, 3, 0, 0, 1]);

        let factor = inputs.factor_config();
        assert_eq!(factor.intents, 16);
        assert_eq!(factor.factors, 64);
    }

    #[test]
    fn test_descriptor_name() {
        let cfg = DgcfConfig {
            intents: 4,
            ..Default::default()
        };
        let name = Dgcf::descriptor(&cfg).name(42, 5, 256);
        assert_eq!(
            name,
            "DGCF_seed=42_e=5_bs=256_lr=0$0005_factors=64_l_w_bpr=0$01_l_w_ind=0$01_\
             ind_batch_size=512_n_layers=3_intents=4_routing_iterations=2_seed=42"
        );
    }

    #[test]
    fn test_build_rejects_indivisible_intents() {
        let cfg = DgcfConfig {
            factors: 10,
            intents: 4,
            ..Default::default()
        };
        let err = Dgcf::build(
            TrainingConfig::default(),
            data(),
            cfg,
            MockEvaluator::new(10, vec![]),
            |_| Ok(MockModel::<NdArray<f32>>::from_rows(&[vec![1.0]], &[vec![1.0]])),
        )
        .err()
        .unwrap();
        assert!(matches!(
            err.downcast_ref::<GcfError>(),
            Some(GcfError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_passes_inputs_to_builder() {
        let trainer = Dgcf::build(
            TrainingConfig::default(),
            data(),
            DgcfConfig::default(),
            MockEvaluator::new(10, vec![]),
            |inputs| {
                assert_eq!(inputs.edge_index.num_edges(), 6);
                Ok(MockModel::<NdArray<f32>>::from_rows(
                    &[vec![1.0], vec![1.0]],
                    &[vec![1.0], vec![1.0]],
                ))
            },
        )
        .unwrap();
        assert!(trainer.name().starts_with("DGCF_seed=42_e=10_bs=512_"));
    }
}
