//! Graph collaborative filtering training harness.
//!
//! Orchestrates DGCF and EGCFv2 style recommenders: builds the user-item
//! interaction graph, samples BPR triples, drives SGD epochs through a
//! [`GraphModel`], turns scores into masked top-k recommendation lists for an
//! external [`Evaluator`], and checkpoints model + optimizer state on every
//! new best validation score.
//!
//! # Key types
//!
//! - [`Trainer`]: the epoch loop with periodic evaluation and checkpointing
//! - [`GraphModel`]: trait implemented by trainable graph models
//! - [`FactorModel`]: burn BPR factorization backbone shipped with the crate
//! - [`Dgcf`] / [`EgcfV2`]: plugins that build graph inputs and a trainer
//! - [`Evaluator`]: trait for the external metric evaluator

pub mod config;
pub mod error;
pub mod graph;
pub mod mocks;
pub mod model;
pub mod plugins;
pub mod recommend;
pub mod training;

pub use config::{load_experiment_toml, ExperimentToml, TrainingConfig};
pub use error::GcfError;
pub use graph::{EdgeIndex, InteractionGraph, SparseAdjacency};
pub use model::factor::{FactorModel, FactorModelConfig, FactorNet};
pub use model::{Embeddings, GraphModel};
pub use plugins::dgcf::{Dgcf, DgcfConfig, DgcfInputs};
pub use plugins::egcfv2::{EgcfV2, EgcfV2Config, EgcfV2Inputs};
pub use plugins::ModelDescriptor;
pub use recommend::{get_recommendations, top_k, EvalResult, Evaluator, SplitMetrics};
pub use training::checkpoint::{CheckpointManager, CheckpointMeta};
pub use training::metrics::{ResultHistory, RunningLoss};
pub use training::sampler::{Batch, Sampler};
pub use training::trainer::{TrainOutcome, Trainer};
