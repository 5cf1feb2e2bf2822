//! Mock implementations of the model and evaluator seams for testing
//! without a trainable network or a metric library.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::path::Path;

use burn::prelude::*;
use interactions::Recommendations;
use serde::{Deserialize, Serialize};

use crate::model::bridge::rows_to_tensor;
use crate::model::{Embeddings, GraphModel};
use crate::recommend::{EvalResult, Evaluator, SplitMetrics};
use crate::training::sampler::Batch;

// ---------------------------------------------------------------------------
// MockModel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MockState {
    users: Vec<Vec<f32>>,
    items: Vec<Vec<f32>>,
    steps: usize,
}

/// Model with fixed embeddings and scripted per-step losses.
///
/// Records every batch it is trained on. `save`/`load` round-trip the
/// embeddings and step counter through `mock_model.json`.
pub struct MockModel<B: Backend> {
    state: MockState,
    losses: VecDeque<f64>,
    default_loss: f64,
    batches: Vec<Batch>,
    device: B::Device,
    _backend: PhantomData<B>,
}

impl<B: Backend> MockModel<B> {
    /// Build from per-user and per-item embedding rows of equal width.
    pub fn from_rows(users: &[Vec<f32>], items: &[Vec<f32>]) -> Self {
        Self {
            state: MockState {
                users: users.to_vec(),
                items: items.to_vec(),
                steps: 0,
            },
            losses: VecDeque::new(),
            default_loss: 1.0,
            batches: Vec::new(),
            device: Default::default(),
            _backend: PhantomData,
        }
    }

    /// Losses returned by successive `train_step` calls; `default_loss`
    /// once they run out.
    pub fn with_losses(mut self, losses: Vec<f64>, default_loss: f64) -> Self {
        self.losses = losses.into();
        self.default_loss = default_loss;
        self
    }

    pub fn user_rows(&self) -> &[Vec<f32>] {
        &self.state.users
    }

    pub fn item_rows(&self) -> &[Vec<f32>] {
        &self.state.items
    }

    /// Number of `train_step` calls, including restored ones.
    pub fn steps(&self) -> usize {
        self.state.steps
    }

    /// Every batch seen by `train_step`, in order.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }
}

impl<B: Backend> GraphModel for MockModel<B> {
    type Backend = B;

    fn train_step(&mut self, batch: &Batch) -> anyhow::Result<f64> {
        self.state.steps += 1;
        self.batches.push(batch.clone());
        Ok(self.losses.pop_front().unwrap_or(self.default_loss))
    }

    fn propagate_embeddings(&self, _evaluate: bool) -> Embeddings<B> {
        Embeddings::Flat {
            users: rows_to_tensor(&self.state.users, &self.device),
            items: rows_to_tensor(&self.state.items, &self.device),
        }
    }

    fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("mock_model.json");
        serde_json::to_writer(std::fs::File::create(&path)?, &self.state)?;
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> anyhow::Result<()> {
        let path = dir.join("mock_model.json");
        let file = std::fs::File::open(&path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?;
        self.state = serde_json::from_reader(file)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockEvaluator
// ---------------------------------------------------------------------------

/// Evaluator that returns scripted metric values and keeps every set of
/// recommendations it receives.
pub struct MockEvaluator {
    k: usize,
    metric: String,
    values: VecDeque<f64>,
    received: Vec<Recommendations>,
}

impl MockEvaluator {
    /// Report `nDCG` at cutoff `k`, taking values from `values` in order
    /// (0.0 once exhausted).
    pub fn new(k: usize, values: Vec<f64>) -> Self {
        Self {
            k,
            metric: "nDCG".to_string(),
            values: values.into(),
            received: Vec::new(),
        }
    }

    /// Recommendation sets passed to `eval`, in order.
    pub fn received(&self) -> &[Recommendations] {
        &self.received
    }
}

impl Evaluator for MockEvaluator {
    fn needed_recommendations(&self) -> usize {
        self.k
    }

    fn eval(&mut self, recommendations: &Recommendations) -> anyhow::Result<EvalResult> {
        self.received.push(recommendations.clone());
        let value = self.values.pop_front().unwrap_or(0.0);

        let mut split = SplitMetrics::default();
        if !recommendations.validation.is_empty() {
            split.val_results.insert(self.metric.clone(), value);
        }
        split.test_results.insert(self.metric.clone(), value);

        let mut result = EvalResult::default();
        result.cutoffs.insert(self.k, split);
        Ok(result)
    }
}
