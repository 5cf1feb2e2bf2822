//! BPR-trained factorization backbone.
//!
//! Plain user/item embedding tables scored by inner product and trained with
//! the BPR pairwise loss plus L2 regularization. It performs no graph
//! propagation; it exists so the training loop, checkpointing, and ranking
//! can run end to end against a real burn model. When `intents > 1` the
//! tables are reported as `intents` equal-width sub-vectors.
//!
//! ```text
//! (users, pos, neg) ids
//!   → select rows of user_embedding / item_embedding      (batch, d)
//!   → x_ui = <u, i>, x_uj = <u, j>
//!   → loss = -mean(log σ(x_ui - x_uj)) + l_w/2 · (‖u‖² + ‖i‖² + ‖j‖²) / batch
//! ```

use std::path::Path;

use burn::module::{AutodiffModule, Param};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use burn::tensor::activation::log_sigmoid;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::Distribution;

use crate::model::bridge::index_tensor;
use crate::model::{Embeddings, GraphModel};
use crate::training::sampler::Batch;

/// Configuration for the factorization backbone.
#[derive(Config, Debug)]
pub struct FactorModelConfig {
    /// Number of users (rows of the user table).
    pub num_users: usize,
    /// Number of items (rows of the item table).
    pub num_items: usize,
    /// Embedding width.
    #[config(default = 64)]
    pub factors: usize,
    /// Number of intent sub-vectors reported by `propagate_embeddings`.
    /// Must divide `factors`.
    #[config(default = 1)]
    pub intents: usize,
    /// Adam learning rate.
    #[config(default = 0.0005)]
    pub lr: f64,
    /// L2 regularization weight.
    #[config(default = 0.01)]
    pub l_w: f64,
    /// Seed for parameter initialization.
    #[config(default = 42)]
    pub seed: u64,
}

/// The trainable tables.
#[derive(Module, Debug)]
pub struct FactorNet<B: Backend> {
    /// `[num_users, factors]`.
    user_embedding: Param<Tensor<B, 2>>,
    /// `[num_items, factors]`.
    item_embedding: Param<Tensor<B, 2>>,
}

impl FactorModelConfig {
    /// Check that the tables can be built and split into intents.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.num_users == 0 || self.num_items == 0 {
            anyhow::bail!(
                "factor model needs at least one user and one item (got {} users, {} items)",
                self.num_users,
                self.num_items
            );
        }
        if self.factors == 0 || self.intents == 0 {
            anyhow::bail!("factors and intents must be positive");
        }
        if self.factors % self.intents != 0 {
            anyhow::bail!(
                "factors ({}) must be divisible by intents ({})",
                self.factors,
                self.intents
            );
        }
        Ok(())
    }

    /// Initialize the tables with Xavier-normal values.
    pub fn init_net<B: Backend>(&self, device: &B::Device) -> FactorNet<B> {
        B::seed(self.seed);
        FactorNet {
            user_embedding: xavier_normal([self.num_users, self.factors], device),
            item_embedding: xavier_normal([self.num_items, self.factors], device),
        }
    }

    /// Build the trainable model together with its Adam optimizer.
    pub fn init<B: AutodiffBackend>(
        &self,
        device: &B::Device,
    ) -> anyhow::Result<FactorModel<B, impl Optimizer<FactorNet<B>, B>>> {
        self.validate()?;
        let net = self.init_net::<B>(device);
        let optim = AdamConfig::new().init::<B, FactorNet<B>>();
        tracing::info!(
            users = self.num_users,
            items = self.num_items,
            factors = self.factors,
            intents = self.intents,
            params = net.num_params(),
            "Initialized factor backbone"
        );
        Ok(FactorModel {
            net,
            optim: Some(optim),
            config: self.clone(),
            device: device.clone(),
        })
    }
}

fn xavier_normal<B: Backend>(shape: [usize; 2], device: &B::Device) -> Param<Tensor<B, 2>> {
    let std = (2.0 / (shape[0] + shape[1]) as f64).sqrt();
    Param::from_tensor(Tensor::random(shape, Distribution::Normal(0.0, std), device))
}

impl<B: Backend> FactorNet<B> {
    /// BPR loss with L2 regularization on the gathered rows.
    ///
    /// Returns `(loss, x_ui - x_uj)`; the difference has shape `(batch,)`.
    pub fn bpr_loss(
        &self,
        users: Tensor<B, 1, Int>,
        pos_items: Tensor<B, 1, Int>,
        neg_items: Tensor<B, 1, Int>,
        l_w: f64,
    ) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let [batch] = users.dims();
        let u = self.user_embedding.val().select(0, users);
        let i = self.item_embedding.val().select(0, pos_items);
        let j = self.item_embedding.val().select(0, neg_items);

        let x_ui: Tensor<B, 1> = (u.clone() * i.clone()).sum_dim(1).squeeze::<1>(1);
        let x_uj: Tensor<B, 1> = (u.clone() * j.clone()).sum_dim(1).squeeze::<1>(1);
        let diff = x_ui - x_uj;

        let bpr = log_sigmoid(diff.clone()).mean().neg();
        let reg = (u.powf_scalar(2.0).sum() + i.powf_scalar(2.0).sum() + j.powf_scalar(2.0).sum())
            * (0.5 * l_w / batch.max(1) as f64);

        (bpr + reg, diff)
    }

    /// Current user table.
    pub fn users(&self) -> Tensor<B, 2> {
        self.user_embedding.val()
    }

    /// Current item table.
    pub fn items(&self) -> Tensor<B, 2> {
        self.item_embedding.val()
    }
}

/// The factorization backbone plus its optimizer, driven through [`GraphModel`].
pub struct FactorModel<B: AutodiffBackend, O> {
    net: FactorNet<B>,
    /// Always `Some` outside of `load`, which needs the optimizer by value.
    optim: Option<O>,
    config: FactorModelConfig,
    device: B::Device,
}

impl<B: AutodiffBackend, O> FactorModel<B, O> {
    pub fn net(&self) -> &FactorNet<B> {
        &self.net
    }

    pub fn config(&self) -> &FactorModelConfig {
        &self.config
    }
}

impl<B, O> GraphModel for FactorModel<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<FactorNet<B>, B>,
{
    type Backend = B::InnerBackend;

    fn train_step(&mut self, batch: &Batch) -> anyhow::Result<f64> {
        if batch.is_empty() {
            return Ok(0.0);
        }
        let optim = self
            .optim
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("optimizer missing"))?;

        let users = index_tensor::<B>(&batch.users, &self.device);
        let pos = index_tensor::<B>(&batch.pos_items, &self.device);
        let neg = index_tensor::<B>(&batch.neg_items, &self.device);

        let (loss, _) = self.net.bpr_loss(users, pos, neg, self.config.l_w);
        let loss_val: f64 = loss.clone().into_scalar().elem();

        let grads = GradientsParams::from_grads(loss.backward(), &self.net);
        self.net = optim.step(self.config.lr, self.net.clone(), grads);

        Ok(loss_val)
    }

    fn propagate_embeddings(&self, _evaluate: bool) -> Embeddings<Self::Backend> {
        // No dropout and no propagation: both modes read the detached tables.
        let net = self.net.valid();
        let users = net.users();
        let items = net.items();
        let intents = self.config.intents;
        if intents <= 1 {
            return Embeddings::Flat { users, items };
        }
        let width = self.config.factors / intents;
        let [num_users, _] = users.dims();
        let [num_items, _] = items.dims();
        Embeddings::Intents {
            users: users.reshape([num_users, intents, width]),
            items: items.reshape([num_items, intents, width]),
        }
    }

    fn save(&self, dir: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dir)?;
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let optim = self
            .optim
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("optimizer missing"))?;

        self.net
            .clone()
            .save_file(dir.join("model"), &recorder)
            .map_err(|e| anyhow::anyhow!("Failed to save model to {}: {e}", dir.display()))?;
        recorder
            .record(optim.to_record(), dir.join("optimizer"))
            .map_err(|e| anyhow::anyhow!("Failed to save optimizer to {}: {e}", dir.display()))?;
        Ok(())
    }

    fn load(&mut self, dir: &Path) -> anyhow::Result<()> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();

        let net = self
            .net
            .clone()
            .load_file(dir.join("model"), &recorder, &self.device)
            .map_err(|e| anyhow::anyhow!("Failed to load model from {}: {e}", dir.display()))?;
        let optim_record: O::Record = recorder
            .load(dir.join("optimizer"), &self.device)
            .map_err(|e| anyhow::anyhow!("Failed to load optimizer from {}: {e}", dir.display()))?;

        let optim = self
            .optim
            .take()
            .ok_or_else(|| anyhow::anyhow!("optimizer missing"))?;
        self.optim = Some(optim.load_record(optim_record));
        self.net = net;
        Ok(())
    }
}
