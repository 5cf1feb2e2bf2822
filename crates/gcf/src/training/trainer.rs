//! Epoch loop with periodic evaluation and best-model checkpointing.
//!
//! Ties together the sampler, a [`GraphModel`], the evaluator bridge and the
//! checkpoint manager. One `Trainer` drives one model for one run.

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;

use interactions::{InteractionData, RecommendationWriter, Recommendations};

use crate::config::TrainingConfig;
use crate::error::GcfError;
use crate::model::GraphModel;
use crate::plugins::ModelDescriptor;
use crate::recommend::{self, Evaluator};
use crate::training::checkpoint::{CheckpointManager, CheckpointMeta};
use crate::training::metrics::{ResultHistory, RunningLoss};
use crate::training::sampler::Sampler;

/// How a call to [`Trainer::train`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainOutcome {
    /// All epochs ran.
    Trained { epochs: usize },
    /// Training was skipped; the checkpoint was restored and evaluated once.
    Restored,
}

/// Drives one [`GraphModel`] through a run: sampled epochs, periodic
/// evaluation, best-model tracking and checkpointing, or a single restore
/// plus evaluation when `restore` is set.
pub struct Trainer<M: GraphModel, E: Evaluator> {
    config: TrainingConfig,
    data: InteractionData,
    sampler: Sampler,
    model: Option<M>,
    evaluator: E,
    checkpoints: CheckpointManager,
    descriptor: ModelDescriptor,
    batch_size: usize,
    history: ResultHistory,
    best_iteration: Option<usize>,
    best_metric_value: Option<f64>,
    rng: StdRng,
}

impl<M: GraphModel, E: Evaluator> Trainer<M, E> {
    pub fn new(
        config: TrainingConfig,
        data: InteractionData,
        model: M,
        evaluator: E,
        descriptor: ModelDescriptor,
    ) -> Result<Self, GcfError> {
        config.validate()?;
        if config.validation_k > evaluator.needed_recommendations() {
            return Err(GcfError::InvalidConfig(format!(
                "validation_k ({}) exceeds the evaluator's list length ({})",
                config.validation_k,
                evaluator.needed_recommendations()
            )));
        }
        let batch_size = config.resolved_batch_size(data.num_users());
        let sampler = Sampler::new(&data);
        let checkpoints = CheckpointManager::new(config.checkpoint_dir.clone());
        let rng = StdRng::seed_from_u64(config.seed);

        let trainer = Self {
            config,
            data,
            sampler,
            model: Some(model),
            evaluator,
            checkpoints,
            descriptor,
            batch_size,
            history: ResultHistory::new(),
            best_iteration: None,
            best_metric_value: None,
            rng,
        };
        tracing::info!(
            name = %trainer.name(),
            users = trainer.data.num_users(),
            items = trainer.data.num_items(),
            transactions = trainer.data.transactions(),
            batch_size,
            "Trainer ready"
        );
        Ok(trainer)
    }

    /// Run name, e.g. `DGCF_seed=42_e=10_bs=512_lr=0$0005_...`.
    pub fn name(&self) -> String {
        self.descriptor
            .name(self.config.seed, self.config.epochs, self.batch_size)
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn data(&self) -> &InteractionData {
        &self.data
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> Option<&mut M> {
        self.model.as_mut()
    }

    /// Remove the model from the trainer. Later saves warn and skip.
    pub fn take_model(&mut self) -> Option<M> {
        self.model.take()
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn history(&self) -> &ResultHistory {
        &self.history
    }

    /// 1-based epoch of the best evaluation so far.
    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    pub fn best_metric_value(&self) -> Option<f64> {
        self.best_metric_value
    }

    /// Train for `epochs` epochs, or restore and evaluate when `restore` is set.
    pub fn train(&mut self) -> anyhow::Result<TrainOutcome> {
        if self.config.restore {
            self.restore_weights()?;
            return Ok(TrainOutcome::Restored);
        }

        let epochs = self.config.epochs;
        let num_batches = self.sampler.num_batches(self.batch_size);
        for it in 0..epochs {
            let model = self.model.as_mut().ok_or(GcfError::MissingModel)?;
            let mut loss = RunningLoss::new();

            let pb = if self.config.verbose {
                let pb = ProgressBar::new(num_batches as u64);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
                pb
            } else {
                ProgressBar::hidden()
            };

            for batch in self.sampler.step(self.batch_size, &mut self.rng) {
                let step_loss = model.train_step(&batch)?;
                loss.update(step_loss);
                tracing::debug!(epoch = it + 1, size = batch.len(), loss = step_loss, "Batch done");
                pb.set_message(format!("loss {:.5}", loss.average()));
                pb.inc(1);
            }
            pb.finish_and_clear();

            tracing::info!(
                epoch = it + 1,
                epochs,
                steps = loss.steps(),
                loss = format!("{:.5}", loss.average()),
                "Epoch finished"
            );
            self.evaluate(Some(it), loss.average())?;
        }

        tracing::info!(
            epochs,
            best_iteration = ?self.best_iteration,
            best_metric_value = ?self.best_metric_value,
            "Training complete"
        );
        Ok(TrainOutcome::Trained { epochs })
    }

    /// Evaluate at 0-based epoch `it`, or a final evaluation when `it` is
    /// `None`. Epochs off the validation cadence are skipped; returns whether
    /// an evaluation ran.
    pub fn evaluate(&mut self, it: Option<usize>, loss: f64) -> anyhow::Result<bool> {
        if let Some(it) = it {
            if (it + 1) % self.config.validation_rate != 0 {
                return Ok(false);
            }
        }

        let k = self.evaluator.needed_recommendations();
        let recommendations = self.get_recommendations(k)?;
        let result = self.evaluator.eval(&recommendations)?;
        self.history.push(loss, result);

        match it {
            Some(it) => tracing::info!(
                epoch = it + 1,
                epochs = self.config.epochs,
                loss = format!("{loss:.5}"),
                "Evaluated"
            ),
            None => tracing::info!("Finished"),
        }

        if self.config.save_recs {
            self.store_recommendations(&recommendations, it)?;
        }

        let (val_k, metric) = (self.config.validation_k, self.config.validation_metric.as_str());
        if self.history.latest_is_best(val_k, metric)? {
            if let Some(it) = it {
                self.best_iteration = Some(it + 1);
            }
            let value = self
                .history
                .results()
                .last()
                .and_then(|r| r.validation_metric(val_k, metric))
                .ok_or_else(|| GcfError::MissingMetric {
                    k: val_k,
                    metric: metric.to_string(),
                })?;
            self.best_metric_value = Some(value);
            tracing::info!(
                best_iteration = ?self.best_iteration,
                metric = %format!("{metric}@{val_k}"),
                value,
                "New best model"
            );

            if self.config.save_weights {
                self.save_weights()?;
            }
        }
        Ok(true)
    }

    /// Masked top-`k` lists for every user from freshly propagated embeddings.
    pub fn get_recommendations(&self, k: usize) -> anyhow::Result<Recommendations> {
        let model = self.model.as_ref().ok_or(GcfError::MissingModel)?;
        recommend::get_recommendations(model, &self.data, self.batch_size, k)
    }

    /// Checkpoint the current model as the best one. Returns `false` (after a
    /// warning) when the trainer holds no model.
    pub fn save_weights(&self) -> anyhow::Result<bool> {
        let meta = CheckpointMeta {
            best_iteration: self.best_iteration,
            metric: format!(
                "{}@{}",
                self.config.validation_metric, self.config.validation_k
            ),
            value: self.best_metric_value.unwrap_or(f64::NAN),
        };
        self.checkpoints.save(self.model.as_ref(), &meta)
    }

    /// Load the checkpoint into the model and run one final evaluation.
    /// Any failure along the way, evaluation included, is a
    /// [`GcfError::Restore`].
    pub fn restore_weights(&mut self) -> Result<(), GcfError> {
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| GcfError::Restore(GcfError::MissingModel.into()))?;
        let meta = self.checkpoints.restore(model)?;
        self.best_iteration = meta.best_iteration;
        self.evaluate(None, 0.0).map_err(GcfError::Restore)?;
        Ok(())
    }

    fn store_recommendations(
        &self,
        recommendations: &Recommendations,
        it: Option<usize>,
    ) -> anyhow::Result<()> {
        let file_name = match it {
            Some(it) => format!("{}_it={}.tsv", self.name(), it + 1),
            None => format!("{}.tsv", self.name()),
        };
        let mut writer = RecommendationWriter::new(self.config.recs_dir.join(file_name));
        writer.record_all(&recommendations.test);
        let path = writer.finish()?;
        tracing::info!(path = %path.display(), "Writing recommendations");
        Ok(())
    }
}
