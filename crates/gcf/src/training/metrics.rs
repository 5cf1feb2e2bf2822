//! Loss accumulation and evaluation history.

use crate::error::GcfError;
use crate::recommend::EvalResult;

/// Running sum of per-step losses within one epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningLoss {
    sum: f64,
    steps: usize,
}

impl RunningLoss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, loss: f64) {
        self.sum += loss;
        self.steps += 1;
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// `sum / steps`, or 0 before the first step.
    pub fn average(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.sum / self.steps as f64
        }
    }
}

/// Epoch losses and evaluation results, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct ResultHistory {
    losses: Vec<f64>,
    results: Vec<EvalResult>,
}

impl ResultHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, loss: f64, result: EvalResult) {
        self.losses.push(loss);
        self.results.push(result);
    }

    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    pub fn results(&self) -> &[EvalResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Index of the first result with the highest tracked metric.
    pub fn best_index(&self, k: usize, metric: &str) -> Result<Option<usize>, GcfError> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, result) in self.results.iter().enumerate() {
            let value = tracked(result, k, metric)?;
            if best.map_or(true, |(_, b)| value > b) {
                best = Some((idx, value));
            }
        }
        Ok(best.map(|(idx, _)| idx))
    }

    /// Whether the most recent result beats every earlier one.
    pub fn latest_is_best(&self, k: usize, metric: &str) -> Result<bool, GcfError> {
        if self.results.is_empty() {
            return Ok(false);
        }
        Ok(self.best_index(k, metric)? == Some(self.results.len() - 1))
    }
}

fn tracked(result: &EvalResult, k: usize, metric: &str) -> Result<f64, GcfError> {
    result
        .validation_metric(k, metric)
        .ok_or_else(|| GcfError::MissingMetric {
            k,
            metric: metric.to_string(),
        })
}
