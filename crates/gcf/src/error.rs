/// Errors surfaced by the training harness.
#[derive(Debug, thiserror::Error)]
pub enum GcfError {
    /// Any failure while restoring a checkpoint: missing files, incompatible
    /// records, unreadable metadata.
    #[error("Error in model restoring operation! {0}")]
    Restore(#[source] anyhow::Error),

    /// The trainer no longer holds a model (it was taken out).
    #[error("No model instance available")]
    MissingModel,

    /// A configuration value that cannot drive a run.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The evaluator result lacks the tracked validation metric.
    #[error("Evaluation result has no {metric} at cutoff {k}")]
    MissingMetric { k: usize, metric: String },

    #[error(transparent)]
    Interactions(#[from] interactions::InteractionsError),
}
