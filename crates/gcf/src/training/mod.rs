//! Training pipeline: BPR triple sampling, loss bookkeeping, checkpoints,
//! and the epoch loop.

pub mod checkpoint;
pub mod metrics;
pub mod sampler;
pub mod trainer;
