//! Model seam: the [`GraphModel`] trait, propagated embeddings, the tensor
//! bridge, and the burn factorization backbone.

pub mod bridge;
pub mod factor;

use std::path::Path;

use burn::prelude::*;

use crate::training::sampler::Batch;

/// User and item embeddings produced by one propagation pass.
#[derive(Debug, Clone)]
pub enum Embeddings<B: Backend> {
    /// `[num_users, d]` and `[num_items, d]`.
    Flat {
        users: Tensor<B, 2>,
        items: Tensor<B, 2>,
    },
    /// `[num_users, intents, d]` and `[num_items, intents, d]`, one
    /// sub-vector per disentangled intent.
    Intents {
        users: Tensor<B, 3>,
        items: Tensor<B, 3>,
    },
}

impl<B: Backend> Embeddings<B> {
    /// Collapse intent sub-vectors into one vector per node:
    /// `[n, intents, d]` → `[n, intents * d]`. Flat embeddings pass through.
    pub fn flatten(self) -> (Tensor<B, 2>, Tensor<B, 2>) {
        match self {
            Self::Flat { users, items } => (users, items),
            Self::Intents { users, items } => (flatten_intents(users), flatten_intents(items)),
        }
    }

    pub fn num_users(&self) -> usize {
        match self {
            Self::Flat { users, .. } => users.dims()[0],
            Self::Intents { users, .. } => users.dims()[0],
        }
    }
}

fn flatten_intents<B: Backend>(t: Tensor<B, 3>) -> Tensor<B, 2> {
    let [n, intents, d] = t.dims();
    t.reshape([n, intents * d])
}

/// A trainable graph recommender.
///
/// Implementations own their parameters and optimizer. The trainer drives
/// them through SGD steps, asks for embeddings at evaluation time, and
/// persists their state through [`save`](GraphModel::save) /
/// [`load`](GraphModel::load).
pub trait GraphModel {
    /// Backend used for inference-time tensors.
    type Backend: Backend;

    /// Run one optimization step on a batch and return its scalar loss.
    fn train_step(&mut self, batch: &Batch) -> anyhow::Result<f64>;

    /// Recompute user and item embeddings. `evaluate` selects inference mode
    /// (no dropout, no gradient tracking).
    fn propagate_embeddings(&self, evaluate: bool) -> Embeddings<Self::Backend>;

    /// Score every item for a slice of users: `[b, d] × [n, d]ᵀ → [b, n]`.
    fn predict(
        &self,
        users: Tensor<Self::Backend, 2>,
        items: Tensor<Self::Backend, 2>,
    ) -> Tensor<Self::Backend, 2> {
        users.matmul(items.transpose())
    }

    /// Write parameters and optimizer state into `dir`.
    fn save(&self, dir: &Path) -> anyhow::Result<()>;

    /// Replace parameters and optimizer state with the contents of `dir`.
    fn load(&mut self, dir: &Path) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_flatten_intents_keeps_intent_order() {
        let device = Default::default();
        // 1 user, 2 intents, 2 dims
        let users = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![1.0_f32, 2.0, 3.0, 4.0], [1, 2, 2]),
            &device,
        );
        let items = Tensor::<TestBackend, 3>::zeros([3, 2, 2], &device);
        let embeddings = Embeddings::Intents { users, items };
        assert_eq!(embeddings.num_users(), 1);

        let (u, i) = embeddings.flatten();
        assert_eq!(u.dims(), [1, 4]);
        assert_eq!(i.dims(), [3, 4]);
        let values: Vec<f32> = u.into_data().to_vec().unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_flat_passes_through() {
        let device = Default::default();
        let users = Tensor::<TestBackend, 2>::ones([2, 3], &device);
        let items = Tensor::<TestBackend, 2>::ones([5, 3], &device);
        let (u, i) = Embeddings::Flat { users, items }.flatten();
        assert_eq!(u.dims(), [2, 3]);
        assert_eq!(i.dims(), [5, 3]);
    }
}
