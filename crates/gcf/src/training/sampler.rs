//! BPR triple sampler.
//!
//! Every epoch shuffles the training transactions and walks them in
//! fixed-size chunks. Each transaction `(u, i)` yields one triple `(u, i, j)`
//! where `j` is drawn uniformly from the items `u` has not interacted with in
//! training. A transaction therefore appears at most once per epoch.

use rand::seq::SliceRandom;
use rand::Rng;

use interactions::InteractionData;

/// One optimization step worth of triples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Position of each triple's positive pair in the row-major transaction list.
    pub transactions: Vec<usize>,
    pub users: Vec<usize>,
    pub pos_items: Vec<usize>,
    pub neg_items: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn with_capacity(n: usize) -> Self {
        Self {
            transactions: Vec::with_capacity(n),
            users: Vec::with_capacity(n),
            pos_items: Vec::with_capacity(n),
            neg_items: Vec::with_capacity(n),
        }
    }
}

/// Draws BPR triples from the training split.
#[derive(Debug, Clone)]
pub struct Sampler {
    num_items: usize,
    /// Row-major `(user, item)` training pairs.
    pairs: Vec<(usize, usize)>,
    /// Sorted training items per user.
    train_items: Vec<Vec<usize>>,
}

impl Sampler {
    pub fn new(data: &InteractionData) -> Self {
        let pairs: Vec<(usize, usize)> = data.train_pairs().collect();
        let train_items = (0..data.num_users())
            .map(|u| data.train_items(u).to_vec())
            .collect();
        Self {
            num_items: data.num_items(),
            pairs,
            train_items,
        }
    }

    /// Number of training transactions.
    pub fn transactions(&self) -> usize {
        self.pairs.len()
    }

    /// Upper bound on the batches one epoch produces at `batch_size`.
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.pairs.len().div_ceil(batch_size.max(1))
    }

    /// Start a new epoch: shuffle the transactions and return an iterator
    /// over batches of at most `batch_size` triples.
    pub fn step<'a, R: Rng>(&'a self, batch_size: usize, rng: &'a mut R) -> EpochBatches<'a, R> {
        let mut order: Vec<usize> = (0..self.pairs.len()).collect();
        order.shuffle(&mut *rng);
        EpochBatches {
            sampler: self,
            order,
            cursor: 0,
            batch_size: batch_size.max(1),
            rng,
        }
    }

    /// Uniform negative for `user`, or `None` when the user has seen every item.
    fn sample_negative<R: Rng>(&self, user: usize, rng: &mut R) -> Option<usize> {
        let seen = &self.train_items[user];
        if seen.len() >= self.num_items {
            return None;
        }
        loop {
            let candidate = rng.gen_range(0..self.num_items);
            if seen.binary_search(&candidate).is_err() {
                return Some(candidate);
            }
        }
    }
}

/// Batches of one epoch, in shuffled transaction order.
pub struct EpochBatches<'a, R> {
    sampler: &'a Sampler,
    order: Vec<usize>,
    cursor: usize,
    batch_size: usize,
    rng: &'a mut R,
}

impl<R: Rng> Iterator for EpochBatches<'_, R> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        // chunks whose users have all seen every item are dropped whole
        while self.cursor < self.order.len() {
            let end = (self.cursor + self.batch_size).min(self.order.len());
            let mut batch = Batch::with_capacity(end - self.cursor);

            for &t in &self.order[self.cursor..end] {
                let (user, item) = self.sampler.pairs[t];
                let Some(neg) = self.sampler.sample_negative(user, &mut *self.rng) else {
                    tracing::debug!(user, "User interacted with every item, no negative available");
                    continue;
                };
                batch.transactions.push(t);
                batch.users.push(user);
                batch.pos_items.push(item);
                batch.neg_items.push(neg);
            }
            self.cursor = end;
            if !batch.is_empty() {
                return Some(batch);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.cursor).div_ceil(self.batch_size);
        (0, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn data(pairs: &[(&str, &str)]) -> InteractionData {
        let train: Vec<(String, String)> = pairs
            .iter()
            .map(|(u, i)| (u.to_string(), i.to_string()))
            .collect();
        InteractionData::from_splits(&train, None, &[]).unwrap()
    }

    fn sample_data() -> InteractionData {
        data(&[
            ("u0", "i0"),
            ("u0", "i1"),
            ("u1", "i1"),
            ("u1", "i2"),
            ("u2", "i3"),
            ("u2", "i0"),
            ("u3", "i4"),
        ])
    }

    #[test]
    fn test_each_transaction_once_per_epoch() {
        let data = sample_data();
        let sampler = Sampler::new(&data);
        let mut rng = StdRng::seed_from_u64(7);

        for batch_size in [1, 2, 3, 7] {
            let mut seen = HashSet::new();
            let mut count = 0;
            for batch in sampler.step(batch_size, &mut rng) {
                assert!(batch.len() <= batch_size);
                for &t in &batch.transactions {
                    assert!(seen.insert(t), "transaction {t} visited twice");
                }
                count += batch.len();
            }
            assert_eq!(count, sampler.transactions());
        }
    }

    #[test]
    fn test_batch_count_and_remainder() {
        let sampler = Sampler::new(&sample_data());
        let mut rng = StdRng::seed_from_u64(1);
        let sizes: Vec<usize> = sampler.step(3, &mut rng).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(sampler.num_batches(3), 3);
    }

    #[test]
    fn test_triples_are_consistent() {
        let data = sample_data();
        let sampler = Sampler::new(&data);
        let mut rng = StdRng::seed_from_u64(3);
        let pairs: Vec<(usize, usize)> = data.train_pairs().collect();

        for batch in sampler.step(4, &mut rng) {
            for k in 0..batch.len() {
                let (u, i) = pairs[batch.transactions[k]];
                assert_eq!(batch.users[k], u);
                assert_eq!(batch.pos_items[k], i);
                assert!(!data.is_train_item(u, batch.neg_items[k]));
            }
        }
    }

    #[test]
    fn test_user_with_all_items_is_skipped() {
        // u0 has both items, u1 has one
        let data = data(&[("u0", "a"), ("u0", "b"), ("u1", "a")]);
        let sampler = Sampler::new(&data);
        let mut rng = StdRng::seed_from_u64(0);
        let batches: Vec<Batch> = sampler.step(10, &mut rng).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].users, vec![1]);
        assert_eq!(batches[0].neg_items, vec![1]);
    }

    #[test]
    fn test_no_empty_batches_when_chunks_are_skipped() {
        let data = data(&[("u0", "a"), ("u0", "b"), ("u1", "a")]);
        let sampler = Sampler::new(&data);
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let batches: Vec<Batch> = sampler.step(1, &mut rng).collect();
            assert_eq!(batches.len(), 1);
            assert_eq!(batches[0].users, vec![1]);
        }
    }

    #[test]
    fn test_same_seed_same_epoch() {
        let sampler = Sampler::new(&sample_data());
        let a: Vec<Batch> = sampler.step(2, &mut StdRng::seed_from_u64(9)).collect();
        let b: Vec<Batch> = sampler.step(2, &mut StdRng::seed_from_u64(9)).collect();
        assert_eq!(a, b);
    }
}
