//! Evaluator bridge: scores → masked top-k lists → external evaluator.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use interactions::{InteractionData, RankedItems, Recommendations, Split};

use crate::model::bridge::tensor_to_rows;
use crate::model::GraphModel;

/// Metric values for one cutoff, keyed by metric name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub val_results: BTreeMap<String, f64>,
    pub test_results: BTreeMap<String, f64>,
}

/// One evaluation, keyed by cutoff `k`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub cutoffs: BTreeMap<usize, SplitMetrics>,
}

impl EvalResult {
    /// Value of `metric` at cutoff `k`, read from validation results, or
    /// from test results when the evaluation has no validation metrics.
    pub fn validation_metric(&self, k: usize, metric: &str) -> Option<f64> {
        let split = self.cutoffs.get(&k)?;
        if split.val_results.is_empty() {
            split.test_results.get(metric).copied()
        } else {
            split.val_results.get(metric).copied()
        }
    }
}

/// External metric evaluator.
pub trait Evaluator {
    /// How many items each recommendation list must hold.
    fn needed_recommendations(&self) -> usize;

    /// Score a full set of recommendation lists.
    fn eval(&mut self, recommendations: &Recommendations) -> anyhow::Result<EvalResult>;
}

/// Highest-scoring `k` candidates of one score row.
///
/// Ordered by descending score, ties by ascending item id. NaN scores and
/// items rejected by `is_candidate` never appear. Returns exactly
/// `min(k, candidates)` entries.
pub fn top_k(scores: &[f32], k: usize, is_candidate: impl Fn(usize) -> bool) -> Vec<(usize, f32)> {
    if k == 0 {
        return Vec::new();
    }
    let mut candidates: Vec<(OrderedFloat<f32>, usize)> = scores
        .iter()
        .enumerate()
        .filter(|&(item, score)| !score.is_nan() && is_candidate(item))
        .map(|(item, &score)| (OrderedFloat(score), item))
        .collect();

    let by_rank = |a: &(OrderedFloat<f32>, usize), b: &(OrderedFloat<f32>, usize)| {
        b.0.cmp(&a.0).then(a.1.cmp(&b.1))
    };
    if candidates.len() > k {
        candidates.select_nth_unstable_by(k, by_rank);
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(by_rank);
    candidates
        .into_iter()
        .map(|(score, item)| (item, score.into_inner()))
        .collect()
}

/// Build validation (when the dataset has one) and test recommendation
/// lists for every user.
///
/// Embeddings are recomputed once in inference mode; users are scored in
/// contiguous slices of `batch_size`. Validation lists exclude training
/// items; test lists exclude training and validation items.
pub fn get_recommendations<M: GraphModel>(
    model: &M,
    data: &InteractionData,
    batch_size: usize,
    k: usize,
) -> anyhow::Result<Recommendations> {
    let (users, items) = model.propagate_embeddings(true).flatten();
    let [num_users, dim] = users.dims();
    let batch_size = batch_size.max(1);
    let mut recommendations = Recommendations::new();

    let mut start = 0;
    while start < num_users {
        let end = (start + batch_size).min(num_users);
        let scores = model.predict(users.clone().slice([start..end, 0..dim]), items.clone());
        let (values, cols) = tensor_to_rows(scores)?;
        if cols == 0 {
            anyhow::bail!("Score matrix has no item columns");
        }

        for (offset, row) in values.chunks(cols).enumerate() {
            let user = start + offset;
            let external = data
                .private_user(user)
                .ok_or_else(|| anyhow::anyhow!("No external id for user {user}"))?
                .to_string();

            if data.has_validation() {
                let ranked = top_k(row, k, |i| !data.is_train_item(user, i));
                recommendations
                    .validation
                    .insert(external.clone(), to_external(data, ranked)?);
            }

            let held_out = data.split_items(user, Split::Validation);
            let ranked = top_k(row, k, |i| {
                !data.is_train_item(user, i) && held_out.binary_search(&i).is_err()
            });
            recommendations.test.insert(external, to_external(data, ranked)?);
        }
        start = end;
    }

    tracing::debug!(users = num_users, k, "Built recommendation lists");
    Ok(recommendations)
}

fn to_external(data: &InteractionData, ranked: Vec<(usize, f32)>) -> anyhow::Result<RankedItems> {
    ranked
        .into_iter()
        .map(|(item, score)| {
            data.private_item(item)
                .map(|id| (id.to_string(), score))
                .ok_or_else(|| anyhow::anyhow!("No external id for item {item}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockModel;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_top_k_orders_and_breaks_ties_by_id() {
        let scores = [0.5, 0.9, 0.5, 0.1, 0.9];
        let ranked = top_k(&scores, 4, |_| true);
        assert_eq!(ranked, vec![(1, 0.9), (4, 0.9), (0, 0.5), (2, 0.5)]);
    }

    #[test]
    fn test_top_k_respects_candidates_and_nan() {
        let scores = [3.0, f32::NAN, 2.0, 1.0];
        let ranked = top_k(&scores, 10, |i| i != 0);
        assert_eq!(ranked, vec![(2, 2.0), (3, 1.0)]);
        assert!(top_k(&scores, 0, |_| true).is_empty());
    }

    #[test]
    fn test_top_k_size_is_min_of_k_and_candidates() {
        let scores: Vec<f32> = (0..50).map(|i| ((i * 37) % 50) as f32).collect();
        for k in [1, 5, 49, 50, 80] {
            let ranked = top_k(&scores, k, |i| i % 2 == 0);
            assert_eq!(ranked.len(), k.min(25));
            assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
        }
    }

    #[test]
    fn test_validation_metric_falls_back_to_test() {
        let mut result = EvalResult::default();
        let mut split = SplitMetrics::default();
        split.test_results.insert("nDCG".to_string(), 0.3);
        result.cutoffs.insert(10, split.clone());
        assert_eq!(result.validation_metric(10, "nDCG"), Some(0.3));
        assert_eq!(result.validation_metric(20, "nDCG"), None);

        split.val_results.insert("nDCG".to_string(), 0.7);
        result.cutoffs.insert(10, split);
        assert_eq!(result.validation_metric(10, "nDCG"), Some(0.7));
        assert_eq!(result.validation_metric(10, "Recall"), None);
    }

    #[test]
    fn test_recommendations_mask_seen_items() {
        let pairs = |p: &[(&str, &str)]| -> Vec<(String, String)> {
            p.iter().map(|(u, i)| (u.to_string(), i.to_string())).collect()
        };
        let train = pairs(&[("u0", "a"), ("u1", "b"), ("u0", "c"), ("u1", "d")]);
        let validation = pairs(&[("u0", "b")]);
        let test = pairs(&[("u0", "d")]);
        let data = InteractionData::from_splits(&train, Some(validation.as_slice()), &test).unwrap();

        // items a, b, c, d -> ids 0..4; one-hot item embeddings, so each
        // user row is its score row
        let model = MockModel::<TestBackend>::from_rows(
            &[vec![1.0, 2.0, 3.0, 4.0], vec![4.0, 3.0, 2.0, 1.0]],
            &[
                vec![1.0, 0.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0, 0.0],
                vec![0.0, 0.0, 1.0, 0.0],
                vec![0.0, 0.0, 0.0, 1.0],
            ],
        );

        let recs = get_recommendations(&model, &data, 1, 10).unwrap();
        let ids = |list: &RankedItems| list.iter().map(|(i, _)| i.clone()).collect::<Vec<_>>();

        // u0 trained on a, c; validated on b
        assert_eq!(ids(&recs.validation["u0"]), vec!["d", "b"]);
        assert_eq!(ids(&recs.test["u0"]), vec!["d"]);
        // u1 trained on b, d
        assert_eq!(ids(&recs.validation["u1"]), vec!["a", "c"]);
        assert_eq!(ids(&recs.test["u1"]), vec!["a", "c"]);
        assert_eq!(recs.test["u0"][0].1, 4.0);
    }

    #[test]
    fn test_no_validation_lists_without_validation_split() {
        let train = vec![("u0".to_string(), "a".to_string()), ("u0".to_string(), "b".to_string())];
        let data = InteractionData::from_splits(&train, None, &[]).unwrap();
        let model = MockModel::<TestBackend>::from_rows(&[vec![1.0]], &[vec![1.0], vec![2.0]]);
        let recs = get_recommendations(&model, &data, 0, 5).unwrap();
        assert!(recs.validation.is_empty());
        assert_eq!(recs.test["u0"], Vec::<(String, f32)>::new());
    }
}
