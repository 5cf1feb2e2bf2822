//! Signed edge-feature dataset for EGCFv2.
//!
//! The input is a TSV file with a `user`, `item`, `feature_path` header.
//! `feature_path` is a comma-separated list of signed feature indices
//! (optionally wrapped in brackets). Each record labels one training
//! transaction and becomes that transaction's sparse row; each
//! listed feature becomes one entry whose value is the sign of the index and
//! whose column is the absolute index remapped to a dense id in
//! first-appearance order.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::types::{InteractionData, InteractionsError};

#[derive(Debug, Deserialize)]
struct EdgeFeatureRow {
    user: String,
    item: String,
    feature_path: String,
}

/// Sparse `(transactions × features)` matrix in COO form.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeFeatures {
    /// Transaction index (row-major training position) of each entry.
    pub rows: Vec<usize>,
    /// Dense feature id of each entry.
    pub cols: Vec<usize>,
    /// Sign of the original feature index: -1, 0, or +1.
    pub values: Vec<i64>,
    /// Number of rows (training transactions).
    pub num_rows: usize,
    /// Original absolute feature index for each dense feature id.
    pub feature_ids: Vec<i64>,
}

impl EdgeFeatures {
    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Number of distinct features (columns).
    pub fn num_features(&self) -> usize {
        self.feature_ids.len()
    }

    /// `(rows, cols)` of the sparse matrix.
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows, self.num_features())
    }
}

/// Load edge features and remap them onto `data`'s internal id space.
///
/// Every record must name a distinct training transaction; its entries land
/// on that transaction's row whatever the record order in the file.
pub fn load_edge_features(
    path: &Path,
    data: &InteractionData,
) -> Result<EdgeFeatures, InteractionsError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let transaction_of: HashMap<(usize, usize), usize> = data
        .train_pairs()
        .enumerate()
        .map(|(t, pair)| (pair, t))
        .collect();
    let mut labelled = HashSet::new();
    let mut rows = Vec::new();
    let mut signed = Vec::new();
    let mut records = 0usize;

    for (record, row) in reader.deserialize::<EdgeFeatureRow>().enumerate() {
        let row = row?;
        let user = data
            .public_user(&row.user)
            .ok_or_else(|| InteractionsError::UnknownUser(row.user.clone()))?;
        let item = data
            .public_item(&row.item)
            .ok_or_else(|| InteractionsError::UnknownItem(row.item.clone()))?;

        let Some(&transaction) = transaction_of.get(&(user, item)) else {
            return Err(InteractionsError::NotATransaction {
                record,
                user: row.user,
                item: row.item,
            });
        };
        if !labelled.insert(transaction) {
            return Err(InteractionsError::DuplicateFeatureRecord {
                record,
                user: row.user,
                item: row.item,
            });
        }

        for feature in parse_feature_path(&row.feature_path, record)? {
            rows.push(transaction);
            signed.push(feature);
        }
        records += 1;
    }

    let (cols, values, feature_ids) = remap_signed_features(&signed);

    tracing::info!(
        records,
        entries = values.len(),
        features = feature_ids.len(),
        path = %path.display(),
        "Loaded edge features"
    );

    Ok(EdgeFeatures {
        rows,
        cols,
        values,
        num_rows: data.transactions(),
        feature_ids,
    })
}

/// Split signed features into dense column ids, signs, and the id table.
fn remap_signed_features(signed: &[i64]) -> (Vec<usize>, Vec<i64>, Vec<i64>) {
    let mut dense: HashMap<i64, usize> = HashMap::new();
    let mut feature_ids = Vec::new();
    let mut cols = Vec::with_capacity(signed.len());
    let mut values = Vec::with_capacity(signed.len());

    for &feature in signed {
        let magnitude = feature.abs();
        let col = *dense.entry(magnitude).or_insert_with(|| {
            feature_ids.push(magnitude);
            feature_ids.len() - 1
        });
        cols.push(col);
        values.push(feature.signum());
    }

    (cols, values, feature_ids)
}

fn parse_feature_path(raw: &str, record: usize) -> Result<Vec<i64>, InteractionsError> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| InteractionsError::MalformedFeature {
                record,
                value: s.to_string(),
            })
        })
        .collect()
}
