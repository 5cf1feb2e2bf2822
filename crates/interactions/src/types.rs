//! Interaction splits, id maps, and recommendation results.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Errors raised while building interaction data or reading side files.
#[derive(Debug, thiserror::Error)]
pub enum InteractionsError {
    /// The training split has no interactions, so no id space can be built.
    #[error("training split is empty")]
    EmptyTraining,

    /// A user identifier that does not appear in the training split.
    #[error("unknown user id: {0}")]
    UnknownUser(String),

    /// An item identifier that does not appear in the training split.
    #[error("unknown item id: {0}")]
    UnknownItem(String),

    /// A feature path entry that is not a signed integer.
    #[error("malformed feature path {value:?} at record {record}")]
    MalformedFeature { record: usize, value: String },

    /// An edge-feature record whose pair is not a training transaction.
    #[error("edge feature record {record} ({user}, {item}) is not a training transaction")]
    NotATransaction {
        record: usize,
        user: String,
        item: String,
    },

    /// Two edge-feature records for the same training transaction.
    #[error("edge feature record {record} repeats transaction ({user}, {item})")]
    DuplicateFeatureRecord {
        record: usize,
        user: String,
        item: String,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Which held-out split a mask or recommendation list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Validation,
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Ordered `(external item id, score)` pairs for one user, best first.
pub type RankedItems = Vec<(String, f32)>;

/// Top-k recommendations keyed by external user id, one map per split.
///
/// `validation` stays empty when the dataset has no validation split.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recommendations {
    pub validation: BTreeMap<String, RankedItems>,
    pub test: BTreeMap<String, RankedItems>,
}

impl Recommendations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recommendations for a single split.
    pub fn split(&self, split: Split) -> &BTreeMap<String, RankedItems> {
        match split {
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }
}

/// Train/validation/test interactions over a dense internal id space.
///
/// Internal ids are assigned from the training split in first-appearance
/// order (`0..num_users`, `0..num_items`). Held-out pairs whose user or item
/// never occurs in training are dropped, since the model has no embedding
/// for them.
#[derive(Debug, Clone)]
pub struct InteractionData {
    public_users: HashMap<String, usize>,
    private_users: Vec<String>,
    public_items: HashMap<String, usize>,
    private_items: Vec<String>,
    /// Sorted, deduplicated training items per internal user.
    train: Vec<Vec<usize>>,
    validation: Option<Vec<Vec<usize>>>,
    test: Vec<Vec<usize>>,
    transactions: usize,
}

impl InteractionData {
    /// Build interaction data from `(user, item)` pairs of each split.
    pub fn from_splits<S: AsRef<str>>(
        train: &[(S, S)],
        validation: Option<&[(S, S)]>,
        test: &[(S, S)],
    ) -> Result<Self, InteractionsError> {
        if train.is_empty() {
            return Err(InteractionsError::EmptyTraining);
        }

        let mut public_users = HashMap::new();
        let mut private_users = Vec::new();
        let mut public_items = HashMap::new();
        let mut private_items = Vec::new();
        let mut pairs = Vec::with_capacity(train.len());

        for (user, item) in train {
            let u = intern(&mut public_users, &mut private_users, user.as_ref());
            let i = intern(&mut public_items, &mut private_items, item.as_ref());
            pairs.push((u, i));
        }

        let mut train_lists = vec![Vec::new(); private_users.len()];
        for (u, i) in pairs {
            train_lists[u].push(i);
        }
        for items in &mut train_lists {
            items.sort_unstable();
            items.dedup();
        }
        let transactions = train_lists.iter().map(Vec::len).sum();

        let validation = validation.map(|pairs| {
            index_split(pairs, &public_users, &public_items, private_users.len(), Split::Validation)
        });
        let test = index_split(test, &public_users, &public_items, private_users.len(), Split::Test);

        tracing::info!(
            users = private_users.len(),
            items = private_items.len(),
            transactions,
            has_validation = validation.is_some(),
            "Built interaction data"
        );

        Ok(Self {
            public_users,
            private_users,
            public_items,
            private_items,
            train: train_lists,
            validation,
            test,
            transactions,
        })
    }

    pub fn num_users(&self) -> usize {
        self.private_users.len()
    }

    pub fn num_items(&self) -> usize {
        self.private_items.len()
    }

    /// Number of distinct training `(user, item)` pairs.
    pub fn transactions(&self) -> usize {
        self.transactions
    }

    pub fn has_validation(&self) -> bool {
        self.validation.is_some()
    }

    /// Internal id of an external user identifier.
    pub fn public_user(&self, user: &str) -> Option<usize> {
        self.public_users.get(user).copied()
    }

    /// Internal id of an external item identifier.
    pub fn public_item(&self, item: &str) -> Option<usize> {
        self.public_items.get(item).copied()
    }

    /// External identifier of an internal user id.
    pub fn private_user(&self, user: usize) -> Option<&str> {
        self.private_users.get(user).map(String::as_str)
    }

    /// External identifier of an internal item id.
    pub fn private_item(&self, item: usize) -> Option<&str> {
        self.private_items.get(item).map(String::as_str)
    }

    /// Sorted training items of an internal user.
    pub fn train_items(&self, user: usize) -> &[usize] {
        self.train.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sorted held-out items of an internal user. Empty when the split is absent.
    pub fn split_items(&self, user: usize, split: Split) -> &[usize] {
        let lists = match split {
            Split::Validation => match &self.validation {
                Some(lists) => lists,
                None => return &[],
            },
            Split::Test => &self.test,
        };
        lists.get(user).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `item` is a training interaction of `user`.
    pub fn is_train_item(&self, user: usize, item: usize) -> bool {
        self.train_items(user).binary_search(&item).is_ok()
    }

    /// Training pairs in row-major order (by user, then item).
    pub fn train_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.train
            .iter()
            .enumerate()
            .flat_map(|(u, items)| items.iter().map(move |&i| (u, i)))
    }
}

fn intern(public: &mut HashMap<String, usize>, private: &mut Vec<String>, id: &str) -> usize {
    if let Some(&idx) = public.get(id) {
        return idx;
    }
    let idx = private.len();
    public.insert(id.to_string(), idx);
    private.push(id.to_string());
    idx
}

fn index_split<S: AsRef<str>>(
    pairs: &[(S, S)],
    public_users: &HashMap<String, usize>,
    public_items: &HashMap<String, usize>,
    num_users: usize,
    split: Split,
) -> Vec<Vec<usize>> {
    let mut lists = vec![Vec::new(); num_users];
    let mut dropped = 0usize;
    for (user, item) in pairs {
        match (public_users.get(user.as_ref()), public_items.get(item.as_ref())) {
            (Some(&u), Some(&i)) => lists[u].push(i),
            _ => dropped += 1,
        }
    }
    for items in &mut lists {
        items.sort_unstable();
        items.dedup();
    }
    if dropped > 0 {
        tracing::warn!(%split, dropped, "Dropped held-out pairs with ids unseen in training");
    }
    lists
}
