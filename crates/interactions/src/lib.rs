//! User-item interaction data for graph collaborative filtering.
//!
//! Holds the train/validation/test splits with their external ↔ internal id
//! maps, the signed edge-feature dataset consumed by EGCFv2, and TSV I/O for
//! per-user recommendation lists.

pub mod features;
pub mod reader;
pub mod types;
pub mod writer;

pub use features::{load_edge_features, EdgeFeatures};
pub use reader::RecommendationReader;
pub use types::{InteractionData, InteractionsError, RankedItems, Recommendations, Split};
pub use writer::RecommendationWriter;
