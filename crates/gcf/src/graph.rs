//! Bipartite user-item interaction graph over a unified node index space.
//!
//! Users occupy nodes `0..num_users`; item `i` becomes node `num_users + i`.
//! Edges are kept in row-major order (by user, then item) so that edge `e`
//! lines up with the `e`-th training transaction.

use interactions::InteractionData;

/// Directed training edges, user node → item node.
#[derive(Debug, Clone)]
pub struct InteractionGraph {
    num_users: usize,
    num_items: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
}

/// `[2, E]` edge list: `sources[e] → targets[e]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeIndex {
    pub sources: Vec<usize>,
    pub targets: Vec<usize>,
}

impl EdgeIndex {
    pub fn num_edges(&self) -> usize {
        self.sources.len()
    }
}

/// Symmetric node-node adjacency in COO form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseAdjacency {
    pub rows: Vec<usize>,
    pub cols: Vec<usize>,
    /// Square size: `num_users + num_items`.
    pub num_nodes: usize,
}

impl SparseAdjacency {
    pub fn nnz(&self) -> usize {
        self.rows.len()
    }
}

impl InteractionGraph {
    /// Build the graph from the training split.
    pub fn from_data(data: &InteractionData) -> Self {
        let num_users = data.num_users();
        let (rows, cols): (Vec<usize>, Vec<usize>) = data
            .train_pairs()
            .map(|(u, i)| (u, i + num_users))
            .unzip();

        tracing::debug!(
            users = num_users,
            items = data.num_items(),
            edges = rows.len(),
            "Built interaction graph"
        );

        Self {
            num_users,
            num_items: data.num_items(),
            rows,
            cols,
        }
    }

    pub fn num_users(&self) -> usize {
        self.num_users
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn num_nodes(&self) -> usize {
        self.num_users + self.num_items
    }

    /// Number of directed user → item edges (training transactions).
    pub fn num_edges(&self) -> usize {
        self.rows.len()
    }

    /// User node of every edge.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    /// Offset item node of every edge.
    pub fn cols(&self) -> &[usize] {
        &self.cols
    }

    /// Both directions: `[rows ++ cols, cols ++ rows]`.
    pub fn undirected_edge_index(&self) -> EdgeIndex {
        let mut sources = Vec::with_capacity(2 * self.num_edges());
        sources.extend_from_slice(&self.rows);
        sources.extend_from_slice(&self.cols);
        let mut targets = Vec::with_capacity(2 * self.num_edges());
        targets.extend_from_slice(&self.cols);
        targets.extend_from_slice(&self.rows);
        EdgeIndex { sources, targets }
    }

    /// Square `(U+I) × (U+I)` adjacency holding both edge directions.
    pub fn adjacency(&self) -> SparseAdjacency {
        let EdgeIndex { sources, targets } = self.undirected_edge_index();
        SparseAdjacency {
            rows: sources,
            cols: targets,
            num_nodes: self.num_nodes(),
        }
    }
}
