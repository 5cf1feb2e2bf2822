//! Writes per-user recommendation lists as tab-separated `user item score` rows.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::RankedItems;

/// Buffers recommendation lists and writes them to a TSV file.
///
/// The file has no header; users are written in sorted order and each
/// user's items keep their ranked order.
pub struct RecommendationWriter {
    lists: BTreeMap<String, RankedItems>,
    output_path: PathBuf,
}

impl RecommendationWriter {
    /// Create a new writer that will write to the given path.
    pub fn new(output_path: PathBuf) -> Self {
        Self {
            lists: BTreeMap::new(),
            output_path,
        }
    }

    /// Buffer the ranked list of a single user, replacing any earlier one.
    pub fn record(&mut self, user: String, items: RankedItems) {
        self.lists.insert(user, items);
    }

    /// Buffer ranked lists for many users.
    pub fn record_all(&mut self, lists: &BTreeMap<String, RankedItems>) {
        self.lists
            .extend(lists.iter().map(|(u, items)| (u.clone(), items.clone())));
    }

    /// Number of buffered users.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Write all buffered rows and return the output path.
    ///
    /// Missing parent directories are created.
    pub fn finish(self) -> anyhow::Result<PathBuf> {
        if let Some(parent) = self.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(&self.output_path)
            .map_err(|e| {
                anyhow::anyhow!("Failed to create {}: {e}", self.output_path.display())
            })?;

        let mut rows = 0usize;
        for (user, items) in &self.lists {
            for (item, score) in items {
                let score = score.to_string();
                writer.write_record([user.as_str(), item.as_str(), score.as_str()])?;
                rows += 1;
            }
        }
        writer.flush()?;

        tracing::info!(
            users = self.lists.len(),
            rows,
            path = %self.output_path.display(),
            "Wrote recommendation file"
        );

        Ok(self.output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_tab_separated_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recs.tsv");

        let mut writer = RecommendationWriter::new(path.clone());
        writer.record("u2".into(), vec![("i9".into(), 0.25)]);
        writer.record("u1".into(), vec![("i3".into(), 2.0), ("i1".into(), 1.5)]);
        assert_eq!(writer.len(), 2);
        writer.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "u1\ti3\t2\nu1\ti1\t1.5\nu2\ti9\t0.25\n");
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/recs.tsv");

        let mut writer = RecommendationWriter::new(path.clone());
        writer.record("u".into(), vec![("i".into(), 1.0)]);
        let written = writer.finish().unwrap();

        assert_eq!(written, path);
        assert!(path.exists());
    }

    #[test]
    fn test_empty_writer_produces_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tsv");
        let writer = RecommendationWriter::new(path.clone());
        assert!(writer.is_empty());
        writer.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
