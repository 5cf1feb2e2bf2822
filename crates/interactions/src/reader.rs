//! Reads recommendation TSV files back into per-user ranked lists.

use std::collections::BTreeMap;
use std::path::Path;

use crate::types::RankedItems;

/// Static methods for reading recommendation files written by
/// [`RecommendationWriter`](crate::RecommendationWriter).
pub struct RecommendationReader;

impl RecommendationReader {
    /// Read all rows, grouping them by user and keeping file order within a user.
    pub fn read_all(path: &Path) -> anyhow::Result<BTreeMap<String, RankedItems>> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(path)
            .map_err(|e| anyhow::anyhow!("Failed to open {}: {e}", path.display()))?;

        let mut lists: BTreeMap<String, RankedItems> = BTreeMap::new();
        for (line, row) in reader.deserialize::<(String, String, f32)>().enumerate() {
            let (user, item, score) = row.map_err(|e| {
                anyhow::anyhow!("Bad recommendation row {} in {}: {e}", line + 1, path.display())
            })?;
            lists.entry(user).or_default().push((item, score));
        }

        tracing::debug!(
            users = lists.len(),
            path = %path.display(),
            "Read recommendation file"
        );

        Ok(lists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_rows_by_user_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recs.tsv");
        std::fs::write(&path, "u1\ti3\t2.0\nu2\ti9\t0.5\nu1\ti1\t1.5\n").unwrap();

        let lists = RecommendationReader::read_all(&path).unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(
            lists["u1"],
            vec![("i3".to_string(), 2.0), ("i1".to_string(), 1.5)]
        );
    }

    #[test]
    fn test_bad_score_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recs.tsv");
        std::fs::write(&path, "u1\ti3\tnot-a-number\n").unwrap();

        let err = RecommendationReader::read_all(&path).unwrap_err();
        assert!(err.to_string().contains("row 1"), "got: {err}");
    }

    #[test]
    fn test_missing_file_errors() {
        let err = RecommendationReader::read_all(Path::new("/nonexistent/recs.tsv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
