//! Integration tests for the interactions crate.
//!
//! These exercise full pipelines: splits → id maps → recommendation files →
//! reading back, and edge-feature loading against a real id space.

use std::collections::BTreeMap;

use interactions::{
    load_edge_features, InteractionData, RecommendationReader, RecommendationWriter,
    Recommendations, Split,
};

fn owned(raw: &[(&str, &str)]) -> Vec<(String, String)> {
    raw.iter().map(|(u, i)| (u.to_string(), i.to_string())).collect()
}

fn movie_data() -> InteractionData {
    let train = owned(&[
        ("alice", "m1"),
        ("alice", "m2"),
        ("bob", "m2"),
        ("bob", "m3"),
        ("carol", "m1"),
    ]);
    let val = owned(&[("alice", "m3"), ("carol", "m2")]);
    let test = owned(&[("bob", "m1"), ("carol", "m3"), ("dave", "m1")]);
    InteractionData::from_splits(&train, Some(val.as_slice()), &test).unwrap()
}

#[test]
fn test_splits_share_training_id_space() {
    let data = movie_data();
    assert_eq!(data.num_users(), 3);
    assert_eq!(data.num_items(), 3);
    assert_eq!(data.transactions(), 5);
    assert!(data.has_validation());

    let alice = data.public_user("alice").unwrap();
    let m3 = data.public_item("m3").unwrap();
    assert_eq!(data.split_items(alice, Split::Validation), &[m3]);

    // dave only appears in test, so has no internal id
    assert!(data.public_user("dave").is_none());
}

#[test]
fn test_recommendations_round_trip_through_tsv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recs/DGCF_it=1.tsv");

    let mut recs = Recommendations::new();
    recs.test.insert(
        "alice".into(),
        vec![("m3".into(), 0.75), ("m9".into(), -0.5)],
    );
    recs.test.insert("bob".into(), vec![("m1".into(), 1.0)]);

    let mut writer = RecommendationWriter::new(path.clone());
    writer.record_all(&recs.test);
    writer.finish().unwrap();

    let read: BTreeMap<_, _> = RecommendationReader::read_all(&path).unwrap();
    assert_eq!(read, recs.test);
}

#[test]
fn test_edge_features_over_movie_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edge_features.tsv");
    std::fs::write(
        &path,
        "user\titem\tfeature_path\n\
         alice\tm1\t[10, -20]\n\
         alice\tm2\t[-10]\n\
         bob\tm2\t[30]\n",
    )
    .unwrap();

    let data = movie_data();
    let features = load_edge_features(&path, &data).unwrap();

    assert_eq!(features.shape(), (data.transactions(), 3));
    assert_eq!(features.feature_ids, vec![10, 20, 30]);
    assert_eq!(features.rows, vec![0, 0, 1, 2]);
    assert_eq!(features.values, vec![1, -1, -1, 1]);
}
