// Integration tests for schoolyard
use schoolyard_core::{
    CloneEdge, CloneEdgeRepository, CloneType, LineageEdge, MaintenanceQueue, QueueConfig,
    Sentence, SentenceRepository,
};
use schoolyard_storage::{StorageConfig, StorageManager};
use chrono::{Duration, TimeZone, Utc};
use std::io::Write;
use std::sync::Arc;

const VECTORS: &str = "\
6 3
plants 1.0 0.0 0.0
need 0.0 1.0 0.0
light 0.0 0.0 1.0
sunlight 0.0 0.2 0.9
grow 0.5 0.5 0.0
rocks 9.0 9.0 9.0
";

const CORPUS: &str = r#"{
    "sentences": [
        {"id": 1, "text": "plants need light.", "created_at": "2021-04-01T09:00:00Z"},
        {"id": 2, "text": "plants need sunlight!", "created_at": "2021-04-02T09:00:00Z"},
        {"id": 3, "text": "plants grow.", "created_at": "2021-04-03T09:00:00Z"},
        {"id": 4, "text": "light", "created_at": "2021-04-04T09:00:00Z"},
        {"id": 5, "text": "nothing in the vocabulary here", "created_at": "2021-04-05T09:00:00Z"}
    ],
    "lineage": [{"parent_id": 1, "child_id": 3, "order": 0}],
    "clones": [{"older_clone_id": 2, "younger_clone_id": 4, "distance": 0.05, "clone_type": "MANUAL"}]
}"#;

fn config() -> StorageConfig {
    StorageConfig {
        dimension: 3,
        map_size: 32 * 1024 * 1024,
    }
}

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn seeded(dir: &tempfile::TempDir) -> StorageManager {
    let manager = StorageManager::new(dir.path().join("data"), config()).unwrap();
    manager
        .import_word_vectors(write_file(dir, "vectors.txt", VECTORS))
        .unwrap();
    manager
        .import_corpus(write_file(dir, "corpus.json", CORPUS))
        .unwrap();
    manager
}

#[test]
fn test_rebuild_over_lmdb() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded(&dir);
    let maintainer = manager.maintainer().unwrap();

    let report = maintainer.rebuild_all().unwrap();
    assert_eq!(report.processed, 5);
    assert!(report.failed.is_empty());

    let storage = manager.storage();
    // 1 and 3 are parent and child
    assert!(storage.find_either(1, 3).unwrap().is_none());
    // 5 has no known words
    assert!(!storage.get_by_id(5).unwrap().has_embedding());
    assert!(storage.edges_for(5).unwrap().is_empty());
    // pairs among {1,2,3,4} minus 1-3: five edges, one of them manual
    assert_eq!(storage.clone_edge_count().unwrap(), 5);

    let manual = storage.find(2, 4).unwrap().unwrap();
    assert_eq!(manual.clone_type, CloneType::Manual);
    assert_eq!(manual.distance, 0.05);

    for edge in storage.all_clone_edges().unwrap() {
        let older = storage.get_by_id(edge.older_clone_id).unwrap();
        let younger = storage.get_by_id(edge.younger_clone_id).unwrap();
        assert!(older.created_at < younger.created_at);
    }
}

#[test]
fn test_paraphrase_is_nearest_clone() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded(&dir);
    let maintainer = manager.maintainer().unwrap();
    maintainer.rebuild_all().unwrap();

    let nearest = maintainer.clones_of(1, None).unwrap();
    assert_eq!(nearest[0].other_end(1), Some(2));

    // mean of plants, need, light vs plants, need, sunlight
    let expected = ((0.2f32 / 3.0).powi(2) + (0.1f32 / 3.0).powi(2)).sqrt();
    assert!((nearest[0].distance - expected).abs() < 1e-5);
}

#[test]
fn test_edges_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let edges_before = {
        let manager = seeded(&dir);
        let maintainer = manager.maintainer().unwrap();
        maintainer.rebuild_all().unwrap();
        manager.save().unwrap();
        manager.storage().all_clone_edges().unwrap()
    };

    let manager = StorageManager::new(dir.path().join("data"), config()).unwrap();
    assert_eq!(manager.storage().all_clone_edges().unwrap(), edges_before);
    assert!(manager.storage().get_by_id(1).unwrap().has_embedding());
}

#[test]
fn test_edit_refreshes_auto_edges_only() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded(&dir);
    let maintainer = manager.maintainer().unwrap();
    maintainer.rebuild_all().unwrap();
    let storage = manager.storage();
    let before = storage.find(1, 2).unwrap().unwrap();

    // sentence 2 is rewritten to something far away
    let mut edited = storage.get_by_id(2).unwrap();
    edited.text = "rocks".to_string();
    storage.put_sentence(&edited).unwrap();
    let report = maintainer.process_sentence(2).unwrap();

    assert_eq!(report.inserted, 0);
    assert_eq!(report.preserved, 1);
    let after = storage.find(1, 2).unwrap().unwrap();
    assert_eq!(after.clone_type, CloneType::Auto);
    assert!(after.distance > before.distance);
    assert_eq!(storage.find(2, 4).unwrap().unwrap().distance, 0.05);
}

#[test]
fn test_new_sentence_through_queue() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded(&dir);
    let maintainer = Arc::new(manager.maintainer().unwrap());
    maintainer.rebuild_all().unwrap();
    let storage = manager.storage().clone();

    let created = Utc.with_ymd_and_hms(2021, 4, 10, 9, 0, 0).unwrap();
    storage
        .put_sentence(&Sentence::new(6, "plants need light to grow.", created))
        .unwrap();
    storage.add_lineage(LineageEdge::new(6, 7, 0)).unwrap();
    storage
        .put_sentence(&Sentence::new(7, "they grow.", created + Duration::minutes(5)))
        .unwrap();

    let queue = MaintenanceQueue::start(maintainer, QueueConfig::default()).unwrap();
    queue.submit(6).unwrap();
    queue.submit(7).unwrap();
    queue.shutdown();

    assert_eq!(queue.jobs_failed(), 0);
    // 6 links to 1..4, 7 links to 1..4; 6 and 7 are parent and child
    assert_eq!(storage.edges_for(6).unwrap().len(), 4);
    assert_eq!(storage.edges_for(7).unwrap().len(), 4);
    assert!(storage.find_either(6, 7).unwrap().is_none());
    let edge = storage.find(1, 6).unwrap().unwrap();
    assert_eq!(edge.older_clone_id, 1);
}

#[test]
fn test_record_clone_persists_and_is_respected() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded(&dir);
    let maintainer = manager.maintainer().unwrap();
    maintainer.rebuild_all().unwrap();

    let edge = maintainer.record_clone(3, 4, CloneType::Creation).unwrap();
    assert_eq!((edge.older_clone_id, edge.younger_clone_id), (3, 4));
    maintainer.insert_distances(4).unwrap();

    let stored = manager.storage().find(3, 4).unwrap().unwrap();
    assert_eq!(stored, CloneEdge { clone_type: CloneType::Creation, ..edge });
}

#[test]
fn test_unknown_sentence_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded(&dir);
    let maintainer = manager.maintainer().unwrap();
    assert!(maintainer.insert_distances(404).is_err());
    assert!(maintainer.process_sentence(404).is_err());
}

#[test]
fn test_maintainer_requires_word_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let manager = StorageManager::new(dir.path(), config()).unwrap();
    assert!(manager.maintainer().is_err());
}

#[test]
fn test_clones_listed_without_word_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let manager = StorageManager::new(dir.path().join("data"), config()).unwrap();
    manager
        .import_corpus(write_file(&dir, "corpus.json", CORPUS))
        .unwrap();

    let edges = schoolyard_core::clones_of(manager.storage().as_ref(), 4, None).unwrap();

    assert_eq!(edges, vec![CloneEdge::new(2, 4, 0.05, CloneType::Manual)]);
    assert!(manager.maintainer().is_err());
}
