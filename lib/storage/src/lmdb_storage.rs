// LMDB-backed corpus store: word vectors, sentences, lineage and clone edges
use heed::types::{Bytes, Str, U64};
use heed::{byteorder::BE, Database, Env, EnvOpenOptions, RoTxn};
use schoolyard_core::{
    CloneEdge, CloneEdgeRepository, CloneType, Error, InMemoryWordVectors, LineageEdge,
    LineageRepository, Result, Sentence, SentenceId, SentenceRepository, UpsertOutcome, Vector,
    WordVectorStore,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const DB_META: &str = "meta";
const DB_WORD_VECTORS: &str = "word_vectors";
const DB_SENTENCES: &str = "sentences";
const DB_LINEAGE_PARENTS: &str = "lineage_parents";
const DB_LINEAGE_CHILDREN: &str = "lineage_children";
const DB_CLONE_EDGES: &str = "clone_edges";

const META_DIMENSION: &str = "dimension";

/// Default LMDB map size (10 GiB of address space, not disk)
pub const DEFAULT_MAP_SIZE: usize = 10 * 1024 * 1024 * 1024;

type IdKey = U64<BE>;

pub struct LmdbStorage {
    env: Arc<Env>,
    dimension: usize,
    word_vectors_db: Database<Str, Bytes>,
    sentences_db: Database<IdKey, Bytes>,
    parents_db: Database<IdKey, Bytes>,
    children_db: Database<IdKey, Bytes>,
    clone_edges_db: Database<Bytes, Bytes>,
}

#[inline]
fn storage_err(e: heed::Error) -> Error {
    Error::Storage(e.to_string())
}

#[inline]
fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))
}

#[inline]
fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
}

/// Clone edges are keyed by `older ‖ younger`, both big-endian
#[inline]
fn edge_key(older: SentenceId, younger: SentenceId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&older.to_be_bytes());
    key[8..].copy_from_slice(&younger.to_be_bytes());
    key
}

impl LmdbStorage {
    pub fn new<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self> {
        Self::with_map_size(path, dimension, DEFAULT_MAP_SIZE)
    }

    pub fn with_map_size<P: AsRef<Path>>(path: P, dimension: usize, map_size: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::InvalidConfig("dimension must be positive".to_string()));
        }
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(8)
                .open(path)
                .map_err(storage_err)?
        });

        let mut wtxn = env.write_txn().map_err(storage_err)?;
        let meta_db: Database<Str, Bytes> = env
            .create_database(&mut wtxn, Some(DB_META))
            .map_err(storage_err)?;
        let word_vectors_db = env
            .create_database(&mut wtxn, Some(DB_WORD_VECTORS))
            .map_err(storage_err)?;
        let sentences_db = env
            .create_database(&mut wtxn, Some(DB_SENTENCES))
            .map_err(storage_err)?;
        let parents_db = env
            .create_database(&mut wtxn, Some(DB_LINEAGE_PARENTS))
            .map_err(storage_err)?;
        let children_db = env
            .create_database(&mut wtxn, Some(DB_LINEAGE_CHILDREN))
            .map_err(storage_err)?;
        let clone_edges_db = env
            .create_database(&mut wtxn, Some(DB_CLONE_EDGES))
            .map_err(storage_err)?;

        // The vector dimension is fixed when the store is created.
        let stored_dimension = match meta_db.get(&wtxn, META_DIMENSION).map_err(storage_err)? {
            Some(bytes) => Some(decode::<u64>(bytes)? as usize),
            None => None,
        };
        match stored_dimension {
            Some(stored) if stored != dimension => {
                return Err(Error::InvalidConfig(format!(
                    "store was created with dimension {}, opened with {}",
                    stored, dimension
                )));
            }
            Some(_) => {}
            None => {
                meta_db
                    .put(&mut wtxn, META_DIMENSION, &encode(&(dimension as u64))?)
                    .map_err(storage_err)?;
            }
        }

        wtxn.commit().map_err(storage_err)?;

        Ok(Self {
            env,
            dimension,
            word_vectors_db,
            sentences_db,
            parents_db,
            children_db,
            clone_edges_db,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    // ==================== Word vectors ====================

    /// Store word vectors in one transaction, returning how many were written
    pub fn put_word_vectors<'a, I>(&self, vectors: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a Vector)>,
    {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        let mut written = 0;
        for (word, vector) in vectors {
            if vector.dim() != self.dimension {
                return Err(Error::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.dim(),
                });
            }
            self.word_vectors_db
                .put(&mut wtxn, word, &encode(vector.as_slice())?)
                .map_err(storage_err)?;
            written += 1;
        }
        wtxn.commit().map_err(storage_err)?;
        Ok(written)
    }

    /// Read every word vector into memory
    pub fn load_word_vectors(&self) -> Result<InMemoryWordVectors> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let mut words = InMemoryWordVectors::new(self.dimension);
        for result in self.word_vectors_db.iter(&rtxn).map_err(storage_err)? {
            let (word, bytes) = result.map_err(storage_err)?;
            words.insert(word, Vector::new(decode(bytes)?))?;
        }
        Ok(words)
    }

    pub fn word_vector_count(&self) -> Result<u64> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        self.word_vectors_db.len(&rtxn).map_err(storage_err)
    }

    // ==================== Sentences ====================

    /// Insert or replace sentences in one transaction
    pub fn put_sentences<'a, I>(&self, sentences: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Sentence>,
    {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        let mut written = 0;
        for sentence in sentences {
            self.sentences_db
                .put(&mut wtxn, &sentence.id, &encode(sentence)?)
                .map_err(storage_err)?;
            written += 1;
        }
        wtxn.commit().map_err(storage_err)?;
        Ok(written)
    }

    pub fn put_sentence(&self, sentence: &Sentence) -> Result<()> {
        self.put_sentences(std::iter::once(sentence)).map(|_| ())
    }

    /// Look up a sentence without treating absence as an error
    pub fn find_sentence(&self, id: SentenceId) -> Result<Option<Sentence>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        match self.sentences_db.get(&rtxn, &id).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn sentence_count(&self) -> Result<u64> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        self.sentences_db.len(&rtxn).map_err(storage_err)
    }

    // ==================== Lineage ====================

    /// Link `edge.child_id` to its parent. A child has at most one parent;
    /// re-adding the same edge updates its order.
    pub fn add_lineage(&self, edge: LineageEdge) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;

        let existing: Option<LineageEdge> = match self
            .parents_db
            .get(&wtxn, &edge.child_id)
            .map_err(storage_err)?
        {
            Some(bytes) => Some(decode(bytes)?),
            None => None,
        };
        if let Some(existing) = existing {
            if existing.parent_id != edge.parent_id {
                return Err(Error::LineageConflict {
                    child: edge.child_id,
                    parent: existing.parent_id,
                });
            }
        }

        let mut siblings = self.children_in(&wtxn, edge.parent_id)?;
        siblings.retain(|e| e.child_id != edge.child_id);
        siblings.push(edge);
        siblings.sort_by_key(|e| (e.order, e.child_id));

        self.parents_db
            .put(&mut wtxn, &edge.child_id, &encode(&edge)?)
            .map_err(storage_err)?;
        self.children_db
            .put(&mut wtxn, &edge.parent_id, &encode(&siblings)?)
            .map_err(storage_err)?;
        wtxn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn children_in(&self, txn: &RoTxn, parent_id: SentenceId) -> Result<Vec<LineageEdge>> {
        match self.children_db.get(txn, &parent_id).map_err(storage_err)? {
            Some(bytes) => decode(bytes),
            None => Ok(Vec::new()),
        }
    }

    // ==================== Clone edges ====================

    fn edge_in(&self, txn: &RoTxn, older: SentenceId, younger: SentenceId) -> Result<Option<CloneEdge>> {
        match self
            .clone_edges_db
            .get(txn, &edge_key(older, younger)[..])
            .map_err(storage_err)?
        {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn either_edge_in(&self, txn: &RoTxn, a: SentenceId, b: SentenceId) -> Result<Option<CloneEdge>> {
        match self.edge_in(txn, a, b)? {
            Some(edge) => Ok(Some(edge)),
            None => self.edge_in(txn, b, a),
        }
    }

    pub fn all_clone_edges(&self) -> Result<Vec<CloneEdge>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let mut edges = Vec::new();
        for result in self.clone_edges_db.iter(&rtxn).map_err(storage_err)? {
            let (_, bytes) = result.map_err(storage_err)?;
            edges.push(decode(bytes)?);
        }
        Ok(edges)
    }

    pub fn clone_edge_count(&self) -> Result<u64> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        self.clone_edges_db.len(&rtxn).map_err(storage_err)
    }

    /// Flush the environment to disk
    pub fn sync(&self) -> Result<()> {
        self.env.force_sync().map_err(storage_err)
    }
}

impl WordVectorStore for LmdbStorage {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn lookup(&self, word: &str) -> Result<Option<Vector>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        match self.word_vectors_db.get(&rtxn, word).map_err(storage_err)? {
            Some(bytes) => Ok(Some(Vector::new(decode(bytes)?))),
            None => Ok(None),
        }
    }
}

impl SentenceRepository for LmdbStorage {
    fn get_by_id(&self, id: SentenceId) -> Result<Sentence> {
        self.find_sentence(id)?.ok_or(Error::SentenceNotFound(id))
    }

    fn get_all(&self) -> Result<Vec<Sentence>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let mut sentences = Vec::new();
        for result in self.sentences_db.iter(&rtxn).map_err(storage_err)? {
            let (_, bytes) = result.map_err(storage_err)?;
            sentences.push(decode(bytes)?);
        }
        Ok(sentences)
    }

    fn set_embedding(&self, id: SentenceId, embedding: Vector) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        let mut sentence: Sentence = match self.sentences_db.get(&wtxn, &id).map_err(storage_err)? {
            Some(bytes) => decode(bytes)?,
            None => return Err(Error::SentenceNotFound(id)),
        };
        sentence.embedding = embedding;
        self.sentences_db
            .put(&mut wtxn, &id, &encode(&sentence)?)
            .map_err(storage_err)?;
        wtxn.commit().map_err(storage_err)?;
        Ok(())
    }
}

impl LineageRepository for LmdbStorage {
    fn get_parent_edge(&self, child_id: SentenceId) -> Result<Option<LineageEdge>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        match self.parents_db.get(&rtxn, &child_id).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn get_child_edges(&self, parent_id: SentenceId) -> Result<Vec<LineageEdge>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        self.children_in(&rtxn, parent_id)
    }
}

impl CloneEdgeRepository for LmdbStorage {
    fn find(&self, older: SentenceId, younger: SentenceId) -> Result<Option<CloneEdge>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        self.edge_in(&rtxn, older, younger)
    }

    fn insert(&self, edge: CloneEdge) -> Result<()> {
        let (older, younger) = (edge.older_clone_id, edge.younger_clone_id);
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        if self.either_edge_in(&wtxn, older, younger)?.is_some() {
            return Err(Error::CloneEdgeExists { older, younger });
        }
        self.clone_edges_db
            .put(&mut wtxn, &edge_key(older, younger)[..], &encode(&edge)?)
            .map_err(storage_err)?;
        wtxn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn update_distance(&self, older: SentenceId, younger: SentenceId, distance: f32) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        let mut edge = self
            .edge_in(&wtxn, older, younger)?
            .ok_or(Error::CloneEdgeNotFound { older, younger })?;
        edge.distance = distance;
        self.clone_edges_db
            .put(&mut wtxn, &edge_key(older, younger)[..], &encode(&edge)?)
            .map_err(storage_err)?;
        wtxn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn update(&self, edge: CloneEdge) -> Result<()> {
        let (older, younger) = (edge.older_clone_id, edge.younger_clone_id);
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        if self.edge_in(&wtxn, older, younger)?.is_none() {
            return Err(Error::CloneEdgeNotFound { older, younger });
        }
        self.clone_edges_db
            .put(&mut wtxn, &edge_key(older, younger)[..], &encode(&edge)?)
            .map_err(storage_err)?;
        wtxn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn edges_for(&self, id: SentenceId) -> Result<Vec<CloneEdge>> {
        Ok(self
            .all_clone_edges()?
            .into_iter()
            .filter(|e| e.touches(id))
            .collect())
    }

    /// Lookup and write inside one LMDB write transaction. LMDB admits a
    /// single writer at a time, so concurrent upserts of the same pair
    /// cannot both insert.
    fn upsert_auto(&self, edge: CloneEdge) -> Result<UpsertOutcome> {
        let (a, b) = (edge.older_clone_id, edge.younger_clone_id);
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;

        let outcome = match self.either_edge_in(&wtxn, a, b)? {
            Some(existing) if existing.clone_type.is_refreshable() => {
                let refreshed = CloneEdge {
                    distance: edge.distance,
                    ..existing
                };
                self.clone_edges_db
                    .put(
                        &mut wtxn,
                        &edge_key(existing.older_clone_id, existing.younger_clone_id)[..],
                        &encode(&refreshed)?,
                    )
                    .map_err(storage_err)?;
                UpsertOutcome::Refreshed
            }
            Some(_) => UpsertOutcome::Preserved,
            None => {
                let inserted = CloneEdge {
                    clone_type: CloneType::Auto,
                    ..edge
                };
                self.clone_edges_db
                    .put(&mut wtxn, &edge_key(a, b)[..], &encode(&inserted)?)
                    .map_err(storage_err)?;
                UpsertOutcome::Inserted
            }
        };

        if outcome == UpsertOutcome::Preserved {
            wtxn.abort();
        } else {
            wtxn.commit().map_err(storage_err)?;
        }
        debug!(older = a, younger = b, ?outcome, "clone edge upserted");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn open(dir: &tempfile::TempDir) -> LmdbStorage {
        LmdbStorage::with_map_size(dir.path(), 2, 16 * 1024 * 1024).unwrap()
    }

    #[test]
    fn test_edge_key_orders_by_older_then_younger() {
        assert!(edge_key(1, 9) < edge_key(2, 0));
        assert!(edge_key(1, 2) < edge_key(1, 3));
    }

    #[test]
    fn test_dimension_is_fixed_at_creation() {
        let dir = tempfile::tempdir().unwrap();
        drop(open(&dir));
        let reopened = LmdbStorage::with_map_size(dir.path(), 3, 16 * 1024 * 1024);
        assert!(matches!(reopened, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_word_vectors_round_trip_through_memory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir);
        let cat = Vector::new(vec![1.0, 0.5]);
        storage.put_word_vectors([("cat", &cat)]).unwrap();

        assert_eq!(storage.lookup("cat").unwrap(), Some(cat.clone()));
        assert_eq!(storage.lookup("Cat").unwrap(), None);
        assert_eq!(storage.load_word_vectors().unwrap().lookup("cat").unwrap(), Some(cat));
    }

    #[test]
    fn test_word_vector_dimension_checked() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir);
        let wrong = Vector::new(vec![1.0, 0.5, 0.0]);
        assert!(storage.put_word_vectors([("cat", &wrong)]).is_err());
        assert_eq!(storage.word_vector_count().unwrap(), 0);
    }

    #[test]
    fn test_sentence_embedding_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir);
        let at = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        storage.put_sentence(&Sentence::new(4, "Plants need light.", at)).unwrap();

        storage.set_embedding(4, Vector::new(vec![0.25, 0.75])).unwrap();

        let sentence = storage.get_by_id(4).unwrap();
        assert_eq!(sentence.created_at, at);
        assert_eq!(sentence.embedding.as_slice(), &[0.25, 0.75]);
        assert!(matches!(storage.get_by_id(5), Err(Error::SentenceNotFound(5))));
        assert!(storage.set_embedding(5, Vector::empty()).is_err());
    }

    #[test]
    fn test_lineage_children_in_order_and_single_parent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir);
        storage.add_lineage(LineageEdge::new(1, 3, 1)).unwrap();
        storage.add_lineage(LineageEdge::new(1, 2, 0)).unwrap();
        // same parent again only moves the child
        storage.add_lineage(LineageEdge::new(1, 3, 2)).unwrap();

        let children: Vec<SentenceId> = storage
            .get_child_edges(1)
            .unwrap()
            .iter()
            .map(|e| e.child_id)
            .collect();
        assert_eq!(children, vec![2, 3]);
        assert_eq!(storage.get_parent_edge(3).unwrap().unwrap().order, 2);
        assert!(matches!(
            storage.add_lineage(LineageEdge::new(9, 3, 0)),
            Err(Error::LineageConflict { child: 3, parent: 1 })
        ));
    }

    #[test]
    fn test_insert_rejects_either_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir);
        storage.insert(CloneEdge::new(1, 2, 0.4, CloneType::Manual)).unwrap();
        assert!(matches!(
            storage.insert(CloneEdge::new(2, 1, 0.4, CloneType::Auto)),
            Err(Error::CloneEdgeExists { .. })
        ));
        assert_eq!(storage.clone_edge_count().unwrap(), 1);
    }

    #[test]
    fn test_upsert_auto_respects_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir);

        let outcome = storage.upsert_auto(CloneEdge::new(1, 2, 0.5, CloneType::Auto)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let outcome = storage.upsert_auto(CloneEdge::new(2, 1, 0.9, CloneType::Auto)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Refreshed);
        assert_eq!(storage.find(1, 2).unwrap().unwrap().distance, 0.9);
        assert!(storage.find(2, 1).unwrap().is_none());

        storage.update(CloneEdge::new(1, 2, 0.1, CloneType::Manual)).unwrap();
        let outcome = storage.upsert_auto(CloneEdge::new(1, 2, 0.7, CloneType::Auto)).unwrap();
        assert_eq!(outcome, UpsertOutcome::Preserved);
        assert_eq!(storage.find(1, 2).unwrap().unwrap().distance, 0.1);
    }

    #[test]
    fn test_edges_for_both_ends() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(&dir);
        storage.insert(CloneEdge::new(1, 2, 0.5, CloneType::Auto)).unwrap();
        storage.insert(CloneEdge::new(3, 1, 0.5, CloneType::Auto)).unwrap();
        storage.insert(CloneEdge::new(2, 3, 0.5, CloneType::Auto)).unwrap();

        assert_eq!(storage.edges_for(1).unwrap().len(), 2);
        assert_eq!(storage.edges_for(4).unwrap().len(), 0);
    }
}
