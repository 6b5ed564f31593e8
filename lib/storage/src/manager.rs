use crate::import::{self, ImportSummary};
use crate::lmdb_storage::{LmdbStorage, DEFAULT_MAP_SIZE};
use schoolyard_core::{
    CloneGraphMaintainer, Error, MaintainerConfig, Result, SentenceEmbedder, DEFAULT_DIMENSION,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Configuration for a data directory
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Word vector and embedding dimension
    pub dimension: usize,
    /// LMDB map size in bytes
    pub map_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            map_size: DEFAULT_MAP_SIZE,
        }
    }
}

/// Owns the LMDB store for a data directory and wires maintainers to it
pub struct StorageManager {
    data_dir: PathBuf,
    config: StorageConfig,
    lmdb: Arc<LmdbStorage>,
}

impl StorageManager {
    pub fn new<P: AsRef<Path>>(data_dir: P, config: StorageConfig) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let lmdb_path = data_dir.join("lmdb");
        let lmdb = Arc::new(LmdbStorage::with_map_size(
            &lmdb_path,
            config.dimension,
            config.map_size,
        )?);

        info!(
            data_dir = %data_dir.display(),
            dimension = config.dimension,
            sentences = lmdb.sentence_count()?,
            words = lmdb.word_vector_count()?,
            "storage opened"
        );

        Ok(Self {
            data_dir,
            config,
            lmdb,
        })
    }

    #[inline]
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[inline]
    #[must_use]
    pub fn storage(&self) -> &Arc<LmdbStorage> {
        &self.lmdb
    }

    pub fn import_word_vectors<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<usize> {
        import::import_word_vectors(&self.lmdb, path)
    }

    pub fn import_corpus<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<ImportSummary> {
        import::import_corpus(&self.lmdb, path)
    }

    /// Build a maintainer over this store.
    ///
    /// Word vectors are read into memory once here; imports made afterwards
    /// are only seen by maintainers built later.
    pub fn maintainer(&self) -> Result<CloneGraphMaintainer> {
        let words = self.lmdb.load_word_vectors()?;
        if words.is_empty() {
            return Err(Error::InvalidConfig(
                "no word vectors imported; run import-vectors first".to_string(),
            ));
        }
        info!(words = words.len(), "word vectors loaded");

        let embedder = SentenceEmbedder::new(Arc::new(words));
        let config = MaintainerConfig {
            dimension: self.config.dimension,
        };
        CloneGraphMaintainer::over(config, embedder, self.lmdb.clone())
    }

    /// Flush LMDB to disk
    pub fn save(&self) -> Result<()> {
        self.lmdb.sync()
    }
}
