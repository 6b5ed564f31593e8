// Single-writer maintenance queue
// Sentence writes submit ids; one worker thread runs the maintenance passes
// in FIFO order so passes never race each other on the same edges.

use crate::maintainer::CloneGraphMaintainer;
use crate::{Error, Result, SentenceId};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Default bound on waiting sentence ids
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of pending ids; further submissions fail with
    /// [`Error::QueueFull`].
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

struct QueueState {
    pending: VecDeque<SentenceId>,
    queued: HashSet<SentenceId>,
    running: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    condvar: Condvar,
    processed: AtomicU64,
    failed: AtomicU64,
}

/// Background worker running [`CloneGraphMaintainer::process_sentence`]
pub struct MaintenanceQueue {
    shared: Arc<Shared>,
    capacity: usize,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MaintenanceQueue {
    pub fn start(maintainer: Arc<CloneGraphMaintainer>, config: QueueConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(Error::InvalidConfig("queue capacity must be positive".to_string()));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                queued: HashSet::new(),
                running: true,
            }),
            condvar: Condvar::new(),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("clone-maintenance".to_string())
            .spawn(move || run_worker(worker_shared, maintainer))?;

        Ok(Self {
            shared,
            capacity: config.capacity,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queue a maintenance pass for `sentence_id`.
    ///
    /// Returns `false` when the id is already waiting; one pass will pick up
    /// every change made before it starts.
    pub fn submit(&self, sentence_id: SentenceId) -> Result<bool> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(Error::QueueClosed);
        }
        if state.queued.contains(&sentence_id) {
            return Ok(false);
        }
        if state.pending.len() >= self.capacity {
            return Err(Error::QueueFull(state.pending.len()));
        }

        state.queued.insert(sentence_id);
        state.pending.push_back(sentence_id);
        self.shared.condvar.notify_one();
        Ok(true)
    }

    pub fn pending_jobs(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    /// Passes finished, successful or not
    pub fn jobs_processed(&self) -> u64 {
        self.shared.processed.load(Ordering::Relaxed)
    }

    pub fn jobs_failed(&self) -> u64 {
        self.shared.failed.load(Ordering::Relaxed)
    }

    /// Stop accepting ids, finish the pending ones, and join the worker
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            state.running = false;
            self.shared.condvar.notify_all();
        }

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("clone maintenance worker panicked");
            }
        }
    }
}

impl Drop for MaintenanceQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(shared: Arc<Shared>, maintainer: Arc<CloneGraphMaintainer>) {
    loop {
        let sentence_id = {
            let mut state = shared.state.lock();
            while state.pending.is_empty() && state.running {
                shared.condvar.wait(&mut state);
            }
            match state.pending.pop_front() {
                Some(id) => {
                    state.queued.remove(&id);
                    id
                }
                // drained and shut down
                None => break,
            }
        };

        match maintainer.process_sentence(sentence_id) {
            Ok(report) => debug!(
                sentence = sentence_id,
                inserted = report.inserted,
                refreshed = report.refreshed,
                "queued maintenance pass done"
            ),
            Err(e) => {
                warn!(sentence = sentence_id, error = %e, "queued maintenance pass failed");
                shared.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        shared.processed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maintainer::MaintainerConfig;
    use crate::memory::MemoryCorpus;
    use crate::{InMemoryWordVectors, Sentence, SentenceEmbedder, Vector};
    use chrono::{Duration, Utc};

    fn maintainer(corpus: Arc<MemoryCorpus>) -> Arc<CloneGraphMaintainer> {
        let mut words = InMemoryWordVectors::new(2);
        words.insert("cat", Vector::new(vec![1.0, 0.0])).unwrap();
        words.insert("dog", Vector::new(vec![0.0, 1.0])).unwrap();
        let embedder = SentenceEmbedder::new(Arc::new(words));
        Arc::new(
            CloneGraphMaintainer::over(MaintainerConfig { dimension: 2 }, embedder, corpus).unwrap(),
        )
    }

    #[test]
    fn test_processes_submitted_sentences() {
        let corpus = Arc::new(MemoryCorpus::new());
        let now = Utc::now();
        corpus.add_sentence(Sentence::new(1, "cat", now));
        corpus.add_sentence(Sentence::new(2, "dog", now + Duration::seconds(1)));
        corpus.add_sentence(Sentence::new(3, "cat dog", now + Duration::seconds(2)));

        let queue = MaintenanceQueue::start(maintainer(corpus.clone()), QueueConfig::default()).unwrap();
        for id in [1, 2, 3] {
            queue.submit(id).unwrap();
        }
        queue.shutdown();

        assert_eq!(queue.jobs_processed(), 3);
        assert_eq!(queue.jobs_failed(), 0);
        assert_eq!(queue.pending_jobs(), 0);
        assert_eq!(corpus.edge_count(), 3);
    }

    #[test]
    fn test_failed_pass_is_counted() {
        let corpus = Arc::new(MemoryCorpus::new());
        let queue = MaintenanceQueue::start(maintainer(corpus), QueueConfig::default()).unwrap();
        queue.submit(77).unwrap();
        queue.shutdown();

        assert_eq!(queue.jobs_processed(), 1);
        assert_eq!(queue.jobs_failed(), 1);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let corpus = Arc::new(MemoryCorpus::new());
        let queue = MaintenanceQueue::start(maintainer(corpus), QueueConfig::default()).unwrap();
        queue.shutdown();
        assert!(matches!(queue.submit(1), Err(Error::QueueClosed)));
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let corpus = Arc::new(MemoryCorpus::new());
        assert!(MaintenanceQueue::start(maintainer(corpus), QueueConfig { capacity: 0 }).is_err());
    }

    #[test]
    fn test_duplicate_and_overflow_while_worker_is_busy() {
        let corpus = Arc::new(MemoryCorpus::new());
        let maintainer = maintainer(corpus);
        let queue = MaintenanceQueue::start(maintainer.clone(), QueueConfig { capacity: 2 }).unwrap();

        // Holding the maintainer's lock parks the worker inside its first pass.
        let guard = maintainer.write_lock.lock();
        queue.submit(10).unwrap();
        while queue.pending_jobs() > 0 {
            std::thread::yield_now();
        }
        assert!(queue.submit(11).unwrap());
        assert!(!queue.submit(11).unwrap());
        assert!(queue.submit(12).unwrap());
        assert!(matches!(queue.submit(13), Err(Error::QueueFull(2))));
        drop(guard);

        queue.shutdown();
        assert_eq!(queue.jobs_processed(), 3);
    }
}
