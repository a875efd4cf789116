pub mod handlers;
pub mod routes;

pub use routes::*;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, TriageError};
use crate::feedback::FeedbackService;
use crate::processing::{TriageProcessor, TriageRun};

/// Completed runs kept for lookup and feedback; oldest evicted first
#[derive(Debug)]
pub struct RunRegistry {
    runs: DashMap<Uuid, Arc<TriageRun>>,
    order: Mutex<VecDeque<Uuid>>,
    capacity: usize,
}

impl RunRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            runs: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, run: TriageRun) -> Arc<TriageRun> {
        let run = Arc::new(run);
        self.runs.insert(run.run_id, run.clone());

        let mut order = self.order.lock();
        order.push_back(run.run_id);
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.runs.remove(&evicted);
                tracing::debug!(run_id = %evicted, "Evicted triage run");
            }
        }
        run
    }

    pub fn get(&self, run_id: &Uuid) -> Result<Arc<TriageRun>> {
        self.runs
            .get(run_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TriageError::UnknownRun {
                run_id: run_id.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<TriageProcessor>,
    pub feedback: FeedbackService,
    pub runs: Arc<RunRegistry>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(processor: Arc<TriageProcessor>, feedback: FeedbackService, config: Config) -> Self {
        Self {
            processor,
            feedback,
            runs: Arc::new(RunRegistry::new(config.server.max_retained_runs)),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}
