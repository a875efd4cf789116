use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{FeedbackRejected, Result};
use crate::feedback::FeedbackStore;
use crate::models::FeedbackEntry;

/// In-memory feedback log (for tests and ephemeral deployments)
#[derive(Debug, Default)]
pub struct InMemoryFeedbackStore {
    entries: RwLock<Vec<FeedbackEntry>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn submit(&self, entry: FeedbackEntry) -> std::result::Result<(), FeedbackRejected> {
        tracing::debug!(incident_id = %entry.incident_id, "Feedback stored in memory");
        self.entries.write().push(entry);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<FeedbackEntry>> {
        Ok(self.entries.read().clone())
    }
}
