//! Technician feedback loop.
//!
//! Feedback is an append-only log: entries are never updated or removed,
//! and `load_all` returns them in submission order.

pub mod jsonl_store;
pub mod memory_store;
pub mod service;

pub use jsonl_store::JsonlFeedbackStore;
pub use memory_store::InMemoryFeedbackStore;
pub use service::{AccuracySummary, Correction, FeedbackService};

use async_trait::async_trait;

use crate::error::{FeedbackRejected, Result};
use crate::models::FeedbackEntry;

/// Append-only storage for feedback entries
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Append one entry. On failure the entry is handed back unchanged.
    async fn submit(&self, entry: FeedbackEntry) -> std::result::Result<(), FeedbackRejected>;

    /// Every stored entry in submission order
    async fn load_all(&self) -> Result<Vec<FeedbackEntry>>;
}
