//! Read/write contract between the orchestrator and whatever persistence
//! engine hosts the records.
//!
//! One sync run stages writes through `upsert_*`, then settles them with a
//! single `commit` or throws them away with `rollback`. Reads see the run's
//! own staged writes (read-after-write within a run). Implementations must
//! serialize writes internally: period completions for the same subject
//! land concurrently.

use async_trait::async_trait;

use crate::model::{Assignment, GradingPeriod, Subject};

pub mod memory;

pub use memory::MemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_subject(&self, section_guid: &str) -> Option<Subject>;

    async fn find_period(&self, section_guid: &str, number: u8) -> Option<GradingPeriod>;

    /// Lookup by the assignment natural key. The portal issues no stable
    /// assignment id, so (name, period, subject) is all there is.
    async fn find_assignment(
        &self,
        name: &str,
        period_number: u8,
        subject_name: &str,
    ) -> Option<Assignment>;

    async fn upsert_subject(&self, subject: Subject);

    async fn upsert_period(&self, period: GradingPeriod);

    async fn upsert_assignment(&self, assignment: Assignment);

    /// Makes every staged write of this run durable.
    async fn commit(&self);

    /// Discards every staged write, restoring the last committed state.
    async fn rollback(&self);
}
