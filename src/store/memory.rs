//! In-memory [`Store`] with staged-overlay commit semantics.
//!
//! Staged writes shadow committed rows until `commit` folds them in or
//! `rollback` drops them. A single mutex serializes all access, which also
//! satisfies the contract's write-serialization requirement.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::Store;
use crate::model::{Assignment, GradingPeriod, Subject};

type AssignmentKey = (String, u8, String);

#[derive(Default, Clone)]
struct Tables {
    subjects: HashMap<String, Subject>,
    periods: HashMap<(String, u8), GradingPeriod>,
    assignments: HashMap<AssignmentKey, Assignment>,
}

#[derive(Default)]
struct State {
    committed: Tables,
    staged: Tables,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed subjects, unordered. Staged rows are invisible here.
    #[must_use]
    pub fn subjects(&self) -> Vec<Subject> {
        self.state.lock().committed.subjects.values().cloned().collect()
    }

    #[must_use]
    pub fn periods(&self) -> Vec<GradingPeriod> {
        self.state.lock().committed.periods.values().cloned().collect()
    }

    #[must_use]
    pub fn assignments(&self) -> Vec<Assignment> {
        self.state
            .lock()
            .committed
            .assignments
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_subject(&self, section_guid: &str) -> Option<Subject> {
        let state = self.state.lock();
        state
            .staged
            .subjects
            .get(section_guid)
            .or_else(|| state.committed.subjects.get(section_guid))
            .cloned()
    }

    async fn find_period(&self, section_guid: &str, number: u8) -> Option<GradingPeriod> {
        let key = (section_guid.to_owned(), number);
        let state = self.state.lock();
        state
            .staged
            .periods
            .get(&key)
            .or_else(|| state.committed.periods.get(&key))
            .cloned()
    }

    async fn find_assignment(
        &self,
        name: &str,
        period_number: u8,
        subject_name: &str,
    ) -> Option<Assignment> {
        let key = (name.to_owned(), period_number, subject_name.to_owned());
        let state = self.state.lock();
        state
            .staged
            .assignments
            .get(&key)
            .or_else(|| state.committed.assignments.get(&key))
            .cloned()
    }

    async fn upsert_subject(&self, subject: Subject) {
        self.state
            .lock()
            .staged
            .subjects
            .insert(subject.section_guid.clone(), subject);
    }

    async fn upsert_period(&self, period: GradingPeriod) {
        self.state
            .lock()
            .staged
            .periods
            .insert((period.section_guid.clone(), period.number), period);
    }

    async fn upsert_assignment(&self, assignment: Assignment) {
        self.state.lock().staged.assignments.insert(
            (
                assignment.name.clone(),
                assignment.period_number,
                assignment.subject_name.clone(),
            ),
            assignment,
        );
    }

    async fn commit(&self) {
        let mut state = self.state.lock();
        let staged = core::mem::take(&mut state.staged);
        state.committed.subjects.extend(staged.subjects);
        state.committed.periods.extend(staged.periods);
        state.committed.assignments.extend(staged.assignments);
    }

    async fn rollback(&self) {
        self.state.lock().staged = Tables::default();
    }
}
