//! Persistent records the engine merges scraped pages into.
//!
//! Grade figures stay as the sanitized strings the portal prints. Totals
//! like `8.5*` or `ex` (extra credit, excused) are not numbers and the
//! engine never does arithmetic on them.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

/// One enrolled course. Keyed by [`Subject::section_guid`], the stable
/// per-section token lifted from the portal URL query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    /// Portal record id of the owning student.
    pub student_id: String,
    pub section_guid: String,
    pub name: String,
    pub teacher: String,
    pub room: String,
    /// Absolute URL of the subject's portal page.
    pub html_page: String,
}

/// One of the four fixed marking periods a subject always owns.
///
/// Created together with the subject and never recreated; the portal serves
/// a page even for periods that have not started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradingPeriod {
    pub section_guid: String,
    /// Ordinal 1..=4.
    pub number: u8,
    pub html_page: String,
    pub total_points: String,
    pub possible_points: String,
    pub percent_grade: String,
    /// True when the period page currently lists no assignments. While set,
    /// the points/percent fields above are left as they were.
    pub empty: bool,
}

/// One graded item. The portal issues no assignment id, so the natural key
/// is (name, period number, subject name) and stays so across syncs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub name: String,
    pub subject_name: String,
    pub period_number: u8,
    pub total_points: String,
    pub possible_points: String,
    pub date: NaiveDate,
    /// Set when a later sync found any field differing from the stored one.
    pub had_changes: bool,
    /// Creation leaves this at the assignment date; a detected change moves
    /// it to the sync wall clock.
    pub date_updated: DateTime<Utc>,
}

impl Assignment {
    /// Timestamp a freshly scraped assignment starts with.
    #[must_use]
    pub fn initial_date_updated(date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc()
    }
}
