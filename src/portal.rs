//! URL templates for the three portal page kinds.
//!
//! The portal exposes no API; every page is reachable through these fixed
//! templates, so a whole sync derives all of its URLs from one student id.

use core::time::Duration;

/// Production portal origin.
pub const BASE: &str = "https://pamet-sapphire.k12system.com";

/// Per-request timeout; a timeout counts as a network failure.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Number of marking periods every subject owns, graded or not.
pub const PERIODS_PER_SUBJECT: u8 = 4;

/// Course-listing page for one student (the seed page of a run).
#[must_use]
pub fn course_list_url(base: &str, student_id: &str) -> String {
    format!("{base}/CommunityWebPortal/Backpack/StudentClasses.cfm?STUDENT_RID={student_id}")
}

/// Absolute subject page URL from the root-relative `href` on the course row.
#[must_use]
pub fn subject_url(base: &str, href: &str) -> String {
    format!("{base}{href}")
}

/// Grading-period page. `section_guid` is the verbatim `SECID=...` query
/// fragment, so it splices into the query string as-is.
#[must_use]
pub fn period_url(base: &str, student_id: &str, section_guid: &str, number: u8) -> String {
    format!(
        "{base}/CommunityWebPortal/Backpack/StudentClassGrades.cfm?STUDENT_RID={student_id}&{section_guid}&MP_CODE={number}"
    )
}
