//! End-to-end synchronization: seed page → subjects → one concurrent fetch
//! per grading period → merge into the store → all-or-nothing settle.

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::join_all;

use crate::{
    error::SyncError,
    fetch::PageFetcher,
    model::{Assignment, GradingPeriod, Subject},
    parse::{course_list, period},
    portal,
    store::Store,
};

/// Counters for one successful run.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct SyncReport {
    pub subjects: usize,
    pub periods: usize,
    pub empty_periods: usize,
    pub assignments: usize,
    pub created: usize,
    pub changed: usize,
}

#[derive(Default)]
struct PeriodStats {
    empty: bool,
    assignments: usize,
    created: usize,
    changed: usize,
}

struct PeriodJob {
    subject_name: String,
    section_guid: String,
    number: u8,
    url: String,
}

pub struct SyncEngine<'a> {
    fetcher: &'a dyn PageFetcher,
    store: &'a dyn Store,
    base: String,
}

impl<'a> SyncEngine<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, store: &'a dyn Store) -> Self {
        Self {
            fetcher,
            store,
            base: portal::BASE.to_owned(),
        }
    }

    /// Overrides the portal origin (self-hosted instances, test servers).
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    /// Runs one synchronization for `student_id`.
    ///
    /// All-or-nothing: on any failure the staged writes are rolled back and
    /// the first recorded error is returned; on success everything commits
    /// at once. No retries, no mid-run cancellation.
    pub async fn run(&self, student_id: &str) -> Result<SyncReport, SyncError> {
        let started = std::time::Instant::now();
        match self.run_inner(student_id).await {
            Ok(report) => {
                self.store.commit().await;
                tracing::info!(
                    target: "sync",
                    "\x1b[36mcompleted in {:?}: {} subjects, {} periods ({} empty), {} assignments ({} new, {} changed)\x1b[0m",
                    started.elapsed(),
                    report.subjects,
                    report.periods,
                    report.empty_periods,
                    report.assignments,
                    report.created,
                    report.changed,
                );
                Ok(report)
            }
            Err(e) => {
                self.store.rollback().await;
                tracing::warn!(target: "sync", "\x1b[31mfailed in {:?}: {e}\x1b[0m", started.elapsed());
                Err(e)
            }
        }
    }

    async fn run_inner(&self, student_id: &str) -> Result<SyncReport, SyncError> {
        let seed_url = portal::course_list_url(&self.base, student_id);
        let bytes = self.fetcher.get(&seed_url).await?;
        let parsed = course_list::parse(&bytes, &self.base, student_id)?;
        tracing::info!(target: "sync", "course page: {} subjects", parsed.len());

        // Subjects merge serially before any period fetch: period identity
        // (URLs, keys) hangs off them.
        let mut jobs = Vec::with_capacity(parsed.len() * portal::PERIODS_PER_SUBJECT as usize);
        for row in &parsed {
            self.merge_subject(student_id, row).await;
            for (i, url) in row.period_pages.iter().enumerate() {
                jobs.push(PeriodJob {
                    subject_name: row.name.clone(),
                    section_guid: row.section_guid.clone(),
                    number: i as u8 + 1,
                    url: url.clone(),
                });
            }
        }

        // One fetch per period, all in flight together. `join_all` is the
        // pending-count barrier: every outcome is observed before the run
        // settles, failed or not. Only the first error is kept.
        let now = Utc::now();
        let outcomes = join_all(jobs.iter().map(|job| self.sync_period(job, now))).await;

        let mut report = SyncReport {
            subjects: parsed.len(),
            periods: jobs.len(),
            ..SyncReport::default()
        };
        let mut first_error = None;
        for outcome in outcomes {
            match outcome {
                Ok(stats) => {
                    report.empty_periods += usize::from(stats.empty);
                    report.assignments += stats.assignments;
                    report.created += stats.created;
                    report.changed += stats.changed;
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            None => Ok(report),
            Some(e) => Err(e),
        }
    }

    /// Creates the subject plus its four periods on first sight; on later
    /// syncs only the display attributes move, existing periods and
    /// assignments stay untouched.
    async fn merge_subject(&self, student_id: &str, row: &course_list::ParsedSubject) {
        let subject = match self.store.find_subject(&row.section_guid).await {
            Some(mut existing) => {
                existing.name.clone_from(&row.name);
                existing.teacher.clone_from(&row.teacher);
                existing.room.clone_from(&row.room);
                existing.html_page.clone_from(&row.html_page);
                existing
            }
            None => {
                for (i, url) in row.period_pages.iter().enumerate() {
                    self.store
                        .upsert_period(GradingPeriod {
                            section_guid: row.section_guid.clone(),
                            number: i as u8 + 1,
                            html_page: url.clone(),
                            total_points: String::new(),
                            possible_points: String::new(),
                            percent_grade: String::new(),
                            empty: false,
                        })
                        .await;
                }
                Subject {
                    student_id: student_id.to_owned(),
                    section_guid: row.section_guid.clone(),
                    name: row.name.clone(),
                    teacher: row.teacher.clone(),
                    room: row.room.clone(),
                    html_page: row.html_page.clone(),
                }
            }
        };
        self.store.upsert_subject(subject).await;
    }

    async fn sync_period(&self, job: &PeriodJob, now: DateTime<Utc>) -> Result<PeriodStats, SyncError> {
        // network failure: report it, do not touch the period
        let bytes = self.fetcher.get(&job.url).await?;
        let page = period::parse(&bytes)?;

        let Some(mut stored) = self.store.find_period(&job.section_guid, job.number).await else {
            // merge_subject ran first, so this only fires on a broken store
            return Err(SyncError::StoreInconsistency("grading period row missing"));
        };

        match page {
            period::PeriodPage::Empty => {
                tracing::debug!(target: "period", "{} MP{}: empty", job.subject_name, job.number);
                stored.empty = true;
                self.store.upsert_period(stored).await;
                Ok(PeriodStats {
                    empty: true,
                    ..PeriodStats::default()
                })
            }
            period::PeriodPage::Graded { totals, assignments } => {
                stored.empty = false;
                stored.total_points = totals.total_points;
                stored.possible_points = totals.possible_points;
                stored.percent_grade = totals.percent_grade;
                self.store.upsert_period(stored).await;

                let mut stats = PeriodStats {
                    assignments: assignments.len(),
                    ..PeriodStats::default()
                };
                for parsed in assignments {
                    self.merge_assignment(job, parsed, now, &mut stats).await?;
                }
                tracing::debug!(
                    target: "period",
                    "{} MP{}: {} assignments ({} new, {} changed)",
                    job.subject_name,
                    job.number,
                    stats.assignments,
                    stats.created,
                    stats.changed,
                );
                Ok(stats)
            }
        }
    }

    async fn merge_assignment(
        &self,
        job: &PeriodJob,
        parsed: period::ParsedAssignment,
        now: DateTime<Utc>,
        stats: &mut PeriodStats,
    ) -> Result<(), SyncError> {
        let date = NaiveDate::parse_from_str(parsed.date.trim(), "%m/%d/%y")
            .map_err(|_| SyncError::UnexpectedPageShape("assignment date is not MM/DD/YY"))?;

        let merged = match self
            .store
            .find_assignment(&parsed.name, job.number, &job.subject_name)
            .await
        {
            Some(mut existing) => {
                let differs = existing.total_points != parsed.total_points
                    || existing.possible_points != parsed.possible_points
                    || existing.date != date;
                existing.total_points = parsed.total_points;
                existing.possible_points = parsed.possible_points;
                existing.date = date;
                if differs {
                    existing.had_changes = true;
                    existing.date_updated = now;
                    stats.changed += 1;
                }
                existing
            }
            None => {
                stats.created += 1;
                Assignment {
                    name: parsed.name,
                    subject_name: job.subject_name.clone(),
                    period_number: job.number,
                    total_points: parsed.total_points,
                    possible_points: parsed.possible_points,
                    date,
                    had_changes: false,
                    date_updated: Assignment::initial_date_updated(date),
                }
            }
        };
        self.store.upsert_assignment(merged).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use bytes::Bytes;
    use chrono::NaiveDate;

    use super::*;
    use crate::store::MemoryStore;

    const TBASE: &str = "https://portal.test";
    const SID: &str = "77";

    enum Page {
        Html(String),
        NetworkFail,
    }

    #[derive(Default)]
    struct FixtureFetcher {
        pages: HashMap<String, Page>,
        hits: AtomicUsize,
    }

    impl FixtureFetcher {
        fn put(&mut self, url: String, html: String) {
            self.pages.insert(url, Page::Html(html));
        }

        fn fail(&mut self, url: String) {
            self.pages.insert(url, Page::NetworkFail);
        }

        fn hits(&self) -> usize {
            self.hits.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl PageFetcher for FixtureFetcher {
        async fn get(&self, url: &str) -> Result<Bytes, SyncError> {
            self.hits.fetch_add(1, Ordering::Relaxed);
            match self.pages.get(url) {
                Some(Page::Html(s)) => Ok(Bytes::from(s.clone())),
                Some(Page::NetworkFail) => {
                    Err(SyncError::Network("connection reset by fixture".into()))
                }
                None => Err(SyncError::Network(format!("no fixture for {url}"))),
            }
        }
    }

    fn p_url(section_guid: &str, number: u8) -> String {
        portal::period_url(TBASE, SID, section_guid, number)
    }

    fn course_html(rows: &[(&str, &str, &str, &str)]) -> String {
        let rows: String = rows
            .iter()
            .map(|(secid, name, teacher, room)| {
                format!(
                    r#"<tr><td><a href="/CommunityWebPortal/Backpack/StudentClassPage.cfm?RID=1&{secid}&x=y">{name} </a></td><td>{teacher}</td><td>P3</td><td>{room}</td></tr>"#
                )
            })
            .collect();
        format!(r#"<html><body><div id="contentPipe"><table>{rows}</table></div></body></html>"#)
    }

    fn graded_html(percent: &str, points: &str, rows: &[(&str, &str, &str, &str)]) -> String {
        let rows: String = rows
            .iter()
            .map(|(name, total, possible, date)| {
                format!(
                    "<tr><td>{name}</td><td>{total}</td><td>{possible}</td><td>{date}</td><td>cat</td><td>notes</td></tr>"
                )
            })
            .collect();
        format!(
            r#"<html><body><div id="assignmentFinalGrade"><b>Grade:</b> {percent} <b>Points:</b> {points} </div><table id="assignments">{rows}</table></body></html>"#
        )
    }

    fn empty_html() -> String {
        graded_html("%", "/", &[])
    }

    /// Two subjects, first period graded, the rest empty.
    fn default_fetcher() -> FixtureFetcher {
        let mut f = FixtureFetcher::default();
        f.put(
            portal::course_list_url(TBASE, SID),
            course_html(&[
                ("SECID=ABC123", "Algebra I", "Boyle", "204"),
                ("SECID=XYZ789", "Biology", "Finch", "117"),
            ]),
        );
        f.put(
            p_url("SECID=ABC123", 1),
            graded_html(
                "95.5%",
                "191/200",
                &[
                    ("HW 1", "10", "10", "01/05/26"),
                    ("Quiz 1", "18", "20", "01/12/26"),
                ],
            ),
        );
        f.put(
            p_url("SECID=XYZ789", 1),
            graded_html("88%", "88/100", &[("Lab 1", "44", "50", "01/08/26")]),
        );
        for secid in ["SECID=ABC123", "SECID=XYZ789"] {
            for n in 2..=4 {
                f.put(p_url(secid, n), empty_html());
            }
        }
        f
    }

    async fn run(fetcher: &FixtureFetcher, store: &MemoryStore) -> Result<SyncReport, SyncError> {
        SyncEngine::new(fetcher, store)
            .with_base(TBASE)
            .run(SID)
            .await
    }

    #[tokio::test]
    async fn first_run_creates_subjects_periods_and_assignments() {
        let fetcher = default_fetcher();
        let store = MemoryStore::new();

        let report = run(&fetcher, &store).await.unwrap();
        assert_eq!(report.subjects, 2);
        assert_eq!(report.periods, 8);
        assert_eq!(report.empty_periods, 6);
        assert_eq!(report.assignments, 3);
        assert_eq!(report.created, 3);
        assert_eq!(report.changed, 0);

        assert_eq!(store.subjects().len(), 2);
        assert_eq!(store.periods().len(), 8);
        assert_eq!(store.assignments().len(), 3);

        let hw = store
            .find_assignment("HW 1", 1, "Algebra I")
            .await
            .unwrap();
        assert!(!hw.had_changes);
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(hw.date, date);
        assert_eq!(hw.date_updated, Assignment::initial_date_updated(date));

        let mp1 = store.find_period("SECID=ABC123", 1).await.unwrap();
        assert_eq!(mp1.percent_grade, "95.5%");
        assert_eq!(mp1.total_points, "191");
        assert_eq!(mp1.possible_points, "200");
        assert!(!mp1.empty);
    }

    #[tokio::test]
    async fn empty_periods_get_flagged_and_keep_their_points() {
        let fetcher = default_fetcher();
        let store = MemoryStore::new();
        run(&fetcher, &store).await.unwrap();

        let mp2 = store.find_period("SECID=ABC123", 2).await.unwrap();
        assert!(mp2.empty);
        assert_eq!(mp2.percent_grade, "");
        assert_eq!(mp2.total_points, "");
    }

    #[tokio::test]
    async fn unchanged_portal_state_syncs_idempotently() {
        let store = MemoryStore::new();
        run(&default_fetcher(), &store).await.unwrap();
        let before = store.assignments();

        let report = run(&default_fetcher(), &store).await.unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.changed, 0);

        let mut after = store.assignments();
        assert!(after.iter().all(|a| !a.had_changes));
        let key = |a: &Assignment| (a.name.clone(), a.period_number, a.subject_name.clone());
        let mut before = before;
        before.sort_by_key(key);
        after.sort_by_key(key);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn changed_points_flip_the_flag_and_refresh_the_timestamp() {
        let store = MemoryStore::new();
        run(&default_fetcher(), &store).await.unwrap();

        let mut fetcher = default_fetcher();
        fetcher.put(
            p_url("SECID=ABC123", 1),
            graded_html(
                "95.5%",
                "191/195",
                &[
                    ("HW 1", "10", "9.5", "01/05/26"),
                    ("Quiz 1", "18", "20", "01/12/26"),
                ],
            ),
        );
        let run_started = Utc::now();
        let report = run(&fetcher, &store).await.unwrap();
        assert_eq!(report.changed, 1);
        assert_eq!(report.created, 0);

        let hw = store
            .find_assignment("HW 1", 1, "Algebra I")
            .await
            .unwrap();
        assert!(hw.had_changes);
        assert_eq!(hw.possible_points, "9.5");
        assert!(hw.date_updated >= run_started);

        let quiz = store
            .find_assignment("Quiz 1", 1, "Algebra I")
            .await
            .unwrap();
        assert!(!quiz.had_changes);
    }

    #[tokio::test]
    async fn one_network_failure_rolls_back_the_whole_run() {
        let store = MemoryStore::new();
        run(&default_fetcher(), &store).await.unwrap();
        let subjects_before = store.subjects().len();
        let hw_before = store.find_assignment("HW 1", 1, "Algebra I").await.unwrap();

        // same portal state except one dead period page and a grade change
        // that must not survive the rollback
        let mut fetcher = default_fetcher();
        fetcher.put(
            p_url("SECID=ABC123", 1),
            graded_html(
                "90%",
                "180/200",
                &[
                    ("HW 1", "5", "10", "01/05/26"),
                    ("Quiz 1", "18", "20", "01/12/26"),
                ],
            ),
        );
        fetcher.fail(p_url("SECID=XYZ789", 3));

        let err = run(&fetcher, &store).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));

        assert_eq!(store.subjects().len(), subjects_before);
        let hw_after = store.find_assignment("HW 1", 1, "Algebra I").await.unwrap();
        assert_eq!(hw_after, hw_before);
        let mp1 = store.find_period("SECID=ABC123", 1).await.unwrap();
        assert_eq!(mp1.percent_grade, "95.5%");
    }

    #[tokio::test]
    async fn failed_first_run_leaves_the_store_untouched() {
        let mut fetcher = default_fetcher();
        fetcher.fail(p_url("SECID=ABC123", 2));
        let store = MemoryStore::new();

        assert!(run(&fetcher, &store).await.is_err());
        assert!(store.subjects().is_empty());
        assert!(store.periods().is_empty());
        assert!(store.assignments().is_empty());
    }

    #[tokio::test]
    async fn every_period_fetch_is_observed_before_the_run_settles() {
        let fetcher = default_fetcher();
        let store = MemoryStore::new();
        run(&fetcher, &store).await.unwrap();

        // seed page + 8 period pages
        assert_eq!(fetcher.hits(), 9);
        // and every period shows the outcome of its own fetch
        for period in store.periods() {
            assert!(period.empty || !period.percent_grade.is_empty());
        }
    }

    #[tokio::test]
    async fn failures_do_not_short_circuit_the_barrier() {
        let mut fetcher = default_fetcher();
        fetcher.fail(p_url("SECID=ABC123", 2));
        fetcher.fail(p_url("SECID=XYZ789", 4));
        let store = MemoryStore::new();

        let err = run(&fetcher, &store).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(fetcher.hits(), 9);
    }

    #[tokio::test]
    async fn period_parse_failure_fails_the_run() {
        let mut fetcher = default_fetcher();
        fetcher.put(p_url("SECID=XYZ789", 2), "not markup at all".to_owned());
        let store = MemoryStore::new();

        let err = run(&fetcher, &store).await.unwrap_err();
        assert!(matches!(err, SyncError::UnparseableDocument));
        assert!(store.subjects().is_empty());
    }

    #[tokio::test]
    async fn course_page_failure_fails_before_any_period_fetch() {
        let mut fetcher = default_fetcher();
        fetcher.fail(portal::course_list_url(TBASE, SID));
        let store = MemoryStore::new();

        let err = run(&fetcher, &store).await.unwrap_err();
        assert!(matches!(err, SyncError::Network(_)));
        assert_eq!(fetcher.hits(), 1);
    }

    /// Store double that violates read-after-write for periods.
    struct PeriodlessStore(MemoryStore);

    #[async_trait]
    impl Store for PeriodlessStore {
        async fn find_subject(&self, section_guid: &str) -> Option<Subject> {
            self.0.find_subject(section_guid).await
        }

        async fn find_period(&self, _: &str, _: u8) -> Option<GradingPeriod> {
            None
        }

        async fn find_assignment(
            &self,
            name: &str,
            period_number: u8,
            subject_name: &str,
        ) -> Option<Assignment> {
            self.0.find_assignment(name, period_number, subject_name).await
        }

        async fn upsert_subject(&self, subject: Subject) {
            self.0.upsert_subject(subject).await;
        }

        async fn upsert_period(&self, period: GradingPeriod) {
            self.0.upsert_period(period).await;
        }

        async fn upsert_assignment(&self, assignment: Assignment) {
            self.0.upsert_assignment(assignment).await;
        }

        async fn commit(&self) {
            self.0.commit().await;
        }

        async fn rollback(&self) {
            self.0.rollback().await;
        }
    }

    #[tokio::test]
    async fn a_store_that_loses_period_rows_fails_as_inconsistent() {
        let fetcher = default_fetcher();
        let store = PeriodlessStore(MemoryStore::new());

        let err = SyncEngine::new(&fetcher, &store)
            .with_base(TBASE)
            .run(SID)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::StoreInconsistency(_)));
        // never surfaced as a portal condition, and nothing committed
        assert!(store.0.subjects().is_empty());
    }

    #[tokio::test]
    async fn resynced_subjects_update_display_attributes_in_place() {
        let store = MemoryStore::new();
        run(&default_fetcher(), &store).await.unwrap();

        let mut fetcher = default_fetcher();
        fetcher.put(
            portal::course_list_url(TBASE, SID),
            course_html(&[
                ("SECID=ABC123", "Algebra I", "Substitute", "110"),
                ("SECID=XYZ789", "Biology", "Finch", "117"),
            ]),
        );
        let report = run(&fetcher, &store).await.unwrap();
        assert_eq!(report.created, 0);

        let algebra = store.find_subject("SECID=ABC123").await.unwrap();
        assert_eq!(algebra.teacher, "Substitute");
        assert_eq!(algebra.room, "110");
        // history untouched
        assert_eq!(store.periods().len(), 8);
        assert_eq!(store.assignments().len(), 3);
    }
}
