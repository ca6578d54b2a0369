//! Parser for one grading-period page.
//!
//! The final-grade summary is read first: a percent field that sanitizes to
//! a bare `%` means the period has not been graded yet and the rest of the
//! page is ignored. Assignment rows are the `#assignments` table rows with
//! exactly six `td` cells; single-cell description rows interleave with
//! them and are skipped.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use crate::{error::SyncError, extract};

static FINAL_GRADE_LABELS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#assignmentFinalGrade b").unwrap());

static ASSIGNMENT_ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#assignments tr").unwrap());

// keep-only scrubbers for the portal's free-form grade text
static NON_PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9.%]+").unwrap());
static NON_FRACTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9./]+").unwrap());
// `+`, `*`, `e`, `x` survive: in-progress, extra-credit and excused markers
static NON_EARNED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9.+*ex]+").unwrap());
static NON_POSSIBLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9.]+").unwrap());

/// One assignment row. Points stay sanitized strings; the date stays the
/// raw `MM/DD/YY` cell text and is parsed at merge time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAssignment {
    pub name: String,
    pub total_points: String,
    pub possible_points: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodTotals {
    pub total_points: String,
    pub possible_points: String,
    pub percent_grade: String,
}

/// Outcome of parsing a period page. `Empty` is a valid terminal outcome,
/// distinct from every [`SyncError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodPage {
    /// No assignments yet; the caller flags the period and moves on.
    Empty,
    Graded {
        totals: PeriodTotals,
        assignments: Vec<ParsedAssignment>,
    },
}

pub fn parse(bytes: &[u8]) -> Result<PeriodPage, SyncError> {
    let text = super::decode_utf8(bytes)?;
    let doc = extract::parse_document(text)?;

    let mut labels = doc.select(&FINAL_GRADE_LABELS);
    let Some(percent_raw) = labels.next().and_then(extract::text_following) else {
        return Err(SyncError::UnexpectedPageShape("final grade percent missing"));
    };
    let percent_grade = NON_PERCENT.replace_all(&percent_raw, "").into_owned();
    if percent_grade == "%" {
        // ungraded periods render the summary with the symbol alone
        return Ok(PeriodPage::Empty);
    }

    let Some(points_raw) = labels.next().and_then(extract::text_following) else {
        return Err(SyncError::UnexpectedPageShape("final grade points missing"));
    };
    let points = NON_FRACTION.replace_all(&points_raw, "").into_owned();
    let Some((total_points, possible_points)) = points.split_once('/') else {
        return Err(SyncError::UnexpectedPageShape(
            "final grade points is not an earned/possible pair",
        ));
    };

    let rows: Vec<_> = doc
        .select(&ASSIGNMENT_ROWS)
        .filter(|row| cells(row).len() == 6)
        .collect();

    let names = column(&rows, 0, None);
    let totals = column(&rows, 1, Some(&NON_EARNED));
    let possibles = column(&rows, 2, Some(&NON_POSSIBLE));
    let dates = column(&rows, 3, None);
    if names.len() != totals.len() || names.len() != possibles.len() || names.len() != dates.len()
    {
        return Err(SyncError::UnexpectedPageShape(
            "assignment columns misaligned",
        ));
    }

    if names.is_empty() {
        // a summary with digits but no rows is inconsistent; the safe
        // reading is an ungraded period
        return Ok(PeriodPage::Empty);
    }

    let assignments = names
        .into_iter()
        .zip(totals)
        .zip(possibles)
        .zip(dates)
        .map(|(((name, total_points), possible_points), date)| ParsedAssignment {
            name,
            total_points,
            possible_points,
            date,
        })
        .collect();

    Ok(PeriodPage::Graded {
        totals: PeriodTotals {
            total_points: total_points.to_owned(),
            possible_points: possible_points.to_owned(),
            percent_grade,
        },
        assignments,
    })
}

/// `td` children of a row, in order. Non-cell children (stray scripts and
/// the like) do not count toward the six-cell row predicate.
fn cells<'a>(row: &ElementRef<'a>) -> Vec<ElementRef<'a>> {
    row.child_elements()
        .filter(|el| el.value().name() == "td")
        .collect()
}

/// Text of the `idx`-th cell, for every row. A row missing that cell drops
/// out here, which the caller catches as a column-length mismatch instead
/// of silently truncating.
fn column(rows: &[ElementRef<'_>], idx: usize, scrub: Option<&Regex>) -> Vec<String> {
    rows.iter()
        .filter_map(|row| {
            let text: String = cells(row).get(idx)?.text().collect();
            Some(match scrub {
                Some(re) => re.replace_all(&text, "").into_owned(),
                None => text,
            })
        })
        .collect()
}
