//! Parser for the course-listing page, the seed of every run.
//!
//! Rows carrying the `classNotGraded` marker are skipped everywhere; the
//! remaining link, teacher and room columns are extracted as parallel lists
//! and must stay aligned.

use std::sync::LazyLock;

use scraper::Selector;

use crate::{error::SyncError, extract, portal};

/// Link cell of every graded course row.
static COURSE_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#contentPipe table tr:not(.classNotGraded) td a").unwrap());

/// Teacher column (second cell) of the same rows.
static TEACHER_CELLS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#contentPipe table tr:not(.classNotGraded) td:nth-child(2)").unwrap()
});

/// Room column (fourth cell) of the same rows.
static ROOM_CELLS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#contentPipe table tr:not(.classNotGraded) td:nth-child(4)").unwrap()
});

/// One course row, with its four marking-period page URLs already derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSubject {
    pub name: String,
    pub teacher: String,
    pub room: String,
    /// Verbatim `SECID=...` query fragment; the subject's natural key.
    pub section_guid: String,
    pub html_page: String,
    pub period_pages: [String; 4],
}

/// Parses the course page into subjects.
///
/// Zero course links is a failure, not an empty result: an authenticated
/// student always has a populated course table, so a linkless page means we
/// are looking at something else (an expired session, usually).
pub fn parse(
    bytes: &[u8],
    base: &str,
    student_id: &str,
) -> Result<Vec<ParsedSubject>, SyncError> {
    let text = super::decode_ascii(bytes)?;
    let doc = extract::parse_document(text)?;

    let mut subjects = Vec::new();
    for link in doc.select(&COURSE_LINKS) {
        let Some(href) = link.attr("href") else {
            return Err(SyncError::UnexpectedPageShape("course link without href"));
        };
        // the section token sits at a fixed position in the query string
        let Some(section_guid) = href.split('&').nth(1) else {
            return Err(SyncError::UnexpectedPageShape(
                "course link without a section token",
            ));
        };

        // the portal emits exactly one stray character after the name
        let mut name: String = link.text().collect();
        name.pop();

        let period_pages = core::array::from_fn(|i| {
            portal::period_url(base, student_id, section_guid, i as u8 + 1)
        });

        subjects.push(ParsedSubject {
            name,
            teacher: String::new(),
            room: String::new(),
            section_guid: section_guid.to_owned(),
            html_page: portal::subject_url(base, href),
            period_pages,
        });
    }

    if subjects.is_empty() {
        return Err(SyncError::UnexpectedPageShape("no course rows"));
    }

    let teachers = extract::extract(&doc, &TEACHER_CELLS, None);
    let rooms = extract::extract(&doc, &ROOM_CELLS, None);
    if teachers.len() != subjects.len() || rooms.len() != subjects.len() {
        return Err(SyncError::UnexpectedPageShape(
            "teacher/room columns misaligned with course links",
        ));
    }
    for ((subject, teacher), room) in subjects.iter_mut().zip(teachers).zip(rooms) {
        subject.teacher = teacher;
        subject.room = room;
    }

    Ok(subjects)
}
