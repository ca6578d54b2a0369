//! Thin extraction layer over [`scraper`].
//!
//! Parsers name their selectors as `LazyLock<Selector>` constants and pull
//! matches through [`extract`]/[`extract_one`]; nothing here knows about the
//! portal layout. Zero matches is an empty sequence, a payload without any
//! markup is [`SyncError::UnparseableDocument`] — the two are different
//! conditions and never conflated.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::error::SyncError;

static ANY_CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("head > *, body > *").unwrap());

/// Parses decoded text into a document.
///
/// The HTML5 tree builder recovers from any input, so "unparseable" here
/// means the recovered tree holds no element content beyond the implicit
/// `html`/`head`/`body` scaffolding: an empty body or a plain-text payload.
pub fn parse_document(text: &str) -> Result<Html, SyncError> {
    let doc = Html::parse_document(text);
    if doc.select(&ANY_CONTENT).next().is_none() {
        return Err(SyncError::UnparseableDocument);
    }
    Ok(doc)
}

/// All matches of `selector` in document order. `attr` switches between the
/// element's full text and one attribute value.
#[must_use]
pub fn extract(doc: &Html, selector: &Selector, attr: Option<&str>) -> Vec<String> {
    doc.select(selector)
        .map(|el| match attr {
            Some(name) => el.attr(name).unwrap_or_default().to_owned(),
            None => el.text().collect(),
        })
        .collect()
}

/// First match of `selector`, or `None`.
#[must_use]
pub fn extract_one<'a>(doc: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    doc.select(selector).next()
}

/// Nearest text node among the element's following siblings.
///
/// Stands in for the original layout's "text right after this `<b>` label"
/// lookup inside the final-grade summary block.
#[must_use]
pub fn text_following(el: ElementRef<'_>) -> Option<String> {
    el.next_siblings()
        .find_map(|node| node.value().as_text().map(|t| t.to_string()))
}
