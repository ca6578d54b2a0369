//! Page parsers, one per portal page kind.
//!
//! Both take raw response bytes: the decoding step belongs to the parser
//! because the two page kinds use different encodings.

use crate::error::SyncError;

pub mod course_list;
pub mod period;

/// The course-listing page is served in the portal's narrow encoding; any
/// byte outside ASCII means we got something else entirely.
pub(crate) fn decode_ascii(bytes: &[u8]) -> Result<&str, SyncError> {
    if !bytes.is_ascii() {
        return Err(SyncError::UndecodableResponse);
    }
    core::str::from_utf8(bytes).map_err(|_| SyncError::UndecodableResponse)
}

pub(crate) fn decode_utf8(bytes: &[u8]) -> Result<&str, SyncError> {
    core::str::from_utf8(bytes).map_err(|_| SyncError::UndecodableResponse)
}
