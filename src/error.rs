use thiserror::Error;

/// Failure taxonomy for one synchronization run.
///
/// An "empty grading period" is deliberately not here: it is a valid parse
/// outcome (`parse::period::PeriodPage::Empty`), not a failure.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Timeout, connection error or non-2xx status from the portal.
    #[error("network failure: {0}")]
    Network(String),

    /// Response bytes are not valid under the encoding the portal page uses.
    #[error("response is not decodable under the portal encoding")]
    UndecodableResponse,

    /// The payload carries no markup at all (empty body, bare text, ...).
    #[error("document is not parseable markup")]
    UnparseableDocument,

    /// The document parsed, but the nodes the portal layout guarantees are
    /// missing or misaligned.
    #[error("unexpected page shape: {0}")]
    UnexpectedPageShape(&'static str),

    /// A record the run itself created earlier came back missing. Not a
    /// portal condition; the store broke its read-after-write contract.
    #[error("store invariant violated: {0}")]
    StoreInconsistency(&'static str),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
