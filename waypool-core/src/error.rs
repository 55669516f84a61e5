use serde::Serialize;

/// The four-way split the transport needs: which failures are the caller's
/// fault, which are expected business outcomes, which are illegal-state
/// attempts, and which are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Malformed input, rejected before the store is touched.
    Validation,
    /// Expected business outcome (seats taken, duplicate booking). Never
    /// retried automatically.
    Conflict,
    /// Illegal-transition attempt (booking on a cancelled trip, editing a
    /// departed one).
    InvalidState,
    NotFound,
    Forbidden,
    /// Store outage or exhausted commit retries. Safe for the caller to try
    /// again.
    Transient,
}

/// Implemented by every domain error so the HTTP layer can map category to
/// status code without matching each variant.
pub trait Categorized {
    fn category(&self) -> ErrorCategory;
}
