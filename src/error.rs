//! Error codes shared by every layer that surfaces failures over HTTP.

/// Stable machine-readable code for an error, plus a retry hint for clients.
///
/// The orchestrator itself never retries; `retryable` only tells the caller
/// whether re-issuing the same action could succeed.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
