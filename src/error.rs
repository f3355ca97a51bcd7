//! Shared error classification.
//!
//! DESIGN
//! ======
//! Every typed error in the crate carries a grepable code and a retryable
//! flag. The public compile surface flattens errors into strings, so these
//! codes only surface in structured log fields.

/// Grepable error code and retryable flag for structured logging.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}
