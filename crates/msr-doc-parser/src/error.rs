use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors produced while extracting register metadata from a manual dump.
///
/// [`ParseError::MalformedBitRange`] is recoverable: the extractors log it and skip the offending
/// table row. [`ParseError::BrokenAddressContinuation`] aborts the parse of the current document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed bit range {token:?}")]
    MalformedBitRange { token: String },

    #[error("line {line_no}: expected the continuation of wrapped address {pending:?}")]
    BrokenAddressContinuation { line_no: usize, pending: String },

    #[error("unknown vendor {0:?} (expected \"amd\" or \"intel\")")]
    UnknownVendor(String),
}
