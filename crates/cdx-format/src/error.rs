/// Errors raised while parsing or decoding CDX records and directives.
///
/// These are local to a single line or row; nothing here reaches across an
/// ingestion batch (that bookkeeping lives in `cdx-store`).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("expected 11 space-delimited CDX fields, found {found}")]
    WrongArity { found: usize },

    #[error("field {field} is not a valid integer: {value:?}")]
    BadInteger { field: &'static str, value: String },

    #[error("@alias directive must have exactly 3 tokens, found {found}")]
    BadAlias { found: usize },

    #[error("urlkey must not contain whitespace: {0:?}")]
    UrlkeyContainsSpace(String),

    #[error("row key is too short to contain urlkey, timestamp, file and offset")]
    TruncatedKey,

    #[error("row value is truncated or has a malformed length prefix")]
    TruncatedValue,

    #[error("row value is not valid UTF-8: {0}")]
    Utf8(String),
}
