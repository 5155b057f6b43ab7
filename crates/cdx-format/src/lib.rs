//! Wire and on-disk encodings shared by the whole archive: SURT
//! canonicalization, the CDX-11 text format, and the binary key/value
//! layout captures are stored under in the index.
//!
//! This crate has no knowledge of RocksDB or HTTP; it is pure codec logic,
//! so that `cdx-store` and `cdx-server` can each depend on it without
//! pulling in the other's concerns.

mod canon;
mod capture;
mod error;

pub use canon::surt_canonicalize;
pub use capture::{parse_ingest_line, Capture, IngestLine};
pub use error::MalformedRecord;
