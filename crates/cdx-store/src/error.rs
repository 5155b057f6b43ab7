use cdx_format::MalformedRecord;

/// Errors surfaced by the data store and per-collection indexes.
///
/// Mirrors the teacher's layered approach to RocksDB-backed errors (see
/// `derive::registers::Error`): the KV engine's own error type is wrapped
/// with `#[from]`, and higher-level local errors get their own variants so
/// callers can match without string-sniffing.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("RocksDB error: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("malformed ingestion record: {0}")]
    Malformed(#[from] MalformedRecord),

    #[error("unknown collection {0:?}")]
    UnknownCollection(String),

    #[error("column family {0:?} is missing from an open collection; the data directory may be corrupt")]
    MissingColumnFamily(String),
}
