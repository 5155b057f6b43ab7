use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("rocksdb error: {0}")]
    Rocks(#[from] rocksdb::Error),

    #[error("malformed access record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("missing column family: {0}")]
    MissingColumnFamily(String),

    #[error("unknown policy id {0}")]
    UnknownPolicy(u64),

    #[error("unknown rule id {0}")]
    UnknownRule(u64),

    #[error("rule references unknown policy id {0}")]
    DanglingPolicyRef(u64),
}
