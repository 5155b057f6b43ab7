//! Access control: per-collection policies and SURT-prefix rules, indexed
//! in a radix trie for longest-prefix-match lookup, persisted alongside
//! the capture index in the same RocksDB database.

mod error;
mod model;
mod store;

pub use error::AccessError;
pub use model::{AccessPolicy, AccessRule, DateWindow, RelativeWindow};
pub use store::AccessStore;
