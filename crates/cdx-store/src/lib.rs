//! The capture index: a RocksDB-backed ordered key/value store over
//! canonical URL keys, with per-collection batched ingestion and
//! alias resolution.
//!
//! This crate knows about RocksDB and about [`cdx_format::Capture`], but
//! nothing about HTTP or access control — those live in `cdx-server` and
//! `cdx-access` respectively, composed on top of the iterators this crate
//! produces.

mod cf;
mod error;
mod index;
mod store;

pub use cf::{access_policies_cf, access_rules_cf, alias_cf, captures_cf};
pub use error::StoreError;
pub use index::{Batch, CaptureFilter, Index, QueryIter};
pub use store::DataStore;
