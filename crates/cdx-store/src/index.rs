use std::sync::Arc;

use cdx_format::Capture;
use rocksdb::{Direction, IteratorMode, WriteBatch, DB};

use crate::cf;
use crate::error::StoreError;

/// A predicate applied to every capture a query yields, materialized once
/// at [`crate::DataStore::open`] time and immutable thereafter (the
/// "oracle" filter of the distilled spec's §4.6).
pub type CaptureFilter = dyn Fn(&Capture) -> bool + Send + Sync;

/// A single named collection's API: query by canonical URL, and batched,
/// atomic ingestion. Holds a non-owning [`Arc`] onto the data store's
/// RocksDB handle; an `Index` cannot outlive the column families it reads
/// from (in practice, that means it cannot outlive the owning `DataStore`,
/// since both hold the same `Arc<DB>`).
#[derive(Clone)]
pub struct Index {
    db: Arc<DB>,
    name: String,
    capture_filter: Option<Arc<CaptureFilter>>,
}

impl Index {
    pub(crate) fn new(db: Arc<DB>, name: String, capture_filter: Option<Arc<CaptureFilter>>) -> Self {
        Index {
            db,
            name,
            capture_filter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn captures_cf(&self) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(&cf::captures_cf(&self.name))
            .ok_or_else(|| StoreError::MissingColumnFamily(cf::captures_cf(&self.name)))
    }

    fn alias_cf(&self) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(&cf::alias_cf(&self.name))
            .ok_or_else(|| StoreError::MissingColumnFamily(cf::alias_cf(&self.name)))
    }

    /// Resolves `urlkey` through the alias family, at most one hop (see the
    /// distilled spec's §4.4 "Alias non-transitivity"). A self-loop alias
    /// (`target == urlkey`) is treated as "no alias".
    pub fn resolve_alias(&self, urlkey: &str) -> Result<String, StoreError> {
        let alias_cf = self.alias_cf()?;
        match self.db.get_cf(alias_cf, urlkey.as_bytes())? {
            Some(target) => {
                let target = String::from_utf8_lossy(&target).into_owned();
                if target == urlkey {
                    Ok(urlkey.to_owned())
                } else {
                    Ok(target)
                }
            }
            None => Ok(urlkey.to_owned()),
        }
    }

    /// Streams every capture stored under `urlkey` (after alias
    /// resolution), in ascending `(timestamp, file, compressed_offset)`
    /// order. Dropping the returned iterator promptly releases the
    /// underlying RocksDB iterator.
    pub fn query(&self, urlkey: &str) -> Result<QueryIter<'_>, StoreError> {
        let effective = self.resolve_alias(urlkey)?;
        let cf = self.captures_cf()?;
        let prefix = Capture::key_prefix(&effective);
        let raw = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        Ok(QueryIter {
            raw,
            prefix,
            filter: self.capture_filter.clone(),
            done: false,
        })
    }

    /// Begins a new atomic ingestion batch. Writes staged on the batch are
    /// invisible to queries until [`Batch::commit`] returns; dropping the
    /// batch without committing discards everything staged on it.
    pub fn begin_update(&self) -> Batch {
        Batch::new(Arc::clone(&self.db), self.name.clone())
    }
}

/// Iterator over one collection's captures for a single canonical URL.
pub struct QueryIter<'a> {
    raw: rocksdb::DBIteratorWithThreadMode<'a, DB>,
    prefix: Vec<u8>,
    filter: Option<Arc<CaptureFilter>>,
    done: bool,
}

impl Iterator for QueryIter<'_> {
    type Item = Result<Capture, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.raw.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err.into()));
                }
                Some(Ok((key, value))) => {
                    if !key.starts_with(self.prefix.as_slice()) {
                        self.done = true;
                        return None;
                    }
                    match Capture::decode_row(&key, &value) {
                        Ok(capture) => {
                            if let Some(filter) = &self.filter {
                                if !filter(&capture) {
                                    continue;
                                }
                            }
                            return Some(Ok(capture));
                        }
                        Err(err) => {
                            self.done = true;
                            return Some(Err(err.into()));
                        }
                    }
                }
            }
        }
    }
}

/// An atomic group of ingestion writes (captures and aliases) for one
/// collection. Commits via a single `rocksdb::WriteBatch::write`, which is
/// RocksDB's linearization point: a query started after `commit` returns
/// sees all of this batch's writes, or none.
pub struct Batch {
    db: Arc<DB>,
    name: String,
    wb: WriteBatch,
    added: usize,
}

impl Batch {
    fn new(db: Arc<DB>, name: String) -> Self {
        Batch {
            db,
            name,
            wb: WriteBatch::default(),
            added: 0,
        }
    }

    /// Stages a capture write. Same key within one batch: later call wins
    /// (RocksDB's `WriteBatch` already provides this). Does not count
    /// towards the ingest response until `commit` succeeds.
    pub fn put_capture(&mut self, capture: &Capture) -> Result<(), StoreError> {
        let cf = self
            .db
            .cf_handle(&cf::captures_cf(&self.name))
            .ok_or_else(|| StoreError::MissingColumnFamily(cf::captures_cf(&self.name)))?;
        self.wb.put_cf(cf, capture.encode_key(), capture.encode_value());
        self.added += 1;
        Ok(())
    }

    /// Stages an alias write. A self-loop (`alias_surt == target_surt`) is
    /// accepted here and treated as "no alias" at query time, in
    /// [`Index::resolve_alias`].
    pub fn put_alias(&mut self, alias_surt: &str, target_surt: &str) -> Result<(), StoreError> {
        let cf = self
            .db
            .cf_handle(&cf::alias_cf(&self.name))
            .ok_or_else(|| StoreError::MissingColumnFamily(cf::alias_cf(&self.name)))?;
        self.wb.put_cf(cf, alias_surt.as_bytes(), target_surt.as_bytes());
        Ok(())
    }

    /// Number of capture records staged so far (aliases don't count).
    pub fn captures_staged(&self) -> usize {
        self.added
    }

    /// Atomically applies all staged writes. Consumes `self`, so "commit
    /// exactly once" is a compile-time property rather than a runtime
    /// check.
    pub fn commit(self) -> Result<usize, StoreError> {
        self.db.write(self.wb)?;
        Ok(self.added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataStore;

    fn sample(ts: u64) -> Capture {
        Capture {
            urlkey: "org,example)/".to_owned(),
            timestamp: ts,
            original: "http://example.org/".to_owned(),
            mimetype: "text/html".to_owned(),
            status: 200,
            digest: "sha1:AAA".to_owned(),
            redirecturl: String::new(),
            length: 1234,
            compressed_offset: 5678,
            file: "file.warc.gz".to_owned(),
        }
    }

    #[test]
    fn query_returns_captures_in_ascending_timestamp_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path(), None).unwrap();
        let index = store.get_index("c", true).unwrap().unwrap();

        let mut batch = index.begin_update();
        batch.put_capture(&sample(20200102000000)).unwrap();
        batch.put_capture(&sample(20200101000000)).unwrap();
        batch.commit().unwrap();

        let results: Vec<Capture> = index
            .query("org,example)/")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].timestamp, 20200101000000);
        assert_eq!(results[1].timestamp, 20200102000000);
    }

    #[test]
    fn query_only_returns_matching_urlkey() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path(), None).unwrap();
        let index = store.get_index("c", true).unwrap().unwrap();

        let mut other = sample(20200101000000);
        other.urlkey = "org,example)/other".to_owned();

        let mut batch = index.begin_update();
        batch.put_capture(&sample(20200101000000)).unwrap();
        batch.put_capture(&other).unwrap();
        batch.commit().unwrap();

        let results: Vec<Capture> = index
            .query("org,example)/")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].urlkey, "org,example)/");
    }

    #[test]
    fn dropped_batch_without_commit_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path(), None).unwrap();
        let index = store.get_index("c", true).unwrap().unwrap();

        {
            let mut batch = index.begin_update();
            batch.put_capture(&sample(20200101000000)).unwrap();
            // Dropped here without calling commit().
        }

        let results: Vec<Capture> = index
            .query("org,example)/")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn alias_resolves_one_hop_to_target_captures() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path(), None).unwrap();
        let index = store.get_index("c", true).unwrap().unwrap();

        let mut new_capture = sample(20200101000000);
        new_capture.urlkey = "org,example,new)/".to_owned();

        let mut batch = index.begin_update();
        batch
            .put_alias("org,example,old)/", "org,example,new)/")
            .unwrap();
        batch.put_capture(&new_capture).unwrap();
        batch.commit().unwrap();

        let results: Vec<Capture> = index
            .query("org,example,old)/")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].urlkey, "org,example,new)/");
    }

    #[test]
    fn self_loop_alias_behaves_as_no_alias() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path(), None).unwrap();
        let index = store.get_index("c", true).unwrap().unwrap();

        let mut batch = index.begin_update();
        batch
            .put_alias("org,example)/", "org,example)/")
            .unwrap();
        batch.put_capture(&sample(20200101000000)).unwrap();
        batch.commit().unwrap();

        let results: Vec<Capture> = index
            .query("org,example)/")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn commit_is_a_linearization_point_across_two_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(dir.path(), None).unwrap();
        let index = store.get_index("c", true).unwrap().unwrap();

        let mut first = index.begin_update();
        first.put_capture(&sample(20200101000000)).unwrap();
        first.commit().unwrap();

        assert_eq!(index.query("org,example)/").unwrap().count(), 1);

        let mut second = index.begin_update();
        second.put_capture(&sample(20200102000000)).unwrap();
        second.commit().unwrap();

        assert_eq!(index.query("org,example)/").unwrap().count(), 2);
    }

    #[test]
    fn data_store_level_filter_applies_to_every_query() {
        let dir = tempfile::tempdir().unwrap();
        let filter: Arc<CaptureFilter> = Arc::new(|c: &Capture| c.status != 404);
        let store = DataStore::open(dir.path(), Some(filter)).unwrap();
        let index = store.get_index("c", true).unwrap().unwrap();

        let mut missing = sample(20200101000000);
        missing.status = 404;

        let mut batch = index.begin_update();
        batch.put_capture(&sample(20200102000000)).unwrap();
        batch.put_capture(&missing).unwrap();
        batch.commit().unwrap();

        let results: Vec<Capture> = index
            .query("org,example)/")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, 200);
    }
}
