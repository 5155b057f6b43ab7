use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use cdx_format::Capture;
use radix_trie::{Trie, TrieCommon};
use rocksdb::{IteratorMode, WriteBatch, DB};
use tracing::{debug, info};

use crate::error::AccessError;
use crate::model::{AccessPolicy, AccessRule};

const SENTINEL: u8 = b'(';

fn trie_key(surt: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(surt.len() + 1);
    key.push(SENTINEL);
    key.extend_from_slice(surt.as_bytes());
    key
}

struct Shared {
    rules: HashMap<u64, AccessRule>,
    trie: Trie<Vec<u8>, Vec<u64>>,
}

impl Shared {
    fn index_rule(&mut self, rule: &AccessRule) {
        for surt in &rule.surts {
            let key = trie_key(surt);
            let mut ids = self.trie.get(&key).cloned().unwrap_or_default();
            if !ids.contains(&rule.id) {
                ids.push(rule.id);
                self.trie.insert(key, ids);
            }
        }
    }

    fn unindex_rule(&mut self, rule: &AccessRule) {
        for surt in &rule.surts {
            let key = trie_key(surt);
            if let Some(mut ids) = self.trie.get(&key).cloned() {
                ids.retain(|id| *id != rule.id);
                if ids.is_empty() {
                    self.trie.remove(&key);
                } else {
                    self.trie.insert(key, ids);
                }
            }
        }
    }
}

/// The access-control store for one collection: a prefix (SURT) index of
/// rules backed by two RocksDB column families, `X.access.rules` and
/// `X.access.policies`. Reads take a read lock over an in-memory mirror of
/// both tables; every mutation is serialized through that same lock so a
/// concurrent reader never observes a rule half removed and half
/// reinserted.
#[derive(Clone)]
pub struct AccessStore {
    inner: Arc<Inner>,
}

struct Inner {
    db: Arc<DB>,
    rules_cf: String,
    policies_cf: String,
    shared: RwLock<Shared>,
    policies: RwLock<HashMap<u64, AccessPolicy>>,
    next_rule_id: AtomicU64,
    next_policy_id: AtomicU64,
}

impl AccessStore {
    /// Opens the access store for `collection` against an already-open
    /// database, loading existing rules and policies and rebuilding the
    /// in-memory prefix index. Seeds the three default policies
    /// (`Public`, `Staff Only`, `No Access`) the first time a collection
    /// is opened with none.
    pub fn open(db: Arc<DB>, rules_cf: String, policies_cf: String) -> Result<AccessStore, AccessError> {
        let rules = load_rules(&db, &rules_cf)?;
        let mut policies = load_policies(&db, &policies_cf)?;

        let next_rule_id = rules.keys().copied().max().unwrap_or(0) + 1;
        let mut next_policy_id = policies.keys().copied().max().unwrap_or(0) + 1;

        if policies.is_empty() {
            for policy in default_policies(&mut next_policy_id) {
                persist_policy(&db, &policies_cf, &policy)?;
                policies.insert(policy.id, policy);
            }
            info!(collection_policies_cf = %policies_cf, "seeded default access policies");
        }

        let mut shared = Shared {
            rules: HashMap::new(),
            trie: Trie::new(),
        };
        for rule in rules.into_values() {
            shared.index_rule(&rule);
            shared.rules.insert(rule.id, rule);
        }

        Ok(AccessStore {
            inner: Arc::new(Inner {
                db,
                rules_cf,
                policies_cf,
                shared: RwLock::new(shared),
                policies: RwLock::new(policies),
                next_rule_id: AtomicU64::new(next_rule_id),
                next_policy_id: AtomicU64::new(next_policy_id),
            }),
        })
    }

    pub fn list_policies(&self) -> Vec<AccessPolicy> {
        let mut policies: Vec<AccessPolicy> = self.inner.policies.read().unwrap().values().cloned().collect();
        policies.sort_by_key(|p| p.id);
        policies
    }

    pub fn policy(&self, id: u64) -> Option<AccessPolicy> {
        self.inner.policies.read().unwrap().get(&id).cloned()
    }

    pub fn put_policy(&self, name: String, access_points: Vec<String>) -> Result<AccessPolicy, AccessError> {
        let id = self.inner.next_policy_id.fetch_add(1, Ordering::SeqCst);
        let policy = AccessPolicy { id, name, access_points };
        persist_policy(&self.inner.db, &self.inner.policies_cf, &policy)?;
        self.inner.policies.write().unwrap().insert(id, policy.clone());
        Ok(policy)
    }

    /// Inserts a new rule, or replaces an existing one if `rule.id` is
    /// already known. The whole remove-then-reinsert sequence runs under
    /// one write guard, so readers never see a transiently half-applied
    /// update.
    pub fn put_rule(&self, mut rule: AccessRule) -> Result<AccessRule, AccessError> {
        if !self.inner.policies.read().unwrap().contains_key(&rule.policy_id) {
            return Err(AccessError::DanglingPolicyRef(rule.policy_id));
        }

        let mut shared = self.inner.shared.write().unwrap();
        if rule.id == 0 {
            rule.id = self.inner.next_rule_id.fetch_add(1, Ordering::SeqCst);
        } else if let Some(old) = shared.rules.get(&rule.id).cloned() {
            shared.unindex_rule(&old);
        }

        persist_rule(&self.inner.db, &self.inner.rules_cf, &rule)?;
        shared.index_rule(&rule);
        shared.rules.insert(rule.id, rule.clone());
        debug!(rule_id = rule.id, policy_id = rule.policy_id, "stored access rule");
        Ok(rule)
    }

    pub fn delete_rule(&self, id: u64) -> Result<(), AccessError> {
        let mut shared = self.inner.shared.write().unwrap();
        let rule = shared.rules.remove(&id).ok_or(AccessError::UnknownRule(id))?;
        shared.unindex_rule(&rule);
        let cf = self
            .inner
            .db
            .cf_handle(&self.inner.rules_cf)
            .ok_or_else(|| AccessError::MissingColumnFamily(self.inner.rules_cf.clone()))?;
        self.inner.db.delete_cf(&cf, id.to_be_bytes())?;
        Ok(())
    }

    /// All rules any of whose stored SURT prefixes is a prefix of `surt`,
    /// regardless of whether their date predicates currently apply.
    pub fn rules_for_surt(&self, surt: &str) -> Vec<AccessRule> {
        let shared = self.inner.shared.read().unwrap();
        let full_key = trie_key(surt);
        let mut ids: Vec<u64> = Vec::new();
        for len in 1..=full_key.len() {
            if let Some(matched) = shared.trie.get(&full_key[..len].to_vec()) {
                ids.extend(matched.iter().copied());
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter().filter_map(|id| shared.rules.get(&id).cloned()).collect()
    }

    /// The single most specific rule that both prefix-matches and
    /// date-matches `capture` at `access_time`: longest matching SURT
    /// prefix wins, ties broken by highest rule id (the most recently
    /// inserted rule at that prefix).
    pub fn rule_for_capture(&self, capture: &Capture, access_time: DateTime<Utc>) -> Option<AccessRule> {
        let shared = self.inner.shared.read().unwrap();
        let full_key = trie_key(&capture.urlkey);

        let mut best: Option<(usize, u64, AccessRule)> = None;
        for len in 1..=full_key.len() {
            let Some(ids) = shared.trie.get(&full_key[..len].to_vec()) else {
                continue;
            };
            for &id in ids {
                let Some(rule) = shared.rules.get(&id) else { continue };
                if !rule.applies_to(capture, access_time) {
                    continue;
                }
                let candidate = (len, id);
                let replace = match &best {
                    None => true,
                    Some((blen, bid, _)) => candidate > (*blen, *bid),
                };
                if replace {
                    best = Some((len, id, rule.clone()));
                }
            }
        }
        best.map(|(_, _, rule)| rule)
    }

    /// Builds a predicate suitable for composing with a data-store-level
    /// capture filter: accepts a capture iff the rule that governs it at
    /// `access_time` grants `access_point`. A capture with no governing
    /// rule is accepted (accept by default) — access rules only ever
    /// narrow what would otherwise be visible.
    pub fn filter(&self, access_point: String, access_time: DateTime<Utc>) -> impl Fn(&Capture) -> bool + Send + Sync {
        let store = self.clone();
        move |capture: &Capture| -> bool {
            let Some(rule) = store.rule_for_capture(capture, access_time) else {
                return true;
            };
            match store.policy(rule.policy_id) {
                Some(policy) => policy.grants(&access_point),
                None => false,
            }
        }
    }
}

fn load_rules(db: &DB, cf_name: &str) -> Result<HashMap<u64, AccessRule>, AccessError> {
    let mut rules = HashMap::new();
    let Some(cf) = db.cf_handle(cf_name) else {
        return Ok(rules);
    };
    for item in db.iterator_cf(&cf, IteratorMode::Start) {
        let (_, value) = item?;
        let rule: AccessRule = serde_json::from_slice(&value)?;
        rules.insert(rule.id, rule);
    }
    Ok(rules)
}

fn load_policies(db: &DB, cf_name: &str) -> Result<HashMap<u64, AccessPolicy>, AccessError> {
    let mut policies = HashMap::new();
    let Some(cf) = db.cf_handle(cf_name) else {
        return Ok(policies);
    };
    for item in db.iterator_cf(&cf, IteratorMode::Start) {
        let (_, value) = item?;
        let policy: AccessPolicy = serde_json::from_slice(&value)?;
        policies.insert(policy.id, policy);
    }
    Ok(policies)
}

fn persist_rule(db: &DB, cf_name: &str, rule: &AccessRule) -> Result<(), AccessError> {
    let cf = db
        .cf_handle(cf_name)
        .ok_or_else(|| AccessError::MissingColumnFamily(cf_name.to_owned()))?;
    let value = serde_json::to_vec(rule)?;
    let mut batch = WriteBatch::default();
    batch.put_cf(&cf, rule.id.to_be_bytes(), value);
    db.write(batch)?;
    Ok(())
}

fn persist_policy(db: &DB, cf_name: &str, policy: &AccessPolicy) -> Result<(), AccessError> {
    let cf = db
        .cf_handle(cf_name)
        .ok_or_else(|| AccessError::MissingColumnFamily(cf_name.to_owned()))?;
    let value = serde_json::to_vec(policy)?;
    let mut batch = WriteBatch::default();
    batch.put_cf(&cf, policy.id.to_be_bytes(), value);
    db.write(batch)?;
    Ok(())
}

fn default_policies(next_id: &mut u64) -> Vec<AccessPolicy> {
    let mut make = |name: &str, access_points: &[&str]| {
        let id = *next_id;
        *next_id += 1;
        AccessPolicy {
            id,
            name: name.to_owned(),
            access_points: access_points.iter().map(|s| s.to_string()).collect(),
        }
    };
    vec![
        make("Public", &["public", "staff"]),
        make("Staff Only", &["staff"]),
        make("No Access", &[]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn open_store() -> (tempfile::TempDir, AccessStore) {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let descriptors = vec![
            rocksdb::ColumnFamilyDescriptor::new("default", rocksdb::Options::default()),
            rocksdb::ColumnFamilyDescriptor::new("test.access.rules", rocksdb::Options::default()),
            rocksdb::ColumnFamilyDescriptor::new("test.access.policies", rocksdb::Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, dir.path(), descriptors).unwrap();
        let store = AccessStore::open(
            Arc::new(db),
            "test.access.rules".to_owned(),
            "test.access.policies".to_owned(),
        )
        .unwrap();
        (dir, store)
    }

    fn sample_capture(urlkey: &str, timestamp: u64) -> Capture {
        Capture {
            urlkey: urlkey.to_owned(),
            timestamp,
            original: "http://example.org/".to_owned(),
            mimetype: "text/html".to_owned(),
            status: 200,
            digest: "sha1:AAA".to_owned(),
            redirecturl: "-".to_owned(),
            length: 1234,
            compressed_offset: 5678,
            file: "file.warc.gz".to_owned(),
        }
    }

    #[test]
    fn default_policies_are_seeded_on_first_open() {
        let (_dir, store) = open_store();
        let names: Vec<String> = store.list_policies().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Public".to_owned(), "Staff Only".to_owned(), "No Access".to_owned()]);
    }

    #[test]
    fn most_specific_prefix_wins() {
        let (_dir, store) = open_store();
        let public = store.list_policies().into_iter().find(|p| p.name == "Public").unwrap();
        let no_access = store.list_policies().into_iter().find(|p| p.name == "No Access").unwrap();

        store
            .put_rule(AccessRule {
                id: 0,
                policy_id: public.id,
                surts: vec![String::new()],
                captured: None,
                accessed: None,
                period: None,
                enabled: true,
            })
            .unwrap();
        store
            .put_rule(AccessRule {
                id: 0,
                policy_id: no_access.id,
                surts: vec!["org,example)/private".to_owned()],
                captured: None,
                accessed: None,
                period: None,
                enabled: true,
            })
            .unwrap();

        let public_page = sample_capture("org,example)/", 20200101000000);
        let private_page = sample_capture("org,example)/private/secret", 20200101000000);

        let rule = store.rule_for_capture(&public_page, Utc::now()).unwrap();
        assert_eq!(rule.policy_id, public.id);

        let rule = store.rule_for_capture(&private_page, Utc::now()).unwrap();
        assert_eq!(rule.policy_id, no_access.id);
    }

    #[test]
    fn tie_breaks_to_highest_id() {
        let (_dir, store) = open_store();
        let public = store.list_policies().into_iter().find(|p| p.name == "Public").unwrap();
        let no_access = store.list_policies().into_iter().find(|p| p.name == "No Access").unwrap();

        store
            .put_rule(AccessRule {
                id: 0,
                policy_id: public.id,
                surts: vec!["org,example)/".to_owned()],
                captured: None,
                accessed: None,
                period: None,
                enabled: true,
            })
            .unwrap();
        let second = store
            .put_rule(AccessRule {
                id: 0,
                policy_id: no_access.id,
                surts: vec!["org,example)/".to_owned()],
                captured: None,
                accessed: None,
                period: None,
                enabled: true,
            })
            .unwrap();

        let page = sample_capture("org,example)/", 20200101000000);
        let rule = store.rule_for_capture(&page, Utc::now()).unwrap();
        assert_eq!(rule.id, second.id);
    }

    #[test]
    fn capture_with_no_governing_rule_is_accepted_by_filter() {
        let (_dir, store) = open_store();
        let filter = store.filter("public".to_owned(), Utc::now());
        let page = sample_capture("org,example)/", 20200101000000);
        assert!(filter(&page));
    }

    #[test]
    fn put_rule_rejects_unknown_policy() {
        let (_dir, store) = open_store();
        let result = store.put_rule(AccessRule {
            id: 0,
            policy_id: 999,
            surts: vec![String::new()],
            captured: None,
            accessed: None,
            period: None,
            enabled: true,
        });
        assert!(matches!(result, Err(AccessError::DanglingPolicyRef(999))));
    }

    #[test]
    fn delete_rule_removes_it_from_the_index() {
        let (_dir, store) = open_store();
        let public = store.list_policies().into_iter().find(|p| p.name == "Public").unwrap();
        let rule = store
            .put_rule(AccessRule {
                id: 0,
                policy_id: public.id,
                surts: vec![String::new()],
                captured: None,
                accessed: None,
                period: None,
                enabled: true,
            })
            .unwrap();

        let page = sample_capture("org,example)/", 20200101000000);
        assert!(store.rule_for_capture(&page, Utc::now()).is_some());

        store.delete_rule(rule.id).unwrap();
        assert!(store.rule_for_capture(&page, Utc::now()).is_none());
    }

    #[test]
    fn rules_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = rocksdb::Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let descriptors = vec![
            rocksdb::ColumnFamilyDescriptor::new("default", rocksdb::Options::default()),
            rocksdb::ColumnFamilyDescriptor::new("test.access.rules", rocksdb::Options::default()),
            rocksdb::ColumnFamilyDescriptor::new("test.access.policies", rocksdb::Options::default()),
        ];
        let rule_id = {
            let db = Arc::new(DB::open_cf_descriptors(&opts, dir.path(), descriptors.clone()).unwrap());
            let store = AccessStore::open(db, "test.access.rules".to_owned(), "test.access.policies".to_owned()).unwrap();
            let public = store.list_policies().into_iter().find(|p| p.name == "Public").unwrap();
            store
                .put_rule(AccessRule {
                    id: 0,
                    policy_id: public.id,
                    surts: vec![String::new()],
                    captured: None,
                    accessed: None,
                    period: None,
                    enabled: true,
                })
                .unwrap()
                .id
        };

        let db = Arc::new(DB::open_cf_descriptors(&opts, dir.path(), descriptors).unwrap());
        let store = AccessStore::open(db, "test.access.rules".to_owned(), "test.access.policies".to_owned()).unwrap();
        let page = sample_capture("org,example)/", 20200101000000);
        let rule = store.rule_for_capture(&page, Utc::now()).unwrap();
        assert_eq!(rule.id, rule_id);
    }
}
