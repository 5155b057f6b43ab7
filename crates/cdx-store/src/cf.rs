//! Column-family naming for one collection. A collection `X` owns four
//! RocksDB column families: `X` (captures), `X.alias` (aliases),
//! `X.access.rules` and `X.access.policies` (access-control store).

pub const ALIAS_SUFFIX: &str = ".alias";
pub const ACCESS_RULES_SUFFIX: &str = ".access.rules";
pub const ACCESS_POLICIES_SUFFIX: &str = ".access.policies";

pub const ALL_SUFFIXES: [&str; 3] = [ALIAS_SUFFIX, ACCESS_RULES_SUFFIX, ACCESS_POLICIES_SUFFIX];

pub fn captures_cf(collection: &str) -> String {
    collection.to_owned()
}

pub fn alias_cf(collection: &str) -> String {
    format!("{collection}{ALIAS_SUFFIX}")
}

pub fn access_rules_cf(collection: &str) -> String {
    format!("{collection}{ACCESS_RULES_SUFFIX}")
}

pub fn access_policies_cf(collection: &str) -> String {
    format!("{collection}{ACCESS_POLICIES_SUFFIX}")
}

/// Given the full set of column-family names found in an opened database,
/// recovers the set of collection names. A name is a collection's capture
/// family iff it isn't `default` and doesn't carry one of the reserved
/// suffixes (those are owned by some other collection's capture family).
pub fn collection_names<'a>(cf_names: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut names: Vec<String> = cf_names
        .into_iter()
        .filter(|name| name.as_str() != "default")
        .filter(|name| !ALL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
        .cloned()
        .collect();
    names.sort();
    names.dedup();
    names
}
