//! SURT canonicalization.
//!
//! The wider system treats the output of [`surt_canonicalize`] as opaque
//! ordered bytes: nothing upstream depends on the exact rewriting rules, only
//! on determinism and idempotence. This module fixes one conservative
//! implementation so the crate is self-contained; a deployment is free to
//! swap in a richer canonicalizer (stripping `www.`, collapsing
//! `index.html`, session-id scrubbing, ...) without touching any other
//! component.

/// Maps an arbitrary URL to its SURT (Sort-friendly URI Reordering
/// Transform) form, e.g. `http://www.example.org/a?b=1` ->
/// `org,example,www)/a?b=1`.
///
/// Must be deterministic and idempotent: `surt_canonicalize(surt_canonicalize(x))
/// == surt_canonicalize(x)`.
pub fn surt_canonicalize(url: &str) -> String {
    if let Some(authority_end) = canonical_authority_end(url) {
        // Already SURT-form (idempotence fast path): lowercase the
        // authority part, which is itself idempotent, and re-run only the
        // path/query canonicalization rather than re-splitting a host that
        // is no longer dot-separated.
        let mut surt = url[..=authority_end].to_ascii_lowercase();
        let rest = &url[authority_end + 1..];
        let rest = if rest.is_empty() { "/" } else { rest };
        surt.push_str(&canonicalize_path_and_query(rest));
        return surt;
    }

    let without_scheme = strip_scheme(url);
    let (authority, path_and_query) = split_authority(without_scheme);
    let (host, port) = split_port(authority);

    let mut labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    labels.reverse();

    let mut surt = String::with_capacity(url.len() + 8);
    surt.push_str(&labels.join(","));
    if let Some(port) = port.filter(|p| !is_default_port(p)) {
        surt.push(':');
        surt.push_str(port);
    }
    surt.push(')');

    let path_and_query = if path_and_query.is_empty() {
        "/"
    } else {
        path_and_query
    };
    surt.push_str(&canonicalize_path_and_query(path_and_query));

    surt
}

/// If `url` is already in canonical SURT form, returns the index of the
/// closing `)` that ends its authority part. Canonical form has no scheme
/// and closes its (reversed-label, optional port) authority with `)` before
/// the first `/`; a plain URL's authority never contains `)`, so finding one
/// ahead of any `://` and ahead of the first path separator is unambiguous.
fn canonical_authority_end(url: &str) -> Option<usize> {
    let head_end = url.find('/').unwrap_or(url.len());
    let head = &url[..head_end];
    if head.contains("://") {
        return None;
    }
    head.rfind(')')
}

fn strip_scheme(url: &str) -> &str {
    match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    }
}

fn split_authority(rest: &str) -> (&str, &str) {
    match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => match rest.find(['?', '#']) {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        },
    }
}

fn split_port(authority: &str) -> (&str, Option<&str>) {
    // IPv6 literals (`[::1]:8080`) keep their brackets out of scope here;
    // treat the whole bracketed form as the host if present.
    if authority.starts_with('[') {
        return (authority, None);
    }
    match authority.rfind(':') {
        Some(idx) => (&authority[..idx], Some(&authority[idx + 1..])),
        None => (authority, None),
    }
}

fn is_default_port(port: &str) -> bool {
    matches!(port, "80" | "443")
}

/// Lowercases the path, leaves the query string case intact, and sorts
/// query parameters by key so that equivalent requests with reordered
/// parameters canonicalize identically.
fn canonicalize_path_and_query(path_and_query: &str) -> String {
    let (path, query) = match path_and_query.find('?') {
        Some(idx) => (&path_and_query[..idx], Some(&path_and_query[idx + 1..])),
        None => (path_and_query, None),
    };
    // Fragments never reach the archive.
    let path = path.split('#').next().unwrap_or(path);

    let mut out = path.to_ascii_lowercase();
    if let Some(query) = query {
        let query = query.split('#').next().unwrap_or(query);
        if !query.is_empty() {
            let mut params: Vec<&str> = query.split('&').collect();
            params.sort_unstable();
            out.push('?');
            out.push_str(&params.join("&"));
        }
    }
    out
}
