//! Client for the external access oracle. Per the distilled spec's §4.3,
//! the oracle's verdict is resolved once, at data-store construction, into
//! a static block-list; the resulting predicate is immutable for the
//! lifetime of the `DataStore` (see DESIGN.md for why this repository
//! picked "resolve once at startup" over "resolve per query").

use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use cdx_format::Capture;
use cdx_store::CaptureFilter;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("access oracle request failed")]
    Http(#[from] reqwest::Error),

    #[error("access oracle returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Deserialize)]
struct BlocklistResponse {
    /// SURT prefixes the oracle has ruled out of this collection entirely.
    blocked_urlkey_prefixes: Vec<String>,
}

pub struct OracleClient {
    client: reqwest::Client,
    base_url: String,
}

impl OracleClient {
    pub fn new(base_url: String) -> OracleClient {
        OracleClient {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Fetches the current block-list and builds a filter closure over it.
    /// Called exactly once per process, before `DataStore::open`, and
    /// applied uniformly to every collection for the life of the process.
    pub async fn resolve_filter(&self) -> Result<Box<CaptureFilter>, OracleError> {
        let url = format!("{}/blocklist", self.base_url.trim_end_matches('/'));
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(OracleError::Status(response.status()));
        }
        let body: BlocklistResponse = response.json().await?;
        let blocked: HashSet<String> = body.blocked_urlkey_prefixes.into_iter().collect();

        Ok(Box::new(move |capture: &Capture| -> bool {
            !blocked.iter().any(|prefix| capture.urlkey.starts_with(prefix.as_str()))
        }))
    }
}
