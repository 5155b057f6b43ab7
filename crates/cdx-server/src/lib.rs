//! The HTTP surface over `cdx-store` and `cdx-access`: ingest/query routes,
//! an admin surface for policies and rules, and the CLI entry point that
//! wires them together.

pub mod config;
pub mod error;
pub mod oracle;
pub mod routes;
pub mod startup;
pub mod state;

use std::sync::Arc;

use tracing::info;

use cdx_cli_common::OrBail;
use cdx_store::DataStore;

use config::Args;
use oracle::OracleClient;
use state::AppState;

pub async fn run(args: Args) -> anyhow::Result<()> {
    if args.listen_fd.is_some() {
        anyhow::bail!("--listen-fd is not yet supported; bind with --bind instead");
    }

    let oracle = args.access_oracle_url.map(|url| Arc::new(OracleClient::new(url)));

    let capture_filter = match &oracle {
        Some(oracle) => {
            let filter = oracle.resolve_filter().await.or_bail("failed to resolve access oracle filter");
            Some(Arc::from(filter))
        }
        None => None,
    };

    let store = DataStore::open(&args.data_dir, capture_filter).or_bail("failed to open data store");
    let state = AppState::new(Arc::new(store), oracle);

    let app = startup::build_app(state);
    let listener = tokio::net::TcpListener::bind(&args.bind).await.or_bail("failed to bind listener");
    info!(bind = %args.bind, "listening");

    startup::serve(listener, app).await
}
