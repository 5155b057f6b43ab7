use std::path::PathBuf;

use cdx_cli_common::LogArgs;

/// A compact CDX index server.
#[derive(Debug, clap::Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "CDX_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Inherit an already-bound listening socket by file descriptor number,
    /// instead of binding `--bind` ourselves.
    #[arg(long, env = "CDX_LISTEN_FD")]
    pub listen_fd: Option<i32>,

    /// Directory holding the RocksDB database.
    #[arg(long, env = "CDX_DATA_DIR")]
    pub data_dir: PathBuf,

    /// Base URL of the external access oracle. When set, every collection's
    /// capture filter is resolved against it once, at open time.
    #[arg(long, env = "CDX_ACCESS_ORACLE_URL")]
    pub access_oracle_url: Option<String>,

    #[command(flatten)]
    pub log_args: LogArgs,
}
