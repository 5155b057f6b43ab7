use clap::Parser;

use cdx_cli_common::init_logging;
use cdx_server::config::Args;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_args);

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(cdx_server::run(args))
}
