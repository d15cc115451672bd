mod cli;
mod dispatcher;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use dispatcher::{dispatch_command, AppContext};
use stockfolio::{config, db, error, holdings, money, pricing, service, utils, valuation};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    // Logs go to stderr so --json output stays parseable
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let ctx = AppContext::resolve(config, cli.user, cli.db, cli.json);
    dispatch_command(cli.command, &ctx).await
}
