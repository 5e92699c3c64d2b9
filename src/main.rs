// src/main.rs
use anyhow::Result;
use clap::Parser;
use tracing::warn;

use crab_cage_kv::{
    cli::{Cli, Command},
    config,
    node::{Follower, Leader},
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to install ctrl-c handler");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut cfg = config::load(&cli.config)?;

    match cli.command {
        Command::Leader(args) => {
            args.apply(&mut cfg);
            Leader::start(&cfg).await?.run_until(ctrl_c()).await?;
        }
        Command::Follower(args) => {
            args.apply(&mut cfg);
            Follower::start(&cfg).await?.run_until(ctrl_c()).await?;
        }
    }

    Ok(())
}
