//! ## ratevakt-cli
//! **Operator entrypoint for the rate monitor**
//!
//! - `ratevakt run`: live capture and enforcement until Ctrl-C / SIGTERM
//! - `ratevakt check-config`: print the effective configuration

use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    commands::run_command(cli).await
}
