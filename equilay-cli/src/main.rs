use anyhow::Result;
use clap::Parser;
use equilay_cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    equilay_cli::run(Cli::parse()).await
}
