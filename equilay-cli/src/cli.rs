use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "equilay")]
#[command(about = "EquiLay voice trading assistant", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to <config dir>/equilay/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use the silent virtual audio device instead of the system microphone and speakers
    #[arg(long, global = true)]
    pub no_audio: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the interactive voice console
    Voice,
    /// Search today's UK & Ireland race cards and print them
    Markets,
}
