use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use storesync::EventKind;

#[derive(Parser)]
#[command(
    name = "storesync",
    about = "storesync: replay and encode change envelopes for local store mirrors",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file overriding dispatcher and hub settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay newline-delimited envelopes into an in-memory mirror
    Replay(ReplayArgs),
    /// Encode one envelope and broadcast it to stdout
    Encode(EncodeArgs),
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Stream the mirror subscribes to
    #[arg(long)]
    pub stream: String,
    /// Top-level payload field used as the mirror key
    #[arg(long)]
    pub key: String,
    /// Input file (defaults to stdin)
    #[arg(long)]
    pub input: Option<PathBuf>,
}

#[derive(Args)]
pub struct EncodeArgs {
    #[arg(long)]
    pub stream: String,
    #[arg(long, value_enum)]
    pub kind: KindArg,
    /// Payload as JSON
    #[arg(long)]
    pub data: String,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum KindArg {
    Create,
    Update,
    Delete,
}

impl From<KindArg> for EventKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Create => EventKind::Create,
            KindArg::Update => EventKind::Update,
            KindArg::Delete => EventKind::Delete,
        }
    }
}
