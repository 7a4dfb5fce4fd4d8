use std::path::PathBuf;

use clap::Subcommand;

use crate::args::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check whether the relay is reachable and healthy.
    Health {
        #[command(flatten)]
        relay: RelayArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Generate an image and save it.
    Generate {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        seed: Option<u64>,
        /// Output file (default: the engine-assigned file name).
        #[arg(long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        relay: RelayArgs,
        #[command(flatten)]
        poll: PollArgs,
        #[command(flatten)]
        template: TemplateArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Print the job template, sanitized when a prompt is given.
    Template {
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
        #[command(flatten)]
        template: TemplateArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}
