use std::path::PathBuf;

use clap::Args;

use crate::output::OutputFormat;

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RelayArgs {
    /// Relay base URL (overrides the configured default).
    #[arg(long, env = "ZIMAGE_RELAY_URL")]
    pub relay: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct PollArgs {
    /// Pause between history queries, in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,
    /// Maximum number of history queries before giving up.
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct TemplateArgs {
    /// Job template JSON file to use instead of the built-in one.
    #[arg(long = "template", value_name = "PATH")]
    pub template_path: Option<PathBuf>,
}
