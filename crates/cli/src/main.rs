use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod args;
mod cmd;
mod commands;
mod exit_codes;
mod output;

pub use args::*;
use commands::Command;

#[derive(Debug, Parser)]
#[command(name = "zimage", version, about = "Z-Image generation client")]
struct Cli {
    /// Show every relay exchange as it happens.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            std::process::exit(exit_codes::RUNTIME_ERROR);
        }
    };

    let exit_code = rt.block_on(run_command(cli.command));
    std::process::exit(exit_code);
}

/// Log to stderr so stdout stays machine-readable.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "zimage_cli=debug,zimage_comfyui=debug"
    } else {
        "zimage_cli=info,zimage_comfyui=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_command(command: Command) -> i32 {
    match command {
        Command::Health { relay, output } => cmd::health::health_cmd(relay, output).await,
        Command::Generate {
            prompt,
            seed,
            out,
            relay,
            poll,
            template,
            output,
        } => cmd::generate::generate_cmd(&prompt, seed, out, relay, poll, template, output).await,
        Command::Template {
            prompt,
            seed,
            template,
            output,
        } => cmd::template::template_cmd(prompt.as_deref(), seed, template, output).await,
    }
}
