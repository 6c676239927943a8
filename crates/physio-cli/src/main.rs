use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "physio")]
#[command(
    about = "Physio CLI - session scheduling and transfer approvals for a clinic network",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Roster file (defaults to roster.toml in the data directory)
    #[arg(long, global = true)]
    roster: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one JSON request, e.g. '{"route":"pending_queue"}'
    Request {
        /// Session token of the caller
        #[arg(long)]
        token: String,
        /// Request body
        request: String,
    },
    /// Replay a JSON script of `{ "token": ..., "request": {...} }` steps
    Run {
        script: PathBuf,
        /// Print emitted audit events after the responses
        #[arg(long)]
        audit: bool,
    },
    /// List a therapist's free slots on a date
    Slots {
        #[arg(long)]
        token: String,
        #[arg(long)]
        therapist: String,
        /// YYYY-MM-DD or DD/MM/YYYY
        #[arg(long)]
        date: String,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = commands::Context::load(cli.config.as_deref(), cli.roster.as_deref())?;
    logging::init(&context.config.logging);

    match cli.command {
        Commands::Request { token, request } => {
            commands::request::run_one(&context, &token, &request).await?
        }
        Commands::Run { script, audit } => {
            commands::request::run_script(&context, &script, audit).await?
        }
        Commands::Slots {
            token,
            therapist,
            date,
        } => commands::slots::run(&context, &token, &therapist, &date).await?,
        Commands::Config => commands::config::print(&context)?,
    }

    Ok(())
}
