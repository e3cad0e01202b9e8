use clap::{Parser, Subcommand};
use colored::*;
use std::process;

mod cli;

use cli::maintenance::SweepCommands;
use labrack_cli::config::CliConfig;
use labrack_cli::runtime::Runtime;

#[derive(Parser)]
#[command(name = "labrack")]
#[command(about = "Labrack - per-user remote lab environments on cloud instances")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grant a lab seat for a course to a user
    Grant {
        /// User the seat belongs to
        #[arg(long)]
        user: String,
        /// Course the seat is for
        #[arg(long)]
        course: String,
        /// Purchase id; generated when omitted
        #[arg(long)]
        purchase: Option<String>,
        /// Launch budget override
        #[arg(long)]
        max_launches: Option<i64>,
        /// Session length override in hours
        #[arg(long)]
        session_hours: Option<i64>,
    },
    /// Launch the lab for a purchased seat
    Launch {
        /// Purchase id of the seat
        purchase: String,
        /// User requesting the launch
        #[arg(long)]
        user: String,
        /// Course being launched
        #[arg(long)]
        course: String,
    },
    /// Close the active session, saving work to a snapshot
    Close {
        /// Purchase id of the seat
        purchase: String,
    },
    /// Show the live status of a lab
    Status {
        /// Purchase id of the seat
        purchase: String,
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Restart the lab instance
    Restart {
        /// Purchase id of the seat
        purchase: String,
    },
    /// List all lab seats of a user
    Entries {
        /// User to list seats for
        user: String,
    },
    /// Janitor tasks for abandoned sessions and identities
    #[command(subcommand)]
    Sweep(SweepCommands),
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let config = CliConfig::from_env()?;
    let runtime = Runtime::build(&config).await?;

    match command {
        Commands::Grant {
            user,
            course,
            purchase,
            max_launches,
            session_hours,
        } => cli::seats::grant(&runtime, user, course, purchase, max_launches, session_hours).await,
        Commands::Launch {
            purchase,
            user,
            course,
        } => cli::sessions::launch(&runtime, &user, &course, &purchase).await,
        Commands::Close { purchase } => cli::sessions::close(&runtime, &purchase).await,
        Commands::Status { purchase, json } => {
            cli::sessions::status(&runtime, &purchase, json).await
        }
        Commands::Restart { purchase } => cli::sessions::restart(&runtime, &purchase).await,
        Commands::Entries { user } => cli::seats::entries(&runtime, &user).await,
        Commands::Sweep(command) => cli::maintenance::handle_sweep_command(&runtime, command).await,
    }
}
