pub mod client;
pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use cleanerio_core::config::{AppConfig, LogFormat};
use tracing::Level;

#[derive(Debug, Parser)]
#[command(
    name = "cleanerio",
    about = "Cleaner.io assistant operator CLI",
    long_about = "Build the knowledge index, chat with a running assistant, inspect config, and check readiness.",
    after_help = "Examples:\n  cleanerio build-index\n  cleanerio chat --user alice --password secret\n  cleanerio doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Embed the service corpus and save the knowledge index")]
    BuildIndex,
    #[command(about = "Chat with the assistant through the /enquire endpoint")]
    Chat {
        #[arg(long, help = "User id; conversations are stored per user")]
        user: String,
        #[arg(long, env = "CLEANERIO_CHAT_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, help = "Directory for /export transcripts (default: current directory)")]
        export_dir: Option<PathBuf>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, credentials, corpus, index freshness, and storage")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::BuildIndex => commands::build_index::run(),
        Command::Chat { user, password, export_dir } => {
            commands::chat::run(&user, &password, export_dir)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so they never interleave with chat output on stdout.
pub(crate) fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::WARN);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
