pub mod bootstrap;
pub mod commands;

use clap::{Parser, Subcommand};
use dividy_core::config::AppConfig;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "dividy",
    about = "Dividy Discord bot CLI",
    long_about = "Operate the Dividy separator-showcase bot: serve gateway traffic, register slash commands, inspect readiness, and preview the reply payload.",
    after_help = "Examples:\n  dividy run\n  dividy doctor --json\n  dividy preview"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Register slash commands, then serve gateway traffic until ctrl-c")]
    Run,
    #[command(about = "Bulk-overwrite the application's slash commands and report what registered")]
    Register,
    #[command(about = "Validate config, bot token shape, and Discord API reachability checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the /separator showcase reply payload without calling Discord")]
    Preview,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run => commands::run::run(),
        Command::Register => commands::register::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Preview => {
            commands::CommandResult { exit_code: 0, output: commands::preview::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

pub fn init_logging(config: &AppConfig) {
    use dividy_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}
