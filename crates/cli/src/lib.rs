pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "loa",
    about = "LOA bot operator CLI",
    long_about = "Inspect configuration, check Discord readiness, and register slash commands for the LOA bot.",
    after_help = "Examples:\n  loa doctor --json\n  loa config\n  loa register"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, token shape, and review/log channel reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Register the postloa slash command in every configured guild")]
    Register,
}

pub fn run() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Register => commands::register::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
