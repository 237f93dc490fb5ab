//! Binary entry point for classbook.
//!
//! This binary provides the CLI interface for the classbook records core.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use classbook::cli::{
    ReportArgs, RolesOutputFormat, cmd_authorize, cmd_report, cmd_roles, cmd_serve, cmd_sheet,
};
use classbook::CallContext;
use classbook::config::ClassbookConfig;
use classbook::observability::{self, LoggingConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Classbook - role-gated school records with grade and attendance analytics.
#[derive(Parser)]
#[command(name = "classbook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "CLASSBOOK_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Path to the `SQLite` database, overriding configuration.
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Answer whether a role holds a capability.
    Authorize {
        /// Role name, e.g. `professor`.
        role: String,

        /// Capability name, e.g. `create_notas`.
        capability: String,
    },

    /// Print the effective role table.
    Roles {
        /// Output format: table or json.
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Generate a report as JSON.
    Report {
        /// Report kind, e.g. `class-performance` or `ranking`.
        kind: String,

        /// Caller user id.
        #[arg(long, env = "CLASSBOOK_USER_ID")]
        user_id: Option<String>,

        /// Caller role.
        #[arg(long, env = "CLASSBOOK_USER_ROLE")]
        role: Option<String>,

        /// Restrict to a class.
        #[arg(long)]
        class_id: Option<i64>,

        /// Restrict to a subject.
        #[arg(long)]
        subject: Option<String>,

        /// Restrict to a bimester.
        #[arg(long)]
        bimester: Option<i64>,

        /// Restrict to a student; required for `report-card`.
        #[arg(long)]
        student_id: Option<i64>,

        /// Restrict attendance to a date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,

        /// Restrict attendance to a month (YYYY-MM).
        #[arg(long)]
        month: Option<String>,

        /// Ranking mode: top or `at_risk`.
        #[arg(long)]
        mode: Option<String>,

        /// Ranking size.
        #[arg(long)]
        limit: Option<String>,
    },

    /// Print a class's roll-call sheet for a date.
    Sheet {
        /// Class id.
        class_id: i64,

        /// Lesson date (YYYY-MM-DD).
        date: String,

        /// Caller user id.
        #[arg(long, env = "CLASSBOOK_USER_ID")]
        user_id: Option<String>,

        /// Caller role.
        #[arg(long, env = "CLASSBOOK_USER_ROLE")]
        role: Option<String>,
    },

    /// Run the HTTP adapter.
    Serve {
        /// Port, overriding configuration.
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };
    let config = match cli.database.clone() {
        Some(path) => config.with_database(path),
        None => config,
    };

    if let Err(e) = observability::init(&LoggingConfig::from_settings(&config.logging, cli.verbose)) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config).await {
        Ok(Some(output)) => {
            println!("{output}");
            ExitCode::SUCCESS
        },
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

async fn run_command(command: Commands, config: &ClassbookConfig) -> classbook::Result<Option<String>> {
    match command {
        Commands::Authorize { role, capability } => cmd_authorize(config, &role, &capability).map(Some),
        Commands::Roles { format } => {
            let format = format.parse().unwrap_or(RolesOutputFormat::Table);
            cmd_roles(config, format).map(Some)
        },
        Commands::Report {
            kind,
            user_id,
            role,
            class_id,
            subject,
            bimester,
            student_id,
            date,
            month,
            mode,
            limit,
        } => {
            let args = ReportArgs {
                kind,
                class_id,
                subject,
                bimester,
                student_id,
                date,
                month,
                mode,
                limit,
                user_id,
                role,
            };
            cmd_report(config, &args).map(Some)
        },
        Commands::Sheet {
            class_id,
            date,
            user_id,
            role,
        } => {
            let mut ctx = CallContext::new(user_id.as_deref(), role.as_deref());
            cmd_sheet(config, &mut ctx, class_id, &date).map(Some)
        },
        Commands::Serve { port } => cmd_serve(config, port).await.map(|()| None),
    }
}

/// Loads configuration: explicit file, else the default location, then
/// environment overrides.
fn load_config(path: Option<&std::path::Path>) -> classbook::Result<ClassbookConfig> {
    let config = match path {
        Some(path) => ClassbookConfig::load_from_file(path)?,
        None => ClassbookConfig::load_default(),
    };
    Ok(config.with_env_overrides())
}
