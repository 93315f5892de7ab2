//! relmap CLI
//!
//! Inspect and apply the relational schemas derived from a descriptor
//! catalog.

use clap::{Parser, Subcommand, ValueEnum};
use relmap_core::logging_facility::{self, Profile};

mod commands;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// No log output
    Off,
    /// Human-readable lines on stderr
    Human,
    /// JSON lines on stderr
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "relmap")]
#[command(about = "relmap - Aggregate relational mapping", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Off, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show roles, table dependency order and tables per aggregate
    Plan(commands::plan::PlanArgs),
    /// Print the DDL of an aggregate
    Schema(commands::schema::SchemaArgs),
    /// Create the tables of one or all aggregates in a SQLite database
    Apply(commands::apply::ApplyArgs),
}

fn main() {
    let cli = Cli::parse();

    match cli.log_format {
        LogFormat::Off => {}
        LogFormat::Human => logging_facility::init(Profile::Development),
        LogFormat::Json => logging_facility::init(Profile::Production),
    }

    let result = match cli.command {
        Commands::Plan(args) => commands::plan::execute(args),
        Commands::Schema(args) => commands::schema::execute(args),
        Commands::Apply(args) => commands::apply::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
