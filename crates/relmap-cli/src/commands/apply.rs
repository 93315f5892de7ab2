//! Apply command
//!
//! Usage: relmap apply --catalog <PATH> --db <PATH> [--root <TYPE>]

use clap::Args;
use relmap_store::{SqliteConnection, StoreConfig};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Path to the catalog YAML file
    #[arg(long)]
    pub catalog: PathBuf,

    /// SQLite database file (created if missing)
    #[arg(long)]
    pub db: PathBuf,

    /// Aggregate root (default: every declared aggregate)
    #[arg(long)]
    pub root: Option<String>,

    /// Milliseconds to wait on a locked database
    #[arg(long, default_value_t = 5_000)]
    pub busy_timeout_ms: u64,
}

/// Execute apply command
pub fn execute(args: ApplyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (catalog, executor) = super::load(&args.catalog)?;
    let roots = super::selected_roots(&catalog, args.root)?;

    let config = StoreConfig {
        busy_timeout_ms: args.busy_timeout_ms,
        ..StoreConfig::default()
    };
    let mut conn = SqliteConnection::open(&args.db, &config)?;

    for root in &roots {
        let fingerprint = executor.create_schema(&mut conn, root)?;
        let tables = executor.registry().mapping(root)?.schema.tables.len();
        println!("applied {} ({} tables, fingerprint {})", root, tables, fingerprint);
    }
    Ok(())
}
