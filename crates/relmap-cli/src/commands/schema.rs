//! Schema command
//!
//! Usage: relmap schema --catalog <PATH> [--root <TYPE>]

use clap::Args;
use relmap_core::schema::create_statements;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Path to the catalog YAML file
    #[arg(long)]
    pub catalog: PathBuf,

    /// Aggregate root (default: every declared aggregate)
    #[arg(long)]
    pub root: Option<String>,
}

/// Execute schema command
pub fn execute(args: SchemaArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (catalog, executor) = super::load(&args.catalog)?;
    let roots = super::selected_roots(&catalog, args.root)?;

    for root in &roots {
        let mapping = executor.registry().mapping(root)?;
        println!("-- aggregate: {}", mapping.root);
        println!("-- fingerprint: {}", mapping.fingerprint);
        for statement in create_statements(&mapping.schema, executor.registry().dialect()) {
            println!("{};", statement.sql);
        }
        println!();
    }
    Ok(())
}
