//! Plan command
//!
//! Usage: relmap plan --catalog <PATH> [--root <TYPE>] [--json]

use clap::Args;
use relmap_core::model::{FieldBinding, Role, TableDefinition};
use relmap_engine::AggregateMapping;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Path to the catalog YAML file
    #[arg(long)]
    pub catalog: PathBuf,

    /// Aggregate root to plan (default: every declared aggregate)
    #[arg(long)]
    pub root: Option<String>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PlanOutput<'a> {
    root: &'a str,
    fingerprint: &'a str,
    roles: &'a BTreeMap<String, Role>,
    creation_order: &'a [String],
    tables: Vec<&'a TableDefinition>,
}

impl<'a> From<&'a AggregateMapping> for PlanOutput<'a> {
    fn from(mapping: &'a AggregateMapping) -> Self {
        Self {
            root: &mapping.root,
            fingerprint: &mapping.fingerprint,
            roles: &mapping.roles,
            creation_order: &mapping.schema.creation_order,
            tables: mapping.schema.ordered_tables().collect(),
        }
    }
}

/// Execute plan command
pub fn execute(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (catalog, executor) = super::load(&args.catalog)?;
    let roots = super::selected_roots(&catalog, args.root)?;

    let mut mappings = Vec::new();
    for root in &roots {
        mappings.push(executor.registry().mapping(root)?);
    }

    if args.json {
        let plans: Vec<PlanOutput> = mappings.iter().map(|m| PlanOutput::from(&**m)).collect();
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    for mapping in &mappings {
        print_plan(mapping);
    }
    Ok(())
}

fn print_plan(mapping: &AggregateMapping) {
    println!("aggregate {} (fingerprint {})", mapping.root, mapping.fingerprint);

    println!("  roles:");
    for (type_name, role) in &mapping.roles {
        println!("    {}: {}", type_name, role);
    }

    println!("  tables:");
    for table in mapping.schema.ordered_tables() {
        let mut line = format!("    {}", table.table_name);
        if let Some(own) = &table.ownership {
            line.push_str(&format!(
                " (owned by {} via {}, {:?})",
                own.owner_table, own.owner_column, own.collection
            ));
        }
        println!("{}", line);
        for fk in &table.foreign_keys {
            println!(
                "      {} -> {}.{} ON DELETE {}",
                fk.column,
                fk.referenced_table,
                fk.referenced_column,
                fk.cascade_action.sql()
            );
        }
        for binding in &table.bindings {
            if let FieldBinding::Collection { field, table } = binding {
                println!("      {}[] -> {}", field, table);
            }
        }
    }
}
