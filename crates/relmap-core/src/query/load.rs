use crate::dialect::Dialect;
use crate::errors::Result;
use crate::model::{FieldBinding, ReferenceTarget, Row, RowSet, SqlValue, Statement};
use crate::schema::Schema;

/// One table aliased in the load statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedTable {
    pub alias: String,
    pub table: String,
    pub columns: Vec<String>,
    pub primary_key: String,
    /// LEFT JOIN: the table contributes no row when its key is null
    pub optional: bool,
}

impl JoinedTable {
    fn projection(&self, column: &str) -> String {
        format!("{}__{}", self.alias, column)
    }
}

/// Root row plus directly referenced entity rows in one SELECT
#[derive(Debug, Clone, PartialEq)]
pub struct LoadQuery {
    pub statement: Statement,
    pub joins: Vec<JoinedTable>,
}

impl LoadQuery {
    /// Split joined result rows back into per-table rows
    pub fn split(&self, result: &[Row]) -> RowSet {
        let mut rows = RowSet::new();
        for joined_row in result {
            for join in &self.joins {
                let row: Row = join
                    .columns
                    .iter()
                    .map(|c| {
                        let value = joined_row
                            .get(&join.projection(c))
                            .cloned()
                            .unwrap_or(SqlValue::Null);
                        (c.clone(), value)
                    })
                    .collect();
                let key = row.get(&join.primary_key).unwrap_or(&SqlValue::Null);
                if key.is_null() || rows.contains(&join.table, &join.primary_key, key) {
                    continue;
                }
                rows.push(join.table.clone(), row);
            }
        }
        rows
    }
}

/// SELECT the root row by id, joining its direct entity references
///
/// Collections and deeper references are fetched separately with
/// [`build_fetch_by_keys`](super::build_fetch_by_keys).
///
/// # Errors
///
/// `UnknownTable` if the schema is inconsistent.
pub fn build_load(schema: &Schema, id: &SqlValue, dialect: &dyn Dialect) -> Result<LoadQuery> {
    let root = schema.root()?;
    let q = |ident: &str| dialect.quote_identifier(ident);

    let mut joins = vec![JoinedTable {
        alias: "t0".to_string(),
        table: root.table_name.clone(),
        columns: root.column_names().map(str::to_string).collect(),
        primary_key: root.primary_key.clone(),
        optional: false,
    }];
    let mut join_clauses = Vec::new();
    for binding in &root.bindings {
        let FieldBinding::Reference {
            column,
            nullable,
            target: ReferenceTarget::Entity { table },
            ..
        } = binding
        else {
            continue;
        };
        let target = schema.table(table)?;
        let alias = format!("t{}", joins.len());
        join_clauses.push(format!(
            "{} {} AS {} ON {}.{} = {}.{}",
            if *nullable { "LEFT JOIN" } else { "INNER JOIN" },
            q(&target.table_name),
            q(&alias),
            q(&alias),
            q(&target.primary_key),
            q("t0"),
            q(column)
        ));
        joins.push(JoinedTable {
            alias,
            table: target.table_name.clone(),
            columns: target.column_names().map(str::to_string).collect(),
            primary_key: target.primary_key.clone(),
            optional: *nullable,
        });
    }

    let projections: Vec<String> = joins
        .iter()
        .flat_map(|j| {
            j.columns
                .iter()
                .map(move |c| format!("{}.{} AS {}", q(&j.alias), q(c), q(&j.projection(c))))
        })
        .collect();

    let mut sql = format!(
        "SELECT {} FROM {} AS {}",
        projections.join(", "),
        q(&root.table_name),
        q("t0")
    );
    for clause in join_clauses {
        sql.push(' ');
        sql.push_str(&clause);
    }
    sql.push_str(&format!(
        " WHERE {}.{} = {}",
        q("t0"),
        q(&root.primary_key),
        dialect.placeholder(1)
    ));

    Ok(LoadQuery {
        statement: Statement::new(sql, vec![id.clone()]),
        joins,
    })
}
