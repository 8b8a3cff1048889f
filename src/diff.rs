//! Schema diff engine.
//!
//! Compares a desired schema against the live schema and produces the list
//! of [`Edit`]s that transforms the live one into the desired one, or a
//! [`DiffError`] when no deterministic edit list exists. The edit list is
//! unordered with respect to cross-table dependencies; ordering is the
//! sequencer's job.

use std::collections::BTreeSet;

use tracing::debug;

use crate::edit::Edit;
use crate::error::DiffError;
use crate::schema::{
    Column, ColumnName, ConstraintName, ReferentialAction, Schema, Table, TableConstraint,
    TableName,
};

/// Options for the diff engine.
///
/// Foreign-key inference is a heuristic and is disabled by default: a
/// desired schema that declares its foreign keys explicitly never needs it.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Whether to infer foreign keys from column naming conventions.
    pub infer_foreign_keys: bool,
    /// Whether an inference candidate must also match the referenced
    /// column's type. Only consulted when inference is enabled.
    pub require_type_match: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            infer_foreign_keys: false,
            require_type_match: true,
        }
    }
}

impl DiffOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables foreign-key inference.
    #[must_use]
    pub fn with_foreign_key_inference(mut self) -> Self {
        self.infer_foreign_keys = true;
        self
    }
}

/// Compares two schemas and returns the edits that transform `live` into
/// `desired`.
///
/// # Errors
/// Returns a [`DiffError`] when the schemas cannot be reconciled
/// deterministically: an ambiguous inferred foreign key, a foreign key
/// referencing a missing table or column, or a changed enumeration. Errors
/// are terminal; no partial edit list is produced.
pub fn diff(desired: &Schema, live: &Schema, options: &DiffOptions) -> Result<Vec<Edit>, DiffError> {
    let desired = infer_foreign_keys(desired, options)?;
    check_references(&desired)?;

    let mut edits = Vec::new();

    for (name, definition) in &desired.enums {
        match live.enums.get(name) {
            None => edits.push(Edit::enum_added(name.clone(), definition.labels.clone())),
            Some(existing) if existing != definition => {
                return Err(DiffError::UnsupportedEnumChange { name: name.clone() });
            }
            Some(_) => {}
        }
    }

    for (name, table) in &desired.tables {
        match live.tables.get(name) {
            None => edits.push(Edit::TableAdded {
                table: name.clone(),
                definition: table.clone(),
            }),
            Some(live_table) => diff_table(name, live_table, table, &mut edits),
        }
    }

    for name in live.table_names() {
        if !desired.tables.contains_key(name) {
            edits.push(Edit::table_removed(name.clone()));
        }
    }

    debug!(edits = edits.len(), "schema diff complete");
    Ok(edits)
}

/// Diffs one table present in both schemas, column by column and constraint
/// by constraint.
fn diff_table(name: &TableName, live: &Table, desired: &Table, edits: &mut Vec<Edit>) {
    for (column_name, column) in &desired.columns {
        match live.columns.get(column_name) {
            None => edits.push(Edit::ColumnAdded {
                table: name.clone(),
                column: column_name.clone(),
                definition: column.clone(),
            }),
            Some(live_column) => diff_column(name, column_name, live_column, column, edits),
        }
    }

    for column_name in live.columns.keys() {
        if !desired.columns.contains_key(column_name) {
            edits.push(Edit::column_removed(name.clone(), column_name.clone()));
        }
    }

    // Removals go first so a constraint redefined under the same name is
    // dropped before its replacement is added.
    for constraint in live.constraints.difference(&desired.constraints) {
        edits.push(Edit::constraint_removed(name.clone(), constraint.clone()));
    }
    for constraint in desired.constraints.difference(&live.constraints) {
        edits.push(Edit::constraint_added(name.clone(), constraint.clone()));
    }
}

/// Diffs one column present in both versions of a table. Constraint deltas
/// are per-constraint edits, not a bulk replace.
fn diff_column(
    table: &TableName,
    column: &ColumnName,
    live: &Column,
    desired: &Column,
    edits: &mut Vec<Edit>,
) {
    if live.column_type != desired.column_type {
        edits.push(Edit::ColumnTypeChanged {
            table: table.clone(),
            column: column.clone(),
            old: live.column_type.clone(),
            new: desired.column_type.clone(),
        });
    }

    // Same removal-first order as table constraints, so a changed DEFAULT
    // drops the old expression before setting the new one.
    for constraint in live.constraints.difference(&desired.constraints) {
        edits.push(Edit::ColumnConstraintRemoved {
            table: table.clone(),
            column: column.clone(),
            constraint: constraint.clone(),
        });
    }
    for constraint in desired.constraints.difference(&live.constraints) {
        edits.push(Edit::ColumnConstraintAdded {
            table: table.clone(),
            column: column.clone(),
            constraint: constraint.clone(),
        });
    }
}

/// Expands the desired schema with foreign keys inferred from column naming
/// conventions, plus the paired `IsForeignKeyOf` markers on the referenced
/// tables.
///
/// A column `prefix_suffix` is an inference candidate when `prefix` names a
/// table whose primary key contains a column `suffix` (optionally with a
/// matching type). Columns already covered by a declared foreign key are
/// skipped. Exactly one candidate infers a key; more than one is an error.
fn infer_foreign_keys(schema: &Schema, options: &DiffOptions) -> Result<Schema, DiffError> {
    let mut expanded = schema.clone();
    if !options.infer_foreign_keys {
        return Ok(expanded);
    }

    for (table_name, table) in &schema.tables {
        let covered: BTreeSet<&ColumnName> = table
            .constraints
            .iter()
            .filter_map(|c| match c {
                TableConstraint::ForeignKey { columns, .. } => {
                    Some(columns.iter().map(|(local, _)| local))
                }
                _ => None,
            })
            .flatten()
            .collect();

        for (column_name, column) in &table.columns {
            if covered.contains(column_name) {
                continue;
            }
            let candidates = candidate_references(schema, column_name, column, options);
            match candidates.as_slice() {
                [] => {}
                [(referenced_table, referenced_column)] => {
                    debug!(
                        table = %table_name,
                        column = %column_name,
                        referenced = %referenced_table,
                        "inferred foreign key"
                    );
                    record_inference(
                        &mut expanded,
                        table_name,
                        column_name,
                        referenced_table,
                        referenced_column,
                    );
                }
                _ => {
                    return Err(DiffError::AmbiguousForeignKey {
                        table: table_name.clone(),
                        column: column_name.clone(),
                        candidates,
                    });
                }
            }
        }
    }

    Ok(expanded)
}

/// All (referenced table, referenced column) pairs a column name can
/// resolve to. Every underscore in the name is tried as the split point.
fn candidate_references(
    schema: &Schema,
    column_name: &ColumnName,
    column: &Column,
    options: &DiffOptions,
) -> Vec<(TableName, ColumnName)> {
    let name = column_name.as_str();
    let mut candidates = Vec::new();

    for (idx, _) in name.match_indices('_') {
        let referenced_table = TableName::from(&name[..idx]);
        let referenced_column = ColumnName::from(&name[idx + 1..]);

        let Some(target) = schema.get_table(&referenced_table) else {
            continue;
        };
        let Some(pk) = target.primary_key_columns() else {
            continue;
        };
        if !pk.contains(&referenced_column) {
            continue;
        }
        if options.require_type_match {
            let matches = target
                .get_column(&referenced_column)
                .is_some_and(|c| c.column_type == column.column_type);
            if !matches {
                continue;
            }
        }

        let candidate = (referenced_table, referenced_column);
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }

    candidates
}

/// Inserts an inferred foreign key into the referencing table and the
/// paired marker into the referenced table of the expanded schema.
fn record_inference(
    expanded: &mut Schema,
    table: &TableName,
    column: &ColumnName,
    referenced_table: &TableName,
    referenced_column: &ColumnName,
) {
    let name = ConstraintName::new(format!("{table}_{column}_fkey"));
    if let Some(t) = expanded.tables.get_mut(table) {
        t.constraints.insert(TableConstraint::ForeignKey {
            name,
            referenced_table: referenced_table.clone(),
            columns: vec![(column.clone(), referenced_column.clone())],
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        });
    }
    if let Some(t) = expanded.tables.get_mut(referenced_table) {
        t.constraints.insert(TableConstraint::IsForeignKeyOf {
            table: table.clone(),
            columns: vec![column.clone()],
        });
    }
}

/// Verifies that every foreign key in the schema references a table and
/// columns that exist in the same schema.
fn check_references(schema: &Schema) -> Result<(), DiffError> {
    for (table_name, table) in &schema.tables {
        for constraint in &table.constraints {
            let TableConstraint::ForeignKey {
                name,
                referenced_table,
                columns,
                ..
            } = constraint
            else {
                continue;
            };
            let target = schema.get_table(referenced_table);
            for (_, referenced_column) in columns {
                let exists = target.is_some_and(|t| t.columns.contains_key(referenced_column));
                if !exists {
                    return Err(DiffError::MissingReference {
                        table: table_name.clone(),
                        constraint: name.as_str().to_string(),
                        referenced_table: referenced_table.clone(),
                        referenced_column: referenced_column.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnConstraint, ColumnType};

    fn users() -> Table {
        Table::new()
            .column("id", Column::new(ColumnType::BigInt).not_null())
            .column("name", Column::new(ColumnType::varchar(255)))
            .primary_key("users_pkey", ["id"])
    }

    #[test]
    fn test_no_op_stability() {
        let schema = Schema::new().table("users", users());
        let edits = diff(&schema, &schema, &DiffOptions::new()).unwrap();
        assert!(edits.is_empty());
    }

    #[test]
    fn test_new_table() {
        let desired = Schema::new().table("users", users());
        let live = Schema::new();

        let edits = diff(&desired, &live, &DiffOptions::new()).unwrap();
        assert_eq!(edits.len(), 1);
        assert!(matches!(edits[0], Edit::TableAdded { .. }));
    }

    #[test]
    fn test_dropped_table() {
        let desired = Schema::new();
        let live = Schema::new().table("users", users());

        let edits = diff(&desired, &live, &DiffOptions::new()).unwrap();
        assert_eq!(edits, vec![Edit::table_removed("users")]);
    }

    #[test]
    fn test_added_and_dropped_column() {
        let desired = Schema::new().table(
            "users",
            users().column("email", Column::new(ColumnType::varchar(255))),
        );
        let live = Schema::new().table(
            "users",
            users().column("legacy", Column::new(ColumnType::Boolean)),
        );

        let edits = diff(&desired, &live, &DiffOptions::new()).unwrap();
        assert_eq!(edits.len(), 2);
        assert!(edits
            .iter()
            .any(|e| matches!(e, Edit::ColumnAdded { column, .. } if column.as_str() == "email")));
        assert!(edits
            .iter()
            .any(|e| matches!(e, Edit::ColumnRemoved { column, .. } if column.as_str() == "legacy")));
    }

    #[test]
    fn test_column_type_change() {
        let desired = Schema::new().table(
            "users",
            Table::new().column("age", Column::new(ColumnType::BigInt)),
        );
        let live = Schema::new().table(
            "users",
            Table::new().column("age", Column::new(ColumnType::Integer)),
        );

        let edits = diff(&desired, &live, &DiffOptions::new()).unwrap();
        assert_eq!(
            edits,
            vec![Edit::ColumnTypeChanged {
                table: "users".into(),
                column: "age".into(),
                old: ColumnType::Integer,
                new: ColumnType::BigInt,
            }]
        );
    }

    #[test]
    fn test_column_constraint_delta() {
        let desired = Schema::new().table(
            "users",
            Table::new().column(
                "name",
                Column::new(ColumnType::varchar(255))
                    .not_null()
                    .default_expr("'anon'"),
            ),
        );
        let live = Schema::new().table(
            "users",
            Table::new().column("name", Column::new(ColumnType::varchar(255)).not_null()),
        );

        let edits = diff(&desired, &live, &DiffOptions::new()).unwrap();
        assert_eq!(
            edits,
            vec![Edit::ColumnConstraintAdded {
                table: "users".into(),
                column: "name".into(),
                constraint: ColumnConstraint::Default("'anon'".to_string()),
            }]
        );
    }

    #[test]
    fn test_table_constraint_delta() {
        let unique = TableConstraint::Unique {
            name: "users_name_key".into(),
            columns: vec!["name".into()],
        };
        let desired = Schema::new().table("users", users().constraint(unique.clone()));
        let live = Schema::new().table("users", users());

        let edits = diff(&desired, &live, &DiffOptions::new()).unwrap();
        assert_eq!(edits, vec![Edit::constraint_added("users", unique)]);
    }

    #[test]
    fn test_constraint_redefinition_removes_before_adding() {
        // Same constraint name, different definition: the old one must be
        // dropped before the replacement is added, or the ADD collides
        // with the existing name.
        let old = TableConstraint::Unique {
            name: "users_key".into(),
            columns: vec!["a".into()],
        };
        let new = TableConstraint::Unique {
            name: "users_key".into(),
            columns: vec!["b".into()],
        };
        let base = Table::new()
            .column("a", Column::new(ColumnType::Integer))
            .column("b", Column::new(ColumnType::Integer));
        let desired = Schema::new().table("users", base.clone().constraint(new.clone()));
        let live = Schema::new().table("users", base.constraint(old.clone()));

        let edits = diff(&desired, &live, &DiffOptions::new()).unwrap();
        assert_eq!(
            edits,
            vec![
                Edit::constraint_removed("users", old),
                Edit::constraint_added("users", new),
            ]
        );
    }

    #[test]
    fn test_changed_default_removes_old_before_new() {
        let desired = Schema::new().table(
            "users",
            Table::new().column(
                "name",
                Column::new(ColumnType::varchar(255)).default_expr("'new'"),
            ),
        );
        let live = Schema::new().table(
            "users",
            Table::new().column(
                "name",
                Column::new(ColumnType::varchar(255)).default_expr("'old'"),
            ),
        );

        let edits = diff(&desired, &live, &DiffOptions::new()).unwrap();
        assert_eq!(
            edits,
            vec![
                Edit::ColumnConstraintRemoved {
                    table: "users".into(),
                    column: "name".into(),
                    constraint: ColumnConstraint::Default("'old'".to_string()),
                },
                Edit::ColumnConstraintAdded {
                    table: "users".into(),
                    column: "name".into(),
                    constraint: ColumnConstraint::Default("'new'".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_enum_added() {
        let desired =
            Schema::new().enumeration("mood", crate::schema::Enumeration::new(["sad", "happy"]));
        let live = Schema::new();

        let edits = diff(&desired, &live, &DiffOptions::new()).unwrap();
        assert_eq!(edits, vec![Edit::enum_added("mood", ["sad", "happy"])]);
    }

    #[test]
    fn test_enum_change_unsupported() {
        let desired =
            Schema::new().enumeration("mood", crate::schema::Enumeration::new(["sad", "happy"]));
        let live = Schema::new().enumeration("mood", crate::schema::Enumeration::new(["sad"]));

        let err = diff(&desired, &live, &DiffOptions::new()).unwrap_err();
        assert!(matches!(err, DiffError::UnsupportedEnumChange { .. }));
    }

    #[test]
    fn test_missing_reference() {
        let fk = TableConstraint::ForeignKey {
            name: "orders_user_fkey".into(),
            referenced_table: "users".into(),
            columns: vec![("user_id".into(), "id".into())],
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        };
        let desired = Schema::new().table(
            "orders",
            Table::new()
                .column("user_id", Column::new(ColumnType::BigInt))
                .constraint(fk),
        );

        let err = diff(&desired, &Schema::new(), &DiffOptions::new()).unwrap_err();
        assert!(matches!(err, DiffError::MissingReference { .. }));
    }

    #[test]
    fn test_inference_unambiguous() {
        let desired = Schema::new().table("users", users()).table(
            "orders",
            Table::new()
                .column("id", Column::new(ColumnType::BigInt).not_null())
                .column("users_id", Column::new(ColumnType::BigInt))
                .primary_key("orders_pkey", ["id"]),
        );
        let live = Schema::new().table("users", users());

        let options = DiffOptions::new().with_foreign_key_inference();
        let edits = diff(&desired, &live, &options).unwrap();

        // One TableAdded for orders (carrying the inferred key inline) and
        // one marker edit on the existing users table.
        assert_eq!(edits.len(), 2);
        let added = edits
            .iter()
            .find_map(|e| match e {
                Edit::TableAdded { definition, .. } => Some(definition),
                _ => None,
            })
            .unwrap();
        assert!(added.constraints.iter().any(|c| matches!(
            c,
            TableConstraint::ForeignKey { name, referenced_table, .. }
                if name.as_str() == "orders_users_id_fkey"
                    && referenced_table.as_str() == "users"
        )));
        assert!(edits.iter().any(|e| matches!(
            e,
            Edit::TableConstraintAdded { table, constraint }
                if table.as_str() == "users" && constraint.is_marker()
        )));
    }

    #[test]
    fn test_inference_ambiguous() {
        // "user_archive_id" splits as user(archive_id) and user_archive(id);
        // both targets exist with matching primary keys.
        let pk_table = |pk: &str| {
            Table::new()
                .column(pk, Column::new(ColumnType::BigInt).not_null())
                .primary_key(format!("{pk}_pkey"), [pk])
        };
        let desired = Schema::new()
            .table("user", pk_table("archive_id"))
            .table("user_archive", pk_table("id"))
            .table(
                "orders",
                Table::new()
                    .column("oid", Column::new(ColumnType::BigInt).not_null())
                    .column("user_archive_id", Column::new(ColumnType::BigInt))
                    .primary_key("orders_pkey", ["oid"]),
            );

        let options = DiffOptions::new().with_foreign_key_inference();
        let err = diff(&desired, &Schema::new(), &options).unwrap_err();
        match err {
            DiffError::AmbiguousForeignKey {
                table,
                column,
                candidates,
            } => {
                assert_eq!(table.as_str(), "orders");
                assert_eq!(column.as_str(), "user_archive_id");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected AmbiguousForeignKey, got {other:?}"),
        }
    }

    #[test]
    fn test_inference_skips_declared_keys() {
        let fk = TableConstraint::ForeignKey {
            name: "orders_users_id_fkey".into(),
            referenced_table: "users".into(),
            columns: vec![("users_id".into(), "id".into())],
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::NoAction,
        };
        let orders = Table::new()
            .column("id", Column::new(ColumnType::BigInt).not_null())
            .column("users_id", Column::new(ColumnType::BigInt))
            .primary_key("orders_pkey", ["id"])
            .constraint(fk);
        let schema = Schema::new().table("users", users()).table("orders", orders);

        let options = DiffOptions::new().with_foreign_key_inference();
        let edits = diff(&schema, &schema, &options).unwrap();
        assert!(edits.is_empty());
    }

    /// Applies edits to a schema value the way the database conceptually
    /// would, for the convergence test below.
    fn apply(mut schema: Schema, edits: &[Edit]) -> Schema {
        for edit in edits {
            match edit.clone() {
                Edit::TableAdded { table, definition } => {
                    schema.tables.insert(table, definition);
                }
                Edit::TableRemoved { table } => {
                    schema.tables.remove(&table);
                }
                Edit::ColumnAdded {
                    table,
                    column,
                    definition,
                } => {
                    schema
                        .tables
                        .get_mut(&table)
                        .unwrap()
                        .columns
                        .insert(column, definition);
                }
                Edit::ColumnRemoved { table, column } => {
                    schema
                        .tables
                        .get_mut(&table)
                        .unwrap()
                        .columns
                        .remove(&column);
                }
                Edit::ColumnTypeChanged {
                    table, column, new, ..
                } => {
                    schema
                        .tables
                        .get_mut(&table)
                        .unwrap()
                        .columns
                        .get_mut(&column)
                        .unwrap()
                        .column_type = new;
                }
                Edit::ColumnConstraintAdded {
                    table,
                    column,
                    constraint,
                } => {
                    schema
                        .tables
                        .get_mut(&table)
                        .unwrap()
                        .columns
                        .get_mut(&column)
                        .unwrap()
                        .constraints
                        .insert(constraint);
                }
                Edit::ColumnConstraintRemoved {
                    table,
                    column,
                    constraint,
                } => {
                    schema
                        .tables
                        .get_mut(&table)
                        .unwrap()
                        .columns
                        .get_mut(&column)
                        .unwrap()
                        .constraints
                        .remove(&constraint);
                }
                Edit::TableConstraintAdded { table, constraint } => {
                    schema
                        .tables
                        .get_mut(&table)
                        .unwrap()
                        .constraints
                        .insert(constraint);
                }
                Edit::TableConstraintRemoved { table, constraint } => {
                    schema
                        .tables
                        .get_mut(&table)
                        .unwrap()
                        .constraints
                        .remove(&constraint);
                }
                Edit::EnumTypeAdded { name, labels } => {
                    schema
                        .enums
                        .insert(name, crate::schema::Enumeration { labels });
                }
            }
        }
        schema
    }

    #[test]
    fn test_convergence_after_apply() {
        let desired = Schema::new()
            .table("users", users())
            .table(
                "orders",
                Table::new()
                    .column("id", Column::new(ColumnType::BigInt).not_null())
                    .column("users_id", Column::new(ColumnType::BigInt))
                    .primary_key("orders_pkey", ["id"]),
            )
            .enumeration("mood", crate::schema::Enumeration::new(["sad", "happy"]));
        let live = Schema::new().table(
            "users",
            Table::new()
                .column("id", Column::new(ColumnType::BigInt).not_null())
                .column("legacy", Column::new(ColumnType::Boolean))
                .primary_key("users_pkey", ["id"]),
        );

        let options = DiffOptions::new().with_foreign_key_inference();
        let edits = diff(&desired, &live, &options).unwrap();
        let migrated = apply(live, &edits);

        let again = diff(&desired, &migrated, &options).unwrap();
        assert!(again.is_empty(), "expected convergence, got {again:?}");
    }
}
