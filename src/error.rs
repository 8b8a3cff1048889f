//! Error types for the migration pipeline.

use crate::schema::{ColumnName, ColumnType, EnumName, TableName};

/// Reasons the diff engine could not produce a deterministic edit list.
///
/// A diff error is terminal for the whole run: no partial edit list is ever
/// produced, and the migration workflow stores the error so that execution
/// and printing both surface it instead of applying anything.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// A column name matched more than one candidate referenced table and
    /// column during foreign-key inference.
    #[error(
        "ambiguous foreign key for column '{column}' in table '{table}': \
         candidates are {}",
        .candidates
            .iter()
            .map(|(t, c)| format!("{t}({c})"))
            .collect::<Vec<_>>()
            .join(", ")
    )]
    AmbiguousForeignKey {
        /// The referencing table.
        table: TableName,
        /// The column whose reference could not be resolved.
        column: ColumnName,
        /// All candidate (referenced table, referenced column) pairs.
        candidates: Vec<(TableName, ColumnName)>,
    },

    /// A foreign key names a referenced table or column that does not exist
    /// in the desired schema.
    #[error(
        "foreign key '{constraint}' on table '{table}' references \
         '{referenced_table}({referenced_column})' which does not exist"
    )]
    MissingReference {
        /// The referencing table.
        table: TableName,
        /// The offending constraint's name.
        constraint: String,
        /// The referenced table.
        referenced_table: TableName,
        /// The referenced column.
        referenced_column: ColumnName,
    },

    /// The label set of an existing enumeration differs between the desired
    /// and live schemas. Altering enum values is not supported.
    #[error("enum type '{name}' changed its labels; altering enum values is not supported")]
    UnsupportedEnumChange {
        /// The enumeration whose labels changed.
        name: EnumName,
    },
}

/// A column/type combination with no defined textual mapping.
///
/// Rendering errors are treated as schema-design defects, not runtime
/// conditions: they abort the run immediately, since silently emitting
/// wrong SQL is worse than stopping.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The type has no DDL representation in this dialect.
    #[error("column type {0:?} has no DDL representation")]
    UnsupportedType(ColumnType),

    /// An `IsForeignKeyOf` marker reached the renderer. Sequencing must
    /// filter markers out before rendering.
    #[error("IsForeignKeyOf marker on table '{table}' reached the renderer")]
    MarkerConstraint {
        /// Table the marker edit targeted.
        table: TableName,
    },
}

/// Errors surfaced by a full migration run.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The diff engine could not reconcile the two schemas.
    #[error("schema diff failed: {0}")]
    Diff(#[from] DiffError),

    /// An edit could not be rendered as DDL.
    #[error("DDL rendering failed: {0}")]
    Render(#[from] RenderError),

    /// Introspection or statement execution failed at the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Writing a printed migration to its output failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
