//! DDL rendering for PostgreSQL.
//!
//! Maps each [`Edit`] to exactly one executable statement. Rendering is
//! pure text production with no side effects.
//!
//! Escaping is minimal: identifiers are wrapped in double quotes and string
//! literals in single quotes, with no escaping of embedded quote
//! characters. Identifiers and literal values containing quotes are not
//! supported.

use crate::edit::Edit;
use crate::error::RenderError;
use crate::schema::{
    Column, ColumnConstraint, ColumnName, ColumnType, TableConstraint, TableName,
};

/// Renders edits as PostgreSQL DDL statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresRenderer;

impl PostgresRenderer {
    /// Creates a new renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders one edit as one statement, terminated by `;`.
    ///
    /// # Errors
    /// Returns a [`RenderError`] for types with no DDL representation and
    /// for `IsForeignKeyOf` marker edits, which sequencing must have
    /// filtered out. Rendering errors are fatal to the migration run.
    pub fn render(&self, edit: &Edit) -> Result<String, RenderError> {
        match edit {
            Edit::TableAdded { table, definition } => {
                let mut items = Vec::new();
                for (name, column) in &definition.columns {
                    items.push(format!(
                        "{} {}",
                        quote_identifier(name.as_str()),
                        self.type_name(&column.column_type)?
                    ));
                }
                for constraint in &definition.constraints {
                    if constraint.is_marker() {
                        continue;
                    }
                    items.push(self.table_constraint(table, constraint)?);
                }
                Ok(format!(
                    "CREATE TABLE {} ({});",
                    quote_identifier(table.as_str()),
                    items.join(", ")
                ))
            }

            Edit::TableRemoved { table } => {
                Ok(format!("DROP TABLE {};", quote_identifier(table.as_str())))
            }

            Edit::ColumnAdded {
                table,
                column,
                definition,
            } => Ok(format!(
                "ALTER TABLE {} ADD COLUMN {} {} {};",
                quote_identifier(table.as_str()),
                quote_identifier(column.as_str()),
                self.type_name(&definition.column_type)?,
                self.column_constraints(definition)
            )),

            Edit::ColumnRemoved { table, column } => Ok(format!(
                "ALTER TABLE {} DROP COLUMN {};",
                quote_identifier(table.as_str()),
                quote_identifier(column.as_str())
            )),

            Edit::ColumnTypeChanged {
                table, column, new, ..
            } => Ok(format!(
                "ALTER TABLE {} ALTER COLUMN {} TYPE {};",
                quote_identifier(table.as_str()),
                quote_identifier(column.as_str()),
                self.type_name(new)?
            )),

            Edit::ColumnConstraintAdded {
                table,
                column,
                constraint,
            } => Ok(self.alter_column_constraint(table, column, "SET", constraint)),

            Edit::ColumnConstraintRemoved {
                table,
                column,
                constraint,
            } => Ok(self.alter_column_constraint(table, column, "DROP", constraint)),

            Edit::TableConstraintAdded { table, constraint } => Ok(format!(
                "ALTER TABLE {} ADD {};",
                quote_identifier(table.as_str()),
                self.table_constraint(table, constraint)?
            )),

            Edit::TableConstraintRemoved { table, constraint } => {
                let name = constraint
                    .name()
                    .ok_or_else(|| RenderError::MarkerConstraint {
                        table: table.clone(),
                    })?;
                Ok(format!(
                    "ALTER TABLE {} DROP CONSTRAINT {};",
                    quote_identifier(table.as_str()),
                    quote_identifier(name.as_str())
                ))
            }

            Edit::EnumTypeAdded { name, labels } => {
                let labels: Vec<String> =
                    labels.iter().map(|l| format!("'{l}'")).collect();
                Ok(format!(
                    "CREATE TYPE {} AS ENUM ({});",
                    quote_identifier(name.as_str()),
                    labels.join(",")
                ))
            }
        }
    }

    /// Renders the type name, with precision parameters and timezone
    /// suffixes where present.
    ///
    /// # Errors
    /// Returns [`RenderError::UnsupportedType`] for `Interval`, the large
    /// object types, `Array` and `Row`.
    pub fn type_name(&self, column_type: &ColumnType) -> Result<String, RenderError> {
        let rendered = match column_type {
            ColumnType::Char {
                length,
                character_set,
            } => with_charset(with_length("CHAR", *length), character_set.as_deref()),
            ColumnType::VarChar {
                length,
                character_set,
            } => with_charset(with_length("VARCHAR", *length), character_set.as_deref()),
            ColumnType::NationalChar { length } => with_length("NATIONAL CHAR", *length),
            ColumnType::NationalVarChar { length } => {
                with_length("NATIONAL CHAR VARYING", *length)
            }
            ColumnType::Bit { length } => with_length("BIT", *length),
            ColumnType::VarBit { length } => with_length("BIT VARYING", *length),
            ColumnType::Numeric { precision, scale } => {
                with_precision("NUMERIC", *precision, *scale)
            }
            ColumnType::Decimal { precision, scale } => {
                with_precision("DECIMAL", *precision, *scale)
            }
            ColumnType::Integer => "INT".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float { precision } => with_length("FLOAT", *precision),
            ColumnType::Real => "REAL".to_string(),
            ColumnType::DoublePrecision => "DOUBLE PRECISION".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time {
                precision,
                with_time_zone,
            } => with_time_zone_suffix(with_length("TIME", *precision), *with_time_zone),
            ColumnType::Timestamp {
                precision,
                with_time_zone,
            } => with_time_zone_suffix(with_length("TIMESTAMP", *precision), *with_time_zone),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Jsonb => "JSONB".to_string(),
            ColumnType::Int4Range => "INT4RANGE".to_string(),
            ColumnType::Int8Range => "INT8RANGE".to_string(),
            ColumnType::NumRange => "NUMRANGE".to_string(),
            ColumnType::TsRange => "TSRANGE".to_string(),
            ColumnType::TsTzRange => "TSTZRANGE".to_string(),
            ColumnType::DateRange => "DATERANGE".to_string(),
            ColumnType::Domain(name) => quote_identifier(name),
            ColumnType::Enumeration(name) => quote_identifier(name.as_str()),
            ColumnType::Interval
            | ColumnType::CharacterLargeObject
            | ColumnType::BinaryLargeObject
            | ColumnType::Array
            | ColumnType::Row => {
                return Err(RenderError::UnsupportedType(column_type.clone()));
            }
        };
        Ok(rendered)
    }

    /// Renders a column constraint.
    #[must_use]
    pub fn column_constraint(&self, constraint: &ColumnConstraint) -> String {
        match constraint {
            ColumnConstraint::NotNull => "NOT NULL".to_string(),
            ColumnConstraint::Default(expr) => format!("DEFAULT {expr}"),
        }
    }

    /// Renders a named table constraint as its inline `CONSTRAINT` clause.
    /// No space separates the quoted name from the constraint body.
    ///
    /// # Errors
    /// Returns [`RenderError::MarkerConstraint`] for `IsForeignKeyOf`,
    /// which has no DDL representation.
    pub fn table_constraint(
        &self,
        table: &TableName,
        constraint: &TableConstraint,
    ) -> Result<String, RenderError> {
        let (name, body) = match constraint {
            TableConstraint::PrimaryKey { name, columns } => {
                (name, format!("PRIMARY KEY ({})", column_list(columns)))
            }
            TableConstraint::Unique { name, columns } => {
                (name, format!("UNIQUE ({})", column_list(columns)))
            }
            TableConstraint::ForeignKey {
                name,
                referenced_table,
                columns,
                on_delete,
                on_update,
            } => {
                let local: Vec<ColumnName> = columns.iter().map(|(l, _)| l.clone()).collect();
                let referenced: Vec<ColumnName> =
                    columns.iter().map(|(_, r)| r.clone()).collect();
                let mut body = format!(
                    "FOREIGN KEY ({}) REFERENCES {} ({})",
                    column_list(&local),
                    quote_identifier(referenced_table.as_str()),
                    column_list(&referenced)
                );
                if let Some(action) = on_delete.as_sql() {
                    body.push_str(" ON DELETE ");
                    body.push_str(action);
                }
                if let Some(action) = on_update.as_sql() {
                    body.push_str(" ON UPDATE ");
                    body.push_str(action);
                }
                (name, body)
            }
            TableConstraint::IsForeignKeyOf { .. } => {
                return Err(RenderError::MarkerConstraint {
                    table: table.clone(),
                });
            }
        };
        Ok(format!(
            "CONSTRAINT {}{}",
            quote_identifier(name.as_str()),
            body
        ))
    }

    fn column_constraints(&self, column: &Column) -> String {
        column
            .constraints
            .iter()
            .map(|c| self.column_constraint(c))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn alter_column_constraint(
        &self,
        table: &TableName,
        column: &ColumnName,
        verb: &str,
        constraint: &ColumnConstraint,
    ) -> String {
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {} {};",
            quote_identifier(table.as_str()),
            quote_identifier(column.as_str()),
            verb,
            self.column_constraint(constraint)
        )
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}

fn column_list(columns: &[ColumnName]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn with_length(base: &str, length: Option<u32>) -> String {
    match length {
        Some(n) => format!("{base}({n})"),
        None => base.to_string(),
    }
}

fn with_precision(base: &str, precision: Option<u32>, scale: Option<u32>) -> String {
    match (precision, scale) {
        (Some(p), Some(s)) => format!("{base}({p}, {s})"),
        (Some(p), None) => format!("{base}({p})"),
        _ => base.to_string(),
    }
}

fn with_charset(base: String, character_set: Option<&str>) -> String {
    match character_set {
        Some(cs) => format!("{base} CHARACTER SET {cs}"),
        None => base,
    }
}

fn with_time_zone_suffix(base: String, with_time_zone: bool) -> String {
    if with_time_zone {
        format!("{base} WITH TIME ZONE")
    } else {
        base
    }
}
