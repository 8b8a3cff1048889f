//! Atomic schema edits.
//!
//! An [`Edit`] is one atomic, independently renderable schema change. The
//! diff engine produces them, the sequencer orders them, and the renderer
//! turns each one into a single DDL statement. Edits are immutable value
//! objects with no identity beyond their fields.

use serde::{Deserialize, Serialize};

use crate::schema::{
    Column, ColumnConstraint, ColumnName, ColumnType, EnumName, Table, TableConstraint, TableName,
};

/// A single atomic schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edit {
    /// Create a table with its full definition.
    TableAdded {
        /// Table name.
        table: TableName,
        /// Table definition.
        definition: Table,
    },

    /// Drop a table.
    TableRemoved {
        /// Table name.
        table: TableName,
    },

    /// Add a column to an existing table.
    ColumnAdded {
        /// Table name.
        table: TableName,
        /// Column name.
        column: ColumnName,
        /// Column definition.
        definition: Column,
    },

    /// Drop a column from an existing table.
    ColumnRemoved {
        /// Table name.
        table: TableName,
        /// Column name.
        column: ColumnName,
    },

    /// Change a column's type. The old type is informational only and is
    /// never rendered.
    ColumnTypeChanged {
        /// Table name.
        table: TableName,
        /// Column name.
        column: ColumnName,
        /// Type currently in the live schema.
        old: ColumnType,
        /// Type required by the desired schema.
        new: ColumnType,
    },

    /// Add a column-level constraint.
    ColumnConstraintAdded {
        /// Table name.
        table: TableName,
        /// Column name.
        column: ColumnName,
        /// Constraint to add.
        constraint: ColumnConstraint,
    },

    /// Remove a column-level constraint.
    ColumnConstraintRemoved {
        /// Table name.
        table: TableName,
        /// Column name.
        column: ColumnName,
        /// Constraint to remove.
        constraint: ColumnConstraint,
    },

    /// Add a table-level constraint.
    TableConstraintAdded {
        /// Table name.
        table: TableName,
        /// Constraint to add.
        constraint: TableConstraint,
    },

    /// Remove a table-level constraint.
    TableConstraintRemoved {
        /// Table name.
        table: TableName,
        /// Constraint to remove.
        constraint: TableConstraint,
    },

    /// Create an enumeration type.
    EnumTypeAdded {
        /// Enumeration name.
        name: EnumName,
        /// Labels in declaration order.
        labels: Vec<String>,
    },
}

impl Edit {
    /// Creates a `TableAdded` edit.
    #[must_use]
    pub fn table_added(table: impl Into<TableName>, definition: Table) -> Self {
        Self::TableAdded {
            table: table.into(),
            definition,
        }
    }

    /// Creates a `TableRemoved` edit.
    #[must_use]
    pub fn table_removed(table: impl Into<TableName>) -> Self {
        Self::TableRemoved {
            table: table.into(),
        }
    }

    /// Creates a `ColumnAdded` edit.
    #[must_use]
    pub fn column_added(
        table: impl Into<TableName>,
        column: impl Into<ColumnName>,
        definition: Column,
    ) -> Self {
        Self::ColumnAdded {
            table: table.into(),
            column: column.into(),
            definition,
        }
    }

    /// Creates a `ColumnRemoved` edit.
    #[must_use]
    pub fn column_removed(table: impl Into<TableName>, column: impl Into<ColumnName>) -> Self {
        Self::ColumnRemoved {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a `TableConstraintAdded` edit.
    #[must_use]
    pub fn constraint_added(table: impl Into<TableName>, constraint: TableConstraint) -> Self {
        Self::TableConstraintAdded {
            table: table.into(),
            constraint,
        }
    }

    /// Creates a `TableConstraintRemoved` edit.
    #[must_use]
    pub fn constraint_removed(table: impl Into<TableName>, constraint: TableConstraint) -> Self {
        Self::TableConstraintRemoved {
            table: table.into(),
            constraint,
        }
    }

    /// Creates an `EnumTypeAdded` edit.
    #[must_use]
    pub fn enum_added(
        name: impl Into<EnumName>,
        labels: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::EnumTypeAdded {
            name: name.into(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// True if this edit creates or deletes a table or column, as opposed
    /// to altering something that already exists. The sequencer applies
    /// these first.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::TableAdded { .. }
                | Self::TableRemoved { .. }
                | Self::ColumnAdded { .. }
                | Self::ColumnRemoved { .. }
        )
    }

    /// True if this edit carries an `IsForeignKeyOf` bookkeeping marker.
    /// Marker edits drive foreign-key inference only and have no DDL
    /// representation.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        match self {
            Self::TableConstraintAdded { constraint, .. }
            | Self::TableConstraintRemoved { constraint, .. } => constraint.is_marker(),
            _ => false,
        }
    }

    /// Returns a human-readable description of this edit.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::TableAdded { table, .. } => format!("Create table '{table}'"),
            Self::TableRemoved { table } => format!("Drop table '{table}'"),
            Self::ColumnAdded { table, column, .. } => {
                format!("Add column '{column}' to table '{table}'")
            }
            Self::ColumnRemoved { table, column } => {
                format!("Drop column '{column}' from table '{table}'")
            }
            Self::ColumnTypeChanged { table, column, .. } => {
                format!("Change type of column '{column}' in table '{table}'")
            }
            Self::ColumnConstraintAdded { table, column, .. } => {
                format!("Add constraint to column '{column}' in table '{table}'")
            }
            Self::ColumnConstraintRemoved { table, column, .. } => {
                format!("Drop constraint from column '{column}' in table '{table}'")
            }
            Self::TableConstraintAdded { table, constraint } => match constraint.name() {
                Some(name) => format!("Add constraint '{name}' to table '{table}'"),
                None => format!("Record inferred relationship on table '{table}'"),
            },
            Self::TableConstraintRemoved { table, constraint } => match constraint.name() {
                Some(name) => format!("Drop constraint '{name}' from table '{table}'"),
                None => format!("Forget inferred relationship on table '{table}'"),
            },
            Self::EnumTypeAdded { name, .. } => format!("Create enum type '{name}'"),
        }
    }
}
