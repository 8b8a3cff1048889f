//! Schema representation types.
//!
//! These types describe the structure of a database: tables, columns,
//! constraints and enumerations. They are pure data, shared by the desired
//! schema (what the code expects) and the live schema (what introspection
//! found). All transformations produce new values; nothing here mutates a
//! schema in place after construction.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! name_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new name.
            #[must_use]
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Returns the name as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_type! {
    /// Name of a table, unique within a [`Schema`].
    TableName
}
name_type! {
    /// Name of a column, unique within a [`Table`].
    ColumnName
}
name_type! {
    /// Name of a table constraint.
    ConstraintName
}
name_type! {
    /// Name of an enumeration type.
    EnumName
}

/// SQL column types known to the renderer.
///
/// The standard-SQL part of the taxonomy is closed; `Interval`, the large
/// object types, `Array` and `Row` are carried so introspection can report
/// them, but rendering any of them is a fatal error.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Fixed-length character string, optional length and character set.
    Char {
        /// Maximum length in characters.
        length: Option<u32>,
        /// `CHARACTER SET` clause, if any.
        character_set: Option<String>,
    },
    /// Variable-length character string, optional length and character set.
    VarChar {
        /// Maximum length in characters.
        length: Option<u32>,
        /// `CHARACTER SET` clause, if any.
        character_set: Option<String>,
    },
    /// Fixed-length national character string.
    NationalChar {
        /// Maximum length in characters.
        length: Option<u32>,
    },
    /// Variable-length national character string.
    NationalVarChar {
        /// Maximum length in characters.
        length: Option<u32>,
    },
    /// Fixed-length bit string.
    Bit {
        /// Length in bits.
        length: Option<u32>,
    },
    /// Variable-length bit string.
    VarBit {
        /// Maximum length in bits.
        length: Option<u32>,
    },
    /// Exact numeric with optional precision and scale.
    Numeric {
        /// Total number of digits.
        precision: Option<u32>,
        /// Digits after the decimal point.
        scale: Option<u32>,
    },
    /// Exact numeric, `DECIMAL` spelling.
    Decimal {
        /// Total number of digits.
        precision: Option<u32>,
        /// Digits after the decimal point.
        scale: Option<u32>,
    },
    /// 32-bit integer.
    Integer,
    /// 16-bit integer.
    SmallInt,
    /// 64-bit integer.
    BigInt,
    /// Approximate numeric with optional precision.
    Float {
        /// Binary precision.
        precision: Option<u32>,
    },
    /// Single-precision floating point.
    Real,
    /// Double-precision floating point.
    DoublePrecision,
    /// Calendar date.
    Date,
    /// Time of day, optional precision and timezone flag.
    Time {
        /// Fractional-seconds precision.
        precision: Option<u32>,
        /// Renders `WITH TIME ZONE` when set.
        with_time_zone: bool,
    },
    /// Date and time, optional precision and timezone flag.
    Timestamp {
        /// Fractional-seconds precision.
        precision: Option<u32>,
        /// Renders `WITH TIME ZONE` when set.
        with_time_zone: bool,
    },
    /// Interval. Not renderable.
    Interval,
    /// Boolean.
    Boolean,
    /// Character large object. Not renderable.
    CharacterLargeObject,
    /// Binary large object. Not renderable.
    BinaryLargeObject,
    /// Array type. Not renderable.
    Array,
    /// Row type. Not renderable.
    Row,
    /// Domain alias, rendered as its quoted name.
    Domain(String),
    /// PostgreSQL `JSON`.
    Json,
    /// PostgreSQL `JSONB`.
    Jsonb,
    /// PostgreSQL range over 32-bit integers.
    Int4Range,
    /// PostgreSQL range over 64-bit integers.
    Int8Range,
    /// PostgreSQL range over numerics.
    NumRange,
    /// PostgreSQL range over timestamps.
    TsRange,
    /// PostgreSQL range over timestamps with time zone.
    TsTzRange,
    /// PostgreSQL range over dates.
    DateRange,
    /// Reference to an enumeration type declared in the same schema.
    Enumeration(EnumName),
}

impl ColumnType {
    /// `VARCHAR(length)` without a character set.
    #[must_use]
    pub fn varchar(length: u32) -> Self {
        Self::VarChar {
            length: Some(length),
            character_set: None,
        }
    }

    /// `CHAR(length)` without a character set.
    #[must_use]
    pub fn char(length: u32) -> Self {
        Self::Char {
            length: Some(length),
            character_set: None,
        }
    }

    /// `NUMERIC(precision, scale)`.
    #[must_use]
    pub fn numeric(precision: u32, scale: u32) -> Self {
        Self::Numeric {
            precision: Some(precision),
            scale: Some(scale),
        }
    }

    /// `TIMESTAMP` without precision or time zone.
    #[must_use]
    pub fn timestamp() -> Self {
        Self::Timestamp {
            precision: None,
            with_time_zone: false,
        }
    }

    /// `TIMESTAMP WITH TIME ZONE` without precision.
    #[must_use]
    pub fn timestamptz() -> Self {
        Self::Timestamp {
            precision: None,
            with_time_zone: true,
        }
    }
}

/// Constraints attached to a single column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColumnConstraint {
    /// `NOT NULL`.
    NotNull,
    /// `DEFAULT <expression>`; the expression is a literal SQL fragment.
    Default(String),
}

/// Referential action for `ON DELETE` / `ON UPDATE` clauses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum ReferentialAction {
    /// No action; renders nothing.
    #[default]
    NoAction,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Reject the delete/update while referencing rows exist.
    Restrict,
    /// Set the referencing columns to NULL.
    SetNull,
    /// Set the referencing columns to their defaults.
    SetDefault,
}

impl ReferentialAction {
    /// SQL keyword for this action, or `None` for `NoAction` which is
    /// omitted from rendered clauses entirely.
    #[must_use]
    pub fn as_sql(&self) -> Option<&'static str> {
        match self {
            Self::NoAction => None,
            Self::Cascade => Some("CASCADE"),
            Self::Restrict => Some("RESTRICT"),
            Self::SetNull => Some("SET NULL"),
            Self::SetDefault => Some("SET DEFAULT"),
        }
    }
}

/// Table-level constraints.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableConstraint {
    /// `PRIMARY KEY` over an ordered set of columns.
    PrimaryKey {
        /// Constraint name.
        name: ConstraintName,
        /// Key columns in declaration order.
        columns: Vec<ColumnName>,
    },
    /// `UNIQUE` over an ordered set of columns.
    Unique {
        /// Constraint name.
        name: ConstraintName,
        /// Constrained columns in declaration order.
        columns: Vec<ColumnName>,
    },
    /// `FOREIGN KEY ... REFERENCES ...`.
    ForeignKey {
        /// Constraint name.
        name: ConstraintName,
        /// Referenced table.
        referenced_table: TableName,
        /// Pairs of (local column, referenced column).
        columns: Vec<(ColumnName, ColumnName)>,
        /// Action on delete of the referenced row.
        on_delete: ReferentialAction,
        /// Action on update of the referenced row.
        on_update: ReferentialAction,
    },
    /// Bookkeeping marker placed on the *referenced* table of an inferred
    /// foreign key. Never rendered as DDL; the sequencer filters it out.
    IsForeignKeyOf {
        /// The referencing table.
        table: TableName,
        /// The referencing columns.
        columns: Vec<ColumnName>,
    },
}

impl TableConstraint {
    /// The constraint's name, or `None` for the unnamed marker variant.
    #[must_use]
    pub fn name(&self) -> Option<&ConstraintName> {
        match self {
            Self::PrimaryKey { name, .. }
            | Self::Unique { name, .. }
            | Self::ForeignKey { name, .. } => Some(name),
            Self::IsForeignKeyOf { .. } => None,
        }
    }

    /// Returns true for the `IsForeignKeyOf` bookkeeping marker.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        matches!(self, Self::IsForeignKeyOf { .. })
    }
}

/// Schema definition for a column: a type plus column-level constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// SQL data type.
    pub column_type: ColumnType,
    /// Column-level constraints.
    pub constraints: BTreeSet<ColumnConstraint>,
}

impl Column {
    /// Creates a column of the given type with no constraints.
    #[must_use]
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            constraints: BTreeSet::new(),
        }
    }

    /// Adds `NOT NULL`.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.constraints.insert(ColumnConstraint::NotNull);
        self
    }

    /// Adds `DEFAULT <expression>`.
    #[must_use]
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.constraints
            .insert(ColumnConstraint::Default(expr.into()));
        self
    }
}

/// Schema definition for a table: named columns plus table constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Columns keyed by name.
    pub columns: BTreeMap<ColumnName, Column>,
    /// Table-level constraints, unique by value.
    pub constraints: BTreeSet<TableConstraint>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column. Replaces any column with the same name.
    #[must_use]
    pub fn column(mut self, name: impl Into<ColumnName>, column: Column) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    /// Adds a table constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: TableConstraint) -> Self {
        self.constraints.insert(constraint);
        self
    }

    /// Adds a single-column primary key named `<name>`.
    #[must_use]
    pub fn primary_key(
        self,
        name: impl Into<ConstraintName>,
        columns: impl IntoIterator<Item = impl Into<ColumnName>>,
    ) -> Self {
        let columns = columns.into_iter().map(Into::into).collect();
        self.constraint(TableConstraint::PrimaryKey {
            name: name.into(),
            columns,
        })
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &ColumnName) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Columns of this table's primary key, if one is declared.
    #[must_use]
    pub fn primary_key_columns(&self) -> Option<&[ColumnName]> {
        self.constraints.iter().find_map(|c| match c {
            TableConstraint::PrimaryKey { columns, .. } => Some(columns.as_slice()),
            _ => None,
        })
    }
}

/// An enumeration type: ordered labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enumeration {
    /// Labels in declaration order. Order is significant.
    pub labels: Vec<String>,
}

impl Enumeration {
    /// Creates an enumeration from labels in order.
    #[must_use]
    pub fn new(labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }
}

/// The complete schema of a database: tables and enumeration types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Tables keyed by name.
    pub tables: BTreeMap<TableName, Table>,
    /// Enumeration types keyed by name.
    pub enums: BTreeMap<EnumName, Enumeration>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table. Replaces any table with the same name.
    #[must_use]
    pub fn table(mut self, name: impl Into<TableName>, table: Table) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    /// Adds an enumeration type.
    #[must_use]
    pub fn enumeration(mut self, name: impl Into<EnumName>, definition: Enumeration) -> Self {
        self.enums.insert(name.into(), definition);
        self
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &TableName) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Iterates over table names in deterministic order.
    pub fn table_names(&self) -> impl Iterator<Item = &TableName> {
        self.tables.keys()
    }

    /// Serializes the schema to a JSON snapshot.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Restores a schema from a JSON snapshot.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be parsed.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
