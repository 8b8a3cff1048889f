//! Declarative schema migrations for PostgreSQL.
//!
//! `schemadrift` compares the schema your code expects against the schema a
//! live database actually has, and turns the difference into DDL:
//! - The desired schema is plain data ([`schema::Schema`]), built in Rust
//! - The live schema is read back through [`migration::IntrospectSchema`]
//! - The diff engine produces a list of [`edit::Edit`] values, optionally
//!   inferring foreign keys from column naming conventions
//! - The sequencer orders edits so new objects exist before they are altered
//! - The renderer emits one PostgreSQL statement per edit
//!
//! # Architecture
//!
//! The pipeline consists of several components:
//!
//! - **Schema** - Tables, columns, constraints and enumeration types
//! - **Diff** - Computes the edits that take the live schema to the desired one
//! - **Sequence** - Partitions edits into creations and alterations
//! - **Render** - Dialect rules for PostgreSQL DDL text
//! - **Migration** - Stateful workflow tying introspection, diff and
//!   execution together
//!
//! # Example
//!
//! ```rust,ignore
//! use schemadrift::prelude::*;
//!
//! let desired = Schema::new().table(
//!     "users",
//!     Table::new()
//!         .column("id", Column::new(ColumnType::BigInt).not_null())
//!         .column("email", Column::new(ColumnType::varchar(255)))
//!         .primary_key("users_pkey", ["id"]),
//! );
//!
//! let pool = sqlx::PgPool::connect("postgres://localhost/app").await?;
//! let migration = Migration::migrate(&pool, &desired, &DiffOptions::default()).await?;
//! migration.run(&pool).await?;
//! ```

pub mod diff;
pub mod edit;
pub mod error;
pub mod migration;
pub mod pg;
pub mod render;
pub mod schema;
pub mod sequence;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::diff::{diff, DiffOptions};
    pub use crate::edit::Edit;
    pub use crate::error::{DiffError, MigrateError, RenderError, Result};
    pub use crate::migration::{ExecuteScript, IntrospectSchema, Migration};
    pub use crate::render::PostgresRenderer;
    pub use crate::schema::{
        Column, ColumnConstraint, ColumnName, ColumnType, ConstraintName, EnumName, Enumeration,
        ReferentialAction, Schema, Table, TableConstraint, TableName,
    };
    pub use crate::sequence::{sequence, SequencedEdits};
}
