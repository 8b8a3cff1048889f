//! Stateful migration workflow.
//!
//! A [`Migration`] carries one run's edit-list accumulator through the
//! pipeline: introspect the live schema, diff it against the desired
//! schema, then either execute the rendered statements as one script or
//! print them for review. The computation short-circuits: once a diff has
//! failed, no further edits can be appended and both execution and
//! printing surface the stored error.
//!
//! The run itself is not transactional; callers are expected to wrap
//! execution in a database transaction so a mid-script failure leaves the
//! schema unchanged.

use std::io::Write;

use tracing::{debug, info};

use crate::diff::{diff, DiffOptions};
use crate::edit::Edit;
use crate::error::{DiffError, MigrateError, Result};
use crate::render::PostgresRenderer;
use crate::schema::Schema;
use crate::sequence::sequence;

/// Reads the current schema from a live database.
///
/// Driver adapters implement this; see [`crate::pg`] for the sqlx
/// `PgPool` implementation.
pub trait IntrospectSchema {
    /// Fetches a snapshot of the live schema.
    fn introspect_schema(
        &self,
    ) -> impl std::future::Future<Output = sqlx::Result<Schema>> + Send;
}

/// Executes a multi-statement SQL script, discarding any result rows.
pub trait ExecuteScript {
    /// Runs the script as a single batch.
    fn execute_script(
        &self,
        sql: &str,
    ) -> impl std::future::Future<Output = sqlx::Result<()>> + Send;
}

#[derive(Debug)]
enum State {
    Pending,
    Diffed(Vec<Edit>),
    Failed(DiffError),
}

/// One migration run: Pending, then Diffed or Failed, then executed or
/// printed exactly once (both consume the migration).
#[derive(Debug)]
pub struct Migration {
    state: State,
}

impl Default for Migration {
    fn default() -> Self {
        Self::new()
    }
}

impl Migration {
    /// Creates a pending migration with an empty edit accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State::Pending,
        }
    }

    /// Introspects the live schema through `connection` and diffs it
    /// against `desired`.
    ///
    /// A diff failure is stored in the returned migration and surfaces on
    /// [`run`](Self::run) or [`print`](Self::print).
    ///
    /// # Errors
    /// Returns an error only when introspection itself fails; that is
    /// fatal and the run never reaches execution.
    pub async fn migrate<C: IntrospectSchema>(
        connection: &C,
        desired: &Schema,
        options: &DiffOptions,
    ) -> Result<Self> {
        let live = connection.introspect_schema().await?;
        info!(
            tables = live.tables.len(),
            enums = live.enums.len(),
            "introspected live schema"
        );
        Ok(Self::from_diff(diff(desired, &live, options)))
    }

    /// Seeds a migration directly from a precomputed diff result,
    /// bypassing live introspection.
    #[must_use]
    pub fn from_diff(result: std::result::Result<Vec<Edit>, DiffError>) -> Self {
        let state = match result {
            Ok(edits) => State::Diffed(edits),
            Err(err) => State::Failed(err),
        };
        Self { state }
    }

    /// Appends an edit to the accumulator. Ignored once the migration has
    /// failed.
    pub fn push_edit(&mut self, edit: Edit) {
        match &mut self.state {
            State::Pending => self.state = State::Diffed(vec![edit]),
            State::Diffed(edits) => edits.push(edit),
            State::Failed(_) => {}
        }
    }

    /// The accumulated edits, or `None` when the migration failed or is
    /// still pending with no edits.
    #[must_use]
    pub fn edits(&self) -> Option<&[Edit]> {
        match &self.state {
            State::Diffed(edits) => Some(edits),
            _ => None,
        }
    }

    /// The stored diff error, if the diff failed.
    #[must_use]
    pub fn error(&self) -> Option<&DiffError> {
        match &self.state {
            State::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Sequences and renders the accumulated edits.
    fn statements(self) -> Result<Vec<String>> {
        match self.state {
            State::Pending => Ok(Vec::new()),
            State::Failed(err) => Err(err.into()),
            State::Diffed(edits) => {
                let renderer = PostgresRenderer::new();
                sequence(edits)
                    .iter()
                    .map(|edit| {
                        debug!(edit = %edit.description(), "rendering");
                        renderer.render(edit).map_err(MigrateError::from)
                    })
                    .collect()
            }
        }
    }

    /// Sequences, renders and executes the accumulated edits as one
    /// combined script.
    ///
    /// # Errors
    /// Surfaces the stored [`DiffError`] if the diff failed, a
    /// [`crate::error::RenderError`] if any edit has no DDL
    /// representation, or the execution error from the connection. All are
    /// fatal; nothing is retried.
    pub async fn run<E: ExecuteScript>(self, connection: &E) -> Result<()> {
        let statements = self.statements()?;
        if statements.is_empty() {
            info!("live schema already matches the desired schema");
            return Ok(());
        }
        for statement in &statements {
            debug!(sql = %statement, "executing");
        }
        connection.execute_script(&statements.join("\n")).await?;
        info!(statements = statements.len(), "migration applied");
        Ok(())
    }

    /// Sequences and renders the accumulated edits and writes them to
    /// standard output, one statement per line. Nothing is executed.
    ///
    /// # Errors
    /// Same failure modes as [`run`](Self::run), minus execution.
    pub fn print(self) -> Result<()> {
        self.print_to(&mut std::io::stdout())
    }

    /// Like [`print`](Self::print), but writes to the given writer.
    ///
    /// # Errors
    /// Same failure modes as [`print`](Self::print), plus write errors.
    pub fn print_to<W: Write>(self, out: &mut W) -> Result<()> {
        for statement in self.statements()? {
            writeln!(out, "{statement}")?;
        }
        Ok(())
    }
}
