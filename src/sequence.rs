//! Edit sequencing.
//!
//! Orders a raw edit list so it is safe to execute: all table and column
//! creations/removals first, then the remaining alterations, with the
//! `IsForeignKeyOf` bookkeeping markers dropped entirely. A constraint can
//! then never be applied before the column or table it references exists,
//! and nothing is altered after its removal.
//!
//! Multi-hop dependency ordering among the alterations themselves is not
//! attempted; relative order within each partition is preserved as the
//! diff engine produced it.

use crate::edit::Edit;

/// A raw edit list partitioned into an executable order.
///
/// Computed per migration run; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequencedEdits {
    /// Table/column creations and removals, applied first.
    pub creations: Vec<Edit>,
    /// Everything else (constraint and type changes), applied second.
    /// Marker edits have been filtered out.
    pub alterations: Vec<Edit>,
}

impl SequencedEdits {
    /// Iterates over all edits in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Edit> {
        self.creations.iter().chain(self.alterations.iter())
    }

    /// Total number of sequenced edits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.creations.len() + self.alterations.len()
    }

    /// True when no edits survived sequencing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creations.is_empty() && self.alterations.is_empty()
    }
}

/// Partitions a raw edit list into creations-or-deletions followed by
/// alterations, dropping marker edits.
#[must_use]
pub fn sequence(edits: Vec<Edit>) -> SequencedEdits {
    let mut sequenced = SequencedEdits::default();
    for edit in edits {
        if edit.is_structural() {
            sequenced.creations.push(edit);
        } else if !edit.is_marker() {
            sequenced.alterations.push(edit);
        }
    }
    sequenced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, Table, TableConstraint};

    #[test]
    fn test_creations_before_alterations() {
        let constraint = Edit::constraint_added(
            "users",
            TableConstraint::Unique {
                name: "users_email_key".into(),
                columns: vec!["email".into()],
            },
        );
        let add_column = Edit::column_added("users", "email", Column::new(ColumnType::varchar(255)));
        let add_table = Edit::table_added("users", Table::new());

        // Diff order interleaves them; sequencing must not.
        let sequenced = sequence(vec![constraint.clone(), add_table.clone(), add_column.clone()]);

        assert_eq!(sequenced.creations, vec![add_table, add_column]);
        assert_eq!(sequenced.alterations, vec![constraint]);
    }

    #[test]
    fn test_relative_order_preserved() {
        let drop_col = Edit::column_removed("users", "legacy");
        let add_col = Edit::column_added("users", "email", Column::new(ColumnType::varchar(255)));

        let sequenced = sequence(vec![drop_col.clone(), add_col.clone()]);
        assert_eq!(sequenced.creations, vec![drop_col, add_col]);
    }

    #[test]
    fn test_markers_filtered() {
        let marker = TableConstraint::IsForeignKeyOf {
            table: "orders".into(),
            columns: vec!["users_id".into()],
        };
        let edits = vec![
            Edit::constraint_added("users", marker.clone()),
            Edit::constraint_removed("users", marker),
        ];

        let sequenced = sequence(edits);
        assert!(sequenced.is_empty());
        assert!(sequenced.iter().next().is_none());
    }
}
