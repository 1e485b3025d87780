//! Row-level change events fanned out to match subscribers.

use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::{AnswerRow, MatchRow, PlayerRow};

/// Kind of mutation a change event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A row was created.
    Insert,
    /// An existing row was modified.
    Update,
}

/// The row carried by a change event, tagged with its table.
///
/// Solution rows are deliberately absent: answer keys are never pushed over
/// the change feed and must be fetched explicitly after a round ends.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
pub enum ChangedRow {
    /// The match row itself changed (status, question index, phase start).
    Match(MatchRow),
    /// A player row was inserted or patched.
    Player(PlayerRow),
    /// An answer row was inserted or patched.
    Answer(AnswerRow),
}

/// One row-level change observed on a match's tables.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChangeEvent {
    /// Whether the row was inserted or updated.
    pub kind: ChangeKind,
    /// The new row value after the mutation.
    pub row: ChangedRow,
}

impl ChangeEvent {
    /// Convenience constructor for an insert event.
    pub fn insert(row: ChangedRow) -> Self {
        Self {
            kind: ChangeKind::Insert,
            row,
        }
    }

    /// Convenience constructor for an update event.
    pub fn update(row: ChangedRow) -> Self {
        Self {
            kind: ChangeKind::Update,
            row,
        }
    }
}
