use shared::{domain::OpportunityId, protocol::ReorderItem};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    #[error("position {index} is outside the displayed sequence of {len} records")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("record {0} is not in the displayed sequence")]
    UnknownRecord(OpportunityId),
    #[error("manual reordering is only available in the default sort mode")]
    ManualOrderRequired,
}

/// Dense `0..n` ordering for every record of a display sequence, in the
/// order it should read after the move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderBatch {
    pub items: Vec<ReorderItem>,
}

impl ReorderBatch {
    pub fn from_sequence(ids: &[OpportunityId]) -> Self {
        let items = ids
            .iter()
            .zip(0_i64..)
            .map(|(&id, sort_order)| ReorderItem { id, sort_order })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = OpportunityId> + '_ {
        self.items.iter().map(|item| item.id)
    }

    pub fn sort_order_of(&self, id: OpportunityId) -> Option<i64> {
        self.items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.sort_order)
    }
}

/// Moves the record at `from` to `to` (remove, then insert) and numbers the
/// resulting sequence. Returns `Ok(None)` when nothing would change.
pub fn plan_move(
    display: &[OpportunityId],
    from: usize,
    to: usize,
) -> Result<Option<ReorderBatch>, ReorderError> {
    let len = display.len();
    for index in [from, to] {
        if index >= len {
            return Err(ReorderError::IndexOutOfRange { index, len });
        }
    }
    if from == to {
        return Ok(None);
    }

    let mut sequence = display.to_vec();
    let moved = sequence.remove(from);
    sequence.insert(to, moved);
    Ok(Some(ReorderBatch::from_sequence(&sequence)))
}

/// Drag-and-drop flavour of [`plan_move`]: `active` is the dragged record and
/// `over` the record it was dropped on.
pub fn plan_move_by_id(
    display: &[OpportunityId],
    active: OpportunityId,
    over: OpportunityId,
) -> Result<Option<ReorderBatch>, ReorderError> {
    if active == over {
        return Ok(None);
    }
    let position = |id: OpportunityId| {
        display
            .iter()
            .position(|candidate| *candidate == id)
            .ok_or(ReorderError::UnknownRecord(id))
    };
    let from = position(active)?;
    let to = position(over)?;
    plan_move(display, from, to)
}

#[cfg(test)]
#[path = "tests/reorder_tests.rs"]
mod tests;
