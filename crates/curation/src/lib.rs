//! Pure core of the listing service: turning a snapshot of opportunities into
//! a display sequence, and turning a drag gesture over that sequence into a
//! dense reorder batch.
//!
//! Nothing in this crate performs I/O. Time-dependent rules take `now` as an
//! explicit input so every function is deterministic.

pub mod deadline;
pub mod favicon;
pub mod filter;
pub mod reorder;
pub mod sort;
pub mod tags;
pub mod view;

#[cfg(test)]
#[path = "tests/fixtures.rs"]
pub(crate) mod fixtures;

pub use deadline::DeadlineBadge;
pub use filter::StatusSelection;
pub use reorder::{plan_move, plan_move_by_id, ReorderBatch, ReorderError};
pub use view::{filter_sort, ViewConfig};
