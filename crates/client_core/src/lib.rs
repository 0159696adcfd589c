//! Client side of the listing service: the store and snapshot capabilities a
//! curator needs, their HTTP and WebSocket implementations, and the session
//! that turns drag gestures into persisted reorders.

pub mod curator;
pub mod error;
pub mod favicon;
pub mod session;
pub mod snapshot;
pub mod store;

#[cfg(test)]
#[path = "tests/fixtures.rs"]
pub(crate) mod fixtures;

pub use curator::{apply_next_snapshot, Curator};
pub use error::{CurationError, StoreError};
pub use favicon::FaviconResolver;
pub use session::{CurationSession, Notice};
pub use snapshot::{SnapshotSource, SnapshotStream, WatchSnapshotSource, WsSnapshotSource};
pub use store::{HttpRecordStore, RecordStore};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
