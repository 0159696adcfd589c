use curation::ReorderBatch;
use futures::StreamExt;
use shared::{
    domain::{OpportunityId, OpportunityStatus, RestoredStatus},
    protocol::{Snapshot, DEFAULT_DUPLICATE_SUFFIX},
};
use tracing::{info, warn};

use crate::{
    error::{CurationError, StoreError},
    session::{CurationSession, Notice},
    snapshot::SnapshotStream,
    store::RecordStore,
};

/// Drives admin actions for a [`CurationSession`] against a [`RecordStore`].
///
/// A reorder runs in three steps so the staged order can be rendered while the
/// store is still answering: [`CurationSession::stage_move`] shows it,
/// [`Curator::persist`] sends it without touching the session, and
/// [`Curator::settle`] applies the answer. `move_item` and `move_by_id` chain
/// the three for callers that do not render in between.
pub struct Curator<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> Curator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Moves the record displayed at `from` to position `to`. Returns the
    /// batch that was persisted, or `None` when the move changed nothing.
    pub async fn move_item(
        &self,
        session: &mut CurationSession,
        from: usize,
        to: usize,
    ) -> Result<Option<ReorderBatch>, CurationError> {
        let Some(batch) = session.stage_move(from, to)? else {
            return Ok(None);
        };
        let outcome = self.persist(&batch).await;
        self.settle(session, batch, outcome).await.map(Some)
    }

    /// Drop of the record `active` onto the record `over`.
    pub async fn move_by_id(
        &self,
        session: &mut CurationSession,
        active: OpportunityId,
        over: OpportunityId,
    ) -> Result<Option<ReorderBatch>, CurationError> {
        let Some(batch) = session.stage_move_by_id(active, over)? else {
            return Ok(None);
        };
        let outcome = self.persist(&batch).await;
        self.settle(session, batch, outcome).await.map(Some)
    }

    /// Sends a staged batch to the store as one request.
    pub async fn persist(&self, batch: &ReorderBatch) -> Result<(), StoreError> {
        self.store.reorder(&batch.items).await
    }

    /// Applies the store's answer to a staged batch. A rejected batch rolls
    /// the session back to the store's order and leaves a notice.
    pub async fn settle(
        &self,
        session: &mut CurationSession,
        batch: ReorderBatch,
        outcome: Result<(), StoreError>,
    ) -> Result<ReorderBatch, CurationError> {
        match outcome {
            Ok(()) => {
                info!(records = batch.len(), "reorder persisted");
                session.confirm_staged();
                Ok(batch)
            }
            Err(error) => {
                warn!(%error, records = batch.len(), "reorder rejected, restoring store order");
                session.discard_overlay();
                if let Err(refetch) = self.refresh(session).await {
                    warn!(error = %refetch, "could not re-fetch records after failed reorder");
                }
                let err = CurationError::InconsistentReorder(error);
                session.set_notice(Notice::new(err.user_message()));
                Err(err)
            }
        }
    }

    /// Re-reads the records behind the session's view.
    pub async fn refresh(&self, session: &mut CurationSession) -> Result<(), StoreError> {
        let records = self.store.list(&session.view().list_query()).await?;
        session.apply_snapshot(Snapshot { records });
        Ok(())
    }

    pub async fn archive(
        &self,
        session: &mut CurationSession,
        id: OpportunityId,
    ) -> Result<(), CurationError> {
        let outcome = self.store.archive(id).await;
        self.finish(session, outcome, "archive").await
    }

    pub async fn unarchive(
        &self,
        session: &mut CurationSession,
        id: OpportunityId,
        status: RestoredStatus,
    ) -> Result<(), CurationError> {
        let outcome = self.store.unarchive(id, status).await;
        self.finish(session, outcome, "unarchive").await
    }

    /// Copies a record as an inactive draft titled with the default suffix.
    pub async fn duplicate(
        &self,
        session: &mut CurationSession,
        id: OpportunityId,
    ) -> Result<OpportunityId, CurationError> {
        let outcome = self
            .store
            .duplicate(id, DEFAULT_DUPLICATE_SUFFIX, OpportunityStatus::Inactive)
            .await;
        self.finish(session, outcome, "duplicate").await
    }

    pub async fn hard_delete(
        &self,
        session: &mut CurationSession,
        id: OpportunityId,
    ) -> Result<(), CurationError> {
        let outcome = self.store.hard_delete(id).await;
        self.finish(session, outcome, "hard_delete").await
    }

    async fn finish<T>(
        &self,
        session: &mut CurationSession,
        outcome: Result<T, StoreError>,
        action: &'static str,
    ) -> Result<T, CurationError> {
        match outcome {
            Ok(value) => {
                if let Err(error) = self.refresh(session).await {
                    warn!(action, %error, "action applied but records could not be re-fetched");
                }
                Ok(value)
            }
            Err(error) => {
                warn!(action, %error, "curation action failed");
                let err = CurationError::from(error);
                session.set_notice(Notice::new(err.user_message()));
                Err(err)
            }
        }
    }
}

/// Waits for the next snapshot on `stream` and applies it. Returns `None`
/// once the subscription has ended.
pub async fn apply_next_snapshot(
    stream: &mut SnapshotStream,
    session: &mut CurationSession,
) -> Option<Result<(), StoreError>> {
    let next = stream.next().await?;
    Some(next.map(|snapshot| session.apply_snapshot(snapshot)))
}

#[cfg(test)]
#[path = "tests/curator_tests.rs"]
mod tests;
