use curation::{filter_sort, plan_move, plan_move_by_id, ReorderBatch, ReorderError, ViewConfig};
use shared::{
    domain::OpportunityId,
    protocol::{Opportunity, Snapshot},
};

use crate::error::CurationError;

/// A dismissible message left behind by a failed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One curator's working state: the last snapshot received, the active view
/// and any reorder still waiting for the store to echo it back.
#[derive(Debug, Clone)]
pub struct CurationSession {
    snapshot: Vec<Opportunity>,
    view: ViewConfig,
    overlay: Option<ReorderBatch>,
    /// Set from staging until the store's answer is settled.
    submitting: bool,
    notice: Option<Notice>,
}

impl CurationSession {
    pub fn new(view: ViewConfig) -> Self {
        Self {
            snapshot: Vec::new(),
            view,
            overlay: None,
            submitting: false,
            notice: None,
        }
    }

    /// Replaces the records wholesale. A staged reorder is superseded.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot.records;
        self.overlay = None;
    }

    pub fn set_view(&mut self, view: ViewConfig) {
        self.view = view;
    }

    pub fn view(&self) -> &ViewConfig {
        &self.view
    }

    pub fn records(&self) -> &[Opportunity] {
        &self.snapshot
    }

    pub fn has_pending_reorder(&self) -> bool {
        self.overlay.is_some()
    }

    /// Whether a staged batch has not been settled yet.
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Plans moving the record displayed at `from` to `to` and shows the
    /// result right away. The returned batch still has to be persisted and
    /// settled through a [`crate::Curator`].
    pub fn stage_move(
        &mut self,
        from: usize,
        to: usize,
    ) -> Result<Option<ReorderBatch>, CurationError> {
        self.ensure_can_stage()?;
        let Some(batch) = plan_move(&self.display_ids(), from, to)? else {
            return Ok(None);
        };
        self.stage(batch.clone());
        Ok(Some(batch))
    }

    /// Same as [`Self::stage_move`] for a drop of `active` onto `over`.
    pub fn stage_move_by_id(
        &mut self,
        active: OpportunityId,
        over: OpportunityId,
    ) -> Result<Option<ReorderBatch>, CurationError> {
        self.ensure_can_stage()?;
        let Some(batch) = plan_move_by_id(&self.display_ids(), active, over)? else {
            return Ok(None);
        };
        self.stage(batch.clone());
        Ok(Some(batch))
    }

    fn ensure_can_stage(&self) -> Result<(), CurationError> {
        if !self.view.is_manual_order() {
            return Err(ReorderError::ManualOrderRequired.into());
        }
        if self.submitting {
            return Err(CurationError::ReorderInFlight);
        }
        Ok(())
    }

    /// The display sequence, with any staged reorder applied on top of the
    /// snapshot.
    pub fn display(&self) -> Vec<Opportunity> {
        let Some(overlay) = &self.overlay else {
            return filter_sort(&self.snapshot, &self.view)
                .into_iter()
                .cloned()
                .collect();
        };

        let staged: Vec<Opportunity> = self
            .snapshot
            .iter()
            .cloned()
            .map(|mut record| {
                if let Some(sort_order) = overlay.sort_order_of(record.id) {
                    record.sort_order = Some(sort_order);
                }
                record
            })
            .collect();
        filter_sort(&staged, &self.view)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn display_ids(&self) -> Vec<OpportunityId> {
        self.display().into_iter().map(|record| record.id).collect()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    pub(crate) fn set_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    pub(crate) fn stage(&mut self, batch: ReorderBatch) {
        self.overlay = Some(batch);
        self.submitting = true;
    }

    /// The store accepted the staged batch. The overlay stays until the next
    /// snapshot replaces it.
    pub(crate) fn confirm_staged(&mut self) {
        self.submitting = false;
    }

    pub(crate) fn discard_overlay(&mut self) {
        self.overlay = None;
        self.submitting = false;
    }
}
