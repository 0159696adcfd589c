use std::collections::HashSet;

use curation::{favicon::favicon_url_or_default, filter_sort, ViewConfig};
use shared::{
    domain::{OpportunityId, OpportunityStatus, RestoredStatus, SubmissionId, SubmissionStatus},
    error::{ApiError, ErrorCode},
    protocol::{
        AdminActor, ApproveSubmissionResponse, AuditEntry, DeleteSubmissionsResponse,
        DuplicateResponse, ImportReport, ImportRequest, ListQuery, NewOpportunity, NewSubmission,
        Opportunity, OpportunityExport, OpportunityPatch, PendingCountResponse, ReorderItem,
        ReorderResponse, Submission, SyncReport,
    },
};
use storage::{ReorderOutcome, Storage};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.storage
        .health_check()
        .await
        .map_err(|err| ApiError::new(ErrorCode::Unavailable, err.to_string()))
}

pub async fn list_opportunities(
    ctx: &ApiContext,
    query: &ListQuery,
) -> Result<Vec<Opportunity>, ApiError> {
    ctx.storage
        .list_opportunities(query)
        .await
        .map_err(internal)
}

/// The display sequence for `view`, computed over the coarse listing.
pub async fn view_opportunities(
    ctx: &ApiContext,
    view: &ViewConfig,
) -> Result<Vec<Opportunity>, ApiError> {
    let records = list_opportunities(ctx, &view.list_query()).await?;
    Ok(filter_sort(&records, view).into_iter().cloned().collect())
}

pub async fn get_opportunity(ctx: &ApiContext, id: OpportunityId) -> Result<Opportunity, ApiError> {
    ctx.storage
        .get_opportunity(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| opportunity_not_found(id))
}

pub async fn create_opportunity(
    ctx: &ApiContext,
    mut new: NewOpportunity,
) -> Result<Opportunity, ApiError> {
    require("title", &new.title)?;
    require("provider", &new.provider)?;
    require("apply_url", &new.apply_url)?;
    if new.logo_url.trim().is_empty() {
        new.logo_url = favicon_url_or_default(&new.apply_url);
    }

    let created = ctx
        .storage
        .insert_opportunity(&new)
        .await
        .map_err(internal)?;
    tracing::info!(opportunity_id = %created.id, title = %created.title, "opportunity created");
    Ok(created)
}

pub async fn update_opportunity(
    ctx: &ApiContext,
    id: OpportunityId,
    patch: &OpportunityPatch,
) -> Result<Opportunity, ApiError> {
    for (field, value) in [
        ("title", &patch.title),
        ("provider", &patch.provider),
        ("apply_url", &patch.apply_url),
    ] {
        if let Some(value) = value {
            require(field, value)?;
        }
    }

    let updated = ctx
        .storage
        .update_opportunity(id, patch)
        .await
        .map_err(internal)?
        .ok_or_else(|| opportunity_not_found(id))?;
    tracing::info!(opportunity_id = %id, "opportunity updated");
    Ok(updated)
}

pub async fn archive_opportunity(
    ctx: &ApiContext,
    id: OpportunityId,
    actor: &AdminActor,
) -> Result<Opportunity, ApiError> {
    let archived = ctx
        .storage
        .archive_opportunity(id, actor)
        .await
        .map_err(internal)?
        .ok_or_else(|| opportunity_not_found(id))?;
    tracing::info!(opportunity_id = %id, admin_id = %actor.admin_id, "opportunity archived");
    Ok(archived)
}

pub async fn unarchive_opportunity(
    ctx: &ApiContext,
    id: OpportunityId,
    actor: &AdminActor,
    status: RestoredStatus,
) -> Result<Opportunity, ApiError> {
    let restored = ctx
        .storage
        .unarchive_opportunity(id, actor, status)
        .await
        .map_err(internal)?
        .ok_or_else(|| opportunity_not_found(id))?;
    tracing::info!(
        opportunity_id = %id,
        admin_id = %actor.admin_id,
        status = %restored.status,
        "opportunity unarchived"
    );
    Ok(restored)
}

pub async fn duplicate_opportunity(
    ctx: &ApiContext,
    id: OpportunityId,
    actor: &AdminActor,
    title_suffix: &str,
    status: OpportunityStatus,
) -> Result<DuplicateResponse, ApiError> {
    let copy_id = ctx
        .storage
        .duplicate_opportunity(id, actor, title_suffix, status)
        .await
        .map_err(internal)?
        .ok_or_else(|| opportunity_not_found(id))?;
    tracing::info!(opportunity_id = %id, copy_id = %copy_id, "opportunity duplicated");
    Ok(DuplicateResponse { id: copy_id })
}

pub async fn verify_opportunity(
    ctx: &ApiContext,
    id: OpportunityId,
) -> Result<Opportunity, ApiError> {
    ctx.storage
        .verify_opportunity(id)
        .await
        .map_err(internal)?
        .ok_or_else(|| opportunity_not_found(id))
}

pub async fn set_opportunity_status(
    ctx: &ApiContext,
    id: OpportunityId,
    status: OpportunityStatus,
) -> Result<Opportunity, ApiError> {
    ctx.storage
        .set_opportunity_status(id, status)
        .await
        .map_err(internal)?
        .ok_or_else(|| opportunity_not_found(id))
}

pub async fn hard_delete_opportunity(
    ctx: &ApiContext,
    id: OpportunityId,
    actor: &AdminActor,
) -> Result<(), ApiError> {
    let deleted = ctx
        .storage
        .hard_delete_opportunity(id, actor)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(opportunity_not_found(id));
    }
    tracing::info!(opportunity_id = %id, admin_id = %actor.admin_id, "opportunity deleted");
    Ok(())
}

/// Applies a whole batch or nothing. A batch naming the same record twice is
/// rejected before touching storage.
pub async fn reorder_opportunities(
    ctx: &ApiContext,
    items: &[ReorderItem],
    actor: &AdminActor,
) -> Result<ReorderResponse, ApiError> {
    let mut seen = HashSet::with_capacity(items.len());
    if let Some(repeated) = items.iter().find(|item| !seen.insert(item.id)) {
        return Err(ApiError::validation(format!(
            "opportunity {} appears more than once in the batch",
            repeated.id
        )));
    }

    match ctx
        .storage
        .reorder_opportunities(items, actor)
        .await
        .map_err(internal)?
    {
        ReorderOutcome::Applied(updated) => {
            tracing::info!(updated, admin_id = %actor.admin_id, "opportunities reordered");
            Ok(ReorderResponse { updated })
        }
        ReorderOutcome::MissingRecord(id) => {
            tracing::warn!(opportunity_id = %id, "reorder rejected, record missing");
            Err(opportunity_not_found(id))
        }
    }
}

pub async fn create_submission(
    ctx: &ApiContext,
    new: &NewSubmission,
) -> Result<Submission, ApiError> {
    require("opportunity_name", &new.opportunity_name)?;
    require("opportunity_type", &new.opportunity_type)?;
    require("description", &new.description)?;
    require("link", &new.link)?;

    let submission = ctx
        .storage
        .create_submission(new)
        .await
        .map_err(internal)?;
    tracing::info!(submission_id = %submission.id, "submission received");
    Ok(submission)
}

pub async fn list_submissions(
    ctx: &ApiContext,
    status: Option<SubmissionStatus>,
) -> Result<Vec<Submission>, ApiError> {
    ctx.storage
        .list_submissions(status)
        .await
        .map_err(internal)
}

pub async fn pending_submission_count(ctx: &ApiContext) -> Result<PendingCountResponse, ApiError> {
    let pending = ctx
        .storage
        .count_pending_submissions()
        .await
        .map_err(internal)?;
    Ok(PendingCountResponse { pending })
}

pub async fn set_submission_status(
    ctx: &ApiContext,
    id: SubmissionId,
    status: SubmissionStatus,
) -> Result<Submission, ApiError> {
    ctx.storage
        .set_submission_status(id, status)
        .await
        .map_err(internal)?
        .ok_or_else(|| submission_not_found(id))
}

pub async fn approve_submission(
    ctx: &ApiContext,
    id: SubmissionId,
    actor: &AdminActor,
) -> Result<ApproveSubmissionResponse, ApiError> {
    let opportunity_id = ctx
        .storage
        .approve_submission(id, actor)
        .await
        .map_err(internal)?
        .ok_or_else(|| submission_not_found(id))?;
    tracing::info!(submission_id = %id, opportunity_id = %opportunity_id, "submission approved");
    Ok(ApproveSubmissionResponse {
        submission_id: id,
        opportunity_id,
    })
}

pub async fn delete_submissions(
    ctx: &ApiContext,
    ids: &[SubmissionId],
) -> Result<DeleteSubmissionsResponse, ApiError> {
    let deleted = ctx
        .storage
        .delete_submissions(ids)
        .await
        .map_err(internal)?;
    tracing::info!(requested = ids.len(), deleted, "submissions deleted");
    Ok(DeleteSubmissionsResponse { deleted })
}

pub async fn list_audit_entries(ctx: &ApiContext, limit: u32) -> Result<Vec<AuditEntry>, ApiError> {
    ctx.storage
        .list_audit_entries(limit)
        .await
        .map_err(internal)
}

pub async fn export_opportunities(ctx: &ApiContext) -> Result<Vec<OpportunityExport>, ApiError> {
    ctx.storage.export_opportunities().await.map_err(internal)
}

pub async fn import_opportunities(
    ctx: &ApiContext,
    request: &ImportRequest,
) -> Result<ImportReport, ApiError> {
    let report = ctx
        .storage
        .import_opportunities(request.mode, &request.opportunities)
        .await
        .map_err(internal)?;
    tracing::info!(
        mode = %request.mode,
        created = report.created,
        updated = report.updated,
        skipped = report.skipped,
        "opportunities imported"
    );
    Ok(report)
}

pub async fn sync_opportunities(
    ctx: &ApiContext,
    records: &[OpportunityExport],
) -> Result<SyncReport, ApiError> {
    let report = ctx
        .storage
        .sync_opportunities(records)
        .await
        .map_err(internal)?;
    tracing::info!(
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        "opportunities synced"
    );
    Ok(report)
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn opportunity_not_found(id: OpportunityId) -> ApiError {
    ApiError::not_found(format!("opportunity {id} not found"))
}

fn submission_not_found(id: SubmissionId) -> ApiError {
    ApiError::not_found(format!("submission {id} not found"))
}

fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!(error = %format!("{err:#}"), "storage operation failed");
    ApiError::new(ErrorCode::Internal, err.to_string())
}
