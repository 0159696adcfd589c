use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use server_api::{
    approve_submission, archive_opportunity, create_opportunity, delete_submissions,
    duplicate_opportunity, export_opportunities, hard_delete_opportunity, import_opportunities,
    list_audit_entries, list_submissions, pending_submission_count, reorder_opportunities,
    set_opportunity_status, set_submission_status, sync_opportunities, unarchive_opportunity,
    update_opportunity, verify_opportunity,
};
use shared::{
    domain::{OpportunityId, SubmissionId, SubmissionStatus},
    protocol::{
        ApproveSubmissionRequest, ApproveSubmissionResponse, ArchiveRequest, AuditEntry,
        DeleteSubmissionsRequest, DeleteSubmissionsResponse, DuplicateRequest, DuplicateResponse,
        HardDeleteRequest, ImportReport, ImportRequest, NewOpportunity, Opportunity,
        OpportunityExport, OpportunityPatch, PendingCountResponse, ReorderRequest,
        ReorderResponse, StatusUpdateRequest, Submission, SubmissionStatusRequest, SyncReport,
        SyncRequest, UnarchiveRequest,
    },
};

use crate::{app_state::AppState, http_error, HttpError, HttpResult};

const DEFAULT_AUDIT_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct SubmissionsQuery {
    status: Option<SubmissionStatus>,
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    limit: Option<u32>,
}

pub(crate) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/opportunities", post(http_create))
        .route("/opportunities/reorder", post(http_reorder))
        .route("/opportunities/:id", patch(http_update).delete(http_hard_delete))
        .route("/opportunities/:id/archive", post(http_archive))
        .route("/opportunities/:id/unarchive", post(http_unarchive))
        .route("/opportunities/:id/duplicate", post(http_duplicate))
        .route("/opportunities/:id/verify", post(http_verify))
        .route("/opportunities/:id/status", post(http_set_status))
        .route("/submissions", get(http_list_submissions))
        .route("/submissions/pending_count", get(http_pending_count))
        .route("/submissions/delete", post(http_delete_submissions))
        .route("/submissions/:id/status", post(http_set_submission_status))
        .route("/submissions/:id/approve", post(http_approve_submission))
        .route("/audit", get(http_audit))
        .route("/sync/export", get(http_export))
        .route("/sync/import", post(http_import))
        .route("/sync", post(http_sync))
}

/// Admin action bodies are optional; a missing body means the default admin.
fn body_or_default<T: Default>(body: Option<Json<T>>) -> T {
    body.map(|Json(inner)| inner).unwrap_or_default()
}

async fn http_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewOpportunity>,
) -> HttpResult<Opportunity> {
    let created = create_opportunity(&state.api, req)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(created))
}

async fn http_update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(patch): Json<OpportunityPatch>,
) -> HttpResult<Opportunity> {
    let updated = update_opportunity(&state.api, OpportunityId(id), &patch)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(updated))
}

async fn http_archive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<ArchiveRequest>>,
) -> HttpResult<Opportunity> {
    let req = body_or_default(body);
    let archived = archive_opportunity(&state.api, OpportunityId(id), &req.actor)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(archived))
}

async fn http_unarchive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<UnarchiveRequest>>,
) -> HttpResult<Opportunity> {
    let req = body_or_default(body);
    let restored = unarchive_opportunity(&state.api, OpportunityId(id), &req.actor, req.status)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(restored))
}

async fn http_duplicate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<DuplicateRequest>>,
) -> HttpResult<DuplicateResponse> {
    let req = body_or_default(body);
    let response = duplicate_opportunity(
        &state.api,
        OpportunityId(id),
        &req.actor,
        &req.title_suffix,
        req.status,
    )
    .await
    .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(response))
}

async fn http_verify(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HttpResult<Opportunity> {
    let verified = verify_opportunity(&state.api, OpportunityId(id))
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(verified))
}

async fn http_set_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<StatusUpdateRequest>,
) -> HttpResult<Opportunity> {
    let updated = set_opportunity_status(&state.api, OpportunityId(id), req.status)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(updated))
}

async fn http_hard_delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<HardDeleteRequest>>,
) -> Result<StatusCode, HttpError> {
    let req = body_or_default(body);
    hard_delete_opportunity(&state.api, OpportunityId(id), &req.actor)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(StatusCode::NO_CONTENT)
}

async fn http_reorder(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReorderRequest>,
) -> HttpResult<ReorderResponse> {
    let response = reorder_opportunities(&state.api, &req.items, &req.actor)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(response))
}

async fn http_list_submissions(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SubmissionsQuery>,
) -> HttpResult<Vec<Submission>> {
    let submissions = list_submissions(&state.api, q.status)
        .await
        .map_err(http_error)?;
    Ok(Json(submissions))
}

async fn http_pending_count(State(state): State<Arc<AppState>>) -> HttpResult<PendingCountResponse> {
    let count = pending_submission_count(&state.api)
        .await
        .map_err(http_error)?;
    Ok(Json(count))
}

async fn http_set_submission_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<SubmissionStatusRequest>,
) -> HttpResult<Submission> {
    let submission = set_submission_status(&state.api, SubmissionId(id), req.status)
        .await
        .map_err(http_error)?;
    state.submissions_changed().await;
    Ok(Json(submission))
}

async fn http_approve_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<ApproveSubmissionRequest>>,
) -> HttpResult<ApproveSubmissionResponse> {
    let req = body_or_default(body);
    let response = approve_submission(&state.api, SubmissionId(id), &req.actor)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    state.submissions_changed().await;
    Ok(Json(response))
}

async fn http_delete_submissions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteSubmissionsRequest>,
) -> HttpResult<DeleteSubmissionsResponse> {
    let response = delete_submissions(&state.api, &req.ids)
        .await
        .map_err(http_error)?;
    state.submissions_changed().await;
    Ok(Json(response))
}

async fn http_audit(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AuditQuery>,
) -> HttpResult<Vec<AuditEntry>> {
    let entries = list_audit_entries(&state.api, q.limit.unwrap_or(DEFAULT_AUDIT_LIMIT))
        .await
        .map_err(http_error)?;
    Ok(Json(entries))
}

async fn http_export(State(state): State<Arc<AppState>>) -> HttpResult<Vec<OpportunityExport>> {
    let records = export_opportunities(&state.api)
        .await
        .map_err(http_error)?;
    Ok(Json(records))
}

async fn http_import(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ImportRequest>,
) -> HttpResult<ImportReport> {
    let report = import_opportunities(&state.api, &req)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(report))
}

async fn http_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SyncRequest>,
) -> HttpResult<SyncReport> {
    let report = sync_opportunities(&state.api, &req.opportunities)
        .await
        .map_err(http_error)?;
    state.opportunities_changed();
    Ok(Json(report))
}
