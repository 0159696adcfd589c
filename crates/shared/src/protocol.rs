use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        AuditAction, AuditEntryId, ImportMode, OpportunityId, OpportunityStatus, RestoredStatus,
        StatusFilter, SubmissionId, SubmissionStatus,
    },
    error::ApiError,
};

pub const DEFAULT_ADMIN_ID: &str = "admin";
pub const DEFAULT_DUPLICATE_SUFFIX: &str = " (Copy)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: OpportunityId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub description_full: String,
    pub provider: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub category_tags: Vec<String>,
    #[serde(default)]
    pub applicable_groups: Vec<String>,
    pub apply_url: String,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<DateTime<Utc>>,
    pub status: OpportunityStatus,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub funding_types: Vec<String>,
    #[serde(default)]
    pub eligibility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_by: Option<String>,
    pub created_by: String,
}

impl Opportunity {
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewOpportunity {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub description_full: String,
    pub provider: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub category_tags: Vec<String>,
    #[serde(default)]
    pub applicable_groups: Vec<String>,
    pub apply_url: String,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default = "default_new_status")]
    pub status: OpportunityStatus,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub funding_types: Vec<String>,
    #[serde(default)]
    pub eligibility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(default = "default_admin_id")]
    pub created_by: String,
}

fn default_new_status() -> OpportunityStatus {
    OpportunityStatus::Active
}

fn default_admin_id() -> String {
    DEFAULT_ADMIN_ID.to_string()
}

/// Partial update. `None` leaves the stored field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_full: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicable_groups: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_url: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<DateTime<Utc>>,
    /// Makes the record rolling again. Wins over `deadline`.
    #[serde(default)]
    pub clear_deadline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OpportunityStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderItem {
    pub id: OpportunityId,
    pub sort_order: i64,
}

/// Coarse server-side filter; the curation engine narrows the result further.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: StatusFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

impl ListQuery {
    pub fn active() -> Self {
        Self {
            status: StatusFilter::Active,
            ..Self::default()
        }
    }
}

/// A full replacement of the records matching a subscription, never a diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<Opportunity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminActor {
    #[serde(default = "default_admin_id")]
    pub admin_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_email: Option<String>,
}

impl Default for AdminActor {
    fn default() -> Self {
        Self {
            admin_id: default_admin_id(),
            admin_email: None,
        }
    }
}

impl AdminActor {
    pub fn new(admin_id: impl Into<String>) -> Self {
        Self {
            admin_id: admin_id.into(),
            admin_email: None,
        }
    }

    pub fn email_or_id(&self) -> &str {
        self.admin_email.as_deref().unwrap_or(&self.admin_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveRequest {
    #[serde(flatten)]
    pub actor: AdminActor,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnarchiveRequest {
    #[serde(flatten)]
    pub actor: AdminActor,
    #[serde(default)]
    pub status: RestoredStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRequest {
    #[serde(flatten)]
    pub actor: AdminActor,
    #[serde(default = "default_duplicate_suffix")]
    pub title_suffix: String,
    #[serde(default = "default_duplicate_status")]
    pub status: OpportunityStatus,
}

impl Default for DuplicateRequest {
    fn default() -> Self {
        Self {
            actor: AdminActor::default(),
            title_suffix: default_duplicate_suffix(),
            status: default_duplicate_status(),
        }
    }
}

fn default_duplicate_suffix() -> String {
    DEFAULT_DUPLICATE_SUFFIX.to_string()
}

fn default_duplicate_status() -> OpportunityStatus {
    OpportunityStatus::Inactive
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateResponse {
    pub id: OpportunityId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardDeleteRequest {
    #[serde(flatten)]
    pub actor: AdminActor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OpportunityStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReorderRequest {
    #[serde(flatten)]
    pub actor: AdminActor,
    pub items: Vec<ReorderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderResponse {
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub opportunity_name: String,
    pub opportunity_type: String,
    pub description: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_twitter: Option<String>,
    pub status: SubmissionStatus,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub opportunity_name: String,
    pub opportunity_type: String,
    pub description: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_twitter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionStatusRequest {
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApproveSubmissionRequest {
    #[serde(flatten)]
    pub actor: AdminActor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveSubmissionResponse {
    pub submission_id: SubmissionId,
    pub opportunity_id: OpportunityId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSubmissionsRequest {
    pub ids: Vec<SubmissionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSubmissionsResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCountResponse {
    pub pending: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub admin_id: String,
    pub admin_email: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: String,
    pub changes: serde_json::Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// An opportunity as moved between environments: no id, timestamps preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityExport {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub description_full: String,
    pub provider: String,
    #[serde(default)]
    pub logo_url: String,
    #[serde(default)]
    pub category_tags: Vec<String>,
    #[serde(default)]
    pub applicable_groups: Vec<String>,
    pub apply_url: String,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<DateTime<Utc>>,
    pub status: OpportunityStatus,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub funding_types: Vec<String>,
    #[serde(default)]
    pub eligibility: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_by: Option<String>,
    pub created_by: String,
}

impl From<Opportunity> for OpportunityExport {
    fn from(value: Opportunity) -> Self {
        Self {
            title: value.title,
            description: value.description,
            description_full: value.description_full,
            provider: value.provider,
            logo_url: value.logo_url,
            category_tags: value.category_tags,
            applicable_groups: value.applicable_groups,
            apply_url: value.apply_url,
            deadline: value.deadline,
            status: value.status,
            regions: value.regions,
            funding_types: value.funding_types,
            eligibility: value.eligibility,
            sort_order: value.sort_order,
            created_at: value.created_at,
            updated_at: value.updated_at,
            verified_at: value.verified_at,
            archived_at: value.archived_at,
            archived_by: value.archived_by,
            created_by: value.created_by,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub mode: ImportMode,
    pub opportunities: Vec<OpportunityExport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub opportunities: Vec<OpportunityExport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub created: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    Snapshot(Snapshot),
    OpportunitiesChanged,
    SubmissionsChanged { pending: u64 },
    Error(ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_opportunity_defaults_to_active() {
        assert_eq!(NewOpportunity::default().status, OpportunityStatus::Active);

        let parsed: NewOpportunity = serde_json::from_value(serde_json::json!({
            "title": "Startup Grant",
            "description": "Non-dilutive funding",
            "provider": "Acme",
            "apply_url": "https://acme.example/apply",
        }))
        .expect("minimal body");
        assert_eq!(parsed.status, OpportunityStatus::Active);
        assert_eq!(parsed.created_by, DEFAULT_ADMIN_ID);
        assert_eq!(parsed.deadline, None);
    }
}
