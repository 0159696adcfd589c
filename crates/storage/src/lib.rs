use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{AuditAction, OpportunityId, OpportunityStatus, SubmissionId, SubmissionStatus},
    protocol::{AdminActor, Opportunity, OpportunityExport, Submission},
};

mod audit;
mod opportunities;
mod submissions;
mod sync;

pub use audit::MAX_AUDIT_LIMIT;
pub use opportunities::ReorderOutcome;
pub use submissions::APPROVED_DEADLINE_DAYS;

const MEMORY_URL: &str = "sqlite::memory:";

pub(crate) const OPPORTUNITY_COLUMNS: &str = "id, title, description, description_full, provider, \
     logo_url, category_tags, applicable_groups, apply_url, deadline, status, regions, \
     funding_types, eligibility, sort_order, created_at, updated_at, verified_at, archived_at, \
     archived_by, created_by";

pub(crate) const SUBMISSION_COLUMNS: &str = "id, opportunity_name, opportunity_type, description, \
     link, user_name, user_twitter, status, created_at, reviewed_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to an in-memory database sees its own empty schema.
        let max_connections = if database_url == MEMORY_URL { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow!("stored timestamp {millis} is out of range"))
}

fn optional_millis(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    row.try_get::<Option<i64>, _>(column)?
        .map(from_millis)
        .transpose()
}

/// Non-positive deadlines are stored as NULL so every reader sees "rolling".
pub(crate) fn stored_deadline(deadline: Option<DateTime<Utc>>) -> Option<i64> {
    deadline.map(to_millis).filter(|millis| *millis > 0)
}

pub(crate) fn encode_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values).context("failed to encode list column")
}

fn decode_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).with_context(|| format!("column '{column}' is not a JSON list"))
}

pub(crate) fn opportunity_from_row(row: &SqliteRow) -> Result<Opportunity> {
    let status: String = row.try_get("status")?;
    Ok(Opportunity {
        id: OpportunityId(row.try_get("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        description_full: row.try_get("description_full")?,
        provider: row.try_get("provider")?,
        logo_url: row.try_get("logo_url")?,
        category_tags: decode_list(row, "category_tags")?,
        applicable_groups: decode_list(row, "applicable_groups")?,
        apply_url: row.try_get("apply_url")?,
        deadline: optional_millis(row, "deadline")?,
        status: OpportunityStatus::from_str(&status)?,
        regions: decode_list(row, "regions")?,
        funding_types: decode_list(row, "funding_types")?,
        eligibility: row.try_get("eligibility")?,
        sort_order: row.try_get("sort_order")?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
        verified_at: optional_millis(row, "verified_at")?,
        archived_at: optional_millis(row, "archived_at")?,
        archived_by: row.try_get("archived_by")?,
        created_by: row.try_get("created_by")?,
    })
}

pub(crate) fn submission_from_row(row: &SqliteRow) -> Result<Submission> {
    let status: String = row.try_get("status")?;
    Ok(Submission {
        id: SubmissionId(row.try_get("id")?),
        opportunity_name: row.try_get("opportunity_name")?,
        opportunity_type: row.try_get("opportunity_type")?,
        description: row.try_get("description")?,
        link: row.try_get("link")?,
        user_name: row.try_get("user_name")?,
        user_twitter: row.try_get("user_twitter")?,
        status: SubmissionStatus::from_str(&status)?,
        created_at: from_millis(row.try_get("created_at")?)?,
        reviewed_at: optional_millis(row, "reviewed_at")?,
    })
}

pub(crate) async fn fetch_opportunity(
    conn: &mut SqliteConnection,
    id: OpportunityId,
) -> Result<Option<Opportunity>> {
    let row = sqlx::query(&format!(
        "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities WHERE id = ?"
    ))
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(opportunity_from_row).transpose()
}

pub(crate) async fn insert_record(
    conn: &mut SqliteConnection,
    record: &OpportunityExport,
) -> Result<OpportunityId> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO opportunities (title, description, description_full, provider, logo_url,
             category_tags, applicable_groups, apply_url, deadline, status, regions, funding_types,
             eligibility, sort_order, created_at, updated_at, verified_at, archived_at, archived_by,
             created_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(&record.title)
    .bind(&record.description)
    .bind(&record.description_full)
    .bind(&record.provider)
    .bind(&record.logo_url)
    .bind(encode_list(&record.category_tags)?)
    .bind(encode_list(&record.applicable_groups)?)
    .bind(&record.apply_url)
    .bind(stored_deadline(record.deadline))
    .bind(record.status.as_str())
    .bind(encode_list(&record.regions)?)
    .bind(encode_list(&record.funding_types)?)
    .bind(&record.eligibility)
    .bind(record.sort_order)
    .bind(to_millis(record.created_at))
    .bind(to_millis(record.updated_at))
    .bind(record.verified_at.map(to_millis))
    .bind(record.archived_at.map(to_millis))
    .bind(record.archived_by.as_deref())
    .bind(&record.created_by)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to insert opportunity '{}'", record.title))?;
    Ok(OpportunityId(id))
}

/// Replaces every stored field of `id` with `record`. Returns false when the
/// row does not exist.
pub(crate) async fn overwrite_record(
    conn: &mut SqliteConnection,
    id: OpportunityId,
    record: &OpportunityExport,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE opportunities SET title = ?, description = ?, description_full = ?, provider = ?,
             logo_url = ?, category_tags = ?, applicable_groups = ?, apply_url = ?, deadline = ?,
             status = ?, regions = ?, funding_types = ?, eligibility = ?, sort_order = ?,
             created_at = ?, updated_at = ?, verified_at = ?, archived_at = ?, archived_by = ?,
             created_by = ?
         WHERE id = ?",
    )
    .bind(&record.title)
    .bind(&record.description)
    .bind(&record.description_full)
    .bind(&record.provider)
    .bind(&record.logo_url)
    .bind(encode_list(&record.category_tags)?)
    .bind(encode_list(&record.applicable_groups)?)
    .bind(&record.apply_url)
    .bind(stored_deadline(record.deadline))
    .bind(record.status.as_str())
    .bind(encode_list(&record.regions)?)
    .bind(encode_list(&record.funding_types)?)
    .bind(&record.eligibility)
    .bind(record.sort_order)
    .bind(to_millis(record.created_at))
    .bind(to_millis(record.updated_at))
    .bind(record.verified_at.map(to_millis))
    .bind(record.archived_at.map(to_millis))
    .bind(record.archived_by.as_deref())
    .bind(&record.created_by)
    .bind(id.0)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to overwrite opportunity {id}"))?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn record_audit(
    conn: &mut SqliteConnection,
    actor: &AdminActor,
    action: AuditAction,
    resource_id: &str,
    changes: serde_json::Value,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO audit_log (admin_id, admin_email, action, resource_type, resource_id, changes, timestamp)
         VALUES (?, ?, ?, 'opportunity', ?, ?, ?)",
    )
    .bind(&actor.admin_id)
    .bind(actor.email_or_id())
    .bind(action.as_str())
    .bind(resource_id)
    .bind(changes.to_string())
    .bind(to_millis(at))
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to record '{action}' audit entry"))?;
    Ok(())
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == MEMORY_URL || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
