use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use curation::tags::tags_for_submission_type;
use shared::{
    domain::{OpportunityId, OpportunityStatus, SubmissionId, SubmissionStatus},
    protocol::{AdminActor, NewSubmission, OpportunityExport, Submission},
};
use sqlx::SqliteConnection;

use crate::{insert_record, submission_from_row, to_millis, Storage, SUBMISSION_COLUMNS};

/// How long an approved submission stays open before it needs curating.
pub const APPROVED_DEADLINE_DAYS: i64 = 90;
const UNKNOWN_PROVIDER: &str = "Unknown";

impl Storage {
    pub async fn create_submission(&self, new: &NewSubmission) -> Result<Submission> {
        let mut conn = self.pool.acquire().await?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO submissions (opportunity_name, opportunity_type, description, link,
                 user_name, user_twitter, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 'pending', ?)
             RETURNING id",
        )
        .bind(new.opportunity_name.trim())
        .bind(new.opportunity_type.trim())
        .bind(new.description.trim())
        .bind(new.link.trim())
        .bind(non_blank(new.user_name.as_deref()))
        .bind(non_blank(new.user_twitter.as_deref()))
        .bind(to_millis(Utc::now()))
        .fetch_one(&mut *conn)
        .await
        .context("failed to insert submission")?;

        fetch_submission(&mut conn, SubmissionId(id))
            .await?
            .with_context(|| format!("submission {id} vanished after insert"))
    }

    /// Newest first, optionally narrowed to one status.
    pub async fn list_submissions(
        &self,
        status: Option<SubmissionStatus>,
    ) -> Result<Vec<Submission>> {
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM submissions
                     WHERE status = ?
                     ORDER BY created_at DESC, id DESC"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM submissions
                     ORDER BY created_at DESC, id DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(submission_from_row).collect()
    }

    pub async fn get_submission(&self, id: SubmissionId) -> Result<Option<Submission>> {
        let mut conn = self.pool.acquire().await?;
        fetch_submission(&mut conn, id).await
    }

    pub async fn count_pending_submissions(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub async fn set_submission_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("UPDATE submissions SET status = ?, reviewed_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(to_millis(Utc::now()))
            .bind(id.0)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_submission(&mut conn, id).await
    }

    /// Publishes a submission as an active opportunity and marks it approved,
    /// both or neither.
    pub async fn approve_submission(
        &self,
        id: SubmissionId,
        actor: &AdminActor,
    ) -> Result<Option<OpportunityId>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(submission) = fetch_submission(&mut tx, id).await? else {
            return Ok(None);
        };

        let record = OpportunityExport {
            title: submission.opportunity_name.clone(),
            description: submission.description.clone(),
            description_full: submission.description.clone(),
            provider: submission
                .user_name
                .clone()
                .unwrap_or_else(|| UNKNOWN_PROVIDER.to_string()),
            logo_url: String::new(),
            category_tags: tags_for_submission_type(&submission.opportunity_type),
            applicable_groups: Vec::new(),
            apply_url: submission.link.clone(),
            deadline: Some(now + Duration::days(APPROVED_DEADLINE_DAYS)),
            status: OpportunityStatus::Active,
            regions: Vec::new(),
            funding_types: Vec::new(),
            eligibility: String::new(),
            sort_order: None,
            created_at: now,
            updated_at: now,
            verified_at: None,
            archived_at: None,
            archived_by: None,
            created_by: actor.email_or_id().to_string(),
        };
        let opportunity_id = insert_record(&mut tx, &record).await?;

        sqlx::query("UPDATE submissions SET status = 'approved', reviewed_at = ? WHERE id = ?")
            .bind(to_millis(now))
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to mark submission {id} approved"))?;
        tx.commit().await?;
        Ok(Some(opportunity_id))
    }

    /// Returns how many of `ids` existed.
    pub async fn delete_submissions(&self, ids: &[SubmissionId]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;
        for id in ids {
            deleted += sqlx::query("DELETE FROM submissions WHERE id = ?")
                .bind(id.0)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(deleted)
    }
}

async fn fetch_submission(
    conn: &mut SqliteConnection,
    id: SubmissionId,
) -> Result<Option<Submission>> {
    let row = sqlx::query(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?"
    ))
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(submission_from_row).transpose()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
