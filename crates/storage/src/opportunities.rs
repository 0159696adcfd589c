use anyhow::{Context, Result};
use chrono::Utc;
use curation::filter::{matches_search, search_needle};
use serde_json::json;
use shared::{
    domain::{AuditAction, OpportunityId, OpportunityStatus, RestoredStatus, StatusFilter},
    protocol::{
        AdminActor, ListQuery, NewOpportunity, Opportunity, OpportunityExport, OpportunityPatch,
        ReorderItem,
    },
};

use crate::{
    fetch_opportunity, insert_record, opportunity_from_row, overwrite_record, record_audit,
    stored_deadline, to_millis, Storage, OPPORTUNITY_COLUMNS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    Applied(usize),
    /// Nothing was written; the first id that does not exist.
    MissingRecord(OpportunityId),
}

impl Storage {
    /// Coarse listing ordered by deadline, rolling records last, then id.
    pub async fn list_opportunities(&self, query: &ListQuery) -> Result<Vec<Opportunity>> {
        let condition = match query.status {
            StatusFilter::Archived => "archived_at IS NOT NULL",
            StatusFilter::Active => "status = 'active' AND archived_at IS NULL",
            StatusFilter::Inactive => "status = 'inactive' AND archived_at IS NULL",
            StatusFilter::All if query.include_archived => "1 = 1",
            StatusFilter::All => "archived_at IS NULL",
        };
        let rows = sqlx::query(&format!(
            "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities
             WHERE {condition}
             ORDER BY deadline IS NULL, deadline ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("failed to list opportunities")?;

        let needle = query.search.as_deref().and_then(search_needle);
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = opportunity_from_row(row)?;
            if matches_search(&record, needle.as_deref()) {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub async fn get_opportunity(&self, id: OpportunityId) -> Result<Option<Opportunity>> {
        let mut conn = self.pool.acquire().await?;
        fetch_opportunity(&mut conn, id).await
    }

    pub async fn insert_opportunity(&self, new: &NewOpportunity) -> Result<Opportunity> {
        let now = Utc::now();
        let record = OpportunityExport {
            title: new.title.clone(),
            description: new.description.clone(),
            description_full: new.description_full.clone(),
            provider: new.provider.clone(),
            logo_url: new.logo_url.clone(),
            category_tags: new.category_tags.clone(),
            applicable_groups: new.applicable_groups.clone(),
            apply_url: new.apply_url.clone(),
            deadline: new.deadline,
            status: new.status,
            regions: new.regions.clone(),
            funding_types: new.funding_types.clone(),
            eligibility: new.eligibility.clone(),
            sort_order: new.sort_order,
            created_at: now,
            updated_at: now,
            verified_at: None,
            archived_at: None,
            archived_by: None,
            created_by: new.created_by.clone(),
        };

        let mut conn = self.pool.acquire().await?;
        let id = insert_record(&mut conn, &record).await?;
        fetch_opportunity(&mut conn, id)
            .await?
            .with_context(|| format!("opportunity {id} vanished after insert"))
    }

    pub async fn update_opportunity(
        &self,
        id: OpportunityId,
        patch: &OpportunityPatch,
    ) -> Result<Option<Opportunity>> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = fetch_opportunity(&mut tx, id).await? else {
            return Ok(None);
        };

        let mut record = OpportunityExport::from(current);
        apply_patch(&mut record, patch);
        record.updated_at = Utc::now();
        overwrite_record(&mut tx, id, &record).await?;
        let updated = fetch_opportunity(&mut tx, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    pub async fn archive_opportunity(
        &self,
        id: OpportunityId,
        actor: &AdminActor,
    ) -> Result<Option<Opportunity>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE opportunities
             SET archived_at = ?, archived_by = ?, status = 'archived', updated_at = ?
             WHERE id = ?",
        )
        .bind(to_millis(now))
        .bind(actor.email_or_id())
        .bind(to_millis(now))
        .bind(id.0)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        record_audit(
            &mut tx,
            actor,
            AuditAction::Archived,
            &id.to_string(),
            json!({ "archived_at": to_millis(now) }),
            now,
        )
        .await?;
        let archived = fetch_opportunity(&mut tx, id).await?;
        tx.commit().await?;
        Ok(archived)
    }

    pub async fn unarchive_opportunity(
        &self,
        id: OpportunityId,
        actor: &AdminActor,
        status: RestoredStatus,
    ) -> Result<Option<Opportunity>> {
        let now = Utc::now();
        let status = OpportunityStatus::from(status);
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE opportunities
             SET archived_at = NULL, archived_by = NULL, status = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(to_millis(now))
        .bind(id.0)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }

        record_audit(
            &mut tx,
            actor,
            AuditAction::Unarchived,
            &id.to_string(),
            json!({ "archived_at": null, "status": status.as_str() }),
            now,
        )
        .await?;
        let restored = fetch_opportunity(&mut tx, id).await?;
        tx.commit().await?;
        Ok(restored)
    }

    /// Copies `id` under a new title. The copy starts without a manual position.
    pub async fn duplicate_opportunity(
        &self,
        id: OpportunityId,
        actor: &AdminActor,
        title_suffix: &str,
        status: OpportunityStatus,
    ) -> Result<Option<OpportunityId>> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(source) = fetch_opportunity(&mut tx, id).await? else {
            return Ok(None);
        };

        let mut copy = OpportunityExport::from(source);
        copy.title = format!("{}{title_suffix}", copy.title);
        copy.status = status;
        copy.sort_order = None;
        copy.created_at = now;
        copy.updated_at = now;
        copy.verified_at = None;
        copy.archived_at = None;
        copy.archived_by = None;
        copy.created_by = actor.email_or_id().to_string();
        let copy_id = insert_record(&mut tx, &copy).await?;

        record_audit(
            &mut tx,
            actor,
            AuditAction::Duplicated,
            &copy_id.to_string(),
            json!({ "duplicated_from": id.to_string() }),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(Some(copy_id))
    }

    pub async fn verify_opportunity(&self, id: OpportunityId) -> Result<Option<Opportunity>> {
        let now = to_millis(Utc::now());
        let mut conn = self.pool.acquire().await?;
        let result =
            sqlx::query("UPDATE opportunities SET verified_at = ?, updated_at = ? WHERE id = ?")
                .bind(now)
                .bind(now)
                .bind(id.0)
                .execute(&mut *conn)
                .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_opportunity(&mut conn, id).await
    }

    pub async fn set_opportunity_status(
        &self,
        id: OpportunityId,
        status: OpportunityStatus,
    ) -> Result<Option<Opportunity>> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("UPDATE opportunities SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(to_millis(Utc::now()))
            .bind(id.0)
            .execute(&mut *conn)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        fetch_opportunity(&mut conn, id).await
    }

    /// Permanent removal. Returns false when the record does not exist.
    pub async fn hard_delete_opportunity(
        &self,
        id: OpportunityId,
        actor: &AdminActor,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let Some(existing) = fetch_opportunity(&mut tx, id).await? else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM opportunities WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        record_audit(
            &mut tx,
            actor,
            AuditAction::Deleted,
            &id.to_string(),
            json!({
                "deleted": true,
                "title": existing.title,
                "provider": existing.provider,
            }),
            Utc::now(),
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Applies every `(id, sort_order)` pair in one transaction, or none of
    /// them.
    pub async fn reorder_opportunities(
        &self,
        items: &[ReorderItem],
        actor: &AdminActor,
    ) -> Result<ReorderOutcome> {
        if items.is_empty() {
            return Ok(ReorderOutcome::Applied(0));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for item in items {
            let result =
                sqlx::query("UPDATE opportunities SET sort_order = ?, updated_at = ? WHERE id = ?")
                    .bind(item.sort_order)
                    .bind(to_millis(now))
                    .bind(item.id.0)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("failed to reorder opportunity {}", item.id))?;
            if result.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(ReorderOutcome::MissingRecord(item.id));
            }
        }

        let resource_id = items
            .iter()
            .map(|item| item.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        record_audit(
            &mut tx,
            actor,
            AuditAction::Reordered,
            &resource_id,
            json!({ "items": items }),
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(ReorderOutcome::Applied(items.len()))
    }
}

fn apply_patch(record: &mut OpportunityExport, patch: &OpportunityPatch) {
    fn set<T: Clone>(field: &mut T, value: &Option<T>) {
        if let Some(value) = value {
            *field = value.clone();
        }
    }

    set(&mut record.title, &patch.title);
    set(&mut record.description, &patch.description);
    set(&mut record.description_full, &patch.description_full);
    set(&mut record.provider, &patch.provider);
    set(&mut record.logo_url, &patch.logo_url);
    set(&mut record.category_tags, &patch.category_tags);
    set(&mut record.applicable_groups, &patch.applicable_groups);
    set(&mut record.apply_url, &patch.apply_url);
    set(&mut record.status, &patch.status);
    set(&mut record.regions, &patch.regions);
    set(&mut record.funding_types, &patch.funding_types);
    set(&mut record.eligibility, &patch.eligibility);
    if patch.clear_deadline {
        record.deadline = None;
    } else if patch.deadline.is_some() {
        record.deadline = patch.deadline;
    }
    if stored_deadline(record.deadline).is_none() {
        record.deadline = None;
    }
}
