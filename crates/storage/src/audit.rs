use anyhow::{Context, Result};
use shared::{
    domain::{AuditAction, AuditEntryId},
    protocol::AuditEntry,
};
use sqlx::Row;
use std::str::FromStr;

use crate::{from_millis, Storage};

pub const MAX_AUDIT_LIMIT: u32 = 500;

impl Storage {
    /// Newest entries first. `limit` is clamped to `1..=MAX_AUDIT_LIMIT`.
    pub async fn list_audit_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        let limit = limit.clamp(1, MAX_AUDIT_LIMIT);
        let rows = sqlx::query(
            "SELECT id, admin_id, admin_email, action, resource_type, resource_id, changes, timestamp
             FROM audit_log
             ORDER BY timestamp DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("failed to list audit entries")?;

        rows.into_iter()
            .map(|row| {
                let action: String = row.try_get("action")?;
                let changes: String = row.try_get("changes")?;
                Ok(AuditEntry {
                    id: AuditEntryId(row.try_get("id")?),
                    admin_id: row.try_get("admin_id")?,
                    admin_email: row.try_get("admin_email")?,
                    action: AuditAction::from_str(&action)?,
                    resource_type: row.try_get("resource_type")?,
                    resource_id: row.try_get("resource_id")?,
                    changes: serde_json::from_str(&changes)
                        .context("audit changes column is not JSON")?,
                    timestamp: from_millis(row.try_get("timestamp")?)?,
                })
            })
            .collect()
    }
}
