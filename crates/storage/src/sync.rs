use std::collections::HashMap;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use shared::{
    domain::{ImportMode, OpportunityId},
    protocol::{ImportReport, OpportunityExport, SyncReport},
};
use sqlx::Row;

use crate::{
    from_millis, insert_record, opportunity_from_row, overwrite_record, Storage,
    OPPORTUNITY_COLUMNS,
};

type MatchKey = (String, String);

/// Which local row a (title, provider) key points at when several share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepeatedKey {
    /// Lowest id, the row a merge import updates.
    Oldest,
    /// Highest id, the row a sync compares against and overwrites.
    Newest,
}

fn match_key(record: &OpportunityExport) -> MatchKey {
    (record.title.clone(), record.provider.clone())
}

fn check_importable(record: &OpportunityExport) -> Result<()> {
    if record.title.trim().is_empty() {
        bail!("title is required");
    }
    if record.provider.trim().is_empty() {
        bail!("provider is required");
    }
    Ok(())
}

impl Storage {
    /// Every record, archived included, in id order and without ids.
    pub async fn export_opportunities(&self) -> Result<Vec<OpportunityExport>> {
        let rows = sqlx::query(&format!(
            "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| opportunity_from_row(row).map(OpportunityExport::from))
            .collect()
    }

    /// Bulk import in one transaction. Merge matches existing records on
    /// title and provider. Imported rows get `updated_at = now`.
    pub async fn import_opportunities(
        &self,
        mode: ImportMode,
        records: &[OpportunityExport],
    ) -> Result<ImportReport> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if mode == ImportMode::Replace {
            sqlx::query("DELETE FROM opportunities")
                .execute(&mut *tx)
                .await?;
        }

        let mut existing = if mode == ImportMode::Merge {
            load_match_index(&mut tx, RepeatedKey::Oldest).await?
        } else {
            HashMap::new()
        };

        let mut report = ImportReport::default();
        for source in records {
            let mut record = source.clone();
            record.updated_at = now;
            let result = match check_importable(&record) {
                Err(err) => Err(err),
                Ok(()) => match existing.get(&match_key(&record)) {
                    Some(&(id, _)) => overwrite_record(&mut tx, id, &record).await.map(|_| true),
                    None => insert_record(&mut tx, &record).await.map(|id| {
                        if mode == ImportMode::Merge {
                            existing.insert(match_key(&record), (id, now));
                        }
                        false
                    }),
                },
            };
            match result {
                Ok(true) => report.updated += 1,
                Ok(false) => report.created += 1,
                Err(err) => {
                    tracing::warn!(title = %source.title, error = %err, "skipping imported opportunity");
                    report
                        .errors
                        .push(format!("Failed to import {}: {err}", source.title));
                    report.skipped += 1;
                }
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    /// One-way sync from another environment. An existing record is only
    /// overwritten when the source copy was updated more recently.
    pub async fn sync_opportunities(&self, records: &[OpportunityExport]) -> Result<SyncReport> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut existing = load_match_index(&mut tx, RepeatedKey::Newest).await?;

        let mut report = SyncReport::default();
        for source in records {
            let key = match_key(source);
            let mut record = source.clone();
            record.updated_at = now;
            let result = match existing.get(&key) {
                Some(&(_, local_updated_at)) if source.updated_at <= local_updated_at => {
                    report.unchanged += 1;
                    continue;
                }
                Some(&(id, _)) => overwrite_record(&mut tx, id, &record).await.map(|_| true),
                None => match check_importable(&record) {
                    Err(err) => Err(err),
                    Ok(()) => insert_record(&mut tx, &record).await.map(|id| {
                        existing.insert(key, (id, now));
                        false
                    }),
                },
            };
            match result {
                Ok(true) => report.updated += 1,
                Ok(false) => report.created += 1,
                Err(err) => {
                    tracing::warn!(title = %source.title, error = %err, "failed to sync opportunity");
                    report
                        .errors
                        .push(format!("Failed to sync {}: {err}", source.title));
                }
            }
        }

        tx.commit().await?;
        Ok(report)
    }
}

/// One record per (title, provider), with its last update time.
async fn load_match_index(
    conn: &mut sqlx::SqliteConnection,
    repeated: RepeatedKey,
) -> Result<HashMap<MatchKey, (OpportunityId, DateTime<Utc>)>> {
    let rows = sqlx::query("SELECT id, title, provider, updated_at FROM opportunities ORDER BY id ASC")
        .fetch_all(&mut *conn)
        .await?;

    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        let key: MatchKey = (row.try_get("title")?, row.try_get("provider")?);
        let updated_at = from_millis(row.try_get("updated_at")?)?;
        let entry = (OpportunityId(row.try_get("id")?), updated_at);
        match repeated {
            RepeatedKey::Oldest => {
                index.entry(key).or_insert(entry);
            }
            RepeatedKey::Newest => {
                index.insert(key, entry);
            }
        }
    }
    Ok(index)
}
