use chrono::Duration;
use shared::{
    domain::{ImportMode, RestoredStatus, StatusFilter},
    protocol::{ListQuery, NewOpportunity, NewSubmission, OpportunityPatch, ReorderItem},
};

use super::*;

fn new_opportunity(title: &str, provider: &str) -> NewOpportunity {
    NewOpportunity {
        title: title.to_string(),
        description: format!("{title} description"),
        provider: provider.to_string(),
        apply_url: "https://example.org/apply".to_string(),
        status: OpportunityStatus::Active,
        created_by: "admin".to_string(),
        ..NewOpportunity::default()
    }
}

async fn seeded(titles: &[&str]) -> (Storage, Vec<OpportunityId>) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut ids = Vec::new();
    for title in titles {
        let record = storage
            .insert_opportunity(&new_opportunity(title, "Acme"))
            .await
            .expect("insert");
        ids.push(record.id);
    }
    (storage, ids)
}

fn all_records() -> ListQuery {
    ListQuery {
        include_archived: true,
        ..ListQuery::default()
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("listing.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn insert_round_trips_every_field() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut new = new_opportunity("Startup Grant Program", "Acme");
    new.category_tags = vec!["Grant".to_string(), "AI".to_string()];
    new.regions = vec!["EU".to_string()];
    new.deadline = Some(Utc::now() + Duration::days(30));
    new.sort_order = Some(3);

    let stored = storage.insert_opportunity(&new).await.expect("insert");
    let fetched = storage
        .get_opportunity(stored.id)
        .await
        .expect("get")
        .expect("present");

    assert_eq!(fetched, stored);
    assert_eq!(fetched.category_tags, new.category_tags);
    assert_eq!(fetched.regions, new.regions);
    assert_eq!(fetched.sort_order, Some(3));
    assert_eq!(
        fetched.deadline.map(|deadline| deadline.timestamp_millis()),
        new.deadline.map(|deadline| deadline.timestamp_millis())
    );
    assert_eq!(fetched.created_at, fetched.updated_at);
}

#[tokio::test]
async fn zero_deadline_is_stored_as_rolling() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut new = new_opportunity("Rolling", "Acme");
    new.deadline = DateTime::<Utc>::from_timestamp_millis(0);
    let stored = storage.insert_opportunity(&new).await.expect("insert");
    assert_eq!(stored.deadline, None);
}

#[tokio::test]
async fn list_orders_by_deadline_with_rolling_last() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let rolling = storage
        .insert_opportunity(&new_opportunity("Rolling", "Acme"))
        .await
        .expect("rolling");
    let mut later = new_opportunity("Later", "Acme");
    later.deadline = Some(Utc::now() + Duration::days(20));
    let later = storage.insert_opportunity(&later).await.expect("later");
    let mut sooner = new_opportunity("Sooner", "Acme");
    sooner.deadline = Some(Utc::now() + Duration::days(2));
    let sooner = storage.insert_opportunity(&sooner).await.expect("sooner");

    let ids: Vec<_> = storage
        .list_opportunities(&ListQuery::default())
        .await
        .expect("list")
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(ids, vec![sooner.id, later.id, rolling.id]);
}

#[tokio::test]
async fn list_filters_status_archive_and_search() {
    let (storage, ids) = seeded(&["Startup Grant Program", "Rust Bootcamp", "Old Fellowship"]).await;
    storage
        .set_opportunity_status(ids[1], OpportunityStatus::Inactive)
        .await
        .expect("status")
        .expect("present");
    storage
        .archive_opportunity(ids[2], &AdminActor::default())
        .await
        .expect("archive")
        .expect("present");

    let default_list = storage
        .list_opportunities(&ListQuery::default())
        .await
        .expect("list");
    assert_eq!(default_list.len(), 2);

    assert_eq!(
        storage.list_opportunities(&all_records()).await.expect("all").len(),
        3
    );

    let archived = storage
        .list_opportunities(&ListQuery {
            status: StatusFilter::Archived,
            ..ListQuery::default()
        })
        .await
        .expect("archived");
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].id, ids[2]);

    let inactive = storage
        .list_opportunities(&ListQuery {
            status: StatusFilter::Inactive,
            ..ListQuery::default()
        })
        .await
        .expect("inactive");
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].id, ids[1]);

    let searched = storage
        .list_opportunities(&ListQuery {
            search: Some("GRANT".to_string()),
            ..ListQuery::default()
        })
        .await
        .expect("search");
    assert_eq!(searched.len(), 1);
    assert_eq!(searched[0].id, ids[0]);
}

#[tokio::test]
async fn patch_changes_only_given_fields_and_bumps_updated_at() {
    let (storage, ids) = seeded(&["Grant"]).await;
    let before = storage
        .get_opportunity(ids[0])
        .await
        .expect("get")
        .expect("present");

    let patch = OpportunityPatch {
        title: Some("Bigger Grant".to_string()),
        deadline: Some(Utc::now() + Duration::days(5)),
        ..OpportunityPatch::default()
    };
    let after = storage
        .update_opportunity(ids[0], &patch)
        .await
        .expect("patch")
        .expect("present");
    assert_eq!(after.title, "Bigger Grant");
    assert_eq!(after.provider, before.provider);
    assert!(after.deadline.is_some());
    assert!(after.updated_at >= before.updated_at);

    let cleared = storage
        .update_opportunity(
            ids[0],
            &OpportunityPatch {
                clear_deadline: true,
                ..OpportunityPatch::default()
            },
        )
        .await
        .expect("clear")
        .expect("present");
    assert_eq!(cleared.deadline, None);

    assert!(storage
        .update_opportunity(OpportunityId(999), &patch)
        .await
        .expect("missing")
        .is_none());
}

#[tokio::test]
async fn archive_and_unarchive_write_audit_entries() {
    let (storage, ids) = seeded(&["Grant"]).await;
    let actor = AdminActor {
        admin_id: "curator".to_string(),
        admin_email: Some("curator@example.org".to_string()),
    };

    let archived = storage
        .archive_opportunity(ids[0], &actor)
        .await
        .expect("archive")
        .expect("present");
    assert!(archived.is_archived());
    assert_eq!(archived.status, OpportunityStatus::Archived);
    assert_eq!(archived.archived_by.as_deref(), Some("curator@example.org"));

    let restored = storage
        .unarchive_opportunity(ids[0], &actor, RestoredStatus::default())
        .await
        .expect("unarchive")
        .expect("present");
    assert!(!restored.is_archived());
    assert_eq!(restored.status, OpportunityStatus::Inactive);
    assert_eq!(restored.archived_by, None);

    let audit = storage.list_audit_entries(10).await.expect("audit");
    let actions: Vec<_> = audit.iter().map(|entry| entry.action).collect();
    assert_eq!(actions, vec![AuditAction::Unarchived, AuditAction::Archived]);
    assert_eq!(audit[0].admin_email, "curator@example.org");
    assert_eq!(audit[1].resource_id, ids[0].to_string());
}

#[tokio::test]
async fn duplicate_copies_without_manual_position() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut new = new_opportunity("Grant", "Acme");
    new.sort_order = Some(1);
    new.category_tags = vec!["Grant".to_string()];
    let source = storage.insert_opportunity(&new).await.expect("insert");

    let copy_id = storage
        .duplicate_opportunity(
            source.id,
            &AdminActor::new("second-admin"),
            " (Copy)",
            OpportunityStatus::Inactive,
        )
        .await
        .expect("duplicate")
        .expect("source present");
    let copy = storage
        .get_opportunity(copy_id)
        .await
        .expect("get")
        .expect("copy present");

    assert_ne!(copy.id, source.id);
    assert_eq!(copy.title, "Grant (Copy)");
    assert_eq!(copy.status, OpportunityStatus::Inactive);
    assert_eq!(copy.sort_order, None);
    assert_eq!(copy.category_tags, source.category_tags);
    assert_eq!(copy.created_by, "second-admin");

    let audit = storage.list_audit_entries(1).await.expect("audit");
    assert_eq!(audit[0].action, AuditAction::Duplicated);
    assert_eq!(audit[0].changes["duplicated_from"], source.id.to_string());
}

#[tokio::test]
async fn hard_delete_removes_row() {
    let (storage, ids) = seeded(&["Grant"]).await;
    assert!(storage
        .hard_delete_opportunity(ids[0], &AdminActor::default())
        .await
        .expect("delete"));
    assert!(storage.get_opportunity(ids[0]).await.expect("get").is_none());
    assert!(!storage
        .hard_delete_opportunity(ids[0], &AdminActor::default())
        .await
        .expect("second delete"));

    let audit = storage.list_audit_entries(5).await.expect("audit");
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].changes["title"], "Grant");
}

#[tokio::test]
async fn verify_sets_verified_at() {
    let (storage, ids) = seeded(&["Grant"]).await;
    let verified = storage
        .verify_opportunity(ids[0])
        .await
        .expect("verify")
        .expect("present");
    assert!(verified.verified_at.is_some());
}

#[tokio::test]
async fn reorder_applies_dense_batch() {
    let (storage, ids) = seeded(&["A", "B", "C"]).await;
    let items = vec![
        ReorderItem { id: ids[2], sort_order: 0 },
        ReorderItem { id: ids[0], sort_order: 1 },
        ReorderItem { id: ids[1], sort_order: 2 },
    ];
    let outcome = storage
        .reorder_opportunities(&items, &AdminActor::default())
        .await
        .expect("reorder");
    assert_eq!(outcome, ReorderOutcome::Applied(3));

    for item in &items {
        let record = storage
            .get_opportunity(item.id)
            .await
            .expect("get")
            .expect("present");
        assert_eq!(record.sort_order, Some(item.sort_order));
    }

    let audit = storage.list_audit_entries(1).await.expect("audit");
    assert_eq!(audit[0].action, AuditAction::Reordered);
    assert_eq!(audit[0].changes["items"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn reorder_with_unknown_id_leaves_rows_untouched() {
    let (storage, ids) = seeded(&["A", "B"]).await;
    let items = vec![
        ReorderItem { id: ids[0], sort_order: 1 },
        ReorderItem { id: OpportunityId(404), sort_order: 0 },
        ReorderItem { id: ids[1], sort_order: 2 },
    ];
    let outcome = storage
        .reorder_opportunities(&items, &AdminActor::default())
        .await
        .expect("reorder");
    assert_eq!(outcome, ReorderOutcome::MissingRecord(OpportunityId(404)));

    for id in ids {
        let record = storage.get_opportunity(id).await.expect("get").expect("present");
        assert_eq!(record.sort_order, None);
    }
    assert!(storage.list_audit_entries(10).await.expect("audit").is_empty());
}

fn submission(name: &str, kind: &str, user_name: Option<&str>) -> NewSubmission {
    NewSubmission {
        opportunity_name: name.to_string(),
        opportunity_type: kind.to_string(),
        description: format!("{name} description"),
        link: "https://example.org/submit".to_string(),
        user_name: user_name.map(str::to_string),
        user_twitter: None,
    }
}

#[tokio::test]
async fn submissions_start_pending_and_count() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage
        .create_submission(&submission("Grant", "grant", Some("Ada")))
        .await
        .expect("first");
    let second = storage
        .create_submission(&submission("Camp", "bootcamp", Some("  ")))
        .await
        .expect("second");
    assert_eq!(first.status, SubmissionStatus::Pending);
    assert_eq!(second.user_name, None);
    assert_eq!(storage.count_pending_submissions().await.expect("count"), 2);

    let rejected = storage
        .set_submission_status(first.id, SubmissionStatus::Rejected)
        .await
        .expect("status")
        .expect("present");
    assert!(rejected.reviewed_at.is_some());
    assert_eq!(storage.count_pending_submissions().await.expect("count"), 1);

    let pending = storage
        .list_submissions(Some(SubmissionStatus::Pending))
        .await
        .expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, second.id);

    let everything = storage.list_submissions(None).await.expect("all");
    assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn approving_creates_active_opportunity_due_in_ninety_days() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let pending = storage
        .create_submission(&submission("Founders Grant", "Grant", None))
        .await
        .expect("submission");

    let before = Utc::now();
    let opportunity_id = storage
        .approve_submission(pending.id, &AdminActor::default())
        .await
        .expect("approve")
        .expect("present");

    let opportunity = storage
        .get_opportunity(opportunity_id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(opportunity.title, "Founders Grant");
    assert_eq!(opportunity.provider, "Unknown");
    assert_eq!(opportunity.status, OpportunityStatus::Active);
    assert_eq!(opportunity.category_tags, vec!["Grant", "Funding"]);
    assert_eq!(opportunity.apply_url, "https://example.org/submit");
    let deadline = opportunity.deadline.expect("deadline");
    assert!(deadline >= before + Duration::days(APPROVED_DEADLINE_DAYS) - Duration::seconds(1));
    assert!(deadline <= Utc::now() + Duration::days(APPROVED_DEADLINE_DAYS));

    let submission = storage
        .get_submission(pending.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(submission.status, SubmissionStatus::Approved);
    assert!(storage
        .approve_submission(SubmissionId(999), &AdminActor::default())
        .await
        .expect("missing")
        .is_none());
}

#[tokio::test]
async fn delete_submissions_counts_existing_rows() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage
        .create_submission(&submission("A", "other", None))
        .await
        .expect("a");
    let deleted = storage
        .delete_submissions(&[first.id, SubmissionId(77)])
        .await
        .expect("delete");
    assert_eq!(deleted, 1);
}

#[tokio::test]
async fn merge_import_updates_on_title_and_provider() {
    let (storage, ids) = seeded(&["Grant"]).await;
    let mut incoming = storage.export_opportunities().await.expect("export");
    incoming[0].description = "refreshed".to_string();
    let mut fresh = incoming[0].clone();
    fresh.title = "Brand New".to_string();
    incoming.push(fresh);
    let mut broken = incoming[0].clone();
    broken.title = "  ".to_string();
    incoming.push(broken);

    let report = storage
        .import_opportunities(ImportMode::Merge, &incoming)
        .await
        .expect("import");
    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors.len(), 1);

    let updated = storage
        .get_opportunity(ids[0])
        .await
        .expect("get")
        .expect("present");
    assert_eq!(updated.description, "refreshed");
    assert_eq!(storage.list_opportunities(&all_records()).await.expect("all").len(), 2);
}

#[tokio::test]
async fn replace_import_clears_existing_records() {
    let (storage, _) = seeded(&["Old A", "Old B"]).await;
    let mut incoming = storage.export_opportunities().await.expect("export");
    incoming.truncate(1);
    incoming[0].title = "Only".to_string();

    let report = storage
        .import_opportunities(ImportMode::Replace, &incoming)
        .await
        .expect("import");
    assert_eq!(report.created, 1);

    let records = storage.list_opportunities(&all_records()).await.expect("all");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Only");

    let appended = storage
        .import_opportunities(ImportMode::Append, &incoming)
        .await
        .expect("append");
    assert_eq!(appended.created, 1);
    assert_eq!(storage.list_opportunities(&all_records()).await.expect("all").len(), 2);
}

#[tokio::test]
async fn sync_only_overwrites_when_source_is_newer() {
    let (storage, ids) = seeded(&["Grant", "Bootcamp"]).await;
    let mut source = storage.export_opportunities().await.expect("export");

    source[0].description = "newer upstream".to_string();
    source[0].updated_at = Utc::now() + Duration::minutes(5);
    source[1].description = "stale upstream".to_string();
    source[1].updated_at = source[1].updated_at - Duration::days(1);
    let mut new_record = source[0].clone();
    new_record.title = "Accelerator".to_string();
    source.push(new_record);

    let report = storage.sync_opportunities(&source).await.expect("sync");
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.created, 1);
    assert!(report.errors.is_empty());

    let grant = storage.get_opportunity(ids[0]).await.expect("get").expect("present");
    let bootcamp = storage.get_opportunity(ids[1]).await.expect("get").expect("present");
    assert_eq!(grant.description, "newer upstream");
    assert_eq!(bootcamp.description, "Bootcamp description");
}

#[tokio::test]
async fn repeated_title_and_provider_pick_oldest_for_merge_and_newest_for_sync() {
    let (storage, ids) = seeded(&["Grant", "Grant"]).await;
    let template = storage.export_opportunities().await.expect("export")[0].clone();

    let mut merged = template.clone();
    merged.description = "merged".to_string();
    let report = storage
        .import_opportunities(ImportMode::Merge, &[merged])
        .await
        .expect("import");
    assert_eq!(report.updated, 1);

    let mut synced = template;
    synced.description = "synced".to_string();
    synced.updated_at = Utc::now() + Duration::minutes(5);
    let report = storage.sync_opportunities(&[synced]).await.expect("sync");
    assert_eq!(report.updated, 1);

    let oldest = storage.get_opportunity(ids[0]).await.expect("get").expect("present");
    let newest = storage.get_opportunity(ids[1]).await.expect("get").expect("present");
    assert_eq!(oldest.description, "merged");
    assert_eq!(newest.description, "synced");
}
