use chrono::{DateTime, Duration, TimeZone, Utc};
use shared::{
    domain::{OpportunityId, OpportunityStatus},
    protocol::Opportunity,
};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

pub fn record(id: i64, title: &str) -> Opportunity {
    Opportunity {
        id: OpportunityId(id),
        title: title.to_string(),
        description: format!("{title} description"),
        description_full: String::new(),
        provider: "Provider".to_string(),
        logo_url: String::new(),
        category_tags: Vec::new(),
        applicable_groups: Vec::new(),
        apply_url: format!("https://example.org/{id}"),
        deadline: None,
        status: OpportunityStatus::Active,
        regions: Vec::new(),
        funding_types: Vec::new(),
        eligibility: String::new(),
        sort_order: None,
        created_at: now() - Duration::days(30) + Duration::minutes(id),
        updated_at: now() - Duration::days(30) + Duration::minutes(id),
        verified_at: None,
        archived_at: None,
        archived_by: None,
        created_by: "admin".to_string(),
    }
}

pub fn due_in(mut record: Opportunity, days: i64) -> Opportunity {
    record.deadline = Some(now() + Duration::days(days));
    record
}

pub fn placed(mut record: Opportunity, sort_order: i64) -> Opportunity {
    record.sort_order = Some(sort_order);
    record
}

pub fn with_status(mut record: Opportunity, status: OpportunityStatus) -> Opportunity {
    record.status = status;
    record
}

pub fn archived(mut record: Opportunity) -> Opportunity {
    record.status = OpportunityStatus::Archived;
    record.archived_at = Some(now() - Duration::days(1));
    record
}

pub fn ids(records: &[&Opportunity]) -> Vec<i64> {
    records.iter().map(|record| record.id.0).collect()
}
