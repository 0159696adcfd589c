//! Each sort mode is expressed as an `Ord` key so comparisons are a strict
//! weak ordering. `slice::sort_by_key` is stable, which makes input order the
//! tie breaker everywhere.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use shared::{
    domain::{OpportunityStatus, SortMode},
    protocol::Opportunity,
};

/// Deadline with rolling (absent) deadlines ordered after every dated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DeadlineKey {
    Dated(DateTime<Utc>),
    Rolling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum OngoingKey {
    Ongoing(DeadlineKey),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ManualKey {
    Placed(i64),
    Unplaced(DeadlineKey),
}

/// A non-positive timestamp is treated the same as no deadline.
pub fn effective_deadline(record: &Opportunity) -> Option<DateTime<Utc>> {
    record
        .deadline
        .filter(|deadline| deadline.timestamp_millis() > 0)
}

pub fn deadline_key(record: &Opportunity) -> DeadlineKey {
    match effective_deadline(record) {
        Some(deadline) => DeadlineKey::Dated(deadline),
        None => DeadlineKey::Rolling,
    }
}

pub fn is_ongoing(record: &Opportunity, now: DateTime<Utc>) -> bool {
    record.status == OpportunityStatus::Active
        && effective_deadline(record).map_or(true, |deadline| deadline > now)
}

fn ongoing_key(record: &Opportunity, now: DateTime<Utc>) -> OngoingKey {
    if is_ongoing(record, now) {
        OngoingKey::Ongoing(deadline_key(record))
    } else {
        OngoingKey::Other
    }
}

fn manual_key(record: &Opportunity) -> ManualKey {
    match record.sort_order {
        Some(position) => ManualKey::Placed(position),
        None => ManualKey::Unplaced(deadline_key(record)),
    }
}

pub fn sort_records(records: &mut [&Opportunity], mode: SortMode, now: DateTime<Utc>) {
    match mode {
        SortMode::Recent => records.sort_by_key(|record| Reverse(record.created_at)),
        SortMode::Updated => records.sort_by_key(|record| Reverse(record.updated_at)),
        // Records outside the ongoing group share one key and keep input order.
        SortMode::Ongoing => records.sort_by_key(|record| ongoing_key(record, now)),
        SortMode::Deadline => records.sort_by_key(|record| deadline_key(record)),
        SortMode::Default => records.sort_by_key(|record| manual_key(record)),
    }
}

#[cfg(test)]
#[path = "tests/sort_tests.rs"]
mod tests;
