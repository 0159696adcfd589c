use chrono::{DateTime, Utc};
use shared::{
    domain::{SortMode, StatusFilter},
    protocol::{ListQuery, Opportunity},
};

use crate::{
    filter::{matches_categories, matches_search, search_needle, StatusSelection},
    sort::sort_records,
};

/// Everything the engine needs besides the snapshot itself. Callers build a
/// new value whenever a selection changes instead of mutating shared state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    pub statuses: StatusSelection,
    pub search: String,
    pub sort: SortMode,
    /// Empty means every category.
    pub categories: Vec<String>,
    /// Only consulted when the status selection is `all`.
    pub include_archived: bool,
    pub now: DateTime<Utc>,
}

impl ViewConfig {
    /// What visitors see: active records in manual order.
    pub fn public(now: DateTime<Utc>) -> Self {
        Self {
            statuses: StatusSelection::only(StatusFilter::Active),
            search: String::new(),
            sort: SortMode::Default,
            categories: Vec::new(),
            include_archived: false,
            now,
        }
    }

    /// The admin table: everything, archived included, in manual order.
    pub fn admin(now: DateTime<Utc>) -> Self {
        Self {
            statuses: StatusSelection::all(),
            search: String::new(),
            sort: SortMode::Default,
            categories: Vec::new(),
            include_archived: true,
            now,
        }
    }

    pub fn with_statuses(mut self, statuses: StatusSelection) -> Self {
        self.statuses = statuses;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    /// Requested categories are kept as given, so a tag outside the catalog
    /// narrows the view to nothing instead of widening it.
    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        let mut wanted: Vec<String> = Vec::with_capacity(categories.len());
        for category in categories {
            if !wanted.contains(&category) {
                wanted.push(category);
            }
        }
        self.categories = wanted;
        self
    }

    pub fn with_include_archived(mut self, include_archived: bool) -> Self {
        self.include_archived = include_archived;
        self
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn is_manual_order(&self) -> bool {
        self.sort == SortMode::Default
    }

    /// The coarse store query that fetches a superset of this view.
    pub fn list_query(&self) -> ListQuery {
        ListQuery {
            status: self.statuses.query_status(),
            search: search_needle(&self.search),
            include_archived: self.statuses.contains(StatusFilter::Archived)
                || (self.statuses.is_all() && self.include_archived),
        }
    }
}

/// Produces the display sequence for `records` under `view`.
///
/// Filtering runs first (status, then search, then category), then a stable
/// sort by the selected mode.
pub fn filter_sort<'a>(records: &'a [Opportunity], view: &ViewConfig) -> Vec<&'a Opportunity> {
    let needle = search_needle(&view.search);
    let mut visible: Vec<&Opportunity> = records
        .iter()
        .filter(|record| view.statuses.matches(record, view.include_archived))
        .filter(|record| matches_search(record, needle.as_deref()))
        .filter(|record| matches_categories(record, &view.categories))
        .collect();
    sort_records(&mut visible, view.sort, view.now);
    visible
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
