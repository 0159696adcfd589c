use std::collections::BTreeSet;

use shared::{
    domain::{OpportunityStatus, StatusFilter, UnknownVariant},
    protocol::Opportunity,
};

use crate::tags::normalize_tags;

/// A normalized multi-select of status filters.
///
/// `All` never coexists with another value, and the selection is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSelection {
    selected: BTreeSet<StatusFilter>,
}

impl Default for StatusSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl StatusSelection {
    pub fn all() -> Self {
        Self {
            selected: BTreeSet::from([StatusFilter::All]),
        }
    }

    pub fn only(filter: StatusFilter) -> Self {
        Self::normalize([filter])
    }

    pub fn normalize(filters: impl IntoIterator<Item = StatusFilter>) -> Self {
        let mut selected: BTreeSet<StatusFilter> = filters.into_iter().collect();
        if selected.len() > 1 {
            selected.remove(&StatusFilter::All);
        }
        if selected.is_empty() {
            selected.insert(StatusFilter::All);
        }
        Self { selected }
    }

    /// Parses a comma separated list such as `active,archived`. Blank input
    /// selects everything.
    pub fn parse_list(raw: &str) -> Result<Self, UnknownVariant> {
        let filters = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<StatusFilter>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::normalize(filters))
    }

    pub fn is_all(&self) -> bool {
        self.selected.contains(&StatusFilter::All)
    }

    pub fn contains(&self, filter: StatusFilter) -> bool {
        self.selected.contains(&filter)
    }

    pub fn iter(&self) -> impl Iterator<Item = StatusFilter> + '_ {
        self.selected.iter().copied()
    }

    /// The single status the store can pre-filter on. Multi-selects fall back
    /// to `All` and are narrowed client-side.
    pub fn query_status(&self) -> StatusFilter {
        if self.is_all() || self.selected.len() > 1 {
            return StatusFilter::All;
        }
        self.selected
            .iter()
            .next()
            .copied()
            .unwrap_or(StatusFilter::All)
    }

    pub fn matches(&self, record: &Opportunity, include_archived: bool) -> bool {
        let archived = record.is_archived();
        if self.is_all() {
            return include_archived || !archived;
        }

        (self.contains(StatusFilter::Archived) && archived)
            || (self.contains(StatusFilter::Active)
                && record.status == OpportunityStatus::Active
                && !archived)
            || (self.contains(StatusFilter::Inactive)
                && record.status == OpportunityStatus::Inactive
                && !archived)
    }
}

/// Lower-cased search needle, matched as typed. `None` means "match
/// everything", which is also what a whitespace-only query gets.
pub fn search_needle(query: &str) -> Option<String> {
    if query.trim().is_empty() {
        None
    } else {
        Some(query.to_lowercase())
    }
}

pub fn matches_search(record: &Opportunity, needle: Option<&str>) -> bool {
    let Some(needle) = needle else {
        return true;
    };
    [&record.title, &record.provider, &record.description]
        .into_iter()
        .any(|field| field.to_lowercase().contains(needle))
}

pub fn matches_categories(record: &Opportunity, categories: &[String]) -> bool {
    if categories.is_empty() {
        return true;
    }
    normalize_tags(&record.category_tags)
        .iter()
        .any(|tag| categories.contains(tag))
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;
