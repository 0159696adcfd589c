use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
pub const ENDING_SOON_DAYS: i64 = 7;

/// Badge shown next to a deadline in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeadlineBadge {
    /// No deadline: applications are rolling.
    Ongoing,
    Closed,
    EndingSoon { days_remaining: i64 },
    Open { days_remaining: i64 },
}

impl DeadlineBadge {
    pub fn classify(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(deadline) = deadline.filter(|deadline| deadline.timestamp_millis() > 0) else {
            return Self::Ongoing;
        };

        let days_remaining = ceil_days(deadline.timestamp_millis() - now.timestamp_millis());
        if days_remaining < 0 {
            Self::Closed
        } else if days_remaining <= ENDING_SOON_DAYS {
            Self::EndingSoon { days_remaining }
        } else {
            Self::Open { days_remaining }
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Ongoing => "Ongoing",
            Self::Closed => "Closed",
            Self::EndingSoon { .. } => "Ending Soon",
            Self::Open { .. } => "Active",
        }
    }

    pub fn is_rolling(self) -> bool {
        matches!(self, Self::Ongoing)
    }
}

fn ceil_days(millis: i64) -> i64 {
    millis.div_euclid(MILLIS_PER_DAY) + i64::from(millis.rem_euclid(MILLIS_PER_DAY) != 0)
}
