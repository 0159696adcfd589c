use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(OpportunityId);
id_newtype!(SubmissionId);
id_newtype!(AuditEntryId);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Generates `as_str`, `Display` and `FromStr` for a fieldless enum whose wire
/// names are snake_case.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

string_enum!(OpportunityStatus, "opportunity status", {
    Active => "active",
    Inactive => "inactive",
    Archived => "archived",
});

/// Status a record may be restored to when it leaves the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoredStatus {
    Active,
    #[default]
    Inactive,
}

impl From<RestoredStatus> for OpportunityStatus {
    fn from(value: RestoredStatus) -> Self {
        match value {
            RestoredStatus::Active => OpportunityStatus::Active,
            RestoredStatus::Inactive => OpportunityStatus::Inactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Inactive,
    Archived,
}

string_enum!(StatusFilter, "status filter", {
    All => "all",
    Active => "active",
    Inactive => "inactive",
    Archived => "archived",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    Recent,
    Updated,
    Ongoing,
    Deadline,
    #[default]
    Default,
}

string_enum!(SortMode, "sort mode", {
    Recent => "recent",
    Updated => "updated",
    Ongoing => "ongoing",
    Deadline => "deadline",
    Default => "default",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

string_enum!(SubmissionStatus, "submission status", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Archived,
    Unarchived,
    Duplicated,
    Deleted,
    Reordered,
}

string_enum!(AuditAction, "audit action", {
    Archived => "archived",
    Unarchived => "unarchived",
    Duplicated => "duplicated",
    Deleted => "deleted",
    Reordered => "reordered",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    Replace,
    #[default]
    Merge,
    Append,
}

string_enum!(ImportMode, "import mode", {
    Replace => "replace",
    Merge => "merge",
    Append => "append",
});
