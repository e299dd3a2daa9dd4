//! Small enums shared by every stage of the validation cycle.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How urgently a field is validated and how loudly its errors are shown.
///
/// Ordered `Optional < Important < Critical`; upgrades use [`Ord::max`] so a
/// field can only move up a tier, never down.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldPriority {
    #[default]
    Optional,
    Important,
    Critical,
}

impl FieldPriority {
    /// All tiers, most urgent first.
    pub const TIERS: [FieldPriority; 3] = [Self::Critical, Self::Important, Self::Optional];

    /// Weight used for the aggregate progress percentage.
    pub fn weight(self) -> u32 {
        match self {
            Self::Critical => 3,
            Self::Important => 2,
            Self::Optional => 1,
        }
    }

    /// Raise to at least `floor`.
    pub fn at_least(self, floor: FieldPriority) -> FieldPriority {
        self.max(floor)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Important => "important",
            Self::Optional => "optional",
        }
    }
}

impl fmt::Display for FieldPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual weight of a displayed error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Error,
    Warning,
    Info,
    #[default]
    None,
}

/// When the host form re-validates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    OnBlur,
    #[default]
    OnChange,
    OnSubmit,
    OnTouched,
    All,
}

/// Lifecycle phase of a single field in the current cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPhase {
    #[default]
    Pending,
    Validating,
    Valid,
    Invalid,
}
