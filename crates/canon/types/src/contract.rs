//! Typed data contracts.
//!
//! A domain's contract is a validated, enumerated option set rather than a
//! free-form configuration blob. Options that a category does not recognize
//! are rejected at registration time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::DomainCategory;

/// How revisions to already-published rows are handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionPolicy {
    /// Rows are never restated; corrections append new rows.
    AppendOnly,
    /// Restatement of prior rows is allowed and versioned.
    RestateAllowed,
}

/// One enumerated contract option.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractOption {
    /// Rows are retained for this many days.
    RetentionDays(u32),
    /// Reads must be reproducible as-of any past timestamp.
    PointInTime,
    /// Late rows accepted up to this many seconds after their event time.
    LateArrivalWindowSecs(u64),
    /// All monetary fields normalized to one currency.
    CurrencyNormalized { currency: String },
    /// Series includes delisted assets.
    SurvivorshipBiasFree,
    /// Revision handling for published rows.
    Revisions(RevisionPolicy),
}

impl ContractOption {
    /// Stable option name used in validation errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RetentionDays(_) => "retention_days",
            Self::PointInTime => "point_in_time",
            Self::LateArrivalWindowSecs(_) => "late_arrival_window_secs",
            Self::CurrencyNormalized { .. } => "currency_normalized",
            Self::SurvivorshipBiasFree => "survivorship_bias_free",
            Self::Revisions(_) => "revisions",
        }
    }

    /// Whether the given category recognizes this option.
    pub fn allowed_for(&self, category: DomainCategory) -> bool {
        match category {
            DomainCategory::MarketData => true,
            DomainCategory::Indicators => !matches!(self, Self::SurvivorshipBiasFree),
            DomainCategory::Decisions | DomainCategory::Operations => matches!(
                self,
                Self::RetentionDays(_) | Self::PointInTime | Self::Revisions(_)
            ),
            DomainCategory::Research => matches!(
                self,
                Self::RetentionDays(_) | Self::Revisions(_) | Self::PointInTime
            ),
        }
    }
}

/// The validated contract attached to a registry entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataContract {
    pub schema_version: u32,
    pub options: Vec<ContractOption>,
}

impl DataContract {
    pub fn new(schema_version: u32, options: Vec<ContractOption>) -> Self {
        Self {
            schema_version,
            options,
        }
    }

    /// Empty contract, valid for every category.
    pub fn minimal() -> Self {
        Self {
            schema_version: 1,
            options: vec![],
        }
    }

    /// Validate every option against the category's enumerated set.
    pub fn validate_for(&self, category: DomainCategory) -> Result<(), ContractError> {
        if self.schema_version == 0 {
            return Err(ContractError::InvalidSchemaVersion);
        }
        for option in &self.options {
            if !option.allowed_for(category) {
                return Err(ContractError::UnrecognizedOption {
                    option: option.name(),
                    category,
                });
            }
        }
        let mut names: Vec<&'static str> = self.options.iter().map(ContractOption::name).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.options.len() {
            return Err(ContractError::DuplicateOption);
        }
        Ok(())
    }
}

/// Contract validation failures, surfaced at registration time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("contract schema_version must be >= 1")]
    InvalidSchemaVersion,

    #[error("option '{option}' is not recognized for category {category}")]
    UnrecognizedOption {
        option: &'static str,
        category: DomainCategory,
    },

    #[error("contract lists the same option more than once")]
    DuplicateOption,
}
