//! Ratable models and their ledger-derived reputation.
//!
//! `Model` comes from the catalog and never changes during a session.
//! Everything else here is derived from ledger reads: `ReputationSnapshot`
//! is the per-model aggregate, `OnChainRating` a single rater's slot, and
//! `ModelWithReputation` the composite row shown in rankings.

use std::fmt;

use ethers_core::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A ratable AI model as listed by the catalog.
///
/// Wire form is the catalog's `{id, openrouterId, name, iconUrl?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Numeric id used as the contract's `modelId`.
    pub id: u64,

    /// Catalog identifier (e.g. `anthropic/claude-3-haiku`).
    #[serde(rename = "openrouterId")]
    pub external_id: String,

    /// Human readable name.
    #[serde(rename = "name")]
    pub display_name: String,

    /// Optional icon URL or asset reference.
    #[serde(rename = "iconUrl", default, skip_serializing_if = "Option::is_none")]
    pub icon_ref: Option<String>,
}

impl Model {
    pub fn new(id: u64, external_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            external_id: external_id.into(),
            display_name: display_name.into(),
            icon_ref: None,
        }
    }
}

/// A star rating between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Creates a score, rejecting anything outside `1..=5`.
    pub fn new(value: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidScore(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One rater's rating of one model, as held by the ledger.
///
/// The contract keeps a single slot per `(model_id, rater)`; rating again
/// overwrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChainRating {
    pub model_id: u64,
    pub rater: Address,
    pub score: Score,
}

/// Per-model aggregate read from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationSnapshot {
    pub model_id: u64,
    /// Mean score in `[1, 5]`, or `0.0` when unrated.
    pub average_score: f64,
    pub total_ratings: u64,
}

impl ReputationSnapshot {
    pub fn new(model_id: u64, average_score: f64, total_ratings: u64) -> Self {
        let average_score = if total_ratings == 0 { 0.0 } else { average_score };
        Self {
            model_id,
            average_score,
            total_ratings,
        }
    }

    /// Snapshot of a model nobody has rated yet.
    pub fn unrated(model_id: u64) -> Self {
        Self::new(model_id, 0.0, 0)
    }

    /// Decodes the contract's fixed-point average (`raw / 10^decimals`).
    pub fn from_fixed_point(model_id: u64, raw_average: u128, decimals: u32, total_ratings: u64) -> Self {
        let scale = 10f64.powi(decimals as i32);
        Self::new(model_id, raw_average as f64 / scale, total_ratings)
    }

    pub fn is_rated(&self) -> bool {
        self.total_ratings > 0
    }
}

/// The caller's own rating as shown next to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRating {
    pub score: Score,
    /// Set while the value is known locally but not yet re-read from the ledger.
    pub optimistic: bool,
}

impl UserRating {
    pub fn confirmed(score: Score) -> Self {
        Self {
            score,
            optimistic: false,
        }
    }

    pub fn optimistic(score: Score) -> Self {
        Self {
            score,
            optimistic: true,
        }
    }
}

/// Composite row: catalog model, ledger snapshot, and the caller's own
/// rating and comment. Rebuilt by merge, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelWithReputation {
    pub model: Model,
    /// `None` when the ledger read failed or has not happened yet.
    pub snapshot: Option<ReputationSnapshot>,
    pub user_rating: Option<UserRating>,
    pub user_comment: Option<String>,
    /// 1-based position among rated models; unrated models carry no rank.
    pub rank: Option<u32>,
}

impl ModelWithReputation {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            snapshot: None,
            user_rating: None,
            user_comment: None,
            rank: None,
        }
    }

    pub fn model_id(&self) -> u64 {
        self.model.id
    }

    /// Total ratings, treating an absent snapshot as zero.
    pub fn total_ratings(&self) -> u64 {
        self.snapshot.map_or(0, |s| s.total_ratings)
    }

    /// Average score, treating an absent snapshot as unrated.
    pub fn average_score(&self) -> f64 {
        self.snapshot.map_or(0.0, |s| s.average_score)
    }

    pub fn is_rated(&self) -> bool {
        self.total_ratings() > 0
    }
}
