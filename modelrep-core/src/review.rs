//! Off-chain review records and the rating request that produces them.
//!
//! A `Review` carries the optional comment and tag that accompany an
//! on-chain rating. Its `tx_hash` is the only link to the ledger; a review
//! whose transaction is not confirmed is commentary, never rating data.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ethers_core::types::{Address, H256};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoreError, Result};
use crate::model::Score;

/// Maximum review comment length, in characters.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Review tag vocabulary. A review carries at most one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewTag {
    Accurate,
    Fast,
    Creative,
    Helpful,
    Reliable,
    Concise,
    Coding,
    Reasoning,
}

impl ReviewTag {
    pub const ALL: [ReviewTag; 8] = [
        ReviewTag::Accurate,
        ReviewTag::Fast,
        ReviewTag::Creative,
        ReviewTag::Helpful,
        ReviewTag::Reliable,
        ReviewTag::Concise,
        ReviewTag::Coding,
        ReviewTag::Reasoning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewTag::Accurate => "accurate",
            ReviewTag::Fast => "fast",
            ReviewTag::Creative => "creative",
            ReviewTag::Helpful => "helpful",
            ReviewTag::Reliable => "reliable",
            ReviewTag::Concise => "concise",
            ReviewTag::Coding => "coding",
            ReviewTag::Reasoning => "reasoning",
        }
    }
}

impl fmt::Display for ReviewTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewTag {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        ReviewTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == needle)
            .ok_or_else(|| CoreError::UnknownTag(s.to_string()))
    }
}

/// Off-chain commentary accompanying an on-chain rating.
///
/// Wire form: `{modelId, address, score, comment, tag1, txHash, createdAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub model_id: u64,
    #[serde(rename = "address")]
    pub reviewer: Address,
    pub score: Score,
    #[serde(default)]
    pub comment: Option<String>,
    /// Tags outside the vocabulary are dropped rather than failing the record.
    #[serde(rename = "tag1", default, deserialize_with = "lenient_tag")]
    pub tag: Option<ReviewTag>,
    pub tx_hash: H256,
    pub created_at: DateTime<Utc>,
}

fn lenient_tag<'de, D>(deserializer: D) -> std::result::Result<Option<ReviewTag>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// A caller's request to rate a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingRequest {
    pub model_id: u64,
    pub score: Score,
    pub comment: Option<String>,
    pub tag: Option<ReviewTag>,
}

impl RatingRequest {
    /// Builds a validated request. Blank comments are treated as absent.
    pub fn new(model_id: u64, score: u8, comment: Option<String>, tag: Option<ReviewTag>) -> Result<Self> {
        let request = Self {
            model_id,
            score: Score::new(score)?,
            comment: comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            tag,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(comment) = &self.comment {
            let len = comment.chars().count();
            if len > MAX_COMMENT_CHARS {
                return Err(CoreError::CommentTooLong {
                    len,
                    max: MAX_COMMENT_CHARS,
                });
            }
        }
        Ok(())
    }
}
