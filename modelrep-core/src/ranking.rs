//! Ranking and merge reducer for the reputation view.
//!
//! The view is an immutable `RankedView` value. Every update (a finished
//! fetch batch, a single-model refresh, an optimistic local score, a loaded
//! comment) goes through a pure function that takes the current view and
//! returns the next one. Callers replace their snapshot wholesale.
//!
//! # Ordering
//!
//! 1. Rated models (`total_ratings > 0`) before unrated ones
//! 2. Rated: `average_score` descending, then `total_ratings` descending
//! 3. Remaining ties and unrated models: display name, case-insensitive
//!
//! Ranks `1..=n` are assigned over the rated subset only.
//!
//! # Example
//!
//! ```rust
//! use modelrep_core::{merge_batch, BatchResult, Model, ModelFetch, RankedView, ReputationSnapshot};
//!
//! let batch = BatchResult {
//!     fetches: vec![
//!         ModelFetch::loaded(Model::new(1, "a/one", "One"), ReputationSnapshot::new(1, 3.5, 2)),
//!         ModelFetch::loaded(Model::new(2, "a/two", "Two"), ReputationSnapshot::new(2, 4.5, 1)),
//!     ],
//!     total_ratings: Some(3),
//!     remaining: 0,
//! };
//!
//! let view = merge_batch(&RankedView::default(), batch);
//! assert_eq!(view.entries[0].model.id, 2);
//! assert_eq!(view.entries[0].rank, Some(1));
//! ```

use std::cmp::Ordering;

use serde::Serialize;

use crate::model::{Model, ModelWithReputation, ReputationSnapshot, Score, UserRating};

/// Immutable ranked list of models plus the ledger-wide rating count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedView {
    pub entries: Vec<ModelWithReputation>,
    /// Ledger-wide total; `None` until read successfully.
    pub total_ratings: Option<u64>,
    /// Models still waiting for their batch.
    pub pending: usize,
}

impl RankedView {
    /// Empty view expecting `pending` models.
    pub fn loading(pending: usize) -> Self {
        Self {
            entries: Vec::new(),
            total_ratings: None,
            pending,
        }
    }

    pub fn get(&self, model_id: u64) -> Option<&ModelWithReputation> {
        self.entries.iter().find(|e| e.model.id == model_id)
    }

    /// Rated entries, in rank order.
    pub fn rated(&self) -> impl Iterator<Item = &ModelWithReputation> {
        self.entries.iter().filter(|e| e.rank.is_some())
    }

    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }
}

/// Outcome of reading one model from the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFetch {
    pub model: Model,
    /// `None` when the reputation read failed.
    pub snapshot: Option<ReputationSnapshot>,
    pub user_rating: Option<Score>,
    /// False when no caller was given or the user-rating read failed.
    pub user_rating_known: bool,
}

impl ModelFetch {
    /// Reputation read succeeded; no caller rating requested.
    pub fn loaded(model: Model, snapshot: ReputationSnapshot) -> Self {
        Self {
            model,
            snapshot: Some(snapshot),
            user_rating: None,
            user_rating_known: false,
        }
    }

    /// Every read for this model failed.
    pub fn failed(model: Model) -> Self {
        Self {
            model,
            snapshot: None,
            user_rating: None,
            user_rating_known: false,
        }
    }

    pub fn with_user_rating(mut self, score: Option<Score>) -> Self {
        self.user_rating = score;
        self.user_rating_known = true;
        self
    }
}

/// Results of one concurrent fetch batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResult {
    pub fetches: Vec<ModelFetch>,
    pub total_ratings: Option<u64>,
    /// Models not yet fetched after this batch.
    pub remaining: usize,
}

/// Orders two entries for display.
pub fn compare_entries(a: &ModelWithReputation, b: &ModelWithReputation) -> Ordering {
    match (a.is_rated(), b.is_rated()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => b
            .average_score()
            .total_cmp(&a.average_score())
            .then_with(|| b.total_ratings().cmp(&a.total_ratings()))
            .then_with(|| by_name(a, b)),
        (false, false) => by_name(a, b),
    }
}

fn by_name(a: &ModelWithReputation, b: &ModelWithReputation) -> Ordering {
    a.model
        .display_name
        .to_lowercase()
        .cmp(&b.model.display_name.to_lowercase())
        .then_with(|| a.model.id.cmp(&b.model.id))
}

/// Sorts entries and assigns ranks over the rated subset.
pub fn rank(mut entries: Vec<ModelWithReputation>) -> Vec<ModelWithReputation> {
    entries.sort_by(compare_entries);

    let mut next = 1u32;
    for entry in entries.iter_mut() {
        if entry.is_rated() {
            entry.rank = Some(next);
            next += 1;
        } else {
            entry.rank = None;
        }
    }
    entries
}

/// Folds a finished batch into the view.
///
/// Fetched models replace their previous rows. A failed reputation read
/// leaves the row without a snapshot (counted as zero ratings). Comments
/// loaded earlier survive, as they are not part of the bulk pass.
pub fn merge_batch(view: &RankedView, batch: BatchResult) -> RankedView {
    let mut entries = view.entries.clone();

    for fetch in batch.fetches {
        let existing = entries.iter().position(|e| e.model.id == fetch.model.id);
        let previous = existing.map(|i| entries[i].clone());

        let user_rating = if fetch.user_rating_known {
            fetch.user_rating.map(UserRating::confirmed)
        } else {
            previous.as_ref().and_then(|p| p.user_rating)
        };

        let entry = ModelWithReputation {
            model: fetch.model,
            snapshot: fetch.snapshot,
            user_rating,
            user_comment: previous.and_then(|p| p.user_comment),
            rank: None,
        };

        match existing {
            Some(i) => entries[i] = entry,
            None => entries.push(entry),
        }
    }

    RankedView {
        entries: rank(entries),
        total_ratings: batch.total_ratings.or(view.total_ratings),
        pending: batch.remaining,
    }
}

/// Applies an authoritative single-model re-read.
///
/// Ledger values replace whatever was shown, including an optimistic local
/// score. Reads that failed keep the previous values.
pub fn apply_refresh(view: &RankedView, fetch: ModelFetch) -> RankedView {
    let mut entries = view.entries.clone();

    match entries.iter_mut().find(|e| e.model.id == fetch.model.id) {
        Some(entry) => {
            if fetch.snapshot.is_some() {
                entry.snapshot = fetch.snapshot;
            }
            if fetch.user_rating_known {
                entry.user_rating = fetch.user_rating.map(UserRating::confirmed);
            }
        }
        None => {
            let mut entry = ModelWithReputation::new(fetch.model);
            entry.snapshot = fetch.snapshot;
            if fetch.user_rating_known {
                entry.user_rating = fetch.user_rating.map(UserRating::confirmed);
            }
            entries.push(entry);
        }
    }

    RankedView {
        entries: rank(entries),
        total_ratings: view.total_ratings,
        pending: view.pending,
    }
}

/// Shows a just-confirmed score for the caller ahead of the ledger re-read.
///
/// Aggregates are left alone: they only ever come from the ledger.
pub fn apply_optimistic(view: &RankedView, model_id: u64, score: Score) -> RankedView {
    let mut next = view.clone();
    if let Some(entry) = next.entries.iter_mut().find(|e| e.model.id == model_id) {
        entry.user_rating = Some(UserRating::optimistic(score));
    }
    next
}

/// Sets the caller's comment for one model.
pub fn attach_comment(view: &RankedView, model_id: u64, comment: Option<String>) -> RankedView {
    let mut next = view.clone();
    if let Some(entry) = next.entries.iter_mut().find(|e| e.model.id == model_id) {
        entry.user_comment = comment;
    }
    next
}

/// Replaces the ledger-wide rating count.
pub fn set_total(view: &RankedView, total_ratings: u64) -> RankedView {
    RankedView {
        total_ratings: Some(total_ratings),
        ..view.clone()
    }
}
