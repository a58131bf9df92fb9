use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use tracing::info;

use crate::constants::columns;
use crate::cursor::StreamCursor;
use crate::errors::JoinError;
use crate::types::{IdentifierSet, JoinKey, UserId};

/// One sampled metadata row: the grouping user and the event timestamp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleEntry {
    /// User that issued the search.
    pub user_id: UserId,
    /// When the search happened.
    pub searched_at: NaiveDateTime,
}

/// Sampled mapping from join key to its user/timestamp tuple.
///
/// Insertion-ordered so a pass over the sample is deterministic.
pub type UserSample = IndexMap<JoinKey, SampleEntry>;

/// Derives a validation identifier set: one search per user, the most
/// recent qualifying one wins.
///
/// Both policies are single forward passes with O(distinct users)
/// auxiliary memory — the full row stream is never buffered. A candidate
/// replaces a user's current winner only when strictly newer, so ties on
/// equal timestamps keep the first-seen entry.
#[derive(Clone, Debug, Default)]
pub struct ValidationSetBuilder {
    exclude: IdentifierSet,
    cutoff: Option<NaiveDateTime>,
}

impl ValidationSetBuilder {
    /// Builder with no exclusions and no recency cutoff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys that may never enter the validation set (typically the
    /// unlabeled test stream's keys).
    pub fn exclude_ids(mut self, exclude: IdentifierSet) -> Self {
        self.exclude = exclude;
        self
    }

    /// Reject candidates strictly older than `cutoff`.
    pub fn with_cutoff(mut self, cutoff: NaiveDateTime) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    /// Recency-among-sample policy: select each user's most recent
    /// qualifying search from a pre-sampled mapping.
    pub fn from_sample(&self, sample: &UserSample) -> IdentifierSet {
        let mut best = UserBest::new();
        for (&key, entry) in sample {
            if self.exclude.contains(&key) || self.below_cutoff(entry.searched_at) {
                continue;
            }
            update_best(&mut best, key, entry.user_id, entry.searched_at);
        }
        project(best)
    }

    /// Recency-over-full-stream policy: one linear scan of the metadata
    /// stream, with the cutoff as an early reject before the per-user
    /// bookkeeping.
    pub fn scan_stream<R: io::Read>(
        &self,
        cursor: &mut StreamCursor<R>,
    ) -> Result<IdentifierSet, JoinError> {
        let mut best = UserBest::new();
        let mut scanned = 0u64;
        while let Some(keyed) = cursor.current() {
            scanned += 1;
            let key = keyed.key;
            if self.exclude.contains(&key) {
                cursor.advance()?;
                continue;
            }
            let searched_at = keyed.record.require_date(columns::SEARCH_DATE)?;
            if self.below_cutoff(searched_at) {
                cursor.advance()?;
                continue;
            }
            let user_id = keyed.record.require_int(columns::USER_ID)?;
            update_best(&mut best, key, user_id, searched_at);
            cursor.advance()?;
        }
        info!(scanned, users = best.len(), "validation scan complete");
        Ok(project(best))
    }

    fn below_cutoff(&self, searched_at: NaiveDateTime) -> bool {
        matches!(self.cutoff, Some(cutoff) if searched_at < cutoff)
    }
}

/// Collect every join key appearing in a stream.
///
/// Used to gather the unlabeled test stream's keys, which are excluded
/// from validation selection.
pub fn collect_stream_keys<R: io::Read>(
    cursor: &mut StreamCursor<R>,
) -> Result<IdentifierSet, JoinError> {
    let mut keys = IdentifierSet::new();
    while let Some(keyed) = cursor.current() {
        keys.insert(keyed.key);
        cursor.advance()?;
    }
    Ok(keys)
}

/// Per-user best-so-far state, alive only for the duration of one pass.
type UserBest = HashMap<UserId, (JoinKey, NaiveDateTime)>;

fn update_best(best: &mut UserBest, key: JoinKey, user_id: UserId, searched_at: NaiveDateTime) {
    match best.entry(user_id) {
        Entry::Occupied(mut entry) => {
            if searched_at > entry.get().1 {
                entry.insert((key, searched_at));
            }
        }
        Entry::Vacant(entry) => {
            entry.insert((key, searched_at));
        }
    }
}

fn project(best: UserBest) -> IdentifierSet {
    best.into_values().map(|(key, _)| key).collect()
}
