use std::io;

use tracing::debug;

use crate::constants::{columns, progress};
use crate::cursor::StreamCursor;
use crate::errors::JoinError;
use crate::extract::ExtractorSet;
use crate::hash::stable_hash_id;
use crate::record::{JoinedRow, Record};
use crate::router::{Route, RowRouter};
use crate::types::JoinKey;
use crate::validation::{SampleEntry, UserSample};

/// Sample roughly 1/`fraction` of users from the metadata stream.
///
/// Selection hashes the user id, not the row, so every search by a sampled
/// user is captured together. `seed` varies which users are picked while
/// keeping the pass deterministic; `max_rows` bounds the scan for quick
/// experiments.
pub fn sample_users<R: io::Read>(
    cursor: &mut StreamCursor<R>,
    fraction: u64,
    seed: u64,
    max_rows: Option<u64>,
) -> Result<UserSample, JoinError> {
    if fraction == 0 {
        return Err(JoinError::Configuration(
            "sample fraction must be at least 1".into(),
        ));
    }
    let mut sample = UserSample::new();
    let mut scanned = 0u64;
    while let Some(keyed) = cursor.current() {
        if let Some(max) = max_rows
            && scanned >= max
        {
            break;
        }
        scanned += 1;
        if scanned % progress::ROWS_PER_LOG == 0 {
            debug!(scanned, sampled = sample.len(), "user sampling progress");
        }
        let user_id = keyed.record.require_int(columns::USER_ID)?;
        if stable_hash_id(seed, user_id) % fraction == 0 {
            let searched_at = keyed.record.require_date(columns::SEARCH_DATE)?;
            sample.insert(keyed.key, SampleEntry {
                user_id,
                searched_at,
            });
        }
        cursor.advance()?;
    }
    Ok(sample)
}

/// Lookup-style join of the primary click stream against a sampled user
/// mapping.
///
/// Primary rows whose key is absent from the sample are skipped — that is
/// the sampling at work, not a desync. Matching rows get the primary and
/// sample-tuple extractors applied. Rows carry no label: this shape feeds
/// exploration over a manageable slice of the logs, not training.
pub struct SampleJoin<P: io::Read> {
    primary: StreamCursor<P>,
    sample: UserSample,
    primary_extractors: ExtractorSet<Record>,
    sample_extractors: ExtractorSet<SampleEntry>,
    router: RowRouter,
    max_rows: Option<u64>,
    scanned: u64,
    pending: Option<JoinError>,
    done: bool,
}

impl<P: io::Read> SampleJoin<P> {
    /// Pair a primary cursor with a sampled user mapping.
    pub fn new(primary: StreamCursor<P>, sample: UserSample) -> Self {
        Self {
            primary: primary.require_sorted(true),
            sample,
            primary_extractors: ExtractorSet::new(),
            sample_extractors: ExtractorSet::new(),
            router: RowRouter::new(),
            max_rows: None,
            scanned: 0,
            pending: None,
            done: false,
        }
    }

    /// Extractors applied to each matching primary record.
    pub fn with_primary_extractors(mut self, extractors: ExtractorSet<Record>) -> Self {
        self.primary_extractors = extractors;
        self
    }

    /// Extractors applied to the matching sample tuple.
    pub fn with_sample_extractors(mut self, extractors: ExtractorSet<SampleEntry>) -> Self {
        self.sample_extractors = extractors;
        self
    }

    /// Row routing policy (discriminator and membership filters).
    pub fn with_router(mut self, router: RowRouter) -> Self {
        self.router = router;
        self
    }

    /// Stop after scanning `max_rows` primary records.
    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    fn fail(&mut self, error: JoinError) -> Option<Result<JoinedRow, JoinError>> {
        self.done = true;
        Some(Err(error))
    }

    fn build_row(&self, entry: SampleEntry) -> Result<JoinedRow, JoinError> {
        let Some(primary) = self.primary.current() else {
            return Err(JoinError::Exhausted {
                stream: self.primary.stream().to_string(),
            });
        };
        let mut row = JoinedRow::new();
        self.primary_extractors
            .apply_into(&primary.record, &mut row)?;
        self.sample_extractors.apply_into(&entry, &mut row)?;
        Ok(row)
    }

    fn route_current(&self, key: JoinKey) -> Result<Route, JoinError> {
        let Some(positioned) = self.primary.current() else {
            return Err(JoinError::Exhausted {
                stream: self.primary.stream().to_string(),
            });
        };
        let discriminator = if self.router.wants_discriminator() {
            Some(positioned.record.require(columns::OBJECT_TYPE)?)
        } else {
            None
        };
        Ok(self.router.decide(discriminator, key))
    }
}

impl<P: io::Read> Iterator for SampleJoin<P> {
    type Item = Result<JoinedRow, JoinError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(error) = self.pending.take() {
            return self.fail(error);
        }
        loop {
            let Some(key) = self.primary.current().map(|keyed| keyed.key) else {
                self.done = true;
                return None;
            };
            if let Some(max) = self.max_rows
                && self.scanned >= max
            {
                self.done = true;
                return None;
            }
            self.scanned += 1;
            let Some(entry) = self.sample.get(&key).copied() else {
                if let Err(error) = self.primary.advance() {
                    return self.fail(error);
                }
                continue;
            };
            let route = match self.route_current(key) {
                Ok(route) => route,
                Err(error) => return self.fail(error),
            };
            if route != Route::Emit {
                if let Err(error) = self.primary.advance() {
                    return self.fail(error);
                }
                continue;
            }
            let row = match self.build_row(entry) {
                Ok(row) => row,
                Err(error) => return self.fail(error),
            };
            if let Err(error) = self.primary.advance() {
                self.pending = Some(error);
            }
            return Some(Ok(row));
        }
    }
}
