use std::collections::HashMap;
use std::io;

use tracing::debug;

use crate::constants::{columns, progress};
use crate::cursor::StreamCursor;
use crate::errors::JoinError;
use crate::extract::ExtractorSet;
use crate::record::{JoinedRow, Record};
use crate::router::{Route, RowRouter};
use crate::types::{AdId, JoinKey, Label};

/// Materialized auxiliary source: ad key to record, plus its extractors.
///
/// Differs from a streamed secondary only in access pattern: direct map
/// access instead of sequential catch-up, bounded by the number of distinct
/// ads rather than log length. A primary row referencing a key absent from
/// the map fails the pass with [`JoinError::LookupMiss`].
pub struct AdsLookup {
    table: HashMap<AdId, Record>,
    extractors: ExtractorSet<Record>,
}

impl AdsLookup {
    /// Build a lookup from a materialized ad table and its extractor set.
    pub fn new(table: HashMap<AdId, Record>, extractors: ExtractorSet<Record>) -> Self {
        Self { table, extractors }
    }

    /// Number of distinct ads held in the table.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True when the table holds no ads.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn apply(&self, ad_id: AdId, row: &mut JoinedRow) -> Result<(), JoinError> {
        let record = self
            .table
            .get(&ad_id)
            .ok_or(JoinError::LookupMiss { key: ad_id })?;
        self.extractors.apply_into(record, row)
    }
}

/// Counters accumulated over one join pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Primary records scanned, including skipped rows.
    pub primary_rows: u64,
    /// Rows extracted and emitted.
    pub emitted: u64,
    /// Rows skipped by the discriminator filter.
    pub skipped_non_contextual: u64,
    /// Rows skipped by the membership filter.
    pub skipped_membership: u64,
}

/// Streaming merge-join over a primary click stream and a secondary
/// metadata stream, synchronized on the shared join key.
///
/// The engine is a pull-based iterator: consumers draw one
/// `(JoinedRow, Label)` pair at a time, so arbitrarily large inputs are
/// processed in a single forward pass with bounded memory. Output order is
/// exactly primary-stream order, and identical inputs with identical
/// configuration yield identical output sequences. The first error fuses
/// the iterator; nothing is emitted after a failure.
pub struct RollingJoin<P: io::Read, S: io::Read> {
    primary: StreamCursor<P>,
    secondary: StreamCursor<S>,
    primary_extractors: ExtractorSet<Record>,
    secondary_extractors: ExtractorSet<Record>,
    ads: Option<AdsLookup>,
    router: RowRouter,
    labeled: bool,
    stats: JoinStats,
    pending: Option<JoinError>,
    done: bool,
}

impl<P: io::Read, S: io::Read> RollingJoin<P, S> {
    /// Pair a primary cursor with its covering secondary cursor.
    ///
    /// Both streams must be sorted ascending by the join key, and the
    /// secondary must cover every key the primary reaches. The engine
    /// enables the in-stream sortedness assertion on both cursors; a
    /// violation of either precondition fails the pass with
    /// [`JoinError::Desync`].
    pub fn new(primary: StreamCursor<P>, secondary: StreamCursor<S>) -> Self {
        Self {
            primary: primary.require_sorted(true),
            secondary: secondary.require_sorted(true),
            primary_extractors: ExtractorSet::new(),
            secondary_extractors: ExtractorSet::new(),
            ads: None,
            router: RowRouter::new(),
            labeled: false,
            stats: JoinStats::default(),
            pending: None,
            done: false,
        }
    }

    /// Extractors applied to each primary record.
    pub fn with_primary_extractors(mut self, extractors: ExtractorSet<Record>) -> Self {
        self.primary_extractors = extractors;
        self
    }

    /// Extractors applied to the matching secondary record.
    pub fn with_secondary_extractors(mut self, extractors: ExtractorSet<Record>) -> Self {
        self.secondary_extractors = extractors;
        self
    }

    /// Attach the materialized ad lookup as a third join source.
    pub fn with_ads(mut self, ads: AdsLookup) -> Self {
        self.ads = Some(ads);
        self
    }

    /// Row routing policy (discriminator and membership filters).
    pub fn with_router(mut self, router: RowRouter) -> Self {
        self.router = router;
        self
    }

    /// Read the click label from the primary stream instead of forcing `0`.
    ///
    /// Leave disabled for unlabeled evaluation streams.
    pub fn labeled(mut self, labeled: bool) -> Self {
        self.labeled = labeled;
        self
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> JoinStats {
        self.stats
    }

    fn fail(&mut self, error: JoinError) -> Option<Result<(JoinedRow, Label), JoinError>> {
        self.done = true;
        Some(Err(error))
    }

    /// Advance the secondary until its key reaches `key`.
    ///
    /// For sorted, covering inputs the secondary key never exceeds the
    /// primary key on loop entry, so the post-catch-up check reduces to a
    /// plain equality assertion.
    fn catch_up(&mut self, key: JoinKey) -> Result<(), JoinError> {
        while let Some(ahead) = self.secondary.current() {
            if ahead.key >= key {
                break;
            }
            self.secondary.advance()?;
        }
        match self.secondary.current() {
            None => Err(JoinError::Desync {
                stream: self.secondary.stream().to_string(),
                details: format!("stream exhausted before reaching primary key {key}"),
            }),
            Some(found) if found.key != key => Err(JoinError::Desync {
                stream: self.secondary.stream().to_string(),
                details: format!("expected key {key}, found {}", found.key),
            }),
            Some(_) => Ok(()),
        }
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

    fn build_row(&self) -> Result<(JoinedRow, Label), JoinError> {
        let Some(primary) = self.primary.current() else {
            return Err(JoinError::Exhausted {
                stream: self.primary.stream().to_string(),
            });
        };
        let Some(secondary) = self.secondary.current() else {
            return Err(JoinError::Exhausted {
                stream: self.secondary.stream().to_string(),
            });
        };
        let mut row = JoinedRow::new();
        self.primary_extractors
            .apply_into(&primary.record, &mut row)?;
        self.secondary_extractors
            .apply_into(&secondary.record, &mut row)?;
        if let Some(ads) = &self.ads {
            let ad_id = primary.record.require_int(columns::AD_ID)?;
            ads.apply(ad_id, &mut row)?;
        }
        let label = if self.labeled {
            primary.record.require_int(columns::IS_CLICK)?
        } else {
            0
        };
        Ok((row, label))
    }
}

impl<P: io::Read, S: io::Read> Iterator for RollingJoin<P, S> {
    type Item = Result<(JoinedRow, Label), JoinError>;

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
            self.stats.primary_rows += 1;
            if self.stats.primary_rows % progress::ROWS_PER_LOG == 0 {
                debug!(
                    rows = self.stats.primary_rows,
                    emitted = self.stats.emitted,
                    "merge join progress"
                );
            }
            if let Err(error) = self.catch_up(key) {
                return self.fail(error);
            }
            let route = match self.route_current(key) {
                Ok(route) => route,
                Err(error) => return self.fail(error),
            };
            match route {
                Route::Emit => {}
                Route::NonContextual => {
                    self.stats.skipped_non_contextual += 1;
                    if let Err(error) = self.primary.advance() {
                        return self.fail(error);
                    }
                    continue;
                }
                Route::Membership => {
                    self.stats.skipped_membership += 1;
                    if let Err(error) = self.primary.advance() {
                        return self.fail(error);
                    }
                    continue;
                }
            }
            let item = match self.build_row() {
                Ok(item) => item,
                Err(error) => return self.fail(error),
            };
            self.stats.emitted += 1;
            // The next primary record is decoded eagerly; a failure there
            // must not swallow the row already built.
            if let Err(error) = self.primary.advance() {
                self.pending = Some(error);
            }
            return Some(Ok(item));
        }
    }
}
