use indexmap::IndexMap;

use crate::errors::JoinError;
use crate::record::{FeatureValue, JoinedRow, Record};
use crate::types::FieldName;

/// A pure transform from one source value to one output feature.
pub type ExtractFn<S> = Box<dyn Fn(&S) -> Result<FeatureValue, JoinError> + Send + Sync>;

/// Named, insertion-ordered extractors applied to one join source.
///
/// The set owns no join state: the same contract covers streamed records,
/// auxiliary ad records, and sampled user tuples. Application follows
/// insertion order, which keeps joined rows deterministic across runs.
pub struct ExtractorSet<S> {
    entries: IndexMap<FieldName, ExtractFn<S>>,
}

impl<S> Default for ExtractorSet<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ExtractorSet<S> {
    /// Create an empty extractor set.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Add a named extractor, replacing any previous one with the same name.
    pub fn with(
        mut self,
        name: impl Into<FieldName>,
        extract: impl Fn(&S) -> Result<FeatureValue, JoinError> + Send + Sync + 'static,
    ) -> Self {
        self.insert(name, extract);
        self
    }

    /// Insert a named extractor.
    pub fn insert(
        &mut self,
        name: impl Into<FieldName>,
        extract: impl Fn(&S) -> Result<FeatureValue, JoinError> + Send + Sync + 'static,
    ) {
        self.entries.insert(name.into(), Box::new(extract));
    }

    /// Number of configured extractors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no extractors are configured.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every extractor to `source`, merging results into `row`.
    ///
    /// Joined rows are the union of all sources with no key collisions, so
    /// a name already present in `row` is a configuration error.
    pub fn apply_into(&self, source: &S, row: &mut JoinedRow) -> Result<(), JoinError> {
        for (name, extract) in &self.entries {
            let value = extract(source)?;
            if row.insert(name.clone(), value).is_some() {
                return Err(JoinError::Configuration(format!(
                    "duplicate output field '{name}' across join sources"
                )));
            }
        }
        Ok(())
    }
}

/// Extractor reading a field verbatim as text.
pub fn field_text(field: &'static str) -> ExtractFn<Record> {
    Box::new(move |record| Ok(FeatureValue::Text(record.require(field)?.to_string())))
}

/// Extractor parsing a field as an integer feature.
pub fn field_int(field: &'static str) -> ExtractFn<Record> {
    Box::new(move |record| Ok(FeatureValue::Int(record.require_int(field)?)))
}

/// Extractor parsing a field as a float feature.
pub fn field_float(field: &'static str) -> ExtractFn<Record> {
    Box::new(move |record| Ok(FeatureValue::Float(record.require_float(field)?)))
}
