/// Column names and discriminator values for the click/search log schema.
pub mod columns {
    /// Shared integer join key column present in every stream.
    pub const SEARCH_ID: &str = "SearchID";
    /// Placement discriminator column on the click stream.
    pub const OBJECT_TYPE: &str = "ObjectType";
    /// Discriminator value marking contextual placements.
    pub const CONTEXTUAL: &str = "3";
    /// Click label column on the labeled click stream.
    pub const IS_CLICK: &str = "IsClick";
    /// Ad identifier column used by the auxiliary lookup join.
    pub const AD_ID: &str = "AdID";
    /// User identifier column on the search metadata stream.
    pub const USER_ID: &str = "UserID";
    /// Event timestamp column on the search metadata stream.
    pub const SEARCH_DATE: &str = "SearchDate";
}

/// Constants used by artifact persistence and wire encoding.
pub mod artifacts {
    /// Key prefix for named artifacts inside a datastore file.
    pub const ARTIFACT_PREFIX: &[u8] = b"artifact:";
    /// Prefix marker for bitcode-encoded payloads.
    pub const BITCODE_PREFIX: u8 = b'B';
    /// Version tag for persisted identifier-set records.
    pub const IDENTIFIER_SET_RECORD_VERSION: u8 = 1;
    /// Version tag for persisted user-sample records.
    pub const USER_SAMPLE_RECORD_VERSION: u8 = 1;
    /// Default directory for persisted artifact files.
    pub const DEFAULT_STORE_DIR: &str = ".artifacts";
    /// Default filename for persisted artifact files.
    pub const DEFAULT_STORE_FILENAME: &str = "artifact_store.bin";
    /// Canonical artifact name for the cached test-stream key set.
    pub const TEST_IDS_ARTIFACT: &str = "test_search_ids";
    /// Canonical artifact name for the cached validation id set.
    pub const VALIDATION_IDS_ARTIFACT: &str = "validation_ids";
}

/// Constants governing scan progress reporting.
pub mod progress {
    /// Primary rows scanned between progress log lines.
    pub const ROWS_PER_LOG: u64 = 1_000_000;
}

/// Default file layout of the delimited dataset.
pub mod files {
    /// Default directory containing the delimited logs.
    pub const DEFAULT_DATA_DIR: &str = "data";
    /// Labeled click stream file name.
    pub const TRAIN_STREAM: &str = "trainSearchStream.tsv";
    /// Unlabeled click stream file name.
    pub const TEST_STREAM: &str = "testSearchStream.tsv";
    /// Search metadata stream file name.
    pub const SEARCH_INFO: &str = "SearchInfo.tsv";
    /// Default field delimiter.
    pub const DELIMITER: u8 = b'\t';
}
