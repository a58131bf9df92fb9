#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Artifact persistence for expensive single-pass results.
pub mod artifacts;
/// Dataset file locations and cursor-opening helpers.
pub mod config;
/// Centralized constants used across the join, sampling, and artifacts.
pub mod constants;
/// Forward-only cursors over ordered record streams.
pub mod cursor;
/// Event date parsing for the log wire format.
pub mod dates;
/// Named field extraction applied per joined row.
pub mod extract;
mod hash;
/// The streaming merge-join engine and its auxiliary lookup variant.
pub mod join;
/// Record and joined-row data types.
pub mod record;
/// Row routing: discriminator and membership filters.
pub mod router;
/// User sampling over the metadata stream and the sample-join shape.
pub mod sample;
/// Shared type aliases.
pub mod types;
/// Validation-set derivation policies.
pub mod validation;

mod errors;

pub use artifacts::{
    ArtifactStore, DriveArtifactStore, MemoryArtifactStore, cached_identifier_set,
    get_identifier_set, get_user_sample, put_identifier_set, put_user_sample,
};
pub use config::DatasetPaths;
pub use cursor::{Keyed, StreamCursor};
pub use errors::JoinError;
pub use extract::{ExtractFn, ExtractorSet, field_float, field_int, field_text};
pub use join::{AdsLookup, JoinStats, RollingJoin};
pub use record::{FeatureValue, Header, JoinedRow, Record};
pub use router::{MembershipMode, Route, RowRouter};
pub use sample::{SampleJoin, sample_users};
pub use types::{AdId, FieldName, IdentifierSet, JoinKey, Label, StreamId, UserId};
pub use validation::{SampleEntry, UserSample, ValidationSetBuilder, collect_stream_keys};
