use std::io;

use thiserror::Error;

use crate::types::{JoinKey, StreamId};

/// Error type for stream decoding, join synchronization, and persistence failures.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("malformed record in '{stream}' at line {line}: {details}")]
    MalformedRecord {
        stream: StreamId,
        line: u64,
        details: String,
    },
    #[error("join desync in '{stream}': {details}")]
    Desync { stream: StreamId, details: String },
    #[error("auxiliary lookup has no entry for key {key}")]
    LookupMiss { key: JoinKey },
    #[error("cursor for '{stream}' advanced past the end of the stream")]
    Exhausted { stream: StreamId },
    #[error("artifact store failure: {0}")]
    ArtifactStore(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
