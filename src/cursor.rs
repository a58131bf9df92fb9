use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::constants::columns;
use crate::errors::JoinError;
use crate::record::{Header, Record};
use crate::types::{FieldName, JoinKey, StreamId};

/// A record paired with its parsed join key.
#[derive(Clone, Debug)]
pub struct Keyed {
    /// Parsed join key for this record.
    pub key: JoinKey,
    /// The record itself.
    pub record: Record,
}

/// Forward-only cursor over one ordered record stream.
///
/// The cursor is an explicit two-state machine: positioned (`current()`
/// returns a record) or exhausted (`current()` returns `None`). There is no
/// random access and no rewind; the underlying stream is consumed
/// monotonically, read-only, and released when the cursor is dropped on any
/// exit path.
#[derive(Debug)]
pub struct StreamCursor<R: io::Read> {
    reader: csv::Reader<R>,
    header: Arc<Header>,
    key_field: FieldName,
    require_sorted: bool,
    last_key: Option<JoinKey>,
    line: u64,
    current: Option<Keyed>,
    exhausted: bool,
}

impl StreamCursor<File> {
    /// Open a cursor over a delimited file, keyed by the shared join key column.
    ///
    /// The stream tag used in errors and logs is the file name.
    pub fn from_path<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self, JoinError> {
        let stream = path
            .as_ref()
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("stream")
            .to_string();
        let file = File::open(path.as_ref())?;
        Self::with_key_field(file, stream, delimiter, columns::SEARCH_ID)
    }
}

impl<R: io::Read> StreamCursor<R> {
    /// Wrap any reader as a cursor, keyed by the shared join key column.
    pub fn from_reader(
        reader: R,
        stream: impl Into<StreamId>,
        delimiter: u8,
    ) -> Result<Self, JoinError> {
        Self::with_key_field(reader, stream, delimiter, columns::SEARCH_ID)
    }

    /// Wrap a reader as a cursor with an explicit key column.
    ///
    /// Reads the header row and positions the cursor on the first record;
    /// a missing key column is a configuration error, and an unparseable
    /// first key surfaces here as a malformed record.
    pub fn with_key_field(
        reader: R,
        stream: impl Into<StreamId>,
        delimiter: u8,
        key_field: &str,
    ) -> Result<Self, JoinError> {
        let stream = stream.into();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_reader(reader);
        let names: Vec<FieldName> = reader
            .headers()?
            .iter()
            .map(|name| name.to_string())
            .collect();
        let header = Arc::new(Header::new(stream.clone(), names));
        if header.position(key_field).is_none() {
            return Err(JoinError::Configuration(format!(
                "stream '{stream}' has no key column '{key_field}'"
            )));
        }
        let mut cursor = Self {
            reader,
            header,
            key_field: key_field.to_string(),
            require_sorted: false,
            last_key: None,
            line: 1,
            current: None,
            exhausted: false,
        };
        cursor.current = cursor.read_next()?;
        cursor.exhausted = cursor.current.is_none();
        Ok(cursor)
    }

    /// Enable or disable the in-stream sortedness assertion.
    ///
    /// When enabled, a key regression on a later record raises
    /// [`JoinError::Desync`]. The join engine turns this on for both of
    /// its streams.
    pub fn require_sorted(mut self, require: bool) -> Self {
        self.require_sorted = require;
        self
    }

    /// Stream tag used in errors and logs.
    pub fn stream(&self) -> &str {
        self.header.stream()
    }

    /// The record at the cursor position, or `None` once the stream is exhausted.
    pub fn current(&self) -> Option<&Keyed> {
        self.current.as_ref()
    }

    /// Move forward one record.
    ///
    /// Moving off the last record into the exhausted state is `Ok`;
    /// advancing an already-exhausted cursor is [`JoinError::Exhausted`].
    pub fn advance(&mut self) -> Result<(), JoinError> {
        if self.exhausted {
            return Err(JoinError::Exhausted {
                stream: self.stream().to_string(),
            });
        }
        self.current = self.read_next()?;
        self.exhausted = self.current.is_none();
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Keyed>, JoinError> {
        let mut raw = csv::StringRecord::new();
        if !self.reader.read_record(&mut raw)? {
            return Ok(None);
        }
        self.line += 1;
        let values: Vec<String> = raw.iter().map(|value| value.to_string()).collect();
        let record = Record::new(Arc::clone(&self.header), values, self.line);
        let key = record.require_int(&self.key_field)?;
        if self.require_sorted
            && let Some(last) = self.last_key
            && key < last
        {
            return Err(JoinError::Desync {
                stream: self.stream().to_string(),
                details: format!("key {key} follows {last}; stream is not sorted ascending"),
            });
        }
        self.last_key = Some(key);
        Ok(Some(Keyed { key, record }))
    }
}
