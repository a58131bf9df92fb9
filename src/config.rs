use std::fs::File;
use std::path::PathBuf;

use crate::constants::files;
use crate::cursor::StreamCursor;
use crate::errors::JoinError;

/// Locations and format of the delimited dataset.
///
/// Every path, file name, and delimiter is overridable so pipelines can run
/// against fixture-sized files in tests; nothing here is process-wide.
#[derive(Clone, Debug)]
pub struct DatasetPaths {
    data_dir: PathBuf,
    train_stream: String,
    test_stream: String,
    search_info: String,
    delimiter: u8,
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(files::DEFAULT_DATA_DIR),
            train_stream: files::TRAIN_STREAM.to_string(),
            test_stream: files::TEST_STREAM.to_string(),
            search_info: files::SEARCH_INFO.to_string(),
            delimiter: files::DELIMITER,
        }
    }
}

impl DatasetPaths {
    /// Paths rooted at `data_dir` with the default file names and delimiter.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Override the labeled click stream file name.
    pub fn with_train_stream(mut self, name: impl Into<String>) -> Self {
        self.train_stream = name.into();
        self
    }

    /// Override the unlabeled click stream file name.
    pub fn with_test_stream(mut self, name: impl Into<String>) -> Self {
        self.test_stream = name.into();
        self
    }

    /// Override the search metadata stream file name.
    pub fn with_search_info(mut self, name: impl Into<String>) -> Self {
        self.search_info = name.into();
        self
    }

    /// Override the field delimiter (must be a single-byte character).
    pub fn with_delimiter(mut self, delimiter: char) -> Result<Self, JoinError> {
        if !delimiter.is_ascii() {
            return Err(JoinError::Configuration(format!(
                "delimiter '{delimiter}' is not a single byte"
            )));
        }
        self.delimiter = delimiter as u8;
        Ok(self)
    }

    /// Configured delimiter byte.
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Full path of the labeled click stream.
    pub fn train_path(&self) -> PathBuf {
        self.data_dir.join(&self.train_stream)
    }

    /// Full path of the unlabeled click stream.
    pub fn test_path(&self) -> PathBuf {
        self.data_dir.join(&self.test_stream)
    }

    /// Full path of the search metadata stream.
    pub fn search_info_path(&self) -> PathBuf {
        self.data_dir.join(&self.search_info)
    }

    /// Open a cursor over the labeled click stream.
    pub fn open_train(&self) -> Result<StreamCursor<File>, JoinError> {
        StreamCursor::from_path(self.train_path(), self.delimiter)
    }

    /// Open a cursor over the unlabeled click stream.
    pub fn open_test(&self) -> Result<StreamCursor<File>, JoinError> {
        StreamCursor::from_path(self.test_path(), self.delimiter)
    }

    /// Open a cursor over the search metadata stream.
    pub fn open_search_info(&self) -> Result<StreamCursor<File>, JoinError> {
        StreamCursor::from_path(self.search_info_path(), self.delimiter)
    }

    /// Open the labeled or unlabeled click stream as the join primary.
    pub fn open_primary(&self, labeled: bool) -> Result<StreamCursor<File>, JoinError> {
        if labeled {
            self.open_train()
        } else {
            self.open_test()
        }
    }
}
