use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan root does not exist, is not a directory, or cannot be listed.
    #[error("Root directory is not accessible: {}", path.display())]
    RootNotAccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One archive could not be opened or its entry table could not be read.
    #[error("Failed to read archive: {}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid search pattern: {pattern}")]
    PatternSyntax {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Scan was cancelled")]
    Cancelled,

    #[error("A scan is already running")]
    AlreadyScanning,

    #[error("No completed scan to query")]
    NotReady,
}

pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    pub(crate) fn root(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::RootNotAccessible {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>, source: impl Into<std::io::Error>) -> Self {
        Self::ArchiveOpen {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Full message including the underlying cause, suitable for a single log line.
    pub fn detail(&self) -> String {
        match std::error::Error::source(self) {
            Some(source) => format!("{self}: {source}"),
            None => self.to_string(),
        }
    }
}
