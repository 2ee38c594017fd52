use std::path::PathBuf;

use thiserror::Error;

use crate::version::{Direction, Version};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("duplicate migration version {version}: {first} and {second}")]
    DuplicateVersion {
        version: Version,
        first: String,
        second: String,
    },

    #[error("migration versions are not contiguous: {after} is followed by {next}")]
    Gap { after: Version, next: Version },

    #[error("invalid migration filename: {0} does not start with a version number")]
    InvalidFilename(String),

    #[error("no migrations found in {}", .0.display())]
    EmptyCatalog(PathBuf),

    #[error("unknown target version {target}: expected a value between {earliest} and {latest}")]
    UnknownTarget {
        target: Version,
        earliest: Version,
        latest: Version,
    },

    #[error("database is at version {current} but the newest migration is {latest}")]
    VersionAhead { current: Version, latest: Version },

    #[error("failed to load migration {location}: {reason}")]
    Load { location: String, reason: String },

    #[error("version store error: {0}")]
    Persistence(String),

    #[error("migration {version} failed ({direction}): {message}")]
    UnitExecution {
        version: Version,
        direction: Direction,
        message: String,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

}

impl Error {
    /// Whether the error was raised while validating the catalog, before any
    /// migration ran.
    pub fn is_catalog_error(&self) -> bool {
        matches!(
            self,
            Error::DuplicateVersion { .. }
                | Error::Gap { .. }
                | Error::InvalidFilename(_)
                | Error::EmptyCatalog(_)
        )
    }
}
