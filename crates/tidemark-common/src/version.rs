use std::fmt;

use serde::{Deserialize, Serialize};

/// A schema version. Catalog versions start at 1; `0` means every unit has
/// been reverted.
pub type Version = i64;

/// Sentinel for a database that has never been migrated.
pub const NO_VERSION: Version = -1;

/// Which way a migration run traverses the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    /// Nothing to do: the database is already at the target.
    None,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
            Direction::None => f.write_str("none"),
        }
    }
}
