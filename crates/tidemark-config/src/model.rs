use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings for a migration run. Every field has a default so a config file
/// only needs to mention what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateConfig {
    /// Path to the SQLite database file.
    pub database: PathBuf,
    /// Directory holding one file per migration version.
    pub migrations_dir: PathBuf,
    /// Name of the table that records the current version.
    pub table: String,
    /// Only files with this extension are treated as migrations.
    pub extension: Option<String>,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("tidemark.db"),
            migrations_dir: PathBuf::from("migrations"),
            table: "migrations".to_string(),
            extension: Some("sql".to_string()),
        }
    }
}
