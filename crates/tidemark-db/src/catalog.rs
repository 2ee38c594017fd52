use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tidemark_common::{Error, Result, Version};
use tracing::debug;

/// Maps a migration file name to its version.
pub trait VersionPolicy {
    fn parse(&self, file_name: &str) -> Version;
}

/// Default policy: the leading run of ASCII digits, so `0003_add_email.sql`
/// is version 3. Names without a numeric prefix parse to 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadingDigits;

impl VersionPolicy for LeadingDigits {
    fn parse(&self, file_name: &str) -> Version {
        let digits: String = file_name
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().unwrap_or(0)
    }
}

/// One discovered migration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub version: Version,
    pub location: PathBuf,
}

impl CatalogEntry {
    /// The file name, used as the unit's registry key.
    pub fn key(&self) -> String {
        self.location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// The validated set of migrations found in a directory, sorted ascending by
/// version. Versions are unique and contiguous.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Scan `dir` (non-recursively) and validate what it holds.
    ///
    /// Sub-directories and dot-files are skipped, as are files whose
    /// extension differs from `extension` when one is given.
    pub fn discover(
        dir: &Path,
        policy: &dyn VersionPolicy,
        extension: Option<&str>,
    ) -> Result<Self> {
        let read_dir = std::fs::read_dir(dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read migrations directory {}: {e}", dir.display()),
            ))
        })?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                debug!("skipping directory {}", path.display());
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if let Some(wanted) = extension {
                if path.extension().and_then(|e| e.to_str()) != Some(wanted) {
                    debug!("skipping {name}: not a .{wanted} file");
                    continue;
                }
            }

            entries.push(CatalogEntry {
                version: policy.parse(&name),
                location: path,
            });
        }

        Self::from_entries(entries)
    }

    /// Validate and sort an already collected set of entries.
    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Result<Self> {
        // read_dir order is unspecified; sort by name too so duplicate
        // reports are stable.
        entries.sort_by(|a, b| {
            a.version
                .cmp(&b.version)
                .then_with(|| a.location.cmp(&b.location))
        });

        let mut seen: HashMap<Version, &CatalogEntry> = HashMap::new();
        for entry in &entries {
            if entry.version < 1 {
                return Err(Error::InvalidFilename(entry.key()));
            }
            if let Some(first) = seen.insert(entry.version, entry) {
                return Err(Error::DuplicateVersion {
                    version: entry.version,
                    first: first.key(),
                    second: entry.key(),
                });
            }
        }

        for pair in entries.windows(2) {
            if pair[1].version != pair[0].version + 1 {
                return Err(Error::Gap {
                    after: pair[0].version,
                    next: pair[1].version,
                });
            }
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn earliest(&self) -> Option<Version> {
        self.entries.first().map(|e| e.version)
    }

    pub fn latest(&self) -> Option<Version> {
        self.entries.last().map(|e| e.version)
    }

    pub fn get(&self, version: Version) -> Option<&CatalogEntry> {
        let first = self.earliest()?;
        let index = usize::try_from(version.checked_sub(first)?).ok()?;
        self.entries.get(index)
    }

    pub fn iter_up(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn iter_down(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().rev()
    }
}
