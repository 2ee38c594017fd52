use std::collections::HashMap;

use tidemark_common::{Error, Result};
use tracing::debug;

use crate::catalog::CatalogEntry;
use crate::unit::{Migration, SqlMigration};

/// Turns a catalog entry into a runnable migration.
pub trait MigrationLoader {
    fn load(&self, entry: &CatalogEntry) -> Result<Box<dyn Migration>>;
}

type Factory = Box<dyn Fn() -> Box<dyn Migration> + Send + Sync>;

/// Migrations written in Rust, keyed by the file name of their catalog entry.
///
/// Each key must have exactly one factory; registering a second one for the
/// same file makes loading it fail instead of picking one silently.
#[derive(Default)]
pub struct Registry {
    factories: HashMap<String, Vec<Factory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, key: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Migration> + Send + Sync + 'static,
    {
        self.factories
            .entry(key.into())
            .or_default()
            .push(Box::new(factory));
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }
}

impl MigrationLoader for Registry {
    fn load(&self, entry: &CatalogEntry) -> Result<Box<dyn Migration>> {
        let key = entry.key();
        match self.factories.get(&key).map(Vec::as_slice) {
            Some([factory]) => Ok(factory()),
            Some(many) if many.len() > 1 => Err(Error::Load {
                location: key,
                reason: format!("defines {} migrations, expected exactly one", many.len()),
            }),
            _ => Err(Error::Load {
                location: key,
                reason: "defines no migration".into(),
            }),
        }
    }
}

/// Loads `.sql` files with `-- up` / `-- down` sections.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlFileLoader;

impl MigrationLoader for SqlFileLoader {
    fn load(&self, entry: &CatalogEntry) -> Result<Box<dyn Migration>> {
        let content = std::fs::read_to_string(&entry.location).map_err(|e| Error::Load {
            location: entry.key(),
            reason: format!("failed to read file: {e}"),
        })?;

        let migration = SqlMigration::parse(entry.version, &content).map_err(|reason| {
            Error::Load {
                location: entry.key(),
                reason,
            }
        })?;
        Ok(Box::new(migration))
    }
}

/// Registry first, then `.sql` files for anything not registered.
#[derive(Default)]
pub struct DefaultLoader {
    registry: Registry,
}

impl DefaultLoader {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }
}

impl MigrationLoader for DefaultLoader {
    fn load(&self, entry: &CatalogEntry) -> Result<Box<dyn Migration>> {
        let is_sql = entry
            .location
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));

        if is_sql && !self.registry.contains(&entry.key()) {
            debug!("loading {} as a SQL migration", entry.key());
            return SqlFileLoader.load(entry);
        }
        self.registry.load(entry)
    }
}
