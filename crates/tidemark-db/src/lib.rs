pub mod catalog;
pub mod engine;
pub mod loader;
pub mod unit;
pub mod validation;
pub mod version_store;

pub use catalog::{Catalog, CatalogEntry, LeadingDigits, VersionPolicy};
pub use engine::{MigrationPlan, MigrationReport, MigrationStatus, Migrator};
pub use loader::{DefaultLoader, MigrationLoader, Registry, SqlFileLoader};
pub use unit::{Migration, SqlMigration};
pub use version_store::VersionStore;
