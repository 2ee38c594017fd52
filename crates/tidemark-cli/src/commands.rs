use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use regex::Regex;
use rusqlite::{Connection, OpenFlags};
use tidemark_config::MigrateConfig;
use tidemark_db::{DefaultLoader, Migrator, VersionStore};
use tracing::{debug, info};

use crate::output;

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

pub fn migrator(config: &MigrateConfig) -> Result<Migrator> {
    let store = VersionStore::new(config.table.clone()).context("invalid version table")?;
    let migrator = Migrator::new(&config.migrations_dir, store, DefaultLoader::default());
    Ok(match &config.extension {
        Some(ext) => migrator.with_extension(ext.clone()),
        None => migrator,
    })
}

pub fn migrate(config: &MigrateConfig, target: Option<i64>) -> Result<()> {
    let migrator = migrator(config)?;
    let conn = open(&config.database)?;
    let report = migrator
        .migrate(&conn, target)
        .context("migration failed")?;
    output::print_report(&report);
    Ok(())
}

pub fn plan(config: &MigrateConfig, target: Option<i64>, json: bool) -> Result<()> {
    let migrator = migrator(config)?;
    let conn = open_read_only(&config.database)?;
    let plan = migrator
        .plan(&conn, target)
        .context("failed to compute migration plan")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        output::print_plan(&plan);
    }
    Ok(())
}

pub fn status(config: &MigrateConfig, json: bool) -> Result<()> {
    let migrator = migrator(config)?;
    let conn = open_read_only(&config.database)?;
    let status = migrator
        .status(&conn)
        .context("failed to read migration status")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        output::print_status(&config.database, &status);
    }
    Ok(())
}

/// Write `<next>_<name>.<ext>` into the migrations directory, numbered one
/// past the newest existing migration.
pub fn new_migration(config: &MigrateConfig, name: &str) -> Result<PathBuf> {
    let slug = slugify(name);
    if slug.is_empty() {
        bail!("migration name must contain letters or digits: {name:?}");
    }

    std::fs::create_dir_all(&config.migrations_dir).with_context(|| {
        format!(
            "failed to create migrations directory {}",
            config.migrations_dir.display()
        )
    })?;

    let catalog = migrator(config)?
        .catalog()
        .context("existing migrations are invalid")?;
    let next = catalog.latest().unwrap_or(0) + 1;
    let ext = config.extension.as_deref().unwrap_or("sql");
    let path = config
        .migrations_dir
        .join(format!("{next:04}_{slug}.{ext}"));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(template(name, next).as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!("created migration {}", path.display());
    Ok(path)
}

fn open(path: &Path) -> Result<Connection> {
    debug!("opening database {}", path.display());
    Connection::open(path).with_context(|| format!("failed to open database {}", path.display()))
}

/// Inspection never creates the database; a missing file reads like an
/// empty one.
fn open_read_only(path: &Path) -> Result<Connection> {
    if !path.exists() {
        debug!("{} does not exist yet, inspecting an empty database", path.display());
        return Connection::open_in_memory().context("failed to open in-memory database");
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    Connection::open_with_flags(path, flags)
        .with_context(|| format!("failed to open database {}", path.display()))
}

fn slugify(name: &str) -> String {
    NON_SLUG
        .replace_all(&name.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

fn template(name: &str, version: i64) -> String {
    format!(
        "-- Migration: {name}\n\
         -- Version: {version}\n\
         -- Created: {}\n\n\
         -- up\n\n\n\
         -- down\n\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> MigrateConfig {
        MigrateConfig {
            database: dir.join("app.db"),
            migrations_dir: dir.join("migrations"),
            ..MigrateConfig::default()
        }
    }

    #[test]
    fn slugify_normalises_names() {
        assert_eq!(slugify("Create Users"), "create_users");
        assert_eq!(slugify("  add-email  column!"), "add_email_column");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn new_migration_numbers_after_latest() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let first = new_migration(&config, "create users").unwrap();
        assert_eq!(first.file_name().unwrap(), "0001_create_users.sql");

        let second = new_migration(&config, "add email").unwrap();
        assert_eq!(second.file_name().unwrap(), "0002_add_email.sql");

        let content = std::fs::read_to_string(&second).unwrap();
        assert!(content.contains("-- up"));
        assert!(content.contains("-- down"));
    }

    #[test]
    fn new_migration_rejects_blank_names() {
        let dir = tempfile::tempdir().unwrap();
        assert!(new_migration(&config(dir.path()), "--").is_err());
    }

    #[test]
    fn template_is_an_empty_but_valid_migration() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        new_migration(&config, "noop").unwrap();

        migrate(&config, None).unwrap();
        let conn = Connection::open(&config.database).unwrap();
        let version = VersionStore::new("migrations")
            .unwrap()
            .current_version(&conn)
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn status_does_not_create_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        new_migration(&config, "init").unwrap();

        status(&config, true).unwrap();
        plan(&config, None, false).unwrap();
        assert!(!config.database.exists());
    }
}
