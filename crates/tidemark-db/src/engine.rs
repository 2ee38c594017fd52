use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;
use tidemark_common::{Direction, Error, NO_VERSION, Result, Version};
use tracing::{info, warn};

use crate::catalog::{Catalog, CatalogEntry, LeadingDigits, VersionPolicy};
use crate::loader::MigrationLoader;
use crate::version_store::VersionStore;

/// The steps needed to move a database from `current` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub current: Version,
    pub target: Version,
    pub direction: Direction,
    /// Catalog entries in execution order.
    pub steps: Vec<CatalogEntry>,
}

impl MigrationPlan {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    /// Version recorded once `entry` has run in this plan's direction.
    /// Reverting unit N leaves the database at N - 1.
    pub fn version_after(&self, entry: &CatalogEntry) -> Version {
        match self.direction {
            Direction::Down => entry.version - 1,
            _ => entry.version,
        }
    }
}

/// What a `migrate` call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub from: Version,
    pub to: Version,
    pub direction: Direction,
    /// Versions whose unit ran, in execution order.
    pub applied: Vec<Version>,
    pub table_created: bool,
}

/// Read-only view of where a database stands against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    /// `None` when the database has never been migrated.
    pub current: Option<Version>,
    pub latest: Option<Version>,
    pub pending: Vec<Version>,
}

/// Applies the migrations of one directory to a database.
pub struct Migrator {
    dir: PathBuf,
    store: VersionStore,
    loader: Box<dyn MigrationLoader>,
    policy: Box<dyn VersionPolicy>,
    extension: Option<String>,
}

impl Migrator {
    pub fn new(
        dir: impl Into<PathBuf>,
        store: VersionStore,
        loader: impl MigrationLoader + 'static,
    ) -> Self {
        Self {
            dir: dir.into(),
            store,
            loader: Box::new(loader),
            policy: Box::new(LeadingDigits),
            extension: None,
        }
    }

    pub fn with_policy(mut self, policy: impl VersionPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Only treat files with this extension as migrations.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Scan and validate the migrations directory.
    pub fn catalog(&self) -> Result<Catalog> {
        Catalog::discover(&self.dir, self.policy.as_ref(), self.extension.as_deref())
    }

    /// Compute what `migrate` would do without running anything or creating
    /// the version table.
    pub fn plan(&self, conn: &Connection, target: Option<Version>) -> Result<MigrationPlan> {
        let catalog = self.catalog()?;
        let current = self.store.peek_version(conn)?.unwrap_or(NO_VERSION);
        resolve(&catalog, current, target, &self.dir)
    }

    /// Move the database to `target`, or to the newest migration when `None`.
    ///
    /// The version is recorded after every unit. On failure nothing is rolled
    /// back: the store keeps the last version that completed, so calling
    /// `migrate` again resumes from there.
    pub fn migrate(&self, conn: &Connection, target: Option<Version>) -> Result<MigrationReport> {
        let catalog = self.catalog()?;
        let table_created = !self.store.exists(conn)?;
        let recorded = self.store.peek_version(conn)?.unwrap_or(NO_VERSION);
        let plan = resolve(&catalog, recorded, target, &self.dir)?;
        // Only create the version table once the plan is known to be valid.
        let current = self.store.current_version(conn)?;

        let mut report = MigrationReport {
            from: current,
            to: current,
            direction: plan.direction,
            applied: Vec::with_capacity(plan.steps.len()),
            table_created,
        };

        if plan.is_noop() {
            info!("database already at version {current}, nothing to migrate");
            return Ok(report);
        }

        info!(
            "migrating {} from version {current} to {}",
            plan.direction, plan.target
        );

        for entry in &plan.steps {
            let unit = self.loader.load(entry)?;
            info!("running {} {}", plan.direction, entry.key());

            let result = match plan.direction {
                Direction::Down => unit.down(conn),
                _ => unit.up(conn),
            };
            if let Err(e) = result {
                warn!(
                    "{} failed, database left at version {}",
                    entry.key(),
                    report.to
                );
                return Err(e);
            }

            let recorded = plan.version_after(entry);
            self.store.set_current_version(conn, recorded)?;
            report.to = recorded;
            report.applied.push(entry.version);
        }

        info!("database now at version {}", report.to);
        Ok(report)
    }

    pub fn status(&self, conn: &Connection) -> Result<MigrationStatus> {
        let catalog = self.catalog()?;
        let current = self.store.peek_version(conn)?;
        let floor = current.unwrap_or(NO_VERSION);

        Ok(MigrationStatus {
            current,
            latest: catalog.latest(),
            pending: catalog
                .iter_up()
                .filter(|e| e.version > floor)
                .map(|e| e.version)
                .collect(),
        })
    }
}

/// Work out direction and the slice of units to run. Upgrades take
/// `(current, target]` ascending, downgrades `(target, current]` descending.
fn resolve(
    catalog: &Catalog,
    current: Version,
    target: Option<Version>,
    dir: &Path,
) -> Result<MigrationPlan> {
    let target = match target {
        Some(target) => target,
        None => catalog
            .latest()
            .ok_or_else(|| Error::EmptyCatalog(dir.to_path_buf()))?,
    };
    if target == current {
        return Ok(MigrationPlan {
            current,
            target,
            direction: Direction::None,
            steps: Vec::new(),
        });
    }

    let (Some(earliest), Some(latest)) = (catalog.earliest(), catalog.latest()) else {
        return Err(Error::EmptyCatalog(dir.to_path_buf()));
    };
    let floor = earliest - 1;
    if target < floor || target > latest {
        return Err(Error::UnknownTarget {
            target,
            earliest: floor,
            latest,
        });
    }
    if current > latest {
        return Err(Error::VersionAhead { current, latest });
    }

    let steps: Vec<CatalogEntry> = if target > current {
        catalog
            .iter_up()
            .filter(|e| e.version > current && e.version <= target)
            .cloned()
            .collect()
    } else if target < current {
        catalog
            .iter_down()
            .filter(|e| e.version > target && e.version <= current)
            .cloned()
            .collect()
    } else {
        Vec::new()
    };

    let direction = match steps.first() {
        None => Direction::None,
        Some(_) if target > current => Direction::Up,
        Some(_) => Direction::Down,
    };

    Ok(MigrationPlan {
        current,
        target,
        direction,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(range: std::ops::RangeInclusive<Version>) -> Catalog {
        Catalog::from_entries(
            range
                .map(|version| CatalogEntry {
                    version,
                    location: PathBuf::from(format!("{version}_m.sql")),
                })
                .collect(),
        )
        .unwrap()
    }

    fn versions(plan: &MigrationPlan) -> Vec<Version> {
        plan.steps.iter().map(|e| e.version).collect()
    }

    #[test]
    fn latest_upgrade_from_fresh_database() {
        let plan = resolve(&catalog(1..=3), NO_VERSION, None, Path::new("m")).unwrap();
        assert_eq!(plan.target, 3);
        assert_eq!(plan.direction, Direction::Up);
        assert_eq!(versions(&plan), vec![1, 2, 3]);
    }

    #[test]
    fn partial_upgrade_takes_half_open_slice() {
        let plan = resolve(&catalog(1..=5), 2, Some(4), Path::new("m")).unwrap();
        assert_eq!(versions(&plan), vec![3, 4]);
    }

    #[test]
    fn downgrade_runs_high_to_low_and_stops_above_target() {
        let plan = resolve(&catalog(1..=3), 3, Some(1), Path::new("m")).unwrap();
        assert_eq!(plan.direction, Direction::Down);
        assert_eq!(versions(&plan), vec![3, 2]);
        assert_eq!(plan.version_after(&plan.steps[0]), 2);
        assert_eq!(plan.version_after(&plan.steps[1]), 1);
    }

    #[test]
    fn same_version_is_a_noop() {
        let plan = resolve(&catalog(1..=3), 2, Some(2), Path::new("m")).unwrap();
        assert!(plan.is_noop());
        assert_eq!(plan.direction, Direction::None);
    }

    #[test]
    fn empty_catalog_has_no_latest() {
        let err = resolve(&Catalog::default(), NO_VERSION, None, Path::new("m")).unwrap_err();
        assert!(matches!(err, Error::EmptyCatalog(_)));
    }

    #[test]
    fn targets_outside_catalog_are_rejected() {
        let err = resolve(&catalog(1..=3), 1, Some(4), Path::new("m")).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownTarget {
                target: 4,
                earliest: 0,
                latest: 3
            }
        ));

        let err = resolve(&catalog(1..=3), 1, Some(-1), Path::new("m")).unwrap_err();
        assert!(matches!(err, Error::UnknownTarget { .. }));
    }

    #[test]
    fn database_ahead_of_catalog_is_rejected() {
        let err = resolve(&catalog(1..=3), 5, Some(2), Path::new("m")).unwrap_err();
        assert!(matches!(err, Error::VersionAhead { current: 5, latest: 3 }));
    }

    #[test]
    fn asking_for_the_current_version_is_a_noop_even_outside_catalog() {
        let plan = resolve(&catalog(1..=1), 3, Some(3), Path::new("m")).unwrap();
        assert!(plan.is_noop());
        assert_eq!(plan.direction, Direction::None);

        let plan = resolve(&catalog(1..=3), NO_VERSION, Some(NO_VERSION), Path::new("m")).unwrap();
        assert!(plan.is_noop());

        let plan = resolve(&Catalog::default(), 2, Some(2), Path::new("m")).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn target_zero_reverts_everything() {
        let plan = resolve(&catalog(1..=3), 3, Some(0), Path::new("m")).unwrap();
        assert_eq!(versions(&plan), vec![3, 2, 1]);
        assert_eq!(plan.version_after(&plan.steps[2]), 0);
    }
}
