use std::path::Path;

use tidemark_common::{Direction, NO_VERSION, Version};
use tidemark_db::{MigrationPlan, MigrationReport, MigrationStatus};

fn describe(version: Version) -> String {
    if version == NO_VERSION {
        "none".to_string()
    } else {
        version.to_string()
    }
}

pub fn print_report(report: &MigrationReport) {
    if report.table_created {
        println!("Created version table.");
    }
    if report.applied.is_empty() {
        println!("Already at version {}.", describe(report.to));
        return;
    }

    let verb = match report.direction {
        Direction::Down => "Reverted",
        _ => "Applied",
    };
    for version in &report.applied {
        println!("  {verb} {version}");
    }
    println!(
        "Migrated {} from {} to {} ({} step{}).",
        report.direction,
        describe(report.from),
        describe(report.to),
        report.applied.len(),
        if report.applied.len() == 1 { "" } else { "s" }
    );
}

pub fn print_plan(plan: &MigrationPlan) {
    if plan.is_noop() {
        println!("Nothing to do: database is at version {}.", describe(plan.current));
        return;
    }

    println!(
        "Plan: {} from {} to {}",
        plan.direction,
        describe(plan.current),
        plan.target
    );
    for entry in &plan.steps {
        println!(
            "  {:>5}  {:<4}  {}  -> {}",
            entry.version,
            plan.direction.to_string(),
            entry.key(),
            plan.version_after(entry)
        );
    }
}

pub fn print_status(database: &Path, status: &MigrationStatus) {
    let current = status
        .current
        .map(describe)
        .unwrap_or_else(|| "never migrated".to_string());
    let latest = status
        .latest
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".to_string());

    println!("Database  {}", database.display());
    println!("Current   {current}");
    println!("Latest    {latest}");
    if status.pending.is_empty() {
        println!("Pending   none");
    } else {
        let pending: Vec<_> = status.pending.iter().map(|v| v.to_string()).collect();
        println!("Pending   {}", pending.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::describe;

    #[test]
    fn describes_sentinel_version() {
        assert_eq!(describe(-1), "none");
        assert_eq!(describe(0), "0");
        assert_eq!(describe(12), "12");
    }
}
