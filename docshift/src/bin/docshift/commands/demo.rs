use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Table};
use docshift::demo::register_demo;
use docshift::{Engine, MigrateError, Plan, RunOutcome, RunReport};

use crate::config::Settings;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};
use crate::theme::{ICONS, THEME};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Example Migrations",
    commands: &[
        "docshift demo                        # Apply the bundled example migrations",
        "docshift demo --dry-run              # Preview what would be migrated",
        "docshift --prefix scratch demo       # Run them in another key namespace",
    ],
}];

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Preview pending versions without executing them
    #[arg(long)]
    pub dry_run: bool,
}

impl TableDisplay for RunReport {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.table(&["Version", "Result", "Transaction", "Time"]);
        for version in &self.skipped {
            table.add_row(vec![Cell::new(version), Cell::new("skipped"), Cell::new("-"), Cell::new("-")]);
        }
        for step in &self.applied {
            table.add_row(vec![
                Cell::new(&step.version),
                Cell::new("applied"),
                Cell::new(if step.transactional { "yes" } else { "no" }),
                Cell::new(format!("{}ms", step.elapsed_ms)),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "from={} to={} applied={} skipped={} time={}ms",
            self.starting_version,
            self.checkpoint.version,
            self.applied.len(),
            self.skipped.len(),
            self.total_time_ms
        )
    }
}

pub async fn handle_demo(args: DemoArgs, settings: &Settings, output: &OutputManager) -> Result<()> {
    output.heading("Deploy Example Migrations");

    let db = super::connect(settings, output).await?;
    let store = db.checkpoint_store();
    let mut engine = Engine::new(db, store);
    register_demo(&mut engine).context("Failed to register example migrations")?;
    output.info(&format!("{} migration(s) registered", engine.registry().len()));

    if args.dry_run {
        output.warning("DRY RUN MODE - No changes will be made");
        return match engine.pending().await? {
            Plan::Pending(versions) if versions.is_empty() => {
                output.success("All migrations are up to date");
                Ok(())
            }
            Plan::Pending(versions) => {
                for version in &versions {
                    output.version_line(version, ICONS.arrow, THEME.info, "pending");
                }
                output.info(&format!("{} migration(s) would be applied", versions.len()));
                Ok(())
            }
            Plan::Blocked(checkpoint) => blocked(&checkpoint.version, output),
        };
    }

    output.progress("Applying migrations");
    let outcome = engine.run().await;
    output.clear_line();

    let report = match outcome {
        Ok(RunOutcome::Completed(report)) => report,
        Ok(RunOutcome::Blocked(checkpoint)) => return blocked(&checkpoint.version, output),
        Err(err) => {
            report_failure(&err, output);
            return Err(err).context("Migration run failed");
        }
    };

    for version in &report.skipped {
        output.version_line(version, ICONS.skip, THEME.warning, "skip");
    }
    for step in &report.applied {
        output.version_line(&step.version, ICONS.success, THEME.success, "done");
    }

    output.heading("Summary");
    output.display(&report)?;
    output.key_value("Current version", &report.checkpoint.version);
    if report.applied.is_empty() {
        output.success("All migrations are up to date");
    } else {
        output.success(&format!(
            "{} migration(s) applied in {}ms",
            report.applied.len(),
            report.total_time_ms
        ));
    }
    Ok(())
}

/// State the stored checkpoint was left in by a failed run.
#[derive(Debug, PartialEq, Eq)]
enum CheckpointNotice<'a> {
    /// The failing version was recorded as dirty.
    Dirty(&'a str),
    /// The version failed and the dirty mark could not be written.
    DirtyNotRecorded(&'a str),
    /// The version was applied but the checkpoint still holds the previous one.
    AppliedNotRecorded(&'a str),
}

fn checkpoint_notice(err: &MigrateError) -> Option<CheckpointNotice<'_>> {
    match err {
        MigrateError::Step { version, .. }
        | MigrateError::Begin { version, .. }
        | MigrateError::Commit { version, .. } => Some(CheckpointNotice::Dirty(version)),
        MigrateError::DirtyMarkFailed { .. } => err.version().map(CheckpointNotice::DirtyNotRecorded),
        MigrateError::CheckpointSave {
            version, dirty: false, ..
        } => Some(CheckpointNotice::AppliedNotRecorded(version)),
        _ => None,
    }
}

fn report_failure(err: &MigrateError, output: &OutputManager) {
    match checkpoint_notice(err) {
        Some(CheckpointNotice::Dirty(version)) => {
            output.version_line(version, ICONS.error, THEME.error, "failed");
            output.info(&format!("The checkpoint is now dirty at {version}; see 'docshift status'"));
        }
        Some(CheckpointNotice::DirtyNotRecorded(version)) => {
            output.version_line(version, ICONS.error, THEME.error, "failed");
            output.warning(&format!(
                "Version {version} could not be marked dirty; the next run will execute it again"
            ));
        }
        Some(CheckpointNotice::AppliedNotRecorded(version)) => {
            output.version_line(version, ICONS.warning, THEME.warning, "applied, not recorded");
            output.warning(&format!(
                "Version {version} was applied but the checkpoint still holds the previous version; \
                 the next run will execute it again"
            ));
        }
        None => {}
    }
}

fn blocked(version: &str, output: &OutputManager) -> Result<()> {
    output.error(&format!("Dirty version {version} found"));
    output.info("Resolve it with 'docshift resolve' before running migrations again");
    anyhow::bail!("Migrations are blocked by dirty version {version}")
}
