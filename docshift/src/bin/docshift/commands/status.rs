use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use docshift::{Checkpoint, CheckpointStore};
use serde::Serialize;

use crate::config::Settings;
use crate::examples::ExampleGroup;
use crate::output::{OutputManager, TableDisplay};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Inspect",
    commands: &[
        "docshift status                      # Show the current checkpoint",
        "docshift --output json status        # Machine-readable checkpoint",
    ],
}];

/// Checkpoint as shown by `docshift status`
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub key: String,
    pub version: String,
    pub dirty: bool,
    pub state: &'static str,
}

impl StatusView {
    pub fn new(key: &str, checkpoint: &Checkpoint) -> Self {
        let state = if checkpoint.dirty {
            "dirty"
        } else if checkpoint.is_initial() {
            "not migrated"
        } else {
            "clean"
        };
        Self {
            key: key.to_string(),
            version: checkpoint.version.clone(),
            dirty: checkpoint.dirty,
            state,
        }
    }
}

impl TableDisplay for StatusView {
    fn to_table(&self, output: &OutputManager) -> Table {
        let mut table = output.table(&["Key", "Version", "Dirty", "State"]);
        table.add_row(vec![
            Cell::new(&self.key),
            Cell::new(&self.version),
            Cell::new(self.dirty.to_string()),
            Cell::new(self.state),
        ]);
        table
    }

    fn to_compact(&self) -> String {
        format!("version={} dirty={} state={}", self.version, self.dirty, self.state)
    }
}

pub async fn handle_status(settings: &Settings, output: &OutputManager) -> Result<()> {
    output.heading("Migration Status");

    let db = super::connect(settings, output).await?;
    let mut store = db.checkpoint_store();
    let checkpoint = store.fetch().await.context("Failed to read checkpoint")?;

    output.display(&StatusView::new(store.key(), &checkpoint))?;

    if checkpoint.dirty {
        output.warning(&format!(
            "Version {} did not finish; migrations are blocked until it is resolved",
            checkpoint.version
        ));
        output.info("Run 'docshift resolve --applied' or 'docshift resolve --rolled-back <VERSION>'");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_states() {
        assert_eq!(StatusView::new("k", &Checkpoint::initial()).state, "not migrated");
        assert_eq!(StatusView::new("k", &Checkpoint::clean("0002")).state, "clean");
        assert_eq!(StatusView::new("k", &Checkpoint::dirty("0002")).state, "dirty");
    }

    #[test]
    fn test_status_compact() {
        let view = StatusView::new("app:_migration", &Checkpoint::dirty("0003"));
        assert_eq!(view.to_compact(), "version=0003 dirty=true state=dirty");
    }
}
