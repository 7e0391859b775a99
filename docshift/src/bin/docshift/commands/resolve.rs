use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use docshift::{Resolution, resolve};

use crate::config::Settings;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Recovery",
    commands: &[
        "docshift resolve --applied                # Dirty version was finished by hand",
        "docshift resolve --rolled-back 0002       # Dirty version was undone; back to 0002",
    ],
}];

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("resolution").required(true).args(["applied", "rolled_back"])))]
pub struct ResolveArgs {
    /// Keep the dirty version and mark it as applied
    #[arg(long)]
    pub applied: bool,

    /// Move the checkpoint back to VERSION and mark it clean
    #[arg(long, value_name = "VERSION")]
    pub rolled_back: Option<String>,
}

impl ResolveArgs {
    fn resolution(self) -> Resolution {
        // clap's group guarantees exactly one of the two is set
        match (self.applied, self.rolled_back) {
            (false, Some(to)) => Resolution::RolledBack { to },
            _ => Resolution::Applied,
        }
    }
}

pub async fn handle_resolve(args: ResolveArgs, settings: &Settings, output: &OutputManager) -> Result<()> {
    output.heading("Resolve Dirty Checkpoint");

    let db = super::connect(settings, output).await?;
    let mut store = db.checkpoint_store();

    let resolution = args.resolution();
    match &resolution {
        Resolution::Applied => output.bullet("Marking the dirty version as applied"),
        Resolution::RolledBack { to } => output.bullet(&format!("Rolling the checkpoint back to {to}")),
    }

    let checkpoint = resolve(&mut store, resolution)
        .await
        .context("Failed to resolve checkpoint")?;

    output.success(&format!("Checkpoint is now at version {} (clean)", checkpoint.version));
    output.info("Run your migrations again to continue");
    Ok(())
}
