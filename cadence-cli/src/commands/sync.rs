//! `cadence sync`: one reconciliation cycle without the daemon.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use cadence_core::Snapshot;
use cadence_sync::{CycleReport, WriteResult};

/// Arguments for `cadence sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Render and compare, but write nothing and do not reload.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the serviceable groups after the cycle.
    #[arg(long)]
    pub show: bool,
}

#[derive(Tabled)]
struct GroupRow {
    #[tabled(rename = "app")]
    app: String,
    #[tabled(rename = "instances")]
    instances: usize,
    #[tabled(rename = "endpoints")]
    endpoints: String,
}

impl SyncArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let (_, config) = super::load(config_path)?;
        cadence_daemon::init_tracing();
        let reconciler = super::reconciler(&config)?;

        let report = super::runtime()?
            .block_on(reconciler.run_cycle(self.dry_run))
            .context("sync failed")?;

        print_report(&report, self.dry_run);
        if self.show {
            print_groups(&reconciler.snapshot().current());
        }
        Ok(())
    }
}

fn print_report(report: &CycleReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    println!(
        "{prefix}{} {} groups, {} instances ({}ms)",
        "✓".green(),
        report.groups,
        report.instances,
        report.duration_ms
    );
    match &report.write {
        WriteResult::Written { path, digest } => {
            println!("  ✎  {} ({})", path.display(), short(digest))
        }
        WriteResult::WouldWrite { path, .. } => println!("  ~  {}", path.display()),
        WriteResult::Unchanged { path, .. } => println!("  ·  {} unchanged", path.display()),
    }
    if report.reloaded {
        println!("  ↻  proxy reloaded");
    }
}

fn print_groups(snapshot: &Snapshot) {
    if snapshot.is_empty() {
        println!("No serviceable groups.");
        return;
    }
    let rows: Vec<GroupRow> = snapshot
        .groups
        .values()
        .map(|group| GroupRow {
            app: group.id.to_string(),
            instances: group.instances.len(),
            endpoints: group
                .instances
                .iter()
                .filter_map(|i| i.ports.first().map(|port| format!("{}:{port}", i.host)))
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn short(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
