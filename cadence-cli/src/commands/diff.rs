//! `cadence diff`: show what the next sync would change on disk.

use std::path::Path;

use anyhow::{Context, Result};

pub fn run(config_path: Option<&Path>) -> Result<()> {
    let (_, config) = super::load(config_path)?;
    let reconciler = super::reconciler(&config)?;

    let diff = super::runtime()?
        .block_on(reconciler.diff())
        .context("diff failed")?;

    match diff {
        None => println!("No differences for {}.", reconciler.output().display()),
        Some(diff) => {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(())
}
