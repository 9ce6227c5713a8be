//! `cadence check-config`: load, validate and summarise the configuration.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use cadence_sync::ReconcilerSettings;

pub fn run(config_path: Option<&Path>) -> Result<()> {
    let (home, config) = super::load(config_path)?;
    // Compiles the template, so syntax errors surface here.
    super::reconciler(&config)?;
    let settings = ReconcilerSettings::from_config(&config);

    println!("{} configuration is valid", "✓".green());
    println!("  endpoint        {}", config.marathon.endpoint);
    println!(
        "  auth            {}",
        if config.marathon.credentials().is_some() { "basic" } else { "none" }
    );
    println!(
        "  template        {}",
        config
            .nginx
            .template
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(embedded)".to_string())
    );
    println!("  output          {}", settings.output.display());
    println!("  reload          {}", config.nginx.reload_command.join(" "));
    println!(
        "  validate        {}",
        settings
            .validate
            .as_ref()
            .map(|c| c.display())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!(
        "  tick            {}ms (queue {})",
        config.scheduler.tick_interval_ms, config.scheduler.queue_capacity
    );
    println!(
        "  socket          {}",
        config.socket_path_at(&home).display()
    );

    let output_dir = settings
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = output_dir {
        if !dir.exists() {
            println!(
                "{} output directory {} does not exist yet; it will be created",
                "!".yellow(),
                dir.display()
            );
        }
    }
    Ok(())
}
