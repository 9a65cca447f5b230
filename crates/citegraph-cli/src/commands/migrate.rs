//! `citegraph migrate`

use anyhow::{Context, Result};
use citegraph_core::RunConfig;
use citegraph_source::migrations::run_migrations;
use citegraph_source::SourcePool;
use colored::Colorize;

pub fn execute(config: &RunConfig) -> Result<()> {
    let path = &config.source.path;
    let pool = SourcePool::create(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    run_migrations(&pool)?;

    println!(
        "{} {}",
        "Mirror schema ready:".green().bold(),
        path.display()
    );
    Ok(())
}
