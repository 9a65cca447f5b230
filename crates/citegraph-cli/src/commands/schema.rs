//! `citegraph schema`

use anyhow::{Context, Result};
use citegraph_core::RunConfig;
use citegraph_graph::{GraphStore, Neo4jStore};
use colored::Colorize;

pub async fn execute(config: &RunConfig) -> Result<()> {
    config.graph.validate()?;
    let store = Neo4jStore::connect(&config.graph)
        .await
        .context("Failed to connect to Neo4j")?;

    store.ensure_schema().await?;
    println!("{}", "Schema ready.".green().bold());
    Ok(())
}
