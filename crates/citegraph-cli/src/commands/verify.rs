//! `citegraph verify`

use anyhow::{Context, Result};
use citegraph_core::RunConfig;
use citegraph_graph::{verify, Neo4jStore};
use clap::Args;

use crate::output;

#[derive(Args)]
pub struct VerifyArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: VerifyArgs, config: &RunConfig) -> Result<()> {
    config.graph.validate()?;
    let store = Neo4jStore::connect(&config.graph)
        .await
        .context("Failed to connect to Neo4j")?;

    let report = verify(&store, &config.scope).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_verification(&report);
    }
    Ok(())
}
