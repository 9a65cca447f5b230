//! `citegraph run`

use std::sync::Arc;

use anyhow::{Context, Result};
use citegraph_core::RunConfig;
use citegraph_graph::{GraphStore, MemoryGraph, Neo4jStore};
use citegraph_pipeline::{Pipeline, StageId, StageSelection};
use citegraph_source::{RelationalSource, SqliteSource};
use clap::Args;
use colored::Colorize;
use tracing::warn;

use crate::output;

#[derive(Args)]
pub struct RunArgs {
    /// Resume at this stage; earlier node stages count as completed
    #[arg(long, conflicts_with = "only")]
    pub from: Option<StageId>,

    /// Run only these stages (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<StageId>,

    /// Treat node stages as already loaded (for --only with edge stages)
    #[arg(long, requires = "only")]
    pub nodes_loaded: bool,

    /// Load into an in-memory graph instead of Neo4j
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub(crate) fn selection(&self) -> StageSelection {
        match (&self.from, self.only.is_empty()) {
            (Some(stage), _) => StageSelection::From(*stage),
            (None, false) => StageSelection::Only(self.only.clone()),
            (None, true) => StageSelection::All,
        }
    }
}

pub async fn execute(args: RunArgs, config: RunConfig) -> Result<()> {
    config.validate()?;

    let path = config.source.path.clone();
    let source: Arc<dyn RelationalSource> = Arc::new(
        SqliteSource::open(&path)
            .with_context(|| format!("Failed to open source database {}", path.display()))?,
    );

    let store: Arc<dyn GraphStore> = if args.dry_run {
        println!("{}", "Dry run: loading into an in-memory graph".yellow());
        Arc::new(MemoryGraph::new())
    } else {
        config.graph.validate()?;
        Arc::new(
            Neo4jStore::connect(&config.graph)
                .await
                .context("Failed to connect to Neo4j")?,
        )
    };

    let mut pipeline = Pipeline::new(source, store, config);
    if args.nodes_loaded {
        for stage in StageId::node_stages() {
            pipeline.assume_completed(stage);
        }
    }

    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current batch");
            cancel.cancel();
        }
    });

    match pipeline.run(args.selection()).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_run_report(&report);
            }
            Ok(())
        }
        Err(err) => {
            if let Some(report) = err.report() {
                if args.json {
                    println!("{}", serde_json::to_string_pretty(report)?);
                } else {
                    output::print_run_report(report);
                }
            }
            output::print_failure(&err);
            Err(err.into())
        }
    }
}
