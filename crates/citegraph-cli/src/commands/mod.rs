//! CLI command definitions and handlers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use citegraph_core::RunConfig;
use clap::{Parser, Subcommand};

pub mod migrate;
pub mod run;
pub mod schema;
pub mod stages;
pub mod verify;

/// Build a Neo4j citation graph from an OpenAlex relational mirror
#[derive(Parser)]
#[command(name = "citegraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML configuration file (CITEGRAPH_* variables override it)
    #[arg(short, long, global = true, env = "CITEGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run pipeline stages
    Run(run::RunArgs),

    /// Print counts and connectivity of the loaded graph
    Verify(verify::VerifyArgs),

    /// Create constraints and indexes in Neo4j
    Schema,

    /// List stages in execution order
    Stages,

    /// Create the relational mirror tables in the source database
    Migrate,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = RunConfig::load(self.config.as_deref()).with_context(|| match &self.config {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;

        match self.command {
            Commands::Run(args) => run::execute(args, config).await,
            Commands::Verify(args) => verify::execute(args, &config).await,
            Commands::Schema => schema::execute(&config).await,
            Commands::Stages => {
                stages::execute();
                Ok(())
            }
            Commands::Migrate => migrate::execute(&config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citegraph_pipeline::{StageId, StageSelection};
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_only_parses_stage_list() {
        let cli = Cli::try_parse_from([
            "citegraph",
            "run",
            "--only",
            "cited,related-to",
            "--nodes-loaded",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.nodes_loaded);
        assert_eq!(
            args.selection(),
            StageSelection::Only(vec![StageId::Cited, StageId::RelatedTo])
        );
    }

    #[test]
    fn test_run_from_conflicts_with_only() {
        let result = Cli::try_parse_from([
            "citegraph", "run", "--from", "cited", "--only", "works",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        assert!(Cli::try_parse_from(["citegraph", "run", "--from", "citations"]).is_err());
    }
}
