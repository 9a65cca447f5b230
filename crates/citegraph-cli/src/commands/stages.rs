//! `citegraph stages`

use citegraph_pipeline::{StageId, Tier};
use colored::Colorize;

pub fn execute() {
    println!("{:<18} {:<8} {}", "Stage".bold(), "Tier".bold(), "Loads".bold());
    for stage in StageId::ALL {
        let (tier, loads) = match (stage.tier(), stage.node_kind(), stage.edge_kind()) {
            (Tier::Nodes, Some(kind), _) => ("1", format!("(:{})", kind.label())),
            (_, _, Some(kind)) => {
                let (from, to) = kind.endpoints();
                ("2", format!("(:{})-[:{}]->(:{})", from.label(), kind.rel_type(), to.label()))
            }
            _ => ("?", String::new()),
        };
        println!("{:<18} {:<8} {}", stage.as_str(), tier, loads.dimmed());
    }
}
