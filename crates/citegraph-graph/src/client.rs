//! Neo4j-backed [`GraphStore`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use citegraph_core::{
    AttrValue, EdgeKey, EdgeKind, EdgeUpsert, GraphConfig, NodeKind, NodeUpsert, UpsertInstruction,
};
use neo4rs::{ConfigBuilder, Graph, Query, Txn};
use tracing::{debug, info};

use crate::cypher;
use crate::error::{GraphError, GraphResult};
use crate::schema::SCHEMA_STATEMENTS;
use crate::store::{BatchOutcome, GraphStore};

/// Client for the target Neo4j database.
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect and verify the server answers.
    ///
    /// `Graph::connect` only builds a lazy pool, so a `RETURN 1` ping forces
    /// the bolt handshake and surfaces an unreachable server right away.
    pub async fn connect(config: &GraphConfig) -> GraphResult<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(500)
            .build()
            .map_err(|e| GraphError::Connection(format!("invalid Neo4j config: {}", e)))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| GraphError::Connection(format!("cannot create pool: {}", e)))?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| GraphError::Connection(format!("Neo4j is not responding: {}", e)))?;

        info!(uri = %config.uri, database = %config.database, "Connected to Neo4j");
        Ok(Self { graph })
    }

    async fn scalar(&self, query: Query) -> GraphResult<u64> {
        let mut rows = self.graph.execute(query).await?;
        match rows.next().await? {
            Some(row) => {
                let count: i64 = row.get("count").map_err(|e| GraphError::Decode {
                    field: "count".to_string(),
                    message: e.to_string(),
                })?;
                Ok(count.max(0) as u64)
            }
            None => Ok(0),
        }
    }

    /// Run every group of the batch inside one open transaction.
    async fn write_groups(&self, txn: &mut Txn, batch: &[UpsertInstruction]) -> GraphResult<BatchOutcome> {
        let mut nodes: BTreeMap<NodeKind, Vec<&NodeUpsert>> = BTreeMap::new();
        let mut edges: BTreeMap<EdgeKind, Vec<&EdgeUpsert>> = BTreeMap::new();
        for instruction in batch {
            match instruction {
                UpsertInstruction::Node(n) => nodes.entry(n.kind).or_default().push(n),
                UpsertInstruction::Edge(e) => edges.entry(e.kind).or_default().push(e),
            }
        }

        let mut outcome = BatchOutcome::default();

        // Nodes first so edges in the same batch can see them.
        for (kind, group) in nodes {
            let rows: Vec<cypher::BoltRow> = group.iter().map(|n| cypher::node_row(n)).collect();
            let query = Query::new(cypher::node_merge(kind)).param("rows", rows);
            outcome.applied += applied_count(txn, query).await?;
        }

        for (kind, group) in edges {
            let rows: Vec<cypher::BoltRow> = group.iter().map(|e| cypher::edge_row(e)).collect();

            let missing = Query::new(cypher::edge_dangling(kind)).param("rows", rows.clone());
            let mut stream = txn.execute(missing).await?;
            while let Some(row) = stream.next(txn.handle()).await? {
                let source: String = decode(&row, "source")?;
                let target: String = decode(&row, "target")?;
                outcome.dangling.push(EdgeKey::new(kind, source, target));
            }

            let query = Query::new(cypher::edge_merge(kind)).param("rows", rows);
            outcome.applied += applied_count(txn, query).await?;
        }

        Ok(outcome)
    }
}

fn decode<T: serde::de::DeserializeOwned>(row: &neo4rs::Row, field: &str) -> GraphResult<T> {
    row.get(field).map_err(|e| GraphError::Decode {
        field: field.to_string(),
        message: e.to_string(),
    })
}

async fn applied_count(txn: &mut Txn, query: Query) -> GraphResult<usize> {
    let mut stream = txn.execute(query).await?;
    let mut applied = 0usize;
    while let Some(row) = stream.next(txn.handle()).await? {
        let n: i64 = decode(&row, "applied")?;
        applied += n.max(0) as usize;
    }
    Ok(applied)
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn ensure_schema(&self) -> GraphResult<()> {
        info!("Initializing Neo4j schema...");
        for statement in SCHEMA_STATEMENTS {
            self.graph.run(Query::new(statement.to_string())).await?;
        }
        info!("Neo4j schema initialized ({} statements)", SCHEMA_STATEMENTS.len());
        Ok(())
    }

    async fn apply_batch(&self, batch: &[UpsertInstruction]) -> GraphResult<BatchOutcome> {
        let mut txn = self.graph.start_txn().await?;

        match self.write_groups(&mut txn, batch).await {
            Ok(outcome) => {
                txn.commit().await?;
                debug!(
                    instructions = batch.len(),
                    applied = outcome.applied,
                    dangling = outcome.dangling.len(),
                    "Batch committed"
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    debug!(error = %rollback, "Rollback after failed batch also failed");
                }
                Err(e)
            }
        }
    }

    async fn count_nodes(&self, kind: NodeKind) -> GraphResult<u64> {
        self.scalar(Query::new(cypher::count_nodes(kind))).await
    }

    async fn count_edges(&self, kind: EdgeKind) -> GraphResult<u64> {
        self.scalar(Query::new(cypher::count_edges(kind))).await
    }

    async fn count_connected(&self, kind: NodeKind, edge: EdgeKind) -> GraphResult<u64> {
        self.scalar(Query::new(cypher::count_connected(kind, edge))).await
    }

    async fn count_with_property(
        &self,
        kind: NodeKind,
        property: &str,
        value: Option<&AttrValue>,
    ) -> GraphResult<u64> {
        if !kind.attribute_names().contains(&property) {
            return Err(GraphError::Rejected(format!(
                "{} has no property {}",
                kind.label(),
                property
            )));
        }
        let statement = cypher::count_with_property(kind, property, value.is_some());
        let query = match value {
            Some(value) => Query::new(statement).param("value", cypher::to_bolt(value)),
            None => Query::new(statement),
        };
        self.scalar(query).await
    }
}
