//! Cypher text and parameter rows for batched upserts.
//!
//! Labels and relationship types come from the closed kind enums, so they are
//! spliced into the statement text. Every value travels as a parameter.

use std::collections::HashMap;

use citegraph_core::{AttrValue, Attributes, EdgeKind, EdgeUpsert, MergeRule, NodeKind, NodeUpsert};
use neo4rs::{BoltNull, BoltType};

/// Parameter row as sent inside `$rows`.
pub type BoltRow = HashMap<String, BoltType>;

/// `UNWIND ... MERGE` for one node kind.
pub fn node_merge(kind: NodeKind) -> String {
    format!(
        "UNWIND $rows AS row
         MERGE (n:{label} {{id: row.id}})
         SET n += row.props, n.loaded_at = datetime()
         RETURN count(n) AS applied",
        label = kind.label()
    )
}

/// Rows of `$rows` whose endpoints are not both present.
pub fn edge_dangling(kind: EdgeKind) -> String {
    let (from, to) = kind.endpoints();
    format!(
        "UNWIND $rows AS row
         OPTIONAL MATCH (a:{from} {{id: row.source}})
         OPTIONAL MATCH (b:{to} {{id: row.target}})
         WITH row, a, b
         WHERE a IS NULL OR b IS NULL
         RETURN row.source AS source, row.target AS target",
        from = from.label(),
        to = to.label()
    )
}

/// `UNWIND ... MATCH ... MERGE` for one edge kind. Rows with a missing
/// endpoint fall out at the `MATCH`.
pub fn edge_merge(kind: EdgeKind) -> String {
    let (from, to) = kind.endpoints();
    let pattern = if kind.is_symmetric() {
        format!("(a)-[r:{}]-(b)", kind.rel_type())
    } else {
        format!("(a)-[r:{}]->(b)", kind.rel_type())
    };
    let on_write = match kind.merge_rule() {
        MergeRule::Overwrite => "ON CREATE SET r.created_at = datetime()".to_string(),
        MergeRule::SeenRange => "ON CREATE SET r.created_at = datetime(),
                       r.first_seen = row.seen,
                       r.last_seen = row.seen
         ON MATCH SET r.first_seen = coalesce(r.first_seen, row.seen),
                      r.last_seen = CASE
                          WHEN row.seen IS NOT NULL AND (r.last_seen IS NULL OR row.seen > r.last_seen)
                          THEN row.seen
                          ELSE r.last_seen
                      END"
            .to_string(),
    };
    format!(
        "UNWIND $rows AS row
         MATCH (a:{from} {{id: row.source}})
         MATCH (b:{to} {{id: row.target}})
         MERGE {pattern}
         {on_write}
         SET r += row.props
         RETURN count(r) AS applied",
        from = from.label(),
        to = to.label(),
    )
}

pub fn count_nodes(kind: NodeKind) -> String {
    format!("MATCH (n:{}) RETURN count(n) AS count", kind.label())
}

pub fn count_edges(kind: EdgeKind) -> String {
    format!("MATCH ()-[r:{}]->() RETURN count(r) AS count", kind.rel_type())
}

pub fn count_connected(kind: NodeKind, edge: EdgeKind) -> String {
    format!(
        "MATCH (n:{}) WHERE EXISTS {{ (n)-[:{}]-() }} RETURN count(n) AS count",
        kind.label(),
        edge.rel_type()
    )
}

/// Nodes of `kind` with `property` set, or equal to `$value` when
/// `match_value`. The property name is spliced in and must come from the
/// kind's attribute list.
pub fn count_with_property(kind: NodeKind, property: &str, match_value: bool) -> String {
    let condition = if match_value {
        format!("n.{} = $value", property)
    } else {
        format!("n.{} IS NOT NULL", property)
    };
    format!(
        "MATCH (n:{}) WHERE {} RETURN count(n) AS count",
        kind.label(),
        condition
    )
}

pub fn to_bolt(value: &AttrValue) -> BoltType {
    match value {
        AttrValue::Null => BoltType::Null(BoltNull),
        AttrValue::Bool(b) => (*b).into(),
        AttrValue::Int(i) => (*i).into(),
        AttrValue::Float(f) => (*f).into(),
        AttrValue::Text(s) => s.clone().into(),
    }
}

fn props(attrs: &Attributes) -> BoltType {
    let map: HashMap<String, BoltType> = attrs
        .iter()
        .map(|(name, value)| (name.clone(), to_bolt(value)))
        .collect();
    map.into()
}

pub fn node_row(node: &NodeUpsert) -> BoltRow {
    let mut row = BoltRow::new();
    row.insert("id".to_string(), node.id.clone().into());
    row.insert("props".to_string(), props(&node.attrs));
    row
}

pub fn edge_row(edge: &EdgeUpsert) -> BoltRow {
    let mut row = BoltRow::new();
    row.insert("source".to_string(), edge.source.clone().into());
    row.insert("target".to_string(), edge.target.clone().into());
    row.insert("props".to_string(), props(&edge.attrs));
    row.insert(
        "seen".to_string(),
        match edge.seen {
            Some(year) => year.into(),
            None => BoltType::Null(BoltNull),
        },
    );
    row
}
