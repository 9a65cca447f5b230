//! Stage extraction: functions from the run context to an ordered stream of
//! upsert instructions. Nothing here touches the graph.
//!
//! Source rows are read one id slice at a time and turned into instructions
//! as they arrive, so a stage never holds more than one slice of rows.

pub mod edges;
pub mod nodes;

use std::collections::BTreeSet;

use citegraph_core::UpsertInstruction;
use citegraph_source::{RowChunks, SourceError, SourceResult};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::context::RunContext;
use crate::stage::StageId;

/// Why a stage stopped producing instructions.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("the loader stopped accepting instructions")]
    Closed,
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Receives a stage's instructions in order.
pub trait InstructionSink {
    fn emit(&mut self, instruction: UpsertInstruction) -> ExtractResult<()>;
}

/// Blocks while the channel is full; call from the blocking pool only.
impl InstructionSink for mpsc::Sender<UpsertInstruction> {
    fn emit(&mut self, instruction: UpsertInstruction) -> ExtractResult<()> {
        self.blocking_send(instruction)
            .map_err(|_| ExtractError::Closed)
    }
}

/// How many source rows a stage read and instructions it produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub rows_read: usize,
    pub instructions: usize,
}

struct Counted<'a> {
    inner: &'a mut dyn InstructionSink,
    emitted: usize,
}

impl InstructionSink for Counted<'_> {
    fn emit(&mut self, instruction: UpsertInstruction) -> ExtractResult<()> {
        self.inner.emit(instruction)?;
        self.emitted += 1;
        Ok(())
    }
}

/// Run the extraction for `stage`, handing every instruction to `sink`.
pub fn extract(
    stage: StageId,
    ctx: &RunContext,
    sink: &mut dyn InstructionSink,
) -> ExtractResult<StageStats> {
    let mut counted = Counted {
        inner: sink,
        emitted: 0,
    };
    let sink = &mut counted;
    let rows_read = match stage {
        StageId::Works => nodes::works(ctx, sink),
        StageId::Authors => nodes::authors(ctx, sink),
        StageId::Institutions => nodes::institutions(ctx, sink),
        StageId::Topics => nodes::topics(ctx, sink),
        StageId::Sources => nodes::sources(ctx, sink),
        StageId::Authored => edges::authored(ctx, sink),
        StageId::AffiliatedWith => edges::affiliated_with(ctx, sink),
        StageId::TaggedWith => edges::tagged_with(ctx, sink),
        StageId::PublishedIn => edges::published_in(ctx, sink),
        StageId::Cited => edges::cited(ctx, sink),
        StageId::RelatedTo => edges::related_to(ctx, sink),
    }?;

    Ok(StageStats {
        rows_read,
        instructions: counted.emitted,
    })
}

/// Stream `fetch` over `ids` and emit one instruction per row. Returns the
/// number of rows read.
pub(crate) fn emit_rows<T, F, M>(
    ids: &[String],
    fetch: F,
    sink: &mut dyn InstructionSink,
    mut to_instruction: M,
) -> ExtractResult<usize>
where
    F: FnMut(&[String]) -> SourceResult<Vec<T>>,
    M: FnMut(T) -> UpsertInstruction,
{
    let mut rows = RowChunks::new(ids, fetch);
    for chunk in rows.by_ref() {
        for row in chunk? {
            sink.emit(to_instruction(row))?;
        }
    }
    Ok(rows.rows_read())
}

/// Sorted distinct keys of the link rows `fetch` returns for `ids`, plus
/// the number of link rows read.
pub(crate) fn referenced_ids<T, F, K>(
    ids: &[String],
    fetch: F,
    mut key: K,
) -> ExtractResult<(Vec<String>, usize)>
where
    F: FnMut(&[String]) -> SourceResult<Vec<T>>,
    K: FnMut(T) -> Option<String>,
{
    let mut distinct = BTreeSet::new();
    let mut rows = RowChunks::new(ids, fetch);
    for chunk in rows.by_ref() {
        distinct.extend(chunk?.into_iter().filter_map(&mut key));
    }
    Ok((distinct.into_iter().collect(), rows.rows_read()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use citegraph_core::{AttrValue, EdgeKind, RunConfig};
    use citegraph_source::{fixture, SqliteSource};

    impl InstructionSink for Vec<UpsertInstruction> {
        fn emit(&mut self, instruction: UpsertInstruction) -> ExtractResult<()> {
            self.push(instruction);
            Ok(())
        }
    }

    struct StageOutput {
        instructions: Vec<UpsertInstruction>,
        rows_read: usize,
    }

    fn run(stage: StageId, ctx: &RunContext) -> StageOutput {
        let mut instructions = Vec::new();
        let stats = extract(stage, ctx, &mut instructions).unwrap();
        assert_eq!(stats.instructions, instructions.len());
        StageOutput {
            instructions,
            rows_read: stats.rows_read,
        }
    }

    fn context(include_external: bool) -> RunContext {
        let mut config = RunConfig::default();
        config.scope = fixture::scope();
        config.partition.include_external = include_external;
        let source = Arc::new(SqliteSource::new(fixture::seeded_pool().unwrap()));
        RunContext::prepare(source, Arc::new(config)).unwrap()
    }

    fn edge_pairs(output: &StageOutput) -> Vec<(String, String)> {
        output
            .instructions
            .iter()
            .filter_map(|i| match i {
                UpsertInstruction::Edge(e) => Some((e.source.clone(), e.target.clone())),
                UpsertInstruction::Node(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_works_include_external_works() {
        let ctx = context(true);
        let output = run(StageId::Works, &ctx);
        assert_eq!(output.instructions.len(), 7);

        let external: Vec<&str> = output
            .instructions
            .iter()
            .filter_map(|i| match i {
                UpsertInstruction::Node(n) if n.attrs.get("in_scope") == Some(&AttrValue::Bool(false)) => {
                    Some(n.id.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(external, vec!["W6", "W8"]);
    }

    #[test]
    fn test_works_without_external() {
        let ctx = context(false);
        assert_eq!(run(StageId::Works, &ctx).instructions.len(), 5);
        assert_eq!(run(StageId::Cited, &ctx).instructions.len(), 1);
    }

    #[test]
    fn test_node_stages_deduplicate_referenced_ids() {
        let ctx = context(true);
        assert_eq!(run(StageId::Authors, &ctx).instructions.len(), 3);
        assert_eq!(run(StageId::Institutions, &ctx).instructions.len(), 2);
        assert_eq!(run(StageId::Topics, &ctx).instructions.len(), 2);
        assert_eq!(run(StageId::Sources, &ctx).instructions.len(), 1);
    }

    #[test]
    fn test_cited_tags_citation_type() {
        let ctx = context(true);
        let output = run(StageId::Cited, &ctx);

        let types: Vec<(String, String, String)> = output
            .instructions
            .iter()
            .filter_map(|i| match i {
                UpsertInstruction::Edge(e) => Some((
                    e.source.clone(),
                    e.target.clone(),
                    e.attrs.get("citation_type")?.as_str()?.to_string(),
                )),
                UpsertInstruction::Node(_) => None,
            })
            .collect();
        let expected: Vec<(String, String, String)> = [
            ("W1", "W2", "internal"),
            ("W1", "W6", "outgoing"),
            ("W2", "W6", "outgoing"),
            ("W3", "W6", "outgoing"),
            ("W8", "W3", "incoming"),
        ]
        .iter()
        .map(|(a, b, t)| (a.to_string(), b.to_string(), t.to_string()))
        .collect();
        assert_eq!(types, expected);
    }

    #[test]
    fn test_affiliations_collapse_per_year() {
        let ctx = context(true);
        let output = run(StageId::AffiliatedWith, &ctx);
        assert_eq!(output.rows_read, 6);
        assert_eq!(output.instructions.len(), 4);
        assert!(output.instructions.iter().all(|i| matches!(
            i,
            UpsertInstruction::Edge(e) if e.kind == EdgeKind::AffiliatedWith && e.seen == Some(2024)
        )));
    }

    #[test]
    fn test_related_pairs_are_normalized_and_scoped() {
        let ctx = context(true);
        let output = run(StageId::RelatedTo, &ctx);
        assert_eq!(output.rows_read, 3);
        assert_eq!(edge_pairs(&output), vec![("W1".to_string(), "W2".to_string())]);
    }

    #[test]
    fn test_link_stages() {
        let ctx = context(true);
        assert_eq!(run(StageId::Authored, &ctx).instructions.len(), 6);
        assert_eq!(run(StageId::TaggedWith, &ctx).instructions.len(), 6);
        assert_eq!(run(StageId::PublishedIn, &ctx).instructions.len(), 4);
    }

    #[test]
    fn test_node_stages_only_emit_schema_attributes() {
        let ctx = context(true);
        for stage in StageId::node_stages() {
            for instruction in run(stage, &ctx).instructions {
                let UpsertInstruction::Node(node) = instruction else {
                    panic!("{stage} emitted an edge");
                };
                let allowed = node.kind.attribute_names();
                for name in node.attrs.keys() {
                    assert!(allowed.contains(&name.as_str()), "{} carries {}", node.kind, name);
                }
            }
        }
    }

    #[test]
    fn test_extraction_stops_when_the_receiver_is_gone() {
        let ctx = context(true);
        let (mut sender, receiver) = mpsc::channel::<UpsertInstruction>(1);
        drop(receiver);

        let err = extract(StageId::Authored, &ctx, &mut sender).unwrap_err();
        assert!(matches!(err, ExtractError::Closed));
    }
}
