//! Tier 2: edge stages. Every endpoint is a node some Tier 1 stage loads.

use std::collections::BTreeSet;

use citegraph_core::{EdgeKind, EdgeUpsert, UpsertInstruction};
use citegraph_source::{Edge, RowChunks};
use tracing::debug;

use super::{emit_rows, ExtractResult, InstructionSink};
use crate::context::RunContext;

pub fn authored(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    emit_rows(
        ctx.working_set.ids(),
        |ids| ctx.source.authorships(ids),
        sink,
        |row| {
            EdgeUpsert::new(EdgeKind::Authored, row.author_id, row.work_id)
                .with("author_position", row.author_position)
                .with("institution_id", row.institution_id)
                .into()
        },
    )
}

/// One instruction per distinct (author, institution, year) within a read
/// slice; the seen-range merge folds the years into `first_seen`/`last_seen`
/// and absorbs repeats across slices.
pub fn affiliated_with(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    let mut rows = RowChunks::new(ctx.working_set.ids(), |ids| ctx.source.authorships(ids));
    for chunk in rows.by_ref() {
        let distinct: BTreeSet<(String, String, Option<i64>)> = chunk?
            .into_iter()
            .filter_map(|row| {
                row.institution_id
                    .map(|institution| (row.author_id, institution, row.publication_year))
            })
            .collect();
        for (author, institution, year) in distinct {
            sink.emit(
                EdgeUpsert::new(EdgeKind::AffiliatedWith, author, institution)
                    .seen(year)
                    .into(),
            )?;
        }
    }
    Ok(rows.rows_read())
}

pub fn tagged_with(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    emit_rows(
        ctx.working_set.ids(),
        |ids| ctx.source.work_topics(ids),
        sink,
        |row| {
            EdgeUpsert::new(EdgeKind::TaggedWith, row.work_id, row.topic_id)
                .with("score", row.score)
                .into()
        },
    )
}

pub fn published_in(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    emit_rows(
        ctx.working_set.ids(),
        |ids| ctx.source.primary_locations(ids),
        sink,
        |row| {
            EdgeUpsert::new(EdgeKind::PublishedIn, row.work_id, row.source_id)
                .with("is_oa", row.is_oa)
                .with("version", row.version)
                .into()
        },
    )
}

fn citation(edge: &Edge, citation_type: &str) -> UpsertInstruction {
    EdgeUpsert::new(EdgeKind::Cited, edge.source.clone(), edge.target.clone())
        .with("citation_type", citation_type)
        .into()
}

/// Citations from the precomputed partition. Without external works only
/// internal citations load.
pub fn cited(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    let partition = &ctx.partition;
    for edge in &partition.internal {
        sink.emit(citation(edge, "internal"))?;
    }

    if ctx.config.partition.include_external {
        for edge in &partition.outgoing {
            sink.emit(citation(edge, "outgoing"))?;
        }
        for edge in &partition.incoming {
            sink.emit(citation(edge, "incoming"))?;
        }
    }

    Ok(partition.stats().edges)
}

/// Related-work pairs whose both ends are Work nodes of this run.
///
/// Pairs are normalized and deduplicated per read slice; a pair seen again
/// in a later slice merges onto the same undirected edge.
pub fn related_to(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    let mut rows = RowChunks::new(ctx.working_set.ids(), |ids| ctx.source.related_works(ids));
    let mut pairs_emitted = 0usize;
    for chunk in rows.by_ref() {
        let pairs: BTreeSet<(String, String)> = chunk?
            .into_iter()
            .filter(|row| ctx.loads_work(&row.related_work_id))
            .map(|row| {
                let edge = EdgeUpsert::new(EdgeKind::RelatedTo, row.work_id, row.related_work_id);
                (edge.source, edge.target)
            })
            .collect();
        for (a, b) in pairs {
            sink.emit(EdgeUpsert::new(EdgeKind::RelatedTo, a, b).into())?;
            pairs_emitted += 1;
        }
    }
    debug!(rows = rows.rows_read(), pairs = pairs_emitted, "Related works extracted");
    Ok(rows.rows_read())
}
