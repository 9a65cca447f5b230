//! Tier 1: node stages.

use citegraph_core::{NodeKind, NodeUpsert, UpsertInstruction};
use citegraph_source::queries::entities::{AuthorRow, InstitutionRow, SourceRow, TopicRow, WorkRow};
use citegraph_source::RowChunks;
use tracing::debug;

use super::{emit_rows, referenced_ids, ExtractResult, InstructionSink};
use crate::context::RunContext;

fn work_node(row: WorkRow, in_scope: bool) -> UpsertInstruction {
    NodeUpsert::new(NodeKind::Work, row.id)
        .with("doi", row.doi)
        .with("title", row.title)
        .with("display_name", row.display_name)
        .with("publication_year", row.publication_year)
        .with("publication_date", row.publication_date)
        .with("type", row.work_type)
        .with("cited_by_count", row.cited_by_count)
        .with("is_retracted", row.is_retracted)
        .with("is_paratext", row.is_paratext)
        .with("language", row.language)
        .with("in_scope", in_scope)
        .into()
}

fn bare_work(id: &str) -> UpsertInstruction {
    NodeUpsert::new(NodeKind::Work, id).with("in_scope", false).into()
}

/// In-scope works, then the external works citations pull in.
///
/// An external work missing from the mirror still gets a bare node so its
/// citation edges have an endpoint.
pub fn works(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    let mut rows_read = emit_rows(
        ctx.working_set.ids(),
        |ids| ctx.source.works(ids),
        sink,
        |row| work_node(row, true),
    )?;

    let external = ctx.external_works();
    if external.is_empty() {
        return Ok(rows_read);
    }

    // Both the id list and each slice's rows are sorted, so a merge walk
    // finds the ids with no row.
    let mut pending = external.iter().peekable();
    let mut bare = 0usize;
    let mut rows = RowChunks::new(&external, |ids| ctx.source.works(ids));
    for chunk in rows.by_ref() {
        for row in chunk? {
            while let Some(id) = pending.next_if(|id| **id < row.id) {
                sink.emit(bare_work(id))?;
                bare += 1;
            }
            pending.next_if(|id| **id == row.id);
            sink.emit(work_node(row, false))?;
        }
    }
    for id in pending {
        sink.emit(bare_work(id))?;
        bare += 1;
    }
    rows_read += rows.rows_read();

    debug!(external = external.len(), bare, "External works extracted");
    Ok(rows_read)
}

fn author_node(row: AuthorRow) -> UpsertInstruction {
    NodeUpsert::new(NodeKind::Author, row.id)
        .with("orcid", row.orcid)
        .with("display_name", row.display_name)
        .with("display_name_alternatives", row.display_name_alternatives)
        .with("works_count", row.works_count)
        .with("cited_by_count", row.cited_by_count)
        .into()
}

pub fn authors(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    let (ids, links) = referenced_ids(
        ctx.working_set.ids(),
        |ids| ctx.source.authorships(ids),
        |a| Some(a.author_id),
    )?;
    let rows = emit_rows(&ids, |ids| ctx.source.authors(ids), sink, author_node)?;
    Ok(links + rows)
}

fn institution_node(row: InstitutionRow) -> UpsertInstruction {
    NodeUpsert::new(NodeKind::Institution, row.id)
        .with("ror", row.ror)
        .with("display_name", row.display_name)
        .with("country_code", row.country_code)
        .with("type", row.institution_type)
        .with("homepage_url", row.homepage_url)
        .with("works_count", row.works_count)
        .with("cited_by_count", row.cited_by_count)
        .into()
}

pub fn institutions(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    let (ids, links) = referenced_ids(
        ctx.working_set.ids(),
        |ids| ctx.source.authorships(ids),
        |a| a.institution_id,
    )?;
    let rows = emit_rows(&ids, |ids| ctx.source.institutions(ids), sink, institution_node)?;
    Ok(links + rows)
}

fn topic_node(row: TopicRow) -> UpsertInstruction {
    NodeUpsert::new(NodeKind::Topic, row.id)
        .with("display_name", row.display_name)
        .with("subfield_id", row.subfield_id)
        .with("subfield_display_name", row.subfield_display_name)
        .with("field_id", row.field_id)
        .with("field_display_name", row.field_display_name)
        .with("domain_id", row.domain_id)
        .with("domain_display_name", row.domain_display_name)
        .with("description", row.description)
        .with("keywords", row.keywords)
        .with("works_count", row.works_count)
        .with("cited_by_count", row.cited_by_count)
        .into()
}

pub fn topics(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    let (ids, links) = referenced_ids(
        ctx.working_set.ids(),
        |ids| ctx.source.work_topics(ids),
        |t| Some(t.topic_id),
    )?;
    let rows = emit_rows(&ids, |ids| ctx.source.topics(ids), sink, topic_node)?;
    Ok(links + rows)
}

fn source_node(row: SourceRow) -> UpsertInstruction {
    NodeUpsert::new(NodeKind::Source, row.id)
        .with("issn_l", row.issn_l)
        .with("issn", row.issn)
        .with("display_name", row.display_name)
        .with("publisher", row.publisher)
        .with("works_count", row.works_count)
        .with("cited_by_count", row.cited_by_count)
        .with("is_oa", row.is_oa)
        .with("is_in_doaj", row.is_in_doaj)
        .with("homepage_url", row.homepage_url)
        .into()
}

pub fn sources(ctx: &RunContext, sink: &mut dyn InstructionSink) -> ExtractResult<usize> {
    let (ids, links) = referenced_ids(
        ctx.working_set.ids(),
        |ids| ctx.source.primary_locations(ids),
        |l| Some(l.source_id),
    )?;
    let rows = emit_rows(&ids, |ids| ctx.source.sources(ids), sink, source_node)?;
    Ok(links + rows)
}
