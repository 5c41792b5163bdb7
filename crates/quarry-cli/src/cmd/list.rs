//! `quarry list`: newest documents first.

use crate::output::{OutputMode, local_time, pretty_section, render_mode, report};
use clap::Args;
use quarry_search::RetrievalService;
use quarry_search::service::ListResponse;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of documents to show (capped at 100).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

fn list_text(r: &ListResponse, w: &mut dyn Write) -> std::io::Result<()> {
    if !r.attachments.is_empty() {
        writeln!(w, "ID  CHARS  EMBEDDED  UPLOADED  FILENAME")?;
    }
    for a in &r.attachments {
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            a.id,
            a.content_length,
            a.has_embedding,
            a.uploaded_at.to_rfc3339(),
            a.filename
        )?;
    }
    Ok(())
}

fn list_pretty(r: &ListResponse, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("{} document(s)", r.total))?;
    for a in &r.attachments {
        let marker = if a.has_embedding { "●" } else { "○" };
        writeln!(
            w,
            "{marker} #{:<6} {:>8} chars  {}  {}",
            a.id,
            a.content_length,
            local_time(&a.uploaded_at),
            a.filename
        )?;
    }
    Ok(())
}

/// Execute `quarry list`.
///
/// # Errors
///
/// Returns a [`crate::output::Reported`] failure on a storage error.
pub fn run_list(
    args: &ListArgs,
    service: &RetrievalService,
    output: OutputMode,
) -> anyhow::Result<()> {
    let listing = service
        .list_documents(args.limit)
        .map_err(|err| report(output, &err))?;
    render_mode(output, &listing, list_text, list_pretty)
}
