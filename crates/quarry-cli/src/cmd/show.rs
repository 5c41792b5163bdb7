//! `quarry show`: display one stored document.

use crate::output::{OutputMode, local_time, pretty_kv, pretty_rule, render_mode, report};
use chrono::{DateTime, Utc};
use clap::Args;
use quarry_core::{Document, DocumentId};
use quarry_search::RetrievalService;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Document id, as printed by `quarry upload` or `quarry list`.
    pub id: DocumentId,
}

/// Full document detail as returned in JSON output.
#[derive(Debug, Serialize)]
pub struct ShowDocument {
    pub id: String,
    pub filename: String,
    pub content: String,
    pub content_length: u64,
    pub has_embedding: bool,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Document> for ShowDocument {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id.to_string(),
            has_embedding: doc.has_embedding(),
            filename: doc.name,
            content: doc.content,
            content_length: doc.content_length,
            uploaded_at: doc.uploaded_at,
            updated_at: doc.updated_at,
        }
    }
}

fn show_pretty(d: &ShowDocument, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_kv(w, "id", &d.id)?;
    pretty_kv(w, "filename", &d.filename)?;
    pretty_kv(w, "chars", d.content_length.to_string())?;
    pretty_kv(w, "embedded", if d.has_embedding { "yes" } else { "no" })?;
    pretty_kv(w, "uploaded", local_time(&d.uploaded_at))?;
    if let Some(updated) = &d.updated_at {
        pretty_kv(w, "updated", local_time(updated))?;
    }
    pretty_rule(w)?;
    writeln!(w, "{}", d.content)
}

fn show_text(d: &ShowDocument, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{}  {}  {}", d.id, d.content_length, d.filename)?;
    writeln!(w, "{}", d.content)
}

/// Execute `quarry show <ID>`.
///
/// # Errors
///
/// Returns a [`crate::output::Reported`] failure (exit 3) for an unknown id.
pub fn run_show(
    args: &ShowArgs,
    service: &RetrievalService,
    output: OutputMode,
) -> anyhow::Result<()> {
    let doc = service
        .get_document(args.id)
        .map_err(|err| report(output, &err))?;
    render_mode(output, &ShowDocument::from(doc), show_text, show_pretty)
}
