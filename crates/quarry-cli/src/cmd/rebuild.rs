//! `quarry rebuild`: regenerate the lexical index from stored documents.

use crate::output::{OutputMode, pretty_kv, render_mode, report};
use quarry_search::RetrievalService;

/// Execute `quarry rebuild`.
///
/// # Errors
///
/// Returns a [`crate::output::Reported`] failure on a storage error.
pub fn run_rebuild(service: &RetrievalService, output: OutputMode) -> anyhow::Result<()> {
    let report_body = service.rebuild_index().map_err(|err| report(output, &err))?;
    render_mode(
        output,
        &report_body,
        |r, w| writeln!(w, "rebuilt {} documents in_sync={}", r.documents, r.in_sync),
        |r, w| {
            writeln!(w, "✓ lexical index rebuilt")?;
            pretty_kv(w, "documents", r.documents.to_string())?;
            pretty_kv(w, "in sync", if r.in_sync { "yes" } else { "no" })
        },
    )
}
