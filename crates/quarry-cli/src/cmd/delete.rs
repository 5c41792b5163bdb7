//! `quarry delete`: remove a document and its index entries.

use crate::output::{OutputMode, render_mode, report};
use clap::Args;
use quarry_core::DocumentId;
use quarry_search::RetrievalService;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Document id to delete.
    pub id: DocumentId,
}

/// Execute `quarry delete <ID>`.
///
/// # Errors
///
/// Returns a [`crate::output::Reported`] failure (exit 3) for an unknown id.
pub fn run_delete(
    args: &DeleteArgs,
    service: &RetrievalService,
    output: OutputMode,
) -> anyhow::Result<()> {
    let receipt = service
        .delete_document(args.id)
        .map_err(|err| report(output, &err))?;
    render_mode(
        output,
        &receipt,
        |r, w| writeln!(w, "{}", r.message),
        |r, w| writeln!(w, "✓ {}", r.message),
    )
}
