//! `quarry search`: run a keyword, semantic or hybrid query.

use crate::output::{OutputMode, pretty_section, render_mode, report};
use clap::Args;
use quarry_core::SearchMode;
use quarry_search::RetrievalService;
use quarry_search::service::{SearchHit, SearchResponse};
use std::io::Write;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query text.
    pub query: String,

    /// Retrieval mode: keyword, semantic or hybrid.
    #[arg(short, long, default_value = "hybrid")]
    pub mode: String,

    /// Maximum number of results (1-100). Defaults to `[search] default_limit`.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

const fn rank_score(mode: SearchMode, hit: &SearchHit) -> f64 {
    match mode {
        SearchMode::Keyword => hit.scores.keyword,
        SearchMode::Semantic => hit.scores.semantic,
        SearchMode::Hybrid => hit.scores.hybrid,
    }
}

fn search_text(r: &SearchResponse, w: &mut dyn Write) -> std::io::Result<()> {
    for hit in &r.results {
        writeln!(
            w,
            "{}  {:.4}  {}",
            hit.id,
            rank_score(r.mode, hit),
            hit.title
        )?;
    }
    Ok(())
}

fn search_pretty(r: &SearchResponse, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(
        w,
        &format!(
            "{} result(s) for \"{}\" ({})",
            r.total_results, r.query, r.mode
        ),
    )?;
    if r.results.is_empty() {
        writeln!(w, "No matching documents.")?;
        return Ok(());
    }
    for (rank, hit) in r.results.iter().enumerate() {
        writeln!(w, "{:>2}. {}  [#{}]", rank + 1, hit.title, hit.id)?;
        writeln!(
            w,
            "    hybrid {:.4}  keyword {:.4}  semantic {:.4}",
            hit.scores.hybrid, hit.scores.keyword, hit.scores.semantic
        )?;
        writeln!(w, "    {}", hit.snippet.replace('\n', " "))?;
    }
    Ok(())
}

/// Execute `quarry search <QUERY>`.
///
/// # Errors
///
/// Returns a [`crate::output::Reported`] failure for an empty query, an
/// unknown mode or a provider/storage failure.
pub fn run_search(
    args: &SearchArgs,
    service: &RetrievalService,
    output: OutputMode,
) -> anyhow::Result<()> {
    let response = match args.limit {
        Some(limit) => service.search_with_limit(&args.query, &args.mode, limit),
        None => service.search(&args.query, &args.mode),
    }
    .map_err(|err| report(output, &err))?;

    render_mode(output, &response, search_text, search_pretty)
}
