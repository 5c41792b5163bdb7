//! `quarry upload`: ingest one or more text files.
//!
//! A single file goes through the one-document path; several files are
//! embedded with one provider call and stored all-or-nothing.

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode, report};
use clap::Args;
use quarry_core::error::RetrievalError;
use quarry_search::service::UploadReceipt;
use quarry_search::{RetrievalService, SourceFile};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Files to ingest. The stored name is the file name without directories.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct BatchReceipt {
    uploaded: Vec<UploadReceipt>,
    total: usize,
}

fn read_source(path: &Path) -> Result<SourceFile, RetrievalError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let bytes = std::fs::read(path).map_err(|err| {
        RetrievalError::InvalidInput(format!("cannot read {}: {err}", path.display()))
    })?;
    Ok(SourceFile::new(name, bytes))
}

fn receipt_text(r: &UploadReceipt, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{}  {}  {}", r.file_id, r.content_length, r.filename)
}

fn receipt_pretty(r: &UploadReceipt, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{}", r.message)?;
    pretty_kv(w, "id", r.file_id.to_string())?;
    pretty_kv(w, "chars", r.content_length.to_string())
}

/// Execute `quarry upload <FILE>...`.
///
/// # Errors
///
/// Returns a [`crate::output::Reported`] failure when a file cannot be read
/// or ingestion fails, or an error if output rendering fails.
pub fn run_upload(
    args: &UploadArgs,
    service: &RetrievalService,
    output: OutputMode,
) -> anyhow::Result<()> {
    let sources = args
        .files
        .iter()
        .map(|path| read_source(path))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| report(output, &err))?;

    if let [single] = sources.as_slice() {
        let receipt = service
            .upload_document(&single.name, &single.bytes)
            .map_err(|err| report(output, &err))?;
        return render_mode(output, &receipt, receipt_text, receipt_pretty);
    }

    let uploaded = service
        .upload_documents(&sources)
        .map_err(|err| report(output, &err))?;
    let batch = BatchReceipt {
        total: uploaded.len(),
        uploaded,
    };
    render_mode(
        output,
        &batch,
        |b, w| {
            for r in &b.uploaded {
                receipt_text(r, w)?;
            }
            Ok(())
        },
        |b, w| {
            pretty_section(w, &format!("Uploaded {} documents", b.total))?;
            for r in &b.uploaded {
                writeln!(w, "  #{:<6} {:>8} chars  {}", r.file_id, r.content_length, r.filename)?;
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_source_uses_bare_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let source = read_source(&path).unwrap();
        assert_eq!(source.name, "notes.txt");
        assert_eq!(source.bytes, b"hello");
    }

    #[test]
    fn missing_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_source(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidInput(_)));
    }
}
