//! Document discovery and parallel parsing.
//!
//! Walks a directory tree for markdown files and parses them across a
//! worker pool sized to the CPU count. Workers parse into private
//! per-file results; the merge into the shared [`Index`] happens
//! single-threaded afterwards, in document-iteration order, so index
//! insertion order is deterministic regardless of worker timing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::index::Index;
use crate::parser::{self, FileParse};

pub struct ScanResult {
    pub index: Index,
    pub files: usize,
}

/// Parse a directory tree or a single file into an index.
///
/// Directory walks log unreadable files to stderr and continue; a
/// single-file parse propagates its I/O error.
pub fn load_index(root: &Path) -> Result<ScanResult> {
    if root.is_file() {
        let text = fs::read_to_string(root).map_err(|source| Error::ParseFailed {
            path: root.to_path_buf(),
            source,
        })?;
        let mut index = Index::new();
        index.merge(parser::parse_document(root, &text));
        return Ok(ScanResult { index, files: 1 });
    }

    let files = gather_markdown_files(root);
    let parses = parse_files(&files);

    let mut index = Index::new();
    for parse in parses.into_iter().flatten() {
        index.merge(parse);
    }
    Ok(ScanResult {
        index,
        files: files.len(),
    })
}

/// Collect markdown files under `root` in lexical order.
fn gather_markdown_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| parser::is_markdown_file(path))
        .collect()
}

/// Parse files across a worker pool. The returned vector is in input
/// order; unreadable files are logged and left as `None`.
fn parse_files(files: &[PathBuf]) -> Vec<Option<FileParse>> {
    if files.is_empty() {
        return Vec::new();
    }
    let workers = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(files.len());

    let mut parses: Vec<Option<FileParse>> = Vec::with_capacity(files.len());
    parses.resize_with(files.len(), || None);

    thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        for worker in 0..workers {
            let tx = tx.clone();
            scope.spawn(move || {
                for (i, path) in files.iter().enumerate().skip(worker).step_by(workers) {
                    let parsed = fs::read_to_string(path)
                        .map(|text| parser::parse_document(path, &text))
                        .map_err(|err| err.to_string());
                    if tx.send((i, parsed)).is_err() {
                        return;
                    }
                }
            });
        }
        drop(tx);

        for (i, parsed) in rx {
            match parsed {
                Ok(parse) => parses[i] = Some(parse),
                Err(err) => {
                    eprintln!("[cheatmd][warn] {}: {}", files[i].display(), err);
                }
            }
        }
    });

    parses
}
