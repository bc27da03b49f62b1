//! Snippet filtering for phase-1 selection.
//!
//! The query is trimmed, lower-cased, and split on whitespace; a snippet
//! matches when every word is a substring of at least one searchable
//! field. Search text is lower-cased once per snippet at build time so
//! keystroke-rate filtering stays cheap for large indexes.

use std::path::Path;

use crate::types::Snippet;

/// Result cap, bounding render latency for huge indexes.
pub const FILTER_CAP: usize = 1000;

/// Precomputed display and search fields for one snippet.
#[derive(Debug, Clone)]
pub struct Row {
    /// Leaf folder of the source file.
    pub folder: String,
    /// File stem without extension.
    pub stem: String,
    haystacks: [String; 5],
}

impl Row {
    pub fn new(snippet: &Snippet) -> Row {
        let folder = snippet
            .file
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = snippet
            .file
            .file_stem()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let haystacks = [
            folder.to_lowercase(),
            stem.to_lowercase(),
            snippet.header.to_lowercase(),
            snippet.description.to_lowercase(),
            snippet.command.to_lowercase(),
        ];
        Row {
            folder,
            stem,
            haystacks,
        }
    }

    fn matches(&self, words: &[&str]) -> bool {
        words
            .iter()
            .all(|word| self.haystacks.iter().any(|hay| hay.contains(word)))
    }
}

pub fn build_rows(snippets: &[Snippet]) -> Vec<Row> {
    snippets.iter().map(Row::new).collect()
}

/// Indices of rows matching `query`, in index order, capped at `cap`.
pub fn filter(rows: &[Row], query: &str, cap: usize) -> Vec<usize> {
    let query = query.trim().to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();

    let mut matched = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        if words.is_empty() || row.matches(&words) {
            matched.push(i);
            if matched.len() >= cap {
                break;
            }
        }
    }
    matched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(file: &str, header: &str, desc: &str, command: &str) -> Snippet {
        let mut s = Snippet::new(file, header);
        s.description = desc.to_string();
        s.command = command.to_string();
        s
    }

    fn rows() -> Vec<Row> {
        build_rows(&[
            snippet("notes/git/clone.md", "Clone a repo", "", "git clone $url"),
            snippet("notes/docker/run.md", "Run container", "daemon mode", "docker run -d $img"),
            snippet("notes/git/push.md", "Push branch", "", "git push origin $branch"),
        ])
    }

    #[test]
    fn test_empty_query_matches_all() {
        let rows = rows();
        assert_eq!(filter(&rows, "", FILTER_CAP), vec![0, 1, 2]);
        assert_eq!(filter(&rows, "   ", FILTER_CAP), vec![0, 1, 2]);
    }

    #[test]
    fn test_words_match_any_field() {
        let rows = rows();
        // folder name
        assert_eq!(filter(&rows, "docker", FILTER_CAP), vec![1]);
        // header, case-insensitive
        assert_eq!(filter(&rows, "CLONE", FILTER_CAP), vec![0]);
        // description
        assert_eq!(filter(&rows, "daemon", FILTER_CAP), vec![1]);
        // command
        assert_eq!(filter(&rows, "origin", FILTER_CAP), vec![2]);
    }

    #[test]
    fn test_all_words_must_match() {
        let rows = rows();
        assert_eq!(filter(&rows, "git push", FILTER_CAP), vec![2]);
        assert!(filter(&rows, "git daemon", FILTER_CAP).is_empty());
    }

    #[test]
    fn test_adding_word_never_grows_result() {
        let rows = rows();
        let base = filter(&rows, "git", FILTER_CAP);
        let narrowed = filter(&rows, "git clone", FILTER_CAP);
        assert!(narrowed.iter().all(|i| base.contains(i)));
        assert!(narrowed.len() <= base.len());
    }

    #[test]
    fn test_cap_bounds_results() {
        let snippets: Vec<Snippet> = (0..20)
            .map(|i| snippet(&format!("n/{i}.md"), "same header", "", "cmd"))
            .collect();
        let rows = build_rows(&snippets);
        assert_eq!(filter(&rows, "same", 5).len(), 5);
    }

    #[test]
    fn test_row_display_fields() {
        let row = Row::new(&snippet("notes/git/clone.md", "h", "", "c"));
        assert_eq!(row.folder, "git");
        assert_eq!(row.stem, "clone");
    }
}
