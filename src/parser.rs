//! Markdown document parser.
//!
//! A line-oriented state machine extracts snippets and module
//! declarations from one document, independent of all other files. The
//! grammar it recognises:
//!
//! - `#`..`######` headers open a new section; on section change, code
//!   blocks from the previous section that never got an annotation are
//!   flushed as header-only snippets when their language looks like
//!   shell.
//! - Fenced code blocks (``` with an optional language token and an
//!   optional `title:"..."`) accumulate verbatim until the closing
//!   fence.
//! - `<!-- cheat ... -->` on one line, or a `<!-- cheat` ... `-->`
//!   block, attaches annotation DSL to the most recent pending code
//!   block. A block with no pending code block is a standalone module
//!   declaration (kept only when it declares `export`).
//!
//! Syntactic noise is tolerated: annotation lines that match nothing
//! are skipped silently.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Module, Snippet, VarDef, VarSource};

static HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());
static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^```(\w*)(?:\s+title:"([^"]*)")?\s*$"#).unwrap());
static CHEAT_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^<!--\s*cheat\s*$").unwrap());
static CHEAT_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-->\s*$").unwrap());
static CHEAT_SINGLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<!--\s*cheat\s*(.*?)\s*-->$").unwrap());
static DSL_EXPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^export\s+(\S+)$").unwrap());
static DSL_IMPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^import\s+(\S+)$").unwrap());
static DSL_VAR_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^var\s+(\w+)\s*:=\s*(.+)$").unwrap());
static DSL_VAR_SHELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^var\s+(\w+)\s*=\s*(.+)$").unwrap());
static DSL_VAR_PROMPT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^var\s+(\w+)\s*$").unwrap());
static DSL_IF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^if\s+(.+)$").unwrap());
static DSL_FI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^fi$").unwrap());

/// Everything one document contributes to the index, in document order.
#[derive(Debug, Default)]
pub struct FileParse {
    pub snippets: Vec<Snippet>,
    pub modules: Vec<Module>,
}

/// Languages never treated as shell for header-only flushing. Everything
/// else, including an empty or unknown language token, is permissively
/// treated as shell.
const NON_SHELL_LANGUAGES: &[&str] = &["mermaid", "dot", "chart"];

pub fn is_shell_language(lang: &str) -> bool {
    let lang = lang.to_lowercase();
    !NON_SHELL_LANGUAGES.contains(&lang.as_str())
}

pub fn is_markdown_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

#[derive(Debug)]
struct CodeBlock {
    lang: String,
    content: String,
    description: String,
}

#[derive(Debug, Default)]
struct ParseState {
    header: String,
    in_code: bool,
    code_lang: String,
    code_desc: String,
    code_lines: Vec<String>,
    in_annotation: bool,
    annotation_lines: Vec<String>,
    pending: Vec<CodeBlock>,
}

/// Parse one document into snippets and modules.
pub fn parse_document(path: &Path, text: &str) -> FileParse {
    let mut out = FileParse::default();
    let mut state = ParseState::default();

    for line in text.lines() {
        parse_line(path, line, &mut state, &mut out);
    }
    flush_pending(path, &state.header, std::mem::take(&mut state.pending), &mut out);

    out
}

fn parse_line(path: &Path, line: &str, s: &mut ParseState, out: &mut FileParse) {
    if !s.in_code && !s.in_annotation {
        if let Some(caps) = HEADER.captures(line) {
            flush_pending(path, &s.header, std::mem::take(&mut s.pending), out);
            s.header = caps[2].to_string();
            return;
        }
    }

    if !s.in_code {
        if let Some(caps) = CHEAT_SINGLE.captures(line) {
            attach_to_pending(path, s, &caps[1], out);
            return;
        }
        if !s.in_annotation && CHEAT_OPEN.is_match(line) {
            s.in_annotation = true;
            s.annotation_lines.clear();
            return;
        }
    }

    if s.in_annotation {
        if CHEAT_CLOSE.is_match(line) {
            s.in_annotation = false;
            let content = std::mem::take(&mut s.annotation_lines).join("\n");
            close_annotation_block(path, s, &content, out);
        } else {
            s.annotation_lines.push(line.to_string());
        }
        return;
    }

    if !s.in_code {
        if let Some(caps) = FENCE_OPEN.captures(line) {
            s.in_code = true;
            s.code_lang = caps[1].to_string();
            s.code_desc = caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default();
            s.code_lines.clear();
        }
        return;
    }

    if line == "```" {
        s.in_code = false;
        let content = s.code_lines.join("\n").trim().to_string();
        if !content.is_empty() {
            s.pending.push(CodeBlock {
                lang: std::mem::take(&mut s.code_lang),
                content,
                description: std::mem::take(&mut s.code_desc),
            });
        }
        return;
    }

    s.code_lines.push(line.to_string());
}

/// Attach annotation text to the most recent pending code block. With
/// nothing pending the annotation is dropped; only the block form may
/// declare a standalone module.
fn attach_to_pending(path: &Path, s: &mut ParseState, annotation: &str, out: &mut FileParse) {
    let Some(block) = s.pending.pop() else {
        return;
    };
    let snippet = create_snippet(
        path,
        &s.header,
        &block.description,
        &block.content,
        Some(annotation),
    );
    if let Some(module) = Module::from_snippet(&snippet) {
        out.modules.push(module);
    }
    out.snippets.push(snippet);
}

/// A closed `<!-- cheat` ... `-->` block attaches to the most recent
/// pending code block; with none pending it is a standalone module
/// declaration, kept only when it declares `export`.
fn close_annotation_block(path: &Path, s: &mut ParseState, annotation: &str, out: &mut FileParse) {
    if !s.pending.is_empty() {
        attach_to_pending(path, s, annotation, out);
        return;
    }
    let snippet = create_snippet(path, &s.header, "", "", Some(annotation));
    if let Some(module) = Module::from_snippet(&snippet) {
        out.modules.push(module);
    }
}

/// Flush code blocks that never received an annotation as header-only
/// snippets, provided the language is shell-like.
fn flush_pending(path: &Path, header: &str, blocks: Vec<CodeBlock>, out: &mut FileParse) {
    for block in blocks {
        if is_shell_language(&block.lang) && !block.content.is_empty() {
            out.snippets.push(create_snippet(
                path,
                header,
                &block.description,
                &block.content,
                None,
            ));
        }
    }
}

fn create_snippet(
    path: &Path,
    header: &str,
    description: &str,
    command: &str,
    annotation: Option<&str>,
) -> Snippet {
    let mut snippet = Snippet::new(path, header);
    snippet.description = description.trim().to_string();
    snippet.command = command.to_string();
    snippet.has_annotation_block = annotation.is_some();
    snippet.tags = extract_tags(path, header);
    if let Some(annotation) = annotation {
        parse_annotation_dsl(&mut snippet, annotation);
    }
    snippet
}

/// Parse the annotation DSL. An `if <expr>` opens a condition that
/// applies to following declarations until `fi`; blocks do not nest, an
/// inner `if` simply replaces the current condition.
fn parse_annotation_dsl(snippet: &mut Snippet, content: &str) {
    let lines = join_continuation_lines(content.lines());
    let mut condition: Option<String> = None;

    for raw in &lines {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(caps) = DSL_IF.captures(line) {
            condition = Some(caps[1].trim().to_string());
            continue;
        }
        if DSL_FI.is_match(line) {
            condition = None;
            continue;
        }
        if let Some(caps) = DSL_EXPORT.captures(line) {
            snippet.export = Some(caps[1].to_string());
            continue;
        }
        if let Some(caps) = DSL_IMPORT.captures(line) {
            snippet.imports.push(caps[1].to_string());
            continue;
        }
        // `:=` first so a literal never parses as shell with a stray colon.
        if let Some(caps) = DSL_VAR_LITERAL.captures(line) {
            snippet
                .vars
                .push(parse_var_def(&caps[1], &caps[2], true, condition.clone()));
            continue;
        }
        if let Some(caps) = DSL_VAR_SHELL.captures(line) {
            snippet
                .vars
                .push(parse_var_def(&caps[1], &caps[2], false, condition.clone()));
            continue;
        }
        if let Some(caps) = DSL_VAR_PROMPT.captures(line) {
            snippet.vars.push(VarDef {
                name: caps[1].to_string(),
                source: VarSource::Prompt,
                args: String::new(),
                condition: condition.clone(),
            });
        }
    }
}

/// Split a definition body on the first `---` into value and selector
/// arguments.
fn parse_var_def(name: &str, value: &str, literal: bool, condition: Option<String>) -> VarDef {
    let (body, args) = match value.find("---") {
        Some(idx) => (value[..idx].trim(), value[idx + 3..].trim()),
        None => (value.trim(), ""),
    };
    let source = if literal {
        VarSource::Literal(body.to_string())
    } else {
        VarSource::Shell(body.to_string())
    };
    VarDef {
        name: name.to_string(),
        source,
        args: args.to_string(),
        condition,
    }
}

/// Join lines whose right-trimmed form ends in `\` with the next line.
fn join_continuation_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    for line in lines {
        let trimmed = line.trim_end_matches([' ', '\t']);
        if let Some(stripped) = trimmed.strip_suffix('\\') {
            current.push_str(stripped);
        } else {
            current.push_str(line);
            result.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        result.push(current);
    }
    result
}

/// Tags come from the lower-cased directory path segments plus the
/// header's `prefix:` segment when present.
fn extract_tags(path: &Path, header: &str) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(dir) = path.parent() {
        for part in dir.components() {
            let part = part.as_os_str().to_string_lossy();
            if !part.is_empty() && part != "." && part != "/" {
                tags.push(part.to_lowercase());
            }
        }
    }
    if let Some(idx) = header.find(':') {
        tags.push(header[..idx].trim().to_lowercase());
    }
    tags
}
