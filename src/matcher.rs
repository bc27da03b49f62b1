//! `--match` pre-seeding: turn a command template into a pattern, find
//! the snippet the input line came from, and extract variable values
//! from it.
//!
//! `$name` becomes `(\S+)`, except `"$name"` captures `"([^"]*)"` and
//! `'$name'` captures `'([^']*)'`; everything else matches literally,
//! anchored with whitespace-tolerant ends.

use regex::Regex;

use crate::types::Snippet;
use crate::vars::is_var_char;

/// A compiled template pattern with one entry in `groups` per capture
/// group, naming the variable that occurrence belongs to.
#[derive(Debug)]
pub struct MatchPattern {
    pub regex: Regex,
    pub groups: Vec<String>,
}

/// Build the matching pattern for a command template. Returns `None`
/// for templates that produce an invalid pattern.
pub fn build_match_pattern(template: &str) -> Option<MatchPattern> {
    let bytes = template.as_bytes();
    let mut pattern = String::from(r"^\s*");
    let mut groups = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        // "$name" and '$name' capture the quoted span.
        if (bytes[i] == b'"' || bytes[i] == b'\'') && i + 2 < bytes.len() && bytes[i + 1] == b'$' {
            let quote = bytes[i];
            let mut j = i + 2;
            while j < bytes.len() && is_var_char(bytes[j], j == i + 2) {
                j += 1;
            }
            if j > i + 2 && j < bytes.len() && bytes[j] == quote {
                groups.push(template[i + 2..j].to_string());
                if quote == b'"' {
                    pattern.push_str("\"([^\"]*)\"");
                } else {
                    pattern.push_str("'([^']*)'");
                }
                i = j + 1;
                continue;
            }
        }
        if bytes[i] == b'$' && i + 1 < bytes.len() && (i == 0 || bytes[i - 1] != b'\\') {
            let mut j = i + 1;
            while j < bytes.len() && is_var_char(bytes[j], j == i + 1) {
                j += 1;
            }
            if j > i + 1 {
                groups.push(template[i + 1..j].to_string());
                pattern.push_str(r"(\S+)");
                i = j;
                continue;
            }
        }
        // `\$` in a template renders as a literal `$`, so the pattern
        // matches a bare dollar in the input.
        if bytes[i] == b'\\' && i + 1 < bytes.len() && bytes[i + 1] == b'$' {
            pattern.push_str(r"\$");
            i += 2;
            continue;
        }
        // Copy one character, escaped. Multi-byte chars pass through
        // regex::escape unharmed.
        let ch_len = utf8_len(bytes[i]);
        pattern.push_str(&regex::escape(&template[i..i + ch_len]));
        i += ch_len;
    }

    pattern.push_str(r"\s*$");
    let regex = Regex::new(&pattern).ok()?;
    Some(MatchPattern { regex, groups })
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b >= 0xf0 => 4,
        b if b >= 0xe0 => 3,
        _ => 2,
    }
}

/// Index of the first snippet whose command pattern matches `input`.
pub fn find_matching_snippet(snippets: &[Snippet], input: &str) -> Option<usize> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    snippets.iter().position(|snippet| {
        build_match_pattern(&snippet.command)
            .is_some_and(|pattern| pattern.regex.is_match(input))
    })
}

/// Extract capture groups from `input` into the snippet's scope. The
/// first occurrence of each variable wins. Returns true on a match.
pub fn preseed_scope(snippet: &mut Snippet, input: &str) -> bool {
    let input = input.trim();
    let Some(pattern) = build_match_pattern(&snippet.command) else {
        return false;
    };
    let Some(captures) = pattern.regex.captures(input) else {
        return false;
    };
    for (i, name) in pattern.groups.iter().enumerate() {
        if snippet.scope.contains_key(name) {
            continue;
        }
        if let Some(value) = captures.get(i + 1) {
            snippet.scope.insert(name.clone(), value.as_str().to_string());
        }
    }
    true
}
