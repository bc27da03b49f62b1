//! `$name` reference scanning and scope substitution.
//!
//! Two scanners exist on purpose. [`find_all_vars`] treats every
//! unescaped `$name` as a reference and is used for the annotation DSL
//! (literals, conditions), where quoting has no meaning..
//! [`find_command_vars`] is shell-aware: references inside single quotes
//! are literal text and do not count, references inside double quotes do.

use crate::types::Scope;

/// True if `c` may appear in a variable name at the given position.
pub fn is_var_char(c: u8, first: bool) -> bool {
    if c.is_ascii_alphabetic() || c == b'_' {
        return true;
    }
    !first && c.is_ascii_digit()
}

/// All `$name` references in `text`, ignoring quoting, deduplicated in
/// order of first appearance. `\$` is an escape and does not count.
pub fn find_all_vars(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut vars = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' || i + 1 >= bytes.len() || (i > 0 && bytes[i - 1] == b'\\') {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < bytes.len() && is_var_char(bytes[j], j == i + 1) {
            j += 1;
        }
        if j > i + 1 {
            let name = &text[i + 1..j];
            if !vars.iter().any(|v| v == name) {
                vars.push(name.to_string());
            }
        }
        i = j.max(i + 1);
    }
    vars
}

/// `$name` references a shell would expand: references inside single
/// quotes are skipped, backslash escapes the following character.
pub fn find_command_vars(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut vars: Vec<String> = Vec::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' && i + 1 < bytes.len() {
            i += 2;
            continue;
        }
        if c == b'\'' && !in_double {
            in_single = !in_single;
            i += 1;
            continue;
        }
        if c == b'"' && !in_single {
            in_double = !in_double;
            i += 1;
            continue;
        }
        if in_single || c != b'$' || i + 1 >= bytes.len() {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < bytes.len() && is_var_char(bytes[j], j == i + 1) {
            j += 1;
        }
        if j > i + 1 {
            let name = &text[i + 1..j];
            if !vars.iter().any(|v| v == name) {
                vars.push(name.to_string());
            }
        }
        i = j.max(i + 1);
    }
    vars
}

fn substitute_with(text: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut seg = 0;
    let mut i = 0;
    while i < bytes.len() {
        let escaped = i > 0 && bytes[i - 1] == b'\\';
        if bytes[i] != b'$' || escaped || i + 1 >= bytes.len() {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < bytes.len() && is_var_char(bytes[j], j == i + 1) {
            j += 1;
        }
        if j > i + 1 {
            if let Some(value) = lookup(&text[i + 1..j]) {
                out.push_str(&text[seg..i]);
                out.push_str(&value);
                seg = j;
            }
        }
        i = j.max(i + 1);
    }
    out.push_str(&text[seg..]);
    out
}

/// Replace `$name` for every name present in `scope`; unknown references
/// and `\$` escapes are left untouched.
pub fn substitute(text: &str, scope: &Scope) -> String {
    substitute_with(text, |name| scope.get(name).cloned())
}

/// Replace every `$name`: names present in `scope` get their value,
/// unresolved names become the empty string. Used for conditions, where
/// an unresolved reference must not leave `$name` text behind.
pub fn substitute_missing_empty(text: &str, scope: &Scope) -> String {
    substitute_with(text, |name| {
        Some(scope.get(name).cloned().unwrap_or_default())
    })
}

/// Render the final command: substitute the scope, then unescape `\$`.
pub fn render_command(template: &str, scope: &Scope) -> String {
    substitute(template, scope).replace("\\$", "$")
}

/// Split shell output into non-empty trimmed lines.
pub fn split_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a selector-options string into arguments, respecting quotes.
pub fn parse_shell_args(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in text.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                } else {
                    current.push(c);
                }
            }
            None => match c {
                '"' | '\'' => quote = Some(c),
                ' ' | '\t' => {
                    if !current.is_empty() {
                        args.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}
