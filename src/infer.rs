//! Reverse inference for `--match` pre-seeded scopes.
//!
//! A matched input line fixes the values of the variables that appear
//! in the command template, but conditional variants often encode more:
//! if `$auth_flags` was captured as `-p hunter2` and a variant declares
//! `var auth_flags := -p $credential` under `if $auth_method == password`,
//! then the seed also tells us `auth_method = password` and
//! `credential = hunter2`. This pass walks the variants visible to the
//! snippet and adds everything the seeded values imply, so resolution
//! does not re-ask for answers the input already contains.

use std::collections::{HashMap, HashSet};

use crate::index::Index;
use crate::matcher::build_match_pattern;
use crate::types::{Scope, Snippet, VarDef};

/// Match `actual` against a literal `template` and return the embedded
/// variable values, e.g. template `-p $credential` against `-p hunter2`
/// yields `credential = hunter2`. Values already in `scope` are kept.
pub fn extract_embedded_vars(template: &str, actual: &str, scope: &Scope) -> Scope {
    let mut extracted = Scope::new();
    let Some(pattern) = build_match_pattern(template) else {
        return extracted;
    };
    let Some(captures) = pattern.regex.captures(actual.trim()) else {
        return extracted;
    };
    for (i, name) in pattern.groups.iter().enumerate() {
        if scope.contains_key(name) || extracted.contains_key(name) {
            continue;
        }
        if let Some(value) = captures.get(i + 1) {
            extracted.insert(name.clone(), value.as_str().to_string());
        }
    }
    extracted
}

/// A condition of the form `$name == value`.
fn equality_condition(condition: &str) -> Option<(String, String)> {
    let idx = condition.find("==")?;
    let left = condition[..idx].trim();
    let right = condition[idx + 2..].trim();
    let name = left.strip_prefix('$')?;
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name.to_string(), right.to_string()))
}

/// Infer values for variables a pre-seeded scope implies, iterating to a
/// fixpoint so chained inferences land too.
pub fn infer_dependent_vars(snippet: &mut Snippet, index: &Index) {
    let defs = visible_defs(snippet, index);

    let mut changed = true;
    while changed {
        changed = false;
        let seeded: Vec<(String, String)> = snippet
            .scope
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        for (name, actual) in seeded {
            let Some(variants) = defs.get(&name) else {
                continue;
            };
            for variant in variants {
                let (Some(condition), Some(template)) = (&variant.condition, variant.literal())
                else {
                    continue;
                };
                let Some(pattern) = build_match_pattern(template) else {
                    continue;
                };
                if !pattern.regex.is_match(actual.trim()) {
                    continue;
                }
                if let Some((cond_var, cond_value)) = equality_condition(condition) {
                    if !snippet.scope.contains_key(&cond_var) {
                        snippet.scope.insert(cond_var, cond_value);
                        changed = true;
                    }
                }
                for (embedded, value) in extract_embedded_vars(template, &actual, &snippet.scope) {
                    snippet.scope.entry(embedded).or_insert_with(|| {
                        changed = true;
                        value
                    });
                }
                break;
            }
        }
    }
}

/// Every definition visible to the snippet: imported modules first
/// (recursively, cycle-guarded), then local definitions.
fn visible_defs(snippet: &Snippet, index: &Index) -> HashMap<String, Vec<VarDef>> {
    let mut defs: HashMap<String, Vec<VarDef>> = HashMap::new();

    fn walk(
        imports: &[String],
        index: &Index,
        seen: &mut HashSet<String>,
        defs: &mut HashMap<String, Vec<VarDef>>,
    ) {
        for name in imports {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(module) = index.module(name) {
                walk(&module.imports, index, seen, defs);
                for var in &module.vars {
                    defs.entry(var.name.clone()).or_default().push(var.clone());
                }
            }
        }
    }
    walk(&snippet.imports, index, &mut HashSet::new(), &mut defs);
    for var in &snippet.vars {
        defs.entry(var.name.clone()).or_default().push(var.clone());
    }
    defs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Module, VarSource};
    use std::path::PathBuf;

    fn scope(pairs: &[(&str, &str)]) -> Scope {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn literal_variant(name: &str, template: &str, condition: &str) -> VarDef {
        VarDef {
            name: name.into(),
            source: VarSource::Literal(template.into()),
            args: String::new(),
            condition: Some(condition.into()),
        }
    }

    fn auth_index() -> Index {
        let mut index = Index::new();
        index.register_module(Module {
            name: "bloodyad".into(),
            vars: vec![
                VarDef {
                    name: "auth_method".into(),
                    source: VarSource::Shell("printf 'kerberos\\npassword\\nhash'".into()),
                    args: String::new(),
                    condition: None,
                },
                literal_variant("auth_flags", "-k", "$auth_method == kerberos"),
                literal_variant("auth_flags", "-p $credential", "$auth_method == password"),
                literal_variant("auth_flags", "-H $credential", "$auth_method == hash"),
                VarDef::prompt("credential"),
            ],
            imports: Vec::new(),
            file: PathBuf::from("auth.md"),
        });
        index
    }

    #[test]
    fn test_extract_embedded_simple() {
        let out = extract_embedded_vars("-p $credential", "-p mypassword", &Scope::new());
        assert_eq!(out.get("credential").map(String::as_str), Some("mypassword"));
    }

    #[test]
    fn test_extract_embedded_keeps_punctuation() {
        let out = extract_embedded_vars("-p $credential", "-p :mypassword", &Scope::new());
        assert_eq!(out.get("credential").map(String::as_str), Some(":mypassword"));

        let out = extract_embedded_vars(
            "-H $credential",
            "-H aad3b435b51404eeaad3b435b51404ee:abc123",
            &Scope::new(),
        );
        assert_eq!(
            out.get("credential").map(String::as_str),
            Some("aad3b435b51404eeaad3b435b51404ee:abc123")
        );
    }

    #[test]
    fn test_extract_embedded_respects_existing_scope() {
        let existing = scope(&[("credential", "already")]);
        let out = extract_embedded_vars("-p $credential", "-p other", &existing);
        assert!(out.is_empty());
    }

    #[test]
    fn test_infer_kerberos_flag() {
        let mut snippet = Snippet::new("t.md", "h");
        snippet.imports.push("bloodyad".into());
        snippet.scope.insert("auth_flags".into(), "-k".into());

        infer_dependent_vars(&mut snippet, &auth_index());
        assert_eq!(
            snippet.scope.get("auth_method").map(String::as_str),
            Some("kerberos")
        );
    }

    #[test]
    fn test_infer_password_flag_and_credential() {
        let mut snippet = Snippet::new("t.md", "h");
        snippet.imports.push("bloodyad".into());
        snippet
            .scope
            .insert("auth_flags".into(), "-p mypassword".into());

        infer_dependent_vars(&mut snippet, &auth_index());
        assert_eq!(
            snippet.scope.get("auth_method").map(String::as_str),
            Some("password")
        );
        assert_eq!(
            snippet.scope.get("credential").map(String::as_str),
            Some("mypassword")
        );
    }

    #[test]
    fn test_infer_leaves_unrelated_scope_alone() {
        let mut snippet = Snippet::new("t.md", "h");
        snippet.imports.push("bloodyad".into());
        snippet.scope.insert("host".into(), "10.0.0.1".into());

        infer_dependent_vars(&mut snippet, &auth_index());
        assert_eq!(snippet.scope.len(), 1);
    }
}
