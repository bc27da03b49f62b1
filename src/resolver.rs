//! Variable resolution.
//!
//! Given a selected snippet and the index, compute the ordered set of
//! variables to resolve and drive their resolution as a state machine:
//! [`Resolution::step`] yields the next action for the caller (run a
//! shell command in the background, show a prompt, or finish), and the
//! caller feeds back shell completions, accepted values, and back
//! requests. Shell completions carry a generation id; stale completions
//! from an abandoned variable are dropped.

use std::collections::{HashMap, HashSet};
use std::env;
use std::sync::Arc;

use crate::executor::ShellRunner;
use crate::index::Index;
use crate::types::{Scope, Snippet, VarDef, VarSource};
use crate::vars;

// ============================================================================
// Selector options
// ============================================================================

/// Options parsed from the `--- ...` tail of a variable definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorOptions {
    /// Custom prompt header shown above the list or input.
    pub header: Option<String>,
    /// Column delimiter for display and select-column extraction.
    pub delimiter: Option<String>,
    /// 1-indexed display column; 0 shows the whole line.
    pub column: usize,
    /// 1-indexed column extracted from the chosen line; 0 keeps it whole.
    pub select_column: usize,
    /// Shell command the chosen value is piped through.
    pub map_cmd: Option<String>,
}

/// Parse selector options, whitespace-split with quoted segments kept.
pub fn parse_selector_options(args: &str) -> SelectorOptions {
    let mut opts = SelectorOptions::default();
    if args.is_empty() {
        return opts;
    }
    let parts = vars::parse_shell_args(args);
    let mut i = 0;
    while i < parts.len() {
        let take = |i: usize| parts.get(i + 1).cloned();
        match parts[i].as_str() {
            "--header" => {
                if let Some(value) = take(i) {
                    opts.header = Some(value);
                    i += 1;
                }
            }
            "--delimiter" => {
                if let Some(value) = take(i) {
                    opts.delimiter = Some(unescape_delimiter(&value));
                    i += 1;
                }
            }
            "--column" => {
                if let Some(value) = take(i) {
                    opts.column = value.parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--select-column" => {
                if let Some(value) = take(i) {
                    opts.select_column = value.parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--map" => {
                if let Some(value) = take(i) {
                    opts.map_cmd = Some(value);
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    opts
}

/// `--delimiter "\t"` arrives as the two characters `\` `t`.
fn unescape_delimiter(raw: &str) -> String {
    raw.replace("\\t", "\t").replace("\\n", "\n").replace("\\\\", "\\")
}

/// Extract a 1-indexed column for display; out-of-range columns fall
/// back to the whole line.
pub fn display_column(line: &str, delimiter: Option<&str>, column: usize) -> String {
    let Some(delimiter) = delimiter.filter(|d| !d.is_empty()) else {
        return line.to_string();
    };
    if column == 0 {
        return line.to_string();
    }
    let parts: Vec<&str> = line.split(delimiter).collect();
    if column <= parts.len() {
        parts[column - 1].trim().to_string()
    } else {
        line.to_string()
    }
}

// ============================================================================
// Conditions and variants
// ============================================================================

/// Evaluate a condition against the scope. Every `$name` is substituted
/// first, unresolved names becoming empty; then `==` / `!=` compare the
/// trimmed sides, and anything else is a non-empty truthiness check.
pub fn evaluate_condition(condition: &str, scope: &Scope) -> bool {
    let substituted = vars::substitute_missing_empty(condition.trim(), scope);
    if let Some(idx) = substituted.find("==") {
        let left = substituted[..idx].trim();
        let right = substituted[idx + 2..].trim();
        return left == right;
    }
    if let Some(idx) = substituted.find("!=") {
        let left = substituted[..idx].trim();
        let right = substituted[idx + 2..].trim();
        return left != right;
    }
    !substituted.trim().is_empty()
}

/// Pick the active variant: the first with a satisfied condition wins,
/// otherwise the first unconditional one. `None` means every variant is
/// conditional and none matched (or there are no variants).
pub fn select_variant<'a>(variants: &'a [VarDef], scope: &Scope) -> Option<&'a VarDef> {
    let mut fallback = None;
    for variant in variants {
        match &variant.condition {
            None => {
                if fallback.is_none() {
                    fallback = Some(variant);
                }
            }
            Some(condition) => {
                if evaluate_condition(condition, scope) {
                    return Some(variant);
                }
            }
        }
    }
    fallback
}

// ============================================================================
// Variable collection
// ============================================================================

/// One variable awaiting resolution.
#[derive(Debug, Clone)]
pub struct VarSlot {
    pub name: String,
    /// All definitions sharing this name, declaration order.
    pub variants: Vec<VarDef>,
    /// The variant chosen for the current resolution attempt.
    pub active: VarDef,
    pub value: String,
    pub resolved: bool,
    pub prefill: String,
    /// Confirm even when auto-continue would otherwise accept the
    /// prefill (set on `--match` seeds and after back-navigation).
    pub skip_auto_continue: bool,
}

impl VarSlot {
    fn new(name: String, variants: Vec<VarDef>) -> VarSlot {
        let active = variants
            .first()
            .cloned()
            .unwrap_or_else(|| VarDef::prompt(name.clone()));
        VarSlot {
            name,
            variants,
            active,
            value: String::new(),
            resolved: false,
            prefill: String::new(),
            skip_auto_continue: false,
        }
    }
}

/// References a definition makes, condition references first so the
/// variables that drive variant selection resolve earliest.
fn variant_deps(def: &VarDef) -> Vec<String> {
    let mut deps = Vec::new();
    if let Some(condition) = &def.condition {
        deps.extend(vars::find_all_vars(condition));
    }
    match &def.source {
        // Shell commands follow shell quoting: single-quoted refs are
        // literal text.
        VarSource::Shell(cmd) => deps.extend(vars::find_command_vars(cmd)),
        VarSource::Literal(text) => deps.extend(vars::find_all_vars(text)),
        VarSource::Prompt => {}
    }
    deps
}

/// Gather every definition visible to the snippet (imports first,
/// recursively with a seen-set, then local), compute the transitive
/// closure of variables the command needs, and order it so dependencies
/// come before their dependents. Cycles are broken by refusing to
/// re-enter a node already on the visit stack.
pub fn collect_variables(snippet: &Snippet, index: &Index) -> Vec<VarSlot> {
    let mut defs: HashMap<String, Vec<VarDef>> = HashMap::new();

    fn collect_imports(
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
                collect_imports(&module.imports, index, seen, defs);
                for var in &module.vars {
                    defs.entry(var.name.clone()).or_default().push(var.clone());
                }
            }
        }
    }
    collect_imports(&snippet.imports, index, &mut HashSet::new(), &mut defs);
    for var in &snippet.vars {
        defs.entry(var.name.clone()).or_default().push(var.clone());
    }

    let used = vars::find_command_vars(&snippet.command);

    // Transitive closure over every variant's references.
    let mut needed: HashSet<String> = HashSet::new();
    let mut queue: Vec<String> = used.clone();
    while let Some(name) = queue.pop() {
        if !needed.insert(name.clone()) {
            continue;
        }
        if let Some(variants) = defs.get(&name) {
            for variant in variants {
                for dep in variant_deps(variant) {
                    if !needed.contains(&dep) {
                        queue.push(dep);
                    }
                }
            }
        }
    }

    // Topological order, stable in used-set iteration order.
    let mut ordered: Vec<String> = Vec::new();
    let mut added: HashSet<String> = HashSet::new();
    let mut visiting: HashSet<String> = HashSet::new();

    fn add_with_deps(
        name: &str,
        defs: &HashMap<String, Vec<VarDef>>,
        needed: &HashSet<String>,
        added: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
        ordered: &mut Vec<String>,
    ) {
        if added.contains(name) || !needed.contains(name) || visiting.contains(name) {
            return;
        }
        visiting.insert(name.to_string());
        if let Some(variants) = defs.get(name) {
            for variant in variants {
                for dep in variant_deps(variant) {
                    add_with_deps(&dep, defs, needed, added, visiting, ordered);
                }
            }
        }
        visiting.remove(name);
        added.insert(name.to_string());
        ordered.push(name.to_string());
    }

    for name in &used {
        add_with_deps(name, &defs, &needed, &mut added, &mut visiting, &mut ordered);
    }

    ordered
        .into_iter()
        .map(|name| {
            let variants = defs.get(&name).cloned().unwrap_or_default();
            VarSlot::new(name, variants)
        })
        .collect()
}

// ============================================================================
// Resolution state machine
// ============================================================================

/// What the caller must do next.
#[derive(Debug)]
pub enum Action {
    /// Run the command in the background and deliver its outcome via
    /// [`Resolution::on_shell`] with this generation id.
    RunShell { generation: u64, command: String },
    /// Ask the user for a free-text value.
    Prompt(PromptCtx),
    /// Every variable is resolved; the scope is final.
    Done(Scope),
}

/// Disposition of a completed shell command.
#[derive(Debug)]
pub enum ShellReply {
    /// Show a free-text prompt (no output, one pre-filled line, or a
    /// failed command).
    Prompt(PromptCtx),
    /// Show the candidate list for filtering and selection.
    Select { ctx: PromptCtx, choices: Vec<Choice> },
}

/// One selectable candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub display: String,
    pub original: String,
}

/// Everything the UI needs to render a prompt for the current variable.
#[derive(Debug, Clone)]
pub struct PromptCtx {
    pub var_name: String,
    pub prefill: String,
    pub custom_header: Option<String>,
    pub options: SelectorOptions,
    /// Set when the source command failed and we fell back to free text.
    pub shell_error: Option<String>,
}

/// What a back request leads to.
#[derive(Debug, PartialEq, Eq)]
pub enum Back {
    /// Re-entered the previous variable; call [`Resolution::step`].
    Reprompt,
    /// Backed out of the first variable; return to snippet selection.
    ToSnippetList,
}

pub struct Resolution {
    slots: Vec<VarSlot>,
    used: HashSet<String>,
    current: usize,
    generation: u64,
    auto_continue: bool,
    runner: Arc<dyn ShellRunner>,
}

impl Resolution {
    /// Build the resolution for a snippet. Pre-seeds prefills from the
    /// snippet's scope (`--match`) — which always re-confirm — and from
    /// the ambient environment, which may auto-continue.
    pub fn new(
        snippet: &Snippet,
        index: &Index,
        runner: Arc<dyn ShellRunner>,
        auto_continue: bool,
    ) -> Resolution {
        let mut slots = collect_variables(snippet, index);
        for slot in &mut slots {
            if let Some(seeded) = snippet.scope.get(&slot.name).filter(|v| !v.is_empty()) {
                slot.prefill = seeded.clone();
                slot.skip_auto_continue = true;
            } else if let Ok(ambient) = env::var(&slot.name) {
                if !ambient.is_empty() {
                    slot.prefill = ambient;
                }
            }
        }
        let used = vars::find_command_vars(&snippet.command).into_iter().collect();
        Resolution {
            slots,
            used,
            current: 0,
            generation: 0,
            auto_continue,
            runner,
        }
    }

    pub fn slots(&self) -> &[VarSlot] {
        &self.slots
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Scope of everything resolved so far.
    pub fn scope(&self) -> Scope {
        self.slots
            .iter()
            .filter(|slot| slot.resolved)
            .map(|slot| (slot.name.clone(), slot.value.clone()))
            .collect()
    }

    /// Advance to the next interaction. Literals, auto-continued
    /// prefills, unmatched all-conditional variables, and variables no
    /// selected variant needs any more are consumed without returning.
    pub fn step(&mut self) -> Action {
        loop {
            if self.current >= self.slots.len() {
                return Action::Done(self.scope());
            }
            if self.slots[self.current].resolved {
                self.current += 1;
                continue;
            }

            let scope = self.scope();

            // A variable pulled in only by a variant that lost selection
            // is skipped as resolved-empty.
            if !self.used.contains(&self.slots[self.current].name)
                && !self.currently_needed(&scope).contains(&self.slots[self.current].name)
            {
                let slot = &mut self.slots[self.current];
                slot.resolved = true;
                slot.value.clear();
                self.current += 1;
                continue;
            }

            let slot = &mut self.slots[self.current];
            match select_variant(&slot.variants, &scope).cloned() {
                Some(active) => slot.active = active,
                None => {
                    let all_conditional = !slot.variants.is_empty()
                        && slot.variants.iter().all(|v| v.condition.is_some());
                    if all_conditional {
                        slot.resolved = true;
                        slot.value.clear();
                        self.current += 1;
                        continue;
                    }
                    slot.active = slot
                        .variants
                        .first()
                        .cloned()
                        .unwrap_or_else(|| VarDef::prompt(slot.name.clone()));
                }
            }

            if self.auto_continue && !slot.prefill.is_empty() && !slot.skip_auto_continue {
                slot.value = slot.prefill.clone();
                slot.resolved = true;
                self.current += 1;
                continue;
            }

            if let VarSource::Literal(text) = &slot.active.source {
                slot.value = vars::substitute(text, &scope);
                slot.resolved = true;
                self.current += 1;
                continue;
            }

            if slot.active.is_prompt_only() {
                return Action::Prompt(self.prompt_ctx(None));
            }

            let command = match &slot.active.source {
                VarSource::Shell(cmd) => vars::substitute(cmd, &scope),
                _ => unreachable!("literal and prompt handled above"),
            };
            self.generation += 1;
            return Action::RunShell {
                generation: self.generation,
                command,
            };
        }
    }

    /// Feed back a completed shell command. Returns `None` when the
    /// result belongs to an abandoned prompt (stale generation).
    pub fn on_shell(
        &mut self,
        generation: u64,
        result: Result<Vec<String>, String>,
    ) -> Option<ShellReply> {
        if generation != self.generation || self.current >= self.slots.len() {
            return None;
        }
        let opts = parse_selector_options(&self.slots[self.current].active.args);
        match result {
            Err(err) => Some(ShellReply::Prompt(self.prompt_ctx(Some(err)))),
            Ok(lines) if lines.is_empty() => Some(ShellReply::Prompt(self.prompt_ctx(None))),
            Ok(lines) if lines.len() == 1 => {
                let mut ctx = self.prompt_ctx(None);
                if ctx.prefill.is_empty() {
                    ctx.prefill = self.map_transform(&lines[0], &opts);
                }
                Some(ShellReply::Prompt(ctx))
            }
            Ok(lines) => {
                let choices = lines
                    .into_iter()
                    .map(|line| Choice {
                        display: display_column(&line, opts.delimiter.as_deref(), opts.column),
                        original: line,
                    })
                    .collect();
                Some(ShellReply::Select {
                    ctx: self.prompt_ctx(None),
                    choices,
                })
            }
        }
    }

    /// Accept typed input for the current variable.
    pub fn accept_input(&mut self, value: String) {
        if let Some(slot) = self.slots.get_mut(self.current) {
            slot.value = value;
            slot.resolved = true;
            self.current += 1;
        }
    }

    /// Accept a chosen candidate: select-column extraction, then the
    /// map transform, then the value.
    pub fn accept_choice(&mut self, original: &str) {
        let Some(slot) = self.slots.get(self.current) else {
            return;
        };
        let opts = parse_selector_options(&slot.active.args);
        let mut value = if opts.select_column > 0 {
            display_column(original, opts.delimiter.as_deref(), opts.select_column)
        } else {
            original.to_string()
        };
        value = self.map_transform(&value, &opts);
        self.accept_input(value);
    }

    /// Step back one variable. The previous variable is cleared and will
    /// re-confirm even under auto-continue; later variables keep their
    /// resolutions until revisited.
    pub fn back(&mut self) -> Back {
        // Invalidate any in-flight shell command for the abandoned prompt.
        self.generation += 1;
        if self.current == 0 {
            return Back::ToSnippetList;
        }
        self.current -= 1;
        let slot = &mut self.slots[self.current];
        slot.resolved = false;
        slot.value.clear();
        slot.skip_auto_continue = true;
        Back::Reprompt
    }

    /// Names any currently-selected variant still references, given the
    /// scope resolved so far.
    fn currently_needed(&self, scope: &Scope) -> HashSet<String> {
        let mut needed: HashSet<String> = HashSet::new();
        let mut queue: Vec<String> = self.used.iter().cloned().collect();
        while let Some(name) = queue.pop() {
            if !needed.insert(name.clone()) {
                continue;
            }
            let Some(slot) = self.slots.iter().find(|slot| slot.name == name) else {
                continue;
            };
            // Condition references are always needed: without them the
            // selection itself cannot be evaluated.
            for variant in &slot.variants {
                if let Some(condition) = &variant.condition {
                    queue.extend(vars::find_all_vars(condition));
                }
            }
            if let Some(selected) = select_variant(&slot.variants, scope) {
                match &selected.source {
                    VarSource::Shell(cmd) => queue.extend(vars::find_command_vars(cmd)),
                    VarSource::Literal(text) => queue.extend(vars::find_all_vars(text)),
                    VarSource::Prompt => {}
                }
            }
        }
        needed
    }

    fn prompt_ctx(&self, shell_error: Option<String>) -> PromptCtx {
        let slot = &self.slots[self.current];
        let options = parse_selector_options(&slot.active.args);
        PromptCtx {
            var_name: slot.name.clone(),
            prefill: slot.prefill.clone(),
            custom_header: options.header.clone(),
            options,
            shell_error,
        }
    }

    fn map_transform(&self, value: &str, opts: &SelectorOptions) -> String {
        let Some(map_cmd) = &opts.map_cmd else {
            return value.to_string();
        };
        match self.runner.pipe(map_cmd, value) {
            Ok(mapped) => mapped,
            Err(_) => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result as CrateResult};
    use crate::parser;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Scripted shell for driving the state machine in tests.
    struct ScriptedShell {
        pipes: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedShell {
        fn new() -> Arc<Self> {
            Arc::new(ScriptedShell {
                pipes: Mutex::new(Vec::new()),
            })
        }

        fn with_pipe(self: Arc<Self>, command: &str, output: &str) -> Arc<Self> {
            self.pipes
                .lock()
                .unwrap()
                .push((command.to_string(), output.to_string()));
            self
        }
    }

    impl ShellRunner for ScriptedShell {
        fn run(&self, command: &str) -> CrateResult<String> {
            Err(Error::ShellSourceFailed {
                detail: format!("unscripted run: {command}"),
            })
        }

        fn pipe(&self, command: &str, _input: &str) -> CrateResult<String> {
            self.pipes
                .lock()
                .unwrap()
                .iter()
                .find(|(cmd, _)| cmd == command)
                .map(|(_, out)| out.clone())
                .ok_or(Error::ShellSourceFailed {
                    detail: format!("unscripted pipe: {command}"),
                })
        }

        fn execute(&self, _command: &str) -> CrateResult<()> {
            Ok(())
        }
    }

    fn snippet_from(doc: &str) -> (Snippet, Index) {
        let parse = parser::parse_document(&PathBuf::from("t.md"), doc);
        let mut index = Index::new();
        index.merge(parse);
        let snippet = index.snippets()[0].clone();
        (snippet, index)
    }

    fn scope(pairs: &[(&str, &str)]) -> Scope {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_selector_options() {
        let opts = parse_selector_options(
            r#"--header "pick one" --delimiter "\t" --column 2 --map "cut -f1""#,
        );
        assert_eq!(opts.header.as_deref(), Some("pick one"));
        assert_eq!(opts.delimiter.as_deref(), Some("\t"));
        assert_eq!(opts.column, 2);
        assert_eq!(opts.map_cmd.as_deref(), Some("cut -f1"));
        assert_eq!(opts.select_column, 0);
    }

    #[test]
    fn test_display_column() {
        assert_eq!(display_column("a\tb", Some("\t"), 2), "b");
        assert_eq!(display_column("a\tb", Some("\t"), 0), "a\tb");
        assert_eq!(display_column("a\tb", Some("\t"), 5), "a\tb");
        assert_eq!(display_column("a\tb", None, 2), "a\tb");
    }

    #[test]
    fn test_evaluate_condition_forms() {
        let s = scope(&[("m", "k")]);
        assert!(evaluate_condition("$m == k", &s));
        assert!(!evaluate_condition("$m == p", &s));
        assert!(evaluate_condition("$m != p", &s));
        assert!(evaluate_condition("$m", &s));
        assert!(!evaluate_condition("$unset", &s));
        // unresolved names substitute as empty, not as literal text
        assert!(!evaluate_condition("$unset == x", &s));
        assert!(evaluate_condition("$unset == ", &s));
    }

    #[test]
    fn test_condition_monotone_under_irrelevant_keys() {
        let small = scope(&[("m", "k")]);
        let mut big = small.clone();
        big.insert("other".into(), "zzz".into());
        for cond in ["$m == k", "$m != k", "$m", "$m == p"] {
            assert_eq!(
                evaluate_condition(cond, &small),
                evaluate_condition(cond, &big),
                "condition {cond} changed under added keys"
            );
        }
    }

    #[test]
    fn test_select_variant_first_condition_wins() {
        let variants = vec![
            VarDef {
                name: "f".into(),
                source: VarSource::Literal("a".into()),
                args: String::new(),
                condition: Some("$m == a".into()),
            },
            VarDef {
                name: "f".into(),
                source: VarSource::Literal("b".into()),
                args: String::new(),
                condition: Some("$m == b".into()),
            },
            VarDef {
                name: "f".into(),
                source: VarSource::Literal("dflt".into()),
                args: String::new(),
                condition: None,
            },
        ];
        let picked = select_variant(&variants, &scope(&[("m", "b")])).unwrap();
        assert_eq!(picked.literal(), Some("b"));
        let fallback = select_variant(&variants, &scope(&[("m", "z")])).unwrap();
        assert_eq!(fallback.literal(), Some("dflt"));
    }

    #[test]
    fn test_select_variant_none_when_all_conditional_unmatched() {
        let variants = vec![VarDef {
            name: "f".into(),
            source: VarSource::Literal("a".into()),
            args: String::new(),
            condition: Some("$m == a".into()),
        }];
        assert!(select_variant(&variants, &Scope::new()).is_none());
    }

    #[test]
    fn test_collect_orders_dependencies_first() {
        let (snippet, index) = snippet_from(
            "## X\n```sh\ndeploy $target\n```\n<!-- cheat\nvar target = printf \"$env-box\"\nvar env = printf 'dev\\nprod'\n-->\n",
        );
        let slots = collect_variables(&snippet, &index);
        let names: Vec<_> = slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["env", "target"]);
    }

    #[test]
    fn test_collect_single_quoted_refs_not_dependencies() {
        let (snippet, index) = snippet_from(
            "## X\n```sh\necho $a\n```\n<!-- cheat\nvar a = grep 'literal $b' file\n-->\n",
        );
        let slots = collect_variables(&snippet, &index);
        let names: Vec<_> = slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_collect_quoted_command_refs() {
        // single-quoted in the command template: not a reference
        let (snippet, index) =
            snippet_from("## X\n```sh\necho '$lit' \"$real\"\n```\n<!-- cheat\n-->\n");
        let slots = collect_variables(&snippet, &index);
        let names: Vec<_> = slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["real"]);
    }

    #[test]
    fn test_collect_imports_recursive_with_cycle() {
        let doc = "\
<!-- cheat
export a
import b
var x = printf 'x'
-->
<!-- cheat
export b
import a
var y = printf 'y'
-->
## Use
```sh
run $x $y
```
<!-- cheat
import a
-->
";
        let (snippet, index) = {
            let parse = parser::parse_document(&PathBuf::from("t.md"), doc);
            let mut index = Index::new();
            index.merge(parse);
            let snippet = index.snippets()[0].clone();
            (snippet, index)
        };
        let slots = collect_variables(&snippet, &index);
        let mut names: Vec<_> = slots.iter().map(|s| s.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_collect_local_appends_after_imports() {
        let doc = "\
<!-- cheat
export m
var v = printf 'from-module'
-->
## Use
```sh
echo $v
```
<!-- cheat
import m
var v := from-local
-->
";
        let (snippet, index) = {
            let parse = parser::parse_document(&PathBuf::from("t.md"), doc);
            let mut index = Index::new();
            index.merge(parse);
            let snippet = index.snippets()[0].clone();
            (snippet, index)
        };
        let slots = collect_variables(&snippet, &index);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].variants.len(), 2);
        assert_eq!(slots[0].variants[0].shell(), Some("printf 'from-module'"));
        assert_eq!(slots[0].variants[1].literal(), Some("from-local"));
    }

    #[test]
    fn test_collect_undefined_var_becomes_prompt() {
        let (snippet, index) = snippet_from("## X\n```sh\necho $mystery\n```\n<!-- cheat\n-->\n");
        let slots = collect_variables(&snippet, &index);
        assert_eq!(slots.len(), 1);
        assert!(slots[0].variants.is_empty());
        assert!(slots[0].active.is_prompt_only());
    }

    #[test]
    fn test_prompt_only_scenario() {
        // Scenario: `echo $name`, type alice, done.
        let (snippet, index) =
            snippet_from("## Echo\n```sh\necho $name\n```\n<!-- cheat\nvar name\n-->\n");
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);

        let Action::Prompt(ctx) = res.step() else {
            panic!("expected prompt");
        };
        assert_eq!(ctx.var_name, "name");
        res.accept_input("alice".into());

        let Action::Done(scope) = res.step() else {
            panic!("expected done");
        };
        assert_eq!(scope.get("name").map(String::as_str), Some("alice"));
        assert_eq!(
            vars::render_command(&snippet.command, &scope),
            "echo alice"
        );
    }

    #[test]
    fn test_shell_multi_candidate_with_column_and_map() {
        // Scenario: display column 2, map the chosen raw line.
        let doc = "## X\n```sh\nuse $role\n```\n<!-- cheat\nvar role = printf 'admin\\tAdministrator\\nguest\\tGuest' --- --delimiter \"\\t\" --column 2 --map \"cut -f1\"\n-->\n";
        let (snippet, index) = snippet_from(doc);
        let runner = ScriptedShell::new().with_pipe("cut -f1", "admin");
        let mut res = Resolution::new(&snippet, &index, runner, false);

        let Action::RunShell { generation, .. } = res.step() else {
            panic!("expected shell");
        };
        let reply = res
            .on_shell(
                generation,
                Ok(vec![
                    "admin\tAdministrator".to_string(),
                    "guest\tGuest".to_string(),
                ]),
            )
            .expect("reply");
        let ShellReply::Select { choices, .. } = reply else {
            panic!("expected select");
        };
        assert_eq!(choices[0].display, "Administrator");
        assert_eq!(choices[1].display, "Guest");

        res.accept_choice("admin\tAdministrator");
        let Action::Done(scope) = res.step() else {
            panic!("expected done");
        };
        assert_eq!(scope.get("role").map(String::as_str), Some("admin"));
    }

    #[test]
    fn test_shell_single_line_confirmable_prefill() {
        let (snippet, index) =
            snippet_from("## X\n```sh\necho $v\n```\n<!-- cheat\nvar v = printf 'only'\n-->\n");
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), true);

        let Action::RunShell { generation, .. } = res.step() else {
            panic!("expected shell");
        };
        // Even with auto-continue on, one line of output is confirmed,
        // not auto-accepted.
        let reply = res.on_shell(generation, Ok(vec!["only".to_string()]));
        let Some(ShellReply::Prompt(ctx)) = reply else {
            panic!("expected prompt");
        };
        assert_eq!(ctx.prefill, "only");
    }

    #[test]
    fn test_shell_failure_falls_back_to_prompt() {
        let (snippet, index) =
            snippet_from("## X\n```sh\necho $v\n```\n<!-- cheat\nvar v = false\n-->\n");
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);
        let Action::RunShell { generation, .. } = res.step() else {
            panic!("expected shell");
        };
        let reply = res.on_shell(generation, Err("exit status 1".into()));
        let Some(ShellReply::Prompt(ctx)) = reply else {
            panic!("expected prompt");
        };
        assert_eq!(ctx.shell_error.as_deref(), Some("exit status 1"));
    }

    #[test]
    fn test_stale_shell_result_dropped() {
        let (snippet, index) = snippet_from(
            "## X\n```sh\necho $a $b\n```\n<!-- cheat\nvar a = printf 'x\\ny'\nvar b = printf 'z\\nw'\n-->\n",
        );
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);
        let Action::RunShell { generation, .. } = res.step() else {
            panic!("expected shell");
        };
        // user backs out before the command lands
        assert_eq!(res.back(), Back::ToSnippetList);
        assert!(res.on_shell(generation, Ok(vec!["x".into(), "y".into()])).is_none());
    }

    #[test]
    fn test_conditional_variant_kerberos_skips_credential() {
        let doc = "\
## X
```sh
connect $flags
```
<!-- cheat
var m = printf 'k\\np'
if $m == k
var flags := --kerberos
fi
if $m == p
var flags := --pass $cred
fi
var cred
-->
";
        let (snippet, index) = snippet_from(doc);
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);

        let Action::RunShell { generation, .. } = res.step() else {
            panic!("expected shell for m");
        };
        let reply = res.on_shell(generation, Ok(vec!["k".into(), "p".into()]));
        assert!(matches!(reply, Some(ShellReply::Select { .. })));
        res.accept_choice("k");

        // cred is only referenced by the unselected `p` variant, so the
        // resolution completes without prompting for it.
        let Action::Done(scope) = res.step() else {
            panic!("expected done without cred prompt");
        };
        assert_eq!(scope.get("flags").map(String::as_str), Some("--kerberos"));
        assert_eq!(
            vars::render_command(&snippet.command, &scope),
            "connect --kerberos"
        );
    }

    #[test]
    fn test_conditional_variant_password_prompts_credential() {
        let doc = "\
## X
```sh
connect $flags
```
<!-- cheat
var m = printf 'k\\np'
if $m == k
var flags := --kerberos
fi
if $m == p
var flags := --pass $cred
fi
var cred
-->
";
        let (snippet, index) = snippet_from(doc);
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);

        let Action::RunShell { generation, .. } = res.step() else {
            panic!("expected shell for m");
        };
        res.on_shell(generation, Ok(vec!["k".into(), "p".into()]));
        res.accept_choice("p");

        let Action::Prompt(ctx) = res.step() else {
            panic!("expected cred prompt");
        };
        assert_eq!(ctx.var_name, "cred");
        res.accept_input("xyz".into());

        let Action::Done(scope) = res.step() else {
            panic!("expected done");
        };
        assert_eq!(scope.get("flags").map(String::as_str), Some("--pass xyz"));
    }

    #[test]
    fn test_all_conditional_unmatched_resolves_empty() {
        let doc = "\
## X
```sh
run $opt
```
<!-- cheat
if $mode == a
var opt := --aa
fi
var mode := c
-->
";
        let (snippet, index) = snippet_from(doc);
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);
        let Action::Done(scope) = res.step() else {
            panic!("expected done");
        };
        assert_eq!(scope.get("opt").map(String::as_str), Some(""));
        assert_eq!(vars::render_command(&snippet.command, &scope), "run ");
    }

    #[test]
    fn test_back_navigation_clears_previous_only() {
        let doc = "## X\n```sh\ngo $a $b $c\n```\n<!-- cheat\nvar a\nvar b\nvar c\n-->\n";
        let (snippet, index) = snippet_from(doc);
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);

        assert!(matches!(res.step(), Action::Prompt(_)));
        res.accept_input("1".into());
        assert!(matches!(res.step(), Action::Prompt(_)));
        res.accept_input("2".into());
        let Action::Prompt(ctx) = res.step() else {
            panic!("expected c");
        };
        assert_eq!(ctx.var_name, "c");

        // Esc at c: back to b, which must re-confirm.
        assert_eq!(res.back(), Back::Reprompt);
        let Action::Prompt(ctx) = res.step() else {
            panic!("expected b again");
        };
        assert_eq!(ctx.var_name, "b");
        let slot_b = &res.slots()[res.current_index()];
        assert!(slot_b.skip_auto_continue);
        res.accept_input("7".into());

        let Action::Prompt(ctx) = res.step() else {
            panic!("expected c again");
        };
        assert_eq!(ctx.var_name, "c");
        // a kept its value through the detour
        assert_eq!(res.scope().get("a").map(String::as_str), Some("1"));
        assert_eq!(res.scope().get("b").map(String::as_str), Some("7"));
        res.accept_input("3".into());
        let Action::Done(scope) = res.step() else {
            panic!("expected done");
        };
        assert_eq!(
            vars::render_command(&snippet.command, &scope),
            "go 1 7 3"
        );
    }

    #[test]
    fn test_back_past_first_returns_to_list() {
        let doc = "## X\n```sh\necho $a\n```\n<!-- cheat\nvar a\n-->\n";
        let (snippet, index) = snippet_from(doc);
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);
        assert!(matches!(res.step(), Action::Prompt(_)));
        assert_eq!(res.back(), Back::ToSnippetList);
    }

    #[test]
    fn test_match_seed_confirms_even_with_auto_continue() {
        let doc = "## X\n```sh\nssh $user\n```\n<!-- cheat\nvar user\n-->\n";
        let (mut snippet, index) = snippet_from(doc);
        snippet.scope.insert("user".into(), "alice".into());
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), true);
        let Action::Prompt(ctx) = res.step() else {
            panic!("seeded value must still confirm");
        };
        assert_eq!(ctx.prefill, "alice");
    }

    #[test]
    fn test_auto_continue_accepts_env_prefill() {
        let doc = "## X\n```sh\necho $cheatmd_test_env_var\n```\n<!-- cheat\nvar cheatmd_test_env_var\n-->\n";
        let (snippet, index) = snippet_from(doc);
        // SAFETY: test-local variable name, no concurrent reader cares.
        unsafe { env::set_var("cheatmd_test_env_var", "from-env") };
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), true);
        unsafe { env::remove_var("cheatmd_test_env_var") };
        let Action::Done(scope) = res.step() else {
            panic!("expected auto-continued done");
        };
        assert_eq!(
            scope.get("cheatmd_test_env_var").map(String::as_str),
            Some("from-env")
        );
    }

    #[test]
    fn test_literal_resolves_without_prompt() {
        let doc = "## X\n```sh\necho $greeting\n```\n<!-- cheat\nvar name\nvar greeting := hello $name\n-->\n";
        let (snippet, index) = snippet_from(doc);
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);
        let Action::Prompt(ctx) = res.step() else {
            panic!("expected name prompt");
        };
        assert_eq!(ctx.var_name, "name");
        res.accept_input("world".into());
        let Action::Done(scope) = res.step() else {
            panic!("expected done");
        };
        assert_eq!(scope.get("greeting").map(String::as_str), Some("hello world"));
    }

    #[test]
    fn test_resolved_names_match_command_refs() {
        // Variable-closure invariant: what the resolver resolves is what
        // the command references (plus variant dependencies).
        let doc = "## X\n```sh\npair $a '$not_a_ref' $b\n```\n<!-- cheat\nvar a\nvar b\n-->\n";
        let (snippet, index) = snippet_from(doc);
        let mut res = Resolution::new(&snippet, &index, ScriptedShell::new(), false);
        let mut prompted = Vec::new();
        loop {
            match res.step() {
                Action::Prompt(ctx) => {
                    prompted.push(ctx.var_name.clone());
                    res.accept_input("v".into());
                }
                Action::Done(scope) => {
                    let mut resolved: Vec<_> = scope.keys().cloned().collect();
                    resolved.sort();
                    assert_eq!(resolved, vec!["a", "b"]);
                    break;
                }
                Action::RunShell { .. } => panic!("no shell vars here"),
            }
        }
        assert_eq!(prompted, vec!["a", "b"]);
    }
}
