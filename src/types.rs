//! Common types shared across the crate.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Resolved variable values for one snippet resolution.
pub type Scope = BTreeMap<String, String>;

/// Where a variable's value comes from.
///
/// Exactly one source per definition; combining a shell command with a
/// literal in a single definition is not representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarSource {
    /// `var name = <command>` — run the command, offer its output lines.
    Shell(String),
    /// `var name := <text>` — substitute `$other` references and use as-is.
    Literal(String),
    /// `var name` — ask the user.
    Prompt,
}

/// A single variable definition from an annotation block.
///
/// Several definitions may share a name when all but the first carry a
/// condition; the resolver picks at most one variant per resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDef {
    pub name: String,
    pub source: VarSource,
    /// Selector options after `---` (`--header`, `--delimiter`, ...).
    pub args: String,
    /// `if <expr>` guard, when declared inside an if/fi block.
    pub condition: Option<String>,
}

impl VarDef {
    pub fn prompt(name: impl Into<String>) -> Self {
        VarDef {
            name: name.into(),
            source: VarSource::Prompt,
            args: String::new(),
            condition: None,
        }
    }

    /// The shell command, if this is a shell-sourced definition.
    pub fn shell(&self) -> Option<&str> {
        match &self.source {
            VarSource::Shell(cmd) => Some(cmd),
            _ => None,
        }
    }

    /// The literal template, if this is a literal definition.
    pub fn literal(&self) -> Option<&str> {
        match &self.source {
            VarSource::Literal(text) => Some(text),
            _ => None,
        }
    }

    /// True when the definition neither runs a command nor holds a literal.
    pub fn is_prompt_only(&self) -> bool {
        match &self.source {
            VarSource::Prompt => true,
            VarSource::Shell(cmd) => cmd.trim().is_empty(),
            VarSource::Literal(_) => false,
        }
    }
}

/// One executable entry: a code block plus its section context.
#[derive(Debug, Clone)]
pub struct Snippet {
    /// Source document path.
    pub file: PathBuf,
    /// Section header the code block appeared under.
    pub header: String,
    /// Description text (from a `title:"..."` on the fence).
    pub description: String,
    /// The command template, verbatim code-block body.
    pub command: String,
    /// Lower-cased tags derived from the path and header prefix.
    pub tags: Vec<String>,
    /// Module name when the annotation block declares `export`.
    pub export: Option<String>,
    /// Module names pulled in with `import`.
    pub imports: Vec<String>,
    /// Variable definitions, in declaration order (variants included).
    pub vars: Vec<VarDef>,
    /// Whether an annotation block was attached.
    pub has_annotation_block: bool,
    /// Resolved values, filled in during resolution.
    pub scope: Scope,
}

impl Snippet {
    pub fn new(file: impl Into<PathBuf>, header: impl Into<String>) -> Self {
        Snippet {
            file: file.into(),
            header: header.into(),
            description: String::new(),
            command: String::new(),
            tags: Vec::new(),
            export: None,
            imports: Vec::new(),
            vars: Vec::new(),
            has_annotation_block: false,
            scope: Scope::new(),
        }
    }
}

/// An exported collection of variable definitions, importable by name.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub vars: Vec<VarDef>,
    pub imports: Vec<String>,
    pub file: PathBuf,
}

impl Module {
    /// Build the module record for a snippet that declares `export`.
    pub fn from_snippet(snippet: &Snippet) -> Option<Module> {
        let name = snippet.export.clone()?;
        Some(Module {
            name,
            vars: snippet.vars.clone(),
            imports: snippet.imports.clone(),
            file: snippet.file.clone(),
        })
    }
}

/// Two files exporting the same module name. The later definition wins;
/// both paths are kept for the startup warning.
#[derive(Debug, Clone)]
pub struct DuplicateExport {
    pub name: String,
    pub first: PathBuf,
    pub second: PathBuf,
}

/// What to do with the final rendered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Print,
    Copy,
    Exec,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "print" => Ok(OutputMode::Print),
            "copy" => Ok(OutputMode::Copy),
            "exec" => Ok(OutputMode::Exec),
            _ => Err(format!("output mode must be print|copy|exec, got '{raw}'")),
        }
    }
}
