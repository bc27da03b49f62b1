//! In-memory index of parsed snippets and modules.
//!
//! Built once at startup, read-only afterwards. Snippet order matches
//! document iteration order; the module map is last-wins, with every
//! collision recorded for the startup warning.

use std::collections::HashMap;

use crate::parser::FileParse;
use crate::types::{DuplicateExport, Module, Snippet};

#[derive(Debug, Default)]
pub struct Index {
    snippets: Vec<Snippet>,
    modules: HashMap<String, Module>,
    duplicates: Vec<DuplicateExport>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_snippet(&mut self, snippet: Snippet) {
        self.snippets.push(snippet);
    }

    /// Record a module. A name collision appends to `duplicates`; the
    /// later definition wins.
    pub fn register_module(&mut self, module: Module) {
        if let Some(existing) = self.modules.get(&module.name) {
            self.duplicates.push(DuplicateExport {
                name: module.name.clone(),
                first: existing.file.clone(),
                second: module.file.clone(),
            });
        }
        self.modules.insert(module.name.clone(), module);
    }

    /// Absorb one document's parse results, preserving document order.
    pub fn merge(&mut self, parse: FileParse) {
        for module in parse.modules {
            self.register_module(module);
        }
        for snippet in parse.snippets {
            self.add_snippet(snippet);
        }
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn snippets(&self) -> &[Snippet] {
        &self.snippets
    }

    pub fn duplicates(&self) -> &[DuplicateExport] {
        &self.duplicates
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }
}
