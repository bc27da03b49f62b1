//! # cheatmd
//!
//! Executable markdown cheatsheets. Plain documents with fenced shell
//! snippets, annotated with a small declarative language, become an
//! interactive command launcher: browse and filter snippets, fill in
//! their variables (prompted, shell-sourced, or literal), and print,
//! copy, or execute the rendered command.
//!
//! ## Library layout
//!
//! - [`parser`] / [`scan`] / [`index`] — document grammar, parallel
//!   loading, and the queryable snippet/module index
//! - [`filter`] — word-based snippet filtering for phase 1
//! - [`resolver`] — dependency-ordered variable resolution with
//!   conditional variants, driven as an event-fed state machine
//! - [`matcher`] / [`infer`] — `--match` pre-seeding and the inference
//!   of values a seeded scope implies
//! - [`tui`] — the two-phase terminal selector
//! - [`executor`] — shell runner, clipboard, and output dispatch
//! - [`config`] — YAML settings with `CHEATMD_*` overrides

pub mod config;
pub mod error;
pub mod executor;
pub mod filter;
pub mod index;
pub mod infer;
pub mod matcher;
pub mod parser;
pub mod resolver;
pub mod scan;
pub mod tui;
pub mod types;
pub mod vars;
pub mod widget;

pub use error::{Error, Result};
pub use index::Index;
pub use types::{Module, OutputMode, Scope, Snippet, VarDef, VarSource};
