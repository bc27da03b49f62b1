//! Selector state machine.
//!
//! Pure state + event handling for both phases, decoupled from the
//! terminal: events come in through [`App::handle_event`], side effects
//! (background shell commands, debounce ticks, opening files) come out
//! as [`Effect`]s for the event loop to execute. This keeps the whole
//! interaction scriptable in tests.

use std::path::PathBuf;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::executor::ShellRunner;
use crate::filter::{self, FILTER_CAP, Row};
use crate::index::Index;
use crate::resolver::{Action, Back, Choice, PromptCtx, Resolution, ShellReply};
use crate::tui::styles::Styles;
use crate::types::Snippet;

/// Messages delivered to the event loop.
#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    Resize(u16, u16),
    /// Debounced filter tick; only the latest sequence number applies.
    FilterTick(u64),
    /// A background source command finished.
    ShellDone {
        generation: u64,
        result: Result<Vec<String>, String>,
    },
}

/// Side effects the loop must execute after handling an event.
#[derive(Debug, PartialEq, Eq)]
pub enum Effect {
    RunShell { generation: u64, command: String },
    Debounce { seq: u64 },
    OpenFile(PathBuf),
}

/// How the session ended.
#[derive(Debug)]
pub enum Outcome {
    Cancelled,
    Resolved(Snippet),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pick,
    Resolve,
}

/// Presentation mode for the current variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Source command still running.
    Waiting,
    /// Free-text input.
    Input,
    /// Filterable candidate list.
    Select,
}

pub struct ResolveState {
    pub snippet: Snippet,
    pub resolution: Resolution,
    pub mode: ResolveMode,
    pub ctx: Option<PromptCtx>,
    pub choices: Vec<Choice>,
    /// Indices into `choices` matching the current input.
    pub filtered: Vec<usize>,
    pub input: String,
    pub cursor: usize,
    pub offset: usize,
    pub shell_error: Option<String>,
}

/// Display column widths, from the `column_*` config keys.
#[derive(Debug, Clone, Copy)]
pub struct Columns {
    pub gap: usize,
    pub header: usize,
    pub desc: usize,
    pub command: usize,
}

pub struct App {
    pub styles: Styles,
    pub columns: Columns,
    pub phase: Phase,
    pub query: String,
    pub cursor: usize,
    pub offset: usize,
    pub width: u16,
    pub height: u16,
    pub resolve: Option<ResolveState>,
    snippets: Vec<Snippet>,
    rows: Vec<Row>,
    filtered: Vec<usize>,
    filter_seq: u64,
    index: Index,
    runner: Arc<dyn ShellRunner>,
    auto_continue: bool,
    editor: String,
    effects: Vec<Effect>,
    outcome: Option<Outcome>,
}

pub struct AppSetup {
    pub snippets: Vec<Snippet>,
    pub index: Index,
    pub runner: Arc<dyn ShellRunner>,
    pub styles: Styles,
    pub columns: Columns,
    pub auto_continue: bool,
    pub auto_select: bool,
    pub editor: String,
    pub initial_query: String,
    /// A snippet pre-matched by `--match`, entering resolution directly.
    pub preselected: Option<Snippet>,
}

impl App {
    pub fn new(setup: AppSetup) -> App {
        let rows = filter::build_rows(&setup.snippets);
        let filtered = filter::filter(&rows, &setup.initial_query, FILTER_CAP);
        let mut app = App {
            styles: setup.styles,
            columns: setup.columns,
            phase: Phase::Pick,
            query: setup.initial_query,
            cursor: 0,
            offset: 0,
            width: 80,
            height: 24,
            resolve: None,
            snippets: setup.snippets,
            rows,
            filtered,
            filter_seq: 0,
            index: setup.index,
            runner: setup.runner,
            auto_continue: setup.auto_continue,
            editor: setup.editor,
            effects: Vec::new(),
            outcome: None,
        };

        if let Some(snippet) = setup.preselected {
            app.start_resolution(snippet);
        } else if setup.auto_select && !app.query.is_empty() && app.filtered.len() == 1 {
            let snippet = app.snippets[app.filtered[0]].clone();
            app.start_resolution(snippet);
        }
        app
    }

    pub fn snippets(&self) -> &[Snippet] {
        &self.snippets
    }

    pub fn filtered(&self) -> &[usize] {
        &self.filtered
    }

    pub fn snippet_at_cursor(&self) -> Option<&Snippet> {
        self.filtered
            .get(self.cursor)
            .and_then(|&i| self.snippets.get(i))
    }

    pub fn runner(&self) -> Arc<dyn ShellRunner> {
        Arc::clone(&self.runner)
    }

    pub fn editor(&self) -> &str {
        &self.editor
    }

    pub fn row_folder(&self, idx: usize) -> &str {
        self.rows.get(idx).map(|r| r.folder.as_str()).unwrap_or("")
    }

    pub fn row_stem(&self, idx: usize) -> &str {
        self.rows.get(idx).map(|r| r.stem.as_str()).unwrap_or("")
    }

    /// Effects queued since the last call.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    pub fn take_outcome(&mut self) -> Option<Outcome> {
        self.outcome.take()
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Resize(width, height) => {
                self.width = width;
                self.height = height;
                self.clamp_pick_cursor();
            }
            Event::FilterTick(seq) => {
                if seq == self.filter_seq {
                    self.apply_filter();
                }
            }
            Event::ShellDone { generation, result } => self.handle_shell_done(generation, result),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        match self.phase {
            Phase::Pick => self.handle_pick_key(key),
            Phase::Resolve => self.handle_resolve_key(key),
        }
    }

    // ------------------------------------------------------------------
    // Phase 1: snippet selection
    // ------------------------------------------------------------------

    fn handle_pick_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => self.outcome = Some(Outcome::Cancelled),
            KeyCode::Char('c') if ctrl => self.outcome = Some(Outcome::Cancelled),
            KeyCode::Enter => {
                if let Some(snippet) = self.snippet_at_cursor().cloned() {
                    self.start_resolution(snippet);
                }
            }
            KeyCode::Up => self.move_pick_cursor(-1),
            KeyCode::Char('p') if ctrl => self.move_pick_cursor(-1),
            KeyCode::Down => self.move_pick_cursor(1),
            KeyCode::Char('n') if ctrl => self.move_pick_cursor(1),
            KeyCode::PageUp => self.move_pick_cursor(-10),
            KeyCode::PageDown => self.move_pick_cursor(10),
            KeyCode::Home => self.jump_pick_cursor(0),
            KeyCode::Char('a') if ctrl => self.jump_pick_cursor(0),
            KeyCode::End => self.jump_pick_cursor(usize::MAX),
            KeyCode::Char('e') if ctrl => self.jump_pick_cursor(usize::MAX),
            KeyCode::Char('o') if ctrl => {
                if let Some(snippet) = self.snippet_at_cursor() {
                    self.effects.push(Effect::OpenFile(snippet.file.clone()));
                }
            }
            KeyCode::Backspace => {
                if self.query.pop().is_some() {
                    self.schedule_filter();
                }
            }
            KeyCode::Char(c) if !ctrl => {
                self.query.push(c);
                self.schedule_filter();
            }
            _ => {}
        }
    }

    fn schedule_filter(&mut self) {
        self.filter_seq += 1;
        self.effects.push(Effect::Debounce {
            seq: self.filter_seq,
        });
    }

    fn apply_filter(&mut self) {
        self.filtered = filter::filter(&self.rows, &self.query, FILTER_CAP);
        self.clamp_pick_cursor();
    }

    fn move_pick_cursor(&mut self, delta: i64) {
        let len = self.filtered.len();
        let max = len.saturating_sub(1);
        let next = (self.cursor as i64).saturating_add(delta);
        self.cursor = next.clamp(0, max as i64) as usize;
        self.adjust_offset(len);
    }

    fn jump_pick_cursor(&mut self, target: usize) {
        self.cursor = target.min(self.filtered.len().saturating_sub(1));
        self.adjust_offset(self.filtered.len());
    }

    fn clamp_pick_cursor(&mut self) {
        self.cursor = self.cursor.min(self.filtered.len().saturating_sub(1));
        self.adjust_offset(self.filtered.len());
    }

    /// Keep the cursor inside the estimated viewport; the renderer does
    /// the final per-frame adjustment with the real list height.
    fn adjust_offset(&mut self, total: usize) {
        let view = self.view_height();
        if self.cursor < self.offset {
            self.offset = self.cursor;
        }
        if self.cursor >= self.offset + view {
            self.offset = self.cursor + 1 - view;
        }
        self.offset = self.offset.min(total.saturating_sub(view));
    }

    fn view_height(&self) -> usize {
        (self.height as usize).saturating_sub(10).max(3)
    }

    // ------------------------------------------------------------------
    // Phase 2: variable resolution
    // ------------------------------------------------------------------

    fn start_resolution(&mut self, snippet: Snippet) {
        let resolution = Resolution::new(
            &snippet,
            &self.index,
            Arc::clone(&self.runner),
            self.auto_continue,
        );
        self.resolve = Some(ResolveState {
            snippet,
            resolution,
            mode: ResolveMode::Waiting,
            ctx: None,
            choices: Vec::new(),
            filtered: Vec::new(),
            input: String::new(),
            cursor: 0,
            offset: 0,
            shell_error: None,
        });
        self.phase = Phase::Resolve;
        self.drive_step();
    }

    /// Pump the resolution machine until it needs outside help.
    fn drive_step(&mut self) {
        let Some(rs) = self.resolve.as_mut() else {
            return;
        };
        rs.cursor = 0;
        rs.offset = 0;
        rs.choices.clear();
        rs.filtered.clear();
        rs.shell_error = None;
        match rs.resolution.step() {
            Action::Done(scope) => {
                let mut state = self.resolve.take().expect("resolution present");
                state.snippet.scope = scope;
                self.outcome = Some(Outcome::Resolved(state.snippet));
            }
            Action::Prompt(ctx) => {
                rs.mode = ResolveMode::Input;
                rs.input = ctx.prefill.clone();
                rs.shell_error = ctx.shell_error.clone();
                rs.ctx = Some(ctx);
            }
            Action::RunShell {
                generation,
                command,
            } => {
                rs.mode = ResolveMode::Waiting;
                rs.ctx = None;
                rs.input.clear();
                self.effects.push(Effect::RunShell {
                    generation,
                    command,
                });
            }
        }
    }

    fn handle_shell_done(&mut self, generation: u64, result: Result<Vec<String>, String>) {
        let Some(rs) = self.resolve.as_mut() else {
            return;
        };
        match rs.resolution.on_shell(generation, result) {
            None => {}
            Some(ShellReply::Prompt(ctx)) => {
                rs.mode = ResolveMode::Input;
                rs.input = ctx.prefill.clone();
                rs.shell_error = ctx.shell_error.clone();
                rs.ctx = Some(ctx);
            }
            Some(ShellReply::Select { ctx, choices }) => {
                rs.mode = ResolveMode::Select;
                rs.input = ctx.prefill.clone();
                rs.ctx = Some(ctx);
                rs.choices = choices;
                rs.cursor = 0;
                rs.offset = 0;
                Self::filter_choices(rs);
            }
        }
    }

    fn handle_resolve_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let Some(rs) = self.resolve.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Char('c') if ctrl => self.outcome = Some(Outcome::Cancelled),
            KeyCode::Esc => match rs.resolution.back() {
                Back::Reprompt => self.drive_step(),
                Back::ToSnippetList => self.leave_resolution(),
            },
            KeyCode::Enter => {
                match rs.mode {
                    ResolveMode::Waiting => return,
                    ResolveMode::Input => {
                        let value = std::mem::take(&mut rs.input);
                        rs.resolution.accept_input(value);
                    }
                    ResolveMode::Select => {
                        if let Some(&choice) = rs.filtered.get(rs.cursor) {
                            let original = rs.choices[choice].original.clone();
                            rs.resolution.accept_choice(&original);
                        } else {
                            let value = std::mem::take(&mut rs.input);
                            rs.resolution.accept_input(value);
                        }
                    }
                }
                self.drive_step();
            }
            KeyCode::Up => Self::move_choice_cursor(rs, -1, self.height),
            KeyCode::Char('p') if ctrl => Self::move_choice_cursor(rs, -1, self.height),
            KeyCode::Down => Self::move_choice_cursor(rs, 1, self.height),
            KeyCode::Char('n') if ctrl => Self::move_choice_cursor(rs, 1, self.height),
            KeyCode::PageUp => Self::move_choice_cursor(rs, -10, self.height),
            KeyCode::PageDown => Self::move_choice_cursor(rs, 10, self.height),
            KeyCode::Home => Self::move_choice_cursor(rs, i64::MIN, self.height),
            KeyCode::Char('a') if ctrl => Self::move_choice_cursor(rs, i64::MIN, self.height),
            KeyCode::End => Self::move_choice_cursor(rs, i64::MAX, self.height),
            KeyCode::Char('e') if ctrl => Self::move_choice_cursor(rs, i64::MAX, self.height),
            KeyCode::Tab => {
                if rs.mode == ResolveMode::Select {
                    if let Some(&choice) = rs.filtered.get(rs.cursor) {
                        rs.input = rs.choices[choice].display.clone();
                        Self::filter_choices(rs);
                    }
                }
            }
            KeyCode::Char('o') if ctrl => {
                self.effects.push(Effect::OpenFile(rs.snippet.file.clone()));
            }
            KeyCode::Backspace => {
                if rs.input.pop().is_some() && rs.mode == ResolveMode::Select {
                    Self::filter_choices(rs);
                }
            }
            KeyCode::Char(c) if !ctrl => {
                rs.input.push(c);
                if rs.mode == ResolveMode::Select {
                    Self::filter_choices(rs);
                }
            }
            _ => {}
        }
    }

    fn leave_resolution(&mut self) {
        self.resolve = None;
        self.phase = Phase::Pick;
        self.query.clear();
        self.cursor = 0;
        self.offset = 0;
        self.apply_filter();
    }

    /// Candidate filtering is immediate; only the phase-1 snippet filter
    /// is debounced.
    fn filter_choices(rs: &mut ResolveState) {
        let query = rs.input.trim().to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();
        rs.filtered = rs
            .choices
            .iter()
            .enumerate()
            .filter(|(_, choice)| {
                words.is_empty()
                    || words.iter().all(|word| {
                        choice.display.to_lowercase().contains(word)
                            || choice.original.to_lowercase().contains(word)
                    })
            })
            .map(|(i, _)| i)
            .collect();
        rs.cursor = rs.cursor.min(rs.filtered.len().saturating_sub(1));
        rs.offset = rs.offset.min(rs.cursor);
    }

    fn move_choice_cursor(rs: &mut ResolveState, delta: i64, height: u16) {
        if rs.mode != ResolveMode::Select {
            return;
        }
        let len = rs.filtered.len();
        let max = len.saturating_sub(1);
        let next = (rs.cursor as i64).saturating_add(delta);
        rs.cursor = next.clamp(0, max as i64) as usize;
        let view = (height as usize).saturating_sub(10).max(3).min(10);
        if rs.cursor < rs.offset {
            rs.offset = rs.cursor;
        }
        if rs.cursor >= rs.offset + view {
            rs.offset = rs.cursor + 1 - view;
        }
        rs.offset = rs.offset.min(len.saturating_sub(view));
    }
}
