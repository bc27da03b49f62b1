//! Interactive selector: terminal ownership and the event loop.
//!
//! One thread owns the terminal and all UI state. Keyboard input,
//! window resizes, debounce ticks, and background shell completions all
//! arrive as messages on a single channel and are processed in arrival
//! order. Auxiliary shell commands never block the loop: they run on
//! short-lived threads and post a generation-tagged completion.
//!
//! When stdout is captured (command substitution, a pipe), the UI is
//! drawn to `/dev/tty` so stdout stays clean for the final command;
//! crossterm reads input from the controlling terminal on Unix, falling
//! back to stdin. With no controlling terminal at all, output falls
//! back to stderr.

mod app;
mod styles;
mod ui;

pub use app::{App, AppSetup, Columns, Effect, Event, Outcome, Phase, ResolveMode};
pub use styles::Styles;

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Stderr, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use crossterm::event::{self as term_event, Event as TermEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::error::{Error, Result};
use crate::executor::{ShellRunner, open_in_viewer};
use crate::vars;

const FILTER_DEBOUNCE: Duration = Duration::from_millis(50);

/// Where the UI is painted.
pub enum TtyOut {
    Stdout(Stdout),
    Tty(File),
    Stderr(Stderr),
}

impl Write for TtyOut {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TtyOut::Stdout(out) => out.write(buf),
            TtyOut::Tty(out) => out.write(buf),
            TtyOut::Stderr(out) => out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TtyOut::Stdout(out) => out.flush(),
            TtyOut::Tty(out) => out.flush(),
            TtyOut::Stderr(out) => out.flush(),
        }
    }
}

fn acquire_output() -> TtyOut {
    if io::stdout().is_terminal() {
        return TtyOut::Stdout(io::stdout());
    }
    match OpenOptions::new().write(true).open("/dev/tty") {
        Ok(tty) => TtyOut::Tty(tty),
        Err(_) => TtyOut::Stderr(io::stderr()),
    }
}

type Tui = Terminal<CrosstermBackend<TtyOut>>;

fn setup_terminal() -> Result<Tui> {
    let mut out = acquire_output();
    enable_raw_mode().map_err(|err| Error::TerminalUnavailable(err.to_string()))?;
    execute!(out, EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(out))?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the two-phase selector to completion.
pub fn run(mut app: App) -> Result<Outcome> {
    // A --match/--auto bootstrap can finish without any interaction;
    // skip terminal setup entirely in that case.
    if let Some(outcome) = app.take_outcome() {
        return Ok(outcome);
    }

    let (tx, rx) = mpsc::channel::<Event>();
    let runner = app.runner();
    let editor = app.editor().to_string();
    let bootstrap = app.take_effects();

    let mut terminal = setup_terminal()?;
    let stop_input = Arc::new(AtomicBool::new(false));
    let input_thread = spawn_input_thread(tx.clone(), Arc::clone(&stop_input));
    run_effects(bootstrap, &tx, &runner, &editor);

    let result = event_loop(&mut terminal, &mut app, &rx, &tx, &runner, &editor);

    // Stop the reader before anything else touches the terminal (an
    // exec'd command inherits stdin).
    stop_input.store(true, Ordering::Relaxed);
    let restored = restore_terminal(&mut terminal);
    let _ = input_thread.join();

    let outcome = result?;
    restored?;
    Ok(outcome)
}

fn event_loop(
    terminal: &mut Tui,
    app: &mut App,
    rx: &Receiver<Event>,
    tx: &Sender<Event>,
    runner: &Arc<dyn ShellRunner>,
    editor: &str,
) -> Result<Outcome> {
    loop {
        terminal.draw(|frame| ui::draw(frame, app))?;

        let Ok(event) = rx.recv() else {
            return Ok(Outcome::Cancelled);
        };
        app.handle_event(event);
        run_effects(app.take_effects(), tx, runner, editor);

        if let Some(outcome) = app.take_outcome() {
            return Ok(outcome);
        }
    }
}

fn run_effects(
    effects: Vec<Effect>,
    tx: &Sender<Event>,
    runner: &Arc<dyn ShellRunner>,
    editor: &str,
) {
    for effect in effects {
        match effect {
            Effect::Debounce { seq } => {
                let tx = tx.clone();
                thread::spawn(move || {
                    thread::sleep(FILTER_DEBOUNCE);
                    let _ = tx.send(Event::FilterTick(seq));
                });
            }
            Effect::RunShell {
                generation,
                command,
            } => {
                let tx = tx.clone();
                let runner = Arc::clone(runner);
                thread::spawn(move || {
                    let result = runner
                        .run(&command)
                        .map(|output| vars::split_lines(&output))
                        .map_err(|err| err.to_string());
                    let _ = tx.send(Event::ShellDone { generation, result });
                });
            }
            Effect::OpenFile(path) => open_in_viewer(editor, &path),
        }
    }
}

fn spawn_input_thread(tx: Sender<Event>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        loop {
            if stop.load(Ordering::Relaxed) {
                return;
            }
            match term_event::poll(Duration::from_millis(100)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(_) => return,
            }
            match term_event::read() {
                Ok(TermEvent::Key(key)) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    if tx.send(Event::Key(key)).is_err() {
                        return;
                    }
                }
                Ok(TermEvent::Resize(width, height)) => {
                    if tx.send(Event::Resize(width, height)).is_err() {
                        return;
                    }
                }
                Ok(_) => {}
                Err(_) => return,
            }
        }
    })
}
