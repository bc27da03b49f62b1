//! Shell execution, clipboard transport, and final-command dispatch.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{OutputMode, Scope, Snippet};
use crate::vars;

/// Shell command execution as the resolver sees it: run a command and
/// hand back trimmed stdout, or pipe a value through a transform.
pub trait ShellRunner: Send + Sync {
    /// Run `command` via the configured shell, returning trimmed stdout.
    /// Non-zero exit is an error carrying stderr.
    fn run(&self, command: &str) -> Result<String>;

    /// Run `command` with `input` on stdin, returning trimmed stdout.
    fn pipe(&self, command: &str, input: &str) -> Result<String>;

    /// Run `command` interactively, inheriting all three standard streams.
    fn execute(&self, command: &str) -> Result<()>;
}

/// Clipboard side channel.
pub trait Clipboard {
    fn copy(&self, text: &str) -> Result<()>;
}

/// Runs commands through `<shell> -c`.
pub struct SystemShell {
    shell: String,
}

impl SystemShell {
    pub fn new(shell: impl Into<String>) -> Self {
        SystemShell {
            shell: shell.into(),
        }
    }
}

impl ShellRunner for SystemShell {
    fn run(&self, command: &str) -> Result<String> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| Error::ShellSourceFailed {
                detail: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(Error::ShellSourceFailed {
                detail: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn pipe(&self, command: &str, input: &str) -> Result<String> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| Error::ShellSourceFailed {
                detail: err.to_string(),
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::ShellSourceFailed {
                detail: output.status.to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn execute(&self, command: &str) -> Result<()> {
        let status = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        if !status.success() {
            return Err(Error::ShellSourceFailed {
                detail: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Pipes text to the first clipboard tool found on PATH.
pub struct SystemClipboard;

const CLIPBOARD_BACKENDS: &[&[&str]] = &[
    &["wl-copy"],
    &["xclip", "-selection", "clipboard"],
    &["xsel", "--clipboard", "--input"],
    &["pbcopy"],
];

impl Clipboard for SystemClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        let backend = CLIPBOARD_BACKENDS
            .iter()
            .find(|argv| command_exists(argv[0]))
            .ok_or(Error::ClipboardUnavailable)?;

        let mut child = Command::new(backend[0])
            .args(&backend[1..])
            .stdin(Stdio::piped())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(Error::ShellSourceFailed {
                detail: format!("{} exited with {}", backend[0], status),
            });
        }
        Ok(())
    }
}

/// PATH lookup for an executable, like `exec.LookPath`.
fn command_exists(name: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| is_executable(&dir.join(name)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Substitute a snippet's resolved scope into its command template.
pub fn build_final_command(snippet: &Snippet) -> String {
    render_scoped(&snippet.command, &snippet.scope)
}

pub fn render_scoped(template: &str, scope: &Scope) -> String {
    vars::render_command(template, scope)
}

/// Final-command dispatch: print, copy, or execute, with the configured
/// pre/post hooks applied first.
pub struct Dispatcher {
    pub output: OutputMode,
    pub pre_hook: String,
    pub post_hook: String,
    shell: SystemShell,
    clipboard: Box<dyn Clipboard>,
}

impl Dispatcher {
    pub fn new(config: &Config, output: OutputMode) -> Self {
        Dispatcher {
            output,
            pre_hook: config.pre_hook.clone(),
            post_hook: config.post_hook.clone(),
            shell: SystemShell::new(config.shell.clone()),
            clipboard: Box::new(SystemClipboard),
        }
    }

    pub fn hooked(&self, command: &str) -> String {
        format!("{}{}{}", self.pre_hook, command, self.post_hook)
    }

    /// Deliver the final command. Print writes to stdout with no
    /// trailing newline; a missing clipboard backend falls back to
    /// printing with a note on stderr.
    pub fn dispatch(&self, command: &str) -> Result<()> {
        let command = self.hooked(command);
        match self.output {
            OutputMode::Exec => {
                eprintln!("\u{25b6} Executing: {command}");
                self.shell.execute(&command)
            }
            OutputMode::Copy => match self.clipboard.copy(&command) {
                Ok(()) => {
                    eprintln!("\u{2713} Copied to clipboard");
                    Ok(())
                }
                Err(Error::ClipboardUnavailable) => {
                    eprintln!("[cheatmd][warn] {}", Error::ClipboardUnavailable);
                    print!("{command}");
                    flush_stdout();
                    Ok(())
                }
                Err(err) => Err(err),
            },
            OutputMode::Print => {
                print!("{command}");
                flush_stdout();
                Ok(())
            }
        }
    }
}

fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

/// Open a file in the configured editor, or the platform default.
pub fn open_in_viewer(editor: &str, path: &Path) {
    let mut cmd = if !editor.is_empty() {
        let mut cmd = Command::new(editor);
        cmd.arg(path);
        cmd
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    } else {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    };
    let _ = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();
}

/// Tilde-expanded path from a config or CLI value.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}
