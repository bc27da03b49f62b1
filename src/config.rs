//! Configuration loading.
//!
//! Settings come from a `cheatmd.yaml` file searched in
//! `~/.config/cheatmd/`, the home directory, and the current directory,
//! in that order. `CHEATMD_*` environment variables override file
//! values. A malformed file warns and falls back to defaults; a missing
//! file is normal.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::OutputMode;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cheatsheet directory (or file). Tilde-expanded at use.
    pub path: String,
    /// Output mode: print, copy, or exec.
    pub output: String,
    /// Shell used for auxiliary commands and `exec`.
    pub shell: String,
    /// Prepended to the final command before dispatch.
    pub pre_hook: String,
    /// Appended to the final command before dispatch.
    pub post_hook: String,
    /// Only list snippets carrying an annotation block.
    pub require_cheat_block: bool,
    /// With `--query`, enter resolution directly on a unique match.
    pub auto_select: bool,
    /// Accept prefilled values without prompting.
    pub auto_continue: bool,
    /// Viewer for Ctrl+O; empty means the platform default.
    pub editor: String,

    pub color_header: String,
    pub color_command: String,
    pub color_desc: String,
    pub color_path: String,
    pub color_border: String,
    pub color_cursor: String,
    pub color_selected: String,
    pub color_dim: String,

    pub column_gap: usize,
    pub column_header: usize,
    pub column_desc: usize,
    pub column_command: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            path: ".".into(),
            output: "print".into(),
            shell: String::new(),
            pre_hook: String::new(),
            post_hook: String::new(),
            require_cheat_block: false,
            auto_select: false,
            auto_continue: false,
            editor: String::new(),
            color_header: "36".into(),
            color_command: "32".into(),
            color_desc: "90".into(),
            color_path: "33".into(),
            color_border: "240".into(),
            color_cursor: "212".into(),
            color_selected: "236".into(),
            color_dim: "241".into(),
            column_gap: 4,
            column_header: 40,
            column_desc: 40,
            column_command: 60,
        }
    }
}

impl Config {
    /// Load from the first config file found, apply `CHEATMD_*`
    /// environment overrides, and fill the shell from `$SHELL`.
    pub fn load() -> Config {
        let mut config = config_file_candidates()
            .into_iter()
            .find(|path| path.exists())
            .map(|path| Config::load_from_path(&path))
            .unwrap_or_default();
        config.apply_env_overrides(|key| env::var(key).ok());
        if config.shell.is_empty() {
            config.shell = env::var("SHELL").unwrap_or_else(|_| "/bin/bash".into());
        }
        config
    }

    /// Load from a specific path, falling back to defaults on error.
    pub fn load_from_path(path: &Path) -> Config {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str(&content) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("[cheatmd][warn] failed to parse {}: {}", path.display(), err);
                    Config::default()
                }
            },
            Err(err) => {
                eprintln!("[cheatmd][warn] failed to read {}: {}", path.display(), err);
                Config::default()
            }
        }
    }

    /// Apply `CHEATMD_<KEY>` overrides. The lookup function is injected
    /// so tests can script the environment.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn set_string(target: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *target = value;
            }
        }
        fn set_bool(target: &mut bool, value: Option<String>) {
            if let Some(value) = value {
                *target = matches!(value.as_str(), "1" | "true" | "yes");
            }
        }
        fn set_usize(target: &mut usize, value: Option<String>) {
            if let Some(parsed) = value.and_then(|v| v.parse().ok()) {
                *target = parsed;
            }
        }

        set_string(&mut self.path, lookup("CHEATMD_PATH"));
        set_string(&mut self.output, lookup("CHEATMD_OUTPUT"));
        set_string(&mut self.shell, lookup("CHEATMD_SHELL"));
        set_string(&mut self.pre_hook, lookup("CHEATMD_PRE_HOOK"));
        set_string(&mut self.post_hook, lookup("CHEATMD_POST_HOOK"));
        set_bool(
            &mut self.require_cheat_block,
            lookup("CHEATMD_REQUIRE_CHEAT_BLOCK"),
        );
        set_bool(&mut self.auto_select, lookup("CHEATMD_AUTO_SELECT"));
        set_bool(&mut self.auto_continue, lookup("CHEATMD_AUTO_CONTINUE"));
        set_string(&mut self.editor, lookup("CHEATMD_EDITOR"));

        set_string(&mut self.color_header, lookup("CHEATMD_COLOR_HEADER"));
        set_string(&mut self.color_command, lookup("CHEATMD_COLOR_COMMAND"));
        set_string(&mut self.color_desc, lookup("CHEATMD_COLOR_DESC"));
        set_string(&mut self.color_path, lookup("CHEATMD_COLOR_PATH"));
        set_string(&mut self.color_border, lookup("CHEATMD_COLOR_BORDER"));
        set_string(&mut self.color_cursor, lookup("CHEATMD_COLOR_CURSOR"));
        set_string(&mut self.color_selected, lookup("CHEATMD_COLOR_SELECTED"));
        set_string(&mut self.color_dim, lookup("CHEATMD_COLOR_DIM"));

        set_usize(&mut self.column_gap, lookup("CHEATMD_COLUMN_GAP"));
        set_usize(&mut self.column_header, lookup("CHEATMD_COLUMN_HEADER"));
        set_usize(&mut self.column_desc, lookup("CHEATMD_COLUMN_DESC"));
        set_usize(&mut self.column_command, lookup("CHEATMD_COLUMN_COMMAND"));
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output.parse().unwrap_or_default()
    }

    /// The cheatsheet path with tilde expansion.
    pub fn expanded_path(&self) -> PathBuf {
        crate::executor::expand_path(&self.path)
    }
}

fn config_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(home) = env::var_os("HOME").map(PathBuf::from) {
        candidates.push(home.join(".config").join("cheatmd").join("cheatmd.yaml"));
        candidates.push(home.join("cheatmd.yaml"));
    }
    candidates.push(PathBuf::from("cheatmd.yaml"));
    candidates
}
