//! End-to-end CLI tests for the non-interactive surfaces.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cheatmd() -> Command {
    Command::cargo_bin("cheatmd").expect("cheatmd binary")
}

fn write_doc(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(path, body).expect("write doc");
}

/// A home directory with no config file, so user settings never leak in.
fn bare_home() -> TempDir {
    TempDir::new().expect("home dir")
}

// ============================================
// Basic CLI
// ============================================

mod cli_basics {
    use super::*;

    #[test]
    fn shows_help() {
        cheatmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("cheatmd"))
            .stdout(predicate::str::contains("--match"))
            .stdout(predicate::str::contains("widget"));
    }

    #[test]
    fn shows_version() {
        cheatmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn missing_path_fails() {
        let home = bare_home();
        cheatmd()
            .env("HOME", home.path())
            .arg("/definitely/not/a/real/path")
            .assert()
            .failure()
            .stderr(predicate::str::contains("does not exist"));
    }
}

// ============================================
// Widget scripts
// ============================================

mod widget {
    use super::*;

    #[test]
    fn bash_widget() {
        cheatmd()
            .args(["widget", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("READLINE_LINE"))
            .stdout(predicate::str::contains("cheatmd --print"));
    }

    #[test]
    fn zsh_widget() {
        cheatmd()
            .args(["widget", "zsh"])
            .assert()
            .success()
            .stdout(predicate::str::contains("bindkey"));
    }

    #[test]
    fn fish_widget() {
        cheatmd()
            .args(["widget", "fish"])
            .assert()
            .success()
            .stdout(predicate::str::contains("commandline"));
    }

    #[test]
    fn unsupported_shell_fails() {
        cheatmd()
            .args(["widget", "powershell"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unsupported shell"));
    }
}

// ============================================
// Parsing and benchmark
// ============================================

mod parsing {
    use super::*;

    #[test]
    fn benchmark_counts_cheats() {
        let home = bare_home();
        let temp = TempDir::new().expect("temp dir");
        write_doc(temp.path(), "a.md", "## One\n```sh\necho one\n```\n");
        write_doc(temp.path(), "sub/b.md", "## Two\n```sh\necho two\n```\n");

        cheatmd()
            .env("HOME", home.path())
            .arg(temp.path())
            .arg("--benchmark")
            .assert()
            .success()
            .stdout(predicate::str::contains("Loaded 2 cheats from 2 files"));
    }

    #[test]
    fn benchmark_single_file() {
        let home = bare_home();
        let temp = TempDir::new().expect("temp dir");
        write_doc(temp.path(), "one.md", "## A\n```sh\nls\n```\n");

        cheatmd()
            .env("HOME", home.path())
            .arg(temp.path().join("one.md"))
            .arg("--benchmark")
            .assert()
            .success()
            .stdout(predicate::str::contains("Loaded 1 cheats from 1 files"));
    }

    #[test]
    fn no_cheats_found_fails() {
        let home = bare_home();
        let temp = TempDir::new().expect("temp dir");
        write_doc(temp.path(), "empty.md", "just prose, no code\n");

        cheatmd()
            .env("HOME", home.path())
            .arg(temp.path())
            .arg("--print")
            .assert()
            .failure()
            .stderr(predicate::str::contains("no cheats found"));
    }

    #[test]
    fn duplicate_exports_warn_on_stderr() {
        let home = bare_home();
        let temp = TempDir::new().expect("temp dir");
        let module = "<!-- cheat\nexport shared\nvar x = printf 'a'\n-->\n## H\n```sh\nls\n```\n";
        write_doc(temp.path(), "a.md", module);
        write_doc(temp.path(), "b.md", module);

        cheatmd()
            .env("HOME", home.path())
            .arg(temp.path())
            .arg("--benchmark")
            .assert()
            .success()
            .stderr(predicate::str::contains("export \"shared\""))
            .stderr(predicate::str::contains("a.md"))
            .stderr(predicate::str::contains("b.md"));
    }

    #[test]
    fn path_from_environment_override() {
        let home = bare_home();
        let temp = TempDir::new().expect("temp dir");
        write_doc(temp.path(), "a.md", "## One\n```sh\necho one\n```\n");

        cheatmd()
            .env("HOME", home.path())
            .env("CHEATMD_PATH", temp.path())
            .arg("--benchmark")
            .assert()
            .success()
            .stdout(predicate::str::contains("Loaded 1 cheats"));
    }
}

// ============================================
// --match fast path (no interaction needed)
// ============================================

mod match_preseed {
    use super::*;

    #[test]
    fn exact_match_without_vars_prints_directly() {
        let home = bare_home();
        let temp = TempDir::new().expect("temp dir");
        write_doc(
            temp.path(),
            "a.md",
            "## Hello\n```sh\necho hello\n```\n<!-- cheat -->\n",
        );

        cheatmd()
            .env("HOME", home.path())
            .arg(temp.path())
            .args(["--print", "--match", "echo hello"])
            .assert()
            .success()
            .stdout(predicate::eq("echo hello"));
    }

    #[test]
    fn print_applies_hooks() {
        let home = bare_home();
        let temp = TempDir::new().expect("temp dir");
        write_doc(
            temp.path(),
            "a.md",
            "## Hello\n```sh\necho hello\n```\n<!-- cheat -->\n",
        );

        cheatmd()
            .env("HOME", home.path())
            .env("CHEATMD_PRE_HOOK", "time ")
            .arg(temp.path())
            .args(["--print", "--match", "echo hello"])
            .assert()
            .success()
            .stdout(predicate::eq("time echo hello"));
    }
}
