use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use cheatmd::config::Config;
use cheatmd::executor::{Dispatcher, SystemShell, build_final_command, expand_path};
use cheatmd::types::{OutputMode, Snippet};
use cheatmd::tui::{App, AppSetup, Columns, Outcome, Styles};
use cheatmd::{infer, matcher, scan, tui, widget};

/// Executable markdown cheatsheets: browse, fill in variables, run.
#[derive(Parser, Debug)]
#[command(author, version, about, subcommand_precedence_over_arg = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<CliCommand>,

    /// Cheatsheet directory or file (defaults to the configured path).
    path: Option<PathBuf>,

    /// Output mode: print, copy, exec.
    #[arg(long, short = 'o')]
    output: Option<String>,

    /// Print the command (shorthand for -o print).
    #[arg(long)]
    print: bool,

    /// Copy the command (shorthand for -o copy).
    #[arg(long)]
    copy: bool,

    /// Execute the command (shorthand for -o exec).
    #[arg(long)]
    exec: bool,

    /// Initial search query.
    #[arg(long, short = 'q')]
    query: Option<String>,

    /// Match a command line and enter resolution pre-seeded from it.
    #[arg(long, short = 'm')]
    r#match: Option<String>,

    /// Skip selection when the query matches exactly one snippet.
    #[arg(long)]
    auto: bool,

    /// Parse only, print timings, and exit.
    #[arg(long, short = 'b')]
    benchmark: bool,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Print a shell widget script for line-editor integration.
    Widget {
        /// Target shell: bash, zsh, or fish.
        shell: String,
    },
}

fn install_broken_pipe_handler() {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let payload = info.payload();
        let is_broken = payload
            .downcast_ref::<&str>()
            .is_some_and(|s| s.contains("Broken pipe"))
            || payload
                .downcast_ref::<String>()
                .is_some_and(|s| s.contains("Broken pipe"));

        if is_broken {
            // Quietly exit when downstream closes the pipe (e.g. piping to `head`).
            std::process::exit(0);
        }

        default_hook(info);
    }));
}

fn main() {
    install_broken_pipe_handler();
    if let Err(err) = run() {
        eprintln!("cheatmd: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(CliCommand::Widget { shell }) = &cli.command {
        let Some(script) = widget::widget_script(shell) else {
            bail!("unsupported shell: {shell} (supported: bash, zsh, fish)");
        };
        print!("{script}");
        return Ok(());
    }

    let mut config = Config::load();
    apply_cli_overrides(&cli, &mut config);

    let root = cli
        .path
        .clone()
        .unwrap_or_else(|| expand_path(&config.path));
    if !root.exists() {
        bail!("path does not exist: {}", root.display());
    }

    let start = Instant::now();
    let scanned = scan::load_index(&root)
        .with_context(|| format!("parsing {}", root.display()))?;
    let elapsed = start.elapsed();

    for dup in scanned.index.duplicates() {
        eprintln!(
            "[cheatmd][warn] export \"{}\" defined in both {} and {}",
            dup.name,
            dup.first.display(),
            dup.second.display()
        );
    }

    if cli.benchmark {
        println!(
            "Loaded {} cheats from {} files in {:.2?}",
            scanned.index.len(),
            scanned.files,
            elapsed
        );
        return Ok(());
    }

    let snippets: Vec<Snippet> = scanned
        .index
        .snippets()
        .iter()
        .filter(|snippet| !config.require_cheat_block || snippet.has_annotation_block)
        .cloned()
        .collect();
    if snippets.is_empty() {
        return Err(cheatmd::Error::NoSnippets(root).into());
    }

    let output = config.output_mode();
    let dispatcher = Dispatcher::new(&config, output);
    let runner = Arc::new(SystemShell::new(config.shell.clone()));

    // --match: pre-seed scope from the input line when a template
    // matches; otherwise the input becomes the initial filter query.
    let mut initial_query = cli.query.clone().unwrap_or_default();
    let mut preselected = None;
    if let Some(input) = &cli.r#match {
        match matcher::find_matching_snippet(&snippets, input) {
            Some(i) => {
                let mut snippet = snippets[i].clone();
                matcher::preseed_scope(&mut snippet, input);
                infer::infer_dependent_vars(&mut snippet, &scanned.index);
                preselected = Some(snippet);
            }
            None => initial_query = input.clone(),
        }
    }

    let app = App::new(AppSetup {
        snippets,
        index: scanned.index,
        runner,
        styles: Styles::from_config(&config),
        columns: Columns {
            gap: config.column_gap,
            header: config.column_header,
            desc: config.column_desc,
            command: config.column_command,
        },
        auto_continue: config.auto_continue,
        auto_select: config.auto_select,
        editor: config.editor.clone(),
        initial_query,
        preselected,
    });

    match tui::run(app)? {
        Outcome::Cancelled => Ok(()),
        Outcome::Resolved(snippet) => {
            let command = build_final_command(&snippet);
            dispatcher.dispatch(&command)?;
            Ok(())
        }
    }
}

fn apply_cli_overrides(cli: &Cli, config: &mut Config) {
    if cli.print {
        config.output = "print".into();
    } else if cli.copy {
        config.output = "copy".into();
    } else if cli.exec {
        config.output = "exec".into();
    } else if let Some(output) = &cli.output {
        // Validate eagerly so a typo fails before any UI comes up.
        if output.parse::<OutputMode>().is_err() {
            eprintln!("[cheatmd][warn] unknown output mode '{output}', using print");
        }
        config.output = output.clone();
    }
    if cli.auto {
        config.auto_select = true;
    }
}
