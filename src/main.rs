use std::io::IsTerminal;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use serde::Serialize;

use margin_annotations::editor::{DecorationType, TextBuffer};
use margin_annotations::provider::{AnnotationProvider, RecentChangesAnnotationProvider};
use margin_codelens::controller::{CodeLensController, ControllerContext};
use margin_codelens::provider::{CodeLens, GitCodeLensProvider};
use margin_codelens::registry::{ContextKeys, ProviderRegistry};
use margin_codelens::tracker::DocumentStateTracker;
use margin_core::{ConfigurationStore, GitUri, MarginConfig, MarkdownString, OutputFormat};
use margin_difflens::diff::LineState;
use margin_git::repository::{discover_repo_root, LocalGitService};

#[derive(Parser)]
#[command(
    name = "margin",
    version,
    about = "Git provenance for the editor margin",
    long_about = "Margin shows where the lines of a file came from.\n\n\
                   It highlights the lines changed since a file's previous revision and\n\
                   summarizes blame as code lenses, the same data an editor integration\n\
                   paints into the margin.\n\n\
                   Examples:\n  \
                     margin annotate src/main.rs     Lines changed by the last commit\n  \
                     margin lenses src/main.rs       Recent change and authors summary\n  \
                     git diff | margin diff          Map a diff onto document lines\n  \
                     margin init                     Create a .margin.toml config file"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .margin.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summaries (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  The hover content as Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging (overridden by MARGIN_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Show the lines changed since the file's previous revision
    #[command(long_about = "Show the lines changed since the file's previous revision.\n\n\
        Finds the last commit that touched the file, diffs the working copy against\n\
        the revision before it, and reports each changed line with its hovers.\n\n\
        Examples:\n  margin annotate src/lib.rs\n  margin annotate src/lib.rs --format markdown")]
    Annotate {
        /// File to annotate
        file: PathBuf,

        /// Repository root (default: discovered from the file)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// Show the code lenses for a file
    #[command(long_about = "Show the code lenses for a file.\n\n\
        Blames the working copy and reports the most recent change and the\n\
        file's authors, as enabled under [codeLens] in the configuration.\n\n\
        Examples:\n  margin lenses src/lib.rs\n  margin lenses src/lib.rs --format json")]
    Lenses {
        /// File to inspect
        file: PathBuf,

        /// Repository root (default: discovered from the file)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// Map a unified diff onto current document lines
    #[command(long_about = "Map a unified diff onto current document lines.\n\n\
        Reads a diff from stdin or a file and lists the changed lines of each file\n\
        as zero-based document lines.\n\n\
        Examples:\n  git diff HEAD~1 | margin diff\n  margin diff --file changes.patch")]
    Diff {
        /// Read diff from file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Create a default .margin.toml configuration file
    #[command(long_about = "Create a default .margin.toml configuration file.\n\n\
        Writes every available option with its default value.\n\
        Fails if .margin.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotatedLine {
    /// One-based line number.
    line: u32,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<MarkdownString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    changes: Option<MarkdownString>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationReport {
    uri: GitUri,
    lines: Vec<AnnotatedLine>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LensReport {
    uri: GitUri,
    lenses: Vec<CodeLens>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MappedLine {
    line: i64,
    state: LineState,
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MappedFile {
    path: PathBuf,
    lines: Vec<MappedLine>,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        println!("\x1b[1mmargin\x1b[0m v{version}: git provenance for the editor margin\n");

        println!("Quick start:");
        println!("  \x1b[36mmargin init\x1b[0m                 Create a .margin.toml config file");
        println!("  \x1b[36mmargin annotate <file>\x1b[0m      Lines changed by the last commit");
        println!("  \x1b[36mmargin lenses <file>\x1b[0m        Recent change and authors summary\n");

        println!("All commands:");
        println!("  \x1b[32mannotate\x1b[0m  Recent changes with commit and diff hovers");
        println!("  \x1b[32mlenses\x1b[0m    Blame code lenses");
        println!("  \x1b[32mdiff\x1b[0m      Map a unified diff onto document lines");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("margin v{version}: git provenance for the editor margin\n");

        println!("Quick start:");
        println!("  margin init                 Create a .margin.toml config file");
        println!("  margin annotate <file>      Lines changed by the last commit");
        println!("  margin lenses <file>        Recent change and authors summary\n");

        println!("All commands:");
        println!("  annotate  Recent changes with commit and diff hovers");
        println!("  lenses    Blame code lenses");
        println!("  diff      Map a unified diff onto document lines");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'margin <command> --help' for details.");
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("MARGIN_LOG").unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn read_diff_input(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            if std::io::stdin().is_terminal() {
                miette::bail!("no diff given: pipe one in or pass --file");
            }
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading diff from stdin")?;
            Ok(input)
        }
    }
}

/// Resolve `file` to its repository root and repository-relative path.
fn locate(file: &Path, repo: Option<&Path>) -> Result<GitUri> {
    let absolute = file
        .canonicalize()
        .into_diagnostic()
        .wrap_err(format!("resolving {}", file.display()))?;

    let root = match repo {
        Some(repo) => repo.to_path_buf(),
        None => discover_repo_root(absolute.parent().unwrap_or(Path::new(".")))?,
    };
    let root = root
        .canonicalize()
        .into_diagnostic()
        .wrap_err(format!("resolving {}", root.display()))?;

    let relative = absolute
        .strip_prefix(&root)
        .into_diagnostic()
        .wrap_err(format!("{} is outside {}", file.display(), root.display()))?
        .to_path_buf();

    Ok(GitUri::new(root, relative))
}

async fn run_annotate(uri: GitUri, config: MarginConfig, format: OutputFormat) -> Result<()> {
    let editor = Rc::new(TextBuffer::from_file(&uri.fs_path())?);
    let provider = RecentChangesAnnotationProvider::new(
        Rc::new(LocalGitService::new()),
        Rc::clone(&editor),
        uri.clone(),
        DecorationType::new("margin.recentChanges"),
        Rc::new(ConfigurationStore::new(config)),
    );

    let applied = provider.provide_annotation(None).await;
    let decorations = if applied {
        provider.decorations()
    } else {
        Vec::new()
    };

    // Decorations come in (base, highlight) pairs per line
    let lines: Vec<AnnotatedLine> = decorations
        .chunks(2)
        .map(|pair| {
            let line = pair[0].range.start.line;
            AnnotatedLine {
                line: line + 1,
                text: editor.line(line).unwrap_or_default().to_string(),
                details: pair[0].hover_message.clone(),
                changes: pair.get(1).and_then(|d| d.hover_message.clone()),
            }
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let report = AnnotationReport { uri, lines };
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Recent changes in `{uri}`\n");
            if let Some(details) = lines.iter().find_map(|l| l.details.as_ref()) {
                println!("{details}\n");
            }
            for line in &lines {
                println!("## Line {}\n", line.line);
                match &line.changes {
                    Some(changes) => println!("{changes}\n"),
                    None => println!("    {}\n", line.text),
                }
            }
        }
        OutputFormat::Text => {
            if lines.is_empty() {
                println!("{uri}: no recent changes");
                return Ok(());
            }
            println!("{uri}: {} changed lines", lines.len());
            for line in &lines {
                println!("{:>6} | {}", line.line, line.text);
            }
        }
    }

    Ok(())
}

async fn run_lenses(uri: GitUri, config: MarginConfig, format: OutputFormat) -> Result<()> {
    let store = Rc::new(ConfigurationStore::new(config));
    let tracker = Rc::new(DocumentStateTracker::new());
    let registry = ProviderRegistry::new();
    let git = Rc::new(LocalGitService::new());

    let provider_config = Rc::clone(&store);
    let controller = CodeLensController::new(
        ControllerContext {
            config: store,
            tracker: tracker.clone(),
            registry: Rc::new(registry.clone()),
            context: Rc::new(ContextKeys::new()),
        },
        GitCodeLensProvider::<LocalGitService>::selector(),
        move || Rc::new(GitCodeLensProvider::new(Rc::clone(&git), Rc::clone(&provider_config))),
    );
    tracker.open(&uri, true);

    let lenses = match controller.provider() {
        Some(provider) => provider.provide_code_lenses(&uri).await?,
        None => {
            tracing::info!("code lenses are disabled by configuration");
            Vec::new()
        }
    };
    controller.dispose();

    match format {
        OutputFormat::Json => {
            let report = LensReport { uri, lenses };
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Code lenses for `{uri}`\n");
            for lens in &lenses {
                println!("- {}", lens.title);
            }
        }
        OutputFormat::Text => {
            if lenses.is_empty() {
                println!("{uri}: no code lenses");
            }
            for lens in &lenses {
                println!("{}", lens.title);
            }
        }
    }

    Ok(())
}

fn run_diff(input: &str, format: OutputFormat) -> Result<()> {
    let diffs = margin_difflens::parser::parse_unified_diff(input)?;

    let files: Vec<MappedFile> = diffs
        .iter()
        .map(|diff| MappedFile {
            path: diff.new_path.clone(),
            lines: diff
                .chunks
                .iter()
                .flat_map(|chunk| chunk.changed_lines())
                .filter_map(|(line, diff_line)| {
                    Some(MappedLine {
                        line,
                        state: diff_line.state()?,
                        text: diff_line.text()?.to_string(),
                    })
                })
                .collect(),
        })
        .collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&files).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            for file in &files {
                println!("## `{}`\n", file.path.display());
                println!("| Line | State | Text |");
                println!("|------|-------|------|");
                for line in &file.lines {
                    println!("| {} | {} | `{}` |", line.line, line.state, line.text);
                }
                println!();
            }
        }
        OutputFormat::Text => {
            for file in &files {
                println!("{} ({} changed lines)", file.path.display(), file.lines.len());
                for line in &file.lines {
                    println!("{:>6}  {:<9} {}", line.line, line.state.to_string(), line.text);
                }
            }
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Margin configuration
# Keys mirror the editor settings; every value shown is the default.

# "relative" (3 days ago) or "absolute"
defaultDateStyle = "relative"
# strftime format for absolute dates
# defaultDateFormat = "%B %-d, %Y %-I:%M%P"

[annotations.file.recentChanges.hover]
# Commit summary on hover
details = true
# The line's diff against the previous revision on hover
changes = true

[blame.file]
# gutter | heatmap | hover | recentChanges
annotationType = "gutter"

[codeLens]
enabled = true

[codeLens.recentChange]
enabled = true

[codeLens.authors]
enabled = true
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => MarginConfig::from_file(path)?,
        None => {
            let default_path = Path::new(".margin.toml");
            if default_path.exists() {
                MarginConfig::from_file(default_path)?
            } else {
                MarginConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    tracing::debug!(format = %cli.format, "configuration loaded");

    match cli.command {
        None => {
            print_welcome(use_color);
        }
        Some(Command::Annotate { ref file, ref repo }) => {
            let uri = locate(file, repo.as_deref())?;
            run_annotate(uri, config, cli.format).await?;
        }
        Some(Command::Lenses { ref file, ref repo }) => {
            let uri = locate(file, repo.as_deref())?;
            run_lenses(uri, config, cli.format).await?;
        }
        Some(Command::Diff { ref file }) => {
            let input = read_diff_input(file)?;
            run_diff(&input, cli.format)?;
        }
        Some(Command::Init) => {
            let path = Path::new(".margin.toml");
            if path.exists() {
                miette::bail!(".margin.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .margin.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "margin", &mut std::io::stdout());
        }
    }

    Ok(())
}
