use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use hunkwise::conflict::{
    ConflictOperation, ConflictResolution, ConflictService, ConflictSession,
};
use hunkwise::diff::format_diff;
use hunkwise::selection::parse_keys;
use hunkwise::split::format_split;
use hunkwise::{
    Config, ConflictError, DiffTarget, DiffViewer, GitCli, HunkwiseError, StagingAction,
};

const SPLIT_COLUMN_WIDTH: usize = 60;

#[derive(Parser)]
#[command(name = "hunkwise", version)]
#[command(about = "Hunk and line level staging and conflict resolution for git")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Repository working tree
    #[arg(long, global = true, env = "HUNKWISE_REPO", default_value = ".")]
    repo: PathBuf,

    /// Context lines around each change
    #[arg(long, global = true, env = "HUNKWISE_CONTEXT", default_value_t = 3)]
    context: u32,

    /// Skip word level highlighting
    #[arg(long, global = true, env = "HUNKWISE_NO_WORD_DIFF")]
    no_word_diff: bool,

    /// git executable
    #[arg(long, global = true, env = "HUNKWISE_GIT", default_value = "git")]
    git: String,

    /// More log output (-v info, -vv debug); HUNKWISE_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

impl GlobalArgs {
    fn config(&self) -> Config {
        Config::new(&self.repo)
            .with_context_lines(self.context)
            .with_word_diff(!self.no_word_diff)
            .with_git_binary(&self.git)
    }
}

#[derive(Args)]
struct Target {
    /// Hunk number as shown by `hunkwise diff`
    #[arg(long, conflicts_with = "lines", required_unless_present = "lines")]
    hunk: Option<usize>,

    /// Comma separated HUNK-LINE keys, e.g. 0-1,0-2
    #[arg(long)]
    lines: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    Ours,
    Theirs,
    Both,
}

#[derive(Clone, Copy, ValueEnum)]
enum MergeSide {
    Base,
    Ours,
    Theirs,
}

#[derive(Subcommand)]
enum Commands {
    /// Show changes with hunk numbers and line keys
    Diff {
        /// Limit to one file
        path: Option<String>,
        /// Show staged changes
        #[arg(long)]
        staged: bool,
        /// Show the changes a commit made to PATH (read-only)
        #[arg(long, conflicts_with = "staged", requires = "path")]
        commit: Option<String>,
        /// Two column layout
        #[arg(long)]
        split: bool,
        /// JSON output
        #[arg(long, conflicts_with = "split")]
        json: bool,
    },
    /// Stage a hunk or selected lines
    Stage {
        path: Option<String>,
        #[command(flatten)]
        target: Target,
    },
    /// Unstage a hunk or selected lines
    Unstage {
        path: Option<String>,
        #[command(flatten)]
        target: Target,
    },
    /// Discard working tree changes of a hunk or selected lines
    Discard {
        path: Option<String>,
        #[command(flatten)]
        target: Target,
    },
    /// List conflicted files and their blocks
    Conflicts {
        #[arg(long)]
        json: bool,
    },
    /// Resolve one block, or every block of a file and mark it resolved
    Resolve {
        path: String,
        /// Block number as shown by `hunkwise conflicts`
        #[arg(long)]
        block: Option<usize>,
        #[arg(required_unless_present = "manual", conflicts_with = "manual")]
        side: Option<Side>,
        /// Use the content of FILE instead
        #[arg(long, value_name = "FILE")]
        manual: Option<PathBuf>,
    },
    /// Print the base, ours or theirs version of a conflicted file
    MergeBase {
        path: String,
        #[arg(long, value_enum, default_value = "base")]
        side: MergeSide,
        /// All three versions as JSON
        #[arg(long, conflicts_with = "side")]
        json: bool,
    },
    /// Stage a file whose blocks are all resolved
    MarkResolved { path: String },
    /// Conclude the merge, rebase, cherry-pick or revert
    Continue {
        /// Merge commit message (defaults to git's prepared message)
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Abort the merge, rebase, cherry-pick or revert
    Abort,
    /// Generate shell completions
    Completions { shell: Shell },
    /// Generate a man page
    Man,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_env("HUNKWISE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), HunkwiseError> {
    let config = cli.global.config();

    match cli.command {
        Commands::Diff {
            path,
            staged,
            commit,
            split,
            json,
        } => {
            let git = GitCli::open(config)?;
            let target = match (commit, path) {
                (Some(commit_id), Some(path)) => DiffTarget::Commit { commit_id, path },
                (_, path) => DiffTarget::WorkingTree { path, staged },
            };
            let mut viewer = DiffViewer::new(target);
            viewer.refresh(&git)?;

            let output = if json {
                to_json(&viewer.files())?
            } else if split {
                format_split(viewer.files(), SPLIT_COLUMN_WIDTH)
            } else {
                format_diff(viewer.files())
            };
            print!("{}", output);
        }
        Commands::Stage { path, target } => {
            apply(config, path, &target, StagingAction::Stage)?;
        }
        Commands::Unstage { path, target } => {
            apply(config, path, &target, StagingAction::Unstage)?;
        }
        Commands::Discard { path, target } => {
            apply(config, path, &target, StagingAction::Discard)?;
        }
        Commands::Conflicts { json } => {
            let git = GitCli::open(config)?;
            let files = git.get_conflict_files()?;
            if json {
                println!("{}", to_json(&files)?);
            } else {
                for file in &files {
                    println!("{}: {} blocks", file.path, file.conflict_count);
                    for (index, block) in file.conflicts.iter().enumerate() {
                        let base = if block.base.is_some() { " (with base)" } else { "" };
                        println!(
                            "  #{} lines {}-{}{}",
                            index, block.start_line, block.end_line, base
                        );
                    }
                }
            }
        }
        Commands::Resolve {
            path,
            block,
            side,
            manual,
        } => {
            let resolution = match (side, manual) {
                (_, Some(file)) => {
                    let content =
                        std::fs::read_to_string(&file).map_err(|e| HunkwiseError::ReadInput {
                            path: file.display().to_string(),
                            message: e.to_string(),
                        })?;
                    ConflictResolution::Manual(content)
                }
                (Some(Side::Ours), None) | (None, None) => ConflictResolution::Ours,
                (Some(Side::Theirs), None) => ConflictResolution::Theirs,
                (Some(Side::Both), None) => ConflictResolution::Both,
            };

            let git = GitCli::open(config)?;
            let mut session = ConflictSession::open(&git)?;
            match block {
                Some(index) => {
                    session.resolve_block(&git, &path, index, resolution)?;
                    let remaining = session.file(&path).map_or(0, |f| f.remaining());
                    println!("Resolved block {} of {} ({} remaining)", index, path, remaining);
                }
                None => {
                    session.resolve_file(&git, &path, resolution)?;
                    println!("Resolved and marked {}", path);
                }
            }
        }
        Commands::MergeBase {
            path,
            side,
            json,
        } => {
            let git = GitCli::open(config)?;
            let session = ConflictSession::open(&git)?;
            let content = session.merge_base_content(&git, &path)?;
            if json {
                println!("{}", to_json(&content)?);
            } else {
                let text = match side {
                    MergeSide::Base => content.base,
                    MergeSide::Ours => content.ours,
                    MergeSide::Theirs => content.theirs,
                };
                // A missing stage means the file was added or deleted on that side
                print!("{}", text.unwrap_or_default());
            }
        }
        Commands::MarkResolved { path } => {
            let git = GitCli::open(config)?;
            let mut session = ConflictSession::open(&git)?;
            session.mark_resolved(&git, &path)?;
            println!(
                "Marked {} ({}/{} files resolved)",
                path,
                session.resolved_count(),
                session.total_count()
            );
        }
        Commands::Continue { message } => {
            let git = GitCli::open(config)?;
            let remaining = git.get_conflict_files()?;
            if !remaining.is_empty() {
                return Err(ConflictError::NotReadyToContinue {
                    resolved: 0,
                    total: remaining.len(),
                }
                .into());
            }

            let operation = ConflictOperation::detect(&git)?;
            let outcome = operation.conclude(&git, message.as_deref())?;
            if outcome.completed {
                println!("Done");
            } else {
                println!("Stopped on new conflicts:");
                for path in &outcome.conflicts {
                    println!("  {}", path);
                }
            }
        }
        Commands::Abort => {
            let git = GitCli::open(config)?;
            let operation = ConflictOperation::detect(&git)?;
            operation.abort(&git)?;
            println!("Aborted {}", operation);
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "hunkwise", &mut io::stdout());
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command())
                .render(&mut io::stdout())
                .map_err(|e| HunkwiseError::WriteOutput {
                    message: e.to_string(),
                })?;
        }
    }

    Ok(())
}

/// Refresh the working tree view, then apply the action to a hunk or to the
/// selected lines
fn apply(
    config: Config,
    path: Option<String>,
    target: &Target,
    action: StagingAction,
) -> Result<(), HunkwiseError> {
    let git = GitCli::open(config)?;
    let mut viewer = DiffViewer::new(DiffTarget::WorkingTree {
        path: path.clone(),
        staged: action == StagingAction::Unstage,
    });
    viewer.refresh(&git)?;
    if viewer.files().iter().all(|f| f.hunks.is_empty()) {
        return Err(HunkwiseError::NoChanges {
            path: path.unwrap_or_else(|| "the working tree".to_string()),
        });
    }

    match target.hunk {
        Some(index) => {
            viewer.apply_hunk(&git, index, action)?;
            println!("{}d hunk #{}", capitalized(action), index);
        }
        None => {
            let keys = parse_keys(target.lines.as_deref().unwrap_or_default())?;
            for key in &keys {
                viewer.toggle_line(*key)?;
            }
            let count = viewer.selection().len();
            viewer.apply_selection(&git, action)?;
            println!("{}d {} lines", capitalized(action), count);
        }
    }

    Ok(())
}

fn capitalized(action: StagingAction) -> String {
    let name = action.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, HunkwiseError> {
    serde_json::to_string_pretty(value).map_err(|e| HunkwiseError::WriteOutput {
        message: e.to_string(),
    })
}
