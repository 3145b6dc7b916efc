//! Claude Sentinel - Adaptive review gating and knowledge validation for Claude Code sessions.

use std::io::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use claude_sentinel::config::{ConfigLoader, SentinelConfig};
use claude_sentinel::context::{TaskKind, TaskSpec};
use claude_sentinel::cycle::Sentinel;
use claude_sentinel::display;
use claude_sentinel::knowledge::{Category, KnowledgeEntry, Priority, QueryKeywords};
use claude_sentinel::learning::ReviewDecision;
use claude_sentinel::monitor::SessionEvent;
use claude_sentinel::storage::StateDir;
use claude_sentinel::validate::ValidatedSuggestion;
use claude_sentinel::worker::{RawSuggestion, SuggestionSource, WorkerClient, WorkerError};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Pattern,
    Preference,
    Gotcha,
    Solution,
    Correction,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Pattern => Category::Pattern,
            CategoryArg::Preference => Category::Preference,
            CategoryArg::Gotcha => Category::Gotcha,
            CategoryArg::Solution => Category::Solution,
            CategoryArg::Correction => Category::Correction,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PriorityArg {
    Critical,
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Critical => Priority::Critical,
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TaskArg {
    Review,
    Plan,
    Debug,
}

impl From<TaskArg> for TaskKind {
    fn from(arg: TaskArg) -> Self {
        match arg {
            TaskArg::Review => TaskKind::Review,
            TaskArg::Plan => TaskKind::Plan,
            TaskArg::Debug => TaskKind::Debug,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "sentinel",
    about = "Adaptive review gating and knowledge validation for Claude Code sessions",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a config file (default: .claude-sentinel.toml, then user config dir)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the state directory for this project.
    Init,
    /// Record a session event.
    Record {
        #[command(subcommand)]
        event: RecordCommands,
    },
    /// Check which review triggers would fire right now.
    Check,
    /// Show session counters and health.
    Status,
    /// Run a review cycle and walk through the suggestions.
    Review {
        /// Task shape for context gathering.
        #[arg(short, long, value_enum, default_value_t = TaskArg::Review)]
        kind: TaskArg,
        /// Files the task touches, relative to the project root.
        #[arg(short, long)]
        file: Vec<String>,
        /// Free-form focus line carried into the context bundle.
        #[arg(long)]
        focus: Option<String>,
        /// Error text for debug tasks.
        #[arg(long)]
        error: Option<String>,
        /// Accept every suggestion without prompting.
        #[arg(long)]
        accept_all: bool,
        /// Print suggestions and leave the decisions for later.
        #[arg(long)]
        defer: bool,
    },
    /// Inspect or extend the knowledge store.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeCommands,
    },
    /// Inspect acceptance stats and tune trigger thresholds.
    Learn {
        #[command(subcommand)]
        action: LearnCommands,
    },
    /// Write a handoff note and start a fresh session.
    Handoff,
}

#[derive(Subcommand)]
enum RecordCommands {
    /// Lines written to a file.
    Lines { file: String, lines: u32 },
    /// An error message was seen.
    Error { message: String },
    /// A file was edited.
    Edit { file: String },
    /// The user corrected the assistant.
    Correction,
    /// Context window usage as a fraction, 0.0 to 1.0.
    Context { fraction: f64 },
}

#[derive(Subcommand)]
enum KnowledgeCommands {
    /// Add an entry.
    Add {
        title: String,
        content: String,
        #[arg(short = 'C', long, value_enum)]
        category: CategoryArg,
        #[arg(short, long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
        /// Tags for relevance matching, repeatable.
        #[arg(short, long)]
        tag: Vec<String>,
    },
    /// Query entries by keyword.
    Query {
        keywords: Vec<String>,
        #[arg(short = 'C', long, value_enum)]
        category: Option<CategoryArg>,
    },
    /// Show category counts and the most-recalled entries.
    Summary,
}

#[derive(Subcommand)]
enum LearnCommands {
    /// Per-category acceptance rates.
    Stats,
    /// Rejection reasons and anti-patterns.
    Insights,
    /// Preview threshold moves without applying them.
    Recommend,
    /// Apply threshold moves to the tuning overlay.
    Adjust,
}

/// Stands in for the worker when no API key is configured. Reviews
/// still run; the cycle degrades to zero suggestions.
struct UnconfiguredWorker(String);

#[async_trait]
impl SuggestionSource for UnconfiguredWorker {
    async fn run(&self, _bundle: &str) -> Result<Vec<RawSuggestion>, WorkerError> {
        Err(WorkerError::MissingApiKey(self.0.clone()))
    }
}

/// Placeholder worker for commands that never run a review.
fn no_worker() -> Box<dyn SuggestionSource> {
    Box::new(UnconfiguredWorker(String::new()))
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<SentinelConfig, Box<dyn std::error::Error>> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    Ok(loader.load()?)
}

/// Open the sentinel over the nearest state directory.
async fn open_sentinel(
    config_path: Option<PathBuf>,
    worker: Box<dyn SuggestionSource>,
) -> Result<Sentinel, Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let cwd = std::env::current_dir()?;
    let state = StateDir::discover(&cwd)
        .ok_or("no state directory found; run `sentinel init` first")?;
    Ok(Sentinel::new(state, config, worker).await)
}

/// Build the real worker, falling back to a degraded stand-in when the
/// API key is missing.
fn build_worker(config: &SentinelConfig) -> Box<dyn SuggestionSource> {
    match WorkerClient::from_config(config.worker.clone()) {
        Ok(client) => Box::new(client),
        Err(e) => {
            display::print_error(&format!("{e}; reviews will run without suggestions"));
            Box::new(UnconfiguredWorker(config.worker.api_key_env.clone()))
        }
    }
}

/// Walk the suggestions one by one, asking for a verdict on each.
fn read_decisions(suggestions: &[ValidatedSuggestion]) -> Vec<ReviewDecision> {
    let stdin = std::io::stdin();
    let mut decisions = Vec::new();

    for (index, suggestion) in suggestions.iter().enumerate() {
        display::print_suggestion(index + 1, suggestion);
        loop {
            print!("  accept? [y/n/s] ");
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            if stdin.read_line(&mut line).is_err() || line.is_empty() {
                return decisions;
            }
            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => {
                    decisions.push(ReviewDecision::accept(
                        &suggestion.suggestion.category,
                        &suggestion.suggestion.text,
                    ));
                    break;
                }
                "n" | "no" => {
                    print!("  why? (optional) ");
                    let _ = std::io::stdout().flush();
                    let mut reason = String::new();
                    let _ = stdin.read_line(&mut reason);
                    let reason = reason.trim();
                    decisions.push(ReviewDecision::reject(
                        &suggestion.suggestion.category,
                        &suggestion.suggestion.text,
                        (!reason.is_empty()).then(|| reason.to_string()),
                    ));
                    break;
                }
                "s" | "skip" => break,
                _ => println!("  y = accept, n = reject, s = skip"),
            }
        }
    }

    decisions
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Init => {
            let cwd = std::env::current_dir()?;
            let state = StateDir::at(&cwd);
            state.ensure().await?;
            println!("Initialized state directory at {}", state.root().display());
        }
        Commands::Record { event } => {
            let sentinel = open_sentinel(cli.config, no_worker()).await?;
            let event = match event {
                RecordCommands::Lines { file, lines } => SessionEvent::CodeWritten { file, lines },
                RecordCommands::Error { message } => SessionEvent::ErrorSeen { message },
                RecordCommands::Edit { file } => SessionEvent::FileEdited { file },
                RecordCommands::Correction => SessionEvent::Correction,
                RecordCommands::Context { fraction } => SessionEvent::ContextUsage { fraction },
            };
            sentinel.monitor().record_event(&event).await?;
        }
        Commands::Check => {
            let sentinel = open_sentinel(cli.config, no_worker()).await?;
            let triggers = sentinel.monitor().check_triggers().await;
            if triggers.is_empty() {
                println!("No review needed");
            } else {
                for trigger in &triggers {
                    display::print_trigger(trigger);
                }
                println!("Run `sentinel review` to clear the gate");
            }
        }
        Commands::Status => {
            let sentinel = open_sentinel(cli.config, no_worker()).await?;
            display::print_status(&sentinel.monitor().counters().await);
            display::print_health(&sentinel.health().await);
        }
        Commands::Review {
            kind,
            file,
            focus,
            error,
            accept_all,
            defer,
        } => {
            let config = load_config(cli.config.clone())?;
            let worker = build_worker(&config);
            let sentinel = open_sentinel(cli.config, worker).await?;

            let mut task = TaskSpec::new(kind.into());
            task.files = file;
            task.focus = focus;
            task.error = error;

            let report = sentinel.run_cycle(&task).await?;
            if !report.review_ran() {
                println!("No review needed");
                return Ok(());
            }

            for trigger in &report.triggers {
                display::print_trigger(trigger);
            }
            display::print_review_header(report.suggestions.len(), report.worker_degraded);

            if defer {
                for (index, suggestion) in report.suggestions.iter().enumerate() {
                    display::print_suggestion(index + 1, suggestion);
                }
                println!("Decisions deferred; counters left in place");
                return Ok(());
            }

            let decisions = if accept_all {
                for (index, suggestion) in report.suggestions.iter().enumerate() {
                    display::print_suggestion(index + 1, suggestion);
                }
                report
                    .suggestions
                    .iter()
                    .map(|s| ReviewDecision::accept(&s.suggestion.category, &s.suggestion.text))
                    .collect()
            } else {
                read_decisions(&report.suggestions)
            };

            sentinel.apply_decisions(&report, &decisions).await?;
        }
        Commands::Knowledge { action } => {
            let sentinel = open_sentinel(cli.config, no_worker()).await?;
            match action {
                KnowledgeCommands::Add {
                    title,
                    content,
                    category,
                    priority,
                    tag,
                } => {
                    let entry = KnowledgeEntry::new(category.into(), priority.into(), title, content)
                        .with_tags(tag)
                        .with_learned_from("manual");
                    let id = sentinel.store().add(entry).await?;
                    println!("Added entry {id}");
                }
                KnowledgeCommands::Query { keywords, category } => {
                    let compiled = QueryKeywords::compile(&keywords);
                    let categories = category
                        .map_or_else(|| Category::ALL.to_vec(), |c| vec![c.into()]);
                    let results = sentinel.store().query_default(&compiled, &categories).await;
                    if results.is_empty() {
                        println!("No matching entries");
                    }
                    for scored in &results {
                        display::print_scored_entry(scored.score, &scored.entry);
                    }
                }
                KnowledgeCommands::Summary => {
                    display::print_store_summary(&sentinel.store().summary().await);
                }
            }
        }
        Commands::Learn { action } => {
            let sentinel = open_sentinel(cli.config, no_worker()).await?;
            match action {
                LearnCommands::Stats => {
                    display::print_stats(&sentinel.learning().stats().await);
                }
                LearnCommands::Insights => {
                    display::print_insights(&sentinel.learning().insights().await);
                }
                LearnCommands::Recommend => {
                    let deltas = sentinel.learning().recommend().await;
                    if deltas.is_empty() {
                        println!("Thresholds are in balance; nothing to change");
                    }
                    for delta in &deltas {
                        display::print_delta(delta, false);
                    }
                }
                LearnCommands::Adjust => {
                    let deltas = sentinel.learning().adjust().await?;
                    if deltas.is_empty() {
                        println!("Thresholds are in balance; nothing to change");
                    }
                    for delta in &deltas {
                        display::print_delta(delta, true);
                    }
                }
            }
        }
        Commands::Handoff => {
            let sentinel = open_sentinel(cli.config, no_worker()).await?;
            let path = sentinel.write_handoff().await?;
            display::print_handoff_written(&path);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        display::print_error(&e.to_string());
        std::process::exit(1);
    }
}
