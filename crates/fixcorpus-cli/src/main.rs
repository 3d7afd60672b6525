//! fixcorpus - Bug-Fix Commit Harvesting CLI
//!
//! The `fixcorpus` command mines GitHub repositories for small bug-fix
//! commits and files their hunks into a local dataset repository.
//!
//! ## Commands
//!
//! - `init`: create the collection root and its dataset repository
//! - `collect`: process a feed of `owner/repo sha` pairs
//! - `qualify`: dry-run the filters against a single commit

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use fixcorpus_core::{
    qualify, Collector, CollectorConfig, FilterConfig, GitWorkTree, GithubConfig, GithubHosting,
    HandleOutcome, HostingClient, Hunk, ProcessedLedger, PushTarget, DEFAULT_BATCH_SIZE,
    DEFAULT_MESSAGE_PREFIX,
};

/// Directory under `$HOME` used when no collection root is given.
const DEFAULT_ROOT_DIR: &str = "continuous-learning-data";

#[derive(Parser)]
#[command(name = "fixcorpus")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bug-fix commit harvester for learning datasets", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the collection root and its dataset repository
    Init {
        /// Collection root (default: ~/continuous-learning-data)
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Collect commits from a feed of `owner/repo sha` lines
    Collect {
        /// Feed file, one `owner/repo sha` pair per line (default: stdin)
        #[arg(short, long)]
        feed: Option<PathBuf>,

        /// Collection root (default: ~/continuous-learning-data)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Reject commits that touch more than one file
        #[arg(long)]
        filter_multi_file: bool,

        /// Reject commits that keep more than one hunk after merging
        #[arg(long)]
        filter_multi_hunk: bool,

        /// Merge hunks separated by at most this many lines
        #[arg(long, default_value_t = 0)]
        hunk_distance: usize,

        /// Collected commits per consolidation batch
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Start of the consolidation commit message
        #[arg(long, default_value = DEFAULT_MESSAGE_PREFIX)]
        message_prefix: String,

        /// Record processed shas here so restarts skip them
        #[arg(long)]
        ledger: Option<PathBuf>,

        /// Push the dataset repository after each consolidated batch
        #[arg(long)]
        push: bool,

        /// Remote pushed after each batch
        #[arg(long, default_value = "origin")]
        remote: String,

        /// Refspec pushed after each batch
        #[arg(long, default_value = "master:master")]
        refspec: String,

        /// GitHub API token (falls back to GITHUB_TOKEN)
        #[arg(long, env = "FIXCORPUS_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Fetch one commit and show the hunks the filters would keep
    Qualify {
        /// Repository slug, e.g. octocat/hello-world
        slug: String,

        /// Commit sha
        sha: String,

        /// Reject commits that touch more than one file
        #[arg(long)]
        filter_multi_file: bool,

        /// Reject commits that keep more than one hunk after merging
        #[arg(long)]
        filter_multi_hunk: bool,

        /// Merge hunks separated by at most this many lines
        #[arg(long, default_value_t = 0)]
        hunk_distance: usize,

        /// GitHub API token (falls back to GITHUB_TOKEN)
        #[arg(long, env = "FIXCORPUS_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Emit the report as JSON instead of terminal text
        #[arg(long)]
        json_output: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    fixcorpus_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Init { root } => cmd_init(&resolve_root(root)).await,
        Commands::Collect {
            feed,
            root,
            filter_multi_file,
            filter_multi_hunk,
            hunk_distance,
            batch_size,
            message_prefix,
            ledger,
            push,
            remote,
            refspec,
            token,
        } => {
            let mut config = CollectorConfig::new(resolve_root(root));
            config.filter = FilterConfig {
                filter_multi_file,
                filter_multi_hunk,
                hunk_distance,
            };
            config.batch_size = batch_size;
            config.commit_message_prefix = message_prefix;
            config.push = push.then_some(PushTarget { remote, refspec });

            cmd_collect(config, resolve_token(token), ledger, feed.as_deref()).await
        }
        Commands::Qualify {
            slug,
            sha,
            filter_multi_file,
            filter_multi_hunk,
            hunk_distance,
            token,
            json_output,
        } => {
            let filter = FilterConfig {
                filter_multi_file,
                filter_multi_hunk,
                hunk_distance,
            };
            cmd_qualify(&slug, &sha, filter, resolve_token(token), json_output).await
        }
    }
}

/// Explicit flag, else `$HOME/continuous-learning-data`, else the relative
/// directory when the process has no home.
fn resolve_root(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(DEFAULT_ROOT_DIR),
        None => PathBuf::from(DEFAULT_ROOT_DIR),
    })
}

/// Flag (or FIXCORPUS_TOKEN via clap), else GITHUB_TOKEN. Empty values are
/// dropped at each step, so a blank export neither masks the fallback nor
/// sends an empty bearer header.
fn resolve_token(flag: Option<String>) -> Option<String> {
    flag.filter(|token| !token.is_empty())
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .filter(|token| !token.is_empty())
}

async fn cmd_init(root: &Path) -> Result<()> {
    info!("Initializing collection root at {:?}", root);

    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create collection root {:?}", root))?;
    GitWorkTree::init(root, None).context("Failed to initialize the dataset repository")?;

    println!("Initialized collection root at {:?}", root);
    Ok(())
}

async fn cmd_collect(
    config: CollectorConfig,
    token: Option<String>,
    ledger_path: Option<PathBuf>,
    feed: Option<&Path>,
) -> Result<()> {
    let root = config.collection_root.clone();
    let vcs = GitWorkTree::open(&root, token.clone()).with_context(|| {
        format!(
            "No dataset repository at {:?}; run `fixcorpus init` first",
            root
        )
    })?;

    let mut github = GithubConfig::default();
    if let Some(token) = &token {
        github = github.with_token(token);
    }
    let hosting = GithubHosting::new(github);

    let ledger = match &ledger_path {
        Some(path) => Some(
            ProcessedLedger::open(path)
                .with_context(|| format!("Failed to open ledger {:?}", path))?,
        ),
        None => None,
    };

    let collector = Collector::new(config, Arc::new(hosting), Arc::new(vcs), ledger);

    let summary = match feed {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open feed {:?}", path))?;
            run_feed(&collector, BufReader::new(file)).await
        }
        None => run_feed(&collector, BufReader::new(std::io::stdin())).await,
    };

    println!(
        "Feed complete: {} collected, {} rejected, {} already processed, {} failed",
        summary.collected, summary.rejected, summary.skipped, summary.failed
    );
    if summary.malformed > 0 {
        println!("Ignored {} malformed feed line(s)", summary.malformed);
    }

    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CollectSummary {
    collected: usize,
    rejected: usize,
    skipped: usize,
    failed: usize,
    malformed: usize,
}

/// Drive the collector over a feed, one commit per line. Failures are
/// logged and counted, never fatal: the next line still gets its chance.
async fn run_feed<R: BufRead>(collector: &Collector, reader: R) -> CollectSummary {
    let mut summary = CollectSummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                warn!("Failed to read feed line {}: {}", index + 1, error);
                summary.malformed += 1;
                continue;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((slug, sha)) = parse_pair(trimmed) else {
            warn!("Ignoring malformed feed line {}: {}", index + 1, trimmed);
            summary.malformed += 1;
            continue;
        };

        match collector.handle(&slug, &sha).await {
            Ok(HandleOutcome::Collected { hunks, dir }) => {
                info!(
                    "Collected {} hunk(s) from {}@{} into {:?}",
                    hunks, slug, sha, dir
                );
                summary.collected += 1;
            }
            Ok(HandleOutcome::Rejected) => {
                summary.rejected += 1;
            }
            Ok(HandleOutcome::AlreadyProcessed) => {
                summary.skipped += 1;
            }
            Err(error) => {
                warn!("Failed to collect {}@{}: {}", slug, sha, error);
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Split a feed line into slug and sha. Extra columns are tolerated so a
/// crawler export with trailing metadata still feeds cleanly.
fn parse_pair(line: &str) -> Option<(String, String)> {
    let mut parts = line.split_whitespace();
    let slug = parts.next()?;
    let sha = parts.next()?;
    if !slug.contains('/') {
        return None;
    }
    Some((slug.to_string(), sha.to_string()))
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
struct QualifyReport {
    slug: String,
    sha: String,
    file_count: usize,
    qualified: Vec<Hunk>,
}

async fn cmd_qualify(
    slug: &str,
    sha: &str,
    filter: FilterConfig,
    token: Option<String>,
    json_output: bool,
) -> Result<()> {
    let mut github = GithubConfig::default();
    if let Some(token) = &token {
        github = github.with_token(token);
    }
    let hosting = GithubHosting::new(github);

    let patch = hosting
        .get_commit(slug, sha)
        .await
        .with_context(|| format!("Failed to fetch commit {}@{}", slug, sha))?;

    let qualified = qualify(&patch, &filter);
    let report = QualifyReport {
        slug: patch.slug.clone(),
        sha: patch.sha.clone(),
        file_count: patch.file_count(),
        qualified,
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_qualify_text(&report));
    }

    Ok(())
}

fn render_qualify_text(report: &QualifyReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("commit {}@{}\n", report.slug, report.sha));
    out.push_str(&format!("files changed: {}\n", report.file_count));

    if report.qualified.is_empty() {
        out.push_str("no qualifying hunks\n");
        return out;
    }

    out.push_str(&format!("qualifying hunks: {}\n", report.qualified.len()));
    for hunk in &report.qualified {
        out.push_str(&format!("\n{}:{}\n{}\n", hunk.file, hunk.line, hunk.content));
    }
    out
}
