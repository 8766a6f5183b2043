//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use notescout_core::{CollectSummary, ProgressReporter, SearchState};
use notescout_export::{ExportFormat, Exporter, output_file_name};
use notescout_shared::{
    AppConfig, CollectConfig, Record, SortPolicy, init_config, load_config, read_cookie,
};
use notescout_signer::{BridgeSigner, Signer};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// NoteScout: collect Xiaohongshu notes for a search keyword.
#[derive(Parser)]
#[command(
    name = "notescout",
    version,
    about = "Search Xiaohongshu by keyword and export the matching notes.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Search a keyword and export the collected notes.
    Collect {
        /// Search keyword.
        keyword: String,

        /// Number of notes to collect (overrides config).
        #[arg(short, long)]
        target: Option<usize>,

        /// Search results per page (overrides config).
        #[arg(long)]
        page_size: Option<u32>,

        /// Result ordering: general, time_descending, or popularity_descending.
        #[arg(long)]
        sort: Option<SortPolicy>,

        /// Output file (defaults to <keyword>_xiaohongshu.<ext>).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format: csv or json.
        #[arg(short, long, default_value = "csv")]
        format: ExportFormat,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "notescout=info",
        1 => "notescout=debug",
        _ => "notescout=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    // stdout carries the run summary.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Options of one `collect` invocation.
struct CollectArgs {
    keyword: String,
    target: Option<usize>,
    page_size: Option<u32>,
    sort: Option<SortPolicy>,
    out: Option<PathBuf>,
    format: ExportFormat,
}

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Collect {
            keyword,
            target,
            page_size,
            sort,
            out,
            format,
        } => {
            cmd_collect(CollectArgs {
                keyword,
                target,
                page_size,
                sort,
                out,
                format,
            })
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Merge config-file values with command-line overrides.
fn collect_config(config: &AppConfig, args: &CollectArgs) -> CollectConfig {
    let mut collect = CollectConfig::from(config);
    collect.keyword = args.keyword.trim().to_string();
    if let Some(target) = args.target {
        collect.target_count = target;
    }
    if let Some(page_size) = args.page_size {
        collect.page_size = page_size;
    }
    if let Some(sort) = args.sort {
        collect.sort = sort;
    }
    collect
}

async fn cmd_collect(args: CollectArgs) -> Result<()> {
    // Validate everything before spawning the signer
    let config = load_config()?;
    let cookie = read_cookie(&config)?;
    let collect = collect_config(&config, &args);
    collect.validate()?;

    let out_path = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(output_file_name(&collect.keyword, args.format)));

    let signer: Arc<dyn Signer> = Arc::new(
        BridgeSigner::spawn(&config.signer)
            .map_err(|e| eyre!("cannot start the signing bridge: {e}"))?,
    );

    info!(
        keyword = %collect.keyword,
        target = collect.target_count,
        sort = %collect.sort,
        "collecting notes"
    );

    let reporter = CliProgress::new(collect.target_count);
    let summary = notescout_core::collect(&collect, signer, &cookie, &reporter).await?;

    finish_run(&summary, args.format.exporter().as_ref(), &out_path)?;
    print_summary(&summary, &out_path);
    Ok(())
}

/// Export whatever was collected, whatever the terminal state.
fn finish_run(summary: &CollectSummary, exporter: &dyn Exporter, out_path: &Path) -> Result<()> {
    exporter.export(&summary.records, out_path)?;

    if summary.state == SearchState::Failed {
        warn!("search stopped on an upstream failure; if this repeats, refresh the session cookie");
    }
    Ok(())
}

fn print_summary(summary: &CollectSummary, out_path: &Path) {
    let outcome = match summary.state {
        SearchState::Capped => "target reached",
        SearchState::Exhausted => "no more results",
        SearchState::Failed => "search failed",
        SearchState::Running => "interrupted",
    };

    println!();
    println!("  Collection finished: {outcome}");
    println!("  Run:        {}", summary.run_id);
    println!("  Records:    {}", summary.records.len());
    println!("  Pages:      {}", summary.pages);
    println!("  Fetched:    {}", summary.detail_attempts);
    println!(
        "  Skipped:    {} unavailable, {} malformed, {} duplicate",
        summary.skipped, summary.malformed, summary.duplicates
    );
    println!("  Output:     {}", out_path.display());
    println!("  Time:       {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar sized to the target count.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(target: usize) -> Self {
        let bar = ProgressBar::new(target as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn page_fetched(&self, page: u32, items: usize) {
        self.bar
            .set_message(format!("search page {page}: {items} results"));
    }

    fn record_collected(&self, record: &Record, collected: usize, _target: usize) {
        self.bar.set_position(collected as u64);
        let title: String = record.title.chars().take(40).collect();
        self.bar.set_message(title);
    }

    fn note_skipped(&self, note_id: &str) {
        self.bar.set_message(format!("skipped {note_id}"));
    }

    fn done(&self, _summary: &CollectSummary) {
        self.bar.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
