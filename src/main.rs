use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rollcall::commit::{CommitAck, sink_from_config};
use rollcall::config::Config;
use rollcall::extract::HttpExtractionClient;
use rollcall::intake::FileCandidate;
use rollcall::table::{AttendanceTable, needs_review};
use rollcall::workflow::{WorkflowRunner, WorkflowState};

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(version, about = "Attendance register extraction-review workflow")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a config file. Defaults to ./rollcall.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a register image, print the review table, and commit it
    Process {
        image: PathBuf,

        /// Stop after review output; do not commit to storage
        #[arg(long)]
        no_commit: bool,

        /// Print the extracted table as JSON instead of a text table
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Process {
            image,
            no_commit,
            json,
        } => process(&config, &image, no_commit, json).await,
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rollcall=debug" } else { "rollcall=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn process(config: &Config, image: &PathBuf, no_commit: bool, json: bool) -> Result<()> {
    let extractor = Arc::new(HttpExtractionClient::new(&config.extractor_url));
    let sink = sink_from_config(config)?;
    let mut runner = WorkflowRunner::new(config, extractor, sink);

    let candidate = FileCandidate::from_path(image)?;
    let size_mb = candidate.bytes.len() as f64 / 1024.0 / 1024.0;
    runner
        .select_file(candidate)
        .with_context(|| format!("Rejected {}", image.display()))?;
    println!(
        "Selected {} ({:.2} MB)",
        runner.machine().source().map(|s| s.name().to_string()).unwrap_or_default(),
        size_mb
    );

    runner.start_extraction().context("Failed to start extraction")?;
    println!("Analyzing image...");
    runner.settle().await;

    let table = match runner.machine().state() {
        WorkflowState::Reviewing => runner
            .machine()
            .table()
            .context("Reviewing state without a result")?,
        _ => {
            let reason = runner
                .machine()
                .last_error()
                .unwrap_or("unknown failure")
                .to_string();
            bail!("Extraction failed: {reason}");
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(table)?);
    } else {
        render_table(table);
    }

    if no_commit {
        return Ok(());
    }

    runner.request_commit().context("Failed to start commit")?;
    println!("Committing...");
    runner.settle().await;

    match runner.machine().state() {
        WorkflowState::Committed => match runner.machine().last_ack() {
            Some(CommitAck::Persisted { session_id, rows }) => {
                println!("Saved successfully: session {session_id}, {rows} rows");
            }
            Some(CommitAck::Detached) => {
                println!("No database configured; nothing was persisted (detached mode)");
            }
            None => println!("Commit acknowledged"),
        },
        _ => {
            let reason = runner
                .machine()
                .last_error()
                .unwrap_or("unknown failure")
                .to_string();
            bail!("Commit failed: {reason}");
        }
    }

    Ok(())
}

/// Print the review table. The review flag is recomputed from current
/// confidence here, at render time — it is never stored.
fn render_table(table: &AttendanceTable) {
    let days = table.rows().first().map(|r| r.day_count()).unwrap_or(0);
    print!("{:<6} {:<24}", "Roll", "Name");
    for day in 1..=days {
        print!(" D{day:<3}");
    }
    println!();

    for row in table.rows() {
        print!("{:<6} {:<24}", row.roll_no(), row.name());
        for (mark, confidence) in row.marks().iter().zip(row.confidences()) {
            if needs_review(*confidence) {
                print!(" {mark}?  ");
            } else {
                print!(" {mark}   ");
            }
        }
        println!();
    }

    let flagged: usize = table
        .rows()
        .iter()
        .flat_map(|r| r.confidences())
        .filter(|c| needs_review(**c))
        .count();
    if flagged > 0 {
        println!("\n{flagged} cell(s) flagged for review (marked '?'); edit and re-run or commit as-is.");
    }
}

fn show_config(config: &Config) {
    println!("extractor_url          = {}", config.extractor_url);
    match &config.database {
        Some(path) => println!("database               = {}", path.display()),
        None => println!("database               = (unset; commits run detached)"),
    }
    println!("extraction_timeout_secs = {}", config.extraction_timeout_secs);
    println!("commit_timeout_secs     = {}", config.commit_timeout_secs);
    println!("ack_display_secs        = {}", config.ack_display_secs);
}
