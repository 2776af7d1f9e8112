use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use youtube_ma::archiver::{Job, JobContext, JobOutcome, WorkerPool};
use youtube_ma::config::Config;
use youtube_ma::fetcher::YouTubeFetcher;
use youtube_ma::identifier::{parse_id_list, VideoId};
use youtube_ma::log_sink::LogSink;
use youtube_ma::progress::ConsoleProgress;
use youtube_ma::store::FsArchiveStore;

/// Archive YouTube video descriptions, annotations and thumbnails.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video identifiers to archive. A single identifier runs interactively.
    ids: Vec<String>,

    /// Read identifiers from a file, one per line ("-" for stdin).
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Maximum number of videos archived at once (overrides WORKER_CONCURRENCY).
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Root directory for archived output (overrides OUTPUT_DIR). Relative
    /// ARCHIVED_IDS_FILE and LOG_FILE paths live under it.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Print the batch report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn is_single(&self) -> bool {
        self.ids.len() == 1 && self.file.is_none()
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {e:#}");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the run succeeded.
async fn run() -> Result<bool> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(args.is_single())?;

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(concurrency) = args.concurrency {
        config.worker_concurrency = concurrency;
    }
    if let Some(ref output_dir) = args.output_dir {
        config.output_dir.clone_from(output_dir);
    }
    config.validate().context("Invalid configuration")?;

    let ids = collect_ids(&args).await?;
    if ids.is_empty() {
        bail!("no identifiers given; pass IDs as arguments or use --file");
    }

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                config.output_dir.display()
            )
        })?;

    let log_path = config.log_path();
    let sink = LogSink::open(&log_path)
        .await
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;
    let store = FsArchiveStore::open(&config.output_dir, &config.archived_ids_path())
        .await
        .context("Failed to open archive store")?;
    let fetcher = YouTubeFetcher::new(&config).context("Failed to build HTTP client")?;
    let ctx = JobContext::new(Arc::new(store), Arc::new(fetcher), sink);

    if args.is_single() {
        let id = ids.into_iter().next().context("missing identifier")?;
        Ok(run_single(ctx, id).await)
    } else {
        run_batch(ctx, ids, config.worker_concurrency, args.json).await
    }
}

async fn run_single(ctx: JobContext, id: VideoId) -> bool {
    let ctx = ctx.with_observer(Arc::new(ConsoleProgress::new()));
    let outcome = Job::new(id, ctx).run().await;
    matches!(outcome, JobOutcome::Done { .. } | JobOutcome::AlreadyArchived)
}

async fn run_batch(ctx: JobContext, ids: Vec<VideoId>, limit: usize, json: bool) -> Result<bool> {
    let pool = WorkerPool::new(ctx, limit)?;
    let report = pool.run(ids).await?;

    if report.failed() > 0 {
        warn!(
            failed = report.failed(),
            "Some identifiers failed; see the job log for details"
        );
    }
    info!(
        done = report.done(),
        skipped = report.skipped(),
        failed = report.failed(),
        "Archiving finished"
    );

    if json {
        let out = serde_json::to_string_pretty(&report.records())
            .context("Failed to serialize batch report")?;
        println!("{out}");
    }

    // Batch mode reports failures through the logs only.
    Ok(true)
}

async fn collect_ids(args: &Args) -> Result<Vec<VideoId>> {
    let mut ids = args
        .ids
        .iter()
        .map(|raw| VideoId::parse(raw).with_context(|| format!("Invalid identifier {raw:?}")))
        .collect::<Result<Vec<_>>>()?;

    if let Some(ref path) = args.file {
        let contents = if path.as_os_str() == "-" {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read identifiers from stdin")?;
            buf
        } else {
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read identifier file: {}", path.display()))?
        };
        let listed = parse_id_list(&contents)
            .with_context(|| format!("Invalid identifier list: {}", path.display()))?;
        ids.extend(listed);
    }

    Ok(ids)
}

fn init_tracing(single: bool) -> Result<()> {
    // The spinner owns the terminal in single mode; keep tracing quiet unless asked.
    let default_filter = if single {
        "warn"
    } else {
        "info,youtube_ma=debug"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}
