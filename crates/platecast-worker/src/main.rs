//! Recipe media worker binary.
//!
//! Usage: `platecast-worker <recipe.json> <user_id> [images|videos|final|all]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use platecast_firestore::FirestoreClient;
use platecast_models::{RawRecipe, RecipeInput};
use platecast_provider::ProviderClient;
use platecast_storage::R2Client;
use platecast_worker::metrics::init_metrics;
use platecast_worker::{
    BatchReport, FinalVideoOutcome, FirestoreCreditStore, FirestoreMediaStore, GenerationPipeline,
    HttpFetcher, WorkerConfig,
};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Images,
    Videos,
    Final,
    All,
}

impl Stage {
    fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "images" => Ok(Stage::Images),
            "videos" => Ok(Stage::Videos),
            "final" => Ok(Stage::Final),
            "all" => Ok(Stage::All),
            other => bail!("unknown stage '{}', expected images|videos|final|all", other),
        }
    }
}

#[tokio::main]
async fn main() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    dotenvy::dotenv().ok();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to initialize tracing: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run().await {
        error!("Worker failed: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("platecast=info".parse()?)
        .add_directive("aws_config=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (recipe_path, user_id) = match (args.first(), args.get(1)) {
        (Some(path), Some(user)) => (path.clone(), user.clone()),
        _ => bail!("usage: platecast-worker <recipe.json> <user_id> [images|videos|final|all]"),
    };
    let stage = Stage::parse(args.get(2).map(String::as_str).unwrap_or("all"))?;

    info!("Starting platecast-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        init_metrics(port).context("failed to install metrics exporter")?;
        info!(port, "Metrics exporter listening");
    }

    let raw = tokio::fs::read_to_string(&recipe_path)
        .await
        .with_context(|| format!("failed to read {}", recipe_path))?;
    let recipe = RawRecipe::from_json(&raw)?.normalize()?;

    let firestore = FirestoreClient::from_env()
        .await
        .context("failed to create Firestore client")?;
    let objects = R2Client::from_env()
        .await
        .context("failed to create R2 client")?;
    objects
        .verify_bucket()
        .await
        .context("object storage is not reachable")?;
    let provider = ProviderClient::from_env().context("failed to create provider client")?;
    let fetcher = HttpFetcher::new(DOWNLOAD_TIMEOUT)?;

    let pipeline = GenerationPipeline::new(
        config,
        Arc::new(provider),
        Arc::new(objects),
        Arc::new(fetcher),
        Arc::new(FirestoreMediaStore::new(firestore.clone())),
        Arc::new(FirestoreCreditStore::new(firestore)),
    );

    if matches!(stage, Stage::Images | Stage::All) {
        let report = pipeline
            .generate_step_images(&user_id, &recipe, |results| log_progress("step_images", results.len()))
            .await?;
        report_batch(&report);
    }

    if matches!(stage, Stage::Videos | Stage::All) {
        let report = pipeline
            .generate_step_videos(&user_id, &recipe, |results| log_progress("step_videos", results.len()))
            .await?;
        report_batch(&report);
    }

    if matches!(stage, Stage::Final | Stage::All) {
        run_final(&pipeline, &user_id, &recipe).await?;
    }

    let record = pipeline.record(&recipe.recipe_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    info!("Worker finished");
    Ok(())
}

async fn run_final(
    pipeline: &GenerationPipeline,
    user_id: &str,
    recipe: &RecipeInput,
) -> anyhow::Result<()> {
    match pipeline.generate_final_video(user_id, recipe).await? {
        FinalVideoOutcome::Ready { url, cached } => info!(url = %url, cached, "Final video ready"),
        FinalVideoOutcome::NotReady { completed, total } => {
            warn!(completed, total, "Final video skipped, step videos incomplete")
        }
        FinalVideoOutcome::Failed { reason } => warn!("Final video failed: {}", reason),
        FinalVideoOutcome::Denied(denied) => warn!("{}", denied.message),
    }
    Ok(())
}

fn log_progress(operation: &str, produced: usize) {
    info!(operation, produced, "Batch progress");
}

fn report_batch(report: &BatchReport) {
    info!(
        kind = %report.summary.kind,
        completed = report.summary.completed,
        failed = report.summary.failed,
        "{}", report.summary.message()
    );
    if let Some(denied) = &report.denied {
        warn!("{}", denied.message);
    }
}
