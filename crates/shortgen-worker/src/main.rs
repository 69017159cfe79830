//! Short-video composition CLI.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shortgen_models::{CompositionRequest, ExecutionMode};
use shortgen_storage::R2Client;
use shortgen_worker::{
    BackgroundDispatcher, Composer, ComposerConfig, JobStore, MemoryJobStore, RestJobStore,
    RestJobStoreConfig,
};

#[derive(Parser, Debug)]
#[command(name = "shortgen-worker", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose one request and print the outcome as JSON.
    Compose {
        /// Request JSON file.
        request: PathBuf,
    },
    /// Print the FFmpeg invocation for a request without rendering.
    Plan {
        /// Request JSON file.
        request: PathBuf,
    },
    /// Print the request JSON schema.
    Schema,
    /// Check the work directory and FFmpeg binaries.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    run(Cli::parse()).await
}

/// Config is loaded per subcommand so `schema` works without a valid environment.
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.cmd {
        Command::Compose { request } => cmd_compose(ComposerConfig::from_env()?, &request).await,
        Command::Plan { request } => cmd_plan(ComposerConfig::from_env()?, &request).await,
        Command::Schema => {
            let schema = schemars::schema_for!(CompositionRequest);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Command::Check => cmd_check(&ComposerConfig::from_env()?).await,
    }
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("shortgen=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn read_request(path: &Path) -> anyhow::Result<CompositionRequest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn build_composer(config: ComposerConfig) -> anyhow::Result<Composer> {
    let mut composer = match &config.execution_mode {
        ExecutionMode::Managed => {
            let store = R2Client::from_env().await.context("configuring R2")?;
            Composer::new(config.clone())?.with_artifact_store(Arc::new(store))
        }
        ExecutionMode::Local { .. } => Composer::new(config.clone())?,
    };

    if let Some(worker_url) = &config.render_worker_url {
        let jobs: Arc<dyn JobStore> = match RestJobStoreConfig::from_env() {
            Some(rest) => Arc::new(RestJobStore::new(rest)),
            None => Arc::new(MemoryJobStore::new()),
        };
        composer = composer.with_dispatcher(BackgroundDispatcher::new(
            worker_url.clone(),
            jobs,
            config.background_max_duration_secs,
        ));
    }

    Ok(composer)
}

async fn cmd_compose(config: ComposerConfig, path: &Path) -> anyhow::Result<()> {
    let request = read_request(path).await?;
    let composer = build_composer(config).await?;
    info!(mode = request.media.mode_name(), "Submitting request");

    let result = composer.submit(&request).await;
    composer.shutdown().await;

    match result {
        Ok(submission) => {
            println!("{}", serde_json::to_string_pretty(&submission)?);
            Ok(())
        }
        Err(e) => {
            error!(category = e.category().as_str(), "Composition failed: {}", e);
            if let Some(diagnostics) = e.diagnostics() {
                eprintln!("{}", diagnostics);
            }
            Err(e.into())
        }
    }
}

async fn cmd_plan(config: ComposerConfig, path: &Path) -> anyhow::Result<()> {
    let request = read_request(path).await?;
    let composer = Composer::new(config)?;
    let args = composer.plan(&request).await?;
    println!("ffmpeg {}", args.join(" "));
    Ok(())
}

async fn cmd_check(config: &ComposerConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("creating {}", config.work_dir.display()))?;

    for binary in [&config.render.ffmpeg_path, &config.render.ffprobe_path] {
        let resolved = which::which(binary).with_context(|| format!("{} not found", binary))?;
        info!("{} -> {}", binary, resolved.display());
    }

    if config.execution_mode.is_managed() {
        let store = R2Client::from_env().await.context("configuring R2")?;
        store
            .check_connectivity()
            .await
            .context("reaching the R2 bucket")?;
        info!("R2 bucket reachable");
    }

    println!(
        "ok: work_dir={} mode={}",
        config.work_dir.display(),
        config.execution_mode.as_str()
    );
    Ok(())
}
