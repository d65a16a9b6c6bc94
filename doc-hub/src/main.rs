use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_hub::api::{self, AppState};
use doc_hub::config::Config;
use doc_hub_core::auth::{CredentialService, Hs256Tokens};
use doc_hub_core::docs::DocumentService;
use doc_hub_core::reconcile::OrphanSweeper;
use doc_hub_core::storage::{PgRepository, S3BlobStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "doc-hub")]
#[command(about = "Document storage with per-document grants")]
struct Cli {
    /// Listen address, overrides ADDR
    #[arg(long, global = true)]
    addr: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Run one orphan sweep and print the report
    Sweep,
}

struct Backends {
    repo: Arc<PgRepository>,
    blobs: Arc<S3BlobStorage>,
}

async fn connect(config: &Config) -> Result<Backends> {
    let repo = PgRepository::connect(&config.database_url)
        .await
        .context("failed to connect to postgres")?;
    repo.migrate().await.context("failed to run migrations")?;

    let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let mut s3_config = aws_sdk_s3::config::Builder::from(&shared);
    if let Some(endpoint) = &config.s3_endpoint {
        s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
    }
    let client = aws_sdk_s3::Client::from_conf(s3_config.build());
    let blobs = S3BlobStorage::connect(client, config.s3_bucket.clone())
        .await
        .context("failed to prepare bucket")?;

    Ok(Backends {
        repo: Arc::new(repo),
        blobs: Arc::new(blobs),
    })
}

fn sweeper(config: &Config, backends: &Backends) -> Result<OrphanSweeper> {
    let grace = chrono::Duration::from_std(config.sweep_grace).context("SWEEP_GRACE_SECS out of range")?;
    Ok(OrphanSweeper::new(
        backends.repo.clone(),
        backends.blobs.clone(),
        grace,
    ))
}

async fn sweep_task(sweeper: OrphanSweeper, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // the first tick completes immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        match sweeper.sweep(chrono::Utc::now()).await {
            Ok(report) => info!(
                scanned = report.scanned,
                deleted = report.deleted,
                failed = report.failed,
                "orphan sweep finished"
            ),
            Err(e) => error!("orphan sweep failed: {}", e),
        }
    }
}

async fn serve(config: Config, backends: Backends) -> Result<()> {
    if let Some(period) = config.sweep_interval {
        tokio::spawn(sweep_task(sweeper(&config, &backends)?, period));
    }

    let tokens = Arc::new(Hs256Tokens::new(&config.token_salt));
    let state = AppState {
        docs: Arc::new(DocumentService::new(
            backends.repo.clone(),
            backends.blobs.clone(),
        )),
        credentials: Arc::new(CredentialService::new(backends.repo.clone(), tokens.clone())),
        verifier: tokens,
        admin_token: Arc::from(config.admin_token.as_str()),
        max_upload: config.max_upload_bytes,
        request_timeout: config.request_timeout,
    };

    let listener = TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!("Listening on {}", config.addr);
    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }

    let filter = match &config.log_level {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    }
    .unwrap_or_else(|| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let backends = connect(&config).await?;
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, backends).await,
        Commands::Sweep => {
            let report = sweeper(&config, &backends)?.sweep(chrono::Utc::now()).await?;
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
    }
}
