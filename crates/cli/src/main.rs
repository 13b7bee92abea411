//! tether command-line entry point.
//!
//! Drives the offline worker against the configured SQLite store:
//! install a generation, fetch through the worker, list generations.
//! Configuration comes from `TETHER_*` variables and `TETHER_CONFIG_FILE`.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tether_client::{
    Destination, FetchClient, FetchConfig, FetchRequest, HeadlessHost, Registration, ServiceWorker, fetch::resolve,
};
use tether_core::{AppConfig, CacheDb, CacheStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(about = "Offline-first request worker with a versioned response cache")]
#[command(version)]
struct Args {
    /// Path to the SQLite cache (overrides TETHER_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Precache the asset manifest and activate it, evicting other generations
    Install {
        /// Version label (overrides TETHER_VERSION)
        #[arg(long = "label")]
        label: Option<String>,
    },
    /// Fetch a URL or path through the worker
    Fetch {
        url: String,

        /// Treat the request as a page navigation
        #[arg(long)]
        document: bool,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },
    /// List cache generations, oldest first
    Generations,
}

struct Runtime {
    config: AppConfig,
    db: CacheDb,
    network: Arc<FetchClient>,
    registration: Registration,
}

impl Runtime {
    async fn open(mut config: AppConfig, db_path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = db_path {
            config.db_path = path;
        }
        let db = CacheDb::open(&config.db_path)
            .await
            .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
        let network = Arc::new(FetchClient::new(FetchConfig::from_app_config(&config)?)?);
        let registration = Registration::new(network.clone());
        Ok(Self { config, db, network, registration })
    }

    fn worker(&self) -> Result<ServiceWorker> {
        let store: Arc<dyn CacheStore> = Arc::new(self.db.clone());
        Ok(ServiceWorker::from_config(&self.config, store, self.network.clone(), Arc::new(HeadlessHost))?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load()?;

    if let Command::Install { label: Some(label) } = &args.command {
        config.version = label.clone();
        config.validate()?;
    }

    let runtime = Runtime::open(config, args.db).await?;

    match args.command {
        Command::Install { .. } => install(&runtime).await,
        Command::Fetch { url, document, method } => fetch(&runtime, &url, document, &method).await,
        Command::Generations => generations(&runtime).await,
    }
}

async fn install(runtime: &Runtime) -> Result<()> {
    let report = runtime
        .registration
        .update(runtime.worker()?)
        .await
        .with_context(|| format!("installing {}", runtime.config.version))?;

    println!("installed {} ({} assets)", runtime.config.version, runtime.config.precache.len());
    for name in &report.eviction.deleted {
        println!("evicted {name}");
    }
    for (name, reason) in &report.eviction.failed {
        println!("could not evict {name}: {reason}");
    }
    Ok(())
}

async fn fetch(runtime: &Runtime, target: &str, document: bool, method: &str) -> Result<()> {
    if let Err(e) = runtime.registration.start(runtime.worker()?).await {
        tracing::warn!(error = %e, "worker not active, fetching directly");
    }

    let origin = runtime.config.origin_url()?;
    let url = resolve(&origin, target)?;
    let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method {method}"))?;
    let destination = if document { Destination::Document } else { Destination::Empty };
    let request = FetchRequest::new(method, url).with_destination(destination);

    let delivery = runtime.registration.fetch(&request).await?;
    runtime.registration.settle().await;

    let response = delivery.response;
    eprintln!(
        "{} {} ({}, {})",
        response.status.as_u16(),
        response.status_text,
        delivery.source.as_str(),
        response.response_type.as_str()
    );
    std::io::stdout().write_all(&response.body)?;
    Ok(())
}

async fn generations(runtime: &Runtime) -> Result<()> {
    for name in runtime.db.generations().await? {
        let marker = if name == runtime.config.version { "*" } else { " " };
        println!("{marker} {name}");
    }
    Ok(())
}
