//! The offline worker.
//!
//! A `ServiceWorker` owns one cache generation, named by its version label,
//! and moves through a fixed lifecycle:
//!
//! `Parsed → Installing → Installed → Activating → Activated`
//!
//! A failed install ends in `Redundant`, as does a worker replaced by a
//! newer one. Only an activated worker intercepts requests.
//!
//! Platform capabilities are injected: the cache store, the network and a
//! `Host` that can skip the waiting phase and claim open pages.

pub mod activate;
pub mod install;
pub mod intercept;
pub mod registration;

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tether_core::{AppConfig, CacheStore, Error};
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

use crate::fetch::{ExclusionRules, Network};

pub use activate::{ActivationReport, EvictionReport};
pub use intercept::{FetchOutcome, Passthrough};
pub use registration::{Delivery, Registration, Source};

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn can_intercept(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Control over the pages the worker serves.
#[async_trait]
pub trait Host: Send + Sync {
    /// Activate as soon as installation finishes instead of waiting for
    /// pages controlled by an older worker to close.
    async fn skip_waiting(&self);

    /// Take control of every open page of the application.
    ///
    /// Returns the number of pages claimed.
    async fn claim(&self) -> Result<usize, Error>;
}

/// Host with no pages attached, for servers and command-line use.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessHost;

#[async_trait]
impl Host for HeadlessHost {
    async fn skip_waiting(&self) {}

    async fn claim(&self) -> Result<usize, Error> {
        Ok(0)
    }
}

/// One versioned instance of the offline worker.
pub struct ServiceWorker {
    version: String,
    origin: Url,
    manifest: Vec<String>,
    exclusions: ExclusionRules,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    host: Arc<dyn Host>,
    state: watch::Sender<WorkerState>,
    background: Mutex<JoinSet<()>>,
}

impl ServiceWorker {
    /// Create a worker with the default manifest and exclusion rules.
    pub fn new(
        version: impl Into<String>, origin: Url, store: Arc<dyn CacheStore>, network: Arc<dyn Network>,
        host: Arc<dyn Host>,
    ) -> Self {
        let exclusions = ExclusionRules::new(&origin);
        Self {
            version: version.into(),
            manifest: tether_core::config::DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect(),
            origin,
            exclusions,
            store,
            network,
            host,
            state: watch::channel(WorkerState::Parsed).0,
            background: Mutex::new(JoinSet::new()),
        }
    }

    /// Create a worker from application configuration.
    pub fn from_config(
        config: &AppConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>, host: Arc<dyn Host>,
    ) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let exclusions = ExclusionRules::from_config(&origin, config);
        Ok(Self::new(config.version.clone(), origin, store, network, host)
            .with_manifest(config.precache.clone())
            .with_exclusions(exclusions))
    }

    pub fn with_manifest(mut self, manifest: Vec<String>) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionRules) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Version label naming this worker's cache generation.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: WorkerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::debug!(version = %self.version, from = %previous, to = %next, "worker state changed");
        }
    }

    /// Move from `expected` to `next`, failing if the worker is elsewhere.
    fn transition(&self, expected: WorkerState, next: WorkerState) -> Result<(), Error> {
        let mut result = Ok(());
        self.state.send_if_modified(|state| {
            if *state == expected {
                *state = next;
                true
            } else {
                result = Err(Error::InvalidState { expected: expected.to_string(), actual: state.to_string() });
                false
            }
        });
        if result.is_ok() {
            tracing::debug!(version = %self.version, from = %expected, to = %next, "worker state changed");
        }
        result
    }

    /// Run `task` detached from the caller, keeping the worker responsible
    /// for it until `settle` is called.
    ///
    /// A redundant worker starts nothing and returns `false`. The state is
    /// checked under the task lock, so anything spawned before `retire` is
    /// drained by its `settle`.
    fn spawn_background<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state() == WorkerState::Redundant {
            return false;
        }
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
        true
    }

    /// Wait for every detached cache write started so far.
    pub async fn settle(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.background.lock().unwrap_or_else(PoisonError::into_inner));
            if tasks.is_empty() {
                break;
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    tracing::warn!(version = %self.version, error = %e, "background cache task aborted");
                }
            }
        }
    }

    /// Take this worker out of service after a newer one replaced it.
    pub async fn retire(&self) {
        self.set_state(WorkerState::Redundant);
        self.settle().await;
    }
}
