//! Registration: which worker currently serves the application.
//!
//! Updating installs the new worker first. Only if that succeeds is the
//! previous worker retired and the new one activated, so a failed install
//! leaves the previous worker (and its generation) serving. Starting after
//! a restart adopts the stored generation of the same version if present.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tether_core::Error;
use tokio::sync::RwLock;

use super::{ActivationReport, FetchOutcome, ServiceWorker};
use crate::fetch::{FetchRequest, FetchResponse, Network};

/// Where a delivered response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Fetched directly without the worker.
    Passthrough,
    /// Fetched by the worker from the network.
    Network,
    /// Served by the worker from the cache.
    Cache,
    /// The worker's offline placeholder.
    Offline,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Passthrough => "passthrough",
            Source::Network => "network",
            Source::Cache => "cache",
            Source::Offline => "offline",
        }
    }
}

/// A response as the requesting page receives it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub source: Source,
    pub response: FetchResponse,
}

/// Holds the active worker and routes requests through it.
pub struct Registration {
    active: RwLock<Option<Arc<ServiceWorker>>>,
    network: Arc<dyn Network>,
}

impl Registration {
    /// `network` serves requests the worker does not intercept.
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self { active: RwLock::new(None), network }
    }

    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.active.read().await.clone()
    }

    /// Install `worker` and, if that succeeds, make it the active worker.
    pub async fn update(&self, worker: ServiceWorker) -> Result<ActivationReport, Error> {
        worker.install().await?;
        self.swap(worker).await
    }

    /// Make `worker` active, reusing the generation a previous run left
    /// behind when there is one and installing otherwise.
    pub async fn start(&self, worker: ServiceWorker) -> Result<ActivationReport, Error> {
        if worker.restore().await? {
            self.swap(worker).await
        } else {
            self.update(worker).await
        }
    }

    /// Retire the current worker and activate an installed replacement.
    async fn swap(&self, worker: ServiceWorker) -> Result<ActivationReport, Error> {
        let worker = Arc::new(worker);
        let mut active = self.active.write().await;
        if let Some(previous) = active.take() {
            tracing::info!(from = %previous.version(), to = %worker.version(), "replacing worker");
            previous.retire().await;
        }

        let report = worker.activate().await?;
        *active = Some(worker);

        Ok(report)
    }

    /// Deliver a response for `request` the way the platform would.
    ///
    /// Requests the worker declines go straight to the network. A
    /// sub-resource the worker could not answer surfaces as the original
    /// network error.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<Delivery, Error> {
        let Some(worker) = self.active().await else {
            return self.passthrough(request).await;
        };

        match worker.handle_fetch(request).await {
            FetchOutcome::Passthrough(_) => self.passthrough(request).await,
            FetchOutcome::Network(response) => Ok(Delivery { source: Source::Network, response }),
            FetchOutcome::Cache(response) => Ok(Delivery { source: Source::Cache, response }),
            FetchOutcome::Offline(response) => Ok(Delivery { source: Source::Offline, response }),
            FetchOutcome::NoResponse(err) => Err(err),
        }
    }

    async fn passthrough(&self, request: &FetchRequest) -> Result<Delivery, Error> {
        let response = self.network.fetch(request).await?;
        Ok(Delivery { source: Source::Passthrough, response })
    }

    /// Wait for the active worker's pending cache writes.
    pub async fn settle(&self) {
        if let Some(worker) = self.active().await {
            worker.settle().await;
        }
    }
}
