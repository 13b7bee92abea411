//! Request interception: network first, cache second, placeholder last.
//!
//! For each request the worker:
//! 1. lets non-GET requests through untouched;
//! 2. lets excluded requests (auth/payment paths, other origins, extension
//!    schemes) through untouched;
//! 3. tries the network. A 200 `basic` response is copied into the current
//!    generation in the background and the original is returned either way.
//!    If the network fails, the newest cached entry for the request is
//!    served; failing that, navigations get the offline placeholder and
//!    sub-resources get nothing.

use reqwest::Method;
use tether_core::Error;

use super::{ServiceWorker, WorkerState};
use crate::fetch::{Exclusion, FetchRequest, FetchResponse};

/// Why a request was not intercepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Passthrough {
    /// Only GET requests are handled.
    Method(Method),
    /// Matched an exclusion rule.
    Excluded(Exclusion),
    /// The worker is not active.
    Inactive(WorkerState),
}

impl std::fmt::Display for Passthrough {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Passthrough::Method(method) => write!(f, "method {method}"),
            Passthrough::Excluded(exclusion) => write!(f, "{exclusion}"),
            Passthrough::Inactive(state) => write!(f, "worker {state}"),
        }
    }
}

/// Result of routing one request through the worker.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the platform performs the request itself.
    Passthrough(Passthrough),
    /// Live response from the network.
    Network(FetchResponse),
    /// Network failed; served from the cache.
    Cache(FetchResponse),
    /// Network failed on a navigation with nothing cached.
    Offline(FetchResponse),
    /// Network failed on a sub-resource with nothing cached.
    NoResponse(Error),
}

impl FetchOutcome {
    /// The response the worker supplies, if it supplies one.
    pub fn response(&self) -> Option<&FetchResponse> {
        match self {
            FetchOutcome::Network(r) | FetchOutcome::Cache(r) | FetchOutcome::Offline(r) => Some(r),
            FetchOutcome::Passthrough(_) | FetchOutcome::NoResponse(_) => None,
        }
    }

    pub fn into_response(self) -> Option<FetchResponse> {
        match self {
            FetchOutcome::Network(r) | FetchOutcome::Cache(r) | FetchOutcome::Offline(r) => Some(r),
            FetchOutcome::Passthrough(_) | FetchOutcome::NoResponse(_) => None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchOutcome::Passthrough(_))
    }
}

impl ServiceWorker {
    /// Route a request through the worker.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> FetchOutcome {
        if let Some(reason) = self.passthrough_reason(request) {
            tracing::debug!(url = %request.url, reason = %reason, "passthrough");
            return FetchOutcome::Passthrough(reason);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.write_through(request, &response);
                }
                FetchOutcome::Network(response)
            }
            Err(err) => self.fallback(request, err).await,
        }
    }

    fn passthrough_reason(&self, request: &FetchRequest) -> Option<Passthrough> {
        let state = self.state();
        if !state.can_intercept() {
            return Some(Passthrough::Inactive(state));
        }

        if request.method != Method::GET {
            return Some(Passthrough::Method(request.method.clone()));
        }

        self.exclusions.check(&request.url).map(Passthrough::Excluded)
    }

    /// Copy a response into the current generation without holding up the
    /// caller. Failures are logged and dropped, and a worker retired while
    /// the request was in flight writes nothing.
    fn write_through(&self, request: &FetchRequest, response: &FetchResponse) {
        let url = request.canonical_url();
        let entry = response.to_cached_entry(&request.cache_key(), request.method.as_str(), &url);
        let store = self.store.clone();
        let version = self.version.clone();

        let spawned = self.spawn_background(async move {
            let written = async {
                let generation = store.open(&version).await?;
                store.put(&generation, entry).await
            }
            .await;

            match written {
                Ok(()) => tracing::debug!(version = %version, url = %url, "cached"),
                Err(e) => tracing::warn!(version = %version, url = %url, error = %e, "cache write failed"),
            }
        });
        if !spawned {
            tracing::debug!(version = %self.version, url = %request.url, "worker redundant, cache write skipped");
        }
    }

    async fn fallback(&self, request: &FetchRequest, err: Error) -> FetchOutcome {
        tracing::debug!(url = %request.url, error = %err, "network failed, trying cache");

        match self.store.lookup(&request.cache_key(), None).await {
            Ok(Some(entry)) => match FetchResponse::from_cached_entry(entry) {
                Ok(response) => {
                    tracing::debug!(url = %request.url, "served from cache");
                    return FetchOutcome::Cache(response);
                }
                Err(e) => tracing::warn!(url = %request.url, error = %e, "unreadable cache entry"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(url = %request.url, error = %e, "cache lookup failed"),
        }

        if request.is_navigation() {
            tracing::debug!(url = %request.url, "offline placeholder");
            FetchOutcome::Offline(FetchResponse::offline())
        } else {
            tracing::debug!(url = %request.url, destination = %request.destination, "no response");
            FetchOutcome::NoResponse(err)
        }
    }
}
