//! Installation: precache the asset manifest into a fresh generation.
//!
//! Every manifest URL is fetched before anything is written. The entries
//! are then committed in one step, so a failed install never leaves a
//! partial generation behind.

use futures_util::future::try_join_all;
use tether_core::{CachedEntry, Error, Generation};

use super::{ServiceWorker, WorkerState};
use crate::fetch::{FetchRequest, resolve};

impl ServiceWorker {
    /// Populate this worker's generation from the manifest.
    ///
    /// On success the worker is `Installed` and has asked the host to skip
    /// waiting. On failure it is `Redundant` and the store is unchanged.
    pub async fn install(&self) -> Result<Generation, Error> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)?;
        tracing::info!(version = %self.version, assets = self.manifest.len(), "installing");

        match self.precache().await {
            Ok(generation) => {
                self.set_state(WorkerState::Installed);
                self.host.skip_waiting().await;
                Ok(generation)
            }
            Err(e) => {
                tracing::warn!(version = %self.version, error = %e, "install failed");
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    /// Adopt a generation an earlier run of this version left in the store
    /// instead of fetching the manifest again.
    ///
    /// Returns `false`, leaving the worker `Parsed`, when there is none.
    pub async fn restore(&self) -> Result<bool, Error> {
        let state = self.state();
        if state != WorkerState::Parsed {
            return Err(Error::InvalidState { expected: WorkerState::Parsed.to_string(), actual: state.to_string() });
        }

        let present = self.store.generations().await?.iter().any(|name| name == &self.version);
        if !present {
            return Ok(false);
        }

        self.transition(WorkerState::Parsed, WorkerState::Installed)?;
        tracing::info!(version = %self.version, "restored installed generation");
        Ok(true)
    }

    async fn precache(&self) -> Result<Generation, Error> {
        let entries = try_join_all(self.manifest.iter().map(|path| self.fetch_asset(path))).await?;
        let count = entries.len();

        let generation = self.store.commit(&self.version, entries).await?;

        tracing::info!(version = %self.version, entries = count, "installed");
        Ok(generation)
    }

    async fn fetch_asset(&self, path: &str) -> Result<CachedEntry, Error> {
        let failed = |reason: String| Error::InstallFailed { url: path.to_string(), reason };

        let url = resolve(&self.origin, path).map_err(|e| failed(e.to_string()))?;
        let request = FetchRequest::get(url);
        let response = self.network.fetch(&request).await.map_err(|e| failed(e.to_string()))?;

        if !response.status.is_success() {
            return Err(failed(format!("status {}", response.status.as_u16())));
        }

        Ok(response.to_cached_entry(&request.cache_key(), request.method.as_str(), &request.url))
    }
}
