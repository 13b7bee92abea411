//! Activation: drop stale generations and take over open pages.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tether_core::Error;

use super::{ServiceWorker, WorkerState};

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    /// Generations removed.
    pub deleted: Vec<String>,
    /// Generations that could not be removed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Outcome of activating a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationReport {
    pub eviction: EvictionReport,
    /// Open pages now controlled by this worker.
    pub clients_claimed: usize,
}

impl ServiceWorker {
    /// Activate an installed worker.
    ///
    /// Evicts every generation other than this worker's own, then claims
    /// open pages. Failed deletions are reported but do not stop activation.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(WorkerState::Installed, WorkerState::Activating)?;

        let eviction = match self.evict_stale().await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(version = %self.version, error = %e, "could not list generations, skipping eviction");
                EvictionReport::default()
            }
        };

        self.set_state(WorkerState::Activated);

        let clients_claimed = match self.host.claim().await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(version = %self.version, error = %e, "claiming clients failed");
                0
            }
        };
        tracing::info!(
            version = %self.version,
            evicted = eviction.deleted.len(),
            clients = clients_claimed,
            "activated"
        );

        Ok(ActivationReport { eviction, clients_claimed })
    }

    /// Delete every generation whose name differs from this worker's version.
    ///
    /// Deletions run concurrently and each one is attempted regardless of
    /// how the others fare. Running it again with nothing stale deletes
    /// nothing.
    pub async fn evict_stale(&self) -> Result<EvictionReport, Error> {
        let stale: Vec<String> = self
            .store
            .generations()
            .await?
            .into_iter()
            .filter(|name| name != &self.version)
            .collect();

        let results = join_all(stale.iter().map(|name| self.store.delete_generation(name))).await;

        let mut report = EvictionReport::default();
        for (name, result) in stale.into_iter().zip(results) {
            match result {
                Ok(true) => {
                    tracing::info!(generation = %name, "evicted stale generation");
                    report.deleted.push(name);
                }
                Ok(false) => tracing::debug!(generation = %name, "generation already gone"),
                Err(e) => {
                    tracing::warn!(generation = %name, error = %e, "failed to evict generation");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes() {
        let report = ActivationReport {
            eviction: EvictionReport {
                deleted: vec!["1.2.3".into()],
                failed: vec![("1.2.2".into(), "locked".into())],
            },
            clients_claimed: 2,
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["eviction"]["deleted"][0], "1.2.3");
        assert_eq!(json["eviction"]["failed"][0][1], "locked");
        assert_eq!(json["clients_claimed"], 2);
    }
}
