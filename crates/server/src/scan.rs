use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::state::AppState;
use common::Source;
use library::{LibraryError, ScanOutcome};

/// Ids of sources with a scan in flight.
#[derive(Clone, Default)]
pub struct ScanRegistry {
    running: Arc<Mutex<HashSet<String>>>,
}

impl ScanRegistry {
    /// `None` if the source is already being scanned.
    pub fn claim(&self, source_id: &str) -> Option<ScanClaim> {
        let mut running = self.running.lock();
        if !running.insert(source_id.to_string()) {
            return None;
        }
        Some(ScanClaim {
            registry: self.clone(),
            source_id: source_id.to_string(),
        })
    }

    pub fn is_running(&self, source_id: &str) -> bool {
        self.running.lock().contains(source_id)
    }
}

/// Released on drop, including when the scan worker panics.
pub struct ScanClaim {
    registry: ScanRegistry,
    source_id: String,
}

impl Drop for ScanClaim {
    fn drop(&mut self) {
        self.registry.running.lock().remove(&self.source_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyRunning;

/// Starts a background scan of `source` unless one is already running.
pub fn start_scan(state: &AppState, source: Source) -> Result<(), AlreadyRunning> {
    let claim = state.scans.claim(&source.id).ok_or(AlreadyRunning)?;
    let scanner = state.scanner.clone();
    let connector = Arc::clone(&state.connector);

    tokio::spawn(async move {
        let name = source.name.clone();
        let result = tokio::task::spawn_blocking(move || {
            let _claim = claim;
            scanner.scan(connector.as_ref(), &source)
        })
        .await;

        match result {
            Ok(ScanOutcome::Complete { total, .. }) => {
                info!("Scan of {} finished ({} files)", name, total);
            }
            Ok(ScanOutcome::Failed(message)) => {
                warn!("Scan of {} failed: {}", name, message);
            }
            Err(err) => {
                warn!("Scan worker for {} aborted: {}", name, err);
            }
        }
    });
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanAllSummary {
    pub started: usize,
    pub skipped: usize,
}

/// One independent run per enabled source; running ones are skipped.
pub fn start_scan_all(state: &AppState) -> Result<ScanAllSummary, LibraryError> {
    let mut summary = ScanAllSummary::default();
    for source in state.catalog.list_sources()? {
        if !source.enabled {
            continue;
        }
        match start_scan(state, source) {
            Ok(()) => summary.started += 1,
            Err(AlreadyRunning) => summary.skipped += 1,
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_waits_for_release() {
        let registry = ScanRegistry::default();
        let first = registry.claim("a").unwrap();
        assert!(registry.claim("a").is_none());
        assert!(registry.claim("b").is_some());
        assert!(registry.is_running("a"));
        drop(first);
        assert!(!registry.is_running("a"));
        assert!(registry.claim("a").is_some());
    }

    #[test]
    fn claim_is_released_on_panic() {
        let registry = ScanRegistry::default();
        let claim = registry.claim("a").unwrap();
        let result = std::thread::spawn(move || {
            let _claim = claim;
            panic!("scan blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(!registry.is_running("a"));
    }
}
