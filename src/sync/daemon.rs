//! Fixed-interval poll loop.

use std::time::Duration;
use tracing::{error, info, warn};

use super::{sync_projects, SyncOptions};
use crate::clients::{BoardConnector, LocalStore};
use crate::error::SyncError;
use crate::store::Store;

/// Counts consecutive cycles in which a client refused credentials or a request.
#[derive(Debug, Clone, Copy)]
pub struct FailureBudget {
    max: u32,
    consecutive: u32,
}

impl FailureBudget {
    pub fn new(max: u32) -> Self {
        Self { max, consecutive: 0 }
    }

    pub fn record(&mut self, failed: bool) {
        if failed {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn exhausted(&self) -> bool {
        self.consecutive > self.max
    }
}

/// Syncs, sleeps `interval`, repeats. Cycles never overlap; the loop only
/// returns on a storage error or once the failure budget is exhausted.
pub async fn run_daemon(
    store: &Store,
    connector: &dyn BoardConnector,
    local: &dyn LocalStore,
    filter: Option<&str>,
    opts: SyncOptions,
    interval: Duration,
    max_failures: u32,
) -> Result<(), SyncError> {
    let mut budget = FailureBudget::new(max_failures);
    info!(interval_secs = interval.as_secs(), "Starting sync daemon");

    loop {
        let report = sync_projects(store, connector, local, filter, opts).await?;
        budget.record(report.has_client_failure());
        if budget.consecutive() > 0 {
            warn!(
                consecutive = budget.consecutive(),
                max = max_failures,
                "Sync cycle failed"
            );
        }
        if budget.exhausted() {
            error!(consecutive = budget.consecutive(), "Too many failed cycles, stopping");
            return Err(SyncError::TooManyFailures(budget.consecutive()));
        }
        tokio::time::sleep(interval).await;
    }
}
