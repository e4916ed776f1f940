use std::time::Duration;

use tokio::sync::watch;

use crate::db;
use crate::state::SharedState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Periodically drop expired auth tokens and stale login limiter entries.
/// Runs until shutdown is signaled.
pub async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    tracing::debug!("Housekeeping worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        if let Err(e) = sweep(&state).await {
            tracing::error!("Housekeeping error: {e}");
        }

        tokio::select! {
            _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
            _ = shutdown.changed() => {}
        }
    }

    tracing::debug!("Housekeeping worker stopped");
}

/// One pass. Returns the number of expired tokens removed.
pub async fn sweep(state: &SharedState) -> Result<u64, String> {
    state.login_limiter.cleanup();

    let removed = db::tokens::delete_expired(&state.pool)
        .await
        .map_err(|e| format!("Failed to delete expired tokens: {e}"))?;

    if removed > 0 {
        tracing::info!("Removed {removed} expired auth tokens");
    }
    Ok(removed)
}
