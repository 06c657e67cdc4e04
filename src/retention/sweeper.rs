//! Periodic retention sweep task

use super::RetentionTracker;
use crate::config::RetentionPolicy;
use crate::types::Event;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Spawn the sweep loop
///
/// Sleeps `interval`, sweeps, and sleeps again, so two sweeps never overlap.
/// A policy change takes effect immediately and restarts the wait; tracked
/// entries are untouched by reconfiguration.
pub(crate) fn spawn_sweeper(
    tracker: RetentionTracker,
    interval: Duration,
    mut policy_rx: watch::Receiver<RetentionPolicy>,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut policy = *policy_rx.borrow_and_update();
        info!(
            enabled = policy.enabled,
            max_age_hours = policy.max_age_hours,
            interval_secs = interval.as_secs(),
            "retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !policy.enabled {
                        continue;
                    }
                    match tracker.sweep(policy).await {
                        Ok(report) => {
                            if !report.deleted.is_empty() || !report.pruned.is_empty() {
                                debug!(
                                    deleted = report.deleted.len(),
                                    pruned = report.pruned.len(),
                                    retained = report.retained,
                                    "retention sweep finished"
                                );
                            }
                            for path in report.deleted {
                                event_tx.send(Event::RetentionDeleted { path }).ok();
                            }
                        }
                        Err(e) => error!(error = %e, "retention sweep failed"),
                    }
                }
                changed = policy_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    policy = *policy_rx.borrow_and_update();
                    info!(
                        enabled = policy.enabled,
                        max_age_hours = policy.max_age_hours,
                        "retention policy updated"
                    );
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }

        debug!("retention sweeper stopped");
    })
}
