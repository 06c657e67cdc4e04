//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::Unpacker;

/// How long shutdown waits for in-flight jobs
const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

impl Unpacker {
    /// Gracefully shut down the unpacker
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new jobs
    /// 2. Stops the retention sweeper
    /// 3. Waits for in-flight jobs and extraction tasks with a timeout (30 seconds)
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Running archivers are not interrupted; jobs that finish within the
    /// timeout are still marked finished with the host.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new jobs
        self.jobs
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        // 2. Stop the sweeper
        self.sweep.cancel_token.cancel();
        if let Some(handle) = self.sweep.handle.lock().await.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Retention sweeper did not stop cleanly");
        }

        // 3. Drain job watchers, then the pool
        self.jobs.watchers.close();
        let drain = async {
            self.jobs.watchers.wait().await;
            self.pool.drain().await;
        };
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await {
            Ok(()) => tracing::info!("All jobs completed"),
            Err(_) => {
                tracing::warn!("Timeout waiting for jobs to complete, proceeding with shutdown")
            }
        }

        // 4. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }
}
