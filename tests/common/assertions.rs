//! Event-driven waiting helpers

use auto_unpack::{Event, JobId, Unpacker};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

/// Counts reported by a `JobFinished` event
#[derive(Debug, PartialEq, Eq)]
pub struct Finished {
    pub extracted: usize,
    pub failed: usize,
}

/// Wait for `JobFinished` for `id` on an already-subscribed receiver
///
/// Subscribe before triggering the job so the event cannot be missed.
pub async fn wait_for_job(events: &mut Receiver<Event>, id: &JobId, timeout: Duration) -> Finished {
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::JobFinished {
                    id: event_id,
                    extracted,
                    failed,
                }) if event_id == *id => return Finished { extracted, failed },
                Ok(_) => continue,
                Err(e) => panic!("event channel error: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for JobFinished")
}

/// Poll until `check` holds
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) {
    tokio::time::timeout(timeout, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Subscribe helper kept next to the waiters
pub fn subscribe(unpacker: &Unpacker) -> Receiver<Event> {
    unpacker.subscribe()
}
