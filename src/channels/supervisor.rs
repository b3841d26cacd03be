//! Supervised adapter startup with restart backoff
//!
//! A crashed or disconnected adapter is restarted with exponential
//! backoff (2s doubling up to 60s); a successful run resets the delay.
//! One channel failing never takes the others down.

use super::adapter::{ChannelAdapter, ChannelEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Spawn a task that keeps the adapter running, restarting on failure
pub fn spawn_supervised(
    adapter: Arc<dyn ChannelAdapter>,
    event_tx: mpsc::Sender<ChannelEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match adapter.start(event_tx.clone()).await {
                Ok(()) => {
                    backoff = INITIAL_BACKOFF;

                    // start() returns once running; wait for the adapter
                    // to drop out before considering a restart.
                    while adapter.is_connected() {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }

                    // Deliberate stop ends supervision.
                    if event_tx.is_closed() {
                        break;
                    }
                    tracing::warn!(
                        channel = adapter.name(),
                        "Adapter dropped out, restarting in {:?}",
                        backoff
                    );
                }
                Err(e) => {
                    tracing::error!(
                        channel = adapter.name(),
                        "Adapter failed to start: {}, retrying in {:?}",
                        e,
                        backoff
                    );
                    let _ = event_tx
                        .send(ChannelEvent::Error {
                            channel: adapter.name().to_string(),
                            error: e.to_string(),
                        })
                        .await;
                }
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);

            if event_tx.is_closed() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::message::OutboundResponse;
    use crate::error::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Adapter that fails its first N starts, then stays connected
    struct FlakyAdapter {
        failures_left: AtomicUsize,
        starts: AtomicUsize,
        connected: std::sync::atomic::AtomicBool,
    }

    impl FlakyAdapter {
        fn new(failures: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(failures),
                starts: AtomicUsize::new(0),
                connected: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ChannelAdapter for FlakyAdapter {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn start(&self, _event_tx: mpsc::Sender<ChannelEvent>) -> Result<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_ok()
            {
                return Err(Error::Channel("boom".to_string()));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn send_response(&self, _chat_id: &str, _response: &OutboundResponse) -> Result<String> {
            Ok(String::new())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_retries_failed_start() {
        let adapter = Arc::new(FlakyAdapter::new(2));
        let (tx, mut rx) = mpsc::channel(10);

        let handle = spawn_supervised(adapter.clone(), tx);

        // Two failures surface as error events, then the adapter comes up.
        let mut errors = 0;
        while errors < 2 {
            if let Some(ChannelEvent::Error { .. }) = rx.recv().await {
                errors += 1;
            }
        }

        // Let the third start run.
        while !adapter.is_connected() {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(adapter.starts.load(Ordering::SeqCst), 3);

        handle.abort();
    }
}
