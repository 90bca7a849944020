use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::domain::errors::{DomainError, Result};

/// Timeout for bus polling (100ms allows responsive shutdown)
const BUS_POLL_TIMEOUT_MS: u64 = 100;

/// Drains a pipeline bus on its own thread.
///
/// The handler sees every message, and `None` on each poll timeout so it can
/// check element state between messages. Returning `false` ends the thread.
pub struct BusMonitor {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl BusMonitor {
    pub fn spawn<F>(name: &str, bus: gstreamer::Bus, mut handler: F) -> Result<Self>
    where
        F: FnMut(Option<&gstreamer::Message>) -> bool + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let thread = {
            let running = running.clone();
            std::thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    let timeout = gstreamer::ClockTime::from_mseconds(BUS_POLL_TIMEOUT_MS);

                    while running.load(Ordering::SeqCst) {
                        let msg = bus.timed_pop(timeout);
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        if !handler(msg.as_ref()) {
                            break;
                        }
                    }

                    tracing::debug!("Bus monitor stopped");
                })
                .map_err(|e| DomainError::PipelineExecutionFailed(e.to_string()))?
        };

        Ok(Self {
            running,
            thread: Some(thread),
        })
    }

    /// Stop polling and wait for the thread; the handler is not called again
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Bus monitor thread panicked");
            }
        }
    }
}

impl Drop for BusMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
