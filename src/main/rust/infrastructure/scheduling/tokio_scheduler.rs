use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::events::{RetryTicket, SessionEvent, SessionEventSender};
use crate::domain::ports::{RetryHandle, RetryScheduler};

/// Schedules retries as tokio tasks that post back into the session channel.
///
/// `schedule` must be called from within a tokio runtime.
pub struct TokioRetryScheduler {
    events: SessionEventSender,
}

impl TokioRetryScheduler {
    pub fn new(events: SessionEventSender) -> Self {
        Self { events }
    }
}

impl RetryScheduler for TokioRetryScheduler {
    fn schedule(&mut self, delay: Duration, ticket: RetryTicket) -> Box<dyn RetryHandle> {
        let events = self.events.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(SessionEvent::RetryTimerFired(ticket)).is_err() {
                tracing::debug!(ticket = ticket.value(), "Session closed before retry fired");
            }
        });

        Box::new(TokioRetryHandle { task: Some(task) })
    }
}

/// Aborts the timer task on cancel or drop
pub struct TokioRetryHandle {
    task: Option<JoinHandle<()>>,
}

impl RetryHandle for TokioRetryHandle {
    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TokioRetryHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
