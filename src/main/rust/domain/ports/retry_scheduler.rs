use std::time::Duration;

use crate::domain::events::RetryTicket;

/// Owned handle to one scheduled retry
pub trait RetryHandle: Send {
    /// Prevent the timer from firing. Calling it more than once is harmless.
    fn cancel(&mut self);
}

/// Port for scheduling the single pending retry of a session.
///
/// When the delay elapses the implementation delivers
/// `SessionEvent::RetryTimerFired(ticket)` back to the session.
pub trait RetryScheduler: Send {
    fn schedule(&mut self, delay: Duration, ticket: RetryTicket) -> Box<dyn RetryHandle>;
}
