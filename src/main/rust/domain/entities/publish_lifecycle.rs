use std::time::{Duration, Instant};

use crate::domain::value_objects::PublishState;

/// Keep the history bounded for long-running sessions
const MAX_HISTORY: usize = 256;

/// State transition record
#[derive(Debug, Clone)]
pub struct StateTransition {
    pub from: PublishState,
    pub to: PublishState,
    pub timestamp: Instant,
    pub reason: Option<String>,
}

/// Domain entity tracking the state of a publish session over time
#[derive(Debug)]
pub struct PublishLifecycle {
    current_state: PublishState,
    state_history: Vec<StateTransition>,
    transition_count: usize,
    connected_at: Option<Instant>,
}

impl PublishLifecycle {
    pub fn new() -> Self {
        Self {
            current_state: PublishState::Idle,
            state_history: Vec::new(),
            transition_count: 0,
            connected_at: None,
        }
    }

    pub fn current_state(&self) -> &PublishState {
        &self.current_state
    }

    /// Time since the current publish first connected
    pub fn uptime(&self) -> Option<Duration> {
        self.connected_at.map(|start| start.elapsed())
    }

    pub fn transition_count(&self) -> usize {
        self.transition_count
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.state_history.last()
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.state_history
    }

    pub fn transition_to_idle(&mut self, reason: Option<String>) {
        self.connected_at = None;
        self.record_transition(PublishState::Idle, reason);
    }

    pub fn transition_to_preview(&mut self, reason: Option<String>) {
        self.connected_at = None;
        self.record_transition(PublishState::PreviewOnly, reason);
    }

    pub fn transition_to_publishing(&mut self) {
        self.record_transition(PublishState::Publishing, None);
    }

    pub fn transition_to_retrying(&mut self, attempt: u32, reason: Option<String>) {
        self.record_transition(PublishState::Retrying { attempt }, reason);
    }

    pub fn transition_to_stopped(&mut self, reason: Option<String>) {
        self.connected_at = None;
        self.record_transition(PublishState::Stopped, reason);
    }

    /// Start the uptime clock on the first successful connection
    pub fn mark_connected(&mut self) {
        if self.connected_at.is_none() {
            self.connected_at = Some(Instant::now());
        }
    }

    fn record_transition(&mut self, new_state: PublishState, reason: Option<String>) {
        let transition = StateTransition {
            from: self.current_state,
            to: new_state,
            timestamp: Instant::now(),
            reason,
        };

        if self.state_history.len() == MAX_HISTORY {
            self.state_history.remove(0);
        }
        self.state_history.push(transition);
        self.transition_count += 1;
        self.current_state = new_state;
    }
}

impl Default for PublishLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
