/// Connection lifecycle state machine.
///
/// Wraps a [`WebSocket`] with reconnect-with-backoff, a liveness timer, and
/// back-pressure escalation driven by a [`Hysteresis`] debouncer, restated
/// as an explicit, pollable FSM rather than a free-running async loop.
use std::time::Instant;

use crate::config::WsConfig;
use crate::hysteresis::{Hysteresis, State, Transition};
use crate::ring::Ring;
use crate::transport::websocket::{ControlEvent, TransportError, WebSocket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Retrying { attempt: u32 },
    Closed,
}

/// Best-effort, drop-oldest notice of a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    Connected,
    Disconnected,
    RetryScheduled,
    LivenessThreatened,
}

pub struct Connection {
    url: String,
    config: WsConfig,
    state: ConnectionState,
    socket: Option<WebSocket>,
    last_activity: Instant,
    retry_at: Option<Instant>,
    liveness_warned: bool,
    backpressure: Hysteresis,
    /// Consecutive `Activated`-or-still-active back-pressure signals since
    /// the hysteresis last left `Inactive`. Reset on deactivation and on
    /// every (re)connect. Compared against `config.backpressure_escalation_cycles`.
    backpressure_streak: u32,
    transitions: Ring<TransitionEvent>,
}

impl Connection {
    pub fn new(url: impl Into<String>, config: WsConfig) -> Self {
        let backpressure = config.backpressure_policy.build();
        let cap = config.transition_event_ring_capacity;
        Self {
            url: url.into(),
            config,
            state: ConnectionState::Disconnected,
            socket: None,
            last_activity: Instant::now(),
            retry_at: None,
            liveness_warned: false,
            backpressure,
            backpressure_streak: 0,
            transitions: Ring::new(cap),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn socket(&self) -> Option<&WebSocket> {
        self.socket.as_ref()
    }

    pub fn socket_mut(&mut self) -> Option<&mut WebSocket> {
        self.socket.as_mut()
    }

    fn push_transition(&mut self, ev: TransitionEvent) {
        if self.transitions.try_push(ev).is_err() {
            let _ = self.transitions.try_pop();
            let _ = self.transitions.try_push(ev);
        }
    }

    pub fn poll_transition_event(&mut self) -> Option<TransitionEvent> {
        self.transitions.try_pop()
    }

    /// Attempt an initial connection synchronously.
    pub fn connect(&mut self) -> Result<(), TransportError> {
        self.state = ConnectionState::Connecting;
        match WebSocket::connect(
            &self.url,
            self.config.message_buffer_size,
            self.config.control_event_ring_capacity,
        ) {
            Ok(ws) => {
                self.socket = Some(ws);
                self.state = ConnectionState::Connected;
                self.last_activity = Instant::now();
                self.liveness_warned = false;
                self.backpressure.reset();
                self.backpressure_streak = 0;
                self.push_transition(TransitionEvent::Connected);
                Ok(())
            }
            Err(e) => {
                self.schedule_retry(0);
                Err(e)
            }
        }
    }

    fn schedule_retry(&mut self, attempt: u32) {
        self.socket = None;
        self.state = ConnectionState::Retrying { attempt };
        let base = self.config.backoff.base_delay_for_attempt(attempt);
        let delay = self.config.backoff.apply_jitter(base, jitter_unit());
        self.retry_at = Some(Instant::now() + delay);
        self.push_transition(TransitionEvent::RetryScheduled);
    }

    /// Force an immediate reconnect, discarding the current socket.
    pub fn force_reconnect(&mut self) {
        self.push_transition(TransitionEvent::Disconnected);
        self.schedule_retry(0);
    }

    pub fn close(&mut self) {
        if let Some(ws) = self.socket.take() {
            ws.close();
        }
        self.state = ConnectionState::Closed;
    }

    /// Drive the state machine: retry timers, liveness checks, and
    /// control-event draining. Call once per caller `poll()`.
    pub fn poll(&mut self) {
        match self.state {
            ConnectionState::Retrying { attempt } => {
                if let Some(at) = self.retry_at {
                    if Instant::now() >= at {
                        match WebSocket::connect(
                            &self.url,
                            self.config.message_buffer_size,
                            self.config.control_event_ring_capacity,
                        ) {
                            Ok(ws) => {
                                self.socket = Some(ws);
                                self.state = ConnectionState::Connected;
                                self.last_activity = Instant::now();
                                self.liveness_warned = false;
                                self.backpressure.reset();
                                self.backpressure_streak = 0;
                                self.push_transition(TransitionEvent::Connected);
                            }
                            Err(_) => {
                                self.schedule_retry(attempt.saturating_add(1));
                            }
                        }
                    }
                }
            }
            ConnectionState::Connected => self.poll_connected(),
            ConnectionState::Disconnected | ConnectionState::Connecting | ConnectionState::Closed => {}
        }
    }

    fn poll_connected(&mut self) {
        let mut fatal = false;
        let mut remote_closed = false;

        // Re-borrow `self.socket` fresh on each iteration (rather than
        // holding one `&WebSocket` across the loop) so the match arms
        // below are free to take `&mut self` for the escalation counter.
        while let Some(ev) = self.socket.as_ref().and_then(|ws| ws.poll_event()) {
            match ev {
                ControlEvent::Close => remote_closed = true,
                ControlEvent::Error(_) => remote_closed = true,
                ControlEvent::BackpressureDetected => {
                    if self.note_backpressure_detected() {
                        fatal = true;
                    }
                }
                ControlEvent::BackpressureCleared => self.note_backpressure_cleared(),
            }
        }
        if self.socket.as_ref().is_some_and(|ws| ws.is_fatal()) {
            fatal = true;
        }

        if fatal || remote_closed {
            self.push_transition(TransitionEvent::Disconnected);
            self.schedule_retry(0);
            return;
        }

        let elapsed = self.last_activity.elapsed();
        let timeout = self.config.liveness.timeout;
        let warn_at = self.config.liveness.warning_threshold();
        if elapsed >= timeout {
            self.push_transition(TransitionEvent::Disconnected);
            self.schedule_retry(0);
        } else if elapsed >= warn_at && !self.liveness_warned {
            self.liveness_warned = true;
            self.push_transition(TransitionEvent::LivenessThreatened);
        }
    }

    /// Reset the liveness timer — call whenever any inbound frame lands.
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
        self.liveness_warned = false;
    }

    /// Record one `BackpressureDetected` signal. Returns `true` once the
    /// hysteresis is active and has stayed active for
    /// `config.backpressure_escalation_cycles` consecutive signals, at
    /// which point the caller should force a reconnect.
    fn note_backpressure_detected(&mut self) -> bool {
        self.backpressure.on_active_signal();
        if self.backpressure.state() == State::Active {
            self.backpressure_streak = self.backpressure_streak.saturating_add(1);
            self.backpressure_streak >= self.config.backpressure_escalation_cycles
        } else {
            false
        }
    }

    /// Record one `BackpressureCleared` signal, resetting the escalation
    /// streak once the hysteresis actually deactivates.
    fn note_backpressure_cleared(&mut self) {
        if self.backpressure.on_inactive_signal() == Transition::Deactivated {
            self.backpressure_streak = 0;
        }
    }
}

fn jitter_unit() -> f64 {
    use rand::Rng;
    rand::thread_rng().gen_range(0.0..1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackpressurePolicy, WsConfig};

    fn test_config(escalation_cycles: u32) -> WsConfig {
        WsConfig {
            backpressure_policy: BackpressurePolicy::Strict,
            backpressure_escalation_cycles: escalation_cycles,
            ..WsConfig::default()
        }
    }

    #[test]
    fn backpressure_does_not_escalate_below_threshold() {
        let mut conn = Connection::new("wss://example.invalid", test_config(3));
        assert!(!conn.note_backpressure_detected());
        assert!(!conn.note_backpressure_detected());
        assert_eq!(conn.backpressure_streak, 2);
    }

    #[test]
    fn backpressure_escalates_at_threshold() {
        let mut conn = Connection::new("wss://example.invalid", test_config(3));
        assert!(!conn.note_backpressure_detected());
        assert!(!conn.note_backpressure_detected());
        assert!(conn.note_backpressure_detected());
    }

    #[test]
    fn backpressure_keeps_escalating_while_sustained() {
        let mut conn = Connection::new("wss://example.invalid", test_config(3));
        for _ in 0..3 {
            conn.note_backpressure_detected();
        }
        assert!(conn.note_backpressure_detected());
        assert_eq!(conn.backpressure_streak, 4);
    }

    #[test]
    fn deactivation_resets_escalation_streak() {
        let mut conn = Connection::new("wss://example.invalid", test_config(3));
        conn.note_backpressure_detected();
        conn.note_backpressure_detected();
        assert_eq!(conn.backpressure_streak, 2);
        for _ in 0..8 {
            conn.note_backpressure_cleared();
        }
        assert_eq!(conn.backpressure_streak, 0);
        assert_eq!(conn.backpressure.state(), State::Inactive);
    }

    #[test]
    fn partial_deactivation_does_not_reset_streak() {
        let mut conn = Connection::new("wss://example.invalid", test_config(3));
        conn.note_backpressure_detected();
        conn.note_backpressure_detected();
        // Strict policy needs 8 consecutive clears; one alone must not reset.
        conn.note_backpressure_cleared();
        assert_eq!(conn.backpressure_streak, 2);
    }

    #[test]
    fn force_reconnect_schedules_retry_from_attempt_zero() {
        let mut conn = Connection::new("wss://example.invalid", WsConfig::default());
        conn.force_reconnect();
        assert!(matches!(conn.state(), ConnectionState::Retrying { attempt: 0 }));
    }
}
