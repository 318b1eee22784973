/// Runtime configuration for the transport, connection FSM, and session.
use std::time::Duration;

use crate::hysteresis::Hysteresis;

/// Default Kraken v2 public WebSocket endpoint.
pub const KRAKEN_WS_URL: &str = "wss://ws.kraken.com/v2";

/// Backpressure policy selection for a [`crate::transport::Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// A=1, D=8 — signal on the first dropped message.
    Strict,
    /// A=64, D=8 — absorb short bursts before signaling.
    Relaxed,
}

impl BackpressurePolicy {
    pub fn build(self) -> Hysteresis {
        match self {
            BackpressurePolicy::Strict => Hysteresis::strict(),
            BackpressurePolicy::Relaxed => Hysteresis::relaxed(),
        }
    }
}

/// Bounded exponential backoff with jitter for reconnect scheduling
/// (base 250 ms, cap 30 s, ±20% jitter).
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(250),
            max: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl BackoffConfig {
    /// Delay for the given attempt (1-indexed), before jitter.
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let scaled = self.base.as_millis().saturating_mul(1u128 << shift);
        let capped = scaled.min(self.max.as_millis());
        Duration::from_millis(capped as u64)
    }

    /// Apply jitter in `[-jitter, +jitter]` to `delay`, deterministically
    /// driven by `unit` (a caller-supplied value in `[0.0, 1.0)`, e.g. from
    /// `rand::random::<f64>()`).
    pub fn apply_jitter(&self, delay: Duration, unit: f64) -> Duration {
        let factor = 1.0 + self.jitter * (2.0 * unit - 1.0);
        Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
    }
}

/// Liveness timer configuration: the transport is considered dead if no
/// observable byte arrives within `timeout`; a warning fires once per
/// connection cycle at `warning_percent * timeout`.
#[derive(Debug, Clone, Copy)]
pub struct LivenessConfig {
    pub timeout: Duration,
    pub warning_percent: f64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            warning_percent: 0.8,
        }
    }
}

impl LivenessConfig {
    pub fn warning_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.as_secs_f64() * self.warning_percent)
    }
}

/// Transport-level configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Maximum size of a single committed message (default 8 KiB).
    pub message_buffer_size: usize,
    pub backoff: BackoffConfig,
    pub liveness: LivenessConfig,
    pub backpressure_policy: BackpressurePolicy,
    /// Sustained backpressure beyond this many consecutive `Activated`
    /// cycles forces a reconnect. Must be strictly greater than the
    /// deactivation threshold so recovery stays reachable.
    pub backpressure_escalation_cycles: u32,
    /// Capacity of the lossless transport control-event ring.
    pub control_event_ring_capacity: usize,
    /// Capacity of the best-effort (drop-oldest) transition-event ring.
    pub transition_event_ring_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            message_buffer_size: 8 * 1024,
            backoff: BackoffConfig::default(),
            liveness: LivenessConfig::default(),
            backpressure_policy: BackpressurePolicy::Strict,
            backpressure_escalation_cycles: 16,
            control_event_ring_capacity: 64,
            transition_event_ring_capacity: 64,
        }
    }
}

/// Session-level configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ws: WsConfig,
    /// Capacity of each per-channel message ring (power of two).
    pub ring_capacity: usize,
    /// Maximum number of messages drained per ring per `poll()` call.
    pub poll_fairness_cap: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ws: WsConfig::default(),
            ring_capacity: 256,
            poll_fairness_cap: 128,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.base_delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(cfg.base_delay_for_attempt(2), Duration::from_millis(500));
        assert!(cfg.base_delay_for_attempt(30) <= cfg.max);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let cfg = BackoffConfig::default();
        let base = Duration::from_secs(1);
        let low = cfg.apply_jitter(base, 0.0);
        let high = cfg.apply_jitter(base, 1.0);
        assert!(low < base);
        assert!(high > base);
    }

    #[test]
    fn warning_threshold_is_percent_of_timeout() {
        let cfg = LivenessConfig {
            timeout: Duration::from_millis(1000),
            warning_percent: 0.8,
        };
        assert_eq!(cfg.warning_threshold(), Duration::from_millis(800));
    }
}
