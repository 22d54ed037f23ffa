use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// Consecutive failures that open a circuit.
const FAILURE_THRESHOLD: u32 = 3;
/// Failure count at which the cool-down escalates.
const ESCALATION_THRESHOLD: u32 = 5;
/// Standard cool-down after opening.
const OPEN_COOLDOWN: Duration = Duration::from_secs(60 * 60);
/// Extended cool-down for persistently failing sources.
const EXTENDED_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Circuit {
    state: State,
    failures: u32,
    last_failure_at: Option<Instant>,
    open_until: Option<Instant>,
    /// Set while the single HalfOpen probe is out.
    probe_in_flight: bool,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: State::Closed,
            failures: 0,
            last_failure_at: None,
            open_until: None,
            probe_in_flight: false,
        }
    }
}

/// Per-source failure state machine. One instance per process, shared by
/// reference across requests so a dead source is skipped fleet-wide.
///
/// Call sites must check `is_open` before attempting work and record exactly
/// one of success/failure after every attempt, including the HalfOpen probe.
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// Should calls to this source be skipped right now?
    ///
    /// Open circuits transition to HalfOpen once the cool-down elapses; the
    /// first caller to observe HalfOpen claims the single probe slot and gets
    /// false, everyone else keeps seeing true until the probe settles.
    pub fn is_open(&self, source_id: &str) -> bool {
        let mut circuits = self.circuits.lock().unwrap();
        let circuit = circuits
            .entry(source_id.to_string())
            .or_insert_with(Circuit::new);

        match circuit.state {
            State::Closed => false,
            State::Open => {
                let cooled = circuit
                    .open_until
                    .map(|until| Instant::now() >= until)
                    .unwrap_or(true);
                if !cooled {
                    return true;
                }
                info!(source_id, "Circuit half-open, allowing probe");
                circuit.state = State::HalfOpen;
                circuit.probe_in_flight = true;
                false
            }
            State::HalfOpen => {
                if circuit.probe_in_flight {
                    true
                } else {
                    circuit.probe_in_flight = true;
                    false
                }
            }
        }
    }

    /// Record a successful call: the circuit closes and failures reset.
    pub fn record_success(&self, source_id: &str) {
        let mut circuits = self.circuits.lock().unwrap();
        let circuit = circuits
            .entry(source_id.to_string())
            .or_insert_with(Circuit::new);

        if circuit.state != State::Closed {
            info!(source_id, "Circuit closed after success");
        }
        circuit.state = State::Closed;
        circuit.failures = 0;
        circuit.open_until = None;
        circuit.probe_in_flight = false;
    }

    /// Record a failed call. At the threshold the circuit opens; repeated
    /// failures extend the cool-down.
    pub fn record_failure(&self, source_id: &str) {
        let mut circuits = self.circuits.lock().unwrap();
        let circuit = circuits
            .entry(source_id.to_string())
            .or_insert_with(Circuit::new);

        circuit.failures += 1;
        circuit.last_failure_at = Some(Instant::now());
        circuit.probe_in_flight = false;

        if circuit.failures >= FAILURE_THRESHOLD {
            let cooldown = if circuit.failures >= ESCALATION_THRESHOLD {
                EXTENDED_COOLDOWN
            } else {
                OPEN_COOLDOWN
            };
            circuit.state = State::Open;
            circuit.open_until = Some(Instant::now() + cooldown);
            warn!(
                source_id,
                failures = circuit.failures,
                cooldown_secs = cooldown.as_secs(),
                "Circuit opened"
            );
        }
    }

    /// Number of consecutive failures recorded for a source.
    pub fn failure_count(&self, source_id: &str) -> u32 {
        let circuits = self.circuits.lock().unwrap();
        circuits.get(source_id).map(|c| c.failures).unwrap_or(0)
    }

    /// Test hook: pretend the cool-down for a source has elapsed.
    #[cfg(test)]
    fn expire_cooldown(&self, source_id: &str) {
        let mut circuits = self.circuits.lock().unwrap();
        if let Some(circuit) = circuits.get_mut(source_id) {
            circuit.open_until = Some(Instant::now() - Duration::from_secs(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_until_threshold() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure("src");
        breaker.record_failure("src");
        assert!(!breaker.is_open("src"));
        breaker.record_failure("src");
        assert!(breaker.is_open("src"));
    }

    #[test]
    fn success_resets_failures() {
        let breaker = CircuitBreaker::new();
        breaker.record_failure("src");
        breaker.record_failure("src");
        breaker.record_success("src");
        assert_eq!(breaker.failure_count("src"), 0);
        breaker.record_failure("src");
        breaker.record_failure("src");
        assert!(!breaker.is_open("src"));
    }

    #[test]
    fn fourth_attempt_skipped_within_cooldown() {
        let breaker = CircuitBreaker::new();
        for _ in 0..3 {
            assert!(!breaker.is_open("src"));
            breaker.record_failure("src");
        }
        // Fourth attempt: skipped, not called.
        assert!(breaker.is_open("src"));
        assert!(breaker.is_open("src"));
    }

    #[test]
    fn single_probe_after_cooldown() {
        let breaker = CircuitBreaker::new();
        for _ in 0..3 {
            breaker.record_failure("src");
        }
        assert!(breaker.is_open("src"));

        breaker.expire_cooldown("src");
        // Exactly one probe is admitted.
        assert!(!breaker.is_open("src"));
        assert!(breaker.is_open("src"));
        assert!(breaker.is_open("src"));

        breaker.record_success("src");
        assert!(!breaker.is_open("src"));
    }

    #[test]
    fn failed_probe_reopens() {
        let breaker = CircuitBreaker::new();
        for _ in 0..3 {
            breaker.record_failure("src");
        }
        breaker.expire_cooldown("src");
        assert!(!breaker.is_open("src"));
        breaker.record_failure("src");
        assert!(breaker.is_open("src"));
    }

    #[test]
    fn sources_are_independent() {
        let breaker = CircuitBreaker::new();
        for _ in 0..3 {
            breaker.record_failure("bad");
        }
        assert!(breaker.is_open("bad"));
        assert!(!breaker.is_open("good"));
    }
}
