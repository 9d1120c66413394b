//! Covert trigger detection behind a calculator-style keypad.
//!
//! The detector watches digit entries and the visible confirm ("=") and
//! clear actions. A trailing match against a configured trigger code arms a
//! single-shot countdown; expiry yields exactly one dispatch signal. The
//! machine is single-writer (one UI event stream) so it holds no locks, and
//! it produces no user-visible side effects of its own.

use tokio_util::sync::CancellationToken;

/// Trigger detection settings.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Hidden digit sequences that arm dispatch when confirmed.
    pub codes: Vec<String>,
    /// Countdown length in time units (driver decides the unit duration).
    pub countdown_units: u32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            codes: vec!["911".to_string(), "112".to_string()],
            countdown_units: 10,
        }
    }
}

/// Detector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// Watching keypad input.
    Idle,
    /// Countdown running; `remaining` units until dispatch.
    Armed { remaining: u32 },
    /// Countdown expired; the dispatch signal was handed out and the create
    /// call is in flight.
    Dispatching,
}

/// Signals handed to the caller by detector transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Entered `Armed`: start capture and the countdown driver.
    Armed { countdown_units: u32 },
    /// Countdown expired: invoke incident creation. Emitted exactly once
    /// per armed run.
    Dispatch,
}

/// The armed/countdown/cancel state machine.
#[derive(Debug)]
pub struct TriggerDetector {
    config: TriggerConfig,
    state: TriggerState,
    buffer: String,
}

impl TriggerDetector {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            state: TriggerState::Idle,
            buffer: String::new(),
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Record a keypad digit. Non-digits are ignored.
    pub fn digit(&mut self, d: char) {
        if d.is_ascii_digit() {
            self.buffer.push(d);
        }
    }

    /// The visible "=" action. The digit buffer is cleared on every confirm
    /// regardless of match. A trailing code match while `Idle` arms the
    /// countdown; a match while already armed is ignored (no re-entrant
    /// arming).
    pub fn confirm(&mut self) -> Option<TriggerEvent> {
        let sequence = std::mem::take(&mut self.buffer);
        if self.state != TriggerState::Idle {
            return None;
        }
        let matched = self.config.codes.iter().any(|code| {
            !code.is_empty() && sequence.ends_with(code.as_str())
        });
        if !matched {
            return None;
        }
        self.state = TriggerState::Armed {
            remaining: self.config.countdown_units,
        };
        Some(TriggerEvent::Armed {
            countdown_units: self.config.countdown_units,
        })
    }

    /// The visible "clear" action. Stops an armed countdown and returns to
    /// `Idle`; the caller aborts any in-flight capture. Safe to invoke
    /// repeatedly. Returns `true` when an armed run was actually cancelled.
    pub fn cancel(&mut self) -> bool {
        self.buffer.clear();
        match self.state {
            TriggerState::Armed { .. } => {
                self.state = TriggerState::Idle;
                true
            }
            _ => false,
        }
    }

    /// One countdown unit elapsed. Yields `Dispatch` exactly once, at the
    /// tick that reaches zero; ticks in any other state are no-ops.
    pub fn tick(&mut self) -> Option<TriggerEvent> {
        match self.state {
            TriggerState::Armed { remaining } if remaining <= 1 => {
                self.state = TriggerState::Dispatching;
                Some(TriggerEvent::Dispatch)
            }
            TriggerState::Armed { remaining } => {
                self.state = TriggerState::Armed {
                    remaining: remaining - 1,
                };
                None
            }
            _ => None,
        }
    }

    /// The dispatch pipeline (create + capture upload) finished; return to
    /// watching input.
    pub fn dispatch_complete(&mut self) {
        if self.state == TriggerState::Dispatching {
            self.state = TriggerState::Idle;
        }
    }
}

/// Outcome of a real-time countdown run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownOutcome {
    Expired,
    Cancelled,
}

/// Drive a countdown of `units` steps of `unit` each, aborting as soon as
/// `token` is cancelled. The same token is shared with the capture session,
/// so one cancel stops both; cancelling an already-finished run is a no-op.
pub async fn run_countdown(
    units: u32,
    unit: std::time::Duration,
    token: CancellationToken,
) -> CountdownOutcome {
    for _ in 0..units {
        tokio::select! {
            _ = token.cancelled() => return CountdownOutcome::Cancelled,
            _ = tokio::time::sleep(unit) => {}
        }
    }
    if token.is_cancelled() {
        CountdownOutcome::Cancelled
    } else {
        CountdownOutcome::Expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> TriggerDetector {
        TriggerDetector::new(TriggerConfig::default())
    }

    fn type_digits(d: &mut TriggerDetector, digits: &str) {
        for c in digits.chars() {
            d.digit(c);
        }
    }

    #[test]
    fn test_trigger_code_arms_exactly_once() {
        let mut d = detector();
        type_digits(&mut d, "911");
        assert_eq!(
            d.confirm(),
            Some(TriggerEvent::Armed {
                countdown_units: 10
            })
        );
        assert_eq!(d.state(), TriggerState::Armed { remaining: 10 });

        // A second match while armed produces no additional transition.
        type_digits(&mut d, "911");
        assert_eq!(d.confirm(), None);
        assert_eq!(d.state(), TriggerState::Armed { remaining: 10 });
    }

    #[test]
    fn test_suffix_match_after_ordinary_arithmetic() {
        let mut d = detector();
        // The user typed 7 + 911 into the calculator; the sequence suffix
        // still matches.
        type_digits(&mut d, "7911");
        assert!(d.confirm().is_some());
    }

    #[test]
    fn test_alternate_code_matches() {
        let mut d = detector();
        type_digits(&mut d, "112");
        assert!(d.confirm().is_some());
    }

    #[test]
    fn test_non_matching_sequence_stays_idle() {
        let mut d = detector();
        type_digits(&mut d, "42");
        assert_eq!(d.confirm(), None);
        assert_eq!(d.state(), TriggerState::Idle);
    }

    #[test]
    fn test_buffer_cleared_on_every_confirm() {
        let mut d = detector();
        type_digits(&mut d, "91");
        assert_eq!(d.confirm(), None);
        // "1" alone after the clear must not complete "911".
        type_digits(&mut d, "1");
        assert_eq!(d.confirm(), None);
    }

    #[test]
    fn test_code_split_across_confirms_does_not_arm() {
        let mut d = detector();
        type_digits(&mut d, "9");
        d.confirm();
        type_digits(&mut d, "11");
        assert_eq!(d.confirm(), None);
    }

    #[test]
    fn test_non_digit_input_ignored() {
        let mut d = detector();
        d.digit('9');
        d.digit('+');
        d.digit('1');
        d.digit('.');
        d.digit('1');
        assert!(d.confirm().is_some());
    }

    #[test]
    fn test_cancel_at_five_of_ten_returns_to_idle() {
        let mut d = detector();
        type_digits(&mut d, "911");
        d.confirm();

        for _ in 0..5 {
            assert_eq!(d.tick(), None);
        }
        assert_eq!(d.state(), TriggerState::Armed { remaining: 5 });

        assert!(d.cancel());
        assert_eq!(d.state(), TriggerState::Idle);

        // No dispatch ever fires after a cancel.
        for _ in 0..20 {
            assert_eq!(d.tick(), None);
        }
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut d = detector();
        type_digits(&mut d, "911");
        d.confirm();
        assert!(d.cancel());
        assert!(!d.cancel());
        assert!(!d.cancel());
        assert_eq!(d.state(), TriggerState::Idle);
    }

    #[test]
    fn test_cancel_while_idle_is_noop() {
        let mut d = detector();
        assert!(!d.cancel());
        assert_eq!(d.state(), TriggerState::Idle);
    }

    #[test]
    fn test_expiry_dispatches_exactly_once() {
        let mut d = detector();
        type_digits(&mut d, "911");
        d.confirm();

        let mut dispatches = 0;
        for _ in 0..25 {
            if d.tick() == Some(TriggerEvent::Dispatch) {
                dispatches += 1;
            }
        }
        assert_eq!(dispatches, 1);
        assert_eq!(d.state(), TriggerState::Dispatching);
    }

    #[test]
    fn test_dispatch_complete_returns_to_idle_and_rearms() {
        let mut d = detector();
        type_digits(&mut d, "911");
        d.confirm();
        for _ in 0..10 {
            d.tick();
        }
        assert_eq!(d.state(), TriggerState::Dispatching);

        d.dispatch_complete();
        assert_eq!(d.state(), TriggerState::Idle);

        // The machine can arm again afterwards.
        type_digits(&mut d, "911");
        assert!(d.confirm().is_some());
    }

    #[test]
    fn test_confirm_while_dispatching_ignored() {
        let mut d = detector();
        type_digits(&mut d, "911");
        d.confirm();
        for _ in 0..10 {
            d.tick();
        }
        type_digits(&mut d, "911");
        assert_eq!(d.confirm(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_countdown_expires() {
        let token = CancellationToken::new();
        let outcome = run_countdown(3, std::time::Duration::from_secs(1), token).await;
        assert_eq!(outcome, CountdownOutcome::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_countdown_cancelled_midway() {
        let token = CancellationToken::new();
        let child = token.clone();
        let run = tokio::spawn(run_countdown(
            10,
            std::time::Duration::from_secs(1),
            child,
        ));

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        token.cancel();

        assert_eq!(run.await.unwrap(), CountdownOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_countdown_cancel_after_expiry_is_noop() {
        let token = CancellationToken::new();
        let outcome = run_countdown(1, std::time::Duration::from_secs(1), token.clone()).await;
        assert_eq!(outcome, CountdownOutcome::Expired);
        // Late cancel must not panic or change anything.
        token.cancel();
    }
}
