//! Debounced two-threshold state machine
//!
//! Turns a noisy confidence scalar into a stable on/off signal:
//!
//! ```text
//!            conf >= upper                 elapsed >= enter_debounce
//!   Off ─────────────────────▶ Entering ─────────────────────────────▶ On
//!    ▲  ◀───────────────────  (conf < upper)                            │
//!    │                                                   conf < lower   │
//!    │   elapsed >= exit_debounce                                       ▼
//!    └────────────────────────────────────────────────────────────── Exiting
//!                                       conf >= lower: back to On at once
//! ```
//!
//! Entering is skipped when `enter_debounce_ms == 0`. While on (including
//! exiting) the reported payload is the one built on the last stable frame.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Longest debounce accepted at construction
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Validated stabilizer thresholds. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StabilizerConfig {
    upper_threshold: f32,
    lower_threshold: f32,
    enter_debounce_ms: u64,
    exit_debounce_ms: u64,
}

impl StabilizerConfig {
    pub fn new(
        upper_threshold: f32,
        lower_threshold: f32,
        enter_debounce_ms: u64,
        exit_debounce_ms: u64,
    ) -> Result<Self, ConfigError> {
        check_unit("upper threshold", upper_threshold)?;
        check_unit("lower threshold", lower_threshold)?;
        if upper_threshold <= lower_threshold {
            return Err(ConfigError::InvertedThresholds {
                upper: upper_threshold,
                lower: lower_threshold,
            });
        }
        check_debounce("enter debounce", enter_debounce_ms)?;
        check_debounce("exit debounce", exit_debounce_ms)?;

        Ok(Self {
            upper_threshold,
            lower_threshold,
            enter_debounce_ms,
            exit_debounce_ms,
        })
    }

    pub fn upper_threshold(&self) -> f32 {
        self.upper_threshold
    }

    pub fn lower_threshold(&self) -> f32 {
        self.lower_threshold
    }

    pub fn enter_debounce_ms(&self) -> u64 {
        self.enter_debounce_ms
    }

    pub fn exit_debounce_ms(&self) -> u64 {
        self.exit_debounce_ms
    }
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            upper_threshold: 0.7,
            lower_threshold: 0.5,
            enter_debounce_ms: 0,
            exit_debounce_ms: 200,
        }
    }
}

/// Unvalidated form used by settings files
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StabilizerSettings {
    pub upper_threshold: f32,
    pub lower_threshold: f32,
    pub enter_debounce_ms: u64,
    pub exit_debounce_ms: u64,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        let config = StabilizerConfig::default();
        Self {
            upper_threshold: config.upper_threshold,
            lower_threshold: config.lower_threshold,
            enter_debounce_ms: config.enter_debounce_ms,
            exit_debounce_ms: config.exit_debounce_ms,
        }
    }
}

impl TryFrom<StabilizerSettings> for StabilizerConfig {
    type Error = ConfigError;

    fn try_from(settings: StabilizerSettings) -> Result<Self, Self::Error> {
        Self::new(
            settings.upper_threshold,
            settings.lower_threshold,
            settings.enter_debounce_ms,
            settings.exit_debounce_ms,
        )
    }
}

fn check_unit(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ThresholdOutOfRange { name, value });
    }
    Ok(())
}

fn check_debounce(name: &'static str, value: u64) -> Result<(), ConfigError> {
    if value > MAX_DEBOUNCE_MS {
        return Err(ConfigError::DebounceOutOfRange {
            name,
            value,
            max: MAX_DEBOUNCE_MS,
        });
    }
    Ok(())
}

// ============================================================================
// STRATEGY
// ============================================================================

/// What a stabilizer needs to know about the signal it debounces
pub trait StabilizerStrategy {
    type Input;
    type Output: Clone;

    /// Confidence in [0, 1] carried by this input
    fn confidence(&self, input: &Self::Input) -> f32;

    /// Payload to report while stably on
    fn build_output(&self, input: &Self::Input) -> Self::Output;

    /// Payload reported while off
    fn initial_output(&self) -> Self::Output;
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilizerPhase {
    Off,
    Entering { since_ms: u64 },
    On,
    Exiting { since_ms: u64 },
}

impl StabilizerPhase {
    pub fn is_on(&self) -> bool {
        matches!(self, Self::On | Self::Exiting { .. })
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Entering { .. } | Self::Exiting { .. })
    }

    pub fn transition_start(&self) -> Option<u64> {
        match *self {
            Self::Entering { since_ms } | Self::Exiting { since_ms } => Some(since_ms),
            Self::Off | Self::On => None,
        }
    }
}

/// What the caller sees after each update
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerState<P> {
    pub is_on: bool,
    pub is_transitioning: bool,
    pub transition_start_ms: Option<u64>,
    pub last_stable_output: P,
}

pub struct HysteresisStabilizer<S: StabilizerStrategy> {
    config: StabilizerConfig,
    strategy: S,
    phase: StabilizerPhase,
    last_stable_output: S::Output,
    last_timestamp_ms: Option<u64>,
}

impl<S: StabilizerStrategy> HysteresisStabilizer<S> {
    pub fn new(config: StabilizerConfig, strategy: S) -> Self {
        let last_stable_output = strategy.initial_output();
        Self {
            config,
            strategy,
            phase: StabilizerPhase::Off,
            last_stable_output,
            last_timestamp_ms: None,
        }
    }

    /// Feed one observation.
    ///
    /// A timestamp earlier than the last one seen is ignored entirely.
    pub fn update(&mut self, input: &S::Input, timestamp_ms: u64) -> StabilizerState<S::Output> {
        if let Some(last) = self.last_timestamp_ms
            && timestamp_ms < last
        {
            debug!(
                "Ignoring out-of-order update at {}ms (last seen {}ms)",
                timestamp_ms, last
            );
            return self.state();
        }
        self.last_timestamp_ms = Some(timestamp_ms);

        let confidence = self.strategy.confidence(input);
        let upper = self.config.upper_threshold;
        let lower = self.config.lower_threshold;

        let mut next = match self.phase {
            StabilizerPhase::Off if confidence >= upper => StabilizerPhase::Entering {
                since_ms: timestamp_ms,
            },
            StabilizerPhase::Off => StabilizerPhase::Off,
            StabilizerPhase::Entering { .. } if confidence < upper => StabilizerPhase::Off,
            StabilizerPhase::On if confidence < lower => StabilizerPhase::Exiting {
                since_ms: timestamp_ms,
            },
            StabilizerPhase::Exiting { .. } if confidence >= lower => StabilizerPhase::On,
            phase => phase,
        };

        // A zero debounce commits on the same update that started the timer
        next = match next {
            StabilizerPhase::Entering { since_ms }
                if timestamp_ms - since_ms >= self.config.enter_debounce_ms =>
            {
                StabilizerPhase::On
            }
            StabilizerPhase::Exiting { since_ms }
                if timestamp_ms - since_ms >= self.config.exit_debounce_ms =>
            {
                StabilizerPhase::Off
            }
            phase => phase,
        };

        if next != self.phase {
            debug!(
                "Stabilizer {:?} -> {:?} at {}ms (confidence {:.2})",
                self.phase, next, timestamp_ms, confidence
            );
        }

        match next {
            StabilizerPhase::On => self.last_stable_output = self.strategy.build_output(input),
            StabilizerPhase::Off if self.phase.is_on() => {
                self.last_stable_output = self.strategy.initial_output()
            }
            _ => {}
        }
        self.phase = next;

        self.state()
    }

    pub fn state(&self) -> StabilizerState<S::Output> {
        StabilizerState {
            is_on: self.phase.is_on(),
            is_transitioning: self.phase.is_transitioning(),
            transition_start_ms: self.phase.transition_start(),
            last_stable_output: self.last_stable_output.clone(),
        }
    }

    pub fn phase(&self) -> StabilizerPhase {
        self.phase
    }

    pub fn output(&self) -> &S::Output {
        &self.last_stable_output
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.last_timestamp_ms
    }

    /// Back to off with the initial payload; clears all timers.
    pub fn reset(&mut self) {
        self.phase = StabilizerPhase::Off;
        self.last_stable_output = self.strategy.initial_output();
        self.last_timestamp_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Confidence is the input; payload remembers the confidence it was built from
    struct Echo;

    impl StabilizerStrategy for Echo {
        type Input = f32;
        type Output = Option<f32>;

        fn confidence(&self, input: &f32) -> f32 {
            *input
        }

        fn build_output(&self, input: &f32) -> Option<f32> {
            Some(*input)
        }

        fn initial_output(&self) -> Option<f32> {
            None
        }
    }

    fn stabilizer(enter_ms: u64, exit_ms: u64) -> HysteresisStabilizer<Echo> {
        let config = StabilizerConfig::new(0.7, 0.5, enter_ms, exit_ms).unwrap();
        HysteresisStabilizer::new(config, Echo)
    }

    #[test]
    fn test_config_validation() {
        assert!(StabilizerConfig::new(0.7, 0.5, 0, 200).is_ok());
        assert_eq!(
            StabilizerConfig::new(0.5, 0.7, 0, 200),
            Err(ConfigError::InvertedThresholds {
                upper: 0.5,
                lower: 0.7
            })
        );
        assert!(matches!(
            StabilizerConfig::new(0.6, 0.6, 0, 0),
            Err(ConfigError::InvertedThresholds { .. })
        ));
        assert!(matches!(
            StabilizerConfig::new(1.2, 0.5, 0, 0),
            Err(ConfigError::ThresholdOutOfRange { .. })
        ));
        assert!(matches!(
            StabilizerConfig::new(0.7, f32::NAN, 0, 0),
            Err(ConfigError::ThresholdOutOfRange { .. })
        ));
        assert!(matches!(
            StabilizerConfig::new(0.7, 0.5, 0, MAX_DEBOUNCE_MS + 1),
            Err(ConfigError::DebounceOutOfRange { .. })
        ));
    }

    #[test]
    fn test_immediate_entry_without_enter_debounce() {
        let mut s = stabilizer(0, 200);
        assert!(!s.update(&0.3, 0).is_on);
        assert!(!s.update(&0.6, 33).is_on);
        let state = s.update(&0.8, 66);
        assert!(state.is_on);
        assert!(!state.is_transitioning);
        assert_eq!(state.last_stable_output, Some(0.8));
    }

    #[test]
    fn test_enter_debounce_and_cancel() {
        let mut s = stabilizer(100, 200);
        let state = s.update(&0.9, 0);
        assert!(!state.is_on);
        assert!(state.is_transitioning);
        assert_eq!(state.transition_start_ms, Some(0));

        // Dropping below upper cancels the entry
        assert!(!s.update(&0.6, 50).is_transitioning);
        assert_eq!(s.phase(), StabilizerPhase::Off);

        s.update(&0.9, 60);
        assert!(!s.update(&0.9, 120).is_on);
        let state = s.update(&0.9, 160);
        assert!(state.is_on);
        assert_eq!(state.last_stable_output, Some(0.9));
    }

    #[test]
    fn test_hysteresis_band_holds_on() {
        let mut s = stabilizer(0, 200);
        s.update(&0.8, 0);
        let state = s.update(&0.55, 33);
        assert!(state.is_on);
        assert!(!state.is_transitioning);
    }

    #[test]
    fn test_exit_keeps_last_stable_payload() {
        let mut s = stabilizer(0, 200);
        s.update(&0.8, 0);
        s.update(&0.75, 33);
        let state = s.update(&0.2, 66);
        assert!(state.is_on);
        assert!(state.is_transitioning);
        assert_eq!(state.last_stable_output, Some(0.75));

        let state = s.update(&0.1, 266);
        assert!(!state.is_on);
        assert_eq!(state.last_stable_output, None);
    }

    #[test]
    fn test_recovery_during_exit_is_immediate() {
        let mut s = stabilizer(0, 200);
        s.update(&0.8, 0);
        s.update(&0.4, 100);
        let state = s.update(&0.5, 101);
        assert!(state.is_on);
        assert!(!state.is_transitioning);
        assert_eq!(state.transition_start_ms, None);
    }

    #[test]
    fn test_zero_exit_debounce_drops_at_once() {
        let mut s = stabilizer(0, 0);
        s.update(&0.8, 0);
        let state = s.update(&0.4, 10);
        assert!(!state.is_on);
        assert!(!state.is_transitioning);
    }

    #[test]
    fn test_out_of_order_timestamp_is_ignored() {
        let mut s = stabilizer(0, 200);
        s.update(&0.8, 1000);
        let before = s.state();
        let after = s.update(&0.0, 900);
        assert_eq!(before, after);

        // The exit timer is measured from the in-order call only
        s.update(&0.1, 1100);
        assert!(s.update(&0.1, 1299).is_on);
        assert!(!s.update(&0.1, 1300).is_on);
    }

    #[test]
    fn test_reset_returns_to_initial_state() {
        let mut s = stabilizer(0, 200);
        s.update(&0.9, 500);
        s.update(&0.1, 600);
        s.reset();
        let state = s.state();
        assert!(!state.is_on);
        assert!(!state.is_transitioning);
        assert_eq!(state.last_stable_output, None);

        // Earlier timestamps are accepted again after reset
        assert!(s.update(&0.9, 0).is_on);
    }

    #[test]
    fn test_never_drops_faster_than_exit_debounce() {
        let mut rng = StdRng::seed_from_u64(42);
        let exit_ms = 200;

        for _ in 0..50 {
            let mut s = stabilizer(0, exit_ms);
            let mut now = 0u64;
            let mut below_lower_since: Option<u64> = None;
            let mut was_on = false;

            for _ in 0..200 {
                now += rng.random_range(1..80);
                let confidence: f32 = rng.random_range(0.0..1.0);
                let state = s.update(&confidence, now);

                if confidence >= 0.5 {
                    below_lower_since = None;
                } else if below_lower_since.is_none() && was_on {
                    below_lower_since = Some(now);
                }

                if was_on && !state.is_on {
                    let since = below_lower_since.expect("dropped without a low reading");
                    assert!(now - since >= exit_ms);
                }
                if was_on && confidence >= 0.5 {
                    // Recovery clears the exit at once
                    assert!(state.is_on && !state.is_transitioning);
                }
                was_on = state.is_on;
            }
        }
    }
}
