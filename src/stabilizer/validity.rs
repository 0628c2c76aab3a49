//! Pose validity: the hysteresis stabilizer projected onto a three-valued state
//!
//! Entry is always immediate (no enter debounce) so a good pose is rewarded on
//! the first frame it is seen; only leaving `Valid` is debounced.

use super::hysteresis::{
    HysteresisStabilizer, StabilizerConfig, StabilizerSettings, StabilizerState,
    StabilizerStrategy,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionState {
    Invalid,
    Detecting,
    Valid,
}

impl DetectionState {
    pub fn from_flags(is_on: bool, is_transitioning: bool) -> Self {
        match (is_on, is_transitioning) {
            (_, true) => Self::Detecting,
            (true, false) => Self::Valid,
            (false, false) => Self::Invalid,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Payload held while valid
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ValidityPayload {
    pub confidence: f32,
}

/// Strategy for a bare confidence scalar
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceStrategy;

impl StabilizerStrategy for ConfidenceStrategy {
    type Input = f32;
    type Output = ValidityPayload;

    fn confidence(&self, input: &f32) -> f32 {
        // Non-finite readings count as no confidence at all
        if input.is_finite() { *input } else { 0.0 }
    }

    fn build_output(&self, input: &f32) -> ValidityPayload {
        ValidityPayload {
            confidence: self.confidence(input),
        }
    }

    fn initial_output(&self) -> ValidityPayload {
        ValidityPayload::default()
    }
}

/// Thresholds for the validity stabilizer. Enter debounce is not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ValiditySettings {
    pub upper_threshold: f32,
    pub lower_threshold: f32,
    pub exit_debounce_ms: u64,
}

impl Default for ValiditySettings {
    fn default() -> Self {
        let defaults = StabilizerSettings::default();
        Self {
            upper_threshold: defaults.upper_threshold,
            lower_threshold: defaults.lower_threshold,
            exit_debounce_ms: defaults.exit_debounce_ms,
        }
    }
}

impl TryFrom<ValiditySettings> for StabilizerConfig {
    type Error = ConfigError;

    fn try_from(settings: ValiditySettings) -> Result<Self, Self::Error> {
        StabilizerConfig::new(
            settings.upper_threshold,
            settings.lower_threshold,
            0,
            settings.exit_debounce_ms,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidityStateInfo {
    pub state: DetectionState,
    /// Raw confidence of the most recent accepted update
    pub last_confidence: f32,
    /// Confidence captured on the last stable-valid frame
    pub stable_confidence: f32,
    pub is_transitioning: bool,
}

pub struct ValidityStabilizer {
    inner: HysteresisStabilizer<ConfidenceStrategy>,
    last_confidence: f32,
}

impl ValidityStabilizer {
    pub fn new(settings: ValiditySettings) -> Result<Self, ConfigError> {
        let config = StabilizerConfig::try_from(settings)?;
        Ok(Self {
            inner: HysteresisStabilizer::new(config, ConfidenceStrategy),
            last_confidence: 0.0,
        })
    }

    pub fn update(&mut self, confidence: f32, timestamp_ms: u64) -> DetectionState {
        // Out-of-order calls leave every field untouched, including this one
        if self.accepts(timestamp_ms) {
            self.last_confidence = ConfidenceStrategy.confidence(&confidence);
        }
        let state = self.inner.update(&confidence, timestamp_ms);
        Self::project(&state)
    }

    pub fn state(&self) -> DetectionState {
        Self::project(&self.inner.state())
    }

    pub fn state_info(&self) -> ValidityStateInfo {
        let state = self.inner.state();
        ValidityStateInfo {
            state: Self::project(&state),
            last_confidence: self.last_confidence,
            stable_confidence: self.inner.output().confidence,
            is_transitioning: state.is_transitioning,
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        self.inner.config()
    }

    pub fn reset(&mut self) {
        self.inner.reset();
        self.last_confidence = 0.0;
    }

    fn accepts(&self, timestamp_ms: u64) -> bool {
        self.inner
            .last_timestamp_ms()
            .is_none_or(|last| timestamp_ms >= last)
    }

    fn project(state: &StabilizerState<ValidityPayload>) -> DetectionState {
        DetectionState::from_flags(state.is_on, state.is_transitioning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stabilizer() -> ValidityStabilizer {
        ValidityStabilizer::new(ValiditySettings {
            upper_threshold: 0.7,
            lower_threshold: 0.5,
            exit_debounce_ms: 200,
        })
        .unwrap()
    }

    #[test]
    fn test_rising_confidence_becomes_valid() {
        let mut s = stabilizer();
        let states: Vec<_> = [0.3, 0.6, 0.8]
            .iter()
            .enumerate()
            .map(|(i, &c)| s.update(c, i as u64 * 33))
            .collect();
        assert_eq!(
            states,
            vec![DetectionState::Invalid, DetectionState::Invalid, DetectionState::Valid]
        );
    }

    #[test]
    fn test_sustained_drop_goes_invalid() {
        let mut s = stabilizer();
        assert_eq!(s.update(0.9, 0), DetectionState::Valid);
        assert_eq!(s.update(0.4, 100), DetectionState::Detecting);
        assert_eq!(s.update(0.4, 300), DetectionState::Invalid);
    }

    #[test]
    fn test_recovery_is_instant() {
        let mut s = stabilizer();
        s.update(0.9, 0);
        assert_eq!(s.update(0.4, 100), DetectionState::Detecting);
        assert_eq!(s.update(0.8, 200), DetectionState::Valid);
    }

    #[test]
    fn test_state_info_reports_confidences() {
        let mut s = stabilizer();
        s.update(0.9, 0);
        s.update(0.3, 50);
        let info = s.state_info();
        assert_eq!(info.state, DetectionState::Detecting);
        assert!(info.is_transitioning);
        assert_eq!(info.last_confidence, 0.3);
        assert_eq!(info.stable_confidence, 0.9);

        // Stale frame does not overwrite the last confidence
        s.update(0.95, 10);
        assert_eq!(s.state_info().last_confidence, 0.3);
    }

    #[test]
    fn test_non_finite_confidence_is_ignored_as_zero() {
        let mut s = stabilizer();
        assert_eq!(s.update(f32::NAN, 0), DetectionState::Invalid);
        s.update(0.9, 10);
        assert_eq!(s.update(f32::INFINITY, 20), DetectionState::Detecting);
    }

    #[test]
    fn test_invalid_settings_fail_construction() {
        let err = ValidityStabilizer::new(ValiditySettings {
            upper_threshold: 0.4,
            lower_threshold: 0.6,
            exit_debounce_ms: 200,
        });
        assert!(matches!(err, Err(ConfigError::InvertedThresholds { .. })));
    }

    #[test]
    fn test_reset() {
        let mut s = stabilizer();
        s.update(0.9, 1000);
        s.reset();
        assert_eq!(s.state(), DetectionState::Invalid);
        assert_eq!(s.state_info().last_confidence, 0.0);
        assert_eq!(s.update(0.9, 0), DetectionState::Valid);
    }
}
