//! Stabilizer module - hysteresis state machines
//!
//! Re-exports only. All logic in submodules.

pub mod hysteresis;
pub mod validity;

pub use hysteresis::{
    HysteresisStabilizer, MAX_DEBOUNCE_MS, StabilizerConfig, StabilizerPhase, StabilizerSettings,
    StabilizerState, StabilizerStrategy,
};
pub use validity::{
    ConfidenceStrategy, DetectionState, ValidityPayload, ValiditySettings, ValidityStabilizer,
    ValidityStateInfo,
};
