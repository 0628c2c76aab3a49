use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to load settings: {0}")]
    Settings(#[from] ::config::ConfigError),
    #[error("Failed to read replay file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed replay record on line {1}: {0}")]
    Replay(serde_json::Error, usize),
}

// Construction-time misconfiguration. Never produced while processing frames.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be within [0, 1], got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f32 },
    #[error("upper threshold ({upper}) must be greater than lower threshold ({lower})")]
    InvertedThresholds { upper: f32, lower: f32 },
    #[error("{name} must be at most {max}ms, got {value}ms")]
    DebounceOutOfRange {
        name: &'static str,
        value: u64,
        max: u64,
    },
    #[error("target fps must be a positive number no greater than 240, got {0}")]
    InvalidTargetFps(f32),
    #[error("{name} must be greater than 0")]
    ZeroValue { name: &'static str },
    #[error("{name} must be a positive finite number, got {value}")]
    NotPositive { name: &'static str, value: f32 },
    #[error("memory cap must be within (0, 100], got {0}")]
    InvalidMemoryCap(f32),
}
