//! Pipeline configuration
//!
//! Defaults reproduce the conditioning the classifier was trained with:
//! 0.5-100 Hz 4th-order Butterworth bandpass, 60 Hz notch (Q = 30),
//! z-score normalization, clipping at ±5 and 4 s non-overlapping windows.

use crate::error::{Result, SeizureError};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Fixed channel count the classifier consumes.
pub const MAX_CHANNELS: usize = 18;

/// Configuration for the conditioning, windowing and inference stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Channels presented downstream (pad or truncate to this)
    #[serde(default = "default_max_channels")]
    pub max_channels: usize,

    /// Low cutoff of the bandpass filter (Hz)
    #[serde(default = "default_bandpass_low")]
    pub bandpass_low: f64,

    /// High cutoff of the bandpass filter (Hz), clamped to 0.99 × Nyquist
    #[serde(default = "default_bandpass_high")]
    pub bandpass_high: f64,

    /// Butterworth prototype order
    #[serde(default = "default_filter_order")]
    pub filter_order: usize,

    /// Mains interference frequency (Hz)
    #[serde(default = "default_notch_frequency")]
    pub notch_frequency: f64,

    /// Quality factor of the notch (higher = narrower)
    #[serde(default = "default_notch_q")]
    pub notch_q: f64,

    #[serde(default = "default_normalization_epsilon")]
    pub normalization_epsilon: f64,

    /// Symmetric clipping bound in normalized units
    #[serde(default = "default_clip_threshold")]
    pub clip_threshold: f64,

    #[serde(default = "default_window_seconds")]
    pub window_seconds: f64,

    /// Fraction of a window shared with the next one, in [0, 1)
    #[serde(default)]
    pub window_overlap: f64,

    /// Mean probability strictly above this is a positive verdict
    #[serde(default = "default_decision_threshold")]
    pub decision_threshold: f64,

    /// Sampling rate the classifier was trained at; `None` accepts any rate
    #[serde(default = "default_expected_sample_rate")]
    pub expected_sample_rate: Option<u32>,

    /// Windows per classifier call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_max_channels() -> usize {
    MAX_CHANNELS
}
fn default_bandpass_low() -> f64 {
    0.5
}
fn default_bandpass_high() -> f64 {
    100.0
}
fn default_filter_order() -> usize {
    4
}
fn default_notch_frequency() -> f64 {
    60.0
}
fn default_notch_q() -> f64 {
    30.0
}
fn default_normalization_epsilon() -> f64 {
    1e-8
}
fn default_clip_threshold() -> f64 {
    5.0
}
fn default_window_seconds() -> f64 {
    4.0
}
fn default_decision_threshold() -> f64 {
    0.5
}
fn default_expected_sample_rate() -> Option<u32> {
    Some(256)
}
fn default_batch_size() -> usize {
    32
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_channels: MAX_CHANNELS,
            bandpass_low: 0.5,
            bandpass_high: 100.0,
            filter_order: 4,
            notch_frequency: 60.0,
            notch_q: 30.0,
            normalization_epsilon: 1e-8,
            clip_threshold: 5.0,
            window_seconds: 4.0,
            window_overlap: 0.0,
            decision_threshold: 0.5,
            expected_sample_rate: Some(256),
            batch_size: 32,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables (and `.env` if present)
    ///
    /// Every field falls back to its default when the variable is unset.
    /// `SEIZURE_EXPECTED_SAMPLE_RATE=any` disables the sampling-rate check.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let expected_sample_rate = match env::var("SEIZURE_EXPECTED_SAMPLE_RATE") {
            Ok(v) if v.eq_ignore_ascii_case("any") || v.is_empty() => None,
            Ok(v) => Some(v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "SEIZURE_EXPECTED_SAMPLE_RATE".to_string(),
                value: v.clone(),
            })?),
            Err(_) => defaults.expected_sample_rate,
        };

        Ok(Self {
            max_channels: env_or("SEIZURE_MAX_CHANNELS", defaults.max_channels)?,
            bandpass_low: env_or("SEIZURE_BANDPASS_LOW", defaults.bandpass_low)?,
            bandpass_high: env_or("SEIZURE_BANDPASS_HIGH", defaults.bandpass_high)?,
            filter_order: env_or("SEIZURE_FILTER_ORDER", defaults.filter_order)?,
            notch_frequency: env_or("SEIZURE_NOTCH_FREQUENCY", defaults.notch_frequency)?,
            notch_q: env_or("SEIZURE_NOTCH_Q", defaults.notch_q)?,
            normalization_epsilon: env_or(
                "SEIZURE_NORMALIZATION_EPSILON",
                defaults.normalization_epsilon,
            )?,
            clip_threshold: env_or("SEIZURE_CLIP_THRESHOLD", defaults.clip_threshold)?,
            window_seconds: env_or("SEIZURE_WINDOW_SECONDS", defaults.window_seconds)?,
            window_overlap: env_or("SEIZURE_WINDOW_OVERLAP", defaults.window_overlap)?,
            decision_threshold: env_or(
                "SEIZURE_DECISION_THRESHOLD",
                defaults.decision_threshold,
            )?,
            expected_sample_rate,
            batch_size: env_or("SEIZURE_BATCH_SIZE", defaults.batch_size)?,
        })
    }

    /// Reject configurations that could never produce a valid window batch.
    ///
    /// Meant to run once at startup; the error is a configuration bug, not a
    /// per-request condition.
    pub fn validate(&self) -> Result<()> {
        if !self.window_seconds.is_finite() || self.window_seconds <= 0.0 {
            return Err(SeizureError::InvalidWindowConfig(format!(
                "window_seconds must be positive, got {}",
                self.window_seconds
            )));
        }
        if !(0.0..1.0).contains(&self.window_overlap) {
            return Err(SeizureError::InvalidWindowConfig(format!(
                "window_overlap must be in [0, 1), got {}",
                self.window_overlap
            )));
        }
        if self.max_channels == 0 {
            return Err(SeizureError::InvalidWindowConfig(
                "max_channels must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(SeizureError::InvalidWindowConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if let Some(rate) = self.expected_sample_rate {
            crate::windowing::WindowGeometry::new(self.window_seconds, self.window_overlap, rate)?;
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> std::result::Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}
