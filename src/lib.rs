//! EEG seizure detection core
//!
//! Loads an EDF recording, conditions it into fixed-shape windows and turns a
//! classifier's per-window probabilities into one verdict per recording.

pub mod conditioning;
pub mod config;
pub mod edf;
pub mod error;
pub mod filters;
pub mod inference;
pub mod loader;
pub mod pipeline;
pub mod profiling;
pub mod types;
pub mod windowing;

pub use config::{ConfigError, PipelineConfig, MAX_CHANNELS};
pub use error::{ErrorKind, ErrorResponse, Result, SeizureError};
pub use filters::{ButterworthFilter, FilterBank, NotchFilter, SosFilter};
pub use inference::{aggregate, Classifier, InferenceOrchestrator, ModelBinding};
pub use loader::{load_recording, load_recording_from_reader};
pub use pipeline::{condition, SeizureDetector};
pub use types::*;
pub use windowing::{extract_windows, WindowGeometry};
pub use tokio_util::sync::CancellationToken;
