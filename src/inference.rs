//! Inference orchestration
//!
//! Scores a [`WindowBatch`] with a bound [`Classifier`] and reduces the
//! per-window probabilities to one recording-level verdict.

use crate::error::{Result, SeizureError};
use crate::types::{PredictionResult, WindowBatch};
use ndarray::{ArrayView3, Axis};
use std::path::Path;
use std::sync::{Arc, OnceLock};

/// Binary seizure classifier over time-major windows
///
/// `score` receives a (windows, time_steps, channels) tensor and must return
/// one probability in [0, 1] per window, in input order.
pub trait Classifier: Send + Sync {
    /// Expected (time_steps, channels) of a single window
    fn input_shape(&self) -> (usize, usize);

    fn score(&self, batch: ArrayView3<'_, f64>) -> anyhow::Result<Vec<f64>>;
}

/// Load-once slot for the process-wide classifier
///
/// Empty until [`ModelBinding::bind`] succeeds; read-only afterwards.
#[derive(Default)]
pub struct ModelBinding {
    slot: OnceLock<Arc<dyn Classifier>>,
}

impl ModelBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(classifier: Arc<dyn Classifier>) -> Self {
        let binding = Self::new();
        // A fresh slot is always empty
        let _ = binding.slot.set(classifier);
        binding
    }

    /// Bind the classifier; a second bind is rejected
    pub fn bind(&self, classifier: Arc<dyn Classifier>) -> Result<()> {
        self.slot
            .set(classifier)
            .map_err(|_| SeizureError::Internal("Classifier is already bound".to_string()))
    }

    /// Build the classifier from a weight artifact and bind it
    ///
    /// A missing artifact leaves the binding empty so later requests fail with
    /// `ModelUnavailable`; a loader failure is returned as `ModelUnavailable`.
    pub fn load_from<P, F>(&self, weights: P, loader: F) -> Result<bool>
    where
        P: AsRef<Path>,
        F: FnOnce(&Path) -> anyhow::Result<Arc<dyn Classifier>>,
    {
        let weights = weights.as_ref();
        if !weights.exists() {
            log::warn!("Model weights not found at {}", weights.display());
            return Ok(false);
        }

        log::info!("Loading classifier from {}", weights.display());
        let classifier = loader(weights).map_err(|e| {
            SeizureError::ModelUnavailable(format!(
                "failed to load {}: {:#}",
                weights.display(),
                e
            ))
        })?;
        self.bind(classifier)?;
        log::info!("Classifier loaded");
        Ok(true)
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn get(&self) -> Result<&Arc<dyn Classifier>> {
        self.slot
            .get()
            .ok_or_else(|| SeizureError::ModelUnavailable("no classifier is bound".to_string()))
    }
}

impl std::fmt::Debug for ModelBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBinding")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// Drives a classifier over window batches
#[derive(Debug, Clone)]
pub struct InferenceOrchestrator {
    binding: Arc<ModelBinding>,
    batch_size: usize,
    decision_threshold: f64,
}

impl InferenceOrchestrator {
    pub fn new(binding: Arc<ModelBinding>, batch_size: usize, decision_threshold: f64) -> Self {
        Self {
            binding,
            batch_size: batch_size.max(1),
            decision_threshold,
        }
    }

    pub fn binding(&self) -> &Arc<ModelBinding> {
        &self.binding
    }

    /// Score every window and aggregate
    ///
    /// Fails before scoring if no classifier is bound or the batch is empty;
    /// any scoring failure fails the whole batch.
    pub fn run(&self, batch: &WindowBatch) -> Result<PredictionResult> {
        let classifier = self.binding.get()?;

        if batch.is_empty() {
            return Err(SeizureError::EmptyBatch(format!(
                "recording is shorter than one {}-sample window",
                batch.window_length()
            )));
        }

        let (time_steps, channels) = classifier.input_shape();
        if batch.window_length() != time_steps {
            return Err(SeizureError::UnsupportedSampleRate(format!(
                "windows have {} samples at {} Hz but the classifier expects {}",
                batch.window_length(),
                batch.sample_rate(),
                time_steps
            )));
        }
        if batch.num_channels() != channels {
            return Err(SeizureError::Internal(format!(
                "windows have {} channels but the classifier expects {}",
                batch.num_channels(),
                channels
            )));
        }

        let mut probabilities = Vec::with_capacity(batch.len());
        for chunk in batch.tensor().axis_chunks_iter(Axis(0), self.batch_size) {
            let expected = chunk.len_of(Axis(0));
            let scores = classifier
                .score(chunk)
                .map_err(|e| SeizureError::Internal(format!("classifier failed: {:#}", e)))?;
            if scores.len() != expected {
                return Err(SeizureError::Internal(format!(
                    "classifier returned {} scores for {} windows",
                    scores.len(),
                    expected
                )));
            }
            probabilities.extend(scores);
        }

        aggregate(probabilities, self.decision_threshold)
    }
}

/// Mean / max reduction with a strict threshold on the mean
pub fn aggregate(window_probabilities: Vec<f64>, threshold: f64) -> Result<PredictionResult> {
    if window_probabilities.is_empty() {
        return Err(SeizureError::EmptyBatch("no window probabilities".to_string()));
    }
    if let Some((idx, p)) = window_probabilities
        .iter()
        .enumerate()
        .find(|(_, p)| !p.is_finite() || **p < 0.0 || **p > 1.0)
    {
        return Err(SeizureError::Internal(format!(
            "classifier returned {} for window {}, outside [0, 1]",
            p, idx
        )));
    }

    let mean_probability =
        window_probabilities.iter().sum::<f64>() / window_probabilities.len() as f64;
    let max_probability = window_probabilities
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    Ok(PredictionResult {
        seizure_detected: mean_probability > threshold,
        mean_probability,
        max_probability,
        window_probabilities,
    })
}
