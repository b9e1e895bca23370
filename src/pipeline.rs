//! Detection pipeline
//!
//! Composes the stages strictly in order:
//! 1. Load (pad/truncate to the fixed channel count)
//! 2. Zero-phase bandpass + notch
//! 3. Per-channel z-score
//! 4. Clip to ±threshold
//! 5. Window
//! 6. Score and aggregate
//!
//! Every stage takes ownership of (or borrows) the previous output and returns
//! a fresh value; nothing is shared between runs except the read-only model
//! binding. A [`CancellationToken`] is checked between stages.

use crate::conditioning::{clip, normalize};
use crate::config::PipelineConfig;
use crate::error::{ErrorResponse, Result, SeizureError};
use crate::filters::FilterBank;
use crate::inference::{InferenceOrchestrator, ModelBinding};
use crate::loader::load_recording;
use crate::profile_scope;
use crate::types::{ConditionedSignal, PredictionResponse, PredictionResult, Recording, WindowBatch};
use crate::windowing::extract_windows;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Filter, normalize and clip a recording
pub fn condition(recording: Recording, config: &PipelineConfig) -> Result<ConditionedSignal> {
    let sample_rate = recording.sample_rate;

    let filtered = {
        profile_scope!("filter");
        let bank = FilterBank::design(config, sample_rate)?;
        bank.apply(&recording)?
    };
    drop(recording);

    let normalized = {
        profile_scope!("normalize");
        normalize(filtered, config.normalization_epsilon)
    };

    let clipped = {
        profile_scope!("clip");
        clip(normalized, config.clip_threshold)
    };

    Ok(ConditionedSignal {
        data: clipped,
        sample_rate,
    })
}

fn checkpoint(token: &CancellationToken, next_stage: &str) -> Result<()> {
    if token.is_cancelled() {
        log::info!("Pipeline cancelled before {}", next_stage);
        return Err(SeizureError::Cancelled(next_stage.to_string()));
    }
    Ok(())
}

/// Recording-to-verdict pipeline bound to one configuration and classifier
#[derive(Debug, Clone)]
pub struct SeizureDetector {
    config: PipelineConfig,
    orchestrator: InferenceOrchestrator,
}

impl SeizureDetector {
    /// Validates `config` up front; an invalid window setup is a startup error.
    pub fn new(config: PipelineConfig, binding: Arc<ModelBinding>) -> Result<Self> {
        config.validate()?;
        let orchestrator =
            InferenceOrchestrator::new(binding, config.batch_size, config.decision_threshold);
        Ok(Self {
            config,
            orchestrator,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn load(&self, path: &Path) -> Result<Recording> {
        profile_scope!("load");
        load_recording(path, self.config.max_channels)
    }

    /// Stages 2-5 on an already loaded recording
    pub fn preprocess_recording(
        &self,
        recording: Recording,
        token: &CancellationToken,
    ) -> Result<WindowBatch> {
        if let Some(expected) = self.config.expected_sample_rate {
            if recording.sample_rate != expected {
                return Err(SeizureError::UnsupportedSampleRate(format!(
                    "recording is sampled at {} Hz, the classifier expects {} Hz",
                    recording.sample_rate, expected
                )));
            }
        }

        checkpoint(token, "filtering")?;
        let conditioned = condition(recording, &self.config)?;

        checkpoint(token, "windowing")?;
        profile_scope!("window");
        extract_windows(
            &conditioned,
            self.config.window_seconds,
            self.config.window_overlap,
        )
    }

    /// Stages 1-5: the window batch a classifier would score for `path`
    pub fn preprocess_file(&self, path: &Path) -> Result<WindowBatch> {
        self.preprocess_file_cancellable(path, &CancellationToken::new())
    }

    pub fn preprocess_file_cancellable(
        &self,
        path: &Path,
        token: &CancellationToken,
    ) -> Result<WindowBatch> {
        checkpoint(token, "loading")?;
        let recording = self.load(path)?;
        self.preprocess_recording(recording, token)
    }

    pub fn predict_recording(&self, recording: Recording) -> Result<PredictionResult> {
        self.predict_recording_cancellable(recording, &CancellationToken::new())
    }

    pub fn predict_recording_cancellable(
        &self,
        recording: Recording,
        token: &CancellationToken,
    ) -> Result<PredictionResult> {
        // Fail fast before spending time on conditioning
        self.orchestrator.binding().get()?;

        let batch = self.preprocess_recording(recording, token)?;
        checkpoint(token, "inference")?;
        self.score(&batch)
    }

    pub fn predict_file(&self, path: &Path) -> Result<PredictionResult> {
        self.predict_file_cancellable(path, &CancellationToken::new())
    }

    pub fn predict_file_cancellable(
        &self,
        path: &Path,
        token: &CancellationToken,
    ) -> Result<PredictionResult> {
        self.orchestrator.binding().get()?;

        let batch = self.preprocess_file_cancellable(path, token)?;
        checkpoint(token, "inference")?;
        self.score(&batch)
    }

    fn score(&self, batch: &WindowBatch) -> Result<PredictionResult> {
        profile_scope!("inference");
        let result = self.orchestrator.run(batch)?;
        log::info!(
            "Scored {} windows: mean={:.4} max={:.4} seizure={}",
            result.window_probabilities.len(),
            result.mean_probability,
            result.max_probability,
            result.seizure_detected
        );
        Ok(result)
    }

    /// Full request: the success payload or a structured error
    pub fn respond(
        &self,
        path: &Path,
        recording_identifier: &str,
    ) -> std::result::Result<PredictionResponse, ErrorResponse> {
        match self.predict_file(path) {
            Ok(result) => Ok(result.into_response(recording_identifier)),
            Err(err) => {
                if err.kind().is_client_error() {
                    log::warn!("Rejected {}: {}", recording_identifier, err);
                } else {
                    log::error!("Failed to score {}: {}", recording_identifier, err);
                }
                Err(err.to_response())
            }
        }
    }
}
