//! Fixed-length windowing of conditioned signals
//!
//! Windows start every `step_length` samples; a trailing window that would run
//! past the end of the recording is dropped, never padded. Each window is
//! transposed to (time, channels), the layout the classifier consumes.

use crate::error::{Result, SeizureError};
use crate::types::{ConditionedSignal, WindowBatch};
use ndarray::{s, Array3, Axis};

/// Slack for floating-point error when converting seconds to samples
const LENGTH_TOLERANCE: f64 = 1e-9;

/// Window length and stride in samples for one sampling rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowGeometry {
    pub window_length: usize,
    pub step_length: usize,
}

impl WindowGeometry {
    pub fn new(window_seconds: f64, overlap: f64, sample_rate: u32) -> Result<Self> {
        if !window_seconds.is_finite() || window_seconds <= 0.0 {
            return Err(SeizureError::InvalidWindowConfig(format!(
                "window_seconds must be positive, got {}",
                window_seconds
            )));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(SeizureError::InvalidWindowConfig(format!(
                "overlap must be in [0, 1), got {}",
                overlap
            )));
        }

        // Truncates, but a product that lands just below an integer counts as it
        let window_length = (window_seconds * sample_rate as f64 + LENGTH_TOLERANCE) as usize;
        if window_length == 0 {
            return Err(SeizureError::InvalidWindowConfig(format!(
                "{} s at {} Hz is shorter than one sample",
                window_seconds, sample_rate
            )));
        }

        let step_length = (window_length as f64 * (1.0 - overlap)).floor() as usize;
        if step_length == 0 {
            return Err(SeizureError::InvalidWindowConfig(format!(
                "overlap {} leaves a step of 0 samples for {}-sample windows",
                overlap, window_length
            )));
        }

        Ok(Self {
            window_length,
            step_length,
        })
    }

    /// Complete windows that fit in `total_samples`
    pub fn window_count(&self, total_samples: usize) -> usize {
        if total_samples < self.window_length {
            0
        } else {
            (total_samples - self.window_length) / self.step_length + 1
        }
    }
}

/// Cut a conditioned signal into (time, channels) windows
pub fn extract_windows(
    signal: &ConditionedSignal,
    window_seconds: f64,
    overlap: f64,
) -> Result<WindowBatch> {
    let geometry = WindowGeometry::new(window_seconds, overlap, signal.sample_rate)?;
    let num_channels = signal.num_channels();
    let total_samples = signal.num_samples();
    let count = geometry.window_count(total_samples);

    if count == 0 {
        log::debug!(
            "Recording has {} samples, shorter than one {}-sample window",
            total_samples,
            geometry.window_length
        );
        return Ok(WindowBatch::empty(
            geometry.window_length,
            num_channels,
            signal.sample_rate,
        ));
    }

    let mut tensor = Array3::<f64>::zeros((count, geometry.window_length, num_channels));
    let mut offsets = Vec::with_capacity(count);

    for (i, mut window) in tensor.axis_iter_mut(Axis(0)).enumerate() {
        let start = i * geometry.step_length;
        let end = start + geometry.window_length;
        window.assign(&signal.data.slice(s![.., start..end]).t());
        offsets.push(start);
    }

    log::debug!(
        "Extracted {} windows of {} samples (step {}) from {} samples",
        count,
        geometry.window_length,
        geometry.step_length,
        total_samples
    );

    Ok(WindowBatch {
        tensor,
        offsets,
        sample_rate: signal.sample_rate,
    })
}
