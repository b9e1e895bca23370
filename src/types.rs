use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Multi-channel recording with a fixed channel count
///
/// `data` is laid out as (channels, samples). Rows past `source_channels`
/// are zero padding.
#[derive(Debug, Clone)]
pub struct Recording {
    pub data: Array2<f64>,
    pub sample_rate: u32,
    pub channel_labels: Vec<String>,
    source_channels: usize,
}

impl Recording {
    /// Build a recording from per-channel samples, padding with zero rows or
    /// dropping trailing channels so exactly `max_channels` rows remain.
    ///
    /// Channels shorter than the first one are zero-extended; longer ones are
    /// cut to the first channel's length.
    pub fn from_channels(
        channels: Vec<Vec<f64>>,
        channel_labels: Vec<String>,
        sample_rate: u32,
        max_channels: usize,
    ) -> Self {
        let source_channels = channels.len().min(max_channels);
        let num_samples = channels.first().map(|c| c.len()).unwrap_or(0);

        let mut data = Array2::<f64>::zeros((max_channels, num_samples));
        for (mut row, channel) in data.axis_iter_mut(Axis(0)).zip(channels.iter()) {
            let n = channel.len().min(num_samples);
            for (dst, &src) in row.iter_mut().zip(&channel[..n]) {
                *dst = src;
            }
        }

        let mut channel_labels = channel_labels;
        channel_labels.truncate(source_channels);

        Self {
            data,
            sample_rate,
            channel_labels,
            source_channels,
        }
    }

    pub fn num_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_samples(&self) -> usize {
        self.data.ncols()
    }

    /// Channels that came from the source, before zero padding
    pub fn source_channels(&self) -> usize {
        self.source_channels
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_samples() as f64 / self.sample_rate as f64
    }
}

/// Filtered, normalized and clipped signal, same layout as [`Recording`]
#[derive(Debug, Clone)]
pub struct ConditionedSignal {
    pub data: Array2<f64>,
    pub sample_rate: u32,
}

impl ConditionedSignal {
    pub fn num_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_samples(&self) -> usize {
        self.data.ncols()
    }
}

/// Windows cut from one recording, in temporal order
///
/// Stored as a single (windows, time_steps, channels) tensor.
#[derive(Debug, Clone)]
pub struct WindowBatch {
    pub(crate) tensor: Array3<f64>,
    pub(crate) offsets: Vec<usize>,
    pub(crate) sample_rate: u32,
}

impl WindowBatch {
    pub fn empty(window_length: usize, channels: usize, sample_rate: u32) -> Self {
        Self {
            tensor: Array3::zeros((0, window_length, channels)),
            offsets: Vec::new(),
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.tensor.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn window_length(&self) -> usize {
        self.tensor.len_of(Axis(1))
    }

    pub fn num_channels(&self) -> usize {
        self.tensor.len_of(Axis(2))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Window `index` as (time_steps, channels)
    pub fn window(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        (index < self.len()).then(|| self.tensor.index_axis(Axis(0), index))
    }

    pub fn windows(&self) -> impl Iterator<Item = ArrayView2<'_, f64>> {
        self.tensor.axis_iter(Axis(0))
    }

    pub fn tensor(&self) -> &Array3<f64> {
        &self.tensor
    }

    /// Start sample of each window
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Start time of each window in seconds
    pub fn offsets_secs(&self) -> Vec<f64> {
        self.offsets
            .iter()
            .map(|&o| o as f64 / self.sample_rate.max(1) as f64)
            .collect()
    }

    pub fn to_tensor_f32(&self) -> Array3<f32> {
        self.tensor.mapv(|v| v as f32)
    }
}

/// Per-recording aggregate of classifier outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub window_probabilities: Vec<f64>,
    pub mean_probability: f64,
    pub max_probability: f64,
    pub seizure_detected: bool,
}

impl PredictionResult {
    pub fn into_response(self, recording_identifier: impl Into<String>) -> PredictionResponse {
        PredictionResponse {
            recording_identifier: recording_identifier.into(),
            seizure_detected: self.seizure_detected,
            average_probability: self.mean_probability,
            max_probability: self.max_probability,
        }
    }
}

/// Success payload served for one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub recording_identifier: String,
    pub seizure_detected: bool,
    pub average_probability: f64,
    pub max_probability: f64,
}
