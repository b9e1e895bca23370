//! Per-channel z-score normalization and artifact clipping

use ndarray::{Array2, Axis};

/// Instance normalization: each channel minus its mean, divided by its
/// population standard deviation plus `epsilon`.
///
/// Constant channels (zero padding included) come out as all zeros.
pub fn normalize(mut data: Array2<f64>, epsilon: f64) -> Array2<f64> {
    for mut channel in data.axis_iter_mut(Axis(0)) {
        let n = channel.len();
        if n == 0 {
            continue;
        }
        let mean = channel.sum() / n as f64;
        let variance = channel.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let scale = variance.sqrt() + epsilon;
        channel.mapv_inplace(|v| (v - mean) / scale);
    }
    data
}

/// Clamp every sample to `[-threshold, threshold]`
pub fn clip(mut data: Array2<f64>, threshold: f64) -> Array2<f64> {
    data.mapv_inplace(|v| v.clamp(-threshold, threshold));
    data
}
