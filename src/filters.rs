//! Digital Filter Implementations
//!
//! IIR filters built from second-order sections (biquads) for numerical stability:
//! a Butterworth bandpass (analog prototype, band transform, bilinear transform)
//! and a second-order notch. Both are applied forward then backward so the
//! conditioned signal carries no phase delay.

use crate::config::PipelineConfig;
use crate::error::{Result, SeizureError};
use crate::types::Recording;
use ndarray::Array2;
use num_complex::Complex64;
use rayon::prelude::*;
use std::f64::consts::PI;

/// Fraction of Nyquist the bandpass high cutoff is clamped to
const MAX_HIGH_CUTOFF_RATIO: f64 = 0.99;

/// Second-order section (biquad) coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Gain at DC (z = 1)
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Delay-line state a unit step settles to
    fn step_state(&self) -> (f64, f64) {
        let y = self.dc_gain();
        let z2 = self.b2 - self.a2 * y;
        let z1 = self.b1 - self.a1 * y + z2;
        (z1, z2)
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let num = self.b0 + z_inv * (self.b1 + z_inv * self.b2);
        let den = 1.0 + z_inv * (self.a1 + z_inv * self.a2);
        num / den
    }
}

/// State for a single biquad section (Direct Form II Transposed)
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f64,
    z2: f64,
}

/// Single biquad filter section
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    /// Process a single sample using Direct Form II Transposed
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }
}

/// Cascaded second-order sections filter
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadFilter>,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>) -> Self {
        Self {
            sections: sections.into_iter().map(BiquadFilter::new).collect(),
        }
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn coefficients(&self) -> Vec<BiquadCoeffs> {
        self.sections.iter().map(|s| s.coeffs).collect()
    }

    /// Process a single sample through all sections
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        self.sections
            .iter_mut()
            .fold(input, |acc, section| section.process(acc))
    }

    /// Process an entire signal array in-place
    pub fn process_signal(&mut self, signal: &mut [f64]) {
        for sample in signal.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Put every section in the state a constant input of `level` settles to
    fn settle_at(&mut self, level: f64) {
        let mut scale = level;
        for section in &mut self.sections {
            let (z1, z2) = section.coeffs.step_state();
            section.state = BiquadState {
                z1: z1 * scale,
                z2: z2 * scale,
            };
            scale *= section.coeffs.dc_gain();
        }
    }

    /// Edge extension applied on each side before zero-phase filtering
    pub fn pad_length(&self, signal_len: usize) -> usize {
        (3 * (2 * self.sections.len() + 1)).min(signal_len.saturating_sub(1))
    }

    /// Zero-phase filtering: forward pass, then a pass over the reversed output
    ///
    /// The signal is extended at both ends by odd reflection about its end
    /// samples and each pass starts from steady state, so edges do not ring.
    /// The filter's own state is left untouched.
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = self.pad_length(n);

        let first = signal[0];
        let last = signal[n - 1];
        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        let mut filter = self.clone();
        filter.settle_at(extended[0]);
        filter.process_signal(&mut extended);

        extended.reverse();
        filter.settle_at(extended[0]);
        filter.process_signal(&mut extended);
        extended.reverse();

        extended[pad..pad + n].to_vec()
    }

    /// Magnitude response at `frequency` Hz
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        let omega = 2.0 * PI * frequency / sample_rate;
        let z_inv = Complex64::from_polar(1.0, -omega);
        self.sections
            .iter()
            .map(|s| s.coeffs.response(z_inv))
            .fold(Complex64::new(1.0, 0.0), |acc, h| acc * h)
            .norm()
    }
}

/// Butterworth filter designer
pub struct ButterworthFilter;

impl ButterworthFilter {
    /// Design a Butterworth bandpass from an `order`-pole lowpass prototype
    ///
    /// The result has `2 * order` poles arranged as `order` biquads. Cutoffs are
    /// in Hz; the gain at both cutoffs is 1/√2.
    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> Result<SosFilter> {
        let nyquist = sample_rate / 2.0;
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(SeizureError::FilterDesign(format!(
                "Sampling rate must be positive, got {} Hz",
                sample_rate
            )));
        }
        if order == 0 {
            return Err(SeizureError::FilterDesign(
                "Butterworth order must be at least 1".to_string(),
            ));
        }
        if low <= 0.0 || low >= high {
            return Err(SeizureError::FilterDesign(format!(
                "Low cutoff ({} Hz) must be positive and below high cutoff ({} Hz)",
                low, high
            )));
        }
        if high >= nyquist {
            return Err(SeizureError::FilterDesign(format!(
                "High cutoff ({} Hz) must be less than Nyquist ({} Hz)",
                high, nyquist
            )));
        }

        // Bilinear transform with fs = 2, i.e. frequencies normalized to Nyquist
        let fs2 = 4.0;
        let w_low = Self::prewarp(low / nyquist);
        let w_high = Self::prewarp(high / nyquist);
        let bandwidth = w_high - w_low;
        let center = (w_low * w_high).sqrt();

        // Analog lowpass prototype poles on the left half of the unit circle
        let prototype = (0..order).map(|k| {
            let m = 2.0 * k as f64 + 1.0 - order as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * order as f64))
        });

        // Lowpass -> bandpass: each prototype pole splits into two
        let mut analog_poles = Vec::with_capacity(2 * order);
        for p in prototype {
            let scaled = p * bandwidth / 2.0;
            let disc = (scaled * scaled - center * center).sqrt();
            analog_poles.push(scaled + disc);
            analog_poles.push(scaled - disc);
        }

        // `order` analog zeros at s = 0 map to z = 1, the remaining `order` to z = -1
        let denominator = analog_poles
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
        let gain = (bandwidth * fs2).powi(order as i32) / denominator;
        let gain = gain.re;

        let digital_poles: Vec<Complex64> = analog_poles
            .iter()
            .map(|&p| (fs2 + p) / (fs2 - p))
            .collect();

        let mut sections = Self::pair_poles(&digital_poles)
            .into_iter()
            .map(|(a1, a2)| BiquadCoeffs {
                b0: 1.0,
                b1: 0.0,
                b2: -1.0,
                a1,
                a2,
            })
            .collect::<Vec<_>>();

        if let Some(first) = sections.first_mut() {
            first.b0 *= gain;
            first.b2 *= gain;
        }

        Ok(SosFilter::new(sections))
    }

    /// Prewarp a Nyquist-normalized frequency for the bilinear transform
    fn prewarp(normalized: f64) -> f64 {
        4.0 * (PI * normalized / 2.0).tan()
    }

    /// Group poles into (a1, a2) denominators: conjugate pairs first, then
    /// leftover real poles two at a time.
    fn pair_poles(poles: &[Complex64]) -> Vec<(f64, f64)> {
        const IMAG_TOLERANCE: f64 = 1e-12;
        let mut denominators = Vec::new();
        let mut real_poles = Vec::new();

        for p in poles {
            if p.im > IMAG_TOLERANCE {
                denominators.push((-2.0 * p.re, p.norm_sqr()));
            } else if p.im.abs() <= IMAG_TOLERANCE {
                real_poles.push(p.re);
            }
        }

        for pair in real_poles.chunks(2) {
            match pair {
                [r1, r2] => denominators.push((-(r1 + r2), r1 * r2)),
                [r] => denominators.push((-r, 0.0)),
                _ => {}
            }
        }

        denominators
    }
}

/// Notch (band-reject) filter for removing mains interference
pub struct NotchFilter;

impl NotchFilter {
    /// Design a second-order notch
    ///
    /// # Arguments
    /// * `center_freq` - Frequency to remove (Hz)
    /// * `sample_rate` - Sampling rate (Hz)
    /// * `q_factor` - Quality factor (center / -3 dB bandwidth)
    pub fn design(center_freq: f64, sample_rate: f64, q_factor: f64) -> Result<SosFilter> {
        let nyquist = sample_rate / 2.0;
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(SeizureError::FilterDesign(format!(
                "Sampling rate must be positive, got {} Hz",
                sample_rate
            )));
        }
        if center_freq <= 0.0 || center_freq >= nyquist {
            return Err(SeizureError::FilterDesign(format!(
                "Notch frequency ({} Hz) must be between 0 and Nyquist ({} Hz)",
                center_freq, nyquist
            )));
        }
        if !(q_factor > 0.0) {
            return Err(SeizureError::FilterDesign(format!(
                "Notch quality factor must be positive, got {}",
                q_factor
            )));
        }

        let w0 = PI * center_freq / nyquist;
        let bandwidth = w0 / q_factor;
        let beta = (bandwidth / 2.0).tan();
        let gain = 1.0 / (1.0 + beta);
        let cos_w0 = w0.cos();

        let coeffs = BiquadCoeffs {
            b0: gain,
            b1: -2.0 * gain * cos_w0,
            b2: gain,
            a1: -2.0 * gain * cos_w0,
            a2: 2.0 * gain - 1.0,
        };

        Ok(SosFilter::new(vec![coeffs]))
    }
}

/// Bandpass + notch pair designed for one sampling rate
#[derive(Debug, Clone)]
pub struct FilterBank {
    bandpass: SosFilter,
    notch: SosFilter,
    sample_rate: u32,
}

impl FilterBank {
    /// Design both filters for `sample_rate`, clamping the high cutoff to
    /// 0.99 × Nyquist.
    pub fn design(config: &PipelineConfig, sample_rate: u32) -> Result<Self> {
        let fs = sample_rate as f64;
        let high = config
            .bandpass_high
            .min(MAX_HIGH_CUTOFF_RATIO * fs / 2.0);

        let bandpass = ButterworthFilter::bandpass(config.bandpass_low, high, fs, config.filter_order)?;
        let notch = NotchFilter::design(config.notch_frequency, fs, config.notch_q)?;

        log::debug!(
            "Designed filters at {} Hz: bandpass {}-{} Hz ({} sections), notch {} Hz Q={}",
            sample_rate,
            config.bandpass_low,
            high,
            bandpass.num_sections(),
            config.notch_frequency,
            config.notch_q
        );

        Ok(Self {
            bandpass,
            notch,
            sample_rate,
        })
    }

    pub fn bandpass(&self) -> &SosFilter {
        &self.bandpass
    }

    pub fn notch(&self) -> &SosFilter {
        &self.notch
    }

    /// Zero-phase bandpass then zero-phase notch on one channel
    pub fn apply_channel(&self, channel: &[f64]) -> Vec<f64> {
        let band_limited = self.bandpass.filtfilt(channel);
        self.notch.filtfilt(&band_limited)
    }

    /// Filter every channel of a recording; channels run in parallel
    pub fn apply(&self, recording: &Recording) -> Result<Array2<f64>> {
        if recording.sample_rate != self.sample_rate {
            return Err(SeizureError::Internal(format!(
                "Filters designed for {} Hz applied to a {} Hz recording",
                self.sample_rate, recording.sample_rate
            )));
        }

        let data = &recording.data;
        let (num_channels, num_samples) = data.dim();

        let filtered: Vec<Vec<f64>> = (0..num_channels)
            .into_par_iter()
            .map(|ch| self.apply_channel(&data.row(ch).to_vec()))
            .collect();

        if let Some(ch) = filtered
            .iter()
            .position(|row| row.iter().any(|v| !v.is_finite()))
        {
            return Err(SeizureError::Internal(format!(
                "Filtering produced non-finite samples in channel {}",
                ch
            )));
        }

        Array2::from_shape_vec((num_channels, num_samples), filtered.concat())
            .map_err(|e| SeizureError::Internal(format!("Filtered signal has wrong shape: {}", e)))
    }
}
