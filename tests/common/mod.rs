#![allow(dead_code)]

use ndarray::{ArrayView3, Axis};
use seizure_rs::Classifier;
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One signal to write into a fixture EDF
pub struct FixtureSignal {
    pub label: String,
    pub samples: Vec<f64>,
    pub physical_minimum: f64,
    pub physical_maximum: f64,
    /// Overrides the file-wide samples per record
    pub samples_per_record: Option<usize>,
}

impl FixtureSignal {
    pub fn eeg(label: &str, samples: Vec<f64>) -> Self {
        Self {
            label: label.to_string(),
            samples,
            physical_minimum: -1000.0,
            physical_maximum: 1000.0,
            samples_per_record: None,
        }
    }

    pub fn with_samples_per_record(mut self, samples_per_record: usize) -> Self {
        self.samples_per_record = Some(samples_per_record);
        self
    }
}

fn write_fixed_string<W: Write>(w: &mut W, s: &str, size: usize) {
    let mut buffer = vec![b' '; size];
    let bytes = s.as_bytes();
    let copy_len = bytes.len().min(size);
    buffer[..copy_len].copy_from_slice(&bytes[..copy_len]);
    w.write_all(&buffer).unwrap();
}

/// Write an EDF with 1-second data records; every signal has `sample_rate`
/// samples per record. Trailing samples that do not fill a record are dropped.
pub fn write_edf(path: &Path, signals: &[FixtureSignal], sample_rate: usize) {
    write_edf_records(path, signals, sample_rate, 1.0);
}

/// Write an EDF with `record_duration`-second data records
pub fn write_edf_records(
    path: &Path,
    signals: &[FixtureSignal],
    samples_per_record: usize,
    record_duration: f64,
) {
    let num_signals = signals.len();
    let per_record =
        |s: &FixtureSignal| s.samples_per_record.unwrap_or(samples_per_record);
    let num_records = signals
        .iter()
        .map(|s| s.samples.len() / per_record(s))
        .min()
        .unwrap_or(0);
    let (digital_min, digital_max) = (-32768i64, 32767i64);

    let mut w = BufWriter::new(File::create(path).unwrap());
    write_fixed_string(&mut w, "0", 8);
    write_fixed_string(&mut w, "X X X X", 80);
    write_fixed_string(&mut w, "Startdate 01-JAN-2024 X X X", 80);
    write_fixed_string(&mut w, "01.01.24", 8);
    write_fixed_string(&mut w, "12.00.00", 8);
    write_fixed_string(&mut w, &(256 + num_signals * 256).to_string(), 8);
    write_fixed_string(&mut w, "", 44);
    write_fixed_string(&mut w, &num_records.to_string(), 8);
    write_fixed_string(&mut w, &record_duration.to_string(), 8);
    write_fixed_string(&mut w, &num_signals.to_string(), 4);

    for s in signals {
        write_fixed_string(&mut w, &s.label, 16);
    }
    for _ in signals {
        write_fixed_string(&mut w, "AgAgCl electrode", 80);
    }
    for _ in signals {
        write_fixed_string(&mut w, "uV", 8);
    }
    for s in signals {
        write_fixed_string(&mut w, &s.physical_minimum.to_string(), 8);
    }
    for s in signals {
        write_fixed_string(&mut w, &s.physical_maximum.to_string(), 8);
    }
    for _ in signals {
        write_fixed_string(&mut w, &digital_min.to_string(), 8);
    }
    for _ in signals {
        write_fixed_string(&mut w, &digital_max.to_string(), 8);
    }
    for _ in signals {
        write_fixed_string(&mut w, "", 80);
    }
    for s in signals {
        write_fixed_string(&mut w, &per_record(s).to_string(), 8);
    }
    for _ in signals {
        write_fixed_string(&mut w, "", 32);
    }

    for record in 0..num_records {
        for s in signals {
            let gain = (s.physical_maximum - s.physical_minimum) / (digital_max - digital_min) as f64;
            let offset = s.physical_maximum - gain * digital_max as f64;
            let n = per_record(s);
            let start = record * n;
            for &physical in &s.samples[start..start + n] {
                let digital = ((physical - offset) / gain)
                    .round()
                    .clamp(digital_min as f64, digital_max as f64) as i16;
                w.write_all(&digital.to_le_bytes()).unwrap();
            }
        }
    }
    w.flush().unwrap();
}

/// EEG-like test signal: alpha rhythm, slow drift and 60 Hz mains
pub fn eeg_like(channel: usize, seconds: usize, sample_rate: usize) -> Vec<f64> {
    let n = seconds * sample_rate;
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            let alpha = 30.0 * (2.0 * PI * (8.0 + channel as f64 * 0.25) * t).sin();
            let drift = 80.0 * (2.0 * PI * 0.05 * t).sin();
            let mains = 20.0 * (2.0 * PI * 60.0 * t).sin();
            alpha + drift + mains
        })
        .collect()
}

pub fn write_eeg_fixture(path: &Path, channels: usize, seconds: usize, sample_rate: usize) {
    let signals: Vec<FixtureSignal> = (0..channels)
        .map(|c| FixtureSignal::eeg(&format!("EEG Ch{}", c), eeg_like(c, seconds, sample_rate)))
        .collect();
    write_edf(path, &signals, sample_rate);
}

/// Same probability for every window
pub struct ConstantClassifier {
    pub probability: f64,
    pub time_steps: usize,
}

impl Classifier for ConstantClassifier {
    fn input_shape(&self) -> (usize, usize) {
        (self.time_steps, 18)
    }

    fn score(&self, batch: ArrayView3<'_, f64>) -> anyhow::Result<Vec<f64>> {
        Ok(vec![self.probability; batch.len_of(Axis(0))])
    }
}

/// Deterministic score from window content: mean absolute amplitude / 5
pub struct AmplitudeClassifier;

impl Classifier for AmplitudeClassifier {
    fn input_shape(&self) -> (usize, usize) {
        (1024, 18)
    }

    fn score(&self, batch: ArrayView3<'_, f64>) -> anyhow::Result<Vec<f64>> {
        Ok(batch
            .axis_iter(Axis(0))
            .map(|w| (w.mapv(f64::abs).mean().unwrap_or(0.0) / 5.0).min(1.0))
            .collect())
    }
}

pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn input_shape(&self) -> (usize, usize) {
        (1024, 18)
    }

    fn score(&self, _batch: ArrayView3<'_, f64>) -> anyhow::Result<Vec<f64>> {
        anyhow::bail!("accelerator out of memory")
    }
}
