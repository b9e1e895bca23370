//! Signal loader
//!
//! Opens an EDF/EDF+ container, selects at most `max_channels` data signals in
//! source order and returns a [`Recording`] with exactly `max_channels` rows.

use crate::edf::EdfReader;
use crate::error::{Result, SeizureError};
use crate::types::Recording;
use std::io::{Read, Seek};
use std::path::Path;

/// Load a recording from an EDF file on disk
///
/// The file handle is dropped before this returns.
pub fn load_recording<P: AsRef<Path>>(path: P, max_channels: usize) -> Result<Recording> {
    let path = path.as_ref();
    log::debug!("Loading recording from {}", path.display());
    let reader = EdfReader::open(path)?;
    extract(reader, max_channels)
}

/// Load a recording from any seekable EDF byte stream
pub fn load_recording_from_reader<R: Read + Seek>(source: R, max_channels: usize) -> Result<Recording> {
    let reader = EdfReader::from_reader(source)?;
    extract(reader, max_channels)
}

fn extract<R: Read + Seek>(mut reader: EdfReader<R>, max_channels: usize) -> Result<Recording> {
    let mut selected = reader.data_signal_indices();
    if selected.is_empty() {
        return Err(SeizureError::Format(
            "Recording contains no data signals".to_string(),
        ));
    }
    let available = selected.len();
    selected.truncate(max_channels);

    let record_duration = reader.header.duration_of_data_record;
    let first = &reader.signal_headers[selected[0]];
    let samples_per_record = first.num_samples_per_record;
    let sample_frequency = first.sample_frequency(record_duration);

    if let Some(&mismatch) = selected
        .iter()
        .find(|&&idx| reader.signal_headers[idx].num_samples_per_record != samples_per_record)
    {
        let sh = &reader.signal_headers[mismatch];
        return Err(SeizureError::Format(format!(
            "Signal '{}' is sampled at {} Hz but '{}' at {} Hz; mixed rates are not supported",
            sh.label,
            sh.sample_frequency(record_duration),
            first.label,
            sample_frequency
        )));
    }

    // Integer Hz, truncated
    let sample_rate = sample_frequency as u32;
    if sample_rate == 0 {
        return Err(SeizureError::Format(format!(
            "Sampling rate {} Hz is below 1 Hz",
            sample_frequency
        )));
    }

    let labels: Vec<String> = selected
        .iter()
        .map(|&idx| reader.signal_headers[idx].label.clone())
        .collect();
    let channels = reader.read_physical_signals(&selected)?;
    drop(reader);

    if available < max_channels {
        log::debug!(
            "Recording has {} data channels, zero-padding to {}",
            available,
            max_channels
        );
    } else if available > max_channels {
        log::debug!(
            "Recording has {} data channels, using the first {}",
            available,
            max_channels
        );
    }

    let recording = Recording::from_channels(channels, labels, sample_rate, max_channels);
    log::info!(
        "Loaded recording: {} source channels, {} samples at {} Hz ({:.1} s)",
        recording.source_channels(),
        recording.num_samples(),
        recording.sample_rate,
        recording.duration_secs()
    );
    Ok(recording)
}
