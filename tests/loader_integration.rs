mod common;

use common::{init_test_logging, write_edf, write_edf_records, FixtureSignal};
use seizure_rs::{load_recording, load_recording_from_reader, SeizureError};
use std::f64::consts::PI;
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

fn ramp(n: usize, scale: f64) -> Vec<f64> {
    (0..n).map(|i| scale * ((i % 200) as f64 - 100.0)).collect()
}

#[test]
fn test_round_trip_labels_rate_and_values() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roundtrip.edf");

    let fp1: Vec<f64> = (0..1280)
        .map(|i| 100.0 * (2.0 * PI * 5.0 * i as f64 / 256.0).sin())
        .collect();
    let fp2 = ramp(1280, 2.5);
    write_edf(
        &path,
        &[
            FixtureSignal::eeg("FP1-F7", fp1.clone()),
            FixtureSignal::eeg("FP2-F8", fp2.clone()),
        ],
        256,
    );

    let recording = load_recording(&path, 18).unwrap();
    assert_eq!(recording.sample_rate, 256);
    assert_eq!(recording.channel_labels, vec!["FP1-F7", "FP2-F8"]);
    assert_eq!(recording.source_channels(), 2);
    assert_eq!(recording.num_channels(), 18);
    assert_eq!(recording.num_samples(), 1280);
    assert!((recording.duration_secs() - 5.0).abs() < 1e-12);

    // one digital step of a ±1000 uV range
    let resolution = 2000.0 / 65535.0;
    for (expected, row) in [fp1, fp2].iter().zip(recording.data.rows()) {
        for (a, b) in expected.iter().zip(row.iter()) {
            assert!((a - b).abs() <= resolution, "{} vs {}", a, b);
        }
    }
    assert!(recording.data.row(2).iter().all(|&v| v == 0.0));
}

#[test]
fn test_extra_channels_are_truncated_in_source_order() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wide.edf");

    let signals: Vec<FixtureSignal> = (0..23)
        .map(|c| FixtureSignal::eeg(&format!("C{:02}", c), vec![c as f64; 512]))
        .collect();
    write_edf(&path, &signals, 256);

    let recording = load_recording(&path, 18).unwrap();
    assert_eq!(recording.num_channels(), 18);
    assert_eq!(recording.source_channels(), 18);
    assert_eq!(recording.channel_labels.last().map(String::as_str), Some("C17"));
    assert!((recording.data[[17, 0]] - 17.0).abs() < 0.05);
}

#[test]
fn test_annotation_channel_is_skipped() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("annotated.edf");

    write_edf(
        &path,
        &[
            FixtureSignal::eeg("EDF Annotations", vec![0.0; 512]),
            FixtureSignal::eeg("T7-P7", vec![42.0; 512]),
        ],
        256,
    );

    let recording = load_recording(&path, 18).unwrap();
    assert_eq!(recording.channel_labels, vec!["T7-P7"]);
    assert!((recording.data[[0, 10]] - 42.0).abs() < 0.05);
}

#[test]
fn test_non_edf_file_is_a_format_error() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.edf");
    fs::write(&path, b"this is not an EDF recording").unwrap();

    let err = load_recording(&path, 18).unwrap_err();
    assert!(matches!(err, SeizureError::Format(_)));
}

#[test]
fn test_truncated_data_is_a_format_error() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truncated.edf");
    write_edf(&path, &[FixtureSignal::eeg("O1", vec![1.0; 256 * 4])], 256);

    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 100]).unwrap();

    let err = load_recording(&path, 18).unwrap_err();
    assert!(matches!(err, SeizureError::Format(_)));
}

#[test]
fn test_oversized_header_counts_are_format_errors() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.edf");
    write_edf(&path, &[FixtureSignal::eeg("O2", vec![5.0; 256])], 256);
    let pristine = fs::read(&path).unwrap();

    // number of data records lives at byte 236, samples per record of the
    // only signal at 256 + 216
    for field_offset in [236usize, 256 + 216] {
        let mut bytes = pristine.clone();
        bytes[field_offset..field_offset + 8].copy_from_slice(b"99999999");
        let err = load_recording_from_reader(Cursor::new(bytes), 18).unwrap_err();
        assert!(matches!(err, SeizureError::Format(_)), "offset {}", field_offset);
    }
}

#[test]
fn test_mixed_rates_are_a_format_error() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed.edf");

    write_edf(
        &path,
        &[
            FixtureSignal::eeg("F3-C3", vec![1.0; 512]),
            FixtureSignal::eeg("ECG", vec![1.0; 256]).with_samples_per_record(128),
        ],
        256,
    );

    let err = load_recording(&path, 18).unwrap_err();
    assert!(matches!(err, SeizureError::Format(ref msg) if msg.contains("mixed rates")));
}

#[test]
fn test_mixed_rates_outside_selection_are_ignored() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mixed_tail.edf");

    write_edf(
        &path,
        &[
            FixtureSignal::eeg("F3-C3", vec![1.0; 512]),
            FixtureSignal::eeg("ECG", vec![1.0; 256]).with_samples_per_record(128),
        ],
        256,
    );

    let recording = load_recording(&path, 1).unwrap();
    assert_eq!(recording.sample_rate, 256);
    assert_eq!(recording.num_samples(), 512);
}

#[test]
fn test_rate_below_one_hz_is_a_format_error() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("slow.edf");

    // 2 samples per 4-second record is 0.5 Hz
    write_edf_records(&path, &[FixtureSignal::eeg("Pz", vec![3.0; 8])], 2, 4.0);

    let err = load_recording(&path, 18).unwrap_err();
    assert!(matches!(err, SeizureError::Format(ref msg) if msg.contains("below 1 Hz")));
}
