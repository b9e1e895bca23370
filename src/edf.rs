// EDF (European Data Format) reader
// Specification: https://www.edfplus.info/specs/edf.html

use crate::error::{Result, SeizureError};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Label EDF+ uses for its annotation pseudo-signal
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

const FIXED_HEADER_BYTES: usize = 256;
const SIGNAL_HEADER_BYTES: usize = 256;

#[derive(Debug, Clone)]
pub struct EdfHeader {
    pub version: String,              // 8 bytes: version of this data format (0)
    pub patient_id: String,           // 80 bytes: local patient identification
    pub recording_id: String,         // 80 bytes: local recording identification
    pub start_date: String,           // 8 bytes: startdate of recording (dd.mm.yy)
    pub start_time: String,           // 8 bytes: starttime of recording (hh.mm.ss)
    pub header_bytes: usize,          // 8 bytes: number of bytes in header record
    pub reserved: String,             // 44 bytes: "EDF+C" / "EDF+D" for EDF+
    pub num_data_records: i64,        // 8 bytes: number of data records (-1 if unknown)
    pub duration_of_data_record: f64, // 8 bytes: duration of a data record, in seconds
    pub num_signals: usize,           // 4 bytes: number of signals (channels)
}

#[derive(Debug, Clone)]
pub struct EdfSignalHeader {
    pub label: String,                 // 16 bytes: label (e.g. EEG FP1-F7)
    pub transducer_type: String,       // 80 bytes
    pub physical_dimension: String,    // 8 bytes: e.g. uV
    pub physical_minimum: f64,         // 8 bytes
    pub physical_maximum: f64,         // 8 bytes
    pub digital_minimum: i64,          // 8 bytes
    pub digital_maximum: i64,          // 8 bytes
    pub prefiltering: String,          // 80 bytes
    pub num_samples_per_record: usize, // 8 bytes
}

impl EdfSignalHeader {
    pub fn sample_frequency(&self, record_duration: f64) -> f64 {
        self.num_samples_per_record as f64 / record_duration
    }

    pub fn gain(&self) -> f64 {
        (self.physical_maximum - self.physical_minimum)
            / (self.digital_maximum - self.digital_minimum) as f64
    }

    pub fn offset(&self) -> f64 {
        self.physical_maximum - self.gain() * self.digital_maximum as f64
    }

    pub fn is_annotation(&self) -> bool {
        self.label == ANNOTATION_LABEL
    }
}

/// Streaming EDF reader over any seekable byte source
pub struct EdfReader<R> {
    source: R,
    pub header: EdfHeader,
    pub signal_headers: Vec<EdfSignalHeader>,
    num_records: usize,
}

impl EdfReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> EdfReader<R> {
    pub fn from_reader(mut source: R) -> Result<Self> {
        let header = read_header(&mut source)?;
        let signal_headers = read_signal_headers(&mut source, header.num_signals)?;

        let expected_header_bytes = FIXED_HEADER_BYTES + header.num_signals * SIGNAL_HEADER_BYTES;
        if header.header_bytes != expected_header_bytes {
            return Err(SeizureError::Format(format!(
                "Header declares {} bytes but {} signals need {}",
                header.header_bytes, header.num_signals, expected_header_bytes
            )));
        }

        let record_bytes = record_size_bytes(&signal_headers).ok_or_else(|| {
            SeizureError::Format("Data record size overflows".to_string())
        })?;
        let file_len = source.seek(SeekFrom::End(0))?;
        let data_len = file_len.saturating_sub(header.header_bytes as u64);

        let num_records = if record_bytes == 0 {
            0
        } else if header.num_data_records >= 0 {
            let declared = header.num_data_records as u64;
            let needed = declared.checked_mul(record_bytes as u64);
            if needed.map_or(true, |needed| needed > data_len) {
                return Err(SeizureError::Format(format!(
                    "Header declares {} data records of {} bytes but only {} data bytes follow",
                    declared, record_bytes, data_len
                )));
            }
            declared as usize
        } else {
            // Unknown record count: derive it from the data section length
            (data_len / record_bytes as u64) as usize
        };

        log::debug!(
            "EDF header parsed: num_data_records={}, duration_of_data_record={}, num_signals={}",
            num_records,
            header.duration_of_data_record,
            header.num_signals
        );

        Ok(Self {
            source,
            header,
            signal_headers,
            num_records,
        })
    }

    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// Indices of real data signals, in source order
    pub fn data_signal_indices(&self) -> Vec<usize> {
        self.signal_headers
            .iter()
            .enumerate()
            .filter(|(_, sh)| !sh.is_annotation())
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn total_duration(&self) -> f64 {
        self.num_records as f64 * self.header.duration_of_data_record
    }

    /// Read the selected signals in full, converted to physical units
    pub fn read_physical_signals(&mut self, indices: &[usize]) -> Result<Vec<Vec<f64>>> {
        for &idx in indices {
            if idx >= self.signal_headers.len() {
                return Err(SeizureError::Format(format!(
                    "Signal index {} out of bounds ({} signals)",
                    idx,
                    self.signal_headers.len()
                )));
            }
            let sh = &self.signal_headers[idx];
            if sh.digital_maximum <= sh.digital_minimum {
                return Err(SeizureError::Format(format!(
                    "Signal '{}' has an empty digital range [{}, {}]",
                    sh.label, sh.digital_minimum, sh.digital_maximum
                )));
            }
        }

        if self.num_records == 0 {
            return Ok(vec![Vec::new(); indices.len()]);
        }

        // Byte offset of each signal inside one data record
        let mut signal_offsets = Vec::with_capacity(self.signal_headers.len());
        let mut running = 0usize;
        for sh in &self.signal_headers {
            signal_offsets.push(running);
            running += sh.num_samples_per_record * 2;
        }
        let record_bytes = running;

        let mut output: Vec<Vec<f64>> = indices
            .iter()
            .map(|&idx| {
                Vec::with_capacity(self.num_records * self.signal_headers[idx].num_samples_per_record)
            })
            .collect();

        self.source
            .seek(SeekFrom::Start(self.header.header_bytes as u64))?;

        let mut record = vec![0u8; record_bytes];
        for record_idx in 0..self.num_records {
            self.source.read_exact(&mut record).map_err(|e| {
                if e.kind() == io::ErrorKind::UnexpectedEof {
                    SeizureError::Format(format!(
                        "Data record {} of {} is truncated",
                        record_idx, self.num_records
                    ))
                } else {
                    SeizureError::Read(e)
                }
            })?;

            for (out, &idx) in output.iter_mut().zip(indices) {
                let sh = &self.signal_headers[idx];
                let gain = sh.gain();
                let offset = sh.offset();
                let start = signal_offsets[idx];
                let end = start + sh.num_samples_per_record * 2;
                out.extend(
                    record[start..end]
                        .chunks_exact(2)
                        .map(|b| gain * i16::from_le_bytes([b[0], b[1]]) as f64 + offset),
                );
            }
        }

        Ok(output)
    }

}

fn record_size_bytes(signal_headers: &[EdfSignalHeader]) -> Option<usize> {
    signal_headers.iter().try_fold(0usize, |total, sh| {
        sh.num_samples_per_record
            .checked_mul(2)
            .and_then(|bytes| total.checked_add(bytes))
    })
}

fn header_io_error(e: io::Error) -> SeizureError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        SeizureError::Format("File ends inside the EDF header".to_string())
    } else {
        SeizureError::Read(e)
    }
}

fn read_fixed_string<R: Read>(reader: &mut R, size: usize) -> Result<String> {
    let mut buffer = vec![0u8; size];
    reader.read_exact(&mut buffer).map_err(header_io_error)?;
    Ok(String::from_utf8_lossy(&buffer).trim().to_string())
}

fn read_field<R: Read, T: std::str::FromStr>(reader: &mut R, size: usize, name: &str) -> Result<T> {
    let s = read_fixed_string(reader, size)?;
    s.parse::<T>()
        .map_err(|_| SeizureError::Format(format!("Invalid {} '{}'", name, s)))
}

fn read_header<R: Read>(reader: &mut R) -> Result<EdfHeader> {
    let version = read_fixed_string(reader, 8)?;
    let patient_id = read_fixed_string(reader, 80)?;
    let recording_id = read_fixed_string(reader, 80)?;
    let start_date = read_fixed_string(reader, 8)?;
    let start_time = read_fixed_string(reader, 8)?;
    let header_bytes: usize = read_field(reader, 8, "header bytes")?;
    let reserved = read_fixed_string(reader, 44)?;
    let num_data_records: i64 = read_field(reader, 8, "number of data records")?;
    let duration_of_data_record: f64 = read_field(reader, 8, "record duration")?;
    let num_signals: usize = read_field(reader, 4, "number of signals")?;

    if num_signals == 0 {
        return Err(SeizureError::Format("EDF file declares no signals".to_string()));
    }
    if !duration_of_data_record.is_finite() || duration_of_data_record <= 0.0 {
        return Err(SeizureError::Format(format!(
            "Invalid record duration {}",
            duration_of_data_record
        )));
    }
    if num_data_records < -1 {
        return Err(SeizureError::Format(format!(
            "Invalid number of data records {}",
            num_data_records
        )));
    }

    Ok(EdfHeader {
        version,
        patient_id,
        recording_id,
        start_date,
        start_time,
        header_bytes,
        reserved,
        num_data_records,
        duration_of_data_record,
        num_signals,
    })
}

fn read_signal_headers<R: Read>(reader: &mut R, num_signals: usize) -> Result<Vec<EdfSignalHeader>> {
    // Fields are stored column-wise: every signal's label, then every transducer, ...
    let mut column = |size: usize| -> Result<Vec<String>> {
        (0..num_signals)
            .map(|_| read_fixed_string(reader, size))
            .collect()
    };

    let labels = column(16)?;
    let transducer_types = column(80)?;
    let physical_dimensions = column(8)?;
    let physical_minimums = column(8)?;
    let physical_maximums = column(8)?;
    let digital_minimums = column(8)?;
    let digital_maximums = column(8)?;
    let prefilterings = column(80)?;
    let samples_per_record = column(8)?;
    let _reserved = column(32)?;

    fn parse<T: std::str::FromStr>(s: &str, name: &str, label: &str) -> Result<T> {
        s.parse::<T>().map_err(|_| {
            SeizureError::Format(format!("Invalid {} '{}' for signal '{}'", name, s, label))
        })
    }

    let mut signal_headers = Vec::with_capacity(num_signals);
    for i in 0..num_signals {
        let label = &labels[i];
        signal_headers.push(EdfSignalHeader {
            label: label.clone(),
            transducer_type: transducer_types[i].clone(),
            physical_dimension: physical_dimensions[i].clone(),
            physical_minimum: parse(&physical_minimums[i], "physical minimum", label)?,
            physical_maximum: parse(&physical_maximums[i], "physical maximum", label)?,
            digital_minimum: parse(&digital_minimums[i], "digital minimum", label)?,
            digital_maximum: parse(&digital_maximums[i], "digital maximum", label)?,
            prefiltering: prefilterings[i].clone(),
            num_samples_per_record: parse(&samples_per_record[i], "number of samples", label)?,
        });
    }

    Ok(signal_headers)
}
