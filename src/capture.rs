//! Capture files: acquisition configuration plus sampled channels.
//!
//! Post-processing does not talk to acquisition hardware; it reads the files the
//! acquisition run left behind. Loading sits behind the [`CaptureLoader`] trait
//! so the pipeline can be driven by any on-disk format (or by in-memory
//! captures in tests).
//!
//! # Text capture format
//!
//! [`CsvCaptureLoader`] reads a self-describing text format. Leading lines that
//! start with `#` carry the JSON-encoded [`CaptureConfig`]; the rest is CSV with
//! a header row of channel names and one row per sample:
//!
//! ```text
//! # {
//! #   "sample_rate_hz": 1000.0,
//! #   "ao_frequency_hz": [10.0],
//! #   "meta": { "standoff_in": 0.5 },
//! #   "calibration": { "Current": { "gain": 100.0, "offset": 0.0, "units": "uA" } }
//! # }
//! Voltage,Current
//! 0.0,0.10
//! 0.1,0.12
//! ```
//!
//! Calibration (`raw * gain + offset`) is applied while loading, so every
//! [`ChannelStore`] holds engineering units.

use crate::data::channel_store::{Channel, ChannelStore};
use crate::error::{AppResult, PostError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Linear calibration of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Multiplier applied to raw samples.
    #[serde(default = "default_gain")]
    pub gain: f64,
    /// Offset added after scaling.
    #[serde(default)]
    pub offset: f64,
    /// Engineering units after calibration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

fn default_gain() -> f64 {
    1.0
}

impl Calibration {
    fn apply(&self, raw: f64) -> f64 {
        raw * self.gain + self.offset
    }

    fn invert(&self, value: f64) -> f64 {
        (value - self.offset) / self.gain
    }
}

/// Acquisition configuration recorded with a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Analog input sample rate in Hz.
    pub sample_rate_hz: f64,
    /// Signal frequency of each analog output channel in Hz.
    #[serde(default)]
    pub ao_frequency_hz: Vec<f64>,
    /// Free-form run metadata (standoff distance, operator notes, ...).
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
    /// Per-channel calibration, keyed by channel name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub calibration: BTreeMap<String, Calibration>,
}

impl CaptureConfig {
    /// Configuration with only a sample rate.
    pub fn new(sample_rate_hz: f64) -> Self {
        Self {
            sample_rate_hz,
            ao_frequency_hz: Vec::new(),
            meta: BTreeMap::new(),
            calibration: BTreeMap::new(),
        }
    }

    /// Add an analog output channel running at `frequency_hz`.
    pub fn with_ao_frequency(mut self, frequency_hz: f64) -> Self {
        self.ao_frequency_hz.push(frequency_hz);
        self
    }

    /// Add a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Add a channel calibration.
    pub fn with_calibration(mut self, channel: impl Into<String>, calibration: Calibration) -> Self {
        self.calibration.insert(channel.into(), calibration);
        self
    }

    /// Raw metadata value.
    pub fn meta(&self, key: &str) -> AppResult<&serde_json::Value> {
        self.meta
            .get(key)
            .ok_or_else(|| PostError::MissingMeta(format!("meta.{}", key)))
    }

    /// Numeric metadata value. Numeric strings are accepted.
    pub fn meta_f64(&self, key: &str) -> AppResult<f64> {
        let value = self.meta(key)?;
        value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| PostError::Config(format!("meta.{} is not numeric: {}", key, value)))
    }

    /// Output frequency of analog output channel `channel`.
    pub fn output_frequency(&self, channel: usize) -> AppResult<f64> {
        self.ao_frequency_hz
            .get(channel)
            .copied()
            .ok_or_else(|| PostError::MissingMeta(format!("ao_frequency_hz[{}]", channel)))
    }
}

/// A loaded capture.
#[derive(Debug, Clone)]
pub struct Capture {
    /// Acquisition configuration.
    pub config: CaptureConfig,
    /// Calibrated channels.
    pub store: ChannelStore,
}

/// Source of captures for the pipeline.
pub trait CaptureLoader: Send + Sync {
    /// Load the capture at `path`.
    ///
    /// Fails with [`PostError::CaptureLoad`] (or a more specific input error)
    /// when the file is missing or malformed.
    fn load(&self, path: &Path) -> AppResult<Capture>;
}

/// Loader for the `#`-header CSV capture format.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvCaptureLoader;

impl CaptureLoader for CsvCaptureLoader {
    fn load(&self, path: &Path) -> AppResult<Capture> {
        let text = std::fs::read_to_string(path).map_err(|e| PostError::capture_load(path, e))?;
        let capture = parse_capture(&text).map_err(|e| match e {
            PostError::CaptureLoad { reason, .. } => PostError::capture_load(path, reason),
            PostError::Csv(e) => PostError::capture_load(path, e),
            PostError::Json(e) => PostError::capture_load(path, format!("bad header: {}", e)),
            other => other,
        })?;
        tracing::debug!(
            path = %path.display(),
            channels = capture.store.channels().len(),
            samples = capture.store.sample_count(),
            sample_rate = capture.store.sample_rate(),
            "loaded capture"
        );
        Ok(capture)
    }
}

/// Parse a capture from its text representation.
pub fn parse_capture(text: &str) -> AppResult<Capture> {
    let mut header = String::new();
    let mut body_start = text.len();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        match line.trim_start().strip_prefix('#') {
            Some(rest) => {
                header.push_str(rest.strip_prefix(' ').unwrap_or(rest));
                offset += line.len();
            }
            None => {
                body_start = offset;
                break;
            }
        }
    }
    if header.trim().is_empty() {
        return Err(PostError::capture_load("", "missing '#' configuration header"));
    }
    let config: CaptureConfig = serde_json::from_str(&header)?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text[body_start..].as_bytes());
    let names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for (column, field) in record.iter().enumerate() {
            let value: f64 = field.parse().map_err(|_| {
                PostError::capture_load(
                    "",
                    format!("row {}: '{}' is not a number", row + 1, field),
                )
            })?;
            let calibrated = match config.calibration.get(&names[column]) {
                Some(cal) => cal.apply(value),
                None => value,
            };
            columns[column].push(calibrated);
        }
    }

    let channels = names
        .into_iter()
        .zip(columns)
        .map(|(name, samples)| Channel::new(name, samples))
        .collect();
    let store = ChannelStore::new(config.sample_rate_hz, channels)?;
    Ok(Capture { config, store })
}

/// Write `store` in the format read by [`CsvCaptureLoader`].
///
/// Calibrations in `config` are inverted on the way out, so loading the file
/// again reproduces `store`.
pub fn write_capture(path: &Path, config: &CaptureConfig, store: &ChannelStore) -> AppResult<()> {
    for (name, cal) in &config.calibration {
        if cal.gain == 0.0 {
            return Err(PostError::Config(format!(
                "calibration gain for '{}' is zero",
                name
            )));
        }
    }

    let mut file = BufWriter::new(File::create(path)?);
    let json_string = serde_json::to_string_pretty(config)?;
    for line in json_string.lines() {
        writeln!(file, "# {}", line)?;
    }

    let mut writer = csv::Writer::from_writer(file);
    let names: Vec<&str> = store.channel_names().collect();
    writer.write_record(&names)?;
    for i in 0..store.sample_count() {
        let row = store.channels().iter().map(|channel| {
            let value = channel.samples[i];
            let raw = match config.calibration.get(&channel.name) {
                Some(cal) => cal.invert(value),
                None => value,
            };
            raw.to_string()
        });
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# {
#   \"sample_rate_hz\": 4.0,
#   \"ao_frequency_hz\": [2.0],
#   \"meta\": { \"standoff_in\": \"0.75\" },
#   \"calibration\": { \"Current\": { \"gain\": 100.0, \"offset\": 1.0 } }
# }
Voltage, Current
0.0, 0.1
1.0, 0.2
";

    #[test]
    fn parses_header_and_applies_calibration() {
        let capture = parse_capture(SAMPLE).unwrap();
        assert_eq!(capture.store.sample_rate(), 4.0);
        assert_eq!(capture.store.channel("Voltage").unwrap(), &[0.0, 1.0]);
        let current = capture.store.channel("Current").unwrap();
        assert!((current[0] - 11.0).abs() < 1e-9);
        assert!((current[1] - 21.0).abs() < 1e-9);
        assert_eq!(capture.config.output_frequency(0).unwrap(), 2.0);
        assert_eq!(capture.config.meta_f64("standoff_in").unwrap(), 0.75);
    }

    #[test]
    fn missing_meta_and_ao_channel() {
        let capture = parse_capture(SAMPLE).unwrap();
        assert!(matches!(
            capture.config.meta_f64("operator"),
            Err(PostError::MissingMeta(_))
        ));
        assert!(matches!(
            capture.config.output_frequency(1),
            Err(PostError::MissingMeta(_))
        ));
    }

    #[test]
    fn rejects_missing_header() {
        let err = parse_capture("Voltage\n1.0\n").unwrap_err();
        assert!(matches!(err, PostError::CaptureLoad { .. }));
    }

    #[test]
    fn rejects_non_numeric_sample() {
        let text = "# {\"sample_rate_hz\": 1.0}\nV\n1.0\nabc\n";
        let err = parse_capture(text).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn rejects_ragged_rows() {
        let text = "# {\"sample_rate_hz\": 1.0}\nV,I\n1.0,2.0\n3.0\n";
        assert!(parse_capture(text).is_err());
    }

    #[test]
    fn loader_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burn.dat");
        std::fs::write(&path, "# not json\nV\n1\n").unwrap();
        match CsvCaptureLoader.load(&path) {
            Err(PostError::CaptureLoad { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other),
        }
        let missing = dir.path().join("pre.dat");
        assert!(matches!(
            CsvCaptureLoader.load(&missing),
            Err(PostError::CaptureLoad { .. })
        ));
    }

    #[test]
    fn written_capture_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burn.dat");
        let config = CaptureConfig::new(8.0)
            .with_ao_frequency(1.0)
            .with_meta("standoff_in", 0.5)
            .with_calibration(
                "Current",
                Calibration {
                    gain: 2.0,
                    offset: 0.5,
                    units: Some("uA".into()),
                },
            );
        let store = ChannelStore::from_pairs(
            8.0,
            [
                ("Voltage", vec![-1.0, 0.25, 3.5]),
                ("Current", vec![10.5, 12.5, 14.5]),
            ],
        )
        .unwrap();
        write_capture(&path, &config, &store).unwrap();

        let loaded = CsvCaptureLoader.load(&path).unwrap();
        assert_eq!(loaded.config, config);
        assert_eq!(loaded.store.channel("Voltage").unwrap(), &[-1.0, 0.25, 3.5]);
        assert_eq!(loaded.store.channel("Current").unwrap(), &[10.5, 12.5, 14.5]);
    }
}
