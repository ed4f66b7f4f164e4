//! In-memory storage for the channels of one capture.
//!
//! A [`ChannelStore`] holds equally long, named sample vectors that share a
//! single uniform sample rate. The time base is derived once at construction
//! (`t[i] = i / sample_rate`) so that detectors and windowers can borrow it.
//! Stores are immutable after construction.

use crate::error::{AppResult, PostError};
use std::fmt;

/// Identifies a channel either by its name or by its column index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKey {
    /// Channel label as recorded in the capture header.
    Name(String),
    /// Zero-based column position.
    Index(usize),
}

impl From<&str> for ChannelKey {
    fn from(value: &str) -> Self {
        ChannelKey::Name(value.to_string())
    }
}

impl From<String> for ChannelKey {
    fn from(value: String) -> Self {
        ChannelKey::Name(value)
    }
}

impl From<&String> for ChannelKey {
    fn from(value: &String) -> Self {
        ChannelKey::Name(value.clone())
    }
}

impl From<usize> for ChannelKey {
    fn from(value: usize) -> Self {
        ChannelKey::Index(value)
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKey::Name(name) => write!(f, "{}", name),
            ChannelKey::Index(index) => write!(f, "#{}", index),
        }
    }
}

/// A single named channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Channel label.
    pub name: String,
    /// Samples in acquisition order.
    pub samples: Vec<f64>,
}

impl Channel {
    /// Create a channel from a name and its samples.
    pub fn new(name: impl Into<String>, samples: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }
}

/// Named, equal-length channels sharing one time base.
///
/// # Invariants
///
/// - Every channel has exactly [`ChannelStore::sample_count`] samples.
/// - Index `i` of every channel refers to the same acquisition instant `time()[i]`.
/// - `sample_rate` is positive and finite.
#[derive(Debug, Clone)]
pub struct ChannelStore {
    sample_rate: f64,
    channels: Vec<Channel>,
    time: Vec<f64>,
}

impl ChannelStore {
    /// Build a store, validating the sample rate and channel lengths.
    ///
    /// # Errors
    ///
    /// - [`PostError::InvalidSampleRate`] if `sample_rate` is not positive and finite.
    /// - [`PostError::ChannelLength`] if channels disagree on sample count.
    /// - [`PostError::Config`] if two channels share a name.
    pub fn new(sample_rate: f64, channels: Vec<Channel>) -> AppResult<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(PostError::InvalidSampleRate(sample_rate));
        }

        let expected = channels.first().map_or(0, |c| c.samples.len());
        for (i, channel) in channels.iter().enumerate() {
            if channel.samples.len() != expected {
                return Err(PostError::ChannelLength {
                    channel: channel.name.clone(),
                    expected,
                    actual: channel.samples.len(),
                });
            }
            if channels[..i].iter().any(|c| c.name == channel.name) {
                return Err(PostError::Config(format!(
                    "duplicate channel name '{}'",
                    channel.name
                )));
            }
        }

        let time = (0..expected).map(|i| i as f64 / sample_rate).collect();

        Ok(Self {
            sample_rate,
            channels,
            time,
        })
    }

    /// Convenience constructor from `(name, samples)` pairs.
    pub fn from_pairs<S: Into<String>>(
        sample_rate: f64,
        pairs: impl IntoIterator<Item = (S, Vec<f64>)>,
    ) -> AppResult<Self> {
        let channels = pairs
            .into_iter()
            .map(|(name, samples)| Channel::new(name, samples))
            .collect();
        Self::new(sample_rate, channels)
    }

    /// Samples of the channel identified by `key`.
    pub fn channel(&self, key: impl Into<ChannelKey>) -> AppResult<&[f64]> {
        let key = key.into();
        let found = match &key {
            ChannelKey::Name(name) => self.channels.iter().find(|c| &c.name == name),
            ChannelKey::Index(index) => self.channels.get(*index),
        };
        found
            .map(|c| c.samples.as_slice())
            .ok_or_else(|| PostError::MissingChannel(key.to_string()))
    }

    /// Whether a channel with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.name == name)
    }

    /// Time of every sample in seconds, starting at zero.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Samples per second.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Number of samples in every channel.
    pub fn sample_count(&self) -> usize {
        self.time.len()
    }

    /// Channel names in column order.
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.name.as_str())
    }

    /// All channels in column order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Arithmetic mean of a channel. An empty channel has mean `NaN`.
    pub fn mean(&self, key: impl Into<ChannelKey>) -> AppResult<f64> {
        let samples = self.channel(key)?;
        Ok(samples.iter().sum::<f64>() / samples.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ChannelStore {
        ChannelStore::from_pairs(
            4.0,
            [
                ("Voltage", vec![0.0, 1.0, 2.0, 3.0]),
                ("Current", vec![10.0, 12.0, 14.0, 16.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn time_vector_follows_sample_rate() {
        let s = store();
        assert_eq!(s.time(), &[0.0, 0.25, 0.5, 0.75]);
        assert_eq!(s.sample_count(), 4);
        assert_eq!(s.sample_rate(), 4.0);
    }

    #[test]
    fn channel_lookup_by_name_and_index() {
        let s = store();
        assert_eq!(s.channel("Current").unwrap()[1], 12.0);
        assert_eq!(s.channel(0usize).unwrap()[3], 3.0);
        assert!(matches!(
            s.channel("Oxygen"),
            Err(PostError::MissingChannel(name)) if name == "Oxygen"
        ));
        assert!(matches!(s.channel(2usize), Err(PostError::MissingChannel(_))));
    }

    #[test]
    fn rejects_unequal_lengths() {
        let err = ChannelStore::from_pairs(1.0, [("a", vec![1.0, 2.0]), ("b", vec![1.0])])
            .unwrap_err();
        assert!(matches!(
            err,
            PostError::ChannelLength { expected: 2, actual: 1, .. }
        ));
    }

    #[test]
    fn rejects_bad_sample_rate() {
        for rate in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let result = ChannelStore::from_pairs(rate, [("a", vec![1.0])]);
            assert!(matches!(result, Err(PostError::InvalidSampleRate(_))));
        }
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = ChannelStore::from_pairs(1.0, [("a", vec![1.0]), ("a", vec![2.0])]);
        assert!(matches!(result, Err(PostError::Config(_))));
    }

    #[test]
    fn mean_of_channel() {
        let s = store();
        assert_eq!(s.mean("Current").unwrap(), 13.0);
        assert!(s.mean("Missing").is_err());
    }

    #[test]
    fn empty_store_is_valid() {
        let s = ChannelStore::new(10.0, vec![]).unwrap();
        assert_eq!(s.sample_count(), 0);
        assert!(s.time().is_empty());
        assert_eq!(s.channel_names().count(), 0);
    }
}
