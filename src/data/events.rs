//! Threshold-crossing event extraction with linear interpolation.
//!
//! The [`EventDetector`] scans a monitored channel `M` for the instants where it
//! passes through a fixed `level`, and for each one reports the interpolated
//! time and the interpolated value of a companion channel `C`:
//!
//! ```text
//! x         = (level - M[i]) / (M[i+1] - M[i])
//! time      = x * t[i+1] + (1 - x) * t[i]
//! companion = x * C[i+1] + (1 - x) * C[i]
//! ```
//!
//! # Crossing rule
//!
//! With `d[i] = M[i] - level`, index `i` is a crossing when `d[i]` and `d[i+1]`
//! have strictly opposite signs, or when `d[i] != 0` and `d[i+1] == 0`. A sample
//! that lands exactly on the level is reported once, when it arrives; leaving the
//! level again is not a second event. There is no hysteresis and no dwell time.
//!
//! # Example
//!
//! ```
//! use burn_post::data::channel_store::ChannelStore;
//! use burn_post::data::events::EventDetector;
//!
//! let store = ChannelStore::from_pairs(
//!     1.0,
//!     [
//!         ("Voltage", vec![0.0, 1.0, 2.0, 3.0, 4.0]),
//!         ("Current", vec![10.0, 12.0, 14.0, 16.0, 18.0]),
//!     ],
//! )?;
//! let events = EventDetector::new("Voltage", "Current", 2.0).detect(&store)?;
//! assert_eq!(events.len(), 1);
//! assert_eq!(events[0].time, 2.0);
//! assert_eq!(events[0].value, 14.0);
//! # Ok::<(), burn_post::error::PostError>(())
//! ```

use crate::data::channel_store::{ChannelKey, ChannelStore};
use crate::error::{AppResult, PostError};
use serde::{Deserialize, Serialize};

/// One detected crossing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Interpolated crossing time in seconds.
    pub time: f64,
    /// Interpolated companion channel value at `time`.
    pub value: f64,
}

/// Which crossing directions to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeFilter {
    /// Both directions.
    #[default]
    Any,
    /// Monitored channel moving upward through the level.
    Rising,
    /// Monitored channel moving downward through the level.
    Falling,
}

impl EdgeFilter {
    fn accepts(self, before: f64, after: f64) -> bool {
        let rising = before < 0.0 && after >= 0.0;
        let falling = before > 0.0 && after <= 0.0;
        match self {
            EdgeFilter::Any => rising || falling,
            EdgeFilter::Rising => rising,
            EdgeFilter::Falling => falling,
        }
    }
}

/// Single-threshold crossing detector.
#[derive(Debug, Clone)]
pub struct EventDetector {
    monitored: ChannelKey,
    companion: ChannelKey,
    level: f64,
    edge: EdgeFilter,
}

impl EventDetector {
    /// Detector watching `monitored` for crossings of `level`, reporting `companion`.
    pub fn new(
        monitored: impl Into<ChannelKey>,
        companion: impl Into<ChannelKey>,
        level: f64,
    ) -> Self {
        Self {
            monitored: monitored.into(),
            companion: companion.into(),
            level,
            edge: EdgeFilter::Any,
        }
    }

    /// Restrict the reported crossing direction.
    pub fn with_edge(mut self, edge: EdgeFilter) -> Self {
        self.edge = edge;
        self
    }

    /// Threshold level.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Indices `i` such that the monitored channel crosses the level between `i` and `i + 1`.
    pub fn crossing_indices(&self, monitored: &[f64]) -> Vec<usize> {
        monitored
            .windows(2)
            .enumerate()
            .filter(|(_, pair)| self.edge.accepts(pair[0] - self.level, pair[1] - self.level))
            .map(|(i, _)| i)
            .collect()
    }

    /// Extract every crossing from `store`, in ascending time order.
    ///
    /// An empty result is not an error.
    ///
    /// # Errors
    ///
    /// - [`PostError::MissingChannel`] if either channel is absent.
    /// - [`PostError::DegenerateCrossing`] if the slope at a crossing is zero or
    ///   not finite, so the interpolation fraction is undefined.
    pub fn detect(&self, store: &ChannelStore) -> AppResult<Vec<EventRecord>> {
        let monitored = store.channel(self.monitored.clone())?;
        let companion = store.channel(self.companion.clone())?;
        let time = store.time();

        let indices = self.crossing_indices(monitored);
        tracing::debug!(
            monitored = %self.monitored,
            level = self.level,
            crossings = indices.len(),
            "scanned for threshold crossings"
        );

        indices
            .into_iter()
            .map(|i| {
                let x = self.fraction(monitored, i)?;
                Ok(EventRecord {
                    time: lerp(time[i], time[i + 1], x),
                    value: lerp(companion[i], companion[i + 1], x),
                })
            })
            .collect()
    }

    fn fraction(&self, monitored: &[f64], i: usize) -> AppResult<f64> {
        let (left, right) = (monitored[i], monitored[i + 1]);
        let slope = right - left;
        let x = (self.level - left) / slope;
        if slope == 0.0 || !x.is_finite() {
            return Err(PostError::DegenerateCrossing {
                index: i,
                left,
                right,
            });
        }
        Ok(x.clamp(0.0, 1.0))
    }
}

fn lerp(a: f64, b: f64, x: f64) -> f64 {
    x * b + (1.0 - x) * a
}
