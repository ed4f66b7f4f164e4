//! Flow conditions computed from the pre- and post-burn flow captures.
//!
//! The [`SummaryAggregator`] averages the fuel and oxidizer flow channels of each
//! flow capture, derives the fuel/oxidizer ratio and combined flow, and merges
//! the per-capture numbers into a cross-capture average. The result is a flat,
//! insertion-ordered [`ConditionsSummary`] that the pipeline writes out as the
//! dataset's canonical record.

use crate::data::channel_store::ChannelStore;
use crate::error::{AppResult, PostError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// What to do when a ratio has a zero denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioPolicy {
    /// Fail with [`PostError::DivisionByZero`].
    #[default]
    Error,
    /// Record the ratio as JSON `null` and carry on.
    Null,
}

/// A scalar entry of the summary record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryValue {
    /// Numeric metric.
    Number(f64),
    /// Free-form metadata.
    Text(String),
    /// Undefined metric (see [`RatioPolicy::Null`]).
    Null,
}

impl SummaryValue {
    /// Numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SummaryValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for SummaryValue {
    fn from(value: f64) -> Self {
        SummaryValue::Number(value)
    }
}

impl From<Option<f64>> for SummaryValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(SummaryValue::Null, SummaryValue::Number)
    }
}

impl From<&str> for SummaryValue {
    fn from(value: &str) -> Self {
        SummaryValue::Text(value.to_string())
    }
}

impl From<String> for SummaryValue {
    fn from(value: String) -> Self {
        SummaryValue::Text(value)
    }
}

/// Flat metric-name to value record, serialized in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConditionsSummary {
    entries: IndexMap<String, SummaryValue>,
}

impl ConditionsSummary {
    /// Empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`. Replacing keeps the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SummaryValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&SummaryValue> {
        self.entries.get(key)
    }

    /// Numeric value stored under `key`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(SummaryValue::as_f64)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the summary has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pretty-printed JSON with two-space indentation.
    pub fn to_json_pretty(&self) -> AppResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Flow statistics of one capture (or of the cross-capture average).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowMetrics {
    /// Mean fuel flow.
    pub fuel: f64,
    /// Mean oxidizer flow.
    pub oxidizer: f64,
    /// `fuel / oxidizer`; `None` when undefined under [`RatioPolicy::Null`].
    pub ratio: Option<f64>,
    /// `fuel + oxidizer`.
    pub combined: f64,
}

/// Computes flow conditions from the flow captures of a dataset.
#[derive(Debug, Clone)]
pub struct SummaryAggregator {
    fuel_channel: String,
    oxidizer_channel: String,
    policy: RatioPolicy,
}

impl SummaryAggregator {
    /// Aggregator reading the named fuel and oxidizer channels.
    pub fn new(fuel_channel: impl Into<String>, oxidizer_channel: impl Into<String>) -> Self {
        Self {
            fuel_channel: fuel_channel.into(),
            oxidizer_channel: oxidizer_channel.into(),
            policy: RatioPolicy::default(),
        }
    }

    /// Set the zero-denominator policy.
    pub fn with_ratio_policy(mut self, policy: RatioPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Mean flows, ratio and combined flow of a single capture.
    ///
    /// Both channels must be present; a missing one is a
    /// [`PostError::MissingChannel`].
    pub fn flow_metrics(&self, store: &ChannelStore, label: &str) -> AppResult<FlowMetrics> {
        let fuel = store.mean(&self.fuel_channel)?;
        let oxidizer = store.mean(&self.oxidizer_channel)?;
        self.metrics_from_means(fuel, oxidizer, label)
    }

    fn metrics_from_means(&self, fuel: f64, oxidizer: f64, label: &str) -> AppResult<FlowMetrics> {
        Ok(FlowMetrics {
            fuel,
            oxidizer,
            ratio: ratio(&format!("{} fuel/oxidizer ratio", label), fuel, oxidizer, self.policy)?,
            combined: fuel + oxidizer,
        })
    }

    /// Build the summary from whichever flow captures exist.
    ///
    /// Per-capture keys (`fg_pre_scfh`, `fo_post_ratio`, ...) are written for
    /// each capture given. The unqualified keys (`fg_scfh`, `o2_scfh`,
    /// `fo_ratio`, `flow_scfh`) hold the average of the available captures; the
    /// ratio is recomputed from the averaged means rather than averaged itself.
    pub fn aggregate(
        &self,
        pre: Option<&ChannelStore>,
        post: Option<&ChannelStore>,
    ) -> AppResult<ConditionsSummary> {
        let mut summary = ConditionsSummary::new();
        let mut captured = Vec::with_capacity(2);

        for (tag, store) in [("pre", pre), ("post", post)] {
            if let Some(store) = store {
                let metrics = self.flow_metrics(store, tag)?;
                insert_metrics(&mut summary, Some(tag), &metrics);
                captured.push(metrics);
            }
        }

        if !captured.is_empty() {
            let n = captured.len() as f64;
            let fuel = captured.iter().map(|m| m.fuel).sum::<f64>() / n;
            let oxidizer = captured.iter().map(|m| m.oxidizer).sum::<f64>() / n;
            let combined = self.metrics_from_means(fuel, oxidizer, "mean")?;
            insert_metrics(&mut summary, None, &combined);
        }

        Ok(summary)
    }
}

fn insert_metrics(summary: &mut ConditionsSummary, tag: Option<&str>, metrics: &FlowMetrics) {
    let key = |stem: &str, unit: &str| match tag {
        Some(tag) => format!("{}_{}_{}", stem, tag, unit),
        None => format!("{}_{}", stem, unit),
    };
    summary.insert(key("fg", "scfh"), metrics.fuel);
    summary.insert(key("o2", "scfh"), metrics.oxidizer);
    summary.insert(key("fo", "ratio"), metrics.ratio);
    summary.insert(key("flow", "scfh"), metrics.combined);
}

/// `numerator / denominator`, honouring `policy` when the denominator is exactly zero.
pub fn ratio(
    quantity: &str,
    numerator: f64,
    denominator: f64,
    policy: RatioPolicy,
) -> AppResult<Option<f64>> {
    if denominator == 0.0 {
        return match policy {
            RatioPolicy::Error => Err(PostError::DivisionByZero {
                quantity: quantity.to_string(),
                numerator,
            }),
            RatioPolicy::Null => {
                tracing::warn!(quantity, numerator, "zero denominator, recording null");
                Ok(None)
            }
        };
    }
    Ok(Some(numerator / denominator))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(fuel: Vec<f64>, oxygen: Vec<f64>) -> ChannelStore {
        ChannelStore::from_pairs(100.0, [("Fuel Gas", fuel), ("Oxygen", oxygen)]).unwrap()
    }

    fn aggregator() -> SummaryAggregator {
        SummaryAggregator::new("Fuel Gas", "Oxygen")
    }

    #[test]
    fn single_capture_metrics() {
        let m = aggregator()
            .flow_metrics(&flow(vec![1.0, 3.0], vec![4.0, 4.0]), "pre")
            .unwrap();
        assert_eq!(m.fuel, 2.0);
        assert_eq!(m.oxidizer, 4.0);
        assert_eq!(m.ratio, Some(0.5));
        assert_eq!(m.combined, 6.0);
    }

    #[test]
    fn ratio_is_scale_invariant_and_flow_scales_linearly() {
        let base = flow(vec![1.0, 2.0, 3.0], vec![5.0, 6.0, 7.0]);
        let scaled = flow(vec![3.0, 6.0, 9.0], vec![15.0, 18.0, 21.0]);
        let a = aggregator().flow_metrics(&base, "pre").unwrap();
        let b = aggregator().flow_metrics(&scaled, "pre").unwrap();
        assert!((a.ratio.unwrap() - b.ratio.unwrap()).abs() < 1e-12);
        assert!((b.combined - 3.0 * a.combined).abs() < 1e-12);
    }

    #[test]
    fn pre_and_post_are_averaged() {
        let pre = flow(vec![2.0, 2.0], vec![4.0, 4.0]);
        let post = flow(vec![4.0, 4.0], vec![4.0, 4.0]);
        let summary = aggregator().aggregate(Some(&pre), Some(&post)).unwrap();

        let keys: Vec<&str> = summary.keys().collect();
        assert_eq!(
            keys,
            [
                "fg_pre_scfh",
                "o2_pre_scfh",
                "fo_pre_ratio",
                "flow_pre_scfh",
                "fg_post_scfh",
                "o2_post_scfh",
                "fo_post_ratio",
                "flow_post_scfh",
                "fg_scfh",
                "o2_scfh",
                "fo_ratio",
                "flow_scfh",
            ]
        );
        assert_eq!(summary.get_f64("fg_scfh"), Some(3.0));
        assert_eq!(summary.get_f64("o2_scfh"), Some(4.0));
        assert_eq!(summary.get_f64("fo_ratio"), Some(0.75));
        assert_eq!(summary.get_f64("flow_scfh"), Some(7.0));
    }

    #[test]
    fn single_flow_capture_becomes_the_average() {
        let post = flow(vec![1.0], vec![2.0]);
        let summary = aggregator().aggregate(None, Some(&post)).unwrap();
        assert!(summary.get("fg_pre_scfh").is_none());
        assert_eq!(summary.get_f64("fg_scfh"), Some(1.0));
        assert_eq!(summary.get_f64("fo_ratio"), Some(0.5));
    }

    #[test]
    fn no_flow_captures_gives_empty_summary() {
        let summary = aggregator().aggregate(None, None).unwrap();
        assert!(summary.is_empty());
    }

    #[test]
    fn zero_oxidizer_fails_by_default() {
        let pre = flow(vec![1.0, 1.0], vec![1.0, -1.0]);
        let err = aggregator().aggregate(Some(&pre), None).unwrap_err();
        assert!(matches!(err, PostError::DivisionByZero { numerator, .. } if numerator == 1.0));
    }

    #[test]
    fn zero_oxidizer_records_null_when_allowed() {
        let pre = flow(vec![1.0], vec![0.0]);
        let summary = aggregator()
            .with_ratio_policy(RatioPolicy::Null)
            .aggregate(Some(&pre), None)
            .unwrap();
        assert_eq!(summary.get("fo_pre_ratio"), Some(&SummaryValue::Null));
        assert_eq!(summary.get_f64("flow_pre_scfh"), Some(1.0));

        let json: serde_json::Value =
            serde_json::from_str(&summary.to_json_pretty().unwrap()).unwrap();
        assert!(json["fo_pre_ratio"].is_null());
    }

    #[test]
    fn missing_oxidizer_channel_is_an_error() {
        let store = ChannelStore::from_pairs(1.0, [("Fuel Gas", vec![1.0])]).unwrap();
        let err = aggregator().aggregate(Some(&store), None).unwrap_err();
        assert!(matches!(err, PostError::MissingChannel(name) if name == "Oxygen"));
    }

    #[test]
    fn summary_serializes_in_insertion_order() {
        let mut summary = ConditionsSummary::new();
        summary.insert("zeta", 1.0);
        summary.insert("alpha", "CH4");
        summary.insert("zeta", 2.0);
        let json = summary.to_json_pretty().unwrap();
        assert_eq!(json, "{\n  \"zeta\": 2.0,\n  \"alpha\": \"CH4\"\n}");
    }
}
