//! Static index of external (non-object) metrics
//!
//! Entries are fixed at construction. Queries scan the whole list, which is
//! fine for the handful of entries an adapter serves.

use crate::clock::Clock;
use crate::labels::{LabelSet, Selector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// One named, labelled external metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalMetricEntry {
    pub name: String,
    #[serde(default)]
    pub labels: LabelSet,
    pub value: f64,
}

impl ExternalMetricEntry {
    pub fn new(name: impl Into<String>, labels: LabelSet, value: f64) -> Self {
        Self {
            name: name.into(),
            labels,
            value,
        }
    }
}

/// A matching entry stamped with the query time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalMetricSample {
    pub name: String,
    pub labels: LabelSet,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

pub struct ExternalMetricIndex {
    entries: Vec<ExternalMetricEntry>,
    clock: Arc<dyn Clock>,
}

impl ExternalMetricIndex {
    pub fn new(entries: Vec<ExternalMetricEntry>, clock: Arc<dyn Clock>) -> Self {
        Self { entries, clock }
    }

    /// The demonstration entries served by default
    pub fn with_sample_entries(clock: Arc<dyn Clock>) -> Self {
        let foo = |value: &str| -> LabelSet { [("foo", value)].into_iter().collect() };
        Self::new(
            vec![
                ExternalMetricEntry::new("my-external-metric", foo("bar"), 42.0),
                ExternalMetricEntry::new("my-external-metric", foo("baz"), 43.0),
                ExternalMetricEntry::new("other-external-metric", LabelSet::new(), 44.0),
            ],
            clock,
        )
    }

    /// Entries named `name` whose labels satisfy `selector`, in insertion order.
    /// An unknown name yields an empty result.
    pub fn query(&self, name: &str, selector: &Selector) -> Vec<ExternalMetricSample> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| entry.name == name && selector.matches(&entry.labels))
            .map(|entry| ExternalMetricSample {
                name: entry.name.clone(),
                labels: entry.labels.clone(),
                value: entry.value,
                timestamp: now,
            })
            .collect()
    }

    /// Distinct metric names, sorted
    pub fn metric_names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn index() -> ExternalMetricIndex {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        ExternalMetricIndex::with_sample_entries(Arc::new(clock))
    }

    fn values(samples: &[ExternalMetricSample]) -> Vec<f64> {
        samples.iter().map(|s| s.value).collect()
    }

    #[test]
    fn test_query_filters_by_label_selector() {
        let index = index();

        let all = index.query("my-external-metric", &Selector::everything());
        assert_eq!(values(&all), vec![42.0, 43.0]);

        let baz = index.query("my-external-metric", &Selector::parse("foo=baz").unwrap());
        assert_eq!(values(&baz), vec![43.0]);

        let not_bar = index.query("my-external-metric", &Selector::parse("foo!=bar").unwrap());
        assert_eq!(values(&not_bar), vec![43.0]);
    }

    #[test]
    fn test_query_unknown_name_is_empty() {
        assert!(index().query("missing-metric", &Selector::everything()).is_empty());
    }

    #[test]
    fn test_query_stamps_clock_time() {
        let index = index();
        let samples = index.query("other-external-metric", &Selector::everything());

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(samples[0].labels.is_empty());

        let filtered = index.query("other-external-metric", &Selector::parse("foo=bar").unwrap());
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_metric_names_are_distinct() {
        let index = index();
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.metric_names(),
            vec!["my-external-metric".to_string(), "other-external-metric".to_string()]
        );
    }
}
