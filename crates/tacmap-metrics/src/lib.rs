//! Metrics declarations for the terrain pipeline.
//!
//! Every counter and histogram the pipeline emits is declared once in
//! [`metric_defs`] so call sites never spell a metric name by hand. The crate
//! re-exports `metrics`; no recorder is installed here, the binary decides.
//!
//! ```rust
//! use tacmap_metrics::{metric_defs, MetricLabels};
//!
//! let labels = MetricLabels::new("elevation");
//! tacmap_metrics::metrics::counter!(metric_defs::TILE_DECODES.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_histogram, Unit};

/// The kind of metric (counter or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A histogram for recording distributions.
    Histogram,
}

impl MetricKind {
    /// Returns the kind as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration with its metadata.
///
/// Built with const constructors so the whole catalogue lives in statics.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "tacmap.fetch.attempts").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn with_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Counter)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::with_kind(name, MetricKind::Histogram)
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the terrain pipeline.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Storage
    // ========================================================================

    /// Fetch attempts against a single storage candidate.
    ///
    /// Labels: source
    pub const FETCH_ATTEMPTS: Metric = Metric::counter("tacmap.fetch.attempts")
        .with_description("Fetch attempts against a single storage candidate")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Candidate fetches that failed (transport error, bad status or undecodable payload).
    ///
    /// Labels: source
    pub const FETCH_FAILURES: Metric = Metric::counter("tacmap.fetch.failures")
        .with_description("Storage candidate fetches that failed")
        .with_unit(Unit::Count)
        .with_labels(&["source"]);

    /// Resources for which every candidate failed.
    pub const FETCH_EXHAUSTED: Metric = Metric::counter("tacmap.fetch.exhausted")
        .with_description("Resources for which every storage candidate failed")
        .with_unit(Unit::Count);

    /// Bytes downloaded from storage.
    ///
    /// Labels: source
    pub const FETCH_BYTES: Metric = Metric::counter("tacmap.fetch.bytes")
        .with_description("Bytes downloaded from storage")
        .with_unit(Unit::Bytes)
        .with_labels(&["source"]);

    // ========================================================================
    // Caches
    // ========================================================================

    /// Cache lookups that returned a live entry.
    ///
    /// Labels: cache
    pub const CACHE_HITS: Metric = Metric::counter("tacmap.cache.hits")
        .with_description("Cache lookups that returned a live entry")
        .with_unit(Unit::Count)
        .with_labels(&["cache"]);

    /// Cache lookups that missed or found an expired entry.
    ///
    /// Labels: cache
    pub const CACHE_MISSES: Metric = Metric::counter("tacmap.cache.misses")
        .with_description("Cache lookups that missed")
        .with_unit(Unit::Count)
        .with_labels(&["cache"]);

    /// Entries evicted because the cache was full.
    ///
    /// Labels: cache
    pub const CACHE_EVICTIONS: Metric = Metric::counter("tacmap.cache.evictions")
        .with_description("Entries evicted because the cache was at capacity")
        .with_unit(Unit::Count)
        .with_labels(&["cache"]);

    // ========================================================================
    // Archives and indices
    // ========================================================================

    /// Archive entries extracted.
    pub const ARCHIVE_EXTRACTIONS: Metric = Metric::counter("tacmap.archive.extractions")
        .with_description("Entries extracted from downloaded archives")
        .with_unit(Unit::Count);

    /// Index loads that fell back to the degraded empty document.
    ///
    /// Labels: dataset
    pub const INDEX_FALLBACKS: Metric = Metric::counter("tacmap.index.fallbacks")
        .with_description("Index loads that fell back to the degraded document")
        .with_unit(Unit::Count)
        .with_labels(&["dataset"]);

    /// Tile lookups that found no covering tile.
    ///
    /// Labels: dataset
    pub const TILE_NO_DATA: Metric = Metric::counter("tacmap.tile.no_data")
        .with_description("Coordinates outside every indexed tile")
        .with_unit(Unit::Count)
        .with_labels(&["dataset"]);

    /// Raster tiles decoded from archive bytes.
    ///
    /// Labels: dataset
    pub const TILE_DECODES: Metric = Metric::counter("tacmap.tile.decodes")
        .with_description("Raster tiles decoded from archive bytes")
        .with_unit(Unit::Count)
        .with_labels(&["dataset"]);

    // ========================================================================
    // Classification
    // ========================================================================

    /// Image classification runs completed by the worker.
    pub const CLASSIFY_RUNS: Metric = Metric::counter("tacmap.classify.runs")
        .with_description("Image classification runs completed")
        .with_unit(Unit::Count);

    /// Classification runs that ended in an error response.
    pub const CLASSIFY_ERRORS: Metric = Metric::counter("tacmap.classify.errors")
        .with_description("Image classification runs relayed as errors")
        .with_unit(Unit::Count);

    /// Wall time of one classification run.
    pub const CLASSIFY_DURATION: Metric = Metric::histogram("tacmap.classify.duration_ms")
        .with_description("Wall time of one classification run")
        .with_unit(Unit::Milliseconds);

    /// Every metric, for [`describe_metrics`](super::describe_metrics).
    pub const ALL: &[&Metric] = &[
        &FETCH_ATTEMPTS,
        &FETCH_FAILURES,
        &FETCH_EXHAUSTED,
        &FETCH_BYTES,
        &CACHE_HITS,
        &CACHE_MISSES,
        &CACHE_EVICTIONS,
        &ARCHIVE_EXTRACTIONS,
        &INDEX_FALLBACKS,
        &TILE_NO_DATA,
        &TILE_DECODES,
        &CLASSIFY_RUNS,
        &CLASSIFY_ERRORS,
        &CLASSIFY_DURATION,
    ];
}

/// Labels identifying the dataset behind a metric.
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Dataset type ("elevation", "vegetation").
    pub dataset: String,
}

impl MetricLabels {
    /// Creates labels for a dataset.
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
        }
    }

    /// Converts the labels to the metrics crate label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("dataset", self.dataset.clone())]
    }
}

/// Describes all metrics used by the pipeline.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::FETCH_ATTEMPTS.name, "tacmap.fetch.attempts");
        assert_eq!(metric_defs::FETCH_ATTEMPTS.kind, MetricKind::Counter);
        assert_eq!(metric_defs::FETCH_BYTES.unit, Some(Unit::Bytes));
        assert_eq!(metric_defs::CLASSIFY_DURATION.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::CACHE_HITS.labels, &["cache"]);
    }

    #[test]
    fn test_all_metric_names_unique() {
        let mut names: Vec<&str> = metric_defs::ALL.iter().map(|m| m.name).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_dataset_labels() {
        let labels = MetricLabels::new("vegetation").to_labels();
        assert_eq!(labels, vec![("dataset", "vegetation".to_string())]);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
    }

    #[test]
    fn test_borrowed_labels_record_without_recorder() {
        let labels = MetricLabels::new("elevation");
        metrics::counter!(metric_defs::TILE_DECODES.name, &labels.to_labels()).increment(1);
    }
}
