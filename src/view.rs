//! Views: a binding of a measure to an aggregation kind, a window shape, and a set of tag keys.

use crate::aggregation::AggregationKind;
use crate::measure::Measure;
use crate::tags::{Key, Tag};
use crate::MetricsError;
use std::sync::Arc;
use std::time::Duration;

/// The temporal shape a view's collector applies to every tag-signature bucket.
#[derive(Clone, Debug)]
pub enum WindowSpec {
    /// Samples accumulate forever, until the view is explicitly deactivated.
    Cumulative,
    /// Samples age out of a ring of `bucket_count` buckets spanning `duration`.
    SlidingTime {
        /// Total duration the window covers.
        duration: Duration,
        /// Number of ring buckets; must be at least 2.
        bucket_count: usize,
    },
}

/// A named binding of a measure to an aggregation and window shape, grouped by a fixed list
/// of tag keys.
///
/// Views do not themselves hold samples; [`crate::collector::Collector`] does that on the
/// view's behalf, lazily keyed by tag-signature.
#[derive(Clone, Debug)]
pub struct View {
    name: Arc<str>,
    description: Arc<str>,
    measure: Measure,
    tag_keys: Vec<Key>,
    aggregation: AggregationKind,
    window: WindowSpec,
}

/// Maximum number of bytes allowed in a view name.
pub const MAX_VIEW_NAME_LENGTH: usize = 255;

impl View {
    /// Creates a new view definition.
    ///
    /// # Errors
    /// Returns [`MetricsError::InvalidArgument`] if `name` is empty or too long, or if the
    /// window is sliding-time with fewer than 2 buckets.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        measure: Measure,
        tag_keys: Vec<Key>,
        aggregation: AggregationKind,
        window: WindowSpec,
    ) -> Result<Self, MetricsError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MetricsError::InvalidArgument("view name must not be empty".into()));
        }
        if name.len() > MAX_VIEW_NAME_LENGTH {
            return Err(MetricsError::InvalidArgument(format!(
                "view name {name:?} exceeds {MAX_VIEW_NAME_LENGTH} bytes"
            )));
        }
        if let WindowSpec::SlidingTime { bucket_count, .. } = window {
            if bucket_count < 2 {
                return Err(MetricsError::InvalidArgument(
                    "sliding-time windows need at least 2 buckets (N >= 1)".into(),
                ));
            }
        }
        Ok(Self {
            name: Arc::from(name),
            description: Arc::from(description.into()),
            measure,
            tag_keys,
            aggregation,
            window,
        })
    }

    /// The view's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The view's human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The measure this view observes.
    #[must_use]
    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    /// The ordered tag-key list used to compute signatures for this view's collector.
    #[must_use]
    pub fn tag_keys(&self) -> &[Key] {
        &self.tag_keys
    }

    /// The aggregation kind this view's collector applies to every signature.
    #[must_use]
    pub fn aggregation(&self) -> &AggregationKind {
        &self.aggregation
    }

    /// The window shape this view's collector applies to every signature.
    #[must_use]
    pub fn window(&self) -> &WindowSpec {
        &self.window
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for View {}

/// A tick-time snapshot of every tag-signature row known to one view.
#[derive(Clone, Debug)]
pub struct ViewData {
    /// The view this snapshot belongs to.
    pub view_name: Arc<str>,
    /// When the view started collecting the data folded into this snapshot (cumulative
    /// windows) or the window's current start (sliding windows).
    pub start_time: std::time::SystemTime,
    /// When this snapshot was taken.
    pub end_time: std::time::SystemTime,
    /// One row per distinct tag-signature observed by the view's collector.
    pub rows: Vec<Row>,
}

/// One tag-signature's aggregation state as of a [`ViewData`] snapshot.
#[derive(Clone, Debug)]
pub struct Row {
    /// The tags identifying this row, in the view's key order.
    pub tags: Vec<Tag>,
    /// The aggregated data for this row.
    pub data: crate::aggregation::AggregationData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Bounds;
    use crate::measure::MeasureKind;

    fn measure() -> Measure {
        Measure::new("latency_ms", "", "ms", MeasureKind::Int64).unwrap()
    }

    #[test]
    fn rejects_sliding_window_with_too_few_buckets() {
        let result = View::new(
            "v",
            "",
            measure(),
            vec![],
            AggregationKind::Count,
            WindowSpec::SlidingTime { duration: Duration::from_secs(10), bucket_count: 1 },
        );
        assert!(result.is_err());
    }

    #[test]
    fn accepts_distribution_view_with_valid_bounds() {
        let bounds = Bounds::new(vec![0.0, 5.0, 10.0]).unwrap();
        let result = View::new(
            "v",
            "",
            measure(),
            vec![],
            AggregationKind::Distribution(bounds),
            WindowSpec::Cumulative,
        );
        assert!(result.is_ok());
    }
}
