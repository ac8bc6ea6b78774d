//! # statsview
//!
//! In-process stats instrumentation: record tagged measurements from anywhere in a call
//! tree, fold them into named views with configurable aggregation and windowing, and fan
//! the results out to exporters and subscribers on a fixed reporting period.
//!
//! ## Concepts
//!
//! - A [`Measure`] names a typed numeric signal (`latency_ms`, `queue_depth`, …).
//! - A [`View`] binds a measure to an [`AggregationKind`] (count, sum, mean, distribution,
//!   last-value), a window shape (cumulative or sliding-time), and a set of tag keys to
//!   group by.
//! - Producers attach a [`TagMap`] to the ambient thread-local context and call
//!   [`StatsRecorder::record`]; a single background worker thread folds every sample into
//!   the views that observe its measure.
//! - [`StatsRecorder::subscribe`] and registered [`Exporter`]s both receive a [`ViewData`]
//!   snapshot on every reporting tick.
//!
//! ## Quick Start
//!
//! ```
//! use statsview::tags::{context, Key, Tag, TagMap, TagMutator};
//! use statsview::{AggregationKind, MeasureKind, Measurement, StatsRecorder, WindowSpec};
//!
//! let recorder = StatsRecorder::new();
//! let latency = recorder.new_measure("latency_ms", "request latency", "ms", MeasureKind::Int64).unwrap();
//! let method = Key::new("method").unwrap();
//!
//! let view = recorder
//!     .new_view(
//!         "latency_by_method",
//!         "request latency grouped by HTTP method",
//!         latency.clone(),
//!         vec![method.clone()],
//!         AggregationKind::Count,
//!         WindowSpec::Cumulative,
//!     )
//!     .unwrap();
//!
//! let subscription = recorder.subscribe(view.name()).unwrap();
//!
//! let tag_map = TagMap::new(&TagMap::empty(), [TagMutator::Upsert(Tag::new(method, "GET"))]).unwrap();
//! let _guard = context::attach_tag_map(tag_map);
//! recorder.record(&[Measurement::int64(&latency, 1)]);
//!
//! // Snapshots arrive on `subscription` at the recorder's reporting period (10s by default).
//! let _ = subscription.try_recv();
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod aggregation;
mod collector;
pub mod export;
mod error;
mod macros;
mod measure;
pub mod recorder;
pub mod tags;
mod view;
mod window;

pub use aggregation::{AggregationData, AggregationKind, Bounds, DistributionData};
pub use collector::Collector;
pub use error::MetricsError;
pub use export::{Exporter, ExporterRegistry, Subscription};
pub use measure::{Measure, MeasureKind, Measurement, MeasurementValue};
pub use recorder::{StatsRecorder, StatsRecorderOptions};
pub use view::{Row, View, ViewData, WindowSpec};
pub use window::WindowAggregator;

/// Result type returned by fallible recorder operations.
pub type MetricResult<T> = Result<T, MetricsError>;
