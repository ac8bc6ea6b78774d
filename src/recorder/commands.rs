//! The command enum the worker thread drains off its `crossbeam_channel::select!` loop.

use crate::export::Subscription;
use crate::measure::{Measure, MeasureKind, Measurement};
use crate::tags::TagMap;
use crate::view::{View, ViewData};
use crate::MetricsError;
use crossbeam::channel::Sender;
use std::sync::Arc;
use std::time::Duration;

/// Commands accepted by the worker thread. Every variant that needs to report a result back
/// to the caller carries a one-shot reply [`Sender`]; the caller waits on the matching
/// receiver with a bounded `recv_timeout`.
pub(crate) enum Command {
    RegisterMeasure {
        name: String,
        description: String,
        unit: String,
        kind: MeasureKind,
        reply: Sender<Result<Measure, MetricsError>>,
    },
    DeleteMeasure {
        name: String,
        reply: Sender<Result<(), MetricsError>>,
    },
    FindMeasure {
        name: String,
        reply: Sender<Option<Measure>>,
    },
    RegisterView {
        view: View,
        reply: Sender<Result<(), MetricsError>>,
    },
    UnregisterView {
        name: String,
        reply: Sender<Result<(), MetricsError>>,
    },
    Subscribe {
        view_name: String,
        capacity: usize,
        reply: Sender<Result<Subscription, MetricsError>>,
    },
    Unsubscribe {
        view_name: Arc<str>,
        subscriber_id: u64,
    },
    ForceCollect {
        view_name: String,
        reply: Sender<Result<(), MetricsError>>,
    },
    StopForceCollect {
        view_name: String,
        reply: Sender<Result<(), MetricsError>>,
    },
    RetrieveData {
        view_name: String,
        reply: Sender<Result<ViewData, MetricsError>>,
    },
    Record {
        measurements: Vec<Measurement>,
        tag_map: TagMap,
    },
    SetReportingPeriod {
        period: Duration,
    },
}
