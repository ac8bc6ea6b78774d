//! The public handle: `StatsRecorder`.
//!
//! A `StatsRecorder` is a cheap, `Clone + Send + Sync` handle onto a single worker thread
//! that owns every measure, view, collector, and aggregator. Cloning only clones the
//! command-sender and a shared exporter registry; the worker thread itself is joined when
//! the last clone is dropped, mirroring the join-on-drop teardown used elsewhere in this
//! codebase for background collector threads.

pub(crate) mod commands;
mod worker;

use crate::aggregation::AggregationKind;
use crate::export::{Exporter, ExporterRegistry, Subscription};
use crate::measure::{Measure, MeasureKind, Measurement};
use crate::tags::context;
use crate::view::{View, ViewData};
use crate::MetricsError;
use commands::Command;
use crossbeam::channel::Sender;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use worker::{Worker, DEFAULT_REPORTING_PERIOD};

/// Default capacity of the bounded command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 8192;

/// Default timeout applied to commands that wait on a reply channel.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default channel capacity handed to a new subscription.
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 64;

/// Tuning knobs for [`StatsRecorder::with_options`].
#[derive(Clone, Debug)]
pub struct StatsRecorderOptions {
    /// Capacity of the bounded command channel producers post to.
    pub command_capacity: usize,
    /// Initial interval between reporting ticks.
    pub reporting_period: Duration,
    /// How long a round-trip command waits for the worker's reply before failing with
    /// [`MetricsError::WorkerUnavailable`].
    pub reply_timeout: Duration,
}

impl Default for StatsRecorderOptions {
    fn default() -> Self {
        Self {
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            reporting_period: DEFAULT_REPORTING_PERIOD,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }
}

struct Inner {
    quit_tx: Sender<()>,
    join_handle: Option<JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.quit_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

/// A cheap, cloneable handle onto an in-process stats recorder.
///
/// All mutation of measures, views, collectors, and aggregators happens on a single owned
/// worker thread. Every `StatsRecorder` clone shares that same worker; the worker is joined
/// when the last clone is dropped.
#[derive(Clone)]
pub struct StatsRecorder {
    command_tx: Sender<Command>,
    exporters: Arc<ExporterRegistry>,
    reply_timeout: Duration,
    dropped_records: Arc<AtomicU64>,
    inner: Arc<Inner>,
}

impl StatsRecorder {
    /// Creates a new recorder with default tuning, spawning its worker thread.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(StatsRecorderOptions::default())
    }

    /// Creates a new recorder with explicit tuning, spawning its worker thread.
    #[must_use]
    pub fn with_options(options: StatsRecorderOptions) -> Self {
        let (command_tx, command_rx) = crossbeam::channel::bounded(options.command_capacity);
        let (quit_tx, quit_rx) = crossbeam::channel::bounded(1);
        let exporters = Arc::new(ExporterRegistry::new());
        let worker = Worker::new(
            command_rx,
            quit_rx,
            command_tx.clone(),
            exporters.clone(),
            options.reporting_period,
        );
        let join_handle = std::thread::spawn(move || worker.run());

        Self {
            command_tx,
            exporters,
            reply_timeout: options.reply_timeout,
            dropped_records: Arc::new(AtomicU64::new(0)),
            inner: Arc::new(Inner { quit_tx, join_handle: Some(join_handle) }),
        }
    }

    fn call<T>(
        &self,
        build: impl FnOnce(Sender<Result<T, MetricsError>>) -> Command,
    ) -> Result<T, MetricsError> {
        let (reply_tx, reply_rx) = crossbeam::channel::bounded(1);
        self.command_tx
            .send(build(reply_tx))
            .map_err(|_| MetricsError::WorkerUnavailable("worker thread has stopped".into()))?;
        reply_rx
            .recv_timeout(self.reply_timeout)
            .map_err(|_| MetricsError::WorkerUnavailable("worker did not reply in time".into()))?
    }

    /// Registers a new measure, or returns a clone of an existing one with identical
    /// attributes.
    ///
    /// # Errors
    /// Returns [`MetricsError::InvalidArgument`] if `name` fails validation, or
    /// [`MetricsError::AlreadyRegistered`] if a measure with the same name but different
    /// attributes already exists.
    pub fn new_measure(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        kind: MeasureKind,
    ) -> Result<Measure, MetricsError> {
        let name = name.into();
        let description = description.into();
        let unit = unit.into();
        // Client-side validation that doesn't need registry state, per the measure's own
        // constructor; the worker repeats only the registry-dependent checks.
        Measure::new(name.clone(), description.clone(), unit.clone(), kind)?;
        self.call(|reply| Command::RegisterMeasure { name, description, unit, kind, reply })
    }

    /// Looks up a previously registered measure by name.
    ///
    /// Returns `None` if no measure with that name has been registered, or if the worker
    /// cannot be reached before `reply_timeout` elapses.
    #[must_use]
    pub fn find_measure(&self, name: impl Into<String>) -> Option<Measure> {
        let (reply_tx, reply_rx) = crossbeam::channel::bounded(1);
        self.command_tx.send(Command::FindMeasure { name: name.into(), reply: reply_tx }).ok()?;
        reply_rx.recv_timeout(self.reply_timeout).ok()?
    }

    /// Deletes a measure by name.
    ///
    /// # Errors
    /// Returns [`MetricsError::NotFound`] if no such measure exists, or
    /// [`MetricsError::InUse`] if a registered view still references it.
    pub fn delete_measure(&self, name: impl Into<String>) -> Result<(), MetricsError> {
        self.call(|reply| Command::DeleteMeasure { name: name.into(), reply })
    }

    /// Registers a view, transitively registering its measure if not already known.
    ///
    /// # Errors
    /// Returns [`MetricsError::AlreadyRegistered`] if a view with the same name exists.
    pub fn register_view(&self, view: View) -> Result<(), MetricsError> {
        self.call(|reply| Command::RegisterView { view, reply })
    }

    /// Unregisters a view by name.
    ///
    /// # Errors
    /// Returns [`MetricsError::NotFound`] if no such view exists, or [`MetricsError::InUse`]
    /// if the view is still collecting (has subscribers or forced collection).
    pub fn unregister_view(&self, name: impl Into<String>) -> Result<(), MetricsError> {
        self.call(|reply| Command::UnregisterView { name: name.into(), reply })
    }

    /// Subscribes to a view's tick-time snapshots.
    ///
    /// The returned [`Subscription`] unsubscribes automatically when dropped. Automatic
    /// register-on-first-subscribe is not performed: `view_name` must already be registered.
    ///
    /// # Errors
    /// Returns [`MetricsError::NotFound`] if no such view exists.
    pub fn subscribe(&self, view_name: impl Into<String>) -> Result<Subscription, MetricsError> {
        self.subscribe_with_capacity(view_name, DEFAULT_SUBSCRIPTION_CAPACITY)
    }

    /// Like [`Self::subscribe`], with an explicit subscriber channel capacity.
    ///
    /// # Errors
    /// Returns [`MetricsError::NotFound`] if no such view exists.
    pub fn subscribe_with_capacity(
        &self,
        view_name: impl Into<String>,
        capacity: usize,
    ) -> Result<Subscription, MetricsError> {
        let view_name = view_name.into();
        self.call(|reply| Command::Subscribe { view_name, capacity, reply })
    }

    /// Forces a view to collect even without subscribers.
    ///
    /// # Errors
    /// Returns [`MetricsError::NotFound`] if no such view exists.
    pub fn force_collect(&self, view_name: impl Into<String>) -> Result<(), MetricsError> {
        self.call(|reply| Command::ForceCollect { view_name: view_name.into(), reply })
    }

    /// Stops forcing a view to collect; if it has no subscribers either, its rows are
    /// cleared.
    ///
    /// # Errors
    /// Returns [`MetricsError::NotFound`] if no such view exists.
    pub fn stop_force_collect(&self, view_name: impl Into<String>) -> Result<(), MetricsError> {
        self.call(|reply| Command::StopForceCollect { view_name: view_name.into(), reply })
    }

    /// Retrieves a one-off snapshot of a view's current rows.
    ///
    /// # Errors
    /// Returns [`MetricsError::NotFound`] if no such view exists, or
    /// [`MetricsError::NotCollecting`] if the view has no subscribers and no forced
    /// collection.
    pub fn retrieve_data(&self, view_name: impl Into<String>) -> Result<ViewData, MetricsError> {
        self.call(|reply| Command::RetrieveData { view_name: view_name.into(), reply })
    }

    /// Records one or more measurements against the ambient tag map attached on this thread.
    ///
    /// Asynchronous and never blocks: if the command channel is full, the record is dropped
    /// (at-most-once delivery, lossy by design) and a rate-limited `tracing::warn!` is
    /// emitted. Unknown measures, and measurements whose kind does not match their measure,
    /// are also dropped silently — `record` never surfaces an error to the caller.
    pub fn record(&self, measurements: &[Measurement]) {
        let tag_map = context::current_tag_map();
        let command = Command::Record { measurements: measurements.to_vec(), tag_map };
        if self.command_tx.try_send(command).is_err() {
            let count = self.dropped_records.fetch_add(1, Ordering::Relaxed);
            if count % 1000 == 0 {
                tracing::warn!(dropped = count + 1, "record dropped: command channel full");
            }
        }
    }

    /// Registers an exporter. Exporters are consulted directly via a copy-on-write registry
    /// shared with the worker, not routed through the command queue.
    pub fn register_exporter(&self, exporter: Arc<dyn Exporter>) {
        self.exporters.register(exporter);
    }

    /// Unregisters an exporter by name.
    pub fn unregister_exporter(&self, name: &str) {
        self.exporters.unregister(name);
    }

    /// Replaces the reporting period. A duration of zero or less restores the default
    /// (10 seconds).
    pub fn set_reporting_period(&self, period: Duration) {
        let _ = self.command_tx.try_send(Command::SetReportingPeriod { period });
    }

    /// Convenience: builds and registers a view in one call.
    ///
    /// # Errors
    /// See [`Self::register_view`] and [`crate::view::View::new`].
    #[allow(clippy::too_many_arguments)]
    pub fn new_view(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        measure: Measure,
        tag_keys: Vec<crate::tags::Key>,
        aggregation: AggregationKind,
        window: crate::view::WindowSpec,
    ) -> Result<View, MetricsError> {
        let view = View::new(name, description, measure, tag_keys, aggregation, window)?;
        self.register_view(view.clone())?;
        Ok(view)
    }
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRecorder").finish_non_exhaustive()
    }
}
