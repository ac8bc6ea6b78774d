//! The worker thread: sole owner of every measure, view, collector, and aggregator.
//!
//! Everything in this module runs on one `std::thread::spawn`'d thread. No field here is
//! ever touched from any other thread; producers only ever reach it through the command
//! channel built in [`super`].

use super::commands::Command;
use crate::collector::Collector;
use crate::export::ExporterRegistry;
use crate::measure::Measure;
use crate::view::{Row, View, ViewData};
use crate::MetricsError;
use crossbeam::channel::{Receiver, Sender};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

pub(crate) const DEFAULT_REPORTING_PERIOD: Duration = Duration::from_secs(10);

struct ViewState {
    view: View,
    collector: Collector,
    subscribers: HashMap<u64, (Sender<ViewData>, Arc<AtomicU64>)>,
    forced_collection: bool,
    start_time: SystemTime,
}

impl ViewState {
    fn is_collecting(&self) -> bool {
        self.forced_collection || !self.subscribers.is_empty()
    }
}

pub(crate) struct Worker {
    command_rx: Receiver<Command>,
    quit_rx: Receiver<()>,
    self_tx: Sender<Command>,
    exporters: Arc<ExporterRegistry>,
    reporting_period: Duration,
    measures: HashMap<String, Measure>,
    measure_views: HashMap<String, HashSet<String>>,
    views: HashMap<String, ViewState>,
    next_subscriber_id: u64,
}

impl Worker {
    pub(crate) fn new(
        command_rx: Receiver<Command>,
        quit_rx: Receiver<()>,
        self_tx: Sender<Command>,
        exporters: Arc<ExporterRegistry>,
        reporting_period: Duration,
    ) -> Self {
        Self {
            command_rx,
            quit_rx,
            self_tx,
            exporters,
            reporting_period,
            measures: HashMap::new(),
            measure_views: HashMap::new(),
            views: HashMap::new(),
            next_subscriber_id: 0,
        }
    }

    /// Drives the worker until the quit channel fires or every producer has dropped its
    /// command sender.
    pub(crate) fn run(mut self) {
        let mut ticker = crossbeam::channel::tick(self.reporting_period);
        loop {
            crossbeam::channel::select! {
                recv(self.command_rx) -> msg => {
                    match msg {
                        Ok(Command::SetReportingPeriod { period }) => {
                            let period = if period <= Duration::ZERO {
                                DEFAULT_REPORTING_PERIOD
                            } else {
                                period
                            };
                            self.reporting_period = period;
                            ticker = crossbeam::channel::tick(period);
                        }
                        Ok(command) => self.handle_command(command),
                        Err(_) => break,
                    }
                },
                recv(ticker) -> _ => self.on_tick(),
                recv(self.quit_rx) -> _ => {
                    while let Ok(command) = self.command_rx.try_recv() {
                        self.handle_command(command);
                    }
                    break;
                },
            }
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetReportingPeriod { .. } => unreachable!("handled in run()"),
            Command::RegisterMeasure { name, description, unit, kind, reply } => {
                let _ = reply.send(self.register_measure(name, description, unit, kind));
            }
            Command::DeleteMeasure { name, reply } => {
                let _ = reply.send(self.delete_measure(&name));
            }
            Command::FindMeasure { name, reply } => {
                let _ = reply.send(self.measures.get(&name).cloned());
            }
            Command::RegisterView { view, reply } => {
                let _ = reply.send(self.register_view(view));
            }
            Command::UnregisterView { name, reply } => {
                let _ = reply.send(self.unregister_view(&name));
            }
            Command::Subscribe { view_name, capacity, reply } => {
                let _ = reply.send(self.subscribe(view_name, capacity));
            }
            Command::Unsubscribe { view_name, subscriber_id } => {
                self.unsubscribe(&view_name, subscriber_id);
            }
            Command::ForceCollect { view_name, reply } => {
                let _ = reply.send(self.set_forced_collection(&view_name, true));
            }
            Command::StopForceCollect { view_name, reply } => {
                let _ = reply.send(self.set_forced_collection(&view_name, false));
            }
            Command::RetrieveData { view_name, reply } => {
                let _ = reply.send(self.retrieve_data(&view_name));
            }
            Command::Record { measurements, tag_map } => {
                self.record(&measurements, &tag_map);
            }
        }
    }

    fn register_measure(
        &mut self,
        name: String,
        description: String,
        unit: String,
        kind: crate::measure::MeasureKind,
    ) -> Result<Measure, MetricsError> {
        if let Some(existing) = self.measures.get(&name) {
            if existing.description() == description
                && existing.unit() == unit
                && existing.kind() == kind
            {
                return Ok(existing.clone());
            }
            return Err(MetricsError::AlreadyRegistered(format!(
                "measure {name:?} already registered with different attributes"
            )));
        }
        let measure = Measure::new(name.clone(), description, unit, kind)?;
        self.measures.insert(name, measure.clone());
        Ok(measure)
    }

    fn delete_measure(&mut self, name: &str) -> Result<(), MetricsError> {
        if !self.measures.contains_key(name) {
            return Err(MetricsError::NotFound(format!("measure {name:?} not found")));
        }
        if self.measure_views.get(name).is_some_and(|views| !views.is_empty()) {
            return Err(MetricsError::InUse(format!(
                "measure {name:?} is referenced by a registered view"
            )));
        }
        self.measures.remove(name);
        self.measure_views.remove(name);
        Ok(())
    }

    fn register_view(&mut self, view: View) -> Result<(), MetricsError> {
        if self.views.contains_key(view.name()) {
            return Err(MetricsError::AlreadyRegistered(format!(
                "view {:?} already registered",
                view.name()
            )));
        }
        self.measures.entry(view.measure().name().to_string()).or_insert_with(|| view.measure().clone());
        self.measure_views
            .entry(view.measure().name().to_string())
            .or_default()
            .insert(view.name().to_string());
        self.views.insert(
            view.name().to_string(),
            ViewState {
                view,
                collector: Collector::new(),
                subscribers: HashMap::new(),
                forced_collection: false,
                start_time: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn unregister_view(&mut self, name: &str) -> Result<(), MetricsError> {
        let Some(state) = self.views.get(name) else {
            return Err(MetricsError::NotFound(format!("view {name:?} not found")));
        };
        if state.is_collecting() {
            return Err(MetricsError::InUse(format!("view {name:?} is still collecting")));
        }
        let measure_name = state.view.measure().name().to_string();
        self.views.remove(name);
        if let Some(views) = self.measure_views.get_mut(&measure_name) {
            views.remove(name);
        }
        Ok(())
    }

    fn subscribe(
        &mut self,
        view_name: String,
        capacity: usize,
    ) -> Result<crate::export::Subscription, MetricsError> {
        let Some(state) = self.views.get_mut(&view_name) else {
            return Err(MetricsError::NotFound(format!("view {view_name:?} not found")));
        };
        let (tx, rx) = crossbeam::channel::bounded(capacity);
        let dropped = Arc::new(AtomicU64::new(0));
        let subscriber_id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        state.subscribers.insert(subscriber_id, (tx, dropped.clone()));
        Ok(crate::export::Subscription::new(
            Arc::from(view_name),
            subscriber_id,
            rx,
            dropped,
            self.self_tx.clone(),
        ))
    }

    fn unsubscribe(&mut self, view_name: &str, subscriber_id: u64) {
        if let Some(state) = self.views.get_mut(view_name) {
            state.subscribers.remove(&subscriber_id);
            if !state.is_collecting() {
                state.collector.clear();
            }
        }
    }

    fn set_forced_collection(&mut self, view_name: &str, forced: bool) -> Result<(), MetricsError> {
        let Some(state) = self.views.get_mut(view_name) else {
            return Err(MetricsError::NotFound(format!("view {view_name:?} not found")));
        };
        state.forced_collection = forced;
        if !state.is_collecting() {
            state.collector.clear();
        }
        Ok(())
    }

    fn retrieve_data(&mut self, view_name: &str) -> Result<ViewData, MetricsError> {
        let Some(state) = self.views.get_mut(view_name) else {
            return Err(MetricsError::NotFound(format!("view {view_name:?} not found")));
        };
        if !state.is_collecting() {
            return Err(MetricsError::NotCollecting(format!(
                "view {view_name:?} has no subscribers and no forced collection"
            )));
        }
        let rows: Vec<Row> = state.collector.collect_rows(&state.view, Instant::now());
        Ok(ViewData {
            view_name: Arc::from(view_name),
            start_time: state.start_time,
            end_time: SystemTime::now(),
            rows,
        })
    }

    fn record(&mut self, measurements: &[crate::measure::Measurement], tag_map: &crate::tags::TagMap) {
        let now = Instant::now();
        for measurement in measurements {
            let measure_name = measurement.measure().name();
            if !self.measures.contains_key(measure_name) {
                continue;
            }
            let Ok(value) = measurement.checked_value() else { continue };
            let Some(view_names) = self.measure_views.get(measure_name) else { continue };
            for view_name in view_names {
                if let Some(state) = self.views.get_mut(view_name) {
                    if state.is_collecting() {
                        state.collector.add_sample(&state.view, tag_map, value, now);
                    }
                }
            }
        }
    }

    fn on_tick(&mut self) {
        let now = Instant::now();
        for state in self.views.values_mut() {
            if !state.is_collecting() {
                continue;
            }
            let rows = state.collector.collect_rows(&state.view, now);
            let view_data = ViewData {
                view_name: Arc::from(state.view.name()),
                start_time: state.start_time,
                end_time: SystemTime::now(),
                rows,
            };
            for (sender, dropped) in state.subscribers.values() {
                if sender.try_send(view_data.clone()).is_err() {
                    dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            self.exporters.export_all(&view_data);
        }
    }
}
