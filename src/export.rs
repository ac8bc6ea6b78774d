//! Exporter fan-out: a copy-on-write registry of callbacks invoked on every reporting tick.

use crate::view::ViewData;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A sink that receives a snapshot of a view's rows on every reporting tick.
///
/// `export` runs synchronously on the worker thread between ticks, so implementations must
/// return quickly and must not retain `data` past the call — clone it first if asynchronous
/// work is needed, which is cheap since `ViewData` derives `Clone`.
pub trait Exporter: Send + Sync {
    /// A name used to identify this exporter for later `unregister_exporter` calls.
    fn name(&self) -> &str;

    /// Receives one view's tick-time snapshot.
    fn export(&self, data: &ViewData);
}

/// The exporter registry. Lives on the worker, consulted once per tick.
///
/// Registration and unregistration rebuild the whole vector under a short-lived mutex, then
/// publish it behind an `ArcSwap` so the worker's tick loop can load a stable snapshot
/// without contending with writers.
#[derive(Default)]
pub struct ExporterRegistry {
    exporters: ArcSwap<Vec<Arc<dyn Exporter>>>,
    write_lock: Mutex<()>,
}

impl ExporterRegistry {
    /// Returns a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { exporters: ArcSwap::from_pointee(Vec::new()), write_lock: Mutex::new(()) }
    }

    /// Adds `exporter` to the registry.
    pub fn register(&self, exporter: Arc<dyn Exporter>) {
        let _guard = self.write_lock.lock();
        let mut next = (**self.exporters.load()).clone();
        next.push(exporter);
        self.exporters.store(Arc::new(next));
    }

    /// Removes the exporter named `name`, if any.
    pub fn unregister(&self, name: &str) {
        let _guard = self.write_lock.lock();
        let mut next = (**self.exporters.load()).clone();
        next.retain(|e| e.name() != name);
        self.exporters.store(Arc::new(next));
    }

    /// Loads the current snapshot and calls every exporter's `export` with `data`.
    pub fn export_all(&self, data: &ViewData) {
        for exporter in self.exporters.load().iter() {
            exporter.export(data);
        }
    }
}

/// A live registration on a view's tick-time output stream.
///
/// Dropping the subscription unsubscribes from the view. Holds a receiver the worker sends
/// `ViewData` to via non-blocking `try_send`; [`Subscription::dropped_count`] reports how many
/// sends were skipped because the channel was full.
pub struct Subscription {
    view_name: Arc<str>,
    subscriber_id: u64,
    receiver: crossbeam::channel::Receiver<ViewData>,
    dropped: Arc<AtomicU64>,
    commands: Option<crossbeam::channel::Sender<crate::recorder::commands::Command>>,
}

impl Subscription {
    pub(crate) fn new(
        view_name: Arc<str>,
        subscriber_id: u64,
        receiver: crossbeam::channel::Receiver<ViewData>,
        dropped: Arc<AtomicU64>,
        commands: crossbeam::channel::Sender<crate::recorder::commands::Command>,
    ) -> Self {
        Self { view_name, subscriber_id, receiver, dropped, commands: Some(commands) }
    }

    /// Blocks until the next `ViewData` snapshot arrives, or returns `None` if the worker has
    /// shut down and no more snapshots will ever arrive.
    pub fn recv(&self) -> Option<ViewData> {
        self.receiver.recv().ok()
    }

    /// Returns the next snapshot if one is already queued, without blocking.
    pub fn try_recv(&self) -> Option<ViewData> {
        self.receiver.try_recv().ok()
    }

    /// The number of snapshots dropped because this subscriber's channel was full at tick
    /// time.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// The view this subscription observes.
    #[must_use]
    pub fn view_name(&self) -> &str {
        &self.view_name
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.take() {
            let _ = commands.try_send(crate::recorder::commands::Command::Unsubscribe {
                view_name: self.view_name.clone(),
                subscriber_id: self.subscriber_id,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingExporter {
        name: String,
        seen: StdMutex<Vec<String>>,
    }

    impl Exporter for RecordingExporter {
        fn name(&self) -> &str {
            &self.name
        }

        fn export(&self, data: &ViewData) {
            self.seen.lock().unwrap().push(data.view_name.to_string());
        }
    }

    #[test]
    fn registered_exporters_receive_every_export() {
        let registry = ExporterRegistry::new();
        let exporter =
            Arc::new(RecordingExporter { name: "test".into(), seen: StdMutex::new(Vec::new()) });
        registry.register(exporter.clone());

        let data = ViewData {
            view_name: Arc::from("requests"),
            start_time: std::time::SystemTime::now(),
            end_time: std::time::SystemTime::now(),
            rows: vec![],
        };
        registry.export_all(&data);
        assert_eq!(exporter.seen.lock().unwrap().as_slice(), ["requests"]);
    }

    #[test]
    fn unregistering_stops_future_exports() {
        let registry = ExporterRegistry::new();
        let exporter =
            Arc::new(RecordingExporter { name: "test".into(), seen: StdMutex::new(Vec::new()) });
        registry.register(exporter.clone());
        registry.unregister("test");

        let data = ViewData {
            view_name: Arc::from("requests"),
            start_time: std::time::SystemTime::now(),
            end_time: std::time::SystemTime::now(),
            rows: vec![],
        };
        registry.export_all(&data);
        assert!(exporter.seen.lock().unwrap().is_empty());
    }
}
