/// Records one or more measurements against a recorder in a single call.
///
/// A thin convenience over [`StatsRecorder::record`](crate::StatsRecorder::record): it just
/// collects its arguments into a slice, so it costs nothing beyond what calling `record`
/// directly would.
///
/// # Examples
///
/// ```
/// use statsview::{record, Measurement, MeasureKind, StatsRecorder};
///
/// let recorder = StatsRecorder::new();
/// let latency = recorder.new_measure("latency_ms", "", "ms", MeasureKind::Int64).unwrap();
///
/// record!(recorder, Measurement::int64(&latency, 42));
/// ```
#[macro_export]
macro_rules! record {
    ($recorder:expr, $($measurement:expr),+ $(,)?) => {
        $recorder.record(&[$($measurement),+])
    };
}
