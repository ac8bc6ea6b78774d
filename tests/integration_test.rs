use statsview::tags::{context, Key, Tag, TagMap, TagMutator};
use statsview::{
    AggregationData, AggregationKind, Bounds, MeasureKind, Measurement, MetricsError,
    StatsRecorder, WindowSpec,
};
use std::time::{Duration, Instant};

fn wait_for<T>(mut poll: impl FnMut() -> Option<T>, timeout: Duration) -> Option<T> {
    let start = Instant::now();
    loop {
        if let Some(value) = poll() {
            return Some(value);
        }
        if start.elapsed() > timeout {
            return None;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn fast_recorder() -> StatsRecorder {
    let recorder = StatsRecorder::new();
    recorder.set_reporting_period(Duration::from_millis(30));
    recorder
}

#[test]
fn single_count_single_tag() {
    let recorder = fast_recorder();
    let measure = recorder.new_measure("requests", "", "1", MeasureKind::Int64).unwrap();
    let method = Key::new("method").unwrap();
    let view = recorder
        .new_view(
            "requests_total",
            "",
            measure.clone(),
            vec![method.clone()],
            AggregationKind::Count,
            WindowSpec::Cumulative,
        )
        .unwrap();
    let subscription = recorder.subscribe(view.name()).unwrap();

    let tag_map =
        TagMap::new(&TagMap::empty(), [TagMutator::Upsert(Tag::new(method, "GET"))]).unwrap();
    let _guard = context::attach_tag_map(tag_map);
    recorder.record(&[Measurement::int64(&measure, 1)]);
    recorder.record(&[Measurement::int64(&measure, 1)]);

    let data = wait_for(|| subscription.try_recv(), Duration::from_secs(2)).unwrap();
    assert_eq!(data.rows.len(), 1);
    match &data.rows[0].data {
        AggregationData::Count(count) => assert_eq!(*count, 2),
        other => panic!("expected count, got {other:?}"),
    }
}

#[test]
fn distribution_with_fixed_bounds() {
    let recorder = fast_recorder();
    let measure = recorder.new_measure("payload_bytes", "", "By", MeasureKind::Int64).unwrap();
    let bounds = Bounds::new(vec![0.0, 5.0, 10.0]).unwrap();
    let view = recorder
        .new_view(
            "payload_bytes_dist",
            "",
            measure.clone(),
            vec![],
            AggregationKind::Distribution(bounds),
            WindowSpec::Cumulative,
        )
        .unwrap();
    let subscription = recorder.subscribe(view.name()).unwrap();

    for v in [-1, 2, 6, 11] {
        recorder.record(&[Measurement::int64(&measure, v)]);
    }

    let data = wait_for(|| subscription.try_recv(), Duration::from_secs(2)).unwrap();
    assert_eq!(data.rows.len(), 1);
    match &data.rows[0].data {
        AggregationData::Distribution(d) => {
            assert_eq!(d.count, 4);
            assert_eq!(d.bucket_counts.iter().sum::<u64>(), 4);
        }
        other => panic!("expected distribution, got {other:?}"),
    }
}

#[test]
fn two_tag_keys_with_same_values_collapse_to_one_row() {
    let recorder = fast_recorder();
    let measure = recorder.new_measure("work_items", "", "1", MeasureKind::Int64).unwrap();
    let region = Key::new("region").unwrap();
    let shard = Key::new("shard").unwrap();
    let view = recorder
        .new_view(
            "work_items_total",
            "",
            measure.clone(),
            vec![region.clone(), shard.clone()],
            AggregationKind::Count,
            WindowSpec::Cumulative,
        )
        .unwrap();
    let subscription = recorder.subscribe(view.name()).unwrap();

    let map_a = TagMap::new(
        &TagMap::empty(),
        [
            TagMutator::Upsert(Tag::new(region.clone(), "us")),
            TagMutator::Upsert(Tag::new(shard.clone(), "1")),
        ],
    )
    .unwrap();
    let map_b = TagMap::new(
        &TagMap::empty(),
        [
            TagMutator::Upsert(Tag::new(shard.clone(), "1")),
            TagMutator::Upsert(Tag::new(region.clone(), "us")),
        ],
    )
    .unwrap();

    {
        let _guard = context::attach_tag_map(map_a);
        recorder.record(&[Measurement::int64(&measure, 1)]);
    }
    {
        let _guard = context::attach_tag_map(map_b);
        recorder.record(&[Measurement::int64(&measure, 1)]);
    }

    let data = wait_for(|| subscription.try_recv(), Duration::from_secs(2)).unwrap();
    assert_eq!(data.rows.len(), 1);
    match &data.rows[0].data {
        AggregationData::Count(count) => assert_eq!(*count, 2),
        other => panic!("expected count, got {other:?}"),
    }
}

#[test]
fn sliding_window_decays_old_samples() {
    let recorder = fast_recorder();
    let measure = recorder.new_measure("hits", "", "1", MeasureKind::Int64).unwrap();
    let view = recorder
        .new_view(
            "hits_sliding",
            "",
            measure.clone(),
            vec![],
            AggregationKind::Count,
            WindowSpec::SlidingTime { duration: Duration::from_millis(80), bucket_count: 5 },
        )
        .unwrap();

    recorder.force_collect(view.name()).unwrap();
    recorder.record(&[Measurement::int64(&measure, 1)]);
    recorder.record(&[Measurement::int64(&measure, 1)]);

    // Well past duration (80ms) plus a sub-interval (20ms), so the samples have
    // unambiguously rolled out of the window.
    std::thread::sleep(Duration::from_millis(250));

    let data = recorder.retrieve_data(view.name()).unwrap();
    match &data.rows.first().map(|r| &r.data) {
        Some(AggregationData::Count(count)) => assert_eq!(*count, 0),
        None => {}
        other => panic!("expected a decayed count row, got {other:?}"),
    }
}

#[test]
fn sliding_window_retains_sample_before_it_decays() {
    let recorder = fast_recorder();
    let measure = recorder.new_measure("hits", "", "1", MeasureKind::Int64).unwrap();
    let view = recorder
        .new_view(
            "hits_sliding_retain",
            "",
            measure.clone(),
            vec![],
            AggregationKind::Count,
            // duration=100ms, bucket_count=5 => sub_duration=25ms, so D - sub = 75ms.
            WindowSpec::SlidingTime { duration: Duration::from_millis(100), bucket_count: 5 },
        )
        .unwrap();

    recorder.force_collect(view.name()).unwrap();
    recorder.record(&[Measurement::int64(&measure, 1)]);

    // Comfortably less than D - sub (75ms), so the sample must still be in the window.
    std::thread::sleep(Duration::from_millis(40));

    let data = recorder.retrieve_data(view.name()).unwrap();
    match &data.rows.first().map(|r| &r.data) {
        Some(AggregationData::Count(count)) => {
            assert!(*count >= 1, "sample younger than the window duration must still be counted")
        }
        other => panic!("expected a retained count row, got {other:?}"),
    }
}

#[test]
fn subscribe_tick_unsubscribe_cycle() {
    let recorder = fast_recorder();
    let measure = recorder.new_measure("events", "", "1", MeasureKind::Int64).unwrap();
    let view = recorder
        .new_view(
            "events_total",
            "",
            measure.clone(),
            vec![],
            AggregationKind::Count,
            WindowSpec::Cumulative,
        )
        .unwrap();

    let subscription = recorder.subscribe(view.name()).unwrap();
    recorder.record(&[Measurement::int64(&measure, 1)]);
    let data = wait_for(|| subscription.try_recv(), Duration::from_secs(2)).unwrap();
    assert_eq!(data.rows.len(), 1);

    drop(subscription);

    // Give the worker a moment to process the Unsubscribe command before asserting.
    std::thread::sleep(Duration::from_millis(100));
    let result = recorder.retrieve_data(view.name());
    assert!(matches!(result, Err(MetricsError::NotCollecting(_))));
}

#[test]
fn measure_deletion_is_blocked_while_a_view_references_it() {
    let recorder = StatsRecorder::new();
    let measure = recorder.new_measure("depth", "", "1", MeasureKind::Int64).unwrap();
    let view = recorder
        .new_view(
            "depth_view",
            "",
            measure,
            vec![],
            AggregationKind::LastValue,
            WindowSpec::Cumulative,
        )
        .unwrap();

    let result = recorder.delete_measure("depth");
    assert!(matches!(result, Err(MetricsError::InUse(_))));

    recorder.unregister_view(view.name()).unwrap();
    recorder.delete_measure("depth").unwrap();
}
