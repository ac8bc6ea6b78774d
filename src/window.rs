//! Window aggregators: how an aggregation accumulates and ages out samples over time.

use crate::aggregation::{AggregationData, AggregationKind};
use std::time::{Duration, Instant};

/// One bucket in a sliding-time window's ring.
///
/// `slot` is the index (since the window's anchor, counted in `sub_duration`-wide steps) of
/// the interval this bucket currently holds data for. A bucket whose `slot` doesn't match the
/// slot a caller expects to find there is stale — it holds a previous occupant's leftovers and
/// must be treated as empty rather than read.
#[derive(Clone, Debug)]
struct Bucket {
    slot: i64,
    data: AggregationData,
}

/// Sentinel `slot` for a bucket that has never been written to.
const NEVER_WRITTEN: i64 = i64::MIN;

/// How a window aggregator folds and ages samples.
///
/// A closed enum, not a `dyn Trait`: the two window shapes are fixed and their collection
/// semantics (notably the documented distribution/scalar asymmetry in [`Self::collect`]) are
/// meant to be read directly off this type, not discovered through a trait object.
#[derive(Clone, Debug)]
pub enum WindowAggregator {
    /// A single aggregation instance that accumulates until explicitly reset.
    Cumulative(AggregationData),
    /// A ring of `N+1` buckets covering a total duration, approximating a moving window.
    SlidingTime(SlidingTime),
}

/// Ring-buffer state backing [`WindowAggregator::SlidingTime`].
///
/// The ring has `bucket_count` buckets of width `sub_duration = duration / (bucket_count - 1)`.
/// Real time is mapped onto the ring by dividing the time elapsed since `anchor` into
/// `sub_duration`-wide slots and addressing bucket `slot.rem_euclid(bucket_count)`; a slot
/// number is reused by the ring every `bucket_count` slots, so a bucket's stored `slot` is what
/// tells apart its current data from a stale previous occupant's.
#[derive(Clone, Debug)]
pub struct SlidingTime {
    kind: AggregationKind,
    buckets: Vec<Bucket>,
    anchor: Instant,
    sub_duration: Duration,
}

impl SlidingTime {
    fn new(kind: AggregationKind, duration: Duration, bucket_count: usize, now: Instant) -> Self {
        assert!(bucket_count >= 2, "sliding window needs at least one interval (N >= 1)");
        let sub_duration = duration / (bucket_count as u32 - 1);
        let buckets = (0..bucket_count)
            .map(|_| Bucket { slot: NEVER_WRITTEN, data: kind.new_data() })
            .collect();
        Self { kind, buckets, anchor: now, sub_duration }
    }

    fn ring_len(&self) -> i64 {
        self.buckets.len() as i64
    }

    fn slot_for(&self, now: Instant) -> i64 {
        let elapsed = now.saturating_duration_since(self.anchor).as_secs_f64();
        (elapsed / self.sub_duration.as_secs_f64()).floor() as i64
    }

    fn index_for(&self, slot: i64) -> usize {
        slot.rem_euclid(self.ring_len()) as usize
    }

    /// Returns the index of the bucket for `slot`, resetting it first if it currently holds a
    /// different (necessarily stale) slot's data.
    fn ensure_slot(&mut self, slot: i64) -> usize {
        let idx = self.index_for(slot);
        if self.buckets[idx].slot != slot {
            self.buckets[idx].data = self.kind.new_data();
            self.buckets[idx].slot = slot;
        }
        idx
    }

    fn add_sample(&mut self, v: f64, now: Instant) {
        let slot = self.slot_for(now);
        let idx = self.ensure_slot(slot);
        self.buckets[idx].data.add_sample(v);
    }

    fn collect(&self, now: Instant) -> AggregationData {
        let ring_len = self.ring_len();
        let current_slot = self.slot_for(now);

        let elapsed = now.saturating_duration_since(self.anchor).as_secs_f64();
        let sub_secs = self.sub_duration.as_secs_f64();
        let within_current = elapsed - (current_slot as f64) * sub_secs;
        let remaining = ((sub_secs - within_current) / sub_secs).clamp(0.0, 1.0);

        let oldest_slot = current_slot - (ring_len - 1);
        let oldest_idx = self.index_for(oldest_slot);
        let oldest = &self.buckets[oldest_idx];
        let oldest_data =
            if oldest.slot == oldest_slot { oldest.data.clone() } else { self.kind.new_data() };

        let mut result = match &oldest_data {
            AggregationData::Distribution(_) => oldest_data,
            _ => oldest_data.scaled(remaining),
        };
        for offset in 1..ring_len {
            let slot = oldest_slot + offset;
            let idx = self.index_for(slot);
            let bucket = &self.buckets[idx];
            if bucket.slot == slot {
                result.merge(&bucket.data);
            }
        }
        result
    }

    fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.data.clear();
            bucket.slot = NEVER_WRITTEN;
        }
    }
}

impl WindowAggregator {
    /// Builds a cumulative window around a freshly-constructed aggregation instance.
    #[must_use]
    pub fn cumulative(kind: &AggregationKind) -> Self {
        Self::Cumulative(kind.new_data())
    }

    /// Builds a sliding-time window with `bucket_count` ring buckets spanning `duration` in
    /// total, anchored at `now`.
    #[must_use]
    pub fn sliding_time(
        kind: &AggregationKind,
        duration: Duration,
        bucket_count: usize,
        now: Instant,
    ) -> Self {
        Self::SlidingTime(SlidingTime::new(kind.clone(), duration, bucket_count, now))
    }

    /// Folds one sample in at time `now`.
    pub fn add_sample(&mut self, v: f64, now: Instant) {
        match self {
            Self::Cumulative(data) => data.add_sample(v),
            Self::SlidingTime(sliding) => sliding.add_sample(v, now),
        }
    }

    /// Produces a snapshot of the accumulated aggregation as of `now`.
    ///
    /// For cumulative windows this is a plain clone. For sliding-time windows, all buckets
    /// still within the ring's span are merged together; the oldest bucket's value is scaled by
    /// its remaining fraction of a sub-interval for every scalar aggregation kind — but **not**
    /// for distributions, whose oldest bucket is merged in unscaled because fractionally
    /// scaling min/max/variance/buckets has no well-defined meaning. This asymmetry is
    /// intentional and mirrors the upstream behavior being reproduced here.
    #[must_use]
    pub fn collect(&mut self, now: Instant) -> AggregationData {
        match self {
            Self::Cumulative(data) => data.clone(),
            Self::SlidingTime(sliding) => sliding.collect(now),
        }
    }

    /// Resets this window to its zero state. Only ever called on explicit view deactivation.
    pub fn clear(&mut self) {
        match self {
            Self::Cumulative(data) => data.clear(),
            Self::SlidingTime(sliding) => sliding.clear(),
        }
    }
}
