//! Per-view collector: the signature-to-window-aggregator map that actually holds samples.

use crate::tags::TagMap;
use crate::view::{Row, View, WindowSpec};
use crate::window::WindowAggregator;
use std::collections::HashMap;
use std::time::Instant;

/// Owns one view's `tag-signature -> window-aggregator` map.
///
/// Lives entirely on the worker thread: nothing here is shared or synchronized, since the
/// worker is the sole owner and sole mutator of every collector.
#[derive(Debug, Default)]
pub struct Collector {
    aggregators: HashMap<Vec<u8>, WindowAggregator>,
}

impl Collector {
    /// Returns a new, empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a sample into the aggregator for `tag_map`'s signature under `view`, creating
    /// that aggregator via the view's window/aggregation factory on first use.
    pub fn add_sample(&mut self, view: &View, tag_map: &TagMap, v: f64, now: Instant) {
        let sig = tag_map.encode(view.tag_keys());
        let aggregator = self.aggregators.entry(sig).or_insert_with(|| match view.window() {
            WindowSpec::Cumulative => WindowAggregator::cumulative(view.aggregation()),
            WindowSpec::SlidingTime { duration, bucket_count } => {
                WindowAggregator::sliding_time(view.aggregation(), *duration, *bucket_count, now)
            }
        });
        aggregator.add_sample(v, now);
    }

    /// Snapshots every known signature into a `Row`, decoding each signature back into a tag
    /// list ordered by `view`'s key list.
    pub fn collect_rows(&mut self, view: &View, now: Instant) -> Vec<Row> {
        self.aggregators
            .iter_mut()
            .map(|(sig, aggregator)| {
                let tag_map = TagMap::decode(sig, view.tag_keys());
                let tags = view
                    .tag_keys()
                    .iter()
                    .filter_map(|key| {
                        tag_map
                            .value(key)
                            .map(|value| crate::tags::Tag::new(key.clone(), value))
                    })
                    .collect();
                Row { tags, data: aggregator.collect(now) }
            })
            .collect()
    }

    /// Clears every known aggregator in place, freeing no memory but zeroing all state.
    /// Called when a view transitions from collecting to non-collecting.
    pub fn clear(&mut self) {
        for aggregator in self.aggregators.values_mut() {
            aggregator.clear();
        }
    }

    /// Returns the number of distinct tag-signatures currently tracked.
    #[must_use]
    pub fn signature_count(&self) -> usize {
        self.aggregators.len()
    }
}
