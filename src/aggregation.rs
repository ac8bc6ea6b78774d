//! The aggregation kinds a view can fold samples into.
//!
//! `AggregationData` is a small, closed enum rather than a `dyn Trait` — there is no
//! extension point for third-party aggregation kinds, matching the fixed set OpenCensus-style
//! stats systems support.

use crate::MetricsError;

/// A validated, strictly increasing set of distribution bucket boundaries.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds(Vec<f64>);

impl Bounds {
    /// Validates and wraps `bounds`.
    ///
    /// # Errors
    /// Returns [`MetricsError::InvalidArgument`] if `bounds` is empty or not strictly
    /// increasing.
    pub fn new(bounds: Vec<f64>) -> Result<Self, MetricsError> {
        if bounds.is_empty() {
            return Err(MetricsError::InvalidArgument(
                "distribution bounds must not be empty".into(),
            ));
        }
        if !bounds.windows(2).all(|w| w[0] < w[1]) {
            return Err(MetricsError::InvalidArgument(
                "distribution bounds must be strictly increasing".into(),
            ));
        }
        Ok(Self(bounds))
    }

    /// Returns the underlying boundary slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    fn bucket_count(&self) -> usize {
        self.0.len() + 1
    }

    fn bucket_for(&self, v: f64) -> usize {
        match self.0.binary_search_by(|b| b.total_cmp(&v)) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

/// A factory describing how to build a fresh [`AggregationData`] instance for a new
/// tag-signature bucket. Carried by a view so its collector can lazily materialize
/// aggregators on first sample.
#[derive(Clone, Debug)]
pub enum AggregationKind {
    /// Counts samples.
    Count,
    /// Sums samples.
    Sum,
    /// Tracks count and running mean via Welford's algorithm.
    Mean,
    /// Tracks a full distribution: count, min, max, mean, variance, and bucketed counts.
    Distribution(Bounds),
    /// Tracks only the most recently observed value.
    LastValue,
}

impl AggregationKind {
    /// Builds a fresh, zeroed data instance for this kind.
    #[must_use]
    pub fn new_data(&self) -> AggregationData {
        match self {
            Self::Count => AggregationData::Count(0),
            Self::Sum => AggregationData::Sum(0.0),
            Self::Mean => AggregationData::Mean { count: 0, mean: 0.0 },
            Self::Distribution(bounds) => AggregationData::Distribution(DistributionData {
                count: 0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
                mean: 0.0,
                sum_of_squared_dev: 0.0,
                bucket_counts: vec![0; bounds.bucket_count()],
                bounds: bounds.clone(),
            }),
            Self::LastValue => AggregationData::LastValue(0.0),
        }
    }
}

/// The accumulated state of one aggregation over some window of samples.
#[derive(Clone, Debug, PartialEq)]
pub enum AggregationData {
    /// Number of samples observed.
    Count(u64),
    /// Running sum of sample values.
    Sum(f64),
    /// Count and incrementally-maintained mean.
    Mean {
        /// Number of samples folded into `mean`.
        count: u64,
        /// The running mean.
        mean: f64,
    },
    /// Full distribution statistics.
    Distribution(DistributionData),
    /// The most recently observed sample.
    LastValue(f64),
}

/// Distribution aggregation state: count, extrema, Welford mean/variance accumulators, and
/// per-bucket counts over [`Bounds`].
#[derive(Clone, Debug, PartialEq)]
pub struct DistributionData {
    /// Number of samples observed.
    pub count: u64,
    /// Smallest sample observed, or `f64::INFINITY` if none.
    pub min: f64,
    /// Largest sample observed, or `f64::NEG_INFINITY` if none.
    pub max: f64,
    /// Running mean, maintained via Welford's algorithm.
    pub mean: f64,
    /// Running sum of squared deviations from the mean, maintained via Welford's algorithm.
    pub sum_of_squared_dev: f64,
    /// Per-bucket sample counts; `bucket_counts.len() == bounds.as_slice().len() + 1`.
    pub bucket_counts: Vec<u64>,
    /// The bucket boundaries this distribution was constructed with.
    pub bounds: Bounds,
}

impl DistributionData {
    /// Sample variance. Zero until at least two samples have been observed.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count > 1 {
            self.sum_of_squared_dev / (self.count - 1) as f64
        } else {
            0.0
        }
    }

    fn add_sample(&mut self, v: f64) {
        self.count += 1;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        let old_mean = self.mean;
        self.mean += (v - old_mean) / self.count as f64;
        self.sum_of_squared_dev += (v - old_mean) * (v - self.mean);
        let bucket = self.bounds.bucket_for(v);
        self.bucket_counts[bucket] += 1;
    }

    /// Combines `other` into `self` using the Chan-style parallel combination formula.
    ///
    /// Used to fold the oldest sliding-window bucket into a collected result without
    /// re-walking individual samples.
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let count_a = self.count as f64;
        let count_b = other.count as f64;
        let sum_a = self.mean * count_a;
        let sum_b = other.mean * count_b;
        let delta = other.mean - self.mean;
        let total = count_a + count_b;
        self.sum_of_squared_dev +=
            other.sum_of_squared_dev + delta * delta * (count_a * count_b) / total;
        self.mean = (sum_a + sum_b) / total;
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        for (a, b) in self.bucket_counts.iter_mut().zip(&other.bucket_counts) {
            *a += b;
        }
    }
}

impl AggregationData {
    /// Folds one sample into this aggregation.
    pub fn add_sample(&mut self, v: f64) {
        match self {
            Self::Count(count) => *count += 1,
            Self::Sum(sum) => *sum += v,
            Self::Mean { count, mean } => {
                *count += 1;
                *mean += (v - *mean) / *count as f64;
            }
            Self::Distribution(data) => data.add_sample(v),
            Self::LastValue(last) => *last = v,
        }
    }

    /// Resets this aggregation to its zero state, preserving distribution bounds if any.
    pub fn clear(&mut self) {
        match self {
            Self::Count(count) => *count = 0,
            Self::Sum(sum) => *sum = 0.0,
            Self::Mean { count, mean } => {
                *count = 0;
                *mean = 0.0;
            }
            Self::Distribution(data) => {
                data.count = 0;
                data.min = f64::INFINITY;
                data.max = f64::NEG_INFINITY;
                data.mean = 0.0;
                data.sum_of_squared_dev = 0.0;
                data.bucket_counts.iter_mut().for_each(|c| *c = 0);
            }
            Self::LastValue(last) => *last = 0.0,
        }
    }

    /// Scales scalar aggregation kinds by `factor`. Distribution is a panicking no-op callers
    /// must not invoke: its sliding-window collapse sums the oldest bucket unscaled instead
    /// (see [`crate::window::WindowAggregator::collect`]).
    ///
    /// Per the sliding-window collect rule, `LastValue` is scaled along with the other scalar
    /// kinds rather than passed through unchanged.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        match self {
            Self::Count(count) => Self::Count((*count as f64 * factor).round() as u64),
            Self::Sum(sum) => Self::Sum(sum * factor),
            Self::Mean { count, mean } => {
                Self::Mean { count: (*count as f64 * factor).round() as u64, mean: *mean }
            }
            Self::LastValue(last) => Self::LastValue(last * factor),
            Self::Distribution(_) => {
                unreachable!("distribution aggregation is never scaled, only merged whole")
            }
        }
    }

    /// Merges `other`'s state into `self`.
    ///
    /// For scalar kinds this is an unweighted sum of counts/sums and a count-weighted
    /// recombination of means; for distributions it is the Chan-style combination in
    /// [`DistributionData::merge`].
    pub fn merge(&mut self, other: &Self) {
        match (self, other) {
            (Self::Count(a), Self::Count(b)) => *a += b,
            (Self::Sum(a), Self::Sum(b)) => *a += b,
            (Self::Mean { count: ca, mean: ma }, Self::Mean { count: cb, mean: mb }) => {
                let total = *ca + cb;
                if total > 0 {
                    *ma = (*ma * *ca as f64 + mb * *cb as f64) / total as f64;
                }
                *ca = total;
            }
            (Self::Distribution(a), Self::Distribution(b)) => a.merge(b),
            (Self::LastValue(a), Self::LastValue(b)) => *a = *b,
            (a, b) => unreachable!("cannot merge mismatched aggregation kinds: {a:?} vs {b:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_reject_non_increasing() {
        assert!(Bounds::new(vec![1.0, 1.0]).is_err());
        assert!(Bounds::new(vec![2.0, 1.0]).is_err());
        assert!(Bounds::new(vec![]).is_err());
        assert!(Bounds::new(vec![0.0, 5.0, 10.0]).is_ok());
    }

    #[test]
    fn distribution_buckets_sum_to_count() {
        let bounds = Bounds::new(vec![0.0, 5.0, 10.0]).unwrap();
        let mut data = AggregationKind::Distribution(bounds).new_data();
        for v in [-1.0, 0.0, 3.0, 5.0, 7.0, 10.0, 20.0] {
            data.add_sample(v);
        }
        if let AggregationData::Distribution(d) = &data {
            assert_eq!(d.bucket_counts.iter().sum::<u64>(), 7);
            assert_eq!(d.count, 7);
            assert_eq!(d.min, -1.0);
            assert_eq!(d.max, 20.0);
        } else {
            panic!("expected distribution");
        }
    }

    #[test]
    fn welford_mean_matches_simple_average() {
        let mut data = AggregationKind::Mean.new_data();
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        for v in samples {
            data.add_sample(v);
        }
        let AggregationData::Mean { count, mean } = data else { panic!("expected mean") };
        assert_eq!(count, samples.len() as u64);
        let expected = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((mean - expected).abs() < 1e-9);
    }

    #[test]
    fn welford_variance_matches_two_pass_variance() {
        let bounds = Bounds::new(vec![100.0]).unwrap();
        let mut data = AggregationKind::Distribution(bounds).new_data();
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        for v in samples {
            data.add_sample(v);
        }
        let AggregationData::Distribution(d) = data else { panic!("expected distribution") };
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let two_pass_variance =
            samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert!((d.variance() - two_pass_variance).abs() < 1e-6);
    }

    #[test]
    fn merging_distributions_matches_combined_samples() {
        let bounds = Bounds::new(vec![5.0]).unwrap();
        let mut a = AggregationKind::Distribution(bounds.clone()).new_data();
        let mut b = AggregationKind::Distribution(bounds).new_data();
        for v in [1.0, 2.0, 3.0] {
            a.add_sample(v);
        }
        for v in [4.0, 5.0, 6.0] {
            b.add_sample(v);
        }
        let AggregationData::Distribution(mut da) = a else { panic!() };
        let AggregationData::Distribution(db) = b else { panic!() };
        da.merge(&db);

        let bounds = Bounds::new(vec![5.0]).unwrap();
        let mut combined = AggregationKind::Distribution(bounds).new_data();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0] {
            combined.add_sample(v);
        }
        let AggregationData::Distribution(expected) = combined else { panic!() };

        assert_eq!(da.count, expected.count);
        assert!((da.mean - expected.mean).abs() < 1e-9);
        assert!((da.variance() - expected.variance()).abs() < 1e-6);
        assert_eq!(da.bucket_counts, expected.bucket_counts);
    }

    #[test]
    fn count_is_monotonic_within_a_window() {
        let mut data = AggregationKind::Count.new_data();
        let mut last = 0u64;
        for _ in 0..10 {
            data.add_sample(1.0);
            let AggregationData::Count(count) = data else { unreachable!() };
            assert!(count >= last);
            last = count;
        }
    }

    #[test]
    fn sum_matches_upstream_semantics() {
        let mut data = AggregationKind::Sum.new_data();
        for v in [1.0, 2.0, 3.5] {
            data.add_sample(v);
        }
        assert_eq!(data, AggregationData::Sum(6.5));
    }

    #[test]
    fn last_value_tracks_latest_sample() {
        let mut data = AggregationKind::LastValue.new_data();
        for v in [1.0, 2.0, 42.0] {
            data.add_sample(v);
        }
        assert_eq!(data, AggregationData::LastValue(42.0));
    }
}
