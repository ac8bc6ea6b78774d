//! Measures: the typed, named quantities that raw samples are recorded against.

use crate::MetricsError;
use std::sync::Arc;

/// The numeric representation a [`Measure`] accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MeasureKind {
    /// Samples are recorded as signed 64-bit integers.
    Int64,
    /// Samples are recorded as 64-bit floats.
    Float64,
}

/// A single recorded value, tagged by which [`MeasureKind`] produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MeasurementValue {
    /// An integer sample.
    Int64(i64),
    /// A floating-point sample.
    Float64(f64),
}

impl MeasurementValue {
    /// Widens the measurement to `f64` for aggregation, regardless of its original kind.
    #[must_use]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int64(v) => *v as f64,
            Self::Float64(v) => *v,
        }
    }
}

/// A named, typed quantity that measurements are recorded against.
///
/// A `Measure` only describes what is being recorded (name, unit, kind); it carries no
/// aggregation behavior of its own. Aggregation is a property of the [`crate::View`]s that
/// observe a measure, not of the measure itself.
#[derive(Clone, Debug)]
pub struct Measure {
    name: Arc<str>,
    description: Arc<str>,
    unit: Arc<str>,
    kind: MeasureKind,
}

/// Maximum number of bytes allowed in a measure name.
pub const MAX_MEASURE_NAME_LENGTH: usize = 255;

impl Measure {
    /// Creates a new measure.
    ///
    /// # Errors
    /// Returns [`MetricsError::InvalidArgument`] if `name` is empty or exceeds
    /// [`MAX_MEASURE_NAME_LENGTH`] bytes.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        unit: impl Into<String>,
        kind: MeasureKind,
    ) -> Result<Self, MetricsError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MetricsError::InvalidArgument("measure name must not be empty".into()));
        }
        if name.len() > MAX_MEASURE_NAME_LENGTH {
            return Err(MetricsError::InvalidArgument(format!(
                "measure name {name:?} exceeds {MAX_MEASURE_NAME_LENGTH} bytes"
            )));
        }
        Ok(Self {
            name: Arc::from(name),
            description: Arc::from(description.into()),
            unit: Arc::from(unit.into()),
            kind,
        })
    }

    /// The measure's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A human-readable description, used by exporters that surface metadata.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The measure's unit string, e.g. `"ms"` or `"By"`.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// The numeric kind samples are expected to arrive in.
    #[must_use]
    pub fn kind(&self) -> MeasureKind {
        self.kind
    }

    /// Validates that `value`'s kind matches this measure's declared kind, returning the
    /// widened `f64` sample on success.
    ///
    /// # Errors
    /// Returns [`MetricsError::InvalidArgument`] on a kind mismatch.
    pub fn checked_sample(&self, value: MeasurementValue) -> Result<f64, MetricsError> {
        match (self.kind, value) {
            (MeasureKind::Int64, MeasurementValue::Int64(_))
            | (MeasureKind::Float64, MeasurementValue::Float64(_)) => Ok(value.as_f64()),
            _ => Err(MetricsError::InvalidArgument(format!(
                "measure {:?} expects {:?} samples",
                self.name, self.kind
            ))),
        }
    }
}

impl PartialEq for Measure {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Measure {}

/// A transient `(measure, value)` pair produced by a caller and consumed by a single
/// `record` call.
///
/// Construct via [`Measurement::int64`] or [`Measurement::float64`] depending on the target
/// measure's kind; the value is widened to `f64` immediately but the originating kind is
/// checked against the measure's declared kind when the worker processes the record.
#[derive(Clone, Debug)]
pub struct Measurement {
    pub(crate) measure: Measure,
    pub(crate) value: MeasurementValue,
}

impl Measurement {
    /// Builds a measurement for an [`MeasureKind::Int64`] measure.
    #[must_use]
    pub fn int64(measure: &Measure, value: i64) -> Self {
        Self { measure: measure.clone(), value: MeasurementValue::Int64(value) }
    }

    /// Builds a measurement for a [`MeasureKind::Float64`] measure.
    #[must_use]
    pub fn float64(measure: &Measure, value: f64) -> Self {
        Self { measure: measure.clone(), value: MeasurementValue::Float64(value) }
    }

    /// The measure this measurement targets.
    #[must_use]
    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    /// Validates the measurement against its measure's declared kind and widens it to `f64`.
    ///
    /// # Errors
    /// Returns [`MetricsError::InvalidArgument`] on a kind mismatch.
    pub fn checked_value(&self) -> Result<f64, MetricsError> {
        self.measure.checked_sample(self.value)
    }
}
