//! Composable counters.
//!
//! A [`Counter`] is a node exposing a live `value` and an upper bound
//! (`maximum`), plus the labelling attributes the presentation layer needs
//! (`name`, `unit`, `display_coef`). Leaves read a [`MetricSource`] or hold a
//! constant; composites derive their readings from the children they own.
//!
//! Readings are pull-based: every call to [`Counter::value`] or
//! [`Counter::maximum`] walks the tree again and re-reads live sources. The only
//! state kept between calls is the raw counter's running peak.
//!
//! ```
//! use sparkmon_core::Counter;
//!
//! // "idle %" turned into "busy %"
//! let busy = Counter::reverse(Counter::constant(30.0), Counter::constant(100.0));
//! assert_eq!(busy.value().unwrap(), 70.0);
//! assert_eq!(busy.maximum().unwrap(), 100.0);
//! ```

use std::cell::Cell;
use std::fmt;

use crate::display::round1;
use crate::error::Result;
use crate::source::MetricSource;

/// Default unit suffix of every counter.
pub const DEFAULT_UNIT: &str = "%";

/// Description reported by constant counters.
pub const STATIC_DESCRIPTION: &str = "Static value";

// ---------------------------------------------------------------------------
// RawCounter
// ---------------------------------------------------------------------------

/// Leaf backed by a live [`MetricSource`].
pub struct RawCounter {
    source: Box<dyn MetricSource>,
    peak: Cell<f64>,
}

impl RawCounter {
    pub fn new(source: Box<dyn MetricSource>) -> Self {
        Self {
            source,
            peak: Cell::new(0.0),
        }
    }

    /// Read the source and fold the reading into this node's running peak.
    ///
    /// This is the only read path, so the peak reflects every access made
    /// through the tree, whoever made it.
    pub fn read_tracking_peak(&self) -> Result<f64> {
        let value = self.source.read()?;
        self.peak.set(self.peak.get().max(value));
        Ok(value)
    }

    /// Largest value ever returned by [`Self::read_tracking_peak`].
    pub fn peak(&self) -> f64 {
        self.peak.get()
    }

    pub fn description(&self) -> String {
        self.source.description()
    }

    pub fn source(&self) -> &dyn MetricSource {
        self.source.as_ref()
    }
}

impl fmt::Debug for RawCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCounter")
            .field("source", &self.source.description())
            .field("peak", &self.peak.get())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// CounterKind
// ---------------------------------------------------------------------------

/// The six counter variants. Composites own their children exclusively.
#[derive(Debug)]
pub enum CounterKind {
    /// Live reading; maximum is the running peak of those readings.
    Raw(RawCounter),
    /// Fixed constant, for both value and maximum.
    Static(f64),
    /// Value from `value`, maximum from the *value* of `max`.
    KnownMax {
        value: Box<Counter>,
        max: Box<Counter>,
    },
    /// Complement: `max.value - value.value`, bounded by `max.value`.
    Reverse {
        value: Box<Counter>,
        max: Box<Counter>,
    },
    /// Sum of children values and of children maxima.
    Sum(Vec<Counter>),
    /// Aggregate `main` annotated with a live breakdown of `parts`.
    Sub {
        main: Box<Counter>,
        parts: Vec<Counter>,
    },
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Counter {
    name: String,
    unit: String,
    display_coef: f64,
    kind: CounterKind,
}

impl Counter {
    pub fn new(kind: CounterKind) -> Self {
        Self {
            name: String::new(),
            unit: DEFAULT_UNIT.to_string(),
            display_coef: 1.0,
            kind,
        }
    }

    pub fn raw(source: Box<dyn MetricSource>) -> Self {
        Self::new(CounterKind::Raw(RawCounter::new(source)))
    }

    pub fn constant(value: f64) -> Self {
        Self::new(CounterKind::Static(value))
    }

    pub fn known_max(value: Counter, max: Counter) -> Self {
        Self::new(CounterKind::KnownMax {
            value: Box::new(value),
            max: Box::new(max),
        })
    }

    pub fn reverse(value: Counter, max: Counter) -> Self {
        Self::new(CounterKind::Reverse {
            value: Box::new(value),
            max: Box::new(max),
        })
    }

    pub fn sum(children: Vec<Counter>) -> Self {
        Self::new(CounterKind::Sum(children))
    }

    pub fn sub(main: Counter, parts: Vec<Counter>) -> Self {
        Self::new(CounterKind::Sub {
            main: Box::new(main),
            parts,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_display_coef(mut self, coef: f64) -> Self {
        self.display_coef = coef;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.unit = unit.into();
    }

    /// Multiplier applied only when formatting for display.
    pub fn display_coef(&self) -> f64 {
        self.display_coef
    }

    pub fn set_display_coef(&mut self, coef: f64) {
        self.display_coef = coef;
    }

    pub fn kind(&self) -> &CounterKind {
        &self.kind
    }

    /// Current value, re-evaluated on every call.
    pub fn value(&self) -> Result<f64> {
        match &self.kind {
            CounterKind::Raw(raw) => raw.read_tracking_peak(),
            CounterKind::Static(v) => Ok(*v),
            CounterKind::KnownMax { value, .. } => value.value(),
            CounterKind::Reverse { value, max } => {
                let ceiling = max.value()?;
                Ok(ceiling - value.value()?)
            }
            CounterKind::Sum(children) => children.iter().map(Counter::value).sum(),
            CounterKind::Sub { main, .. } => main.value(),
        }
    }

    /// Upper bound, re-evaluated on every call.
    pub fn maximum(&self) -> Result<f64> {
        match &self.kind {
            CounterKind::Raw(raw) => Ok(raw.peak()),
            CounterKind::Static(v) => Ok(*v),
            CounterKind::KnownMax { max, .. } | CounterKind::Reverse { max, .. } => max.value(),
            CounterKind::Sum(children) => children.iter().map(Counter::maximum).sum(),
            CounterKind::Sub { main, .. } => main.maximum(),
        }
    }

    /// Diagnostic text. Sub counters read their parts, so this can fail too.
    pub fn description(&self) -> Result<String> {
        match &self.kind {
            CounterKind::Raw(raw) => Ok(raw.description()),
            CounterKind::Static(_) => Ok(STATIC_DESCRIPTION.to_string()),
            CounterKind::KnownMax { value, max } | CounterKind::Reverse { value, max } => {
                Ok(format!("{} / {}", value.description()?, max.description()?))
            }
            CounterKind::Sum(children) => {
                let lines = children
                    .iter()
                    .map(Counter::description)
                    .collect::<Result<Vec<_>>>()?;
                Ok(lines.join("\n"))
            }
            CounterKind::Sub { parts, .. } => {
                let mut lines = Vec::with_capacity(parts.len());
                for part in parts {
                    lines.push(format!(
                        "{}: {}{}",
                        part.description()?,
                        round1(part.value()? * part.display_coef),
                        part.unit
                    ));
                }
                Ok(lines.join("\n"))
            }
        }
    }
}
