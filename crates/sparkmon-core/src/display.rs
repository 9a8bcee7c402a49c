//! Formatting helpers shared by every presentation front-end.
//!
//! Nothing here touches stored values: the display coefficient is applied
//! only to the text produced.

use crate::history::CounterHistory;

/// Fraction of the ceiling at which the newest bar turns to a warning.
pub const WARNING_THRESHOLD: f64 = 0.8;
/// Fraction of the ceiling at which the newest bar turns to an alert.
pub const ALERT_THRESHOLD: f64 = 0.9;

/// Round to one decimal, half away from zero.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Bar height of `value` against `max`, clamped to `[0, 1]`.
///
/// Returns `None` when the ratio is NaN (e.g. `0 / 0`): nothing should be
/// drawn for that sample. A zero ceiling with a nonzero value saturates.
pub fn ratio(value: f64, max: f64) -> Option<f64> {
    let r = value / max;
    if r.is_nan() {
        None
    } else {
        Some(r.clamp(0.0, 1.0))
    }
}

/// Severity band of a bar height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Normal,
    Warning,
    Alert,
}

impl Level {
    pub fn of(ratio: f64) -> Self {
        if ratio >= ALERT_THRESHOLD {
            Self::Alert
        } else if ratio >= WARNING_THRESHOLD {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

/// Ceiling used for drawing. Falls back to the observed peak when the counter
/// cannot report its maximum this tick.
pub fn ceiling(history: &CounterHistory) -> f64 {
    ceiling_from(history, history.counter().maximum().ok())
}

fn ceiling_from(history: &CounterHistory, maximum: Option<f64>) -> f64 {
    maximum.map_or(history.real_max(), |m| m.max(history.real_max()))
}

/// Bar heights of the whole window, newest first.
pub fn ratios(history: &CounterHistory) -> Vec<Option<f64>> {
    ratios_under(history, ceiling(history))
}

/// Bar heights of the whole window against a known ceiling, newest first.
pub fn ratios_under(history: &CounterHistory, ceiling: f64) -> Vec<Option<f64>> {
    history.iter().map(|v| ratio(v, ceiling)).collect()
}

/// Level of the newest sample, if any can be drawn.
pub fn current_level(history: &CounterHistory) -> Option<Level> {
    level_under(history, ceiling(history))
}

fn level_under(history: &CounterHistory, ceiling: f64) -> Option<Level> {
    let latest = history.latest()?;
    ratio(latest, ceiling).map(Level::of)
}

/// Short widget text for the newest sample.
///
/// Plain percentages render as `"42.5%"`; anything else renders as
/// `"value unit / ceiling unit"` scaled by the display coefficient.
pub fn label(history: &CounterHistory) -> String {
    let maximum = history.counter().maximum().ok();
    label_from(history, maximum, ceiling_from(history, maximum))
}

fn label_from(history: &CounterHistory, maximum: Option<f64>, ceiling: f64) -> String {
    let Some(latest) = history.latest() else {
        return "-".to_string();
    };
    let counter = history.counter();
    let coef = counter.display_coef();
    let unit = counter.unit();
    let plain_percent = unit == "%" && coef == 1.0 && maximum == Some(100.0);
    if plain_percent {
        format!("{}%", round1(latest))
    } else {
        format!(
            "{}{unit} / {}{unit}",
            round1(latest * coef),
            round1(ceiling * coef)
        )
    }
}

/// Tooltip body: the counter description followed by its label.
pub fn tooltip(history: &CounterHistory) -> String {
    tooltip_from(history, &label(history))
}

fn tooltip_from(history: &CounterHistory, label: &str) -> String {
    match history.counter().description() {
        Ok(description) => format!("{description}\n{label}"),
        Err(e) => format!("Error:\n{e}"),
    }
}

/// What a front-end draws for one slot, captured once per tick.
///
/// Maximums and descriptions are read from live sources, so redraws between
/// ticks render from a `Readout` rather than from the history.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub label: String,
    pub ceiling: f64,
    pub tooltip: String,
    pub level: Option<Level>,
}

impl Default for Readout {
    fn default() -> Self {
        Self {
            label: "-".to_string(),
            ceiling: 0.0,
            tooltip: String::new(),
            level: None,
        }
    }
}

impl Readout {
    /// Read the counter's maximum and description once and format the newest sample.
    pub fn capture(history: &CounterHistory) -> Self {
        let maximum = history.counter().maximum().ok();
        let ceiling = ceiling_from(history, maximum);
        let label = label_from(history, maximum, ceiling);
        let tooltip = tooltip_from(history, &label);
        Self {
            level: level_under(history, ceiling),
            label,
            ceiling,
            tooltip,
        }
    }

    /// Bar heights of `history` against the captured ceiling, newest first.
    pub fn ratios(&self, history: &CounterHistory) -> Vec<Option<f64>> {
        ratios_under(history, self.ceiling)
    }
}

/// Whether an auto-hide slot should currently be hidden.
pub fn is_dead(history: &CounterHistory) -> bool {
    history.real_max() == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Counter;
    use crate::counter::tests::dial;

    #[test]
    fn round1_half_away_from_zero() {
        assert_eq!(round1(0.25), 0.3);
        assert_eq!(round1(-0.25), -0.3);
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(round1(7.0), 7.0);
    }

    #[test]
    fn ratio_clamps_and_guards() {
        assert_eq!(ratio(50.0, 100.0), Some(0.5));
        assert_eq!(ratio(150.0, 100.0), Some(1.0));
        assert_eq!(ratio(-5.0, 100.0), Some(0.0));
        assert_eq!(ratio(5.0, 0.0), Some(1.0));
        assert_eq!(ratio(0.0, 0.0), None);
        assert_eq!(ratio(f64::NAN, 10.0), None);
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(Level::of(0.0), Level::Normal);
        assert_eq!(Level::of(0.79), Level::Normal);
        assert_eq!(Level::of(0.8), Level::Warning);
        assert_eq!(Level::of(0.9), Level::Alert);
        assert_eq!(Level::of(1.0), Level::Alert);
    }

    #[test]
    fn label_plain_percentage() {
        let (v, d) = dial("cpu", 42.46);
        let mut h = CounterHistory::new(Counter::known_max(v, Counter::constant(100.0)));
        h.sample().unwrap();
        assert_eq!(label(&h), "42.5%");
        d.set(3.0);
        h.sample().unwrap();
        assert_eq!(label(&h), "3%");
    }

    #[test]
    fn label_scaled_with_ceiling() {
        let gib = 1024.0 * 1024.0 * 1024.0;
        let c = Counter::reverse(Counter::constant(6.0 * gib), Counter::constant(16.0 * gib))
            .with_unit("GB")
            .with_display_coef(1.0 / gib);
        let mut h = CounterHistory::new(c);
        h.sample().unwrap();
        assert_eq!(label(&h), "10GB / 16GB");
    }

    #[test]
    fn label_of_empty_history() {
        let h = CounterHistory::new(Counter::constant(1.0));
        assert_eq!(label(&h), "-");
        assert_eq!(current_level(&h), None);
    }

    #[test]
    fn ratios_use_ceiling_and_skip_nan() {
        let (v, d) = dial("x", 0.0);
        let mut h = CounterHistory::new(Counter::known_max(v, Counter::constant(0.0)));
        h.sample().unwrap();
        d.set(4.0);
        h.sample().unwrap();
        // ceiling is max(0, real_max 4) = 4
        assert_eq!(ratios(&h), vec![Some(1.0), Some(0.0)]);
        assert_eq!(current_level(&h), Some(Level::Alert));
    }

    #[test]
    fn tooltip_reports_description_errors() {
        let (part, d) = dial("core0", 1.0);
        let mut h = CounterHistory::new(Counter::sub(Counter::constant(5.0), vec![part]));
        h.sample().unwrap();
        assert!(tooltip(&h).starts_with("\\\\.\\Test\\core0: 1%\n"));
        d.vanish();
        assert!(tooltip(&h).starts_with("Error:\n"));
    }

    #[test]
    fn readout_reads_each_source_once() {
        let (busy, _) = dial("busy", 40.0);
        let (limit, limit_dial) = dial("limit", 100.0);
        let (core, core_dial) = dial("core0", 30.0);
        let cpu = Counter::sub(Counter::known_max(busy, limit), vec![core]);
        let mut h = CounterHistory::new(cpu);
        h.sample().unwrap();
        let before = (limit_dial.reads(), core_dial.reads());

        let r = Readout::capture(&h);
        assert_eq!(limit_dial.reads(), before.0 + 1);
        assert_eq!(core_dial.reads(), before.1 + 1);
        assert_eq!(r.label, "40%");
        assert_eq!(r.ceiling, 100.0);
        assert_eq!(r.level, Some(Level::Normal));
        assert_eq!(r.tooltip, "\\\\.\\Test\\core0: 30%\n40%");
        let direct = Readout {
            label: label(&h),
            ceiling: ceiling(&h),
            tooltip: tooltip(&h),
            level: current_level(&h),
        };
        assert_eq!(r, direct);

        // Formatting from the capture touches nothing.
        let reads = (limit_dial.reads(), core_dial.reads());
        assert_eq!(r.ratios(&h), vec![Some(0.4)]);
        assert_eq!((limit_dial.reads(), core_dial.reads()), reads);
    }

    #[test]
    fn blank_readout() {
        let r = Readout::default();
        assert_eq!(r.label, "-");
        assert_eq!(r.level, None);
        assert!(r.ratios(&CounterHistory::new(Counter::constant(1.0))).is_empty());
    }

    #[test]
    fn dead_slot_detection() {
        let (v, d) = dial("x", 0.0);
        let mut h = CounterHistory::new(v);
        assert!(is_dead(&h));
        h.sample().unwrap();
        assert!(is_dead(&h));
        d.set(0.5);
        h.sample().unwrap();
        assert!(!is_dead(&h));
    }
}
