//! The slot set and its tick driver.
//!
//! A [`Monitor`] owns one [`CounterHistory`] per displayed slot, in display
//! order. Each [`Monitor::tick`] samples every slot once; a failing slot is
//! recorded in the [`TickReport`] and never stops the others.

use std::fmt;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::{MonitorConfig, SlotSpec};
use crate::counter::Counter;
use crate::display::{self, Readout};
use crate::error::{Error, Result};
use crate::factory::{self, Predefined};
use crate::history::CounterHistory;
use crate::source::CounterCatalog;

/// Which recipe family a slot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotGroup {
    Cpu,
    Memory,
    Network,
    Disk,
    Frequency,
    Specific,
}

impl SlotGroup {
    pub fn of(kind: Predefined) -> Self {
        match kind {
            Predefined::Cpu => Self::Cpu,
            Predefined::VirtualMemory | Predefined::PhysicalMemory => Self::Memory,
            Predefined::Network => Self::Network,
            Predefined::Disk => Self::Disk,
            Predefined::CpuFrequency => Self::Frequency,
        }
    }
}

impl fmt::Display for SlotGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Network => "network",
            Self::Disk => "disk",
            Self::Frequency => "frequency",
            Self::Specific => "specific",
        };
        f.pad(s)
    }
}

/// One displayed counter, its history and the readout drawn from it.
pub struct Slot {
    group: SlotGroup,
    history: CounterHistory,
    auto_hide: bool,
    readout: Readout,
}

impl Slot {
    pub fn new(group: SlotGroup, history: CounterHistory, auto_hide: bool) -> Self {
        Self {
            group,
            history,
            auto_hide,
            readout: Readout::default(),
        }
    }

    pub fn group(&self) -> SlotGroup {
        self.group
    }

    pub fn history(&self) -> &CounterHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut CounterHistory {
        &mut self.history
    }

    pub fn auto_hide(&self) -> bool {
        self.auto_hide
    }

    /// Label, ceiling and tooltip as of the last tick. Reading it does not
    /// touch any source.
    pub fn readout(&self) -> &Readout {
        &self.readout
    }

    /// Recapture the readout from the counter. [`Monitor::tick`] does this
    /// once per slot.
    pub fn refresh_readout(&mut self) {
        self.readout = Readout::capture(&self.history);
    }

    pub fn name(&self) -> &str {
        self.history.counter().name()
    }

    /// Auto-hide slots stay hidden until they record a nonzero sample.
    pub fn is_visible(&self) -> bool {
        !(self.auto_hide && display::is_dead(&self.history))
    }
}

/// A slot that failed to sample during a tick.
#[derive(Debug)]
pub struct SlotError {
    pub index: usize,
    pub name: String,
    pub error: Error,
}

/// Outcome of one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Slots that recorded a sample.
    pub sampled: usize,
    pub errors: Vec<SlotError>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Ordered slot set driven by a periodic tick.
pub struct Monitor {
    slots: Vec<Slot>,
    history_size: usize,
    refresh: Duration,
    /// Index of the first disk slot, when the layout has disks at all.
    disk_anchor: Option<usize>,
    disk_auto_hide: bool,
}

impl Monitor {
    pub fn new(history_size: usize, refresh: Duration) -> Self {
        Self {
            slots: Vec::new(),
            history_size,
            refresh,
            disk_anchor: None,
            disk_auto_hide: false,
        }
    }

    /// Build every configured slot. The first failure aborts the load.
    pub fn from_config(config: &MonitorConfig, catalog: &dyn CounterCatalog) -> Result<Self> {
        let mut monitor = Self::new(config.history_size, config.refresh_interval());
        for (slot, spec) in config.slots.iter().zip(config.validate()?) {
            match spec {
                SlotSpec::Predefined(kind) => {
                    let group = SlotGroup::of(kind);
                    if group == SlotGroup::Disk && monitor.disk_anchor.is_none() {
                        monitor.disk_anchor = Some(monitor.slots.len());
                        monitor.disk_auto_hide = slot.auto_hide;
                    }
                    for counter in kind.build(catalog)? {
                        monitor.push(group, counter, slot.auto_hide);
                    }
                }
                SlotSpec::Path(path) => {
                    for counter in factory::from_path(catalog, &path)? {
                        monitor.push(SlotGroup::Specific, counter, slot.auto_hide);
                    }
                }
            }
        }
        debug!("monitor built with {} slot(s)", monitor.slots.len());
        Ok(monitor)
    }

    /// Append a slot tracking `counter`.
    pub fn push(&mut self, group: SlotGroup, counter: Counter, auto_hide: bool) {
        let history = CounterHistory::with_capacity(counter, self.history_size);
        self.slots.push(Slot::new(group, history, auto_hide));
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh
    }

    pub fn set_refresh_interval(&mut self, refresh: Duration) {
        self.refresh = refresh;
    }

    /// Sample every slot once, in display order, and recapture its readout.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match slot.history.sample() {
                Ok(_) => report.sampled += 1,
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("slot {index} ({}) skipped this tick: {e}", slot.name());
                    } else {
                        error!("slot {index} ({}) failed: {e}", slot.name());
                    }
                    report.errors.push(SlotError {
                        index,
                        name: slot.name().to_string(),
                        error: e,
                    });
                }
            }
            slot.refresh_readout();
        }
        report
    }

    /// Rebuild the disk slots after drives arrived or left.
    ///
    /// The new set takes the position of the old one. Returns the number of
    /// disk slots now present; layouts without disks are left untouched. On
    /// error the previous disk slots are kept.
    pub fn refresh_disks(&mut self, catalog: &dyn CounterCatalog) -> Result<usize> {
        let Some(anchor) = self.disk_anchor else {
            return Ok(0);
        };
        let fresh = Predefined::Disk.build(catalog)?;
        let before = self.slots.len();
        self.slots.retain(|s| s.group != SlotGroup::Disk);
        let removed = before - self.slots.len();

        let count = fresh.len();
        let tail = self.slots.split_off(anchor.min(self.slots.len()));
        for counter in fresh {
            let history = CounterHistory::with_capacity(counter, self.history_size);
            self.slots.push(Slot::new(SlotGroup::Disk, history, self.disk_auto_hide));
        }
        self.slots.extend(tail);
        info!("disk slots refreshed: {removed} removed, {count} created");
        Ok(count)
    }

    /// Slots to draw, skipping auto-hidden ones that never saw activity.
    pub fn visible_slots(&self) -> impl Iterator<Item = &Slot> + '_ {
        self.slots.iter().filter(|s| s.is_visible())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlotConfig;
    use crate::counter::tests::dial;
    use crate::path::tests::MapCatalog;

    fn catalog(disks: &[&str]) -> MapCatalog {
        let mut c = MapCatalog::default()
            .with("Processor", Some("_Total"), &[("% Processor Time", 20.0)])
            .with("Processor", Some("0"), &[("% Processor Time", 20.0)])
            .with(
                "Memory",
                None,
                &[
                    ("Available Bytes", 2.0),
                    ("Total Bytes", 8.0),
                    ("Committed Bytes", 3.0),
                    ("Commit Limit", 10.0),
                ],
            )
            .with("Network Interface", Some("eth0"), &[("Bytes Total/sec", 0.0)])
            .with("PhysicalDisk", Some("_Total"), &[("% Idle Time", 50.0)]);
        for disk in disks {
            c = c.with("PhysicalDisk", Some(*disk), &[("% Idle Time", 40.0)]);
        }
        c
    }

    fn groups(m: &Monitor) -> Vec<SlotGroup> {
        m.slots().iter().map(Slot::group).collect()
    }

    fn names(m: &Monitor) -> Vec<&str> {
        m.slots().iter().map(Slot::name).collect()
    }

    #[test]
    fn stock_layout_from_default_config() {
        let m =
            Monitor::from_config(&MonitorConfig::default(), &catalog(&["sda", "sdb"])).unwrap();
        assert_eq!(
            groups(&m),
            vec![
                SlotGroup::Cpu,
                SlotGroup::Memory,
                SlotGroup::Memory,
                SlotGroup::Network,
                SlotGroup::Disk,
                SlotGroup::Disk,
            ]
        );
        assert_eq!(m.refresh_interval(), Duration::from_millis(2000));
        assert!(m.slots().iter().all(|s| s.history().capacity() == 100));
    }

    #[test]
    fn load_aborts_on_first_error() {
        let config = MonitorConfig {
            slots: vec![
                SlotConfig::predefined(Predefined::Cpu),
                SlotConfig::predefined(Predefined::CpuFrequency),
            ],
            ..MonitorConfig::default()
        };
        // No frequency category on this machine.
        let err = Monitor::from_config(&config, &catalog(&[])).err().unwrap();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }

    #[test]
    fn path_slots_are_specific() {
        let config = MonitorConfig {
            history_size: 5,
            slots: vec![SlotConfig::counter("\\\\.\\Memory\\#ALL#").auto_hide(true)],
            ..MonitorConfig::default()
        };
        let m = Monitor::from_config(&config, &catalog(&[])).unwrap();
        assert_eq!(m.len(), 4);
        assert!(groups(&m).iter().all(|g| *g == SlotGroup::Specific));
        assert_eq!(names(&m)[0], "Available Bytes");
        assert!(m.slots().iter().all(|s| s.auto_hide() && s.history().capacity() == 5));
    }

    #[test]
    fn tick_isolates_failing_slots() {
        let mut m = Monitor::new(10, Duration::from_secs(1));
        let (a, _) = dial("a", 1.0);
        let (b, bd) = dial("b", 2.0);
        let (c, _) = dial("c", 3.0);
        m.push(SlotGroup::Specific, a.with_name("a"), false);
        m.push(SlotGroup::Specific, b.with_name("b"), false);
        m.push(SlotGroup::Specific, c.with_name("c"), false);

        let report = m.tick();
        assert!(report.is_clean());
        assert_eq!(report.sampled, 3);

        bd.vanish();
        let report = m.tick();
        assert_eq!(report.sampled, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].index, 1);
        assert_eq!(report.errors[0].name, "b");
        assert!(report.errors[0].error.is_recoverable());

        let counts: Vec<usize> = m.slots().iter().map(|s| s.history().count()).collect();
        assert_eq!(counts, vec![2, 1, 2]);

        bd.restore();
        assert!(m.tick().is_clean());
        assert_eq!(m.slots()[1].history().count(), 2);
    }

    #[test]
    fn refresh_disks_keeps_position() {
        let config = MonitorConfig {
            slots: vec![
                SlotConfig::predefined(Predefined::Cpu),
                SlotConfig::predefined(Predefined::Disk),
                SlotConfig::predefined(Predefined::Network),
            ],
            ..MonitorConfig::default()
        };
        let mut m = Monitor::from_config(&config, &catalog(&["sda"])).unwrap();
        m.tick();
        assert_eq!(names(&m), vec!["CPU", "Disk activity sda", "Network (1 interface)"]);

        let n = m.refresh_disks(&catalog(&["sda", "sdc"])).unwrap();
        assert_eq!(n, 2);
        assert_eq!(
            names(&m),
            vec![
                "CPU",
                "Disk activity sda",
                "Disk activity sdc",
                "Network (1 interface)",
            ]
        );
        // New trackers start empty; the others keep their samples.
        assert_eq!(m.slots()[0].history().count(), 1);
        assert_eq!(m.slots()[1].history().count(), 0);
        assert_eq!(m.slots()[3].history().count(), 1);
    }

    #[test]
    fn refresh_disks_survives_zero_disks() {
        let config = MonitorConfig {
            slots: vec![
                SlotConfig::predefined(Predefined::Disk),
                SlotConfig::predefined(Predefined::Cpu),
            ],
            ..MonitorConfig::default()
        };
        let mut m = Monitor::from_config(&config, &catalog(&["sda"])).unwrap();
        assert_eq!(m.refresh_disks(&catalog(&[])).unwrap(), 0);
        assert_eq!(names(&m), vec!["CPU"]);
        assert_eq!(m.refresh_disks(&catalog(&["sdb"])).unwrap(), 1);
        assert_eq!(names(&m), vec!["Disk activity sdb", "CPU"]);
    }

    #[test]
    fn layout_with_two_disk_sets_is_rejected() {
        let config = MonitorConfig {
            slots: vec![
                SlotConfig::predefined(Predefined::Disk),
                SlotConfig::predefined(Predefined::Cpu),
                SlotConfig::predefined(Predefined::Disk).auto_hide(true),
            ],
            ..MonitorConfig::default()
        };
        let err = Monitor::from_config(&config, &catalog(&["sda"])).err().unwrap();
        assert!(matches!(err, Error::DuplicateSlot(_)));
    }

    #[test]
    fn refresh_disks_without_disk_layout_is_noop() {
        let config = MonitorConfig {
            slots: vec![SlotConfig::predefined(Predefined::Cpu)],
            ..MonitorConfig::default()
        };
        let mut m = Monitor::from_config(&config, &catalog(&["sda"])).unwrap();
        assert_eq!(m.refresh_disks(&catalog(&["sda"])).unwrap(), 0);
        assert_eq!(names(&m), vec!["CPU"]);
    }

    #[test]
    fn readouts_only_read_sources_on_tick() {
        let (busy, _) = dial("busy", 40.0);
        let (limit, limit_dial) = dial("limit", 100.0);
        let (core, core_dial) = dial("core0", 30.0);
        let cpu = Counter::sub(Counter::known_max(busy, limit), vec![core]).with_name("CPU");
        let mut m = Monitor::new(10, Duration::from_secs(2));
        m.push(SlotGroup::Cpu, cpu, false);
        assert_eq!(m.slots()[0].readout().label, "-");

        m.tick();
        let reads = (limit_dial.reads(), core_dial.reads());
        // A 2 s tick redrawn every 50 ms.
        for _ in 0..40 {
            let slot = m.visible_slots().next().unwrap();
            let readout = slot.readout();
            assert_eq!(readout.label, "40%");
            assert!(readout.tooltip.ends_with("core0: 30%\n40%"));
            assert_eq!(readout.ratios(slot.history()), vec![Some(0.4)]);
        }
        assert_eq!((limit_dial.reads(), core_dial.reads()), reads);

        core_dial.set(60.0);
        m.tick();
        assert_eq!(core_dial.reads(), reads.1 + 1);
        assert!(m.slots()[0].readout().tooltip.ends_with("core0: 60%\n40%"));
    }

    #[test]
    fn failed_tick_refreshes_readout() {
        let (part, d) = dial("core0", 1.0);
        let mut m = Monitor::new(10, Duration::from_secs(1));
        m.push(SlotGroup::Cpu, Counter::sub(Counter::constant(5.0), vec![part]), false);
        m.tick();
        assert!(m.slots()[0].readout().tooltip.starts_with("\\\\.\\Test\\core0: 1%"));
        d.vanish();
        assert!(m.tick().is_clean());
        assert!(m.slots()[0].readout().tooltip.starts_with("Error:\n"));
        assert_eq!(m.slots()[0].readout().label, "5% / 5%");
    }

    #[test]
    fn group_names_match_in_json() {
        for group in [SlotGroup::Cpu, SlotGroup::Frequency, SlotGroup::Specific] {
            let json = serde_json::to_string(&group).unwrap();
            assert_eq!(json, format!("\"{group}\""));
        }
    }

    #[test]
    fn auto_hidden_slots_appear_after_activity() {
        let mut m = Monitor::new(10, Duration::from_secs(1));
        let (quiet, qd) = dial("quiet", 0.0);
        m.push(SlotGroup::Specific, quiet.with_name("quiet"), true);
        m.push(SlotGroup::Specific, Counter::constant(0.0).with_name("shown"), false);

        assert_eq!(m.visible_slots().count(), 1);
        m.tick();
        let visible: Vec<&str> = m.visible_slots().map(Slot::name).collect();
        assert_eq!(visible, vec!["shown"]);

        qd.set(5.0);
        m.tick();
        qd.set(0.0);
        m.tick();
        assert_eq!(m.visible_slots().count(), 2);
    }
}
