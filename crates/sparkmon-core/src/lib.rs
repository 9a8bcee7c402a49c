//! # sparkmon-core
//!
//! Counter composition and bounded-history tracking for a sparkline system
//! monitor.
//!
//! `sparkmon-core` turns raw OS performance counters into composed metrics
//! ("busy %" from "idle %", the sum of every network interface, the total CPU
//! load with a per-core breakdown) and keeps a fixed-length history of each one
//! for drawing.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sparkmon_core::{Monitor, MonitorConfig, ProcfsCatalog};
//!
//! let catalog = ProcfsCatalog::new();
//! let mut monitor = Monitor::from_config(&MonitorConfig::default(), &catalog).unwrap();
//!
//! let report = monitor.tick();
//! for slot in monitor.visible_slots() {
//!     println!("{}: {}", slot.name(), slot.readout().label);
//! }
//! println!("{} slot(s) sampled", report.sampled);
//! ```
//!
//! ## Architecture
//!
//! Catalog → Counter tree → CounterHistory → Monitor → display
//!
//! - A [`CounterCatalog`] enumerates and opens live [`MetricSource`]s.
//!   [`ProcfsCatalog`] is the Linux implementation.
//! - A [`Counter`] is a leaf (raw or constant) or a composite (`KnownMax`,
//!   `Reverse`, `Sum`, `Sub`) owning its children. Readings are pulled on
//!   demand.
//! - A [`CounterHistory`] samples one counter per tick into a newest-first
//!   window of [`HISTORY_SIZE`] values and keeps the all-time peak.
//! - A [`Monitor`] owns the slot set built from a [`MonitorConfig`] and
//!   drives the tick, isolating per-slot failures.

pub mod config;
pub mod counter;
pub mod display;
pub mod error;
pub mod factory;
pub mod history;
pub mod monitor;
pub mod path;
pub mod procfs;
pub mod source;

pub use config::{MonitorConfig, SlotConfig, SlotSpec};
pub use counter::{Counter, CounterKind, RawCounter};
pub use display::Readout;
pub use error::{Error, Result};
pub use factory::Predefined;
pub use history::{CounterHistory, HISTORY_SIZE};
pub use monitor::{Monitor, Slot, SlotError, SlotGroup, TickReport};
pub use path::{CounterPath, Selector};
pub use procfs::ProcfsCatalog;
pub use source::{CounterCatalog, CounterId, MetricSource, TOTAL_INSTANCE};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
