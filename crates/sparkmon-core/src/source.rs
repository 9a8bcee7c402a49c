//! Raw metric sources and the catalog that enumerates them.
//!
//! Every live reading in the engine comes from a [`MetricSource`]. Sources are
//! obtained from a [`CounterCatalog`], which also answers the enumeration
//! questions counter-path expansion needs (which instances and counters a
//! category exposes).

use std::fmt;

use crate::error::Result;

/// Instance name that aggregates every other instance of a category.
pub const TOTAL_INSTANCE: &str = "_Total";

/// Well-known category and counter names used by the predefined recipes.
pub mod names {
    pub const PROCESSOR: &str = "Processor";
    pub const PROCESSOR_TIME: &str = "% Processor Time";

    pub const MEMORY: &str = "Memory";
    pub const AVAILABLE_BYTES: &str = "Available Bytes";
    pub const TOTAL_BYTES: &str = "Total Bytes";
    pub const COMMITTED_BYTES: &str = "Committed Bytes";
    pub const COMMIT_LIMIT: &str = "Commit Limit";

    pub const NETWORK_INTERFACE: &str = "Network Interface";
    pub const BYTES_TOTAL_PER_SEC: &str = "Bytes Total/sec";
    pub const BYTES_RECEIVED_PER_SEC: &str = "Bytes Received/sec";
    pub const BYTES_SENT_PER_SEC: &str = "Bytes Sent/sec";

    pub const PHYSICAL_DISK: &str = "PhysicalDisk";
    pub const IDLE_TIME: &str = "% Idle Time";

    pub const PROCESSOR_FREQUENCY: &str = "Processor Frequency";
    pub const CURRENT_MHZ: &str = "Current MHz";
    pub const MAXIMUM_MHZ: &str = "Maximum MHz";
}

/// Identity of one concrete OS counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterId {
    pub machine: String,
    pub category: String,
    pub instance: Option<String>,
    pub counter: String,
}

impl CounterId {
    pub fn new(
        machine: impl Into<String>,
        category: impl Into<String>,
        instance: Option<&str>,
        counter: impl Into<String>,
    ) -> Self {
        Self {
            machine: machine.into(),
            category: category.into(),
            instance: instance.map(str::to_string),
            counter: counter.into(),
        }
    }

    /// Shorthand for a counter on the local machine (`.`).
    pub fn local(category: &str, instance: Option<&str>, counter: &str) -> Self {
        Self::new(".", category, instance, counter)
    }
}

impl fmt::Display for CounterId {
    /// Canonical `\\machine\category(instance)\counter` form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\\\{}\\{}", self.machine, self.category)?;
        if let Some(instance) = &self.instance {
            write!(f, "({instance})")?;
        }
        write!(f, "\\{}", self.counter)
    }
}

/// A provider of one live numeric reading.
pub trait MetricSource: Send + Sync {
    /// Take a reading. Fails with `SourceUnavailable` once the OS object is gone.
    fn read(&self) -> Result<f64>;

    /// Identity of the OS counter behind this source, when there is one.
    fn id(&self) -> Option<&CounterId> {
        None
    }

    /// Diagnostic string shown as the raw counter's description.
    fn description(&self) -> String {
        self.id()
            .map(ToString::to_string)
            .unwrap_or_else(|| "anonymous source".to_string())
    }
}

/// Enumerates and opens OS counters.
pub trait CounterCatalog {
    /// Instance names of `category`. Order is unspecified; callers sort.
    fn instances(&self, machine: &str, category: &str) -> Result<Vec<String>>;

    /// Counter names of `category` for `instance`, in category-defined order.
    fn counters(
        &self,
        machine: &str,
        category: &str,
        instance: Option<&str>,
    ) -> Result<Vec<String>>;

    /// Open a live source for one concrete counter.
    fn open(&self, id: &CounterId) -> Result<Box<dyn MetricSource>>;

    /// Instance names sorted lexicographically.
    fn sorted_instances(&self, machine: &str, category: &str) -> Result<Vec<String>> {
        let mut instances = self.instances(machine, category)?;
        instances.sort();
        Ok(instances)
    }
}
