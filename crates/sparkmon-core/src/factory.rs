//! Recipes that assemble counter trees from a [`CounterCatalog`].
//!
//! The predefined recipes reproduce the stock monitor layout (CPU, memory,
//! network, disks, CPU frequency). [`from_path`] turns an arbitrary counter
//! path into one raw counter per expanded identity.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::counter::Counter;
use crate::error::{Error, Result};
use crate::path::CounterPath;
use crate::source::{CounterCatalog, CounterId, TOTAL_INSTANCE, names};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const KIB: f64 = 1024.0;

/// The stock counters a configuration can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predefined {
    Cpu,
    VirtualMemory,
    PhysicalMemory,
    Network,
    Disk,
    CpuFrequency,
}

impl Predefined {
    pub const ALL: [Predefined; 6] = [
        Self::Cpu,
        Self::VirtualMemory,
        Self::PhysicalMemory,
        Self::Network,
        Self::Disk,
        Self::CpuFrequency,
    ];

    /// Name used in configuration files.
    pub fn config_name(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::VirtualMemory => "VirtualMemory",
            Self::PhysicalMemory => "PhysicalMemory",
            Self::Network => "Network",
            Self::Disk => "Disk",
            Self::CpuFrequency => "CPUFrequency",
        }
    }

    /// Build the counters for this recipe. Only `Disk` yields more than one.
    pub fn build(self, catalog: &dyn CounterCatalog) -> Result<Vec<Counter>> {
        let counters = match self {
            Self::Cpu => vec![cpu(catalog)?],
            Self::VirtualMemory => vec![virtual_memory(catalog)?],
            Self::PhysicalMemory => vec![physical_memory(catalog)?],
            Self::Network => vec![network(catalog)?],
            Self::Disk => disks(catalog)?,
            Self::CpuFrequency => vec![cpu_frequency(catalog)?],
        };
        debug!("built {} counter(s) for {self}", counters.len());
        Ok(counters)
    }
}

impl FromStr for Predefined {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.config_name() == s)
            .ok_or_else(|| Error::UnknownConfigurationKind {
                kind: "predefined".to_string(),
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Predefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

fn open_raw(
    catalog: &dyn CounterCatalog,
    category: &str,
    instance: Option<&str>,
    counter: &str,
) -> Result<Counter> {
    let id = CounterId::local(category, instance, counter);
    Ok(Counter::raw(catalog.open(&id)?))
}

/// Split a sorted instance list into the `_Total` aggregate and the rest.
fn split_total(category: &str, instances: Vec<String>) -> Result<(String, Vec<String>)> {
    let (total, parts): (Vec<String>, Vec<String>) = instances
        .into_iter()
        .partition(|i| i == TOTAL_INSTANCE);
    let total = total.into_iter().next().ok_or_else(|| Error::MissingInstance {
        category: category.to_string(),
        instance: TOTAL_INSTANCE.to_string(),
    })?;
    Ok((total, parts))
}

// ---------------------------------------------------------------------------
// Predefined recipes
// ---------------------------------------------------------------------------

/// Total processor load with a per-core breakdown.
pub fn cpu(catalog: &dyn CounterCatalog) -> Result<Counter> {
    let instances = catalog.sorted_instances(".", names::PROCESSOR)?;
    let (total, cores) = split_total(names::PROCESSOR, instances)?;
    let busy = |instance: &str| -> Result<Counter> {
        let raw = open_raw(catalog, names::PROCESSOR, Some(instance), names::PROCESSOR_TIME)?;
        Ok(Counter::known_max(raw, Counter::constant(100.0)))
    };
    let main = busy(&total)?;
    let parts = cores
        .iter()
        .map(|core| busy(core))
        .collect::<Result<Vec<_>>>()?;
    Ok(Counter::sub(main, parts).with_name("CPU"))
}

/// Used physical memory against installed memory.
pub fn physical_memory(catalog: &dyn CounterCatalog) -> Result<Counter> {
    let available = open_raw(catalog, names::MEMORY, None, names::AVAILABLE_BYTES)?;
    let total = open_raw(catalog, names::MEMORY, None, names::TOTAL_BYTES)?;
    Ok(Counter::reverse(available, total)
        .with_name("Physical memory")
        .with_unit("GB")
        .with_display_coef(1.0 / GIB))
}

/// Committed memory against the commit limit.
pub fn virtual_memory(catalog: &dyn CounterCatalog) -> Result<Counter> {
    let committed = open_raw(catalog, names::MEMORY, None, names::COMMITTED_BYTES)?;
    let limit = open_raw(catalog, names::MEMORY, None, names::COMMIT_LIMIT)?;
    Ok(Counter::known_max(committed, limit)
        .with_name("Virtual memory")
        .with_unit("GB")
        .with_display_coef(1.0 / GIB))
}

/// Combined throughput of every network interface.
pub fn network(catalog: &dyn CounterCatalog) -> Result<Counter> {
    let interfaces = catalog.sorted_instances(".", names::NETWORK_INTERFACE)?;
    let children = interfaces
        .iter()
        .map(|i| {
            open_raw(
                catalog,
                names::NETWORK_INTERFACE,
                Some(i.as_str()),
                names::BYTES_TOTAL_PER_SEC,
            )
            .map(|c| c.with_unit("KB").with_display_coef(1.0 / KIB))
        })
        .collect::<Result<Vec<_>>>()?;
    let name = match children.len() {
        1 => "Network (1 interface)".to_string(),
        n => format!("Network ({n} interfaces)"),
    };
    Ok(Counter::sum(children)
        .with_name(name)
        .with_unit("KB")
        .with_display_coef(1.0 / KIB))
}

/// One busy-time counter per physical disk, `_Total` excluded.
pub fn disks(catalog: &dyn CounterCatalog) -> Result<Vec<Counter>> {
    catalog
        .sorted_instances(".", names::PHYSICAL_DISK)?
        .iter()
        .filter(|i| *i != TOTAL_INSTANCE)
        .map(|disk| {
            let idle = open_raw(
                catalog,
                names::PHYSICAL_DISK,
                Some(disk.as_str()),
                names::IDLE_TIME,
            )?;
            Ok(Counter::reverse(idle, Counter::constant(100.0))
                .with_name(format!("Disk activity {disk}")))
        })
        .collect()
}

/// Average clock against the rated maximum, with a per-core breakdown.
pub fn cpu_frequency(catalog: &dyn CounterCatalog) -> Result<Counter> {
    let instances = catalog.sorted_instances(".", names::PROCESSOR_FREQUENCY)?;
    let (total, cores) = split_total(names::PROCESSOR_FREQUENCY, instances)?;
    let clock = |instance: &str| -> Result<Counter> {
        let current = open_raw(
            catalog,
            names::PROCESSOR_FREQUENCY,
            Some(instance),
            names::CURRENT_MHZ,
        )?;
        let maximum = open_raw(
            catalog,
            names::PROCESSOR_FREQUENCY,
            Some(instance),
            names::MAXIMUM_MHZ,
        )?;
        Ok(Counter::known_max(current, maximum).with_unit("MHz"))
    };
    let main = clock(&total)?;
    let parts = cores
        .iter()
        .map(|core| clock(core))
        .collect::<Result<Vec<_>>>()?;
    Ok(Counter::sub(main, parts)
        .with_name("CPU frequency")
        .with_unit("MHz"))
}

// ---------------------------------------------------------------------------
// Path recipe
// ---------------------------------------------------------------------------

/// One raw counter per identity the path expands to, named after its counter.
pub fn from_path(catalog: &dyn CounterCatalog, path: &CounterPath) -> Result<Vec<Counter>> {
    path.expand(catalog)?
        .into_iter()
        .map(|id| {
            let name = id.counter.clone();
            Ok(Counter::raw(catalog.open(&id)?).with_name(name))
        })
        .collect()
}
