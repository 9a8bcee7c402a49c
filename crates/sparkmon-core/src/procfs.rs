//! Linux counter catalog backed by `/proc` and `/sys`.
//!
//! | category | instances | counters |
//! |---|---|---|
//! | `Processor` | `0..n`, `_Total` | `% Processor Time` (jiffy delta of `/proc/stat`) |
//! | `Memory` | none | `Available Bytes`, `Total Bytes`, `Committed Bytes`, `Commit Limit` |
//! | `Network Interface` | interface names | `Bytes Total/sec`, `Bytes Received/sec`, `Bytes Sent/sec` |
//! | `PhysicalDisk` | whole-disk devices, `_Total` | `% Idle Time` (`io_ticks` delta of `/proc/diskstats`) |
//! | `Processor Frequency` | `0..n`, `_Total` | `Current MHz`, `Maximum MHz` (cpufreq) |
//!
//! Rate and delta counters keep their previous reading inside the source, so
//! the first read of a fresh source has no interval to measure against: CPU
//! load falls back to the since-boot average, throughput reads 0 and disks
//! read fully idle.
//!
//! Only the local machine (`.` or empty) is served. On hosts without procfs
//! every category reports [`Error::SourceUnavailable`].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use log::debug;

use crate::error::{Error, Result};
use crate::source::{CounterCatalog, CounterId, MetricSource, TOTAL_INSTANCE, names};

/// Catalog reading live counters from procfs and sysfs.
#[derive(Debug, Clone)]
pub struct ProcfsCatalog {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl Default for ProcfsCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Processor,
    Memory,
    Network,
    Disk,
    Frequency,
}

impl Category {
    fn parse(name: &str) -> Result<Self> {
        match name {
            names::PROCESSOR => Ok(Self::Processor),
            names::MEMORY => Ok(Self::Memory),
            names::NETWORK_INTERFACE => Ok(Self::Network),
            names::PHYSICAL_DISK => Ok(Self::Disk),
            names::PROCESSOR_FREQUENCY => Ok(Self::Frequency),
            other => Err(Error::unavailable(format!("unknown category '{other}'"))),
        }
    }

    fn counters(self) -> &'static [&'static str] {
        match self {
            Self::Processor => &[names::PROCESSOR_TIME],
            Self::Memory => &[
                names::AVAILABLE_BYTES,
                names::TOTAL_BYTES,
                names::COMMITTED_BYTES,
                names::COMMIT_LIMIT,
            ],
            Self::Network => &[
                names::BYTES_TOTAL_PER_SEC,
                names::BYTES_RECEIVED_PER_SEC,
                names::BYTES_SENT_PER_SEC,
            ],
            Self::Disk => &[names::IDLE_TIME],
            Self::Frequency => &[names::CURRENT_MHZ, names::MAXIMUM_MHZ],
        }
    }

    fn single_instance(self) -> bool {
        self == Self::Memory
    }
}

impl ProcfsCatalog {
    pub fn new() -> Self {
        Self::with_roots("/proc", "/sys")
    }

    /// Catalog reading from alternate procfs and sysfs mount points.
    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    fn check_machine(machine: &str) -> Result<()> {
        if machine.is_empty() || machine == "." {
            Ok(())
        } else {
            Err(Error::unavailable(format!(
                "remote machine '{machine}' is not supported"
            )))
        }
    }

    fn proc_file(&self, name: &str) -> PathBuf {
        self.proc_root.join(name)
    }

    fn cpufreq_root(&self) -> PathBuf {
        self.sys_root.join("devices/system/cpu")
    }

    fn processor_instances(&self) -> Result<Vec<String>> {
        let stat = read(&self.proc_file("stat"))?;
        Ok(parse_stat(&stat)
            .into_iter()
            .map(|(key, _)| stat_instance(&key))
            .collect())
    }

    fn network_instances(&self) -> Result<Vec<String>> {
        let dev = read(&self.proc_file("net/dev"))?;
        Ok(parse_net_dev(&dev)
            .into_iter()
            .map(|(name, _, _)| name)
            .collect())
    }

    fn disk_instances(&self) -> Result<Vec<String>> {
        let stats = read(&self.proc_file("diskstats"))?;
        let mut disks: Vec<String> = parse_diskstats(&stats)
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| is_whole_disk(&self.sys_root, name))
            .collect();
        disks.push(TOTAL_INSTANCE.to_string());
        Ok(disks)
    }

    fn frequency_instances(&self) -> Result<Vec<String>> {
        let mut cpus = cpufreq_cpus(&self.cpufreq_root())?;
        if !cpus.is_empty() {
            cpus.push(TOTAL_INSTANCE.to_string());
        }
        Ok(cpus)
    }

    fn check_instance(
        &self,
        category: Category,
        name: &str,
        instance: Option<&str>,
    ) -> Result<()> {
        match (category.single_instance(), instance) {
            (true, None) => Ok(()),
            (true, Some(i)) => Err(Error::unavailable(format!(
                "category '{name}' has no instance '{i}'"
            ))),
            (false, None) => Err(Error::unavailable(format!(
                "category '{name}' needs an instance"
            ))),
            (false, Some(i)) => {
                if self.instances(".", name)?.iter().any(|known| known == i) {
                    Ok(())
                } else {
                    Err(Error::unavailable(format!(
                        "category '{name}' has no instance '{i}'"
                    )))
                }
            }
        }
    }
}

impl CounterCatalog for ProcfsCatalog {
    fn instances(&self, machine: &str, category: &str) -> Result<Vec<String>> {
        Self::check_machine(machine)?;
        match Category::parse(category)? {
            Category::Processor => self.processor_instances(),
            Category::Memory => Ok(Vec::new()),
            Category::Network => self.network_instances(),
            Category::Disk => self.disk_instances(),
            Category::Frequency => self.frequency_instances(),
        }
    }

    fn counters(
        &self,
        machine: &str,
        category: &str,
        instance: Option<&str>,
    ) -> Result<Vec<String>> {
        Self::check_machine(machine)?;
        let cat = Category::parse(category)?;
        self.check_instance(cat, category, instance)?;
        Ok(cat.counters().iter().map(|c| c.to_string()).collect())
    }

    fn open(&self, id: &CounterId) -> Result<Box<dyn MetricSource>> {
        Self::check_machine(&id.machine)?;
        let category = Category::parse(&id.category)?;
        if !category.counters().contains(&id.counter.as_str()) {
            return Err(Error::unavailable(format!("no such counter {id}")));
        }
        self.check_instance(category, &id.category, id.instance.as_deref())?;
        let instance = id.instance.clone().unwrap_or_default();

        let source: Box<dyn MetricSource> = match category {
            Category::Processor => Box::new(CpuTimeSource {
                id: id.clone(),
                stat: self.proc_file("stat"),
                key: stat_key(&instance),
                last: Mutex::new(None),
            }),
            Category::Memory => Box::new(MeminfoSource {
                id: id.clone(),
                meminfo: self.proc_file("meminfo"),
                field: meminfo_field(&id.counter),
            }),
            Category::Network => Box::new(NetRateSource {
                id: id.clone(),
                dev: self.proc_file("net/dev"),
                interface: instance,
                direction: Direction::of(&id.counter),
                last: Mutex::new(None),
            }),
            Category::Disk => Box::new(DiskIdleSource {
                id: id.clone(),
                diskstats: self.proc_file("diskstats"),
                sys_root: self.sys_root.clone(),
                device: (instance != TOTAL_INSTANCE).then_some(instance),
                last: Mutex::new(None),
            }),
            Category::Frequency => Box::new(FrequencySource {
                id: id.clone(),
                cpu_root: self.cpufreq_root(),
                cpu: (instance != TOTAL_INSTANCE).then_some(instance),
                maximum: id.counter == names::MAXIMUM_MHZ,
            }),
        };
        debug!("opened {id}");
        Ok(source)
    }
}

// ---------------------------------------------------------------------------
// File parsing
// ---------------------------------------------------------------------------

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::unavailable(format!("{}: {e}", path.display())))
}

/// Cumulative jiffies of one `/proc/stat` cpu line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

/// `(key, times)` for the aggregate `cpu` line and every `cpuN` line.
fn parse_stat(text: &str) -> Vec<(String, CpuTimes)> {
    let mut out = Vec::new();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let Some(key) = fields.next() else {
            continue;
        };
        if !key.starts_with("cpu") {
            continue;
        }
        // user nice system idle iowait irq softirq steal
        let values: Vec<u64> = fields.take(8).filter_map(|v| v.parse().ok()).collect();
        if values.len() < 4 {
            continue;
        }
        let idle = values[3] + values.get(4).copied().unwrap_or(0);
        let total: u64 = values.iter().sum();
        out.push((
            key.to_string(),
            CpuTimes {
                busy: total.saturating_sub(idle),
                total,
            },
        ));
    }
    out
}

fn stat_instance(key: &str) -> String {
    match key.strip_prefix("cpu") {
        Some("") | None => TOTAL_INSTANCE.to_string(),
        Some(n) => n.to_string(),
    }
}

fn stat_key(instance: &str) -> String {
    if instance == TOTAL_INSTANCE {
        "cpu".to_string()
    } else {
        format!("cpu{instance}")
    }
}

/// Busy percentage over the interval between two samples, or since boot.
fn busy_percent(prev: Option<CpuTimes>, now: CpuTimes) -> Option<f64> {
    let (busy, total) = match prev {
        Some(p) => (
            now.busy.saturating_sub(p.busy),
            now.total.saturating_sub(p.total),
        ),
        None => (now.busy, now.total),
    };
    (total > 0).then(|| busy as f64 / total as f64 * 100.0)
}

/// Value of a `/proc/meminfo` field, converted from kB to bytes.
fn meminfo_bytes(text: &str, field: &str) -> Option<f64> {
    text.lines().find_map(|line| {
        let (key, rest) = line.split_once(':')?;
        if key.trim() != field {
            return None;
        }
        let kb: f64 = rest.split_whitespace().next()?.parse().ok()?;
        Some(kb * 1024.0)
    })
}

fn meminfo_field(counter: &str) -> &'static str {
    match counter {
        names::AVAILABLE_BYTES => "MemAvailable",
        names::TOTAL_BYTES => "MemTotal",
        names::COMMITTED_BYTES => "Committed_AS",
        _ => "CommitLimit",
    }
}

/// Installed memory from `sysconf`, for kernels that hide `MemTotal`.
#[cfg(unix)]
fn physical_memory_bytes() -> Option<f64> {
    // SAFETY: sysconf only reads system configuration values.
    let (pages, page_size) =
        unsafe { (libc::sysconf(libc::_SC_PHYS_PAGES), libc::sysconf(libc::_SC_PAGESIZE)) };
    (pages > 0 && page_size > 0).then(|| pages as f64 * page_size as f64)
}

#[cfg(not(unix))]
fn physical_memory_bytes() -> Option<f64> {
    None
}

/// `(interface, rx_bytes, tx_bytes)` per `/proc/net/dev` row.
fn parse_net_dev(text: &str) -> Vec<(String, u64, u64)> {
    text.lines()
        .filter_map(|line| {
            let (name, rest) = line.split_once(':')?;
            let fields: Vec<u64> = rest
                .split_whitespace()
                .filter_map(|v| v.parse().ok())
                .collect();
            if fields.len() < 9 {
                return None;
            }
            Some((name.trim().to_string(), fields[0], fields[8]))
        })
        .collect()
}

/// `(device, io_ticks)` per `/proc/diskstats` row.
fn parse_diskstats(text: &str) -> Vec<(String, u64)> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            // major minor name, then io_ticks is the tenth statistic
            let ticks = fields.get(12)?.parse().ok()?;
            Some((fields[2].to_string(), ticks))
        })
        .collect()
}

/// Whole disks appear under `/sys/block`; partitions and virtual devices are skipped.
fn is_whole_disk(sys_root: &Path, name: &str) -> bool {
    if ["loop", "ram", "zram"].iter().any(|p| name.starts_with(p)) {
        return false;
    }
    let block = sys_root.join("block");
    !block.is_dir() || block.join(name).exists()
}

/// CPU numbers exposing a `cpufreq` directory, sorted numerically.
fn cpufreq_cpus(cpu_root: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(cpu_root)
        .map_err(|e| Error::unavailable(format!("{}: {e}", cpu_root.display())))?;
    let mut cpus: Vec<u32> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let n: u32 = name.to_str()?.strip_prefix("cpu")?.parse().ok()?;
            entry.path().join("cpufreq").is_dir().then_some(n)
        })
        .collect();
    cpus.sort_unstable();
    Ok(cpus.into_iter().map(|n| n.to_string()).collect())
}

/// First readable kHz value among `files`, in MHz.
fn read_mhz(dir: &Path, files: &[&str]) -> Result<f64> {
    files
        .iter()
        .find_map(|f| {
            std::fs::read_to_string(dir.join(f))
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
        })
        .map(|khz| khz / 1000.0)
        .ok_or_else(|| Error::unavailable(format!("{}: no frequency reading", dir.display())))
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

struct CpuTimeSource {
    id: CounterId,
    stat: PathBuf,
    key: String,
    /// Previous sample and the value derived from it.
    last: Mutex<Option<(CpuTimes, f64)>>,
}

impl MetricSource for CpuTimeSource {
    fn read(&self) -> Result<f64> {
        let stat = read(&self.stat)?;
        let now = parse_stat(&stat)
            .into_iter()
            .find(|(key, _)| *key == self.key)
            .map(|(_, times)| times)
            .ok_or_else(|| Error::unavailable(self.id.to_string()))?;
        let mut last = lock(&self.last);
        let previous = *last;
        // No elapsed jiffies: repeat the previous value.
        let value = busy_percent(previous.map(|(times, _)| times), now)
            .or(previous.map(|(_, v)| v))
            .unwrap_or(0.0);
        *last = Some((now, value));
        Ok(value)
    }

    fn id(&self) -> Option<&CounterId> {
        Some(&self.id)
    }
}

struct MeminfoSource {
    id: CounterId,
    meminfo: PathBuf,
    field: &'static str,
}

impl MetricSource for MeminfoSource {
    fn read(&self) -> Result<f64> {
        let text = read(&self.meminfo)?;
        meminfo_bytes(&text, self.field)
            .or_else(|| {
                (self.field == "MemTotal")
                    .then(physical_memory_bytes)
                    .flatten()
            })
            .ok_or_else(|| Error::unavailable(format!("{}: no {}", self.id, self.field)))
    }

    fn id(&self) -> Option<&CounterId> {
        Some(&self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Both,
    Received,
    Sent,
}

impl Direction {
    fn of(counter: &str) -> Self {
        match counter {
            names::BYTES_RECEIVED_PER_SEC => Self::Received,
            names::BYTES_SENT_PER_SEC => Self::Sent,
            _ => Self::Both,
        }
    }

    fn pick(self, rx: u64, tx: u64) -> u64 {
        match self {
            Self::Both => rx.saturating_add(tx),
            Self::Received => rx,
            Self::Sent => tx,
        }
    }
}

struct NetRateSource {
    id: CounterId,
    dev: PathBuf,
    interface: String,
    direction: Direction,
    last: Mutex<Option<(u64, Instant)>>,
}

impl MetricSource for NetRateSource {
    fn read(&self) -> Result<f64> {
        let text = read(&self.dev)?;
        let bytes = parse_net_dev(&text)
            .into_iter()
            .find(|(name, _, _)| *name == self.interface)
            .map(|(_, rx, tx)| self.direction.pick(rx, tx))
            .ok_or_else(|| Error::unavailable(self.id.to_string()))?;
        let now = Instant::now();
        let mut last = lock(&self.last);
        let rate = match *last {
            Some((prev, at)) => {
                let secs = now.duration_since(at).as_secs_f64();
                if secs > 0.0 {
                    bytes.saturating_sub(prev) as f64 / secs
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        *last = Some((bytes, now));
        Ok(rate)
    }

    fn id(&self) -> Option<&CounterId> {
        Some(&self.id)
    }
}

struct DiskIdleSource {
    id: CounterId,
    diskstats: PathBuf,
    sys_root: PathBuf,
    /// `None` averages every whole disk.
    device: Option<String>,
    last: Mutex<Option<(u64, Instant)>>,
}

impl DiskIdleSource {
    /// Summed io_ticks (ms) and the number of disks contributing.
    fn ticks(&self) -> Result<(u64, u64)> {
        let text = read(&self.diskstats)?;
        let rows = parse_diskstats(&text);
        match &self.device {
            Some(device) => rows
                .into_iter()
                .find(|(name, _)| name == device)
                .map(|(_, ticks)| (ticks, 1))
                .ok_or_else(|| Error::unavailable(self.id.to_string())),
            None => Ok(rows
                .into_iter()
                .filter(|(name, _)| is_whole_disk(&self.sys_root, name))
                .fold((0, 0), |(sum, n), (_, ticks)| (sum + ticks, n + 1))),
        }
    }
}

impl MetricSource for DiskIdleSource {
    fn read(&self) -> Result<f64> {
        let (ticks, disks) = self.ticks()?;
        let now = Instant::now();
        let mut last = lock(&self.last);
        let idle = match *last {
            Some((prev, at)) if disks > 0 => {
                let window_ms = now.duration_since(at).as_secs_f64() * 1000.0 * disks as f64;
                let busy = if window_ms > 0.0 {
                    ticks.saturating_sub(prev) as f64 / window_ms * 100.0
                } else {
                    0.0
                };
                100.0 - busy.clamp(0.0, 100.0)
            }
            _ => 100.0,
        };
        *last = Some((ticks, now));
        Ok(idle)
    }

    fn id(&self) -> Option<&CounterId> {
        Some(&self.id)
    }
}

struct FrequencySource {
    id: CounterId,
    cpu_root: PathBuf,
    /// `None` averages every cpu.
    cpu: Option<String>,
    maximum: bool,
}

impl FrequencySource {
    fn read_cpu(&self, cpu: &str) -> Result<f64> {
        let dir = self.cpu_root.join(format!("cpu{cpu}/cpufreq"));
        if self.maximum {
            read_mhz(&dir, &["cpuinfo_max_freq", "scaling_max_freq"])
        } else {
            read_mhz(&dir, &["scaling_cur_freq", "cpuinfo_cur_freq"])
        }
    }
}

impl MetricSource for FrequencySource {
    fn read(&self) -> Result<f64> {
        match &self.cpu {
            Some(cpu) => self.read_cpu(cpu),
            None => {
                let cpus = cpufreq_cpus(&self.cpu_root)?;
                if cpus.is_empty() {
                    return Err(Error::unavailable(self.id.to_string()));
                }
                let mut sum = 0.0;
                for cpu in &cpus {
                    sum += self.read_cpu(cpu)?;
                }
                Ok(sum / cpus.len() as f64)
            }
        }
    }

    fn id(&self) -> Option<&CounterId> {
        Some(&self.id)
    }
}
