//! Monitor layout loaded from JSON.
//!
//! ```json
//! {
//!   "refresh_ms": 2000,
//!   "history_size": 100,
//!   "slots": [
//!     { "type": "predefined", "value": "CPU" },
//!     { "type": "counter", "value": "\\\\.\\Memory\\Available Bytes", "auto_hide": true }
//!   ]
//! }
//! ```
//!
//! Every field is optional; missing ones take the stock defaults.

use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::factory::Predefined;
use crate::history::HISTORY_SIZE;
use crate::path::CounterPath;

/// Default sampling period.
pub const DEFAULT_REFRESH_MS: u64 = 2000;

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub refresh_ms: u64,
    pub history_size: usize,
    pub slots: Vec<SlotConfig>,
}

/// One configured row, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    #[serde(default)]
    pub auto_hide: bool,
}

/// What a validated slot row builds.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotSpec {
    Predefined(Predefined),
    Path(CounterPath),
}

impl SlotConfig {
    pub fn predefined(kind: Predefined) -> Self {
        Self {
            kind: "predefined".to_string(),
            value: kind.config_name().to_string(),
            auto_hide: false,
        }
    }

    pub fn counter(path: impl Into<String>) -> Self {
        Self {
            kind: "counter".to_string(),
            value: path.into(),
            auto_hide: false,
        }
    }

    pub fn auto_hide(mut self, on: bool) -> Self {
        self.auto_hide = on;
        self
    }

    pub fn spec(&self) -> Result<SlotSpec> {
        match self.kind.as_str() {
            "predefined" => Ok(SlotSpec::Predefined(self.value.parse()?)),
            "counter" | "specific" => Ok(SlotSpec::Path(CounterPath::parse(&self.value)?)),
            other => Err(Error::UnknownConfigurationKind {
                kind: other.to_string(),
                value: self.value.clone(),
            }),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_ms: DEFAULT_REFRESH_MS,
            history_size: HISTORY_SIZE,
            slots: [
                Predefined::Cpu,
                Predefined::PhysicalMemory,
                Predefined::VirtualMemory,
                Predefined::Network,
                Predefined::Disk,
            ]
            .into_iter()
            .map(SlotConfig::predefined)
            .collect(),
        }
    }
}

impl MonitorConfig {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw)?;
        debug!(
            "loaded {} slot(s) from {}",
            config.slots.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate a configuration document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every slot row, returning what each one builds.
    ///
    /// `Disk` may appear at most once: the disk set is rebuilt as one block
    /// when drives come and go.
    pub fn validate(&self) -> Result<Vec<SlotSpec>> {
        let specs = self
            .slots
            .iter()
            .map(SlotConfig::spec)
            .collect::<Result<Vec<_>>>()?;
        let disk = SlotSpec::Predefined(Predefined::Disk);
        if specs.iter().filter(|s| **s == disk).count() > 1 {
            return Err(Error::DuplicateSlot(Predefined::Disk.to_string()));
        }
        Ok(specs)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}
