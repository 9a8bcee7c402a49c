pub mod monitor;
pub mod scan;
pub mod watch;

use log::info;
use sparkmon_core::{CounterCatalog, Monitor, MonitorConfig};

/// Shortest refresh period accepted, from flags or layout files.
const MIN_REFRESH_MS: u64 = 100;

/// Load the layout file (or the stock layout) and apply the refresh override.
/// Exits the process on a bad file.
pub fn load_config(path: Option<&str>, refresh_secs: Option<f64>) -> MonitorConfig {
    let mut config = match path {
        Some(p) => match MonitorConfig::load(p) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading {p}: {e}");
                std::process::exit(1);
            }
        },
        None => MonitorConfig::default(),
    };
    if let Some(secs) = refresh_secs {
        config.refresh_ms = refresh_ms(secs);
    }
    config.refresh_ms = config.refresh_ms.max(MIN_REFRESH_MS);
    config
}

/// Seconds from the command line to whole milliseconds, never below the floor.
pub fn refresh_ms(secs: f64) -> u64 {
    let ms = (secs * 1000.0).round();
    if ms.is_nan() || ms < MIN_REFRESH_MS as f64 {
        MIN_REFRESH_MS
    } else {
        ms as u64
    }
}

/// Build every slot of `config`, exiting the process on the first failure.
pub fn build_monitor(config: &MonitorConfig, catalog: &dyn CounterCatalog) -> Monitor {
    match Monitor::from_config(config, catalog) {
        Ok(m) => {
            info!(
                "monitoring {} slot(s) every {:?}",
                m.len(),
                m.refresh_interval()
            );
            m
        }
        Err(e) => {
            eprintln!("Error building monitor: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_ms_conversion() {
        assert_eq!(refresh_ms(2.0), 2000);
        assert_eq!(refresh_ms(0.25), 250);
        assert_eq!(refresh_ms(1.5), 1500);
    }

    #[test]
    fn test_refresh_ms_floor() {
        assert_eq!(refresh_ms(0.0), MIN_REFRESH_MS);
        assert_eq!(refresh_ms(-3.0), MIN_REFRESH_MS);
        assert_eq!(refresh_ms(f64::NAN), MIN_REFRESH_MS);
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None);
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(load_config(None, Some(0.5)).refresh_ms, 500);
    }
}
