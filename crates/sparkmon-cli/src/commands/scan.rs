use std::time::Duration;

use log::debug;
use sparkmon_core::{CounterCatalog, CounterId, CounterPath, MetricSource, ProcfsCatalog};

/// Rate counters need two reads before they report anything.
const SETTLE: Duration = Duration::from_millis(250);

pub fn run(path: &str) {
    let path = match CounterPath::parse(path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let catalog = ProcfsCatalog::new();
    let ids = match path.expand(&catalog) {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("Error expanding {path}: {e}");
            std::process::exit(1);
        }
    };

    println!("Found {} counter(s) for {path}:\n", ids.len());

    let sources: Vec<_> = ids.iter().map(|id| catalog.open(id)).collect();
    prime(&ids, &sources);
    std::thread::sleep(SETTLE);

    for (id, source) in ids.iter().zip(&sources) {
        let reading = match source {
            Ok(s) => s.read().map(|v| format!("{v:.2}")).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match reading {
            Ok(v) => println!("  {:<60} {v}", id.to_string()),
            Err(e) => println!("  {:<60} unavailable ({e})", id.to_string()),
        }
    }

    if ids.is_empty() {
        println!("  (none found)");
    }
}

/// First read of every opened source. Returns how many failed.
fn prime(ids: &[CounterId], sources: &[sparkmon_core::Result<Box<dyn MetricSource>>]) -> usize {
    let mut failed = 0;
    for (id, source) in ids.iter().zip(sources) {
        if let Ok(source) = source
            && let Err(e) = source.read()
        {
            debug!("priming read of {id} failed: {e}");
            failed += 1;
        }
    }
    failed
}
