//! Expand a counter path, wrap each match in a history and sample a few times.
//!
//! cargo run -p sparkmon-core --example composed -- '\\.\Processor(#ALL#)\% Processor Time'

use std::time::Duration;

use sparkmon_core::{CounterHistory, CounterPath, ProcfsCatalog, display, factory};

fn main() -> sparkmon_core::Result<()> {
    let raw = std::env::args()
        .nth(1)
        .unwrap_or_else(|| r"\\.\Memory\Committed Bytes".to_string());
    let path: CounterPath = raw.parse()?;

    let catalog = ProcfsCatalog::new();
    let mut histories: Vec<CounterHistory> = factory::from_path(&catalog, &path)?
        .into_iter()
        .map(|c| CounterHistory::with_capacity(c, 10))
        .collect();

    for tick in 1..=5 {
        println!("tick {tick}");
        for history in &mut histories {
            history.sample()?;
            println!("  {:<60} {}", history.counter().name(), display::label(history));
        }
        std::thread::sleep(Duration::from_millis(500));
    }

    for history in &histories {
        println!("\n{}", display::tooltip(history));
    }
    Ok(())
}
