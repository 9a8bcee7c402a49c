//! `sparkmon watch`: tick the monitor headlessly and print every slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use sparkmon_core::display::Level;
use sparkmon_core::{Monitor, ProcfsCatalog, Slot, SlotGroup, TickReport};

/// One slot in a JSON tick report.
#[derive(Serialize)]
struct SlotJson<'a> {
    name: &'a str,
    group: SlotGroup,
    value: Option<f64>,
    ceiling: f64,
    real_max: f64,
    samples: usize,
    label: &'a str,
    level: Option<&'static str>,
    visible: bool,
    error: Option<String>,
}

/// One JSON line per tick.
#[derive(Serialize)]
struct TickJson<'a> {
    tick: u64,
    sampled: usize,
    slots: Vec<SlotJson<'a>>,
}

pub fn run(config_path: Option<&str>, refresh: Option<f64>, ticks: Option<u64>, json: bool) {
    let config = super::load_config(config_path, refresh);
    let catalog = ProcfsCatalog::new();
    let mut monitor = super::build_monitor(&config, &catalog);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: Ctrl+C handler unavailable: {e}");
    }

    let mut tick = 0u64;
    while running.load(Ordering::SeqCst) {
        if let Some(max) = ticks
            && tick >= max
        {
            break;
        }

        let started = Instant::now();
        let report = monitor.tick();
        tick += 1;

        if json {
            match serde_json::to_string(&tick_json(tick, &monitor, &report)) {
                Ok(line) => println!("{line}"),
                Err(e) => {
                    eprintln!("Error encoding tick {tick}: {e}");
                    std::process::exit(1);
                }
            }
        } else {
            print_table(tick, &monitor, &report);
        }

        if ticks.is_some_and(|max| tick >= max) {
            break;
        }
        wait(&running, monitor.refresh_interval().saturating_sub(started.elapsed()));
    }
}

/// Sleep in short steps so Ctrl+C is honoured promptly.
fn wait(running: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        std::thread::sleep(left.min(Duration::from_millis(50)));
    }
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Normal => "normal",
        Level::Warning => "warning",
        Level::Alert => "alert",
    }
}

fn slot_error(report: &TickReport, index: usize) -> Option<String> {
    report
        .errors
        .iter()
        .find(|e| e.index == index)
        .map(|e| e.error.to_string())
}

fn tick_json<'a>(tick: u64, monitor: &'a Monitor, report: &TickReport) -> TickJson<'a> {
    let slots = monitor
        .slots()
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            let history = slot.history();
            let readout = slot.readout();
            SlotJson {
                name: slot.name(),
                group: slot.group(),
                value: history.latest(),
                ceiling: readout.ceiling,
                real_max: history.real_max(),
                samples: history.count(),
                label: &readout.label,
                level: readout.level.map(level_name),
                visible: slot.is_visible(),
                error: slot_error(report, i),
            }
        })
        .collect();
    TickJson {
        tick,
        sampled: report.sampled,
        slots,
    }
}

fn slot_line(slot: &Slot, error: Option<&str>) -> String {
    let text = match error {
        Some(e) => format!("error: {e}"),
        None => slot.readout().label.clone(),
    };
    let marker = match slot.readout().level {
        Some(Level::Alert) => "!!",
        Some(Level::Warning) => "!",
        _ => "",
    };
    format!("  {:<28} {:<10} {text} {marker}", slot.name(), slot.group())
        .trim_end()
        .to_string()
}

fn print_table(tick: u64, monitor: &Monitor, report: &TickReport) {
    println!("tick #{tick}  ({} sampled, {} failed)", report.sampled, report.errors.len());
    for (i, slot) in monitor.slots().iter().enumerate() {
        if !slot.is_visible() {
            continue;
        }
        let error = slot_error(report, i);
        println!("{}", slot_line(slot, error.as_deref()));
    }
    println!();
}
