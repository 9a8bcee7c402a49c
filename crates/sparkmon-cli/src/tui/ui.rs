//! TUI rendering: one sparkline cell per visible slot.
//!
//! ┌──────────────────────────────────────────────┐
//! │  sparkmon    tick #42   every 2.0s           │
//! ├──────────────┬──────────────┬────────────────┤
//! │ CPU  12%     │ Physical mem │ Virtual memory │
//! │ ▁▂▂▃▅▂▁▁▂    │ ▅▅▅▅▅▅▆▆▆    │ ▃▃▃▃▃▃▃▃▃      │
//! ├──────────────┼──────────────┼────────────────┤
//! │ Network      │ Disk sda     │                │
//! │ ▁▁▇▁▁▁▂▁▁    │ ▁▁▁▁▃▁▁▁▁    │                │
//! ├──────────────┴──────────────┴────────────────┤
//! │  q: quit   r: disks   h/v: flow   d: details │
//! └──────────────────────────────────────────────┘

use super::app::{App, Flow};
use ratatui::{prelude::*, widgets::*};
use sparkmon_core::display::Level;
use sparkmon_core::{CounterCatalog, Slot};

pub fn draw<C: CounterCatalog>(f: &mut Frame, app: &App<C>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(4),    // grid
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);
    draw_grid(f, rows[1], app);
    draw_keys(f, rows[2]);
}

fn draw_title<C: CounterCatalog>(f: &mut Frame, area: Rect, app: &App<C>) {
    let refresh = app.monitor().refresh_interval().as_secs_f64();
    let paused = if app.paused() { "  PAUSED" } else { "" };
    let failed = match app.failed_last_tick() {
        0 => String::new(),
        n => format!("  {n} failed"),
    };
    let status = app
        .status()
        .map(|s| format!("  {s}"))
        .unwrap_or_default();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" sparkmon ", Style::default().bold().fg(Color::Cyan)),
            Span::styled(
                format!(
                    "  tick #{}  every {refresh:.1}s  {} flow",
                    app.tick_count(),
                    app.flow().label()
                ),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(paused, Style::default().bold().fg(Color::Yellow)),
            Span::styled(failed, Style::default().fg(Color::Red)),
            Span::styled(format!("{status} "), Style::default().fg(Color::DarkGray)),
        ]));

    f.render_widget(block, area);
}

fn draw_grid<C: CounterCatalog>(f: &mut Frame, area: Rect, app: &App<C>) {
    let slots: Vec<&Slot> = app.monitor().visible_slots().collect();
    if slots.is_empty() {
        let empty = Paragraph::new("  No counters to show.")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(empty, area);
        return;
    }

    let (row_count, col_count) = grid_shape(slots.len());
    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, row_count as u32); row_count])
        .split(area);
    let cells: Vec<Vec<Rect>> = row_areas
        .iter()
        .map(|row| {
            Layout::default()
                .direction(Direction::Horizontal)
                .constraints(vec![Constraint::Ratio(1, col_count as u32); col_count])
                .split(*row)
                .to_vec()
        })
        .collect();

    for (i, slot) in slots.iter().enumerate() {
        let (row, col) = cell_position(i, slots.len(), app.flow());
        draw_cell(f, cells[row][col], slot, app.details());
    }
}

/// Draws from the slot's readout only; redraws never read a source.
fn draw_cell(f: &mut Frame, area: Rect, slot: &Slot, details: bool) {
    let readout = slot.readout();
    let color = level_color(readout.level);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(Line::from(vec![
            Span::styled(format!(" {} ", slot.name()), Style::default().bold()),
            Span::styled(
                format!("{} ", readout.label),
                Style::default().fg(color),
            ),
        ]));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (chart_area, detail_area) = if details && inner.height > 3 {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(2)])
            .split(inner);
        (parts[0], Some(parts[1]))
    } else {
        (inner, None)
    };

    let data = sparkline_data(slot, chart_area.width as usize);
    let spark = Sparkline::default()
        .data(&data)
        .max(100)
        .style(Style::default().fg(color));
    f.render_widget(spark, chart_area);

    if let Some(detail_area) = detail_area {
        let tip = Paragraph::new(readout.tooltip.as_str())
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        f.render_widget(tip, detail_area);
    }
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(
        " q: quit   r: rescan disks   h/v: flow   d: details   p: pause   +/-: refresh rate",
    )
    .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}

fn level_color(level: Option<Level>) -> Color {
    match level {
        Some(Level::Normal) => Color::Green,
        Some(Level::Warning) => Color::Yellow,
        Some(Level::Alert) => Color::Red,
        None => Color::DarkGray,
    }
}

/// Rows and columns for `n` cells: a near-square grid, wider than tall.
fn grid_shape(n: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let cols = (n as f64).sqrt().ceil() as usize;
    (n.div_ceil(cols), cols)
}

/// Grid coordinates `(row, col)` of the `i`-th of `n` cells.
fn cell_position(i: usize, n: usize, flow: Flow) -> (usize, usize) {
    let (rows, cols) = grid_shape(n);
    match flow {
        Flow::Horizontal => (i / cols, i % cols),
        Flow::Vertical => (i % rows, i / rows),
    }
}

/// Bar heights in percent for the newest `width` samples, oldest first.
/// Samples with no defined ratio draw as empty bars.
fn sparkline_data(slot: &Slot, width: usize) -> Vec<u64> {
    let mut data: Vec<u64> = slot
        .readout()
        .ratios(slot.history())
        .into_iter()
        .take(width)
        .map(|r| r.map_or(0, |r| (r * 100.0).round() as u64))
        .collect();
    data.reverse();
    data
}
