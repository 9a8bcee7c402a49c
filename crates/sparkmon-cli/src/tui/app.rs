//! TUI application state and event loop.
//!
//! The monitor is ticked on the UI thread: a tick is a handful of small file
//! reads, far below one frame.

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use sparkmon_core::{CounterCatalog, Monitor};

/// Refresh bounds reachable with `+` / `-`.
const MIN_REFRESH: Duration = Duration::from_millis(100);
const MAX_REFRESH: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// Order in which cells fill the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Left to right, then down.
    #[default]
    Horizontal,
    /// Top to bottom, then right.
    Vertical,
}

impl Flow {
    pub fn label(self) -> &'static str {
        match self {
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        }
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App<C: CounterCatalog> {
    monitor: Monitor,
    catalog: C,
    running: bool,
    paused: bool,
    details: bool,
    flow: Flow,
    tick_count: u64,
    failed_last_tick: usize,
    /// Last notice to surface in the title bar.
    status: Option<String>,
}

impl<C: CounterCatalog> App<C> {
    pub fn new(monitor: Monitor, catalog: C) -> Self {
        Self {
            monitor,
            catalog,
            running: true,
            paused: false,
            details: false,
            flow: Flow::default(),
            tick_count: 0,
            failed_last_tick: 0,
            status: None,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Install panic hook that restores terminal before printing the panic.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        self.tick();
        let mut last_tick = Instant::now();

        while self.running() {
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(Duration::from_millis(50))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }

            if last_tick.elapsed() >= self.monitor.refresh_interval() {
                if !self.paused {
                    self.tick();
                }
                last_tick = Instant::now();
            }
        }

        Ok(())
    }

    pub(crate) fn tick(&mut self) {
        let report = self.monitor.tick();
        self.tick_count += 1;
        self.failed_last_tick = report.errors.len();
    }

    pub(crate) fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('r') | KeyCode::Char('R') => self.refresh_disks(),
            KeyCode::Char('h') => self.flow = Flow::Horizontal,
            KeyCode::Char('v') => self.flow = Flow::Vertical,
            KeyCode::Char('d') => self.details = !self.details,
            KeyCode::Char('p') | KeyCode::Char(' ') => self.paused = !self.paused,
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let next = (self.monitor.refresh_interval() / 2).max(MIN_REFRESH);
                self.monitor.set_refresh_interval(next);
            }
            KeyCode::Char('-') => {
                let next = (self.monitor.refresh_interval() * 2).min(MAX_REFRESH);
                self.monitor.set_refresh_interval(next);
            }
            _ => {}
        }
    }

    fn refresh_disks(&mut self) {
        self.status = Some(match self.monitor.refresh_disks(&self.catalog) {
            Ok(n) => format!("{n} disk(s)"),
            Err(e) => format!("disk refresh failed: {e}"),
        });
    }

    // -- accessors for the renderer --

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn details(&self) -> bool {
        self.details
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn failed_last_tick(&self) -> usize {
        self.failed_last_tick
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn running(&self) -> bool {
        self.running
    }
}
