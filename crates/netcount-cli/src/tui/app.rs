//! TUI application state and event loop.
//!
//! The app owns its sampler and interface table; each refresh runs one cycle
//! on the UI thread. Capture and parse take microseconds, so nothing is
//! pushed to a background thread.

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use ratatui::widgets::TableState;

use netcount_core::{CycleSummary, InterfaceReport, InterfaceTable, Sampler, SamplerConfig};

// ---------------------------------------------------------------------------
// SortKey
// ---------------------------------------------------------------------------

/// Column the interface table is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    TotalIn,
    TotalOut,
    InRate,
    OutRate,
}

impl SortKey {
    pub fn next(self) -> Self {
        match self {
            Self::Name => Self::TotalIn,
            Self::TotalIn => Self::TotalOut,
            Self::TotalOut => Self::InRate,
            Self::InRate => Self::OutRate,
            Self::OutRate => Self::Name,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::TotalIn => "total in",
            Self::TotalOut => "total out",
            Self::InRate => "in rate",
            Self::OutRate => "out rate",
        }
    }
}

/// Order reports by `key`; numeric columns sort largest first, ties by name.
pub fn sort_reports(reports: &mut [InterfaceReport], key: SortKey) {
    reports.sort_by(|a, b| {
        let ord = match key {
            SortKey::Name => std::cmp::Ordering::Equal,
            SortKey::TotalIn => b.total_in.cmp(&a.total_in),
            SortKey::TotalOut => b.total_out.cmp(&a.total_out),
            SortKey::InRate => b.in_rate.total_cmp(&a.in_rate),
            SortKey::OutRate => b.out_rate.total_cmp(&a.out_rate),
        };
        ord.then_with(|| a.name.cmp(&b.name))
    });
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    table: Box<dyn InterfaceTable + Send>,
    source: String,
    sampler: Sampler,
    refresh_rate: Duration,
    running: bool,
    paused: bool,
    sort: SortKey,
    cursor: usize,
    table_state: TableState,
    rows: Vec<InterfaceReport>,
    last_summary: Option<CycleSummary>,
    /// Error from the last cycle, shown until a cycle succeeds.
    last_error: Option<String>,
    last_ms: f64,
}

impl App {
    pub fn new(
        table: Box<dyn InterfaceTable + Send>,
        config: SamplerConfig,
        refresh_rate: Duration,
    ) -> Self {
        let source = table.describe();
        Self {
            table,
            source,
            sampler: Sampler::new(config),
            refresh_rate,
            running: true,
            paused: false,
            sort: SortKey::default(),
            cursor: 0,
            table_state: TableState::default().with_selected(Some(0)),
            rows: Vec::new(),
            last_summary: None,
            last_error: None,
            last_ms: 0.0,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Restore the terminal before printing a panic.
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

        while self.running {
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(Duration::from_millis(50))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }

            if last_tick.elapsed() >= self.refresh_rate {
                if !self.paused {
                    self.tick();
                }
                last_tick = Instant::now();
            }
        }

        Ok(())
    }

    /// Run one sampling cycle and refresh the displayed rows.
    pub fn tick(&mut self) {
        let started = Instant::now();
        match self.sampler.poll(&mut self.table) {
            Ok(summary) => {
                self.last_summary = Some(summary);
                self.last_error = None;
            }
            Err(e) => {
                log::warn!("cycle {} failed: {e}", self.sampler.cycles());
                self.last_error = Some(e.to_string());
            }
        }
        self.last_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.refresh_rows();
    }

    fn refresh_rows(&mut self) {
        self.rows = self.sampler.reports();
        sort_reports(&mut self.rows, self.sort);
        if self.cursor >= self.rows.len() {
            self.cursor = self.rows.len().saturating_sub(1);
        }
        self.table_state.select(Some(self.cursor));
    }

    pub fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Up | KeyCode::Char('k') => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.table_state.select(Some(self.cursor));
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor < self.rows.len().saturating_sub(1) {
                    self.cursor += 1;
                    self.table_state.select(Some(self.cursor));
                }
            }
            KeyCode::Char('p') => self.paused = !self.paused,
            KeyCode::Char('s') => {
                self.sort = self.sort.next();
                self.refresh_rows();
            }
            KeyCode::Char('r') => self.tick(),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Char(']') => {
                let secs = (self.refresh_rate.as_secs_f64() / 2.0).max(0.25);
                self.refresh_rate = Duration::from_secs_f64(secs);
            }
            KeyCode::Char('-') | KeyCode::Char('[') => {
                let secs = (self.refresh_rate.as_secs_f64() * 2.0).min(30.0);
                self.refresh_rate = Duration::from_secs_f64(secs);
            }
            _ => {}
        }
    }

    // -- accessors for ui -----------------------------------------------

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rows(&self) -> &[InterfaceReport] {
        &self.rows
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn table_state(&self) -> TableState {
        self.table_state.clone()
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn refresh_rate(&self) -> Duration {
        self.refresh_rate
    }

    pub fn cycle_count(&self) -> u64 {
        self.sampler.cycles()
    }

    pub fn malformed_cycles(&self) -> u64 {
        self.sampler.failed_cycles()
    }

    pub fn last_summary(&self) -> Option<&CycleSummary> {
        self.last_summary.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_ms(&self) -> f64 {
        self.last_ms
    }
}
