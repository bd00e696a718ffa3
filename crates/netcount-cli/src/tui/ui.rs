//! TUI rendering.
//!
//! ┌──────────────────────────────────────────────────────────┐
//! │  netcount   sysctl NET_RT_IFLIST   #42  0.1ms  every 2s  │
//! ├──────────────────────────────────────────────────────────┤
//! │  Interface      Total in   Total out   In rate  Out rate │
//! │▸ en0            1.20GiB    88.31MiB    1.2MiB/s  40KiB/s │
//! │  utun0          4.00KiB    3.10KiB     0.00B/s   0.00B/s │
//! ├──────────────────────────────────────────────────────────┤
//! │  2 interfaces  0 new  0 stale  1 down  sorted by name    │
//! ├──────────────────────────────────────────────────────────┤
//! │  ↑↓ navigate   s: sort   p: pause   r: refresh   q: quit │
//! └──────────────────────────────────────────────────────────┘

use super::app::App;
use crate::commands::{format_bytes, format_rate};
use ratatui::{prelude::*, widgets::*};

pub fn draw(f: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(5),    // interfaces
            Constraint::Length(3), // cycle summary
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app);
    draw_interfaces(f, rows[1], app);
    draw_summary(f, rows[2], app);
    draw_keys(f, rows[3]);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App) {
    let state = if app.is_paused() {
        Span::styled("  PAUSED", Style::default().bold().fg(Color::Yellow))
    } else {
        Span::raw("")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" netcount ", Style::default().bold().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(app.source(), Style::default().fg(Color::White)),
            Span::styled(
                format!(
                    "  #{}  {:.1}ms  every {:.2}s ",
                    app.cycle_count(),
                    app.last_ms(),
                    app.refresh_rate().as_secs_f64()
                ),
                Style::default().fg(Color::DarkGray),
            ),
            state,
        ]));

    let body = match app.last_error() {
        Some(e) => Paragraph::new(Span::styled(
            format!(" {e}"),
            Style::default().fg(Color::Red),
        )),
        None => Paragraph::new(""),
    };
    f.render_widget(body.block(block), area);
}

fn draw_interfaces(f: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(vec![
        "", "Interface", "Total in", "Total out", "In rate", "Out rate",
    ])
    .style(Style::default().bold().fg(Color::Cyan));

    let items: Vec<Row> = app
        .rows()
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let pointer = if i == app.cursor() { "▸" } else { " " };
            let style = if r.in_rate > 0.0 || r.out_rate > 0.0 {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::White)
            };
            Row::new(vec![
                pointer.to_string(),
                r.name.clone(),
                format_bytes(r.total_in as f64),
                format_bytes(r.total_out as f64),
                format_rate(r.in_rate),
                format_rate(r.out_rate),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        items,
        [
            Constraint::Length(2),  // pointer
            Constraint::Length(18), // name
            Constraint::Length(12), // total in
            Constraint::Length(12), // total out
            Constraint::Length(14), // in rate
            Constraint::Length(14), // out rate
        ],
    )
    .header(header)
    .row_highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Interfaces (sorted by {}) ", app.sort().label())),
    );

    let mut state = app.table_state();
    f.render_stateful_widget(table, area, &mut state);
}

fn draw_summary(f: &mut Frame, area: Rect, app: &App) {
    let text = match app.last_summary() {
        Some(s) => format!(
            " {} interface(s)  {} new  {} advanced  {} stale  {} down  {} skipped record(s)  {} malformed cycle(s)",
            app.rows().len(),
            s.initialized,
            s.advanced,
            s.stale,
            s.frozen,
            s.skipped,
            app.malformed_cycles()
        ),
        None => " waiting for first cycle".to_string(),
    };
    let p = Paragraph::new(text)
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL).title(" Last cycle "));
    f.render_widget(p, area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(
        " ↑↓ navigate   s: sort   p: pause   r: refresh   +/-: speed   q: quit",
    )
    .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}
