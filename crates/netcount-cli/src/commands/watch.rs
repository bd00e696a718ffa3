use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use netcount_core::{CycleSummary, InterfaceReport, Sampler};

use super::{format_bytes, format_rate};

pub struct WatchCommandConfig<'a> {
    pub from: Option<&'a Path>,
    pub interval: f64,
    pub stale_after: f64,
    pub count: u64,
    pub format: &'a str,
}

pub fn run(config: WatchCommandConfig<'_>) {
    let interval = super::seconds("interval", config.interval);
    let stale_after = super::seconds("stale-after", config.stale_after);
    let mut table = super::open_table(config.from);
    let mut sampler = Sampler::new(super::sampler_config(stale_after));
    let json = config.format == "json";

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    if !json {
        eprintln!(
            "Watching {} every {:.1}s (Ctrl+C to stop)",
            table.describe(),
            interval.as_secs_f64()
        );
    }

    let stdout = std::io::stdout();
    let mut cycles_run = 0u64;

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        cycles_run += 1;

        match sampler.poll(&mut table) {
            Ok(summary) => {
                let reports = sampler.reports();
                let mut out = stdout.lock();
                let written = if json {
                    write_json(&mut out, &summary, &reports)
                } else {
                    write_table(&mut out, &summary, &reports)
                };
                if written.and_then(|_| out.flush()).is_err() {
                    break; // Broken pipe
                }
            }
            Err(e) if e.is_malformed_buffer() => {
                log::warn!("skipping cycle {}: {e}", sampler.cycles());
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }

        if config.count > 0 && cycles_run >= config.count {
            break;
        }
        sleep_while(&running, interval.saturating_sub(started.elapsed()));
    }
}

/// Sleep for `duration`, waking early once `running` is cleared.
fn sleep_while(running: &AtomicBool, duration: Duration) {
    const STEP: Duration = Duration::from_millis(100);
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }
        std::thread::sleep(left.min(STEP));
    }
}

fn write_table(
    out: &mut impl Write,
    summary: &CycleSummary,
    reports: &[InterfaceReport],
) -> std::io::Result<()> {
    writeln!(
        out,
        "── cycle {} ── {} interface(s), {} new, {} stale, {} down",
        summary.cycle,
        reports.len(),
        summary.initialized,
        summary.stale,
        summary.frozen
    )?;
    writeln!(
        out,
        "  {:<16} {:>14} {:>14} {:>14} {:>14}",
        "Interface", "Total in", "Total out", "In rate", "Out rate"
    )?;
    for r in reports {
        writeln!(
            out,
            "  {:<16} {:>14} {:>14} {:>14} {:>14}",
            r.name,
            format_bytes(r.total_in as f64),
            format_bytes(r.total_out as f64),
            format_rate(r.in_rate),
            format_rate(r.out_rate)
        )?;
    }
    writeln!(out)
}

fn write_json(
    out: &mut impl Write,
    summary: &CycleSummary,
    reports: &[InterfaceReport],
) -> std::io::Result<()> {
    let line = serde_json::json!({
        "cycle": summary,
        "interfaces": reports,
    });
    writeln!(out, "{line}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reports() -> Vec<InterfaceReport> {
        vec![
            InterfaceReport {
                name: "en0".to_string(),
                total_in: 2048,
                total_out: 0,
                in_rate: 999.5,
                out_rate: 0.0,
            },
            InterfaceReport {
                name: "utun0".to_string(),
                total_in: 0,
                total_out: 0,
                in_rate: 0.0,
                out_rate: 0.0,
            },
        ]
    }

    #[test]
    fn table_has_header_and_one_row_per_interface() {
        let summary = CycleSummary {
            cycle: 2,
            observations: 2,
            advanced: 2,
            ..CycleSummary::default()
        };
        let mut buf = Vec::new();
        write_table(&mut buf, &summary, &reports()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("cycle 2"));
        assert!(text.contains("Total in"));
        assert!(text.contains("2.00KiB"));
        assert!(text.contains("999.50B/s"));
        assert_eq!(text.lines().filter(|l| l.contains("utun0")).count(), 1);
    }

    #[test]
    fn json_is_one_line_per_cycle() {
        let summary = CycleSummary {
            cycle: 1,
            ..CycleSummary::default()
        };
        let mut buf = Vec::new();
        write_json(&mut buf, &summary, &reports()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["cycle"]["cycle"], 1);
        assert_eq!(v["interfaces"][0]["name"], "en0");
        assert_eq!(v["interfaces"][0]["total_in"], 2048);
    }

    #[test]
    fn sleep_while_returns_early_when_stopped() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        sleep_while(&running, Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
