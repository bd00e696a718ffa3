pub mod dump;
pub mod list;
pub mod monitor;
pub mod serve;
pub mod watch;

use std::path::Path;
use std::time::Duration;

use netcount_core::{InterfaceTable, NormalizePolicy, SamplerConfig};

/// Open the live interface table, or the replay file given with `--from`.
/// Exits with status 1 when neither is available.
pub fn open_table(from: Option<&Path>) -> Box<dyn InterfaceTable + Send> {
    match netcount_core::open_table(from) {
        Ok(table) => {
            log::debug!("reading interface table from {}", table.describe());
            table
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Parse a seconds flag into a duration, exiting on zero, negative or non-finite values.
pub fn seconds(flag: &str, value: f64) -> Duration {
    match Duration::try_from_secs_f64(value) {
        Ok(d) if !d.is_zero() => d,
        _ => {
            eprintln!("Error: --{flag} must be a positive number of seconds, got {value}");
            std::process::exit(1);
        }
    }
}

/// Sampler configuration for the Darwin layout with the given staleness threshold.
pub fn sampler_config(stale_after: Duration) -> SamplerConfig {
    SamplerConfig {
        policy: NormalizePolicy {
            stale_after,
            ..NormalizePolicy::default()
        },
        ..SamplerConfig::default()
    }
}

pub fn format_bytes(value: f64) -> String {
    format_scaled(value, 1024.0, &["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"])
}

pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}

fn format_scaled(value: f64, base: f64, units: &[&str]) -> String {
    let sign = if value.is_sign_negative() { "-" } else { "" };
    let mut v = value.abs();
    let mut idx = 0usize;
    while v >= base && idx < units.len() - 1 {
        v /= base;
        idx += 1;
    }
    format!("{sign}{v:.2}{}", units[idx])
}
