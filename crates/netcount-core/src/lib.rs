//! # netcount-core
//!
//! **Stable byte totals and rates from wrapping kernel interface counters.**
//!
//! The kernel's interface table reports per-interface byte counters that are
//! only 32 bits wide on Darwin, wrap every 4 GiB, and are sampled at whatever
//! cadence the caller manages. `netcount-core` turns a stream of those raw
//! tables into a monotonically accumulated 64-bit total and a throughput rate
//! per interface.
//!
//! ## Quick Start
//!
//! ```no_run
//! use netcount_core::{Sampler, SamplerConfig, open_table};
//!
//! let mut table = open_table(None).expect("interface table");
//! let mut sampler = Sampler::new(SamplerConfig::default());
//!
//! for _ in 0..2 {
//!     sampler.poll(&mut table).expect("cycle");
//!     std::thread::sleep(std::time::Duration::from_secs(2));
//! }
//! for r in sampler.reports() {
//!     println!("{}: {} in, {:.0} B/s", r.name, r.total_in, r.in_rate);
//! }
//! ```
//!
//! ## Architecture
//!
//! Interface table → Record parser → Counter normalizer ⇄ Stat store → Reports
//!
//! - [`record`] decodes the variable-length `RTM_IFINFO` records of a
//!   `NET_RT_IFLIST` buffer into [`RawObservation`]s, skipping other record
//!   kinds, loopback interfaces, non link-layer addresses and unnamed entries.
//! - [`normalize`] applies single-wrap correction, accumulates totals, and
//!   derives rates, zeroing them when samples are more than a minute apart.
//! - [`store`] keeps the latest [`InterfaceState`] per interface name.
//! - [`sampler`] owns the store and runs one cycle per captured buffer.
//! - [`table`] acquires buffers from the kernel or replays a dumped one.

pub mod counter;
pub mod error;
pub mod normalize;
pub mod record;
pub mod sampler;
pub mod store;
pub mod table;

pub use counter::{CounterWidth, InvalidCounterWidth};
pub use error::{Error, ParseError, ParseErrorKind, Result};
pub use normalize::{
    DEFAULT_RATE_EPSILON_SECS, DEFAULT_STALE_AFTER, InterfaceState, NormalizePolicy, Normalized,
    UpdateKind, normalize,
};
pub use record::{RawObservation, RecordLayout, Records, parse};
pub use sampler::{CycleSummary, Sampler, SamplerConfig};
pub use store::{InterfaceReport, StatStore};
pub use table::{Capture, InterfaceTable, ReplayTable, SysctlTable, open_table};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
