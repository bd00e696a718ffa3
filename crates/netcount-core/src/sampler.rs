//! One polling cycle: parse a captured buffer and fold it into the store.
//!
//! Parsing and applying are interleaved record by record, so when a buffer
//! turns out to be malformed halfway through, the interfaces decoded before
//! the bad record have already been updated and the rest keep their previous
//! values.

use std::time::Instant;

use serde::Serialize;

use crate::error::Result;
use crate::normalize::{NormalizePolicy, UpdateKind};
use crate::record::{RecordLayout, Records};
use crate::store::{InterfaceReport, StatStore};
use crate::table::InterfaceTable;

/// Layout and policy used by a [`Sampler`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SamplerConfig {
    pub layout: RecordLayout,
    pub policy: NormalizePolicy,
}

/// Counts for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Interface-info observations decoded.
    pub observations: usize,
    /// Records skipped by the parser.
    pub skipped: usize,
    pub initialized: usize,
    pub advanced: usize,
    pub stale: usize,
    /// Down interfaces whose state was left untouched.
    pub frozen: usize,
}

impl CycleSummary {
    fn record(&mut self, kind: UpdateKind) {
        self.observations += 1;
        match kind {
            UpdateKind::Initialized => self.initialized += 1,
            UpdateKind::Advanced => self.advanced += 1,
            UpdateKind::Stale => self.stale += 1,
            UpdateKind::Frozen => self.frozen += 1,
        }
    }
}

/// Owns the stat store and runs cycles against it.
#[derive(Debug, Clone)]
pub struct Sampler {
    config: SamplerConfig,
    store: StatStore,
    cycles: u64,
    failed_cycles: u64,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(SamplerConfig::default())
    }
}

impl Sampler {
    /// Create a sampler. The normalizer's counter width always follows the
    /// record layout's.
    pub fn new(mut config: SamplerConfig) -> Self {
        config.policy.counter_width = config.layout.counter_width;
        Self {
            config,
            store: StatStore::new(),
            cycles: 0,
            failed_cycles: 0,
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn store(&self) -> &StatStore {
        &self.store
    }

    /// Completed cycles, successful or not.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Cycles abandoned because of a malformed buffer.
    pub fn failed_cycles(&self) -> u64 {
        self.failed_cycles
    }

    /// Apply one captured buffer.
    ///
    /// Stops at the first malformed record and returns its error; the
    /// observations applied before it stay applied.
    pub fn ingest(&mut self, buffer: &[u8], captured_at: Instant) -> Result<CycleSummary> {
        self.cycles += 1;
        let mut summary = CycleSummary {
            cycle: self.cycles,
            ..CycleSummary::default()
        };

        let mut records = Records::new(buffer, self.config.layout);
        for item in records.by_ref() {
            let observation = match item {
                Ok(o) => o,
                Err(e) => {
                    self.failed_cycles += 1;
                    return Err(e.into());
                }
            };
            let kind = self
                .store
                .apply(&observation, captured_at, &self.config.policy);
            log::trace!("{}: {kind}", observation.name);
            summary.record(kind);
        }
        summary.skipped = records.skipped();

        log::debug!(
            "cycle {}: {} observed, {} skipped, {} new, {} advanced, {} stale, {} frozen",
            summary.cycle,
            summary.observations,
            summary.skipped,
            summary.initialized,
            summary.advanced,
            summary.stale,
            summary.frozen
        );
        Ok(summary)
    }

    /// Capture from `table` and ingest the result.
    pub fn poll<T: InterfaceTable + ?Sized>(&mut self, table: &mut T) -> Result<CycleSummary> {
        let capture = table.capture()?;
        self.ingest(capture.buffer, capture.captured_at)
    }

    /// Current totals and rates for every known interface.
    pub fn reports(&self) -> Vec<InterfaceReport> {
        self.store.reports()
    }
}
