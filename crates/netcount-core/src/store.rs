//! Per-interface state store.

use std::collections::HashMap;
use std::collections::hash_map;
use std::time::Instant;

use serde::Serialize;

use crate::normalize::{InterfaceState, NormalizePolicy, UpdateKind, normalize};
use crate::record::RawObservation;

/// One interface's published totals and rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceReport {
    pub name: String,
    pub total_in: i64,
    pub total_out: i64,
    /// Inbound bytes per second.
    pub in_rate: f64,
    /// Outbound bytes per second.
    pub out_rate: f64,
}

/// Latest state per interface name.
///
/// Entries are created on an interface's first valid observation and then
/// only replaced; nothing is ever removed, so an interface that disappears
/// keeps reporting its last known values.
#[derive(Debug, Clone, Default)]
pub struct StatStore {
    entries: HashMap<String, InterfaceState>,
}

impl StatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&InterfaceState> {
        self.entries.get(name)
    }

    /// Insert or replace the state for `name`.
    pub fn insert(&mut self, name: impl Into<String>, state: InterfaceState) {
        self.entries.insert(name.into(), state);
    }

    /// All entries, in no particular order.
    pub fn iter(&self) -> hash_map::Iter<'_, String, InterfaceState> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalize `observation` against the stored state and write the result back.
    ///
    /// Loopback and unnamed observations never touch the store; down
    /// interfaces leave their entry exactly as it was.
    pub fn apply(
        &mut self,
        observation: &RawObservation,
        captured_at: Instant,
        policy: &NormalizePolicy,
    ) -> UpdateKind {
        if observation.loopback || observation.name.is_empty() {
            return UpdateKind::Frozen;
        }

        let normalized = normalize(
            self.entries.get(&observation.name),
            observation,
            captured_at,
            policy,
        );
        let kind = normalized.kind();
        if let Some(state) = normalized.into_state() {
            self.insert(observation.name.clone(), state);
        }
        kind
    }

    /// One report per known interface, sorted by name.
    pub fn reports(&self) -> Vec<InterfaceReport> {
        let mut reports: Vec<InterfaceReport> = self
            .entries
            .iter()
            .map(|(name, s)| InterfaceReport {
                name: name.clone(),
                total_in: s.total_in,
                total_out: s.total_out,
                in_rate: s.in_rate,
                out_rate: s.out_rate,
            })
            .collect();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        reports
    }
}

impl<'a> IntoIterator for &'a StatStore {
    type Item = (&'a String, &'a InterfaceState);
    type IntoIter = hash_map::Iter<'a, String, InterfaceState>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
