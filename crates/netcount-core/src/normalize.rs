//! Counter normalizer: turns successive raw readings of one interface into
//! wrap-corrected totals and rates.

use std::time::{Duration, Instant};

use crate::counter::CounterWidth;
use crate::record::RawObservation;

/// Rate and staleness policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizePolicy {
    /// Seconds added to the elapsed time before dividing, so back-to-back
    /// samples never divide by zero.
    pub rate_epsilon_secs: f64,
    /// Sample gaps longer than this force both rates to zero.
    pub stale_after: Duration,
    /// Width of the raw counters being normalized.
    pub counter_width: CounterWidth,
}

/// Default rate epsilon (1 ms).
pub const DEFAULT_RATE_EPSILON_SECS: f64 = 1e-3;
/// Default staleness threshold.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60);

impl Default for NormalizePolicy {
    fn default() -> Self {
        Self {
            rate_epsilon_secs: DEFAULT_RATE_EPSILON_SECS,
            stale_after: DEFAULT_STALE_AFTER,
            counter_width: CounterWidth::W32,
        }
    }
}

/// Latest normalized state of one interface.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceState {
    pub raw_in: u64,
    pub raw_out: u64,
    /// Capture instant of the sample this state was computed from.
    pub captured_at: Instant,
    /// Accumulated inbound bytes since the state was (re)initialized.
    pub total_in: i64,
    /// Accumulated outbound bytes since the state was (re)initialized.
    pub total_out: i64,
    pub delta_in: u64,
    pub delta_out: u64,
    pub elapsed_secs: f64,
    /// Inbound bytes per second over the last sample gap.
    pub in_rate: f64,
    /// Outbound bytes per second over the last sample gap.
    pub out_rate: f64,
    /// At least one sample has been recorded.
    pub valid: bool,
}

impl InterfaceState {
    /// Fresh state from a first sample: totals, deltas and rates all zero.
    pub fn initial(observation: &RawObservation, captured_at: Instant) -> Self {
        Self {
            raw_in: observation.raw_in,
            raw_out: observation.raw_out,
            captured_at,
            total_in: 0,
            total_out: 0,
            delta_in: 0,
            delta_out: 0,
            elapsed_secs: 0.0,
            in_rate: 0.0,
            out_rate: 0.0,
            valid: true,
        }
    }
}

/// Outcome of normalizing one observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// First valid sample; state starts from zero.
    Initialized(InterfaceState),
    /// Totals and rates advanced.
    Advanced(InterfaceState),
    /// Totals advanced but the sample gap exceeded the staleness threshold,
    /// so both rates are zero.
    Stale(InterfaceState),
    /// Interface is down; existing state (if any) is left untouched.
    Frozen,
}

impl Normalized {
    /// New state to store, if any.
    pub fn into_state(self) -> Option<InterfaceState> {
        match self {
            Self::Initialized(s) | Self::Advanced(s) | Self::Stale(s) => Some(s),
            Self::Frozen => None,
        }
    }

    pub fn kind(&self) -> UpdateKind {
        match self {
            Self::Initialized(_) => UpdateKind::Initialized,
            Self::Advanced(_) => UpdateKind::Advanced,
            Self::Stale(_) => UpdateKind::Stale,
            Self::Frozen => UpdateKind::Frozen,
        }
    }
}

/// What happened to an interface's stored state in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Initialized,
    Advanced,
    Stale,
    /// Down, loopback, or unnamed: nothing stored.
    Frozen,
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized => write!(f, "initialized"),
            Self::Advanced => write!(f, "advanced"),
            Self::Stale => write!(f, "stale"),
            Self::Frozen => write!(f, "frozen"),
        }
    }
}

/// Compute an interface's next state from its previous state and a new
/// observation captured at `captured_at`.
///
/// Never fails: every counter value, including a decrease, is handled by the
/// single-wrap rule.
pub fn normalize(
    previous: Option<&InterfaceState>,
    observation: &RawObservation,
    captured_at: Instant,
    policy: &NormalizePolicy,
) -> Normalized {
    if !observation.up {
        return Normalized::Frozen;
    }

    let prev = match previous {
        Some(p) if p.valid => p,
        _ => return Normalized::Initialized(InterfaceState::initial(observation, captured_at)),
    };

    let width = policy.counter_width;
    let delta_in = width.delta(prev.raw_in, observation.raw_in);
    let delta_out = width.delta(prev.raw_out, observation.raw_out);

    let elapsed = captured_at.saturating_duration_since(prev.captured_at);
    let elapsed_secs = elapsed.as_secs_f64();
    let stale = elapsed > policy.stale_after;

    let (in_rate, out_rate) = if stale {
        (0.0, 0.0)
    } else {
        let denom = elapsed_secs + policy.rate_epsilon_secs;
        (delta_in as f64 / denom, delta_out as f64 / denom)
    };

    let state = InterfaceState {
        raw_in: observation.raw_in,
        raw_out: observation.raw_out,
        captured_at,
        total_in: accumulate(prev.total_in, delta_in),
        total_out: accumulate(prev.total_out, delta_out),
        delta_in,
        delta_out,
        elapsed_secs,
        in_rate,
        out_rate,
        valid: true,
    };

    if stale {
        Normalized::Stale(state)
    } else {
        Normalized::Advanced(state)
    }
}

fn accumulate(total: i64, delta: u64) -> i64 {
    total.saturating_add(i64::try_from(delta).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(raw_in: u64, raw_out: u64, up: bool) -> RawObservation {
        RawObservation {
            name: "en0".to_string(),
            raw_in,
            raw_out,
            up,
            loopback: false,
        }
    }

    fn advance(prev: &InterfaceState, o: &RawObservation, at: Instant) -> InterfaceState {
        normalize(Some(prev), o, at, &NormalizePolicy::default())
            .into_state()
            .unwrap()
    }

    #[test]
    fn first_sample_starts_at_zero() {
        let t0 = Instant::now();
        let n = normalize(None, &obs(1000, 500, true), t0, &NormalizePolicy::default());
        let Normalized::Initialized(s) = n else {
            panic!("expected initialization, got {n:?}");
        };
        assert_eq!(s.total_in, 0);
        assert_eq!(s.total_out, 0);
        assert_eq!(s.in_rate, 0.0);
        assert_eq!(s.out_rate, 0.0);
        assert_eq!(s.raw_in, 1000);
        assert_eq!(s.captured_at, t0);
        assert!(s.valid);
    }

    #[test]
    fn invalid_previous_reinitializes() {
        let t0 = Instant::now();
        let mut prev = InterfaceState::initial(&obs(10, 10, true), t0);
        prev.total_in = 5000;
        prev.valid = false;
        let n = normalize(
            Some(&prev),
            &obs(20, 20, true),
            t0 + Duration::from_secs(1),
            &NormalizePolicy::default(),
        );
        assert_eq!(n.kind(), UpdateKind::Initialized);
        assert_eq!(n.into_state().unwrap().total_in, 0);
    }

    #[test]
    fn down_interface_is_frozen() {
        let t0 = Instant::now();
        let prev = InterfaceState::initial(&obs(10, 10, true), t0);
        let n = normalize(
            Some(&prev),
            &obs(99, 99, false),
            t0 + Duration::from_secs(2),
            &NormalizePolicy::default(),
        );
        assert_eq!(n, Normalized::Frozen);
        assert_eq!(
            normalize(None, &obs(1, 1, false), t0, &NormalizePolicy::default()),
            Normalized::Frozen
        );
    }

    #[test]
    fn example_scenario() {
        let t0 = Instant::now();
        let s1 = normalize(None, &obs(1000, 0, true), t0, &NormalizePolicy::default())
            .into_state()
            .unwrap();

        let s2 = advance(&s1, &obs(3000, 0, true), t0 + Duration::from_secs(2));
        assert_eq!(s2.delta_in, 2000);
        assert_eq!(s2.total_in, 2000);
        assert!((s2.in_rate - 2000.0 / 2.001).abs() < 1e-9);
        assert!((s2.in_rate - 999.5).abs() < 0.1);

        let s3 = advance(&s2, &obs(100, 0, true), t0 + Duration::from_secs(4));
        assert_eq!(s3.delta_in, 4_294_964_396);
        assert_eq!(s3.total_in, 2000 + 4_294_964_396);
        assert!((s3.in_rate - 4_294_964_396.0 / 2.001).abs() < 1e-3);
    }

    #[test]
    fn unchanged_counters_keep_totals_flat() {
        let t0 = Instant::now();
        let s1 = InterfaceState::initial(&obs(500, 500, true), t0);
        let s2 = advance(&s1, &obs(500, 500, true), t0 + Duration::from_secs(1));
        assert_eq!(s2.total_in, 0);
        assert_eq!(s2.delta_out, 0);
        assert_eq!(s2.in_rate, 0.0);
    }

    #[test]
    fn zero_elapsed_uses_epsilon() {
        let t0 = Instant::now();
        let s1 = InterfaceState::initial(&obs(0, 0, true), t0);
        let s2 = advance(&s1, &obs(10, 0, true), t0);
        assert_eq!(s2.elapsed_secs, 0.0);
        assert!((s2.in_rate - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn stale_gap_zeroes_rates_but_keeps_totals() {
        let t0 = Instant::now();
        let s1 = InterfaceState::initial(&obs(0, 0, true), t0);
        let n = normalize(
            Some(&s1),
            &obs(1_000_000, 2_000_000, true),
            t0 + Duration::from_secs(61),
            &NormalizePolicy::default(),
        );
        assert_eq!(n.kind(), UpdateKind::Stale);
        let s2 = n.into_state().unwrap();
        assert_eq!(s2.in_rate, 0.0);
        assert_eq!(s2.out_rate, 0.0);
        assert_eq!(s2.total_in, 1_000_000);
        assert_eq!(s2.total_out, 2_000_000);
        assert_eq!(s2.delta_in, 1_000_000);
        assert!((s2.elapsed_secs - 61.0).abs() < 1e-9);
    }

    #[test]
    fn gap_at_threshold_is_not_stale() {
        let t0 = Instant::now();
        let s1 = InterfaceState::initial(&obs(0, 0, true), t0);
        let n = normalize(
            Some(&s1),
            &obs(60, 0, true),
            t0 + Duration::from_secs(60),
            &NormalizePolicy::default(),
        );
        assert_eq!(n.kind(), UpdateKind::Advanced);
        assert!(n.into_state().unwrap().in_rate > 0.0);
    }

    #[test]
    fn custom_policy_threshold() {
        let policy = NormalizePolicy {
            stale_after: Duration::from_secs(5),
            ..NormalizePolicy::default()
        };
        let t0 = Instant::now();
        let s1 = InterfaceState::initial(&obs(0, 0, true), t0);
        let n = normalize(
            Some(&s1),
            &obs(10, 10, true),
            t0 + Duration::from_secs(6),
            &policy,
        );
        assert_eq!(n.kind(), UpdateKind::Stale);
    }

    #[test]
    fn totals_never_decrease_across_wraps() {
        let t0 = Instant::now();
        let readings = [4_000_000_000u64, 4_294_000_000, 1_000, 50_000, 3_000_000_000, 10];
        let mut state = InterfaceState::initial(&obs(readings[0], readings[0], true), t0);
        let mut last_total = state.total_in;
        for (i, &raw) in readings.iter().enumerate().skip(1) {
            state = advance(
                &state,
                &obs(raw, raw, true),
                t0 + Duration::from_secs(2 * i as u64),
            );
            assert!(state.total_in >= last_total);
            assert_eq!(state.total_in, state.total_out);
            last_total = state.total_in;
        }
    }

    #[test]
    fn total_saturates_instead_of_overflowing() {
        let t0 = Instant::now();
        let mut s1 = InterfaceState::initial(&obs(0, 0, true), t0);
        s1.total_in = i64::MAX - 1;
        let s2 = advance(&s1, &obs(10, 0, true), t0 + Duration::from_secs(1));
        assert_eq!(s2.total_in, i64::MAX);
    }
}
