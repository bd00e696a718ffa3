//! HTTP exporter for interface byte counters.
//!
//! One tokio task owns the [`Sampler`] and polls the interface table on a
//! fixed interval. After every cycle it publishes an immutable [`Snapshot`]
//! that request handlers read; handlers never touch the sampler itself.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;

use netcount_core::{CycleSummary, InterfaceReport, InterfaceTable, Sampler, SamplerConfig};

/// Listen address and sampling cadence for [`run_server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Time between polling cycles.
    pub interval: Duration,
    pub sampler: SamplerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8043,
            interval: Duration::from_secs(2),
            sampler: SamplerConfig::default(),
        }
    }
}

/// State published after each cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub reports: Vec<InterfaceReport>,
    /// Summary of the last cycle that parsed cleanly.
    pub last_cycle: Option<CycleSummary>,
    pub cycles: u64,
    /// Cycles abandoned on a malformed buffer.
    pub malformed_cycles: u64,
    /// Error from the most recent cycle, cleared by the next good one.
    pub last_error: Option<String>,
}

/// Shared server state.
pub struct AppState {
    source: String,
    snapshot: RwLock<Snapshot>,
}

impl AppState {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    pub async fn publish(&self, snapshot: Snapshot) {
        *self.snapshot.write().await = snapshot;
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }
}

/// Run one polling cycle and build the snapshot that follows it.
///
/// `previous` supplies the last clean cycle summary when this one fails.
pub fn sample_once<T: InterfaceTable + ?Sized>(
    sampler: &mut Sampler,
    table: &mut T,
    previous: Option<CycleSummary>,
) -> Snapshot {
    let (last_cycle, last_error) = match sampler.poll(table) {
        Ok(summary) => (Some(summary), None),
        Err(e) => {
            if e.is_malformed_buffer() {
                log::warn!("skipping cycle: {e}");
            } else {
                log::warn!("interface table unavailable, retrying: {e}");
            }
            (previous, Some(e.to_string()))
        }
    };
    Snapshot {
        reports: sampler.reports(),
        last_cycle,
        cycles: sampler.cycles(),
        malformed_cycles: sampler.failed_cycles(),
        last_error,
    }
}

/// Poll forever, publishing a snapshot after every cycle.
pub async fn sample_loop(
    state: Arc<AppState>,
    mut table: Box<dyn InterfaceTable + Send>,
    mut sampler: Sampler,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut previous = None;
    loop {
        ticker.tick().await;
        let snapshot = sample_once(&mut sampler, table.as_mut(), previous);
        previous = snapshot.last_cycle;
        state.publish(snapshot).await;
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    source: String,
    cycles: u64,
    malformed_cycles: u64,
    interfaces: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct InterfacesResponse {
    interfaces: Vec<InterfaceReport>,
    total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycle: Option<CycleSummary>,
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.snapshot.read().await;
    let names: Vec<&str> = snapshot.reports.iter().map(|r| r.name.as_str()).collect();

    Json(serde_json::json!({
        "name": "netcount",
        "version": netcount_core::VERSION,
        "source": state.source,
        "interfaces": names,
        "endpoints": {
            "/": "This API index",
            "/health": "Sampler health",
            "/api/v1/interfaces": "Totals and rates for every known interface",
            "/api/v1/interfaces/{name}": "Totals and rates for one interface",
        },
        "examples": {
            "single_interface": format!(
                "/api/v1/interfaces/{}",
                names.first().copied().unwrap_or("en0")
            ),
        }
    }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.snapshot().await;
    let status = match (&snapshot.last_error, snapshot.cycles) {
        (Some(_), _) => "degraded",
        (None, 0) => "starting",
        (None, _) => "healthy",
    };
    Json(HealthResponse {
        status,
        source: state.source.clone(),
        cycles: snapshot.cycles,
        malformed_cycles: snapshot.malformed_cycles,
        interfaces: snapshot.reports.len(),
        error: snapshot.last_error,
    })
}

async fn handle_interfaces(State(state): State<Arc<AppState>>) -> Json<InterfacesResponse> {
    let snapshot = state.snapshot.read().await;
    Json(InterfacesResponse {
        interfaces: snapshot.reports.clone(),
        total: snapshot.reports.len(),
        cycle: snapshot.last_cycle,
    })
}

async fn handle_interface(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let snapshot = state.snapshot.read().await;
    match snapshot.reports.iter().find(|r| r.name == name) {
        Some(report) => (StatusCode::OK, Json(serde_json::json!(report))),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("Unknown interface: {name}. Use /api/v1/interfaces to list known interfaces."),
            })),
        ),
    }
}

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/v1/interfaces", get(handle_interfaces))
        .route("/api/v1/interfaces/{name}", get(handle_interface))
        .with_state(state)
}

/// Start the sampling task and serve HTTP until the listener fails.
pub async fn run_server(
    table: Box<dyn InterfaceTable + Send>,
    config: ServerConfig,
) -> io::Result<()> {
    let state = Arc::new(AppState::new(table.describe()));
    let sampler = Sampler::new(config.sampler);
    tokio::spawn(sample_loop(
        Arc::clone(&state),
        table,
        sampler,
        config.interval,
    ));

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    log::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use netcount_core::ReplayTable;

    fn report(name: &str, total_in: i64) -> InterfaceReport {
        InterfaceReport {
            name: name.to_string(),
            total_in,
            total_out: total_in / 2,
            in_rate: 10.0,
            out_rate: 5.0,
        }
    }

    async fn state_with(reports: Vec<InterfaceReport>) -> Arc<AppState> {
        let state = Arc::new(AppState::new("test"));
        state
            .publish(Snapshot {
                reports,
                last_cycle: Some(CycleSummary {
                    cycle: 3,
                    observations: 2,
                    advanced: 2,
                    ..CycleSummary::default()
                }),
                cycles: 3,
                ..Snapshot::default()
            })
            .await;
        state
    }

    #[tokio::test]
    async fn health_starting_before_first_cycle() {
        let state = Arc::new(AppState::new("test"));
        let Json(health) = handle_health(State(state)).await;
        assert_eq!(health.status, "starting");
        assert_eq!(health.interfaces, 0);
    }

    #[tokio::test]
    async fn health_reports_interface_count() {
        let state = state_with(vec![report("en0", 10), report("en1", 20)]).await;
        let Json(health) = handle_health(State(state)).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.cycles, 3);
        assert_eq!(health.interfaces, 2);
        assert!(health.error.is_none());
    }

    #[tokio::test]
    async fn publish_replaces_snapshot() {
        let state = state_with(vec![report("en0", 1)]).await;
        assert_eq!(state.snapshot().await.reports.len(), 1);
        state.publish(Snapshot::default()).await;
        let snapshot = state.snapshot().await;
        assert!(snapshot.reports.is_empty());
        assert_eq!(snapshot.cycles, 0);
    }

    #[tokio::test]
    async fn interfaces_lists_every_report() {
        let state = state_with(vec![report("en0", 10), report("utun0", 20)]).await;
        let Json(resp) = handle_interfaces(State(state)).await;
        assert_eq!(resp.total, 2);
        assert_eq!(resp.interfaces[1].name, "utun0");
        assert_eq!(resp.cycle.map(|c| c.cycle), Some(3));
    }

    #[tokio::test]
    async fn single_interface_found() {
        let state = state_with(vec![report("en0", 4_000)]).await;
        let (status, Json(body)) = handle_interface(State(state), Path("en0".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_in"], 4_000);
        assert_eq!(body["total_out"], 2_000);
    }

    #[tokio::test]
    async fn unknown_interface_is_404() {
        let state = state_with(vec![report("en0", 1)]).await;
        let (status, Json(body)) = handle_interface(State(state), Path("EN0".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("EN0"));
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let state = state_with(vec![report("en0", 1)]).await;
        let Json(index) = handle_index(State(state)).await;
        assert_eq!(index["name"], "netcount");
        assert_eq!(index["source"], "test");
        assert_eq!(index["interfaces"][0], "en0");
        assert!(index["endpoints"]["/api/v1/interfaces"].is_string());
    }

    #[tokio::test]
    async fn malformed_buffer_degrades_health() {
        let state = Arc::new(AppState::new("replay"));
        let mut sampler = Sampler::default();
        // Declared length of zero.
        let mut table = ReplayTable::from_bytes(vec![0, 0, 5, 0x0e]);
        let snapshot = sample_once(&mut sampler, &mut table, None);
        assert!(snapshot.last_error.is_some());
        assert_eq!(snapshot.malformed_cycles, 1);
        state.publish(snapshot).await;

        let Json(health) = handle_health(State(state)).await;
        assert_eq!(health.status, "degraded");
        assert!(health.error.unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn empty_table_is_a_clean_cycle() {
        let mut sampler = Sampler::default();
        let mut table = ReplayTable::from_bytes(Vec::new());
        let snapshot = sample_once(&mut sampler, &mut table, None);
        assert!(snapshot.last_error.is_none());
        assert_eq!(snapshot.last_cycle.map(|c| c.observations), Some(0));
        assert_eq!(snapshot.cycles, 1);
    }

    #[tokio::test]
    async fn failed_cycle_keeps_previous_summary() {
        let mut sampler = Sampler::default();
        let previous = Some(CycleSummary {
            cycle: 7,
            ..CycleSummary::default()
        });
        let mut table = ReplayTable::from_bytes(vec![1]);
        let snapshot = sample_once(&mut sampler, &mut table, previous);
        assert_eq!(snapshot.last_cycle.map(|c| c.cycle), Some(7));
    }

    #[test]
    fn default_config_listens_locally() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8043);
        assert_eq!(config.interval, Duration::from_secs(2));
    }
}
