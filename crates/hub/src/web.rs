use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::api::{
    display_value, AirInfo, ApiError, ApiResponse, GroundInfo, HealthData, PlantData, PlantInfo,
    WateringData,
};
use crate::config::{HubConfig, WateringSettings};
use crate::health::evaluate;
use crate::protocol::TOGGLE_COMMAND;
use crate::queue::CommandQueue;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::status::{classify_air, classify_ground, Thresholds};

const INDEX_HTML: &str = include_str!("ui/index.html");

pub const SERVICE_NAME: &str = "SmartPot API";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    store: SnapshotStore,
    queue: CommandQueue,
    /// Serializes appends to the command queue.
    queue_lock: Arc<Mutex<()>>,
    mock_mode: bool,
    watering: WateringSettings,
    thresholds: Thresholds,
    cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(cfg: &HubConfig) -> Self {
        Self {
            store: SnapshotStore::new(&cfg.storage.data_dir),
            queue: CommandQueue::new(&cfg.storage.data_dir),
            queue_lock: Arc::new(Mutex::new(())),
            mock_mode: cfg.api.mock_mode,
            watering: cfg.watering.clone(),
            thresholds: cfg.thresholds.clone(),
            cors_origins: cfg.api.cors_origins.clone(),
        }
    }

    fn mode(&self) -> &'static str {
        if self.mock_mode {
            "mock"
        } else {
            "live"
        }
    }

    /// Unreadable snapshots are treated like missing ones.
    fn snapshot(&self) -> Option<Snapshot> {
        match self.store.load() {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("failed to read sensor data: {e:#}");
                None
            }
        }
    }

    async fn send(&self, cmd: &str) -> Result<()> {
        let _guard = self.queue_lock.lock().await;
        self.queue.push(cmd)
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origins);
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/plant", get(plant))
        .route("/water", post(water))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

/// `*` anywhere in the list allows every origin. Unparseable entries are
/// skipped; config validation reports them.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let list: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(list))
}

async fn index() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], INDEX_HTML)
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthData>> {
    let daemon_status = match state.snapshot() {
        Some(s) => s.daemon_status.as_str().to_string(),
        None => "no_data".to_string(),
    };

    ApiResponse::success(HealthData {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        mode: state.mode(),
        daemon_status,
    })
}

async fn plant(State(state): State<AppState>) -> Result<Json<ApiResponse<PlantData>>, ApiError> {
    let snapshot = if state.mock_mode {
        Some(demo_snapshot(&state.thresholds))
    } else {
        state.snapshot()
    };

    match snapshot {
        Some(s) if s.temperature.is_some() => Ok(ApiResponse::success(plant_data(&s))),
        _ => Err(ApiError::no_sensor_data()),
    }
}

#[derive(Debug, Deserialize)]
struct WaterRequest {
    duration_seconds: Option<i64>,
}

async fn water(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiResponse<WateringData>>, ApiError> {
    let w = &state.watering;
    let requested = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<WaterRequest>(&body)
            .map_err(|e| ApiError::validation(format!("duration_seconds: {e}")))?
            .duration_seconds
    };
    let duration = requested.unwrap_or(w.default_seconds as i64);

    let seconds = u64::try_from(duration)
        .ok()
        .filter(|s| (w.min_seconds..=w.max_seconds).contains(s))
        .ok_or_else(|| ApiError::invalid_duration(w.min_seconds, w.max_seconds, duration))?;

    // Run the open/wait/close sequence on its own task so a client that
    // disconnects mid-wait cannot cancel the close command.
    let task = tokio::spawn(run_watering(state.clone(), seconds));
    task.await.map_err(|e| {
        tracing::error!("watering task failed: {e}");
        ApiError::command_failed(e.to_string())
    })??;

    Ok(ApiResponse::success(WateringData {
        triggered: true,
        duration_seconds: seconds,
        message: format!("Watering completed for {seconds} seconds"),
    }))
}

async fn run_watering(state: AppState, seconds: u64) -> Result<(), ApiError> {
    if state.mock_mode {
        tracing::info!(seconds, "mock watering");
    } else {
        state.send(TOGGLE_COMMAND).await.map_err(|e| {
            tracing::error!("failed to queue open command: {e:#}");
            ApiError::command_failed(format!("{e:#}"))
        })?;
        tracing::info!(seconds, "watering started");
    }

    tokio::time::sleep(Duration::from_secs(seconds)).await;

    if !state.mock_mode {
        state.send(TOGGLE_COMMAND).await.map_err(|e| {
            tracing::error!("failed to queue close command, valve may still be open: {e:#}");
            ApiError::command_failed(format!("{e:#}"))
        })?;
    }
    tracing::info!(seconds, "watering completed");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn plant_data(s: &Snapshot) -> PlantData {
    PlantData {
        plant_info: PlantInfo {
            air: AirInfo {
                temperature: display_value(s.temperature, "C"),
                humidity: display_value(s.air_humidity, "%"),
                status: s.air_status,
            },
            ground: GroundInfo {
                humidity: display_value(s.soil_humidity, "%"),
                status: s.ground_status,
            },
        },
        health: evaluate(s.air_status, s.ground_status),
        last_updated: s.last_updated,
    }
}

/// Fixed reading served in mock mode.
fn demo_snapshot(thresholds: &Thresholds) -> Snapshot {
    let temperature = Some(22.5);
    let air_humidity = Some(55.0);
    let soil_humidity = Some(62);
    Snapshot {
        temperature,
        air_humidity,
        soil_humidity,
        air_status: classify_air(temperature, air_humidity, &thresholds.air),
        ground_status: classify_ground(soil_humidity, &thresholds.ground),
        last_updated: Some(OffsetDateTime::now_utc()),
        ..Snapshot::default()
    }
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(cfg: &HubConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.api.host, cfg.api.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.api.host, cfg.api.port))?;
    let state = AppState::new(cfg);
    let mode = state.mode();
    let app = router(state);

    #[cfg(feature = "tls")]
    if let (Ok(cert), Ok(key)) = (std::env::var("API_TLS_CERT"), std::env::var("API_TLS_KEY")) {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert, &key)
            .await
            .with_context(|| format!("failed to load TLS cert {cert} / key {key}"))?;
        tracing::info!(mode, "api listening on https://{addr}");
        return axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await
            .context("web server error");
    }

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(mode, "api listening on http://{addr}");

    axum::serve(listener, app).await.context("web server error")
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::Health;
    use crate::protocol::DeviceLine;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct Harness {
        dir: tempfile::TempDir,
        app: Router,
    }

    fn harness(mock_mode: bool) -> Harness {
        harness_with(mock_mode, |_| {})
    }

    fn harness_with(mock_mode: bool, tweak: impl FnOnce(&mut HubConfig)) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = HubConfig::default();
        cfg.storage.data_dir = dir.path().to_path_buf();
        cfg.api.mock_mode = mock_mode;
        tweak(&mut cfg);
        let app = router(AppState::new(&cfg));
        Harness { dir, app }
    }

    fn water_request(body: &'static str) -> Request<Body> {
        Request::post("/water")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::options("/plant")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap()
    }

    impl Harness {
        fn store(&self) -> SnapshotStore {
            SnapshotStore::new(self.dir.path())
        }

        fn seed(&self, temperature: Option<f32>, humidity: f32, soil: u8) {
            let th = Thresholds::default();
            let now = OffsetDateTime::now_utc();
            let mut s = Snapshot::default();
            s.apply(DeviceLine::Temperature(temperature), now, &th);
            s.apply(DeviceLine::Humidity(Some(humidity)), now, &th);
            s.apply(DeviceLine::Soil(Some(soil)), now, &th);
            self.store().save(&s).unwrap();
        }

        async fn call(&self, req: Request<Body>) -> (StatusCode, serde_json::Value) {
            let resp = self.app.clone().oneshot(req).await.unwrap();
            let status = resp.status();
            let bytes = resp.into_body().collect().await.unwrap().to_bytes();
            let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
            (status, json)
        }

        async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
            self.call(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        async fn water(&self, body: &'static str) -> (StatusCode, serde_json::Value) {
            self.call(water_request(body)).await
        }
    }

    // -- /health -------------------------------------------------------------

    #[tokio::test]
    async fn health_without_snapshot_reports_no_data() {
        let h = harness(false);
        let (status, v) = h.get("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["status"], "success");
        assert_eq!(v["data"]["service"], "SmartPot API");
        assert_eq!(v["data"]["version"], "1.0.0");
        assert_eq!(v["data"]["mode"], "live");
        assert_eq!(v["data"]["daemon_status"], "no_data");
        assert!(v["error"].is_null());
    }

    #[tokio::test]
    async fn health_reports_daemon_status() {
        let h = harness(true);
        let s = Snapshot {
            daemon_status: crate::snapshot::DaemonStatus::Connected,
            ..Snapshot::default()
        };
        h.store().save(&s).unwrap();
        let (_, v) = h.get("/health").await;
        assert_eq!(v["data"]["daemon_status"], "connected");
        assert_eq!(v["data"]["mode"], "mock");
    }

    // -- /plant --------------------------------------------------------------

    #[tokio::test]
    async fn plant_without_data_is_503() {
        let h = harness(false);
        let (status, v) = h.get("/plant").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(v["status"], "error");
        assert!(v["data"].is_null());
        assert_eq!(v["error"]["code"], "NO_SENSOR_DATA");
    }

    #[tokio::test]
    async fn plant_without_temperature_is_503() {
        let h = harness(false);
        h.seed(None, 50.0, 60);
        let (status, _) = h.get("/plant").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn plant_reports_readings_and_verdict() {
        let h = harness(false);
        h.seed(Some(21.2), 45.0, 22);
        let (status, v) = h.get("/plant").await;
        assert_eq!(status, StatusCode::OK);

        let info = &v["data"]["plant_info"];
        assert_eq!(info["air"]["temperature"], "21.2C");
        assert_eq!(info["air"]["humidity"], "45%");
        assert_eq!(info["air"]["status"], "optimal");
        assert_eq!(info["ground"]["humidity"], "22%");
        assert_eq!(info["ground"]["status"], "dry");

        assert_eq!(v["data"]["health"]["health"], "warning");
        assert_eq!(v["data"]["health"]["title"], "Soil moisture is low");
        assert!(v["data"]["last_updated"].is_string());
    }

    #[tokio::test]
    async fn plant_critical_when_air_is_bad() {
        let h = harness(false);
        h.seed(Some(38.0), 45.0, 70);
        let (_, v) = h.get("/plant").await;
        assert_eq!(v["data"]["health"]["health"], "critical");
    }

    #[tokio::test]
    async fn mock_plant_serves_demo_reading() {
        let h = harness(true);
        let (status, v) = h.get("/plant").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["plant_info"]["air"]["temperature"], "22.5C");
        assert_eq!(v["data"]["health"]["health"], "ok");
        assert_eq!(plant_data(&demo_snapshot(&Thresholds::default())).health.health, Health::Ok);
    }

    // -- /water --------------------------------------------------------------

    #[tokio::test]
    async fn water_rejects_out_of_range_duration() {
        let h = harness(false);
        for body in [r#"{"duration_seconds":0}"#, r#"{"duration_seconds":31}"#, r#"{"duration_seconds":-4}"#] {
            let (status, v) = h.water(body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(v["error"]["code"], "INVALID_DURATION");
        }
        assert!(!CommandQueue::new(h.dir.path()).path().exists());
    }

    #[tokio::test]
    async fn water_rejects_malformed_body() {
        let h = harness(false);
        for body in ["{not json", r#"{"duration_seconds":"ten"}"#] {
            let (status, v) = h.water(body).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
            assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn water_queues_open_and_close() {
        let h = harness(false);
        let (status, v) = h.water(r#"{"duration_seconds":1}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(v["data"]["triggered"], true);
        assert_eq!(v["data"]["duration_seconds"], 1);
        assert_eq!(v["data"]["message"], "Watering completed for 1 seconds");

        let queued = CommandQueue::new(h.dir.path()).drain().unwrap();
        assert_eq!(queued, vec!["go", "go"]);
    }

    #[tokio::test]
    async fn water_closes_valve_after_client_disconnects() {
        let h = harness(false);
        let pending = h.app.clone().oneshot(water_request(r#"{"duration_seconds":1}"#));
        // Dropping the response future mid-wait is what a closed connection does.
        let res = tokio::time::timeout(Duration::from_millis(300), pending).await;
        assert!(res.is_err());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let queued = CommandQueue::new(h.dir.path()).drain().unwrap();
        assert_eq!(queued, vec!["go", "go"]);
    }

    #[tokio::test]
    async fn water_queue_failure_is_503() {
        let h = harness(false);
        // A directory where the queue file should be makes the append fail.
        std::fs::create_dir(CommandQueue::new(h.dir.path()).path()).unwrap();
        let (status, v) = h.water(r#"{"duration_seconds":1}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(v["error"]["code"], "COMMAND_FAILED");
    }

    #[tokio::test]
    async fn mock_water_skips_queue() {
        let h = harness(true);
        let (status, _) = h.water(r#"{"duration_seconds":1}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!CommandQueue::new(h.dir.path()).path().exists());
    }

    // -- CORS ----------------------------------------------------------------

    #[tokio::test]
    async fn preflight_allows_any_origin_by_default() {
        let h = harness(false);
        let resp = h.app.clone().oneshot(preflight("http://pot.local")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn preflight_echoes_listed_origin_only() {
        let h = harness_with(false, |cfg| {
            cfg.api.cors_origins = vec!["http://pot.local".into()];
        });

        let resp = h.app.clone().oneshot(preflight("http://pot.local")).await.unwrap();
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://pot.local");

        let resp = h.app.clone().oneshot(preflight("http://evil.example")).await.unwrap();
        assert!(!resp.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn simple_get_carries_cors_header() {
        let h = harness(true);
        let req = Request::get("/health")
            .header(header::ORIGIN, "http://pot.local")
            .body(Body::empty())
            .unwrap();
        let resp = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    // -- misc ----------------------------------------------------------------

    #[tokio::test]
    async fn unknown_route_is_404_envelope() {
        let h = harness(false);
        let (status, v) = h.get("/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(v["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn index_serves_dashboard() {
        let h = harness(false);
        let resp = h
            .app
            .clone()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(ct.starts_with("text/html"));
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&bytes).contains("/plant"));
    }
}
