//! HTTP + WebSocket bench server for a simulated prop
//!
//! The prop runs on a [`SimBoard`] and [`SimTransport`] and ticks every
//! [`SIM_TICK_MS`](crate::SIM_TICK_MS). Everything it publishes is logged
//! and fanned out to WebSocket clients.
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /status - Current status snapshot
//! - POST /cmd - Raw command payload on the device command topic
//! - POST /sensor/:id - Drive a sensor input `{present}`
//! - POST /button - Hold the reset button `{held_ms?}`
//! - POST /network - Toggle link / broker reachability `{link?, broker?}`
//! - GET /messages - Published message log
//! - WS /ws - Live published messages

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ws::{Message, WebSocket}, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::config::PropConfig;
use crate::core::PropController;
use crate::error::ConfigError;
use crate::hal::{Clock, Level, PublishedMessage, SimBoard, SimTransport};
use crate::types::StatusSnapshot;

/// Log entries kept for GET /messages
const MESSAGE_LOG_CAPACITY: usize = 500;

/// A published message as seen by the bench
#[derive(Debug, Clone, Serialize)]
pub struct LoggedMessage {
    pub received_at: DateTime<Utc>,
    /// Prop uptime at publish
    pub uptime_ms: u64,
    #[serde(flatten)]
    pub message: PublishedMessage,
}

struct Bench {
    prop: PropController<SimBoard, SimTransport>,
    log: VecDeque<LoggedMessage>,
}

/// App state
pub struct AppState {
    bench: Mutex<Bench>,
    updates: broadcast::Sender<LoggedMessage>,
}

impl AppState {
    /// Build and boot a simulated prop
    pub fn new(config: PropConfig) -> Result<Arc<Self>, ConfigError> {
        let mut prop = PropController::new(config, SimBoard::new(), SimTransport::new())?;
        prop.begin();

        let (updates, _) = broadcast::channel(100);
        let mut bench = Bench { prop, log: VecDeque::new() };
        collect(&mut bench, &updates);

        Ok(Arc::new(Self { bench: Mutex::new(bench), updates }))
    }

    /// Advance the simulated prop by `ms`
    pub async fn advance(&self, ms: u32) {
        let mut bench = self.bench.lock().await;
        bench.prop.run_for(ms);
        collect(&mut bench, &self.updates);
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.bench.lock().await.prop.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoggedMessage> {
        self.updates.subscribe()
    }
}

/// Move freshly published messages into the log and out to listeners
fn collect(bench: &mut Bench, updates: &broadcast::Sender<LoggedMessage>) {
    let uptime_ms = bench.prop.board().now().as_u64();
    for message in bench.prop.transport_mut().take_published() {
        let entry = LoggedMessage { received_at: Utc::now(), uptime_ms, message };
        // no receivers is fine
        let _ = updates.send(entry.clone());
        if bench.log.len() == MESSAGE_LOG_CAPACITY {
            bench.log.pop_front();
        }
        bench.log.push_back(entry);
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub contract: String,
    pub prop_id: String,
    pub connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct SensorRequest {
    pub present: bool,
}

#[derive(Debug, Serialize)]
pub struct SensorResponse {
    pub sensor_id: String,
    pub pin: u8,
    pub level: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ButtonRequest {
    pub held_ms: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NetworkRequest {
    pub link: Option<bool>,
    pub broker: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct NetworkResponse {
    pub connected: bool,
}

/// Create the API router around a booted simulated prop
pub fn create_router(config: PropConfig) -> Result<Router, ConfigError> {
    Ok(router(AppState::new(config)?))
}

/// Create the API router for existing state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/cmd", post(send_command))
        .route("/sensor/:id", post(set_sensor))
        .route("/button", post(press_button))
        .route("/network", post(set_network))
        .route("/messages", get(messages))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let bench = state.bench.lock().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        contract: crate::CONTRACT_VERSION.to_string(),
        prop_id: bench.prop.config().identity.device_id.clone(),
        connected: bench.prop.bridge().is_connected(),
    })
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusSnapshot> {
    Json(state.snapshot().await)
}

/// Inject a payload as if the game master published it, then run one tick
async fn send_command(State(state): State<Arc<AppState>>, body: String) -> Json<StatusSnapshot> {
    let mut bench = state.bench.lock().await;
    let topic = bench.prop.bridge().topics().cmd.clone();
    bench.prop.transport_mut().inject(topic, body);
    bench.prop.run_for(crate::SIM_TICK_MS);
    collect(&mut bench, &state.updates);
    Json(bench.prop.snapshot())
}

async fn set_sensor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SensorRequest>,
) -> Result<Json<SensorResponse>, StatusCode> {
    let mut bench = state.bench.lock().await;
    let def = bench
        .prop
        .sensors()
        .definitions()
        .iter()
        .find(|d| d.id == id)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)?;

    let level = def.present_level(req.present);
    bench.prop.board_mut().set_level(def.pin, level);
    info!(sensor = %id, present = req.present, "bench input");

    Ok(Json(SensorResponse {
        sensor_id: id,
        pin: def.pin,
        level: if level == Level::High { "HIGH" } else { "LOW" }.to_string(),
    }))
}

/// Hold the reset button for `held_ms` of simulated time, then release it.
/// Holds are capped at ten times the reset hold.
async fn press_button(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ButtonRequest>>,
) -> Json<StatusSnapshot> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let mut bench = state.bench.lock().await;
    let pin = bench.prop.config().pins.reset_button;
    let hold_ms = bench.prop.config().timing.reset_hold_ms;
    let held_ms = req
        .held_ms
        .unwrap_or(hold_ms + 2 * crate::SIM_TICK_MS)
        .min(hold_ms.saturating_mul(10));

    bench.prop.board_mut().set_level(pin, Level::Low);
    bench.prop.run_for(held_ms);
    bench.prop.board_mut().release(pin);
    bench.prop.run_for(crate::SIM_TICK_MS);
    collect(&mut bench, &state.updates);
    Json(bench.prop.snapshot())
}

async fn set_network(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NetworkRequest>,
) -> Json<NetworkResponse> {
    let mut bench = state.bench.lock().await;
    if let Some(link) = req.link {
        bench.prop.transport_mut().set_link_available(link);
    }
    if let Some(broker) = req.broker {
        bench.prop.transport_mut().set_broker_available(broker);
    }
    collect(&mut bench, &state.updates);
    Json(NetworkResponse { connected: bench.prop.bridge().is_connected() })
}

async fn messages(State(state): State<Arc<AppState>>) -> Json<Vec<LoggedMessage>> {
    let bench = state.bench.lock().await;
    Json(bench.log.iter().cloned().collect())
}

/// WebSocket handler for live published messages
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.subscribe();
    ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx).await;
    })
}

async fn handle_websocket(mut socket: WebSocket, mut rx: broadcast::Receiver<LoggedMessage>) {
    while let Ok(entry) = rx.recv().await {
        let json = serde_json::to_string(&entry).unwrap_or_default();
        if socket.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
}

/// Run the bench server with a ticking simulated prop
pub async fn run_server(addr: &str, config: PropConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(config)?;

    let ticker = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(u64::from(crate::SIM_TICK_MS)));
        loop {
            interval.tick().await;
            ticker.advance(crate::SIM_TICK_MS).await;
        }
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("🔒 Prop bench running on {}", addr);
    println!("  GET  /health      - Health check");
    println!("  GET  /status      - Status snapshot");
    println!("  POST /cmd         - Send command payload");
    println!("  POST /sensor/:id  - Drive sensor {{present}}");
    println!("  POST /button      - Hold reset button {{held_ms}}");
    println!("  POST /network     - Toggle {{link, broker}}");
    println!("  GET  /messages    - Published messages");
    println!("  WS   /ws          - Live messages");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
