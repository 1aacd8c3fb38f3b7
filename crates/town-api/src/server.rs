//! HTTP and websocket surface over the engine handle.
//!
//! `/status`, `/snapshot`, and the pause controls read or flip state
//! under the engine lock; `/stream` bridges the broadcast channels onto a
//! websocket, dropping frames for subscribers that fall behind.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::sync::broadcast;

use contracts::{WorldSnapshot, SCHEMA_VERSION_V1};
use town_core::EngineHandle;

#[derive(Clone)]
pub struct AppState {
    handle: EngineHandle,
}

pub fn router(handle: EngineHandle) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/control/start", post(start))
        .route("/control/pause", post(pause))
        .route("/snapshot", get(snapshot))
        .route("/activity", get(activity))
        .route("/stream", get(stream))
        .with_state(AppState { handle })
}

/// Bind and serve until the process exits.
pub async fn serve(handle: EngineHandle, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "api listening");
    axum::serve(listener, router(handle)).await
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let engine = state.handle.engine().lock().await;
    let world = engine.world();
    Json(json!({
        "schema_version": SCHEMA_VERSION_V1,
        "tick": world.tick(),
        "time": world.time().to_string(),
        "paused": world.paused(),
        "agents": world.agents().len(),
        "maps": world.maps().len(),
    }))
}

async fn start(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut engine = state.handle.engine().lock().await;
    engine.world_mut().set_paused(false);
    tracing::info!("simulation started");
    Json(json!({ "paused": false }))
}

async fn pause(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut engine = state.handle.engine().lock().await;
    engine.world_mut().set_paused(true);
    tracing::info!("simulation paused");
    Json(json!({ "paused": true }))
}

async fn snapshot(State(state): State<AppState>) -> Json<WorldSnapshot> {
    let engine = state.handle.engine().lock().await;
    Json(engine.world().snapshot())
}

/// Recent activity-log entries, newest first. Empty when the server runs
/// without a store.
async fn activity(State(state): State<AppState>) -> Json<serde_json::Value> {
    let Some(store) = state.handle.store().cloned() else {
        return Json(json!({ "events": [] }));
    };
    let events = match tokio::task::spawn_blocking(move || store.recent_activity(50)).await {
        Ok(Ok(events)) => events,
        Ok(Err(err)) => {
            tracing::warn!(%err, "activity read failed");
            Vec::new()
        }
        Err(err) => {
            tracing::warn!(%err, "activity read task failed");
            Vec::new()
        }
    };
    Json(json!({ "events": events }))
}

async fn stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_socket(socket, state))
}

async fn stream_socket(mut socket: WebSocket, state: AppState) {
    let (mut snapshots, mut activity) = {
        let engine = state.handle.engine().lock().await;
        (
            engine.events().subscribe_snapshots(),
            engine.events().subscribe_activity(),
        )
    };

    loop {
        tokio::select! {
            snapshot = snapshots.recv() => match snapshot {
                Ok(snapshot) => {
                    let frame = json!({ "kind": "snapshot", "data": snapshot });
                    if socket.send(Message::Text(frame.to_string())).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "snapshot subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            event = activity.recv() => match event {
                Ok(event) => {
                    let frame = json!({ "kind": "activity", "data": event });
                    if socket.send(Message::Text(frame.to_string())).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "activity subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            message = socket.recv() => match message {
                // Clients only ever send pings; anything else ends the stream.
                Some(Ok(_)) => continue,
                _ => return,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use town_core::{ScriptedDecider, SimEngine, TimedActionExecutor, WorldState};

    use contracts::{ActionCatalog, AgentKind, SimConfig, WorldMap};

    fn test_state() -> AppState {
        let config = SimConfig::default();
        let catalog = ActionCatalog::standard();
        let executor = TimedActionExecutor::new(catalog.clone(), config.time_scale);
        let map = WorldMap {
            id: "town".to_string(),
            nodes: vec![contracts::PathNode {
                id: "t0".to_string(),
                x: 0.0,
                y: 0.0,
                kind: contracts::NodeKind::Spawn,
                connected_to: Vec::new(),
                leads_to: None,
            }],
            obstacles: Vec::new(),
            spawn_node_id: "t0".to_string(),
        };
        let mut world = WorldState::new(config, vec![map], 0);
        world
            .spawn_agent("char_1", "Mori", AgentKind::Character, "town")
            .expect("spawn");
        let engine = SimEngine::new(world, Box::new(executor), catalog.clone());
        AppState {
            handle: EngineHandle::new(engine, Arc::new(ScriptedDecider::new(catalog))),
        }
    }

    #[tokio::test]
    async fn status_reports_the_paused_world() {
        let state = test_state();
        let Json(body) = status(State(state)).await;
        assert_eq!(body["paused"], true);
        assert_eq!(body["agents"], 1);
        assert_eq!(body["schema_version"], "town.v1");
    }

    #[tokio::test]
    async fn start_and_pause_flip_the_flag() {
        let state = test_state();
        let Json(body) = start(State(state.clone())).await;
        assert_eq!(body["paused"], false);
        assert!(!state.handle.engine().lock().await.world().paused());

        let Json(body) = pause(State(state.clone())).await;
        assert_eq!(body["paused"], true);
        assert!(state.handle.engine().lock().await.world().paused());
    }

    #[tokio::test]
    async fn activity_without_a_store_is_empty() {
        let state = test_state();
        let Json(body) = activity(State(state)).await;
        assert_eq!(body["events"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn snapshot_splits_agent_kinds() {
        let state = test_state();
        let Json(body) = snapshot(State(state)).await;
        assert_eq!(body.characters.len(), 1);
        assert!(body.npcs.is_empty());
    }
}
