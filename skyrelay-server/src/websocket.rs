//! Live GPS feed for browsers

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::path::Path;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::gps::GpsFix;

/// Message pushed to every connected browser
#[derive(Debug, Serialize)]
pub struct GpsEvent<'a> {
    pub event: &'static str,
    pub data: &'a GpsFix,
}

impl<'a> GpsEvent<'a> {
    pub fn new(fix: &'a GpsFix) -> Self {
        Self { event: "gps", data: fix }
    }
}

#[derive(Clone)]
pub struct GpsHubState {
    pub fixes: broadcast::Sender<GpsFix>,
}

/// WebSocket at `/ws`, everything else served from `static_dir`
pub fn create_gps_router(state: GpsHubState, static_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .with_state(state)
}

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<GpsHubState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: GpsHubState) {
    let connection_id = Uuid::new_v4().to_string();
    info!("Browser connected: {}", connection_id);

    let mut fixes = state.fixes.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let send_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let fix = match fixes.recv().await {
                Ok(fix) => fix,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("{} skipped {} fixes", send_id, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let json = match serde_json::to_string(&GpsEvent::new(&fix)) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize GPS fix: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json)).await {
                debug!("Failed to send to {}: {}", send_id, e);
                break;
            }
        }
    });

    // the feed is one-way; reading only notices when the browser leaves
    let recv_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => debug!("Ignoring message from {}", recv_id),
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Browser disconnected: {}", connection_id);
}
