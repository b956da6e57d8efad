//! WebSocket transport.
//!
//! `GET /ws?token=<token>` is verified before the upgrade. Each socket is
//! split into a reader that feeds the hub and a writer that drains the
//! connection's outbound channel.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::server::hub::Hub;
use crate::session::identity::Identity;

#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

pub fn router(hub: Arc<Hub>) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(hub)
}

/// Resolve the connection token, or the status to refuse the upgrade with.
pub fn authenticate(hub: &Hub, params: &ConnectParams) -> Result<Identity, StatusCode> {
    params
        .token
        .as_deref()
        .and_then(|token| hub.services().identities.verify(token))
        .ok_or(StatusCode::UNAUTHORIZED)
}

async fn ws_handler(
    State(hub): State<Arc<Hub>>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    match authenticate(&hub, &params) {
        Ok(identity) => ws.on_upgrade(move |socket| handle_socket(socket, hub, identity)),
        Err(status) => {
            warn!("rejected connection with an invalid token");
            (status, "Invalid or missing token").into_response()
        }
    }
}

async fn handle_socket(socket: WebSocket, hub: Arc<Hub>, identity: Identity) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let connection = hub.connect(&identity, tx);

    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                hub.handle_text(&identity, text.as_str());
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(user_id = %identity.id, error = %err, "socket error");
                break;
            }
        }
    }

    hub.disconnect(&identity, connection);
    writer.abort();
}
