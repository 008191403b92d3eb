// WebSocket endpoint draining the notifier's broadcast channel.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::state::SharedState;

pub async fn ws_handler(State(state): State<SharedState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();
    let mut frames = state.notifier.subscribe();
    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    // A slow session drops frames rather than backing up
                    // the notifier.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("WebSocket session lagged, skipped {} frame(s)", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound content is ignored; the socket is push-only.
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
