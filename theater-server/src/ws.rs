//! WebSocket Transport Binding
//!
//! One pump per connection: decoded client messages flow into the engine's
//! command channel, the member's outbox flows back onto the socket, and the
//! 20-second probe timer lives here so it dies with the connection.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, Sender};
use tracing::{debug, info, warn};
use uuid::Uuid;

use theater_core::latency::PROBE_INTERVAL;
use theater_core::sync::ClientEvent;
use theater_core::TheaterCommand;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(theater): State<Sender<TheaterCommand>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, theater))
}

async fn handle_socket(socket: WebSocket, theater: Sender<TheaterCommand>) {
    let connection_id = Uuid::new_v4().to_string();
    info!("client connecting: {}", connection_id);

    let (outbox, mut outbox_rx) = mpsc::unbounded_channel();
    if theater
        .send(TheaterCommand::Connect {
            id: connection_id.clone(),
            outbox,
        })
        .await
        .is_err()
    {
        return;
    }

    let (mut sink, mut stream) = socket.split();
    // First tick fires immediately, so probing starts on connect
    let mut probes = tokio::time::interval(PROBE_INTERVAL);

    loop {
        tokio::select! {
            Some(event) = outbox_rx.recv() => {
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if sink.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(error) => warn!("could not encode server event: {}", error),
                }
            }

            _ = probes.tick() => {
                if theater
                    .send(TheaterCommand::ProbeTick { id: connection_id.clone() })
                    .await
                    .is_err()
                {
                    break;
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => {
                            let _ = theater
                                .send(TheaterCommand::Client {
                                    id: connection_id.clone(),
                                    event,
                                })
                                .await;
                        }
                        Err(error) => debug!("dropping malformed client message: {}", error),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        debug!("websocket error: {}", error);
                        break;
                    }
                }
            }
        }
    }

    // The probe timer dies with this pump; the engine drops the member
    let _ = theater
        .send(TheaterCommand::Disconnect {
            id: connection_id.clone(),
        })
        .await;
    info!("client disconnected: {}", connection_id);
}
