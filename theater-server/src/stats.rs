//! Diagnostics Endpoint
//!
//! Snapshot of every connection's latency window and last reported player
//! state, answered by the engine over a oneshot channel.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tokio::sync::mpsc::Sender;
use tokio::sync::oneshot;

use theater_core::TheaterCommand;

pub async fn stats_handler(State(theater): State<Sender<TheaterCommand>>) -> impl IntoResponse {
    let (reply, response) = oneshot::channel();
    if theater
        .send(TheaterCommand::Stats { reply })
        .await
        .is_err()
    {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    match response.await {
        Ok(connections) => Json(connections).into_response(),
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
