//! Effect signal handlers.
//!
//! # Endpoints
//!
//! - `GET /effects`           – every counter
//! - `GET /effects/{name}`    – one counter (0 if it never fired)
//! - `GET /effects/ws`        – stream of every firing
//! - `GET /effects/{name}/ws` – stream of one effect's firings

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use oscfx_core::effects::{EffectName, FiringStream};
use oscfx_sdk::objects::EffectCount;
use oscfx_sdk::objects::ws::WsServerMessage;
use tokio_stream::StreamExt;

use super::ApiError;
use super::viewer::send_json;
use crate::state::AppState;

/// Build the effects router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/effects", get(list_counts))
        .route("/effects/ws", get(all_firings_ws))
        .route("/effects/{name}", get(effect_count))
        .route("/effects/{name}/ws", get(effect_firings_ws))
}

async fn list_counts(State(state): State<AppState>) -> Json<Vec<EffectCount>> {
    Json(
        state
            .effects()
            .counts()
            .into_iter()
            .map(|(effect, count)| EffectCount {
                effect: effect.to_string(),
                count,
            })
            .collect(),
    )
}

async fn effect_count(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<EffectCount>, ApiError> {
    let effect = EffectName::new(&name)?;
    let count = state.effects().current_count(&effect);
    Ok(Json(EffectCount {
        effect: name,
        count,
    }))
}

async fn all_firings_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let stream = state.effects().on_any_fire();
    ws.on_upgrade(move |socket| relay_firings(socket, stream))
}

async fn effect_firings_ws(
    State(state): State<AppState>,
    Path(name): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let effect = EffectName::new(&name)?;
    let stream = state.effects().on_fire(effect);
    Ok(ws.on_upgrade(move |socket| relay_firings(socket, stream)))
}

/// Forward firings to the socket until the client goes away.
///
/// The subscription is taken before the upgrade completes, so no firing
/// between the request and the first frame is missed.
async fn relay_firings(mut socket: WebSocket, mut firings: FiringStream) {
    loop {
        tokio::select! {
            firing = firings.next() => {
                let Some(firing) = firing else { break };
                let msg = WsServerMessage::Fired {
                    firing: firing.to_record(),
                };
                if send_json(&mut socket, &msg).await.is_err() {
                    return;
                }
            }

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = socket.send(Message::Close(None)).await;
}
