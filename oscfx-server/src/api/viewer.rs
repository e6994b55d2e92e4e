use axum::{
    Router,
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use oscfx_core::events::{ChannelMessage, ModuleId};
use oscfx_core::processors::{ConsumerChannel, HubError};
use oscfx_sdk::objects::CreateModule;
use oscfx_sdk::objects::ws::{WsClientMessage, WsCloseCode, WsServerMessage};

use super::{ApiError, change_response, create_module};
use crate::state::AppState;

/// Build the viewer router.
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(viewer_ws))
}

/// `GET /ws`: viewer WebSocket.
///
/// Each connection is one consumer channel. The first frame is
/// `welcome { channel_id }`; after that every published event arrives as
/// `event` and every firing of this channel's modules as `fired`. The
/// channel is detached when the socket closes.
async fn viewer_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_viewer_ws(socket, state))
}

async fn handle_viewer_ws(mut socket: WebSocket, state: AppState) {
    let mut channel = state.hub.attach().await;
    let channel_id = channel.id();

    let welcome = WsServerMessage::Welcome {
        channel_id: channel_id.as_uuid(),
    };
    if send_json(&mut socket, &welcome).await.is_ok() {
        relay(&mut socket, &mut channel, &state).await;
    }

    state.hub.detach(channel_id).await;
    tracing::debug!(%channel_id, "Viewer socket closed");
}

/// Pump hub messages out and client commands in until either side ends.
async fn relay(socket: &mut WebSocket, channel: &mut ConsumerChannel, state: &AppState) {
    loop {
        tokio::select! {
            message = channel.recv() => {
                let Some(message) = message else { break };
                let msg = match message {
                    ChannelMessage::Event(event) => WsServerMessage::Event {
                        event: event.to_record(),
                    },
                    ChannelMessage::Fired(firing) => WsServerMessage::Fired {
                        firing: firing.to_record(),
                    },
                };
                if send_json(socket, &msg).await.is_err() {
                    return;
                }
            }

            msg = socket.recv() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => continue,
                };
                let reply = match serde_json::from_str::<WsClientMessage>(text.as_str()) {
                    Ok(command) => handle_command(state, channel, command).await,
                    Err(e) => {
                        tracing::warn!(
                            channel_id = %channel.id(),
                            error = %e,
                            "Invalid viewer message"
                        );
                        WsServerMessage::Error {
                            code: WsCloseCode::INVALID_MESSAGE,
                            reason: e.to_string(),
                        }
                    }
                };
                if send_json(socket, &reply).await.is_err() {
                    return;
                }
            }
        }
    }

    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: WsCloseCode::NORMAL,
            reason: "channel detached".into(),
        })))
        .await;
}

async fn handle_command(
    state: &AppState,
    channel: &ConsumerChannel,
    command: WsClientMessage,
) -> WsServerMessage {
    let channel_id = channel.id();
    let result = match command {
        WsClientMessage::AddModule {
            effect,
            reference,
            notes,
        } => create_module(
            state,
            channel_id,
            CreateModule {
                effect,
                reference,
                notes,
            },
        )
        .await
        .map(|module| WsServerMessage::Module { module }),
        WsClientMessage::RemoveModule { module_id } => state
            .hub
            .remove_module(channel_id, ModuleId::from_uuid(module_id))
            .await
            .map(|()| WsServerMessage::ModuleRemoved { module_id })
            .map_err(ApiError::from),
        WsClientMessage::SetReference {
            module_id,
            reference,
        } => state
            .hub
            .set_reference_filter(channel_id, ModuleId::from_uuid(module_id), &reference)
            .await
            .map(|change| WsServerMessage::Module {
                module: change_response(change),
            })
            .map_err(ApiError::from),
        WsClientMessage::SetNotes { module_id, notes } => state
            .hub
            .set_note_allow_list(channel_id, ModuleId::from_uuid(module_id), &notes)
            .await
            .map(|change| WsServerMessage::Module {
                module: change_response(change),
            })
            .map_err(ApiError::from),
    };

    result.unwrap_or_else(|e| {
        let code = match &e {
            ApiError::Hub(HubError::UnknownModule { .. }) => WsCloseCode::MODULE_NOT_FOUND,
            ApiError::Hub(HubError::UnknownChannel(_)) => WsCloseCode::INTERNAL_ERROR,
            ApiError::InvalidEffect(_) => WsCloseCode::INVALID_EFFECT,
        };
        WsServerMessage::Error {
            code,
            reason: e.reason(),
        }
    })
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
pub(super) async fn send_json<T: serde::Serialize>(
    socket: &mut WebSocket,
    value: &T,
) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
