//! Module configuration handlers.
//!
//! # Endpoints
//!
//! - `GET    /channels/{channel_id}/modules`                        – list modules
//! - `POST   /channels/{channel_id}/modules`                        – add a module
//! - `GET    /channels/{channel_id}/modules/{module_id}`            – snapshot
//! - `DELETE /channels/{channel_id}/modules/{module_id}`            – remove
//! - `PUT    /channels/{channel_id}/modules/{module_id}/reference`  – set reference filter
//! - `PUT    /channels/{channel_id}/modules/{module_id}/notes`      – set note allow-list
//!
//! Channel ids come from the `welcome` message of the viewer socket.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use oscfx_core::events::{ChannelId, ModuleId};
use oscfx_sdk::objects::{CreateModule, ModuleResponse, SetNotes, SetReference};
use uuid::Uuid;

use super::{ApiError, change_response, create_module, to_response};
use crate::state::AppState;

/// Build the module configuration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/channels/{channel_id}/modules",
            get(list_modules).post(add_module),
        )
        .route(
            "/channels/{channel_id}/modules/{module_id}",
            get(get_module).delete(remove_module),
        )
        .route(
            "/channels/{channel_id}/modules/{module_id}/reference",
            put(set_reference),
        )
        .route(
            "/channels/{channel_id}/modules/{module_id}/notes",
            put(set_notes),
        )
}

async fn list_modules(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
) -> Result<Json<Vec<ModuleResponse>>, ApiError> {
    let modules = state.hub.modules(ChannelId::from_uuid(channel_id)).await?;
    Ok(Json(
        modules.iter().map(|m| to_response(m, Vec::new())).collect(),
    ))
}

/// `POST /channels/{channel_id}/modules`: add a module.
///
/// The new module is evaluated against the channel's log right away, so it
/// may fire before this returns.
async fn add_module(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Json(request): Json<CreateModule>,
) -> Result<impl IntoResponse, ApiError> {
    let response = create_module(&state, ChannelId::from_uuid(channel_id), request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_module(
    State(state): State<AppState>,
    Path((channel_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ModuleResponse>, ApiError> {
    let snapshot = state
        .hub
        .module_snapshot(
            ChannelId::from_uuid(channel_id),
            ModuleId::from_uuid(module_id),
        )
        .await?;
    Ok(Json(to_response(&snapshot, Vec::new())))
}

async fn remove_module(
    State(state): State<AppState>,
    Path((channel_id, module_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .hub
        .remove_module(
            ChannelId::from_uuid(channel_id),
            ModuleId::from_uuid(module_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT .../reference`: an empty reference clears the filter.
async fn set_reference(
    State(state): State<AppState>,
    Path((channel_id, module_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SetReference>,
) -> Result<Json<ModuleResponse>, ApiError> {
    let change = state
        .hub
        .set_reference_filter(
            ChannelId::from_uuid(channel_id),
            ModuleId::from_uuid(module_id),
            &body.reference,
        )
        .await?;
    Ok(Json(change_response(change)))
}

/// `PUT .../notes`: comma-separated MIDI numbers. Non-numeric tokens are
/// ignored and returned in `rejected_notes`.
async fn set_notes(
    State(state): State<AppState>,
    Path((channel_id, module_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<SetNotes>,
) -> Result<Json<ModuleResponse>, ApiError> {
    let change = state
        .hub
        .set_note_allow_list(
            ChannelId::from_uuid(channel_id),
            ModuleId::from_uuid(module_id),
            &body.notes,
        )
        .await?;
    Ok(Json(change_response(change)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use oscfx_core::config::HubConfig;
    use oscfx_core::decoder::decode;
    use oscfx_core::effects::{EffectAggregator, EffectName};
    use oscfx_core::processors::BroadcastHub;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_state() -> AppState {
        let hub = BroadcastHub::new(HubConfig::default(), Arc::new(EffectAggregator::new()));
        AppState::new(Arc::new(hub), EffectName::new("Burst").unwrap())
    }

    async fn call(
        state: &AppState,
        method: Method,
        uri: String,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router()
            .with_state(state.clone())
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_module_lifecycle() {
        let state = app_state();
        let channel = state.hub.attach().await;
        state.hub.publish(decode("Note_1_Alice_36_5", Vec::new()).unwrap()).await;
        let base = format!("/channels/{}/modules", channel.id());

        let (status, body) = call(
            &state,
            Method::POST,
            base.clone(),
            Some(serde_json::json!({ "reference": "alice", "notes": "36, kick" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: ModuleResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.effect, "Burst");
        assert_eq!(created.notes, vec![36]);
        assert_eq!(created.rejected_notes, vec!["kick".to_string()]);
        assert_eq!(created.last_match.as_deref(), Some("Note_1_Alice_36_5"));
        assert_eq!(
            state.effects().current_count(&EffectName::new("Burst").unwrap()),
            1
        );

        let module_uri = format!("{base}/{}", created.module_id);
        let (status, body) = call(
            &state,
            Method::PUT,
            format!("{module_uri}/reference"),
            Some(serde_json::json!({ "reference": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let updated: ModuleResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(updated.reference, None);

        let (status, _) = call(&state, Method::GET, module_uri.clone(), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&state, Method::DELETE, module_uri.clone(), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&state, Method::GET, module_uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_channel_is_not_found() {
        let state = app_state();
        let (status, _) = call(
            &state,
            Method::POST,
            format!("/channels/{}/modules", Uuid::new_v4()),
            Some(serde_json::json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_effect_is_rejected() {
        let state = app_state();
        let channel = state.hub.attach().await;
        let (status, _) = call(
            &state,
            Method::POST,
            format!("/channels/{}/modules", channel.id()),
            Some(serde_json::json!({ "effect": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.hub.modules(channel.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_notes_reports_rejected() {
        let state = app_state();
        let channel = state.hub.attach().await;
        let (_, body) = call(
            &state,
            Method::POST,
            format!("/channels/{}/modules", channel.id()),
            Some(serde_json::json!({ "effect": "Light Up" })),
        )
        .await;
        let created: ModuleResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.effect, "Light Up");

        let (status, body) = call(
            &state,
            Method::PUT,
            format!("/channels/{}/modules/{}/notes", channel.id(), created.module_id),
            Some(serde_json::json!({ "notes": "40,abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let updated: ModuleResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(updated.notes, vec![40]);
        assert_eq!(updated.rejected_notes, vec!["abc".to_string()]);
    }
}
