//! HTTP and WebSocket API.
//!
//! - `viewer`: the `/ws` viewer socket, one consumer channel per connection
//! - `modules`: per-channel module configuration over plain HTTP
//! - `effects`: effect counters and firing streams

pub mod effects;
pub mod modules;
pub mod viewer;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use oscfx_core::effects::{EffectName, EffectNameError};
use oscfx_core::events::ChannelId;
use oscfx_core::filter::FilterSpec;
use oscfx_core::processors::{HubError, ModuleChange, ModuleSnapshot};
use oscfx_sdk::objects::{CreateModule, ModuleResponse};

use crate::state::AppState;

/// Convert a hub snapshot into the API model.
fn to_response(snapshot: &ModuleSnapshot, rejected_notes: Vec<String>) -> ModuleResponse {
    ModuleResponse {
        module_id: snapshot.id.as_uuid(),
        channel_id: snapshot.channel_id.as_uuid(),
        effect: snapshot.effect.to_string(),
        reference: snapshot.spec.reference().map(str::to_string),
        notes: snapshot.spec.notes().iter().copied().collect(),
        rejected_notes,
        last_match: snapshot.last_dispatched.as_ref().map(|a| a.to_string()),
    }
}

fn change_response(change: ModuleChange) -> ModuleResponse {
    to_response(&change.module, change.rejected_notes)
}

/// Create a module from a request body, shared by HTTP and the viewer socket.
async fn create_module(
    state: &AppState,
    channel_id: ChannelId,
    request: CreateModule,
) -> Result<ModuleResponse, ApiError> {
    let effect = match request.effect {
        Some(name) => EffectName::new(name)?,
        None => state.default_effect.clone(),
    };
    let mut spec = FilterSpec::match_all().with_reference(&request.reference);
    let rejected = spec.set_notes_from_text(&request.notes);

    let change = state.hub.add_module(channel_id, effect, spec).await?;
    Ok(to_response(&change.module, rejected))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in API handlers.
#[derive(Debug)]
pub enum ApiError {
    Hub(HubError),
    InvalidEffect(EffectNameError),
}

impl From<HubError> for ApiError {
    fn from(e: HubError) -> Self {
        ApiError::Hub(e)
    }
}

impl From<EffectNameError> for ApiError {
    fn from(e: EffectNameError) -> Self {
        ApiError::InvalidEffect(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Hub(HubError::UnknownChannel(_)) => StatusCode::NOT_FOUND,
            ApiError::Hub(HubError::UnknownModule { .. }) => StatusCode::NOT_FOUND,
            ApiError::InvalidEffect(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn reason(&self) -> String {
        match self {
            ApiError::Hub(e) => e.to_string(),
            ApiError::InvalidEffect(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.reason()).into_response()
    }
}
