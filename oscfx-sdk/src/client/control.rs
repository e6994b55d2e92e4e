//! HTTP client for the module configuration and effect surfaces.

use reqwest::Client;
use url::Url;
use uuid::Uuid;

use super::ClientError;
use crate::objects::effects::EffectCount;
use crate::objects::module::{CreateModule, ModuleResponse, SetNotes, SetReference};

/// Typed HTTP client for module configuration and effect counters.
///
/// Channels themselves are created by opening a viewer WebSocket (see
/// [`ViewerClient`](super::ViewerClient)); this client addresses modules on
/// an existing channel by id.
#[derive(Debug, Clone)]
pub struct ControlClient {
    http: Client,
    base_url: Url,
}

impl ControlClient {
    /// Create a new `ControlClient` rooted at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /channels/{channel_id}/modules`
    pub async fn add_module(
        &self,
        channel_id: Uuid,
        request: &CreateModule,
    ) -> Result<ModuleResponse, ClientError> {
        let url = self
            .base_url
            .join(&format!("/channels/{channel_id}/modules"))?;
        let resp = self.http.post(url).json(request).send().await?;
        parse_response(resp).await
    }

    /// `GET /channels/{channel_id}/modules/{module_id}`
    pub async fn get_module(
        &self,
        channel_id: Uuid,
        module_id: Uuid,
    ) -> Result<ModuleResponse, ClientError> {
        let url = self
            .base_url
            .join(&format!("/channels/{channel_id}/modules/{module_id}"))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `DELETE /channels/{channel_id}/modules/{module_id}`
    pub async fn remove_module(
        &self,
        channel_id: Uuid,
        module_id: Uuid,
    ) -> Result<(), ClientError> {
        let url = self
            .base_url
            .join(&format!("/channels/{channel_id}/modules/{module_id}"))?;
        let resp = self.http.delete(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Api { status, body });
        }
        Ok(())
    }

    /// `PUT /channels/{channel_id}/modules/{module_id}/reference`
    pub async fn set_reference(
        &self,
        channel_id: Uuid,
        module_id: Uuid,
        reference: impl Into<String>,
    ) -> Result<ModuleResponse, ClientError> {
        let url = self
            .base_url
            .join(&format!("/channels/{channel_id}/modules/{module_id}/reference"))?;
        let body = SetReference {
            reference: reference.into(),
        };
        let resp = self.http.put(url).json(&body).send().await?;
        parse_response(resp).await
    }

    /// `PUT /channels/{channel_id}/modules/{module_id}/notes`
    pub async fn set_notes(
        &self,
        channel_id: Uuid,
        module_id: Uuid,
        notes: impl Into<String>,
    ) -> Result<ModuleResponse, ClientError> {
        let url = self
            .base_url
            .join(&format!("/channels/{channel_id}/modules/{module_id}/notes"))?;
        let body = SetNotes {
            notes: notes.into(),
        };
        let resp = self.http.put(url).json(&body).send().await?;
        parse_response(resp).await
    }

    /// `GET /effects`
    pub async fn list_effects(&self) -> Result<Vec<EffectCount>, ClientError> {
        let url = self.base_url.join("/effects")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /effects/{name}`
    pub async fn effect_count(&self, effect: &str) -> Result<EffectCount, ClientError> {
        let url = self.base_url.join(&format!("/effects/{effect}"))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
