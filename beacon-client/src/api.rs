//! HTTP API client for the dispatch service.
//!
//! A 401 from the server becomes [`ClientError::AuthExpired`] — an explicit,
//! caller-visible error the UI layer reacts to, not a hidden redirect.

use crate::error::ClientError;
use async_trait::async_trait;
use beacon_core::types::{Incident, IncidentStatus};
use serde::Deserialize;

/// The acknowledgment returned by a create call, before any fan-out work.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAck {
    pub dispatch_id: String,
    pub status: IncidentStatus,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    incidents: Vec<Incident>,
}

#[derive(Debug, Deserialize)]
struct AudioResponse {
    audio_ref: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    incident: Incident,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// The slice of the API the emergency flow depends on, kept as a trait so
/// the flow is testable without a server.
#[async_trait]
pub trait IncidentApi: Send + Sync {
    async fn create_incident(&self, latitude: f64, longitude: f64)
    -> Result<CreateAck, ClientError>;

    async fn upload_audio(&self, dispatch_id: &str, wav: Vec<u8>) -> Result<String, ClientError>;
}

/// reqwest-backed client carrying the bearer credential.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::AuthExpired);
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| "request failed".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))
    }

    /// The caller's own incidents, newest first.
    pub async fn my_incidents(&self) -> Result<Vec<Incident>, ClientError> {
        let response = self
            .http
            .get(self.url("/api/incidents/mine"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self::decode::<ListResponse>(response).await?.incidents)
    }

    /// The full feed, newest first (responder/admin credential required).
    pub async fn all_incidents(&self) -> Result<Vec<Incident>, ClientError> {
        let response = self
            .http
            .get(self.url("/api/incidents"))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self::decode::<ListResponse>(response).await?.incidents)
    }

    /// Incidents within `radius_m` of a point (responder/admin credential).
    pub async fn nearby_incidents(
        &self,
        latitude: f64,
        longitude: f64,
        radius_m: f64,
    ) -> Result<Vec<Incident>, ClientError> {
        let response = self
            .http
            .get(self.url("/api/incidents/nearby"))
            .query(&[("lat", latitude), ("lng", longitude), ("radius", radius_m)])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self::decode::<ListResponse>(response).await?.incidents)
    }

    /// Request a status change (responder/admin credential required).
    pub async fn update_status(
        &self,
        id: i64,
        status: IncidentStatus,
    ) -> Result<Incident, ClientError> {
        let response = self
            .http
            .put(self.url(&format!("/api/incidents/{id}/status")))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self::decode::<StatusResponse>(response).await?.incident)
    }
}

#[async_trait]
impl IncidentApi for ApiClient {
    async fn create_incident(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<CreateAck, ClientError> {
        let response = self
            .http
            .post(self.url("/api/incidents"))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "latitude": latitude, "longitude": longitude }))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn upload_audio(&self, dispatch_id: &str, wav: Vec<u8>) -> Result<String, ClientError> {
        let response = self
            .http
            .post(self.url(&format!("/api/incidents/{dispatch_id}/audio")))
            .bearer_auth(&self.token)
            .body(wav)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self::decode::<AudioResponse>(response).await?.audio_ref)
    }
}
