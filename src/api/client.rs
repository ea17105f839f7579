//! Guarded REST client for the oracle server.

use super::{ApiError, Device, DeviceId, LoginOutcome, LoginRequest, LoginResponse, Settings};
use crate::channel::{self, ChannelError};
use crate::session::RequestGuard;
use crate::status::DeviceSource;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Parse and normalize a server base URL.
///
/// Accepts `http` and `https` only. The path always ends with `/` so API
/// paths join underneath it rather than replacing its last segment.
pub fn normalize_base_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed).map_err(|e| ApiError::InvalidUrl(format!("{trimmed}: {e}")))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ApiError::InvalidUrl(format!(
            "URL must use http:// or https:// scheme, got: {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ApiError::InvalidUrl(format!("{trimmed}: missing host")));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// REST client with every call routed through the [`RequestGuard`].
///
/// # Examples
///
/// ```
/// use oracle::api::ConsoleClient;
/// use oracle::session::RequestGuard;
/// use std::time::Duration;
///
/// let client = ConsoleClient::new(
///     "http://127.0.0.1:8080",
///     Duration::from_secs(10),
///     RequestGuard::detached(),
/// )
/// .unwrap();
/// assert_eq!(
///     client.status_channel_url().unwrap().as_str(),
///     "ws://127.0.0.1:8080/api/devices/status"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct ConsoleClient {
    base_url: Url,
    http: reqwest::Client,
    guard: RequestGuard,
}

impl ConsoleClient {
    /// Create a client with its own connection pool.
    pub fn new(base_url: &str, timeout: Duration, guard: RequestGuard) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Self::with_client(base_url, http, guard)
    }

    /// Create a client around an existing HTTP client (for testing).
    pub fn with_client(
        base_url: &str,
        http: reqwest::Client,
        guard: RequestGuard,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            http,
            guard,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn guard(&self) -> &RequestGuard {
        &self.guard
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    /// `GET /api/devices`
    pub async fn list_devices(&self) -> Result<Vec<Device>, ApiError> {
        let url = self.endpoint("api/devices")?;
        let response = self.guard.send(self.http.get(url)).await?;
        decode_json(ensure_success(response)?).await
    }

    /// `POST /api/device` with the create sentinel id.
    pub async fn add_device(&self, mut device: Device) -> Result<(), ApiError> {
        device.id = Device::CREATE_ID;
        let url = self.endpoint("api/device")?;
        let response = self.guard.send(self.http.post(url).json(&device)).await?;
        ensure_success(response)?;

        tracing::info!(device = %device.desc(), "Device added");
        Ok(())
    }

    /// `DELETE /api/device/{id}`
    pub async fn remove_device(&self, id: DeviceId) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("api/device/{id}"))?;
        let response = self.guard.send(self.http.delete(url)).await?;
        ensure_success(response)?;

        tracing::info!(device_id = id, "Device removed");
        Ok(())
    }

    /// `GET /api/settings`
    pub async fn settings(&self) -> Result<Settings, ApiError> {
        let url = self.endpoint("api/settings")?;
        let response = self.guard.send(self.http.get(url)).await?;
        decode_json(ensure_success(response)?).await
    }

    /// `POST /api/settings`
    ///
    /// The server answers `200` with the body `error` when it refuses the
    /// values, which is reported as a validation failure.
    pub async fn update_settings(&self, settings: &Settings) -> Result<(), ApiError> {
        settings.validate()?;

        let url = self.endpoint("api/settings")?;
        let response = self.guard.send(self.http.post(url).json(settings)).await?;
        let body = ensure_success(response)?
            .text()
            .await
            .map_err(ApiError::from_transport)?;

        if body.trim() == "error" {
            return Err(ApiError::Validation {
                field: "settings".to_string(),
                message: "rejected by server".to_string(),
            });
        }

        tracing::info!(
            web_port = settings.web_port,
            ping_interval = settings.ping_interval,
            "Settings updated"
        );
        Ok(())
    }

    /// `POST /api/login`
    ///
    /// On success any token returned by the server becomes the session
    /// credential.
    pub async fn login(&self, name: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let url = self.endpoint("api/login")?;
        let request = LoginRequest {
            name: name.to_string(),
            password: password.to_string(),
        };
        let response = self.guard.send(self.http.post(url).json(&request)).await?;
        let response: LoginResponse = decode_json(ensure_success(response)?).await?;

        match response.result.as_str() {
            "ok" => {
                let token_issued = match response.token {
                    Some(token) => {
                        self.guard.credentials().set(token);
                        true
                    }
                    None => false,
                };
                tracing::info!(user = name, token_issued, "Logged in");
                Ok(LoginOutcome::Accepted { token_issued })
            }
            "error" => {
                tracing::warn!(user = name, "Login rejected");
                Ok(LoginOutcome::Rejected)
            }
            other => Err(ApiError::Decode(format!("unknown login result: {other}"))),
        }
    }

    /// `POST /api/logout`
    ///
    /// The local session is cleared whatever the server answers.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let url = self.endpoint("api/logout")?;
        let result = self
            .guard
            .send(self.http.post(url))
            .await
            .and_then(ensure_success);
        self.guard.credentials().clear();
        result.map(|_| ())
    }

    /// Push endpoint for device status events.
    pub fn status_channel_url(&self) -> Result<Url, ChannelError> {
        channel::push_endpoint(&self.base_url, channel::STATUS_PATH)
    }

    /// Push endpoint for the server event log.
    pub fn log_channel_url(&self) -> Result<Url, ChannelError> {
        channel::push_endpoint(&self.base_url, channel::LOG_PATH)
    }
}

#[async_trait]
impl DeviceSource for ConsoleClient {
    async fn fetch_devices(&self) -> Result<Vec<Device>, ApiError> {
        self.list_devices().await
    }
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status: response.status().as_u16(),
            url: response.url().to_string(),
        })
    }
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let body = response.text().await.map_err(ApiError::from_transport)?;
    serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
}
