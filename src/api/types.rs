//! Wire types for the oracle REST API.

use super::ApiError;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Server-assigned device identifier.
pub type DeviceId = u32;

/// A managed device as listed by `GET /api/devices`.
///
/// The server owns devices; the client only holds a replaceable copy.
/// Absent optional fields are omitted on the wire.
///
/// # Examples
///
/// ```
/// use oracle::api::Device;
///
/// let device: Device = serde_json::from_str(r#"{"id": 2, "ipv4": "10.0.0.2"}"#).unwrap();
/// assert_eq!(device.desc(), "10.0.0.2");
/// assert!(!device.snmp);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Addr>,
    #[serde(default)]
    pub snmp: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snmp_community: Option<String>,
}

impl Device {
    /// Id sent with a create request; the server assigns the real one.
    pub const CREATE_ID: DeviceId = 0;

    /// Build a create request.
    ///
    /// The name is trimmed and dropped if blank. Fails if neither a name nor
    /// an address remains, since the device would have no display label.
    pub fn draft(name: Option<&str>, ipv4: Option<Ipv4Addr>) -> Result<Self, ApiError> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        if name.is_none() && ipv4.is_none() {
            return Err(ApiError::Validation {
                field: "device".to_string(),
                message: "a name or an IPv4 address is required".to_string(),
            });
        }

        Ok(Self {
            id: Self::CREATE_ID,
            name,
            ipv4,
            snmp: false,
            snmp_community: None,
        })
    }

    /// Enable SNMP polling with an optional community string.
    pub fn with_snmp(mut self, community: Option<String>) -> Self {
        self.snmp = true;
        self.snmp_community = community.filter(|c| !c.trim().is_empty());
        self
    }

    /// Display label: name, else address, else a placeholder with the id.
    pub fn desc(&self) -> String {
        if let Some(name) = &self.name {
            name.clone()
        } else if let Some(ipv4) = self.ipv4 {
            ipv4.to_string()
        } else {
            format!("<device #{}>", self.id)
        }
    }
}

/// Global server settings (`GET/POST /api/settings`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub web_port: u16,
    pub ping_interval: u32,
}

impl Settings {
    /// The server refuses zero for either field.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.web_port == 0 {
            return Err(ApiError::Validation {
                field: "web_port".to_string(),
                message: "port must be between 1 and 65535".to_string(),
            });
        }
        if self.ping_interval == 0 {
            return Err(ApiError::Validation {
                field: "ping_interval".to_string(),
                message: "interval must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Body of `POST /api/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

/// Response of `POST /api/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub result: String,
    /// Session token, when the server issues one in the body
    #[serde(default)]
    pub token: Option<String>,
}

/// Outcome of a login attempt that reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Accepted; `true` if a token was stored in the session
    Accepted { token_issued: bool },
    /// Wrong name or password
    Rejected,
}
