use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Accept a server id as either a JSON number or string.
///
/// Ids are opaque to this client; server-assigned numeric ids and
/// client-assigned string ids share one representation.
fn opaque_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or number id, got {other}"
        ))),
    }
}

/// Write an id back the way the server assigned it: numeric ids round-trip
/// as numbers, everything else as a string.
fn serialize_opaque_id<S>(id: &str, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match id.parse::<u64>() {
        Ok(numeric) => serializer.serialize_u64(numeric),
        Err(_) => serializer.serialize_str(id),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionRecord {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageRecord {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub thinking: Option<String>,
    pub created_at: String,
}

/// Body for the streaming completion endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    #[serde(serialize_with = "serialize_opaque_id")]
    pub session_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Body for creating a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCreateRequest {
    pub title: String,
}

/// Body for renaming a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUpdateRequest {
    pub title: String,
}
