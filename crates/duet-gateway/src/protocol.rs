//! Gateway HTTP protocol - JSON bodies exchanged with chat clients

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use duet_core::ChatError;

pub const MSG_UNAUTHENTICATED: &str = "User not authenticated";
pub const MSG_CHAT_NOT_FOUND: &str = "Chat not found";
pub const DEFAULT_CHAT_NAME: &str = "New Chat";

/// Body of `POST /api/chat/ai`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    pub prompt: String,
}

/// Body of `POST /api/chat/create`; the whole body may be omitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRequest {
    #[serde(default)]
    pub name: Option<String>,
}

impl CreateRequest {
    pub fn name_or_default(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_CHAT_NAME,
        }
    }
}

/// Envelope wrapped around every chat response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    /// Client-facing failure (auth, lookup, bad input)
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            error: None,
        }
    }

    /// Server-side failure
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Every way a chat route can fail
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound,
    BadRequest(String),
    Internal(String),
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::ConversationNotFound { .. } => Self::NotFound,
            ChatError::Storage(e) => Self::Internal(format!("{:#}", e)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ApiResponse::rejected(MSG_UNAUTHENTICATED),
            ),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                ApiResponse::rejected(MSG_CHAT_NOT_FOUND),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiResponse::rejected(msg)),
            Self::Internal(err) => {
                error!("Chat request failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::failed(err))
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_ask_request_deserialize() {
        let json = r#"{"chatId":"c-1","prompt":"hello"}"#;
        let req: AskRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.chat_id, "c-1");
        assert_eq!(req.prompt, "hello");
    }

    #[test]
    fn test_ask_request_requires_fields() {
        assert!(serde_json::from_str::<AskRequest>(r#"{"prompt":"x"}"#).is_err());
        assert!(serde_json::from_str::<AskRequest>(r#"{"chatId":"c"}"#).is_err());
    }

    #[test]
    fn test_create_request_name() {
        let req: CreateRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.name_or_default(), "New Chat");
        let req: CreateRequest = serde_json::from_str(r#"{"name":"  "}"#).unwrap();
        assert_eq!(req.name_or_default(), "New Chat");
        let req: CreateRequest = serde_json::from_str(r#"{"name":"Rust"}"#).unwrap();
        assert_eq!(req.name_or_default(), "Rust");
    }

    #[test]
    fn test_envelope_shapes() {
        let ok = serde_json::to_value(ApiResponse::ok(42)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": 42}));

        let rejected = serde_json::to_value(ApiResponse::rejected("Chat not found")).unwrap();
        assert_eq!(
            rejected,
            serde_json::json!({"success": false, "message": "Chat not found"})
        );

        let failed = serde_json::to_value(ApiResponse::failed("boom")).unwrap();
        assert_eq!(failed, serde_json::json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn test_chat_error_mapping() {
        let nf = ApiError::from(ChatError::ConversationNotFound {
            conversation_id: "x".to_string(),
        });
        assert!(matches!(nf, ApiError::NotFound));

        let storage = ApiError::from(ChatError::Storage(anyhow!("disk full")));
        assert!(matches!(storage, ApiError::Internal(ref e) if e == "disk full"));

        assert_eq!(
            ApiError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
