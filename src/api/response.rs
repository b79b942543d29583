//! Response envelope shared by every endpoint.
//!
//! Mobile clients dispatch on the numeric `code` field, not on the HTTP
//! status line, so codes are part of the wire contract and are never
//! renumbered. `httpStatus` mirrors the status line for clients that log the
//! body on its own.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub error: bool,
    pub success: bool,
    pub code: u16,
    #[serde(rename = "httpStatus")]
    pub http_status: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub meta: Option<Value>,
}

impl ApiResponse {
    #[must_use]
    pub fn ok(code: u16, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: false,
            success: true,
            code,
            http_status: status.as_u16(),
            message: message.into(),
            payload: None,
            meta: None,
        }
    }

    #[must_use]
    pub fn fail(code: u16, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: true,
            success: false,
            code,
            http_status: status.as_u16(),
            message: message.into(),
            payload: None,
            meta: None,
        }
    }

    /// Bad request with a validation-bucket code.
    #[must_use]
    pub fn validation(code: u16, message: impl Into<String>) -> Self {
        Self::fail(code, StatusCode::BAD_REQUEST, message)
    }

    /// Unauthorized with an auth-bucket code.
    #[must_use]
    pub fn unauthorized(code: u16, message: impl Into<String>) -> Self {
        Self::fail(code, StatusCode::UNAUTHORIZED, message)
    }

    /// Internal error with a server-bucket code.
    #[must_use]
    pub fn server_error(code: u16, message: impl Into<String>) -> Self {
        Self::fail(code, StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_keeps_code_and_status_in_sync() {
        let response = ApiResponse::ok(2001, StatusCode::CREATED, "User registered successfully");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["error"], json!(false));
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["code"], json!(2001));
        assert_eq!(value["httpStatus"], json!(201));
        assert_eq!(value["message"], json!("User registered successfully"));
    }

    #[test]
    fn empty_sections_are_not_serialized() {
        let value =
            serde_json::to_value(ApiResponse::validation(1001, "Missing required fields")).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 5);
        assert!(!object.contains_key("payload"));
        assert!(!object.contains_key("meta"));
    }

    #[test]
    fn payload_and_meta_are_attached_verbatim() {
        let response = ApiResponse::ok(2002, StatusCode::OK, "Login successful")
            .with_payload(json!({ "session": { "access_token": "t" } }))
            .with_meta(json!({ "requiresTwoFactor": true }));
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["payload"]["session"]["access_token"], json!("t"));
        assert_eq!(value["meta"]["requiresTwoFactor"], json!(true));
    }

    #[test]
    fn into_response_uses_the_envelope_status() {
        assert_eq!(
            ApiResponse::unauthorized(4011, "Invalid or expired token")
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiResponse::server_error(5002, "Login failed")
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
