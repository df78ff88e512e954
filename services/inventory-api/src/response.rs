use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Success envelope returned by every resource endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    #[serde(skip)]
    status_code: StatusCode,
    pub status: &'static str,
    pub code: u16,
    pub message: String,
    pub payload: Value,
}

impl ApiResponse {
    pub fn new(status_code: StatusCode, message: impl Into<String>, payload: Value) -> Self {
        Self {
            status_code,
            status: "success",
            code: status_code.as_u16(),
            message: message.into(),
            payload,
        }
    }

    pub fn ok(message: impl Into<String>, payload: Value) -> Self {
        Self::new(StatusCode::OK, message, payload)
    }

    pub fn created(message: impl Into<String>, payload: Value) -> Self {
        Self::new(StatusCode::CREATED, message, payload)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status_code, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_created_envelope() {
        let response = ApiResponse::created("Brand created successfully", json!({"id": 1}));
        assert_eq!(response.status_code(), StatusCode::CREATED);

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "success",
                "code": 201,
                "message": "Brand created successfully",
                "payload": {"id": 1}
            })
        );
    }
}
