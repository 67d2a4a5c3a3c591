use axum::Json;
use serde::Serialize;

/// `{ success, result, message }` envelope used by most endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub result: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(result: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            result,
            message: message.into(),
        })
    }
}

/// `{ success, message }` for endpoints with nothing to return.
#[derive(Debug, Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}
