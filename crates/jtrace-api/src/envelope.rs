use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// `{success, message, data}` body shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T, message: impl Into<String>) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data,
    })
}

pub fn fail(message: impl Into<String>, data: Value) -> Json<Envelope<Value>> {
    Json(Envelope {
        success: false,
        message: message.into(),
        data,
    })
}
