//! HTTP helpers for the webhook Lambda.

use lambda_http::{Body, Response};
use serde::Serialize;

/// Body returned for every webhook invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookReply {
    pub status_code: u16,
    pub message: String,
}

impl WebhookReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            message: message.into(),
        }
    }

    pub fn error(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))?)
}

/// Turn a reply into a Lambda response carrying the same status code.
pub fn reply_response(reply: &WebhookReply) -> Result<Response<Body>, lambda_http::Error> {
    json_response(reply.status_code, reply)
}
