//! Response envelope and content negotiation.
//!
//! Handlers return either a [`Value`] tree to be wrapped in the Subsonic
//! envelope, or raw bytes (cover art, audio) passed through untouched. The
//! format is chosen by the `f` request parameter before the handler runs.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use crate::value::{self, Object, Value};

/// The Subsonic protocol version stamped on every envelope.
pub const API_VERSION: &str = "1.9.0";

/// Root key of the response envelope.
const ENVELOPE_ROOT: &str = "subsonic-response";

/// Response format requested by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Xml,
    Json,
}

impl Format {
    /// Parse the `f` parameter. Absent means XML; anything other than
    /// `xml` or `json` is a client error.
    pub fn from_param(f: Option<&str>) -> Result<Self, ApiError> {
        match f {
            None | Some("xml") => Ok(Format::Xml),
            Some("json") => Ok(Format::Json),
            Some(other) => Err(ApiError::InvalidFormat(other.to_string())),
        }
    }
}

/// Tagged handler output.
///
/// `Content` is enveloped and serialized by the negotiated format; `Raw` is
/// returned as-is and bypasses the envelope entirely.
pub enum GatewayResponse {
    Content { format: Format, body: Object },
    Raw { bytes: Vec<u8>, content_type: &'static str },
}

impl GatewayResponse {
    pub fn content(format: Format, body: Object) -> Self {
        GatewayResponse::Content { format, body }
    }

    pub fn raw(bytes: Vec<u8>) -> Self {
        GatewayResponse::Raw {
            bytes,
            content_type: "application/octet-stream",
        }
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        match self {
            GatewayResponse::Raw {
                bytes,
                content_type,
            } => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                bytes,
            )
                .into_response(),
            GatewayResponse::Content { format, mut body } => {
                body.set_default("status", "ok");
                body.set_default("version", API_VERSION);
                let envelope = Object::new().with(ENVELOPE_ROOT, body);

                match format {
                    Format::Xml => match value::to_xml(&envelope) {
                        Ok(xml) => (
                            StatusCode::OK,
                            [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
                            format!(r#"<?xml version="1.0" encoding="UTF-8"?>{xml}"#),
                        )
                            .into_response(),
                        Err(e) => ApiError::from(e).into_response(),
                    },
                    Format::Json => {
                        let json = value::to_json(&Value::Object(envelope));
                        match serde_json::to_string(&json) {
                            Ok(body) => (
                                StatusCode::OK,
                                [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
                                body,
                            )
                                .into_response(),
                            Err(e) => {
                                tracing::error!("JSON serialization error: {}", e);
                                StatusCode::INTERNAL_SERVER_ERROR.into_response()
                            }
                        }
                    }
                }
            }
        }
    }
}
