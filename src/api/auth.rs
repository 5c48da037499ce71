//! Request context and authentication extractors.
//!
//! Subsonic clients send parameters in the query string, a urlencoded form
//! body, or both, on any HTTP verb. [`RequestContext`] merges the two into a
//! single map (body wins on collision) that is the only view of request
//! input downstream code gets. [`GatewayAuth`] layers the auth gate on top:
//! it reads `u`/`p`, decodes the legacy `enc:` hex obfuscation, and resolves
//! a cached upstream session.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRef, FromRequest, Request};
use axum::http::header;
use indexmap::IndexMap;

use super::error::ApiError;
use super::response::Format;
use crate::jellyfin::{JellyfinClient, Session};

/// Marker prefix for hex-obfuscated passwords.
const ENC_PREFIX: &str = "enc:";

/// Merged view of query-string and form-body parameters.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    params: IndexMap<String, String>,
}

impl RequestContext {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &'static str) -> Result<&str, ApiError> {
        self.get(key).ok_or(ApiError::MissingParameter(key))
    }

    /// Parse a numeric parameter, falling back to `default` when the key is
    /// absent or unparsable.
    pub fn usize_or(&self, key: &str, default: usize) -> usize {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn format(&self) -> Result<Format, ApiError> {
        Format::from_param(self.get("f"))
    }

    #[cfg(test)]
    pub(crate) fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            params: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<S> FromRequest<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<Body>, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        let mut params = IndexMap::new();
        if let Some(query) = parts.uri.query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                params.insert(key.into_owned(), value.into_owned());
            }
        }

        // Body entries override query entries on collision.
        let is_form = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            let bytes = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(|_| ApiError::InvalidBody)?;
            for (key, value) in url::form_urlencoded::parse(&bytes) {
                params.insert(key.into_owned(), value.into_owned());
            }
        }

        Ok(Self { params })
    }
}

/// Decode the legacy `enc:`-prefixed lowercase-hex password convention.
/// Anything that fails to decode is used as-is.
fn decode_password(password: &str) -> String {
    if let Some(encoded) = password.strip_prefix(ENC_PREFIX) {
        hex::decode(encoded)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .unwrap_or_else(|| password.to_string())
    } else {
        password.to_string()
    }
}

/// Authenticated request extractor.
///
/// Runs the full pre-handler pipeline: build the request context, negotiate
/// the response format (so an invalid `f` fails before credentials are even
/// looked at), then resolve the upstream session. Use it as the last handler
/// argument:
///
/// ```ignore
/// async fn handler(auth: GatewayAuth) -> Result<GatewayResponse, ApiError> {
///     let page = auth.client.get_genres(&auth.session).await?;
///     // ...
/// }
/// ```
pub struct GatewayAuth {
    pub session: Session,
    pub format: Format,
    pub context: RequestContext,
    pub client: Arc<JellyfinClient>,
}

impl<S> FromRequest<S> for GatewayAuth
where
    S: Send + Sync,
    Arc<JellyfinClient>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let context = RequestContext::from_request(req, state).await?;
        let format = context.format()?;

        let username = context.require("u")?.to_string();
        let password = decode_password(context.require("p")?);

        let client = Arc::<JellyfinClient>::from_ref(state);
        let session = client.get_user(&username, &password).await?;

        Ok(Self {
            session,
            format,
            context,
            client,
        })
    }
}
