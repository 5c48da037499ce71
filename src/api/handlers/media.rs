//! Media retrieval handlers (getCoverArt, stream).
//!
//! Both return raw upstream bytes and bypass the response envelope.

use std::sync::Arc;

use axum::extract::State;

use crate::api::auth::{GatewayAuth, RequestContext};
use crate::api::error::ApiError;
use crate::api::response::GatewayResponse;
use crate::jellyfin::JellyfinClient;

/// GET/POST /rest/getCoverArt[.view]
///
/// Unauthenticated: the upstream cover endpoint only needs an item id. An
/// upstream miss surfaces as 404 rather than a generic failure.
pub async fn get_cover_art(
    State(client): State<Arc<JellyfinClient>>,
    context: RequestContext,
) -> Result<GatewayResponse, ApiError> {
    let album_id = context.require("id")?;
    let bytes = client.get_album_cover(album_id).await?;
    Ok(GatewayResponse::raw(bytes))
}

/// GET/POST /rest/stream[.view]
pub async fn stream(auth: GatewayAuth) -> Result<GatewayResponse, ApiError> {
    let song_id = auth.context.require("id")?;
    let bytes = auth.client.download_song(&auth.session, song_id).await?;
    Ok(GatewayResponse::raw(bytes))
}
