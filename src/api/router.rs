//! Router assembly for the gateway's Subsonic surface.

use std::sync::Arc;

use axum::handler::Handler;
use axum::routing::any;
use axum::{Router, extract::FromRef};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::jellyfin::JellyfinClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    jellyfin: Arc<JellyfinClient>,
}

impl AppState {
    pub fn new(client: JellyfinClient) -> Self {
        Self {
            jellyfin: Arc::new(client),
        }
    }
}

// Allow extracting Arc<JellyfinClient> from AppState
impl FromRef<AppState> for Arc<JellyfinClient> {
    fn from_ref(state: &AppState) -> Self {
        state.jellyfin.clone()
    }
}

/// Extension trait for Router to simplify Subsonic API route registration.
pub trait GatewayRouterExt<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Register a Subsonic endpoint under both `path` and `path.view`,
    /// accepting any HTTP verb (clients disagree on GET vs POST).
    fn view_route<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, S> + Clone,
        T: 'static;
}

impl<S> GatewayRouterExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn view_route<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, S> + Clone,
        T: 'static,
    {
        let view_path = format!("{}.view", path);
        self.route(path, any(handler.clone()))
            .route(&view_path, any(handler))
    }
}

/// Create the main router with all gateway routes.
pub fn create_router(state: AppState) -> Router {
    let rest_routes = Router::new()
        .view_route("/ping", handlers::ping)
        .view_route("/getArtists", handlers::get_artists)
        .view_route("/getGenres", handlers::get_genres)
        .view_route("/getArtist", handlers::get_artist)
        .view_route("/getArtistInfo2", handlers::get_artist_info2)
        .view_route("/getAlbum", handlers::get_album)
        .view_route("/getAlbumList", handlers::get_album_list)
        .view_route("/getAlbumList2", handlers::get_album_list2)
        .view_route("/getCoverArt", handlers::get_cover_art)
        .view_route("/stream", handlers::stream);

    Router::new()
        .nest("/rest", rest_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
