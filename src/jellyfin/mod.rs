//! Jellyfin upstream client.
//!
//! Issues authenticated HTTP calls to the upstream media server and owns the
//! per-credential session cache. Sessions are created lazily on the first
//! authenticated request for a credential pair and live for the rest of the
//! process; they are never re-validated or expired, so an upstream-side
//! invalidation surfaces as failed data calls rather than a re-login.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Client identity reported to the upstream in the authorization header.
const CLIENT_NAME: &str = "jellysub";
const DEVICE_NAME: &str = "jellysub";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Errors from the upstream media server.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream rejected the credentials")]
    InvalidCredentials,

    #[error("upstream returned status {status}")]
    Status { status: u16 },

    #[error("failed to parse upstream response: {0}")]
    Malformed(String),

    #[error("upstream has no cover image for this item")]
    CoverNotFound,

    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),
}

/// A resolved upstream session: the access token plus the upstream's own
/// user identifier, as returned by the authentication endpoint.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthResponse {
    user: AuthUser,
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthUser {
    id: String,
}

/// One page of upstream items. Every listing endpoint wraps its results in
/// an `Items` array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsPage<T> {
    #[serde(default)]
    pub items: Vec<T>,
}

/// An album-artist or genre row from a listing endpoint, or the detail
/// document for a single artist.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArtistItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub overview: Option<String>,
}

/// A genre row. Upstream exposes more fields; only the name matters here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenreItem {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlbumItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub album_artist: Option<String>,
    #[serde(default)]
    pub album_artists: Vec<NamedRef>,
    #[serde(default)]
    pub production_year: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSource {
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SongItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub album_id: Option<String>,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub run_time_ticks: Option<i64>,
    #[serde(default)]
    pub index_number: Option<i64>,
    #[serde(default)]
    pub media_sources: Vec<MediaSource>,
}

impl SongItem {
    /// Run time in whole seconds. Upstream reports 100ns ticks.
    pub fn duration_secs(&self) -> i64 {
        self.run_time_ticks.unwrap_or(0) / 10_000_000
    }
}

/// HTTP client for the upstream media server.
///
/// Construct one per process and share it; the session cache is owned by the
/// instance, so tests can build isolated clients against stub upstreams.
pub struct JellyfinClient {
    http: Client,
    base: Url,
    device_id: String,
    sessions: RwLock<HashMap<(String, String), Session>>,
}

impl JellyfinClient {
    pub fn new(base: Url) -> Result<Self, UpstreamError> {
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(UpstreamError::InvalidUrl(base.to_string()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("{CLIENT_NAME}/{CLIENT_VERSION}"))
            .build()?;

        Ok(Self {
            http,
            base,
            device_id: uuid::Uuid::new_v4().simple().to_string(),
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Resolve a session for a credential pair, authenticating upstream on
    /// the first request and returning the cached session afterwards.
    ///
    /// Nothing is cached when the upstream rejects the credentials. A racing
    /// insert for the same pair is last-write-wins; either winning session is
    /// valid.
    pub async fn get_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Session, UpstreamError> {
        let key = (username.to_string(), password.to_string());
        if let Some(session) = self.sessions.read().await.get(&key) {
            return Ok(session.clone());
        }

        let session = self.authenticate(username, password).await?;
        self.sessions.write().await.insert(key, session.clone());
        Ok(session)
    }

    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Session, UpstreamError> {
        let url = self.endpoint(&["Users", "AuthenticateByName"])?;
        debug!(url = %url, username = %username, "authenticating against upstream");

        let response = self
            .http
            .post(url)
            .header("X-Emby-Authorization", self.authorization_header(None))
            .json(&serde_json::json!({ "Username": username, "Pw": password }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, username = %username, "upstream authentication failed");
            return Err(UpstreamError::InvalidCredentials);
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))?;

        Ok(Session {
            access_token: auth.access_token,
            user_id: auth.user.id,
        })
    }

    pub async fn get_album_artists(
        &self,
        session: &Session,
    ) -> Result<ItemsPage<ArtistItem>, UpstreamError> {
        let url = self.endpoint(&["Artists", "AlbumArtists"])?;
        self.fetch_json(
            url,
            session,
            &[
                ("Recursive", "true"),
                ("StartIndex", "0"),
                ("Limit", "10000"),
            ],
        )
        .await
    }

    pub async fn get_genres(
        &self,
        session: &Session,
    ) -> Result<ItemsPage<GenreItem>, UpstreamError> {
        let url = self.endpoint(&["Genres"])?;
        self.fetch_json(
            url,
            session,
            &[
                ("Recursive", "true"),
                ("StartIndex", "0"),
                ("Limit", "10000"),
            ],
        )
        .await
    }

    pub async fn get_artist(
        &self,
        session: &Session,
        artist_id: &str,
    ) -> Result<ArtistItem, UpstreamError> {
        let url = self.endpoint(&["Users", &session.user_id, "Items", artist_id])?;
        self.fetch_json(url, session, &[]).await
    }

    /// List albums, optionally scoped to one album artist.
    pub async fn get_albums(
        &self,
        session: &Session,
        artist_id: Option<&str>,
    ) -> Result<ItemsPage<AlbumItem>, UpstreamError> {
        let url = self.endpoint(&["Users", &session.user_id, "Items"])?;
        let mut params = vec![
            ("IncludeItemTypes", "MusicAlbum"),
            ("Limit", "1000"),
            ("Recursive", "true"),
            ("StartIndex", "0"),
        ];
        if let Some(id) = artist_id {
            params.push(("AlbumArtistIds", id));
        }
        self.fetch_json(url, session, &params).await
    }

    /// Fetch an album's child items with their media sources.
    pub async fn get_album(
        &self,
        session: &Session,
        album_id: &str,
    ) -> Result<ItemsPage<SongItem>, UpstreamError> {
        let url = self.endpoint(&["Users", &session.user_id, "Items"])?;
        self.fetch_json(
            url,
            session,
            &[("ParentId", album_id), ("Fields", "MediaSources")],
        )
        .await
    }

    pub async fn download_song(
        &self,
        session: &Session,
        song_id: &str,
    ) -> Result<Vec<u8>, UpstreamError> {
        let url = self.endpoint(&["Items", song_id, "Download"])?;
        let response = self
            .http
            .get(url)
            .query(&[("api_key", session.access_token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Fetch an album's primary cover image. A non-success upstream status
    /// maps to [`UpstreamError::CoverNotFound`] so the gateway can answer
    /// with a not-found response instead of a generic failure.
    pub async fn get_album_cover(&self, album_id: &str) -> Result<Vec<u8>, UpstreamError> {
        let url = self.endpoint(&["Items", album_id, "Images", "Primary", "0"])?;
        let response = self
            .http
            .get(url)
            .query(&[("quality", "90")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UpstreamError::CoverNotFound);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: Url,
        session: &Session,
        params: &[(&str, &str)],
    ) -> Result<T, UpstreamError> {
        debug!(url = %url, "fetching from upstream");
        let response = self
            .http
            .get(url)
            .header(
                "X-Emby-Authorization",
                self.authorization_header(Some(&session.access_token)),
            )
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::Malformed(e.to_string()))
    }

    /// Vendor auth header: `MediaBrowser key="value", key="value", ...`.
    fn authorization_header(&self, token: Option<&str>) -> String {
        let mut pairs = vec![
            format!(r#"Client="{CLIENT_NAME}""#),
            format!(r#"Device="{DEVICE_NAME}""#),
            format!(r#"DeviceId="{}""#, self.device_id),
            format!(r#"Version="{CLIENT_VERSION}""#),
        ];
        if let Some(token) = token {
            pairs.push(format!(r#"Token="{token}""#));
        }
        format!("MediaBrowser {}", pairs.join(", "))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| UpstreamError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }
}
