//! Browsing handlers (getArtists, getGenres, getArtist, getArtistInfo2,
//! getAlbum, getAlbumList, getAlbumList2).
//!
//! Each handler is a pure reshaping of upstream records into the nested
//! shape the Subsonic schema expects. Several counts are placeholders the
//! upstream cannot cheaply provide; see the individual handlers.

use std::collections::BTreeMap;

use crate::api::auth::GatewayAuth;
use crate::api::error::ApiError;
use crate::api::response::GatewayResponse;
use crate::jellyfin::{AlbumItem, ArtistItem, SongItem};
use crate::value::{Object, Value};

/// Bucket artists alphabetically: lowercase first character when it is
/// a-z, the fallback symbol otherwise.
fn bucket_key(name: &str) -> String {
    match name.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some(c) if c.is_ascii_lowercase() => c.to_string(),
        _ => "#".to_string(),
    }
}

/// Group artists into index buckets sorted by bucket key, entries within a
/// bucket sorted by (name, id) for determinism.
fn artist_indexes(items: Vec<ArtistItem>) -> Vec<Value> {
    let mut buckets: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for item in items {
        buckets
            .entry(bucket_key(&item.name))
            .or_default()
            .push((item.name, item.id));
    }

    buckets
        .into_iter()
        .map(|(name, mut artists)| {
            artists.sort();
            let artists: Vec<Value> = artists
                .into_iter()
                .map(|(name, id)| {
                    // albumCount is a placeholder: upstream does not expose
                    // a cheap per-artist album count.
                    Object::new()
                        .with("albumCount", 1i64)
                        .with("id", id)
                        .with("name", name)
                        .into()
                })
                .collect();
            Object::new().with("name", name).with("artist", artists).into()
        })
        .collect()
}

fn path_suffix(path: &str) -> &str {
    path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

fn album_row(item: &AlbumItem, artist_id: &str) -> Value {
    Object::new()
        .with("artist", item.album_artist.clone())
        .with("artistId", artist_id)
        .with("coverArt", item.id.as_str())
        .with("id", item.id.as_str())
        .with("name", item.name.as_str())
        .with("duration", 0i64)
        .with("songCount", 0i64)
        .with("year", item.production_year)
        .into()
}

fn song_rows(mut items: Vec<SongItem>) -> Vec<Value> {
    items.sort_by(|a, b| {
        (a.index_number.unwrap_or(0), &a.name, &a.id)
            .cmp(&(b.index_number.unwrap_or(0), &b.name, &b.id))
    });
    items
        .into_iter()
        .map(|item| {
            let path = item
                .media_sources
                .first()
                .map(|source| source.path.clone())
                .unwrap_or_default();
            let suffix = path_suffix(&path).to_string();
            let duration = item.duration_secs();
            Object::new()
                .with("id", item.id)
                .with("artist", item.artists.join(" & "))
                .with("album", item.album)
                .with("title", item.name)
                .with("coverArt", item.album_id)
                .with("duration", duration)
                .with("track", item.index_number)
                .with("path", path)
                .with("suffix", suffix)
                .into()
        })
        .collect()
}

/// GET/POST /rest/getArtists[.view]
pub async fn get_artists(auth: GatewayAuth) -> Result<GatewayResponse, ApiError> {
    let page = auth.client.get_album_artists(&auth.session).await?;
    let indexes = artist_indexes(page.items);

    let body = Object::new().with(
        "artists",
        Object::new()
            .with("ignoredArticles", "")
            .with("index", indexes),
    );
    Ok(GatewayResponse::content(auth.format, body))
}

/// GET/POST /rest/getGenres[.view]
///
/// Album and song counts are placeholders; looking them up per genre would
/// need one upstream round-trip each.
pub async fn get_genres(auth: GatewayAuth) -> Result<GatewayResponse, ApiError> {
    let page = auth.client.get_genres(&auth.session).await?;

    let mut names: Vec<String> = page.items.into_iter().map(|g| g.name).collect();
    names.sort();
    let genres: Vec<Value> = names
        .into_iter()
        .map(|name| {
            Object::new()
                .with("value", name)
                .with("albumCount", 1i64)
                .with("songCount", 1i64)
                .into()
        })
        .collect();

    let body = Object::new().with("genres", Object::new().with("genre", genres));
    Ok(GatewayResponse::content(auth.format, body))
}

/// GET/POST /rest/getArtist[.view]
///
/// Artist detail and the artist's albums are independent upstream facts and
/// are fetched concurrently.
pub async fn get_artist(auth: GatewayAuth) -> Result<GatewayResponse, ApiError> {
    let artist_id = auth.context.require("id")?.to_string();

    let (artist, albums) = tokio::try_join!(
        auth.client.get_artist(&auth.session, &artist_id),
        auth.client.get_albums(&auth.session, Some(&artist_id)),
    )?;

    let mut items = albums.items;
    items.sort_by(|a, b| {
        (a.production_year.unwrap_or(0), &a.name, &a.id)
            .cmp(&(b.production_year.unwrap_or(0), &b.name, &b.id))
    });
    let rows: Vec<Value> = items
        .iter()
        .map(|item| album_row(item, &artist_id))
        .collect();

    let body = Object::new().with(
        "artist",
        Object::new()
            .with("albumCount", rows.len() as i64)
            .with("album", rows)
            .with("id", artist_id)
            .with("name", artist.name),
    );
    Ok(GatewayResponse::content(auth.format, body))
}

/// GET/POST /rest/getArtistInfo2[.view]
pub async fn get_artist_info2(auth: GatewayAuth) -> Result<GatewayResponse, ApiError> {
    let artist_id = auth.context.require("id")?;
    let artist = auth.client.get_artist(&auth.session, artist_id).await?;

    let body = Object::new().with(
        "artistInfo2",
        Object::new().with("biography", artist.overview.unwrap_or_default()),
    );
    Ok(GatewayResponse::content(auth.format, body))
}

/// GET/POST /rest/getAlbum[.view]
pub async fn get_album(auth: GatewayAuth) -> Result<GatewayResponse, ApiError> {
    let album_id = auth.context.require("id")?.to_string();
    let page = auth.client.get_album(&auth.session, &album_id).await?;
    let songs = song_rows(page.items);

    let body = Object::new().with(
        "album",
        Object::new()
            .with("songCount", songs.len() as i64)
            .with("song", songs)
            .with("id", album_id),
    );
    Ok(GatewayResponse::content(auth.format, body))
}

/// GET/POST /rest/getAlbumList[.view]
///
/// Pagination is a linear scan-and-skip over the full upstream result; the
/// upstream is always asked for everything. Tail reads past the end return
/// whatever remains.
pub async fn get_album_list(auth: GatewayAuth) -> Result<GatewayResponse, ApiError> {
    let offset = auth.context.usize_or("offset", 0);
    let size = auth.context.usize_or("size", 10);

    let page = auth.client.get_albums(&auth.session, None).await?;
    let albums: Vec<Value> = page
        .items
        .into_iter()
        .skip(offset)
        .take(size)
        .map(|item| {
            Object::new()
                .with("id", item.id.as_str())
                .with("parent", 1i64)
                .with("title", item.name.as_str())
                .with(
                    "artist",
                    item.album_artists.first().map(|a| a.name.clone()),
                )
                .with("isDir", true)
                .with("coverArt", item.id.as_str())
                .into()
        })
        .collect();

    let body = Object::new().with("albumList", Object::new().with("album", albums));
    Ok(GatewayResponse::content(auth.format, body))
}

/// GET/POST /rest/getAlbumList2[.view]
///
/// Same pagination as getAlbumList, plus one upstream detail fetch per page
/// album to compute the real songCount and duration.
pub async fn get_album_list2(auth: GatewayAuth) -> Result<GatewayResponse, ApiError> {
    let offset = auth.context.usize_or("offset", 0);
    let size = auth.context.usize_or("size", 10);

    let page = auth.client.get_albums(&auth.session, None).await?;

    let mut albums: Vec<Value> = Vec::new();
    for item in page.items.into_iter().skip(offset).take(size) {
        let detail = auth.client.get_album(&auth.session, &item.id).await?;
        let song_count = detail.items.len() as i64;
        let duration: i64 = detail.items.iter().map(SongItem::duration_secs).sum();

        albums.push(
            Object::new()
                .with("id", item.id.as_str())
                .with("name", item.name.as_str())
                .with("coverArt", item.id.as_str())
                .with("songCount", song_count)
                .with(
                    "artist",
                    item.album_artists.first().map(|a| a.name.clone()),
                )
                .with(
                    "artistId",
                    item.album_artists.first().map(|a| a.id.clone()),
                )
                .with("duration", duration)
                .into(),
        );
    }

    let body = Object::new().with("albumList2", Object::new().with("album", albums));
    Ok(GatewayResponse::content(auth.format, body))
}
