//! End-to-end gateway tests: the real router in front of a stub upstream.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::json;
use tower::util::ServiceExt;
use url::Url;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jellysub::api::{AppState, create_router};
use jellysub::jellyfin::JellyfinClient;

const USER: &str = "alice";
const PASSWORD: &str = "secret";
const TOKEN: &str = "tok-1";

fn gateway(upstream: &MockServer) -> Router {
    let client = JellyfinClient::new(Url::parse(&upstream.uri()).unwrap()).unwrap();
    create_router(AppState::new(client))
}

/// Stub the upstream authentication endpoint: the well-known credentials
/// succeed, everything else is rejected.
async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/Users/AuthenticateByName"))
        .and(body_json(json!({ "Username": USER, "Pw": PASSWORD })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "User": { "Id": "user-1" },
            "AccessToken": TOKEN,
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/Users/AuthenticateByName"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

async fn send(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn send_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, uri).await;
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn creds(rest: &str) -> String {
    format!("u={USER}&p={PASSWORD}{rest}")
}

#[tokio::test]
async fn ping_returns_ok_envelope_in_xml_by_default() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let app = gateway(&server);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/rest/ping.view?{}", creds("")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/xml")
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(
        body.contains(r#"<subsonic-response status="ok" version="1.9.0"/>"#),
        "unexpected body: {body}"
    );
}

#[tokio::test]
async fn ping_speaks_json_when_asked() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let app = gateway(&server);

    let (status, json) = send_json(&app, &format!("/rest/ping.view?{}", creds("&f=json"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["subsonic-response"]["status"], "ok");
    assert_eq!(json["subsonic-response"]["version"], "1.9.0");
}

#[tokio::test]
async fn routes_work_without_the_view_suffix() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let app = gateway(&server);

    let (status, _) = send(&app, &format!("/rest/ping?{}", creds(""))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn missing_credentials_is_bad_request() {
    let server = MockServer::start().await;
    let app = gateway(&server);

    let (status, _) = send(&app, "/rest/ping.view").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, &format!("/rest/ping.view?u={USER}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "/rest/ping.view?p=secret").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_credentials_is_unauthorized() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let app = gateway(&server);

    let (status, _) = send(&app, "/rest/ping.view?u=mallory&p=guess").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unsupported_format_is_bad_request_regardless_of_credentials() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let app = gateway(&server);

    let (status, _) = send(&app, &format!("/rest/ping.view?{}", creds("&f=csv"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Format is negotiated before credentials are looked at.
    let (status, _) = send(&app, "/rest/ping.view?u=mallory&p=guess&f=csv").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeated_requests_authenticate_upstream_only_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Users/AuthenticateByName"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "User": { "Id": "user-1" },
            "AccessToken": TOKEN,
        })))
        .expect(1)
        .mount(&server)
        .await;
    let app = gateway(&server);

    for _ in 0..3 {
        let (status, _) = send(&app, &format!("/rest/ping.view?{}", creds(""))).await;
        assert_eq!(status, StatusCode::OK);
    }
    // MockServer::verify on drop asserts the auth call count.
}

#[tokio::test]
async fn enc_prefixed_password_is_hex_decoded_before_upstream_auth() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let app = gateway(&server);

    // "secret" as lowercase hex
    let (status, _) = send(&app, &format!("/rest/ping.view?u={USER}&p=enc:736563726574")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn form_body_parameters_authenticate_a_post_request() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let app = gateway(&server);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rest/ping.view")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("u={USER}&p={PASSWORD}&f=json")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_artists_buckets_and_sorts() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/Artists/AlbumArtists"))
        .and(query_param("Recursive", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [
                { "Id": "1", "Name": "bob" },
                { "Id": "2", "Name": "Alice" },
                { "Id": "3", "Name": "123" },
                { "Id": "4", "Name": "alice" },
            ]
        })))
        .mount(&server)
        .await;
    let app = gateway(&server);

    let (status, json) =
        send_json(&app, &format!("/rest/getArtists.view?{}", creds("&f=json"))).await;
    assert_eq!(status, StatusCode::OK);

    let artists = &json["subsonic-response"]["artists"];
    assert_eq!(artists["ignoredArticles"], "");
    let index = artists["index"].as_array().unwrap();
    let names: Vec<&str> = index
        .iter()
        .map(|bucket| bucket["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["#", "a", "b"]);

    let a_bucket = index[1]["artist"].as_array().unwrap();
    assert_eq!(a_bucket[0]["name"], "Alice");
    assert_eq!(a_bucket[1]["name"], "alice");
    assert_eq!(a_bucket[0]["albumCount"], 1);
}

#[tokio::test]
async fn get_genres_sorts_by_name_with_placeholder_counts() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/Genres"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [
                { "Id": "g2", "Name": "Rock" },
                { "Id": "g1", "Name": "Ambient" },
            ]
        })))
        .mount(&server)
        .await;
    let app = gateway(&server);

    let (status, json) =
        send_json(&app, &format!("/rest/getGenres.view?{}", creds("&f=json"))).await;
    assert_eq!(status, StatusCode::OK);

    let genres = json["subsonic-response"]["genres"]["genre"].as_array().unwrap();
    assert_eq!(genres[0]["value"], "Ambient");
    assert_eq!(genres[1]["value"], "Rock");
    assert_eq!(genres[0]["albumCount"], 1);
    assert_eq!(genres[0]["songCount"], 1);
}

#[tokio::test]
async fn get_artist_combines_detail_and_albums() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/Users/user-1/Items/artist-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "artist-9", "Name": "The Band",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Users/user-1/Items"))
        .and(query_param("AlbumArtistIds", "artist-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [
                { "Id": "al2", "Name": "Second", "AlbumArtist": "The Band",
                  "ProductionYear": 1995 },
                { "Id": "al1", "Name": "First", "AlbumArtist": "The Band",
                  "ProductionYear": 1990 },
            ]
        })))
        .mount(&server)
        .await;
    let app = gateway(&server);

    let (status, json) = send_json(
        &app,
        &format!("/rest/getArtist.view?{}", creds("&id=artist-9&f=json")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let artist = &json["subsonic-response"]["artist"];
    assert_eq!(artist["name"], "The Band");
    assert_eq!(artist["albumCount"], 2);
    let albums = artist["album"].as_array().unwrap();
    assert_eq!(albums[0]["name"], "First");
    assert_eq!(albums[1]["name"], "Second");
    assert_eq!(albums[0]["artistId"], "artist-9");
    assert_eq!(albums[0]["coverArt"], "al1");
    assert_eq!(albums[0]["year"], 1990);
    assert_eq!(albums[0]["duration"], 0);
    assert_eq!(albums[0]["songCount"], 0);
}

#[tokio::test]
async fn get_artist_without_id_is_bad_request() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let app = gateway(&server);

    let (status, _) = send(&app, &format!("/rest/getArtist.view?{}", creds(""))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_artist_info2_returns_biography() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/Users/user-1/Items/artist-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "artist-9", "Name": "The Band", "Overview": "Formed in a garage.",
        })))
        .mount(&server)
        .await;
    let app = gateway(&server);

    let (status, json) = send_json(
        &app,
        &format!("/rest/getArtistInfo2.view?{}", creds("&id=artist-9&f=json")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["subsonic-response"]["artistInfo2"]["biography"],
        "Formed in a garage."
    );
}

#[tokio::test]
async fn get_album_reshapes_songs() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/Users/user-1/Items"))
        .and(query_param("ParentId", "al1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [
                { "Id": "s2", "Name": "Closer", "Album": "First", "AlbumId": "al1",
                  "Artists": ["A", "B"], "RunTimeTicks": 1_200_000_000i64,
                  "IndexNumber": 2,
                  "MediaSources": [{ "Path": "/music/closer.ogg" }] },
                { "Id": "s1", "Name": "Opener", "Album": "First", "AlbumId": "al1",
                  "Artists": ["A"], "RunTimeTicks": 2_400_000_000i64,
                  "IndexNumber": 1,
                  "MediaSources": [{ "Path": "/music/opener" }] },
            ]
        })))
        .mount(&server)
        .await;
    let app = gateway(&server);

    let (status, json) = send_json(
        &app,
        &format!("/rest/getAlbum.view?{}", creds("&id=al1&f=json")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let album = &json["subsonic-response"]["album"];
    assert_eq!(album["id"], "al1");
    assert_eq!(album["songCount"], 2);
    let songs = album["song"].as_array().unwrap();
    assert_eq!(songs[0]["title"], "Opener");
    assert_eq!(songs[0]["artist"], "A");
    assert_eq!(songs[0]["duration"], 240);
    assert_eq!(songs[0]["suffix"], "");
    assert_eq!(songs[1]["title"], "Closer");
    assert_eq!(songs[1]["artist"], "A & B");
    assert_eq!(songs[1]["duration"], 120);
    assert_eq!(songs[1]["suffix"], "ogg");
    assert_eq!(songs[1]["coverArt"], "al1");
}

fn album_fixture(count: usize) -> serde_json::Value {
    let items: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            json!({
                "Id": format!("al{i}"),
                "Name": format!("Album {i:02}"),
                "AlbumArtists": [{ "Id": "ar1", "Name": "The Band" }],
            })
        })
        .collect();
    json!({ "Items": items })
}

async fn mount_album_listing(server: &MockServer, count: usize) {
    Mock::given(method("GET"))
        .and(path("/Users/user-1/Items"))
        .and(query_param("IncludeItemTypes", "MusicAlbum"))
        .respond_with(ResponseTemplate::new(200).set_body_json(album_fixture(count)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn album_list_paginates_with_scan_and_skip() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_album_listing(&server, 25).await;
    let app = gateway(&server);

    let (status, json) = send_json(
        &app,
        &format!(
            "/rest/getAlbumList.view?{}",
            creds("&offset=10&size=5&f=json")
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let albums = json["subsonic-response"]["albumList"]["album"]
        .as_array()
        .unwrap();
    let ids: Vec<&str> = albums.iter().map(|a| a["id"].as_str().unwrap()).collect();
    assert_eq!(ids, ["al10", "al11", "al12", "al13", "al14"]);
    assert_eq!(albums[0]["artist"], "The Band");
    assert_eq!(albums[0]["isDir"], true);
    assert_eq!(albums[0]["parent"], 1);
}

#[tokio::test]
async fn album_list_truncates_at_the_tail() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_album_listing(&server, 25).await;
    let app = gateway(&server);

    let (_, json) = send_json(
        &app,
        &format!(
            "/rest/getAlbumList.view?{}",
            creds("&offset=20&size=10&f=json")
        ),
    )
    .await;
    let albums = json["subsonic-response"]["albumList"]["album"]
        .as_array()
        .unwrap();
    assert_eq!(albums.len(), 5);

    let (status, json) = send_json(
        &app,
        &format!(
            "/rest/getAlbumList.view?{}",
            creds("&offset=100&size=10&f=json")
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let albums = json["subsonic-response"]["albumList"]["album"]
        .as_array()
        .unwrap();
    assert!(albums.is_empty());
}

#[tokio::test]
async fn album_list2_computes_counts_from_album_detail() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_album_listing(&server, 2).await;
    Mock::given(method("GET"))
        .and(path("/Users/user-1/Items"))
        .and(query_param("ParentId", "al0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [
                { "Id": "s1", "Name": "One", "RunTimeTicks": 600_000_000i64 },
                { "Id": "s2", "Name": "Two", "RunTimeTicks": 900_000_000i64 },
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Users/user-1/Items"))
        .and(query_param("ParentId", "al1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Items": [] })))
        .mount(&server)
        .await;
    let app = gateway(&server);

    let (status, json) = send_json(
        &app,
        &format!("/rest/getAlbumList2.view?{}", creds("&f=json")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let albums = json["subsonic-response"]["albumList2"]["album"]
        .as_array()
        .unwrap();
    assert_eq!(albums.len(), 2);
    assert_eq!(albums[0]["songCount"], 2);
    assert_eq!(albums[0]["duration"], 150);
    assert_eq!(albums[0]["artistId"], "ar1");
    assert_eq!(albums[1]["songCount"], 0);
    assert_eq!(albums[1]["duration"], 0);
}

#[tokio::test]
async fn cover_art_passes_bytes_through_without_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Items/al1/Images/Primary/0"))
        .and(query_param("quality", "90"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xd8, 0xff, 0xe0]))
        .mount(&server)
        .await;
    let app = gateway(&server);

    let (status, body) = send(&app, "/rest/getCoverArt.view?id=al1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, vec![0xff, 0xd8, 0xff, 0xe0]);
}

#[tokio::test]
async fn cover_art_for_unknown_id_is_not_found() {
    let server = MockServer::start().await;
    // No cover mock mounted: the stub upstream answers 404.
    let app = gateway(&server);

    let (status, _) = send(&app, "/rest/getCoverArt.view?id=nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stream_requires_auth_and_passes_bytes_through() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/Items/s1/Download"))
        .and(query_param("api_key", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio-bytes".to_vec()))
        .mount(&server)
        .await;
    let app = gateway(&server);

    let (status, _) = send(&app, "/rest/stream.view?id=s1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, &format!("/rest/stream.view?{}", creds("&id=s1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"audio-bytes");
}

#[tokio::test]
async fn upstream_failure_on_data_path_is_a_server_error() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/Genres"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = gateway(&server);

    let (status, _) = send(&app, &format!("/rest/getGenres.view?{}", creds(""))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
