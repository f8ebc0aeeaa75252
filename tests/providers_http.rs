use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use fanplex::artwork::{PosterOutcome, PosterProvider, PosterSelector};
use fanplex::fanart::FanartClient;
use fanplex::lookup::{is_transport, Lookup};
use fanplex::models::{Library, MovieIds, MovieRef};
use fanplex::plex::{MediaServer, PlexClient};
use fanplex::tmdb::{MetadataApi, TmdbClient};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing is listening on.
async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

fn ids(tmdb: Option<&str>, imdb: Option<&str>) -> MovieIds {
    MovieIds {
        tmdb: tmdb.map(str::to_string),
        imdb: imdb.map(str::to_string),
    }
}

async fn tmdb_images(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "278" => Json(json!({
            "id": 278,
            "posters": [
                {"file_path": "/en_low.jpg", "iso_639_1": "en", "vote_average": 5.2, "vote_count": 4},
                {"file_path": "/en_high.jpg", "iso_639_1": "en", "vote_average": 5.8, "vote_count": 9},
                {"file_path": "/textless.jpg", "iso_639_1": null, "vote_average": 9.9, "vote_count": 40}
            ]
        }))
        .into_response(),
        "401" => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status_message": "Invalid API key"})),
        )
            .into_response(),
        "500" => (StatusCode::OK, "<html>not json</html>").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn tmdb_details(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "440298" => Json(json!({
            "id": 440298,
            "original_language": "pl",
            "production_countries": [
                {"iso_3166_1": "PL", "name": "Poland"},
                {"iso_3166_1": "GB", "name": "United Kingdom"}
            ]
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn tmdb_find(Path(imdb): Path<String>) -> Json<serde_json::Value> {
    match imdb.as_str() {
        "tt6543652" => Json(json!({"movie_results": [{"id": 440298}], "tv_results": []})),
        _ => Json(json!({"movie_results": [], "tv_results": []})),
    }
}

async fn tmdb_server() -> String {
    let app = Router::new()
        .route("/3/movie/:id/images", get(tmdb_images))
        .route("/3/movie/:id", get(tmdb_details))
        .route("/3/find/:imdb", get(tmdb_find));
    format!("http://{}/3", serve(app).await)
}

#[tokio::test]
async fn tmdb_posters_are_ranked_by_votes_within_language() {
    let base = tmdb_server().await;
    let client = TmdbClient::with_endpoints("key", &base, "https://img.test/w780").unwrap();
    let provider: Arc<dyn PosterProvider> = Arc::new(client);
    let selector = PosterSelector::new(Some(provider), "en");

    let outcome = selector.select(&ids(Some("278"), None), "en").await;
    assert_eq!(
        outcome,
        PosterOutcome::Selected("https://img.test/w780/en_high.jpg".to_string())
    );
}

#[tokio::test]
async fn tmdb_error_statuses_are_not_found() {
    let base = tmdb_server().await;
    let client = TmdbClient::with_endpoints("key", &base, "https://img.test/w780").unwrap();

    for id in ["404", "401", "500"] {
        let result = client.fetch_candidates(&ids(Some(id), None)).await;
        assert_eq!(result, Lookup::NotFound, "id {}", id);
    }
}

#[tokio::test]
async fn tmdb_find_and_details() {
    let base = tmdb_server().await;
    let client = TmdbClient::with_endpoints("key", &base, "https://img.test/w780").unwrap();

    assert_eq!(
        client.find_by_imdb("tt6543652").await,
        Lookup::Found("440298".to_string())
    );
    assert_eq!(client.find_by_imdb("tt0000001").await, Lookup::NotFound);

    let context = client.movie_context("440298").await.found().unwrap();
    assert_eq!(context.original_language, "pl");
    assert_eq!(context.production_countries, vec!["PL", "GB"]);
    assert_eq!(client.movie_context("1").await, Lookup::NotFound);
}

#[tokio::test]
async fn unreachable_provider_is_a_transport_failure() {
    let base = format!("http://{}/3", closed_addr().await);
    let client = TmdbClient::with_endpoints("key", &base, "https://img.test/w780").unwrap();

    assert!(client
        .fetch_candidates(&ids(Some("278"), None))
        .await
        .is_transport_failure());
    assert!(client.find_by_imdb("tt6543652").await.is_transport_failure());
}

#[tokio::test]
async fn transport_failure_reason_does_not_leak_api_key() {
    let base = format!("http://{}/3", closed_addr().await);
    let client = TmdbClient::with_endpoints("secret-key-123", &base, "https://img.test/w780").unwrap();

    match client.movie_context("440298").await {
        Lookup::TransportFailure(reason) => assert!(!reason.contains("secret-key-123"), "{}", reason),
        other => panic!("expected transport failure, got {:?}", other),
    }
    match client.fetch_candidates(&ids(Some("278"), None)).await {
        Lookup::TransportFailure(reason) => assert!(!reason.contains("secret-key-123"), "{}", reason),
        other => panic!("expected transport failure, got {:?}", other),
    }
}

async fn fanart_movie(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "tt6543652" => Json(json!({
            "name": "Cold War",
            "movieposter": [
                {"id": "1", "url": "https://assets.test/en.jpg", "lang": "en", "likes": "2"},
                {"id": "2", "url": "https://assets.test/pl.jpg", "lang": "pl", "likes": "5"}
            ]
        }))
        .into_response(),
        "401" => StatusCode::UNAUTHORIZED.into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"status": "error"}))).into_response(),
    }
}

#[tokio::test]
async fn fanart_falls_back_to_imdb_when_tmdb_misses() {
    let app = Router::new().route("/v3/movies/:id", get(fanart_movie));
    let base = format!("http://{}/v3", serve(app).await);
    let provider: Arc<dyn PosterProvider> = Arc::new(FanartClient::with_base_url("key", &base).unwrap());
    let selector = PosterSelector::new(Some(provider), "en");

    let outcome = selector
        .select(&ids(Some("440298"), Some("tt6543652")), "pl")
        .await;
    assert_eq!(
        outcome,
        PosterOutcome::Selected("https://assets.test/pl.jpg".to_string())
    );
}

#[tokio::test]
async fn fanart_unauthorised_and_missing_are_not_found() {
    let app = Router::new().route("/v3/movies/:id", get(fanart_movie));
    let base = format!("http://{}/v3", serve(app).await);
    let client = FanartClient::with_base_url("key", &base).unwrap();

    assert_eq!(client.fetch_candidates(&ids(Some("401"), None)).await, Lookup::NotFound);
    assert_eq!(client.fetch_candidates(&ids(Some("9"), None)).await, Lookup::NotFound);
    assert_eq!(client.fetch_candidates(&ids(None, None)).await, Lookup::NotFound);
}

#[derive(Clone, Default)]
struct PlexLog {
    listing_queries: Arc<Mutex<Vec<String>>>,
    writes: Arc<Mutex<Vec<String>>>,
}

async fn plex_sections() -> Json<serde_json::Value> {
    Json(json!({"MediaContainer": {"Directory": [
        {"key": "1", "title": "Movies", "type": "movie"},
        {"key": "2", "title": "Shows", "type": "show"}
    ]}}))
}

async fn plex_labels() -> Json<serde_json::Value> {
    Json(json!({"MediaContainer": {"Directory": [
        {"key": "31", "title": "FanPlex"},
        {"key": "32", "title": "4K"}
    ]}}))
}

async fn plex_listing(State(log): State<PlexLog>, RawQuery(query): RawQuery) -> Json<serde_json::Value> {
    log.listing_queries
        .lock()
        .unwrap()
        .push(query.unwrap_or_default());
    Json(json!({"MediaContainer": {"Metadata": [{
        "ratingKey": "7",
        "title": "Cold War",
        "year": 2018,
        "addedAt": 1700000000,
        "Label": [{"tag": "4K"}],
        "Guid": [{"id": "imdb://tt6543652"}, {"id": "tmdb://440298"}]
    }]}}))
}

async fn plex_write(State(log): State<PlexLog>, RawQuery(query): RawQuery) -> StatusCode {
    log.writes.lock().unwrap().push(query.unwrap_or_default());
    StatusCode::OK
}

#[tokio::test]
async fn plex_client_lists_filters_and_writes() {
    let log = PlexLog::default();
    let app = Router::new()
        .route("/library/sections", get(plex_sections))
        .route("/library/sections/:key/label", get(plex_labels))
        .route("/library/sections/:key/all", get(plex_listing).put(plex_write))
        .route("/library/metadata/:key/posters", post(plex_write))
        .with_state(log.clone());
    let plex = PlexClient::new(format!("http://{}", serve(app).await), "token").unwrap();

    let libraries = plex.movie_libraries().await.unwrap();
    assert_eq!(libraries.len(), 1);
    assert_eq!(libraries[0].title, "Movies");

    let excluded = vec!["FanPlex".to_string(), "Overlay".to_string()];
    let movies = plex.movies_without_labels(&libraries[0], &excluded).await.unwrap();
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].ids.tmdb.as_deref(), Some("440298"));
    assert_eq!(movies[0].ids.imdb.as_deref(), Some("tt6543652"));
    assert_eq!(movies[0].labels, vec!["4K"]);
    assert!(log.listing_queries.lock().unwrap()[0].ends_with("label!=31"));

    plex.add_label(&movies[0], "FanPlex").await.unwrap();
    plex.upload_poster(&movies[0], "https://img.test/a b.jpg").await.unwrap();
    let writes = log.writes.lock().unwrap().clone();
    assert_eq!(
        writes[0],
        "type=1&id=7&label[0].tag.tag=4K&label[1].tag.tag=FanPlex&label.locked=1"
    );
    assert!(writes[1].contains("url=https%3A%2F%2Fimg.test%2Fa%20b.jpg"));
}

#[tokio::test]
async fn adding_a_label_keeps_existing_labels() {
    let log = PlexLog::default();
    let app = Router::new()
        .route("/library/sections/:key/all", put(plex_write))
        .with_state(log.clone());
    let plex = PlexClient::new(format!("http://{}", serve(app).await), "token").unwrap();
    let movie = MovieRef {
        rating_key: "7".to_string(),
        section_key: "1".to_string(),
        title: "Cold War".to_string(),
        year: Some(2018),
        added_at: None,
        labels: vec!["4K".to_string(), "Kids".to_string()],
        ids: MovieIds::default(),
    };

    plex.add_label(&movie, "FanPlex").await.unwrap();
    let writes = log.writes.lock().unwrap().clone();
    assert_eq!(
        writes,
        vec![
            "type=1&id=7&label[0].tag.tag=4K&label[1].tag.tag=Kids&label[2].tag.tag=FanPlex&label.locked=1"
        ]
    );
}

#[tokio::test]
async fn unreachable_plex_reports_transport_errors() {
    let plex = PlexClient::new(format!("http://{}", closed_addr().await), "token").unwrap();
    let movie = MovieRef {
        rating_key: "7".to_string(),
        section_key: "1".to_string(),
        title: "Cold War".to_string(),
        year: Some(2018),
        added_at: None,
        labels: Vec::new(),
        ids: MovieIds::default(),
    };

    let err = plex.upload_poster(&movie, "https://img.test/a.jpg").await.unwrap_err();
    assert!(is_transport(&err));

    let library = Library {
        key: "1".to_string(),
        title: "Movies".to_string(),
    };
    let err = plex.all_movies(&library).await.unwrap_err();
    assert!(is_transport(&err));
}

#[tokio::test]
async fn plex_rejections_are_not_transport_errors() {
    let app = Router::new().route(
        "/library/metadata/:key/posters",
        post(|| async { StatusCode::BAD_REQUEST }),
    );
    let plex = PlexClient::new(format!("http://{}", serve(app).await), "token").unwrap();
    let movie = MovieRef {
        rating_key: "7".to_string(),
        section_key: "1".to_string(),
        title: "Cold War".to_string(),
        year: None,
        added_at: None,
        labels: Vec::new(),
        ids: MovieIds::default(),
    };

    let err = plex.upload_poster(&movie, "https://img.test/a.jpg").await.unwrap_err();
    assert!(!is_transport(&err));
}
