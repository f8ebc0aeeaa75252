use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::artwork::{PosterCandidate, PosterProvider};
use crate::lookup::{fetch_json, Lookup};
use crate::models::{MovieContext, MovieIds};
use crate::resolve::parse_tmdb_id;

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w780";
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const IMAGES_TIMEOUT: Duration = Duration::from_secs(15);

/// Identifier mapping and origin facts for a title.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    async fn find_by_imdb(&self, imdb_id: &str) -> Lookup<String>;
    async fn movie_context(&self, tmdb_id: &str) -> Lookup<MovieContext>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    api_base: String,
    poster_base: String,
}

impl TmdbClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoints(api_key, TMDB_BASE, POSTER_BASE)
    }

    pub fn with_endpoints(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        poster_base: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(format!("fanplex/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            poster_base: poster_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MetadataApi for TmdbClient {
    async fn find_by_imdb(&self, imdb_id: &str) -> Lookup<String> {
        #[derive(Deserialize)]
        struct FindResponse {
            #[serde(default)]
            movie_results: Vec<FindResult>,
        }
        #[derive(Deserialize)]
        struct FindResult {
            id: i64,
        }

        let url = format!(
            "{}/find/{imdb_id}?external_source=imdb_id&api_key={}",
            self.api_base, self.api_key
        );
        let request = self.client.get(&url).timeout(METADATA_TIMEOUT);
        let first = fetch_json::<FindResponse>(request, "TMDB")
            .await
            .map(|data| data.movie_results.into_iter().next());
        match first {
            Lookup::Found(Some(hit)) => Lookup::Found(hit.id.to_string()),
            Lookup::Found(None) | Lookup::NotFound => Lookup::NotFound,
            Lookup::TransportFailure(reason) => Lookup::TransportFailure(reason),
        }
    }

    async fn movie_context(&self, tmdb_id: &str) -> Lookup<MovieContext> {
        let url = format!("{}/movie/{tmdb_id}?api_key={}", self.api_base, self.api_key);
        let request = self.client.get(&url).timeout(METADATA_TIMEOUT);
        fetch_json::<MovieDetail>(request, "TMDB")
            .await
            .map(|detail| detail.into_context(tmdb_id))
    }
}

#[async_trait]
impl PosterProvider for TmdbClient {
    fn name(&self) -> &'static str {
        "TMDB"
    }

    async fn fetch_candidates(&self, ids: &MovieIds) -> Lookup<Vec<PosterCandidate>> {
        let Some(id) = ids.tmdb.as_deref().and_then(parse_tmdb_id) else {
            info!("No TMDB ID available");
            return Lookup::NotFound;
        };
        info!("Searching TMDB for posters with ID: {}", id);
        let url = format!("{}/movie/{id}/images?api_key={}", self.api_base, self.api_key);
        let request = self.client.get(&url).timeout(IMAGES_TIMEOUT);
        fetch_json::<ImageResponse>(request, "TMDB")
            .await
            .map(ImageResponse::into_candidates)
    }

    fn resolve_url(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            return location.to_string();
        }
        format!("{}{}", self.poster_base, location)
    }
}

#[derive(Debug, Deserialize)]
struct ProductionCountry {
    iso_3166_1: String,
}

#[derive(Debug, Deserialize)]
struct MovieDetail {
    #[serde(default)]
    original_language: String,
    #[serde(default)]
    production_countries: Vec<ProductionCountry>,
}

impl MovieDetail {
    fn into_context(self, tmdb_id: &str) -> MovieContext {
        MovieContext {
            tmdb_id: tmdb_id.to_string(),
            original_language: self.original_language,
            production_countries: self
                .production_countries
                .into_iter()
                .map(|c| c.iso_3166_1)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    posters: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    #[serde(default)]
    file_path: Option<String>,
    iso_639_1: Option<String>,
    #[serde(default)]
    vote_average: f64,
    #[serde(default)]
    vote_count: u64,
}

impl ImageResponse {
    fn into_candidates(self) -> Vec<PosterCandidate> {
        self.posters
            .into_iter()
            .map(|p| PosterCandidate {
                location: p.file_path.unwrap_or_default(),
                language: p.iso_639_1,
                score: p.vote_average,
                tie_break: Some(p.vote_count as f64),
            })
            .collect()
    }
}
