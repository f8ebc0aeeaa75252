use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use crate::artwork::{PosterCandidate, PosterProvider};
use crate::lookup::{fetch_json, Lookup};
use crate::models::MovieIds;
use crate::resolve::{parse_imdb_id, parse_tmdb_id};

const FANART_BASE: &str = "https://webservice.fanart.tv/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct FanartClient {
    client: Client,
    api_key: String,
    api_base: String,
}

impl FanartClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, FANART_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("fanplex/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build fanart.tv HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_posters(&self, id: &str) -> Lookup<Vec<PosterCandidate>> {
        let url = format!("{}/movies/{}", self.api_base, id);
        let request = self.client.get(&url).header("api-key", &self.api_key);
        fetch_json::<MovieImages>(request, "fanart.tv")
            .await
            .map(MovieImages::into_candidates)
    }
}

#[async_trait]
impl PosterProvider for FanartClient {
    fn name(&self) -> &'static str {
        "fanart.tv"
    }

    /// fanart.tv keys movies by either scheme; TMDB is tried first, IMDb second.
    async fn fetch_candidates(&self, ids: &MovieIds) -> Lookup<Vec<PosterCandidate>> {
        let tmdb = ids.tmdb.as_deref().and_then(parse_tmdb_id);
        let imdb = ids.imdb.as_deref().and_then(parse_imdb_id);

        if let Some(id) = tmdb {
            info!("Searching fanart.tv with TMDB ID: {}", id);
            match self.fetch_posters(&id).await {
                Lookup::Found(posters) if !posters.is_empty() => return Lookup::Found(posters),
                Lookup::TransportFailure(reason) => return Lookup::TransportFailure(reason),
                _ => {}
            }
        }
        if let Some(id) = imdb {
            info!("Searching fanart.tv with IMDb ID: {}", id);
            return self.fetch_posters(&id).await;
        }
        Lookup::NotFound
    }
}

#[derive(Debug, Deserialize)]
struct MovieImages {
    #[serde(default)]
    movieposter: Vec<Poster>,
}

#[derive(Debug, Deserialize)]
struct Poster {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    likes: Option<Value>,
}

impl MovieImages {
    fn into_candidates(self) -> Vec<PosterCandidate> {
        self.movieposter
            .into_iter()
            .map(|p| PosterCandidate {
                location: p.url.unwrap_or_default(),
                language: p.lang.filter(|l| !l.is_empty()),
                score: likes(p.likes.as_ref()),
                tie_break: None,
            })
            .collect()
    }
}

// fanart.tv sends likes as a string ("12"), but tolerate numbers too.
fn likes(raw: Option<&Value>) -> f64 {
    match raw {
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}
