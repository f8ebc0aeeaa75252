use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::models::{Library, MovieIds, MovieRef};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MOVIE_LISTING: &str = "type=1&sort=addedAt:desc&includeGuids=1";

/// The media-server operations a scan needs.
#[async_trait]
pub trait MediaServer: Send + Sync {
    async fn movie_libraries(&self) -> Result<Vec<Library>>;
    /// Server-side filtered listing of movies carrying none of `excluded`.
    async fn movies_without_labels(&self, library: &Library, excluded: &[String]) -> Result<Vec<MovieRef>>;
    async fn all_movies(&self, library: &Library) -> Result<Vec<MovieRef>>;
    /// Adds `label`, keeping every label the entry already carries.
    async fn add_label(&self, movie: &MovieRef, label: &str) -> Result<()>;
    async fn remove_label(&self, movie: &MovieRef, label: &str) -> Result<()>;
    async fn upload_poster(&self, movie: &MovieRef, url: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PlexClient {
    client: Client,
    base_url: String,
    token: String,
}

impl PlexClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(REQUEST_TIMEOUT)
            .user_agent(format!("fanplex/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build Plex HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Server name, doubling as the startup connectivity check.
    pub async fn friendly_name(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct Root {
            #[serde(rename = "friendlyName", default)]
            friendly_name: String,
        }
        let root: Container<Root> = self.get_json("/").await?;
        Ok(root.media_container.friendly_name)
    }

    async fn label_ids(&self, library: &Library, names: &[String]) -> Result<Vec<String>> {
        let labels: Container<Directories> = self
            .get_json(&format!("/library/sections/{}/label", library.key))
            .await?;
        Ok(labels
            .media_container
            .directory
            .into_iter()
            .filter(|d| names.iter().any(|n| n == &d.title))
            .map(|d| d.key)
            .collect())
    }

    async fn list_movies(&self, library: &Library, extra_query: &str) -> Result<Vec<MovieRef>> {
        let path = format!(
            "/library/sections/{}/all?{}{}",
            library.key, MOVIE_LISTING, extra_query
        );
        let listing: Container<MetadataList> = self.get_json(&path).await?;
        Ok(listing
            .media_container
            .metadata
            .into_iter()
            .map(|m| m.into_movie(&library.key))
            .collect())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let res = self
            .client
            .get(&url)
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Plex request {} failed", path))?;
        let status = res.status();
        let text = res.text().await.context("reading Plex body failed")?;
        if !status.is_success() {
            return Err(anyhow!("Plex {} -> {}: {}", path, status, text));
        }
        serde_json::from_str(&text).with_context(|| format!("Plex JSON parse failed for {}", path))
    }

    async fn send(&self, method: Method, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, path, "Plex write");
        let res = self
            .client
            .request(method, &url)
            .header("X-Plex-Token", &self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Plex request {} failed", path))?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow!("Plex {} -> {}: {}", path, status, text));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn movie_libraries(&self) -> Result<Vec<Library>> {
        let sections: Container<Directories> = self.get_json("/library/sections").await?;
        Ok(sections
            .media_container
            .directory
            .into_iter()
            .filter(|d| d.kind.as_deref() == Some("movie"))
            .map(|d| Library {
                key: d.key,
                title: d.title,
            })
            .collect())
    }

    async fn movies_without_labels(&self, library: &Library, excluded: &[String]) -> Result<Vec<MovieRef>> {
        // Names that don't exist in the section can't be on any entry.
        let ids = self.label_ids(library, excluded).await?;
        if ids.is_empty() {
            return self.list_movies(library, "").await;
        }
        let filter = format!("&label!={}", ids.join(","));
        self.list_movies(library, &filter).await
    }

    async fn all_movies(&self, library: &Library) -> Result<Vec<MovieRef>> {
        self.list_movies(library, "").await
    }

    async fn add_label(&self, movie: &MovieRef, label: &str) -> Result<()> {
        let path = format!(
            "/library/sections/{}/all?type=1&id={}&{}&label.locked=1",
            movie.section_key,
            movie.rating_key,
            label_list_query(&movie.labels, label)
        );
        self.send(Method::PUT, &path)
            .await
            .with_context(|| format!("Failed to add label '{}' to '{}'", label, movie.title))
    }

    async fn remove_label(&self, movie: &MovieRef, label: &str) -> Result<()> {
        let path = format!(
            "/library/sections/{}/all?type=1&id={}&label[].tag.tag-={}",
            movie.section_key,
            movie.rating_key,
            urlencoding::encode(label)
        );
        self.send(Method::PUT, &path)
            .await
            .with_context(|| format!("Failed to remove label '{}' from '{}'", label, movie.title))
    }

    async fn upload_poster(&self, movie: &MovieRef, url: &str) -> Result<()> {
        let path = format!(
            "/library/metadata/{}/posters?url={}",
            movie.rating_key,
            urlencoding::encode(url)
        );
        self.send(Method::POST, &path)
            .await
            .with_context(|| format!("Failed to set poster for '{}'", movie.title))
    }
}

/// Indexed `label[i].tag.tag` params for `existing` plus `added`.
/// Plex replaces the whole label list with what an indexed edit sends.
fn label_list_query(existing: &[String], added: &str) -> String {
    existing
        .iter()
        .map(String::as_str)
        .filter(|l| *l != added)
        .chain(std::iter::once(added))
        .enumerate()
        .map(|(i, l)| format!("label[{}].tag.tag={}", i, urlencoding::encode(l)))
        .collect::<Vec<_>>()
        .join("&")
}

#[derive(Debug, Deserialize)]
struct Container<T> {
    #[serde(rename = "MediaContainer")]
    media_container: T,
}

#[derive(Debug, Deserialize)]
struct Directories {
    #[serde(rename = "Directory", default)]
    directory: Vec<Directory>,
}

#[derive(Debug, Deserialize)]
struct Directory {
    key: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MetadataList {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    tag: String,
}

#[derive(Debug, Deserialize)]
struct Guid {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    #[serde(default)]
    title: String,
    year: Option<i32>,
    #[serde(rename = "addedAt")]
    added_at: Option<i64>,
    #[serde(rename = "Label", default)]
    labels: Vec<Tag>,
    #[serde(rename = "Guid", default)]
    guids: Vec<Guid>,
}

impl Metadata {
    fn into_movie(self, section_key: &str) -> MovieRef {
        MovieRef {
            ids: MovieIds::from_guids(self.guids.iter().map(|g| g.id.as_str())),
            rating_key: self.rating_key,
            section_key: section_key.to_string(),
            title: self.title,
            year: self.year,
            added_at: self.added_at.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            labels: self.labels.into_iter().map(|t| t.tag).collect(),
        }
    }
}
