use anyhow::{anyhow, bail, Result};
use chrono::NaiveTime;
use std::env;
use std::time::Duration;
use tracing::info;

use crate::schedule::parse_run_time;

const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_FALLBACK_LANGUAGE: &str = "en";
const DEFAULT_COMPLETION_LABEL: &str = "FanPlex";
const DEFAULT_LEGACY_LABEL: &str = "Overlay";
const DEFAULT_RUN_TIME: &str = "09:00";
const DEFAULT_ENTRY_DELAY_SECS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtProvider {
    Fanart,
    Tmdb,
}

impl ArtProvider {
    pub fn name(&self) -> &'static str {
        match self {
            ArtProvider::Fanart => "fanart.tv",
            ArtProvider::Tmdb => "TMDB",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Daily { at: NaiveTime, run_on_startup: bool },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub plex_url: String,
    pub plex_token: String,
    pub tmdb_api_key: Option<String>,
    pub fanart_api_key: Option<String>,
    pub provider: ArtProvider,
    pub default_language: String,
    /// Poster language tried when the preferred one has no candidates.
    pub fallback_language: String,
    pub original_language_countries: Vec<String>,
    pub ignore_legacy_tagged: bool,
    pub completion_label: String,
    pub legacy_label: String,
    pub artwork_enabled: bool,
    pub entry_delay: Duration,
    pub run_mode: RunMode,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |key: &str, default: bool| non_empty(key).map(|v| parse_bool(&v)).unwrap_or(default);

        let plex_url = non_empty("PLEX_URL")
            .ok_or_else(|| anyhow!("PLEX_URL and PLEX_TOKEN environment variables are required"))?;
        let plex_token = non_empty("PLEX_TOKEN")
            .ok_or_else(|| anyhow!("PLEX_URL and PLEX_TOKEN environment variables are required"))?;

        let provider = if flag("PREFER_TMDB", false) {
            ArtProvider::Tmdb
        } else {
            ArtProvider::Fanart
        };

        let entry_delay = match non_empty("ENTRY_DELAY_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .map_err(|_| anyhow!("ENTRY_DELAY_SECS must be a whole number of seconds, got '{}'", v))?,
            ),
            None => Duration::from_secs(DEFAULT_ENTRY_DELAY_SECS),
        };

        let run_mode = match non_empty("RUN_MODE")
            .unwrap_or_else(|| "RUN".to_string())
            .to_uppercase()
            .as_str()
        {
            "RUN" => RunMode::Once,
            "TIME" => {
                let raw = non_empty("RUN_TIME").unwrap_or_else(|| DEFAULT_RUN_TIME.to_string());
                RunMode::Daily {
                    at: parse_run_time(&raw)?,
                    run_on_startup: flag("RUN_ON_STARTUP", false),
                }
            }
            other => bail!("Invalid RUN_MODE '{}'. Use 'RUN' or 'TIME'", other),
        };

        Ok(Self {
            plex_url: plex_url.trim_end_matches('/').to_string(),
            plex_token,
            tmdb_api_key: non_empty("TMDB_API_KEY"),
            fanart_api_key: non_empty("FANART_API_KEY"),
            provider,
            default_language: non_empty("MOVIE_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            fallback_language: non_empty("FALLBACK_LANGUAGE")
                .unwrap_or_else(|| DEFAULT_FALLBACK_LANGUAGE.to_string()),
            original_language_countries: parse_countries(get("ORIGINAL_LANGUAGE_COUNTRIES").as_deref().unwrap_or("")),
            ignore_legacy_tagged: flag("IGNORE_OVERLAY_TAGGED", false),
            completion_label: non_empty("COMPLETION_LABEL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_LABEL.to_string()),
            legacy_label: non_empty("LEGACY_LABEL").unwrap_or_else(|| DEFAULT_LEGACY_LABEL.to_string()),
            artwork_enabled: flag("ARTWORK_ENABLED", true),
            entry_delay,
            run_mode,
        })
    }

    /// Labels an entry must lack to be picked up by a scan.
    pub fn excluded_labels(&self) -> Vec<String> {
        let mut labels = vec![self.completion_label.clone()];
        if self.ignore_legacy_tagged {
            labels.push(self.legacy_label.clone());
        }
        labels
    }

    pub fn log_summary(&self) {
        let key_state = |k: &Option<String>| if k.is_some() { "set" } else { "missing" };
        if self.artwork_enabled {
            info!("Artwork processing: ENABLED (using {})", self.provider.name());
        } else {
            info!("Artwork processing: DISABLED (labels only)");
        }
        match self.provider {
            ArtProvider::Tmdb => info!("TMDB API key: {}", key_state(&self.tmdb_api_key)),
            ArtProvider::Fanart => {
                info!("Fanart.tv API key: {}", key_state(&self.fanart_api_key));
                info!(
                    "TMDB API key: {}",
                    if self.tmdb_api_key.is_some() {
                        "set"
                    } else {
                        "missing (needed for country detection)"
                    }
                );
            }
        }
        if self.original_language_countries.is_empty() {
            info!(
                "Original language countries: not configured (all movies use '{}')",
                self.default_language
            );
        } else {
            info!(
                "Original language countries: {}",
                self.original_language_countries.join(",")
            );
        }
        if self.ignore_legacy_tagged {
            info!(
                "Skipping movies labelled '{}' or '{}'",
                self.completion_label, self.legacy_label
            );
        } else {
            info!("Skipping movies labelled '{}'", self.completion_label);
        }
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

fn parse_countries(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}
