use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::lookup::Lookup;
use crate::models::MovieIds;

/// One poster offered by an art provider, normalised across providers.
#[derive(Debug, Clone, PartialEq)]
pub struct PosterCandidate {
    /// Full URL or provider-relative path; empty means unusable.
    pub location: String,
    pub language: Option<String>,
    pub score: f64,
    pub tie_break: Option<f64>,
}

#[async_trait]
pub trait PosterProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_candidates(&self, ids: &MovieIds) -> Lookup<Vec<PosterCandidate>>;

    /// Turn a candidate location into an absolute URL.
    fn resolve_url(&self, location: &str) -> String {
        location.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PosterOutcome {
    Selected(String),
    NoneFound,
    TransportFailure(String),
}

/// Restrict to the preferred language, then the fallback language, then everything,
/// and order by score, then tie-break score, both descending.
pub fn rank_candidates<'a>(
    candidates: &'a [PosterCandidate],
    preferred: &str,
    fallback: &str,
) -> Vec<&'a PosterCandidate> {
    let in_language = move |lang: &str| -> Vec<&'a PosterCandidate> {
        candidates
            .iter()
            .filter(|c| c.language.as_deref() == Some(lang))
            .collect()
    };

    let mut pool = in_language(preferred);
    if pool.is_empty() && preferred != fallback {
        info!("No {} posters found, trying {}...", preferred, fallback);
        pool = in_language(fallback);
    }
    if pool.is_empty() {
        info!("No {} posters found, using all available posters...", fallback);
        pool = candidates.iter().collect();
    }

    // stable: equal scores keep provider order
    pool.sort_by(|a, b| {
        b.score.total_cmp(&a.score).then_with(|| {
            b.tie_break
                .unwrap_or(0.0)
                .total_cmp(&a.tie_break.unwrap_or(0.0))
        })
    });
    pool
}

/// Best-ranked candidate that has a usable location.
pub fn select_candidate<'a>(
    candidates: &'a [PosterCandidate],
    preferred: &str,
    fallback: &str,
) -> Option<&'a PosterCandidate> {
    rank_candidates(candidates, preferred, fallback)
        .into_iter()
        .find(|c| {
            let usable = !c.location.trim().is_empty();
            if !usable {
                warn!("Skipping poster candidate with no path");
            }
            usable
        })
}

#[derive(Clone)]
pub struct PosterSelector {
    provider: Option<Arc<dyn PosterProvider>>,
    fallback_language: String,
}

impl PosterSelector {
    pub fn new(provider: Option<Arc<dyn PosterProvider>>, fallback_language: impl Into<String>) -> Self {
        Self {
            provider,
            fallback_language: fallback_language.into(),
        }
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.name())
    }

    pub async fn select(&self, ids: &MovieIds, preferred_language: &str) -> PosterOutcome {
        let Some(provider) = self.provider.as_ref() else {
            warn!("No API key for the configured art provider - skipping lookup");
            return PosterOutcome::NoneFound;
        };

        let candidates = match provider.fetch_candidates(ids).await {
            Lookup::Found(c) => c,
            Lookup::NotFound => {
                info!("No {} poster found", provider.name());
                return PosterOutcome::NoneFound;
            }
            Lookup::TransportFailure(reason) => return PosterOutcome::TransportFailure(reason),
        };
        if candidates.is_empty() {
            info!("No movie posters available on {}", provider.name());
            return PosterOutcome::NoneFound;
        }

        match select_candidate(&candidates, preferred_language, &self.fallback_language) {
            Some(best) => {
                let url = provider.resolve_url(&best.location);
                info!(
                    "Selected {} poster: score {:.1}{}, language {}",
                    provider.name(),
                    best.score,
                    best.tie_break
                        .map(|t| format!(" ({} votes)", t))
                        .unwrap_or_default(),
                    best.language.as_deref().unwrap_or("Unknown")
                );
                debug!(provider = provider.name(), url = %url, "Poster resolved");
                PosterOutcome::Selected(url)
            }
            None => {
                warn!("No valid poster path found on {}", provider.name());
                PosterOutcome::NoneFound
            }
        }
    }
}
