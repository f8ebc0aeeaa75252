use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::artwork::{PosterOutcome, PosterSelector};
use crate::locale::LocalePolicy;
use crate::lookup::{is_transport, Lookup};
use crate::models::{MovieRef, ProcessingOutcome};
use crate::plex::MediaServer;
use crate::resolve::IdentifierResolver;
use crate::tmdb::MetadataApi;

#[derive(Debug)]
pub enum EntryResult {
    Processed(ProcessingOutcome),
    /// Entry already carries the completion label; nothing was touched.
    AlreadyProcessed,
    /// A network-level failure; the whole run must stop.
    Halt(String),
}

/// Drives one movie through resolve, locale, poster and label steps.
#[derive(Clone)]
pub struct EntryProcessor {
    pub media: Arc<dyn MediaServer>,
    pub resolver: IdentifierResolver,
    pub metadata: Option<Arc<dyn MetadataApi>>,
    pub locale: LocalePolicy,
    pub selector: PosterSelector,
    pub completion_label: String,
    pub legacy_label: String,
    pub artwork_enabled: bool,
}

impl EntryProcessor {
    pub async fn process(&self, library: &str, movie: &MovieRef) -> EntryResult {
        if movie.has_label(&self.completion_label) {
            info!(
                "'{}' already labelled '{}', skipping",
                movie.title, self.completion_label
            );
            return EntryResult::AlreadyProcessed;
        }

        let mut success = true;
        let mut poster_set = false;

        if self.artwork_enabled {
            info!("Processing artwork for '{}'", movie.title);
            match self.find_poster(movie).await {
                PosterOutcome::Selected(url) => {
                    let source = self.selector.provider_name().unwrap_or("provider");
                    info!("Setting poster from {}", source);
                    match self.media.upload_poster(movie, &url).await {
                        Ok(()) => {
                            info!("Poster set successfully");
                            poster_set = true;
                        }
                        Err(e) if is_transport(&e) => return EntryResult::Halt(format!("{:#}", e)),
                        Err(e) => {
                            error!("{:#}", e);
                            success = false;
                        }
                    }
                }
                PosterOutcome::NoneFound => {
                    warn!(
                        "No {} poster available for '{}'",
                        self.selector.provider_name().unwrap_or("artwork"),
                        movie.title
                    );
                }
                PosterOutcome::TransportFailure(reason) => return EntryResult::Halt(reason),
            }
        }

        match self.apply_labels(movie).await {
            Ok(()) => {}
            Err(e) if is_transport(&e) => return EntryResult::Halt(format!("{:#}", e)),
            Err(e) => {
                error!("Failed to update labels: {:#}", e);
                success = false;
            }
        }

        if success {
            info!("PROCESSED '{}'", movie.title);
        } else {
            warn!("FAILED '{}'", movie.title);
        }

        EntryResult::Processed(ProcessingOutcome {
            title: movie.title.clone(),
            year: movie.year,
            library: library.to_string(),
            labels: movie.labels.clone(),
            added_at: movie.added_at,
            processed_at: Utc::now(),
            success,
            poster_set,
        })
    }

    async fn find_poster(&self, movie: &MovieRef) -> PosterOutcome {
        let mut ids = movie.ids.clone();
        match self.resolver.tmdb_id(&ids).await {
            Lookup::Found(id) => ids.tmdb = Some(id),
            Lookup::NotFound => {}
            Lookup::TransportFailure(reason) => return PosterOutcome::TransportFailure(reason),
        }

        let context = match (self.metadata.as_ref(), ids.tmdb.as_deref()) {
            (Some(metadata), Some(tmdb_id)) => match metadata.movie_context(tmdb_id).await {
                Lookup::Found(ctx) => Some(ctx),
                Lookup::NotFound => None,
                Lookup::TransportFailure(reason) => return PosterOutcome::TransportFailure(reason),
            },
            _ => None,
        };

        let language = self.locale.preferred_language(context.as_ref());
        self.selector.select(&ids, &language).await
    }

    async fn apply_labels(&self, movie: &MovieRef) -> Result<()> {
        self.media.add_label(movie, &self.completion_label).await?;
        info!("Added '{}' label", self.completion_label);

        if movie.has_label(&self.legacy_label) {
            self.media.remove_label(movie, &self.legacy_label).await?;
            info!("Removed '{}' label", self.legacy_label);
        }
        Ok(())
    }
}
