use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::lookup::is_transport;
use crate::models::{Library, MovieRef};
use crate::plex::MediaServer;
use crate::processor::{EntryProcessor, EntryResult};
use crate::report::RunReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPath {
    Server,
    Manual,
}

/// Client-side equivalent of the server-side label filter.
pub fn without_labels(movies: Vec<MovieRef>, excluded: &[String]) -> Vec<MovieRef> {
    movies.into_iter().filter(|m| m.lacks_all(excluded)).collect()
}

#[derive(Clone)]
pub struct CatalogScanner {
    pub media: Arc<dyn MediaServer>,
    pub excluded: Vec<String>,
    pub entry_delay: Duration,
}

impl CatalogScanner {
    /// Entries lacking every excluded label, via the server filter when it works.
    pub async fn pending_movies(&self, library: &Library) -> Result<(Vec<MovieRef>, FilterPath)> {
        let labels = self.excluded.join("' or '");
        match self.media.movies_without_labels(library, &self.excluded).await {
            Ok(movies) => {
                info!(
                    "Found {} movies without '{}' labels (direct filter)",
                    movies.len(),
                    labels
                );
                Ok((movies, FilterPath::Server))
            }
            Err(e) => {
                warn!("Direct filtering failed: {:#}", e);
                info!("Falling back to checking all movies...");
                let movies = without_labels(self.media.all_movies(library).await?, &self.excluded);
                info!(
                    "Found {} movies without '{}' labels (manual filter)",
                    movies.len(),
                    labels
                );
                Ok((movies, FilterPath::Manual))
            }
        }
    }

    /// Process every pending movie in every movie library, one at a time.
    pub async fn run(&self, processor: &EntryProcessor) -> Result<RunReport> {
        let libraries = self.media.movie_libraries().await?;
        let mut report = RunReport::default();
        if libraries.is_empty() {
            info!("No movie libraries found on this Plex server");
            return Ok(report);
        }

        for library in &libraries {
            info!("Scanning library: {}", library.title);
            let movies = match self.pending_movies(library).await {
                Ok((movies, _)) => movies,
                Err(e) if is_transport(&e) => {
                    error!("Lost connection while listing '{}': {:#}", library.title, e);
                    report.halted = Some(format!("{:#}", e));
                    return Ok(report);
                }
                Err(e) => {
                    error!("Could not list movies in '{}': {:#}", library.title, e);
                    continue;
                }
            };
            info!("{}", "-".repeat(50));

            for (i, movie) in movies.iter().enumerate() {
                info!("{:3}. {} ({})", i + 1, movie.title, movie.display_year());
                if movie.labels.is_empty() {
                    info!("     Labels: None");
                } else {
                    info!("     Labels: {}", movie.labels.join(", "));
                }

                match processor.process(&library.title, movie).await {
                    EntryResult::Processed(outcome) => report.outcomes.push(outcome),
                    EntryResult::AlreadyProcessed => continue,
                    EntryResult::Halt(reason) => {
                        error!("Stopping processing due to connection error: {}", reason);
                        info!(
                            "Processed {} movies before connection error",
                            report.outcomes.len()
                        );
                        report.halted = Some(reason);
                        return Ok(report);
                    }
                }

                if !self.entry_delay.is_zero() {
                    tokio::time::sleep(self.entry_delay).await;
                }
            }
        }

        Ok(report)
    }
}
