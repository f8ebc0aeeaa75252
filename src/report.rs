use chrono::Local;
use tracing::info;

use crate::models::ProcessingOutcome;

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<ProcessingOutcome>,
    /// Set when a transport failure cut the run short.
    pub halted: Option<String>,
}

impl RunReport {
    pub fn successful(&self) -> impl Iterator<Item = &ProcessingOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &ProcessingOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn posters_set(&self) -> usize {
        self.outcomes.iter().filter(|o| o.poster_set).count()
    }

    pub fn log_summary(&self, completion_label: &str) {
        if self.outcomes.is_empty() {
            info!("No movies found without '{}' label", completion_label);
        } else {
            let successful: Vec<_> = self.successful().collect();
            let failed: Vec<_> = self.failed().collect();

            info!("{}", "=".repeat(80));
            info!("SUMMARY: {} movies processed", self.outcomes.len());
            info!("Successful: {}", successful.len());
            info!("Posters set: {}", self.posters_set());
            info!("Failed: {}", failed.len());
            info!("{}", "=".repeat(80));

            if !successful.is_empty() {
                info!("SUCCESSFULLY PROCESSED ({} movies):", successful.len());
                for (i, movie) in successful.iter().enumerate() {
                    let marker = if movie.poster_set { " [poster]" } else { "" };
                    info!("{:3}. {}{}", i + 1, describe(movie), marker);
                }
            }
            if !failed.is_empty() {
                info!("FAILED TO PROCESS ({} movies):", failed.len());
                for (i, movie) in failed.iter().enumerate() {
                    info!("{:3}. {}", i + 1, describe(movie));
                }
            }
            info!("{}", "=".repeat(80));
        }

        if let Some(reason) = &self.halted {
            info!("Run stopped early: {}", reason);
        }
        info!(
            "Processing completed at: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        info!(
            "Total processed: {}/{} movies",
            self.successful().count(),
            self.outcomes.len()
        );
    }
}

fn describe(movie: &ProcessingOutcome) -> String {
    format!(
        "{} ({}) [{}] - Added: {}",
        movie.title,
        movie
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "None".to_string()),
        movie.library,
        movie.added_date()
    )
}
