use tracing::{debug, info};

use crate::models::MovieContext;

/// Picks the artwork language for a title from its origin.
#[derive(Debug, Clone)]
pub struct LocalePolicy {
    countries: Vec<String>,
    default_language: String,
}

impl LocalePolicy {
    pub fn new(countries: Vec<String>, default_language: impl Into<String>) -> Self {
        Self {
            countries,
            default_language: default_language.into(),
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Original language when any production country is origin-sensitive, else the default.
    /// Countries are checked in the order the title lists them.
    pub fn preferred_language(&self, context: Option<&MovieContext>) -> String {
        let Some(context) = context else {
            return self.default_language.clone();
        };
        if self.countries.is_empty() {
            return self.default_language.clone();
        }

        for country in &context.production_countries {
            if self.countries.iter().any(|c| c.eq_ignore_ascii_case(country)) {
                info!(
                    "Movie from {} - using original language: {}",
                    country, context.original_language
                );
                return context.original_language.clone();
            }
        }

        debug!(
            countries = ?context.production_countries,
            language = %self.default_language,
            "No origin-sensitive country matched"
        );
        self.default_language.clone()
    }
}
