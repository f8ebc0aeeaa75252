use chrono::{DateTime, Utc};

/// External identifiers carried by a media-server entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieIds {
    pub tmdb: Option<String>,
    pub imdb: Option<String>,
}

impl MovieIds {
    /// Parse media-server guids such as `imdb://tt0111161` and `tmdb://278`.
    pub fn from_guids<'a>(guids: impl IntoIterator<Item = &'a str>) -> Self {
        let mut ids = MovieIds::default();
        for guid in guids {
            if let Some(rest) = guid.strip_prefix("imdb://") {
                ids.imdb = Some(rest.to_string());
            } else if let Some(rest) = guid.strip_prefix("tmdb://") {
                ids.tmdb = Some(rest.to_string());
            }
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub key: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieRef {
    pub rating_key: String,
    pub section_key: String,
    pub title: String,
    pub year: Option<i32>,
    pub added_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub ids: MovieIds,
}

impl MovieRef {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// True when the entry carries none of `excluded`.
    pub fn lacks_all(&self, excluded: &[String]) -> bool {
        !excluded.iter().any(|label| self.has_label(label))
    }

    pub fn display_year(&self) -> String {
        self.year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "None".to_string())
    }
}

/// Locale facts about a title, derived from the metadata provider on every pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieContext {
    pub tmdb_id: String,
    pub original_language: String,
    pub production_countries: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub title: String,
    pub year: Option<i32>,
    pub library: String,
    pub labels: Vec<String>,
    pub added_at: Option<DateTime<Utc>>,
    pub processed_at: DateTime<Utc>,
    pub success: bool,
    pub poster_set: bool,
}

impl ProcessingOutcome {
    pub fn added_date(&self) -> String {
        self.added_at
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}
