use std::sync::Arc;
use tracing::{debug, info};

use crate::lookup::Lookup;
use crate::models::MovieIds;
use crate::tmdb::MetadataApi;

pub fn parse_tmdb_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }
    None
}

pub fn parse_imdb_id(input: &str) -> Option<String> {
    let lower = input.trim().to_lowercase();
    if lower.starts_with("tt") && lower.len() > 2 && lower[2..].chars().all(|c| c.is_ascii_digit())
    {
        return Some(lower);
    }
    None
}

/// Maps IMDb ids onto TMDB ids through the metadata provider.
#[derive(Clone)]
pub struct IdentifierResolver {
    metadata: Option<Arc<dyn MetadataApi>>,
}

impl IdentifierResolver {
    pub fn new(metadata: Option<Arc<dyn MetadataApi>>) -> Self {
        Self { metadata }
    }

    /// TMDB id for `ids`, looked up from the IMDb id when the entry has none.
    /// A malformed IMDb id, or no metadata key, is `NotFound` rather than an error.
    pub async fn tmdb_id(&self, ids: &MovieIds) -> Lookup<String> {
        if let Some(id) = ids.tmdb.as_deref().and_then(parse_tmdb_id) {
            return Lookup::Found(id);
        }
        let Some(imdb) = ids.imdb.as_deref().and_then(parse_imdb_id) else {
            debug!(imdb = ?ids.imdb, "No usable IMDb id to resolve");
            return Lookup::NotFound;
        };
        let Some(metadata) = self.metadata.as_ref() else {
            return Lookup::NotFound;
        };

        info!("Converting IMDb ID {} to TMDB ID", imdb);
        let found = metadata.find_by_imdb(&imdb).await;
        if let Lookup::Found(id) = &found {
            debug!(imdb = %imdb, tmdb_id = %id, "Resolved identifier");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovieContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeMetadata {
        calls: AtomicUsize,
        answer: Lookup<String>,
    }

    #[async_trait]
    impl MetadataApi for FakeMetadata {
        async fn find_by_imdb(&self, _imdb_id: &str) -> Lookup<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone()
        }

        async fn movie_context(&self, _tmdb_id: &str) -> Lookup<MovieContext> {
            Lookup::NotFound
        }
    }

    fn resolver_with(answer: Lookup<String>) -> (IdentifierResolver, Arc<FakeMetadata>) {
        let fake = Arc::new(FakeMetadata {
            calls: AtomicUsize::new(0),
            answer,
        });
        let metadata: Arc<dyn MetadataApi> = fake.clone();
        (IdentifierResolver::new(Some(metadata)), fake)
    }

    fn ids(tmdb: Option<&str>, imdb: Option<&str>) -> MovieIds {
        MovieIds {
            tmdb: tmdb.map(str::to_string),
            imdb: imdb.map(str::to_string),
        }
    }

    #[test]
    fn parses_imdb_ids() {
        assert_eq!(parse_imdb_id("tt0111161"), Some("tt0111161".to_string()));
        assert_eq!(parse_imdb_id(" TT0111161 "), Some("tt0111161".to_string()));
        assert_eq!(parse_imdb_id("0111161"), None);
        assert_eq!(parse_imdb_id("tt"), None);
        assert_eq!(parse_imdb_id("ttabc"), None);
    }

    #[tokio::test]
    async fn existing_tmdb_id_skips_lookup() {
        let (resolver, fake) = resolver_with(Lookup::Found("1".to_string()));
        let found = resolver.tmdb_id(&ids(Some("278"), Some("tt0111161"))).await;
        assert_eq!(found, Lookup::Found("278".to_string()));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_imdb_id_is_not_found_without_lookup() {
        let (resolver, fake) = resolver_with(Lookup::Found("1".to_string()));
        let found = resolver.tmdb_id(&ids(None, Some("nm0000123"))).await;
        assert_eq!(found, Lookup::NotFound);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transport_failure_is_distinct_from_not_found() {
        let (resolver, _) = resolver_with(Lookup::TransportFailure("dns".to_string()));
        let found = resolver.tmdb_id(&ids(None, Some("tt0111161"))).await;
        assert!(found.is_transport_failure());

        let (resolver, _) = resolver_with(Lookup::NotFound);
        assert_eq!(
            resolver.tmdb_id(&ids(None, Some("tt0111161"))).await,
            Lookup::NotFound
        );
    }

    #[tokio::test]
    async fn missing_metadata_key_degrades_to_not_found() {
        let resolver = IdentifierResolver::new(None);
        assert_eq!(
            resolver.tmdb_id(&ids(None, Some("tt0111161"))).await,
            Lookup::NotFound
        );
    }
}
