//! Show which poster the configured provider would pick for one movie, without touching Plex.
//! Usage:
//!   cargo run --bin poster_probe -- <tmdb_id|imdb_id>
//! Reads the same environment as the main binary (.env supported).

use anyhow::{bail, Result};
use dotenvy::dotenv;
use fanplex::artwork::{rank_candidates, PosterProvider};
use fanplex::config::{ArtProvider, Config};
use fanplex::fanart::FanartClient;
use fanplex::locale::LocalePolicy;
use fanplex::lookup::Lookup;
use fanplex::models::MovieIds;
use fanplex::resolve::{parse_imdb_id, parse_tmdb_id, IdentifierResolver};
use fanplex::tmdb::{MetadataApi, TmdbClient};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let Some(arg) = env::args().nth(1) else {
        bail!("usage: poster_probe <tmdb_id|imdb_id>");
    };
    let mut ids = MovieIds {
        tmdb: parse_tmdb_id(&arg),
        imdb: parse_imdb_id(&arg),
    };
    if ids.tmdb.is_none() && ids.imdb.is_none() {
        bail!("'{}' is neither a TMDB id nor an IMDb id", arg);
    }

    let config = Config::from_env()?;
    let tmdb = config
        .tmdb_api_key
        .as_deref()
        .map(TmdbClient::new)
        .transpose()?
        .map(Arc::new);
    let metadata: Option<Arc<dyn MetadataApi>> = tmdb.clone().map(|c| c as Arc<dyn MetadataApi>);

    if let Lookup::Found(id) = IdentifierResolver::new(metadata.clone()).tmdb_id(&ids).await {
        ids.tmdb = Some(id);
    }
    println!("ids: tmdb={:?} imdb={:?}", ids.tmdb, ids.imdb);

    let context = match (metadata.as_ref(), ids.tmdb.as_deref()) {
        (Some(m), Some(id)) => m.movie_context(id).await.found(),
        _ => None,
    };
    if let Some(ctx) = &context {
        println!(
            "original language: {} | production countries: {}",
            ctx.original_language,
            ctx.production_countries.join(",")
        );
    }
    let locale = LocalePolicy::new(
        config.original_language_countries.clone(),
        config.default_language.clone(),
    );
    let language = locale.preferred_language(context.as_ref());
    println!("preferred language: {}", language);

    let provider: Arc<dyn PosterProvider> = match config.provider {
        ArtProvider::Tmdb => match tmdb {
            Some(c) => c as Arc<dyn PosterProvider>,
            None => bail!("PREFER_TMDB is set but TMDB_API_KEY is missing"),
        },
        ArtProvider::Fanart => match config.fanart_api_key.as_deref() {
            Some(key) => Arc::new(FanartClient::new(key)?),
            None => bail!("FANART_API_KEY is missing"),
        },
    };

    let candidates = match provider.fetch_candidates(&ids).await {
        Lookup::Found(c) => c,
        Lookup::NotFound => {
            println!("{}: no posters", provider.name());
            return Ok(());
        }
        Lookup::TransportFailure(reason) => bail!("{} unreachable: {}", provider.name(), reason),
    };

    println!("{} candidates from {}:", candidates.len(), provider.name());
    let ranked = rank_candidates(&candidates, &language, &config.fallback_language);
    for (i, c) in ranked.iter().enumerate() {
        println!(
            "{:3}. score={:<6} tie={:<6} lang={:<4} {}",
            i + 1,
            c.score,
            c.tie_break.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
            c.language.as_deref().unwrap_or("-"),
            if c.location.is_empty() { "<no path>".to_string() } else { provider.resolve_url(&c.location) }
        );
    }
    match ranked.iter().find(|c| !c.location.trim().is_empty()) {
        Some(best) => println!("selected: {}", provider.resolve_url(&best.location)),
        None => println!("selected: none"),
    }
    Ok(())
}
