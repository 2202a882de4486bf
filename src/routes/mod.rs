//! API Routes module for the stream finder
//!
//! Thin HTTP layer over the movie and stream repositories.

use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::cache::StreamCache;
use crate::config::Config;
use crate::crawler::SiteCrawler;
use crate::error::{AppError, AppResult};
use crate::models::{
    ApiError, ApiResponse, Episode, EpisodeGroup, Movie, MovieCategory, StreamSource, StreamType,
};
use crate::repository::{MovieRepository, StreamRepository};
use crate::scraper::{PageFetcher, Scraper};
use crate::sniffer::{BrowserlessSniffer, ScriptTemplates};

/// Application state shared across handlers
pub struct AppState {
    pub movies: MovieRepository,
    pub streams: StreamRepository,
}

impl AppState {
    pub fn new(movies: MovieRepository, streams: StreamRepository) -> Self {
        Self { movies, streams }
    }

    /// Wire the live crawler, sniffer and cache from process configuration
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let profile = config.load_site_profile()?;
        info!("Using site profile '{}' ({})", profile.site_name, profile.base_url);

        let fetcher: Arc<dyn PageFetcher> = Arc::new(Scraper::new());
        let crawler = Arc::new(SiteCrawler::new(&profile, fetcher)?);

        let scripts = match &config.script_dir {
            Some(dir) => ScriptTemplates::load(dir).await?,
            None => ScriptTemplates::bundled(),
        };
        let sniffer = BrowserlessSniffer::with_scripts(
            config.browserless_endpoint.clone(),
            config.browserless_api_key.clone(),
            scripts,
        );
        if config.browserless_api_key.trim().is_empty() {
            warn!("BROWSERLESS_API_KEY is not set, requests go out without a token");
        }

        let cache = StreamCache::new(config.cache_dir.clone());
        info!("Stream cache at {}", cache.root().display());

        Ok(Self::new(
            MovieRepository::for_site(crawler),
            StreamRepository::new(cache, Arc::new(sniffer)),
        ))
    }
}

/// Query parameters for endpoints addressing a page by URL
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct UrlQuery {
    /// Absolute http(s) URL of the page
    pub url: Option<String>,
}

impl UrlQuery {
    fn require(&self) -> AppResult<String> {
        let raw = match &self.url {
            Some(url) if !url.trim().is_empty() => url.trim(),
            _ => return Err(AppError::validation("Query parameter 'url' is required")),
        };

        match Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(raw.to_string()),
            _ => Err(AppError::validation(format!(
                "'{}' is not an absolute http(s) URL",
                raw
            ))),
        }
    }
}

/// Result of clearing the stream cache
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CacheClearResult {
    /// Number of entries deleted
    pub removed: usize,
}

/// GET /api/movies/hot - Hot movies from the index page
#[utoipa::path(
    get,
    path = "/api/movies/hot",
    tag = "movies",
    responses(
        (status = 200, description = "Hot movies, empty when the site could not be read", body = Vec<Movie>)
    )
)]
pub async fn get_hot_movies(data: web::Data<AppState>) -> HttpResponse {
    let movies = data.movies.get_hot_movies().await;
    HttpResponse::Ok().json(ApiResponse::new(movies))
}

/// GET /api/movies/categories - Categorized shelves from the index page
#[utoipa::path(
    get,
    path = "/api/movies/categories",
    tag = "movies",
    responses(
        (status = 200, description = "Categories with their movies", body = Vec<MovieCategory>)
    )
)]
pub async fn get_categories(data: web::Data<AppState>) -> HttpResponse {
    let categories = data.movies.get_categorized_hot_movies().await;
    HttpResponse::Ok().json(ApiResponse::new(categories))
}

/// GET /api/movies/detail?url= - Movie detail with episode groups
///
/// Remote groups are resolved concurrently before the response is sent.
#[utoipa::path(
    get,
    path = "/api/movies/detail",
    tag = "movies",
    params(UrlQuery),
    responses(
        (status = 200, description = "Movie detail retrieved successfully", body = Movie),
        (status = 400, description = "Missing or invalid url", body = ApiError),
        (status = 404, description = "No movie detail on that page", body = ApiError)
    )
)]
pub async fn get_movie_detail(
    data: web::Data<AppState>,
    query: web::Query<UrlQuery>,
) -> AppResult<HttpResponse> {
    let url = query.require()?;
    info!("Movie detail requested for {}", url);

    let movie = data
        .movies
        .get_movie_detail_with_episodes(&url)
        .await
        .ok_or_else(|| AppError::not_found(format!("No movie detail found at {}", url)))?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(movie)))
}

/// GET /api/episodes?url= - Episodes listed on an episode group page
#[utoipa::path(
    get,
    path = "/api/episodes",
    tag = "movies",
    params(UrlQuery),
    responses(
        (status = 200, description = "Episodes, empty when the page could not be read", body = Vec<Episode>),
        (status = 400, description = "Missing or invalid url", body = ApiError)
    )
)]
pub async fn get_episodes(
    data: web::Data<AppState>,
    query: web::Query<UrlQuery>,
) -> AppResult<HttpResponse> {
    let url = query.require()?;
    let episodes = data.movies.get_episodes(&url).await;
    Ok(HttpResponse::Ok().json(ApiResponse::new(episodes)))
}

/// GET /api/streams?url= - Playable sources for an episode
///
/// Never empty: when sniffing finds nothing, the episode page itself is
/// returned as an IFRAME source.
#[utoipa::path(
    get,
    path = "/api/streams",
    tag = "streams",
    params(UrlQuery),
    responses(
        (status = 200, description = "Stream sources for the episode", body = Vec<StreamSource>),
        (status = 400, description = "Missing or invalid url", body = ApiError)
    )
)]
pub async fn get_streams(
    data: web::Data<AppState>,
    query: web::Query<UrlQuery>,
) -> AppResult<HttpResponse> {
    let url = query.require()?;
    let sources = data.streams.get_stream_url(&url).await;
    Ok(HttpResponse::Ok().json(ApiResponse::new(sources)))
}

/// DELETE /api/streams/cache - Forget every cached stream resolution
#[utoipa::path(
    delete,
    path = "/api/streams/cache",
    tag = "streams",
    responses(
        (status = 200, description = "Cache cleared", body = CacheClearResult)
    )
)]
pub async fn clear_stream_cache(data: web::Data<AppState>) -> HttpResponse {
    let removed = data.streams.clear_cache().await;
    HttpResponse::Ok().json(ApiResponse::new(CacheClearResult { removed }))
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stream Finder API",
        version = "0.1.0",
        description = "Catalog scraping and stream source resolution for video hosting sites",
        license(
            name = "MIT"
        )
    ),
    paths(
        get_hot_movies,
        get_categories,
        get_movie_detail,
        get_episodes,
        get_streams,
        clear_stream_cache
    ),
    components(
        schemas(
            Movie,
            MovieCategory,
            EpisodeGroup,
            Episode,
            StreamSource,
            StreamType,
            ApiError,
            CacheClearResult,
            UrlQuery
        )
    ),
    tags(
        (name = "movies", description = "Catalog endpoints"),
        (name = "streams", description = "Stream resolution endpoints")
    )
)]
pub struct ApiDoc;

/// Configure API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/movies/hot", web::get().to(get_hot_movies))
            .route("/movies/categories", web::get().to(get_categories))
            .route("/movies/detail", web::get().to(get_movie_detail))
            .route("/episodes", web::get().to(get_episodes))
            .route("/streams", web::get().to(get_streams))
            .route("/streams/cache", web::delete().to(clear_stream_cache)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(url: Option<&str>) -> UrlQuery {
        UrlQuery {
            url: url.map(str::to_string),
        }
    }

    #[test]
    fn test_require_url() {
        assert_eq!(
            query(Some(" https://site.com/phim/1/ ")).require().unwrap(),
            "https://site.com/phim/1/"
        );
        assert!(matches!(query(None).require(), Err(AppError::Validation(_))));
        assert!(matches!(query(Some("  ")).require(), Err(AppError::Validation(_))));
        assert!(matches!(query(Some("/phim/1/")).require(), Err(AppError::Validation(_))));
        assert!(matches!(
            query(Some("ftp://site.com/a")).require(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/streams"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/movies/detail"));
        assert_eq!(paths.len(), 6);
    }
}
