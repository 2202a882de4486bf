//! Catalog and stream facades
//!
//! [`MovieRepository`] delegates to a [`MovieCrawler`]. [`StreamRepository`]
//! puts the stream cache in front of a [`StreamSniffer`] and never returns
//! an empty list: when sniffing finds nothing the episode page itself is
//! offered as an iframe source.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::StreamCache;
use crate::crawler::{MovieCrawler, SiteCrawler};
use crate::models::{Episode, Movie, MovieCategory, StreamSource};
use crate::sniffer::StreamSniffer;

/// Catalog access for API handlers and other consumers
pub struct MovieRepository {
    crawler: Arc<dyn MovieCrawler>,
    site: Option<Arc<SiteCrawler>>,
}

impl MovieRepository {
    pub fn new(crawler: Arc<dyn MovieCrawler>) -> Self {
        Self {
            crawler,
            site: None,
        }
    }

    /// Repository backed by a site crawler, enabling episode fan-out on details
    pub fn for_site(crawler: Arc<SiteCrawler>) -> Self {
        Self {
            crawler: crawler.clone(),
            site: Some(crawler),
        }
    }

    pub async fn get_hot_movies(&self) -> Vec<Movie> {
        self.crawler.crawl_hot_movies().await
    }

    pub async fn get_categorized_hot_movies(&self) -> Vec<MovieCategory> {
        self.crawler.crawl_categorized_hot_movies().await
    }

    pub async fn get_movie_detail(&self, url: &str) -> Option<Movie> {
        self.crawler.crawl_movie_details(url).await
    }

    /// Detail with remote episode groups resolved where possible
    ///
    /// Falls back to the plain detail when the crawler cannot fan out.
    pub async fn get_movie_detail_with_episodes(&self, url: &str) -> Option<Movie> {
        match &self.site {
            Some(site) => site.crawl_movie_details_with_episodes(url).await,
            None => self.get_movie_detail(url).await,
        }
    }

    pub async fn get_episodes(&self, group_url: &str) -> Vec<Episode> {
        self.crawler
            .extract_episodes_from_episode_group_url(group_url)
            .await
    }
}

/// Cache-then-sniff stream resolution
pub struct StreamRepository {
    cache: StreamCache,
    sniffer: Arc<dyn StreamSniffer>,
}

impl StreamRepository {
    pub fn new(cache: StreamCache, sniffer: Arc<dyn StreamSniffer>) -> Self {
        Self { cache, sniffer }
    }

    /// Playable sources for `episode_url`, never empty
    pub async fn get_stream_url(&self, episode_url: &str) -> Vec<StreamSource> {
        if let Some(cached) = self.cache.get(episode_url).await {
            info!("Using {} cached streams for {}", cached.len(), episode_url);
            return cached;
        }

        info!("Sniffing streams for {}", episode_url);
        let mut sources = self.sniffer.sniff_stream_via_iframe(episode_url).await;
        if sources.is_empty() {
            warn!("No streams sniffed for {}, falling back to iframe", episode_url);
            sources.push(StreamSource::iframe_fallback(episode_url));
        }

        self.cache.put(episode_url, &sources).await;
        sources
    }

    /// Drop every cached resolution; returns how many entries were removed
    pub async fn clear_cache(&self) -> usize {
        let removed = self.cache.clear().await;
        info!("Cleared {} cached stream entries", removed);
        removed
    }
}
