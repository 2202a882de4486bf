//! Catalog crawling
//!
//! [`SiteCrawler`] fetches pages through a [`PageFetcher`] and hands them to
//! the [`Extractor`]. Every public operation fails softly: fetch errors and
//! selector misses are logged with the offending URL and turn into empty
//! lists or `None`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::config::{ConfigError, SiteProfile};
use crate::models::{Episode, EpisodeGroup, Movie, MovieCategory};
use crate::parser::Extractor;
use crate::scraper::{Page, PageFetcher, ScraperError};

/// Catalog operations consumed by the movie facade
#[async_trait]
pub trait MovieCrawler: Send + Sync {
    async fn crawl_hot_movies(&self) -> Vec<Movie>;
    async fn crawl_categorized_hot_movies(&self) -> Vec<MovieCategory>;
    async fn crawl_movie_details(&self, url: &str) -> Option<Movie>;
    async fn extract_episodes_from_episode_group_url(&self, url: &str) -> Vec<Episode>;
}

/// Crawler for one site profile
pub struct SiteCrawler {
    site_name: String,
    extractor: Extractor,
    fetcher: Arc<dyn PageFetcher>,
}

impl SiteCrawler {
    /// Build a crawler, compiling the profile's selectors
    pub fn new(profile: &SiteProfile, fetcher: Arc<dyn PageFetcher>) -> Result<Self, ConfigError> {
        Ok(Self {
            site_name: profile.site_name.clone(),
            extractor: Extractor::new(profile)?,
            fetcher,
        })
    }

    async fn fetch(&self, url: &str) -> Result<Page, ScraperError> {
        self.fetcher.fetch(url).await.inspect_err(|e| {
            error!("[{}] Failed to fetch {}: {}", self.site_name, url, e);
        })
    }

    /// Detail page plus the episodes of every remote group
    ///
    /// Remote groups are fetched concurrently and joined before the movie is
    /// returned. A group pointing back at the detail page itself is not
    /// refetched. A group whose page cannot be read keeps its URL so callers
    /// can retry it lazily.
    pub async fn crawl_movie_details_with_episodes(&self, url: &str) -> Option<Movie> {
        let mut movie = self.crawl_movie_details(url).await?;

        let pending: Vec<(usize, String)> = movie
            .episode_groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.is_remote() && g.url != movie.url)
            .map(|(i, g)| (i, g.url.clone()))
            .collect();

        let fetched = join_all(pending.iter().map(|(_, group_url)| self.try_episodes(group_url))).await;

        for ((index, group_url), result) in pending.into_iter().zip(fetched) {
            match result {
                Some(episodes) if !episodes.is_empty() => {
                    let title = std::mem::take(&mut movie.episode_groups[index].title);
                    movie.episode_groups[index] = EpisodeGroup::inline(title, episodes);
                }
                _ => warn!("[{}] Group {} left unresolved", self.site_name, group_url),
            }
        }

        Some(movie)
    }

    async fn try_episodes(&self, url: &str) -> Option<Vec<Episode>> {
        let page = self.fetch(url).await.ok()?;
        Some(self.extractor.parse_episodes(&page.document(), &page.url))
    }
}

#[async_trait]
impl MovieCrawler for SiteCrawler {
    async fn crawl_hot_movies(&self) -> Vec<Movie> {
        info!("[{}] Crawling hot movies", self.site_name);
        let Ok(page) = self.fetch(self.extractor.index_url()).await else {
            return Vec::new();
        };
        let movies = self.extractor.parse_hot_movies(&page.document());
        info!("[{}] Found {} hot movies", self.site_name, movies.len());
        movies
    }

    async fn crawl_categorized_hot_movies(&self) -> Vec<MovieCategory> {
        info!("[{}] Crawling categorized hot movies", self.site_name);
        let Ok(page) = self.fetch(self.extractor.index_url()).await else {
            return Vec::new();
        };
        let categories = self.extractor.parse_categories(&page.document());
        info!("[{}] Found {} categories", self.site_name, categories.len());
        categories
    }

    async fn crawl_movie_details(&self, url: &str) -> Option<Movie> {
        info!("[{}] Crawling movie details from {}", self.site_name, url);
        let page = self.fetch(url).await.ok()?;
        let movie = self.extractor.parse_movie_detail(&page.document(), url);
        if movie.is_none() {
            error!("[{}] No movie detail found on {}", self.site_name, url);
        }
        movie
    }

    async fn extract_episodes_from_episode_group_url(&self, url: &str) -> Vec<Episode> {
        self.try_episodes(url).await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GroupKind;
    use crate::scraper::FixtureFetcher;

    const INDEX: &str = "https://hhhtq.team/";

    fn crawler(fetcher: FixtureFetcher) -> SiteCrawler {
        SiteCrawler::new(&SiteProfile::reference(), Arc::new(fetcher)).unwrap()
    }

    fn detail_page(title: &str, related: &str, playlist: &str) -> String {
        format!(
            r#"<html><head><title>{title}</title></head><body>
            <div class="myui-content__detail"><h1 class="title">{title}</h1></div>
            <ul class="list-episode">{related}</ul>
            <ul id="playlist1">{playlist}</ul>
            </body></html>"#
        )
    }

    #[tokio::test]
    async fn test_fetch_failure_is_soft() {
        let c = crawler(FixtureFetcher::new());
        assert!(c.crawl_hot_movies().await.is_empty());
        assert!(c.crawl_categorized_hot_movies().await.is_empty());
        assert!(c.crawl_movie_details("https://hhhtq.team/phim/1/").await.is_none());
        assert!(c
            .extract_episodes_from_episode_group_url("https://hhhtq.team/phim/1/")
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_hot_movies_from_index() {
        let fetcher = FixtureFetcher::new().with_page(
            INDEX,
            r#"<div id="index-hot"><div class="myui-vodlist__box">
                <a class="myui-vodlist__thumb" href="/phim/7/" title="Seven"></a>
            </div></div>"#,
        );
        let movies = crawler(fetcher).crawl_hot_movies().await;
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].url, "https://hhhtq.team/phim/7/");
    }

    #[tokio::test]
    async fn test_details_with_episodes_fans_out() {
        let detail_url = "https://hhhtq.team/phim/2/";
        let fetcher = FixtureFetcher::new()
            .with_page(
                detail_url,
                detail_page(
                    "Kỳ Đàm (Phần 2)",
                    r#"<li><a href="/phim/1/">Kỳ Đàm (Phần 1)</a></li>
                       <li><a href="/phim/2/">Kỳ Đàm (Phần 2)</a></li>
                       <li><a href="/phim/9/">Kỳ Đàm (OVA 1)</a></li>"#,
                    "",
                ),
            )
            .with_page(
                "https://hhhtq.team/phim/1/",
                detail_page("Kỳ Đàm (Phần 1)", "", r#"<li><a href="/xem/1-sv1-ep1/">Tập 1</a></li>"#),
            );
        let fetcher_handle = fetcher.clone();
        let c = crawler(fetcher);

        let movie = c.crawl_movie_details_with_episodes(detail_url).await.unwrap();
        let groups = &movie.episode_groups;
        let titles: Vec<&str> = groups.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Kỳ Đàm", "Phần 1", "OVA 1"]);

        // own page has an empty playlist, so it stays remote after the fan-out
        assert_eq!(groups[0].kind(), GroupKind::Remote);
        assert_eq!(groups[0].url, detail_url);
        assert_eq!(groups[1].kind(), GroupKind::Inline);
        assert_eq!(groups[1].episodes[0].url, "https://hhhtq.team/xem/1-sv1-ep1/");
        // OVA page missing: group keeps its URL
        assert_eq!(groups[2].kind(), GroupKind::Remote);
        assert_eq!(groups[2].url, "https://hhhtq.team/phim/9/");

        // detail + part 1 + OVA 1; the detail page is not fetched twice
        assert_eq!(fetcher_handle.request_count(), 3);
    }
}
