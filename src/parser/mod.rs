//! Parser module for extracting catalog data from HTML
//!
//! The [`Extractor`] turns a site's markup into movies, categories, episode
//! groups and episodes, driven entirely by a [`SiteProfile`]. Every operation
//! works on an already parsed document and degrades to empty values when the
//! markup does not match.

mod related;
mod urls;

pub use related::{
    annotation, normalize_related_parts, purify_label, strip_annotations, RawLink, RelatedPart,
    RelatedParts,
};
pub use urls::{extract_id, extract_url_from_style, resolve_url};

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::{ConfigError, SiteProfile};
use crate::models::{Episode, EpisodeGroup, Movie, MovieCategory};

fn compile(field: &'static str, css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector {
        field,
        selector: css.to_string(),
        reason: format!("{:?}", e),
    })
}

fn compile_optional(field: &'static str, css: Option<&str>) -> Result<Option<Selector>, ConfigError> {
    match css.map(str::trim).filter(|s| !s.is_empty()) {
        Some(css) => compile(field, css).map(Some),
        None => Ok(None),
    }
}

/// Element text with whitespace collapsed
fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of every match, joined by a space
fn select_text(doc: &Html, selector: &Selector) -> String {
    doc.select(selector)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn attr<'a>(el: ElementRef<'a>, name: &str) -> &'a str {
    el.value().attr(name).map(str::trim).unwrap_or_default()
}

/// Everything after the first `:`, or the whole text when there is none
fn after_colon(text: &str) -> &str {
    text.split_once(':').map_or(text, |(_, rest)| rest).trim()
}

fn digits_only(text: &str) -> i32 {
    text.chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

/// Selector-driven extraction for one site profile
///
/// Selectors are compiled once; an invalid selector is a configuration error.
#[derive(Debug)]
pub struct Extractor {
    index_url: String,

    hot_section: Selector,
    hot_movie_box: Selector,
    category_panel: Selector,
    category_title: Selector,
    category_movie_box: Selector,

    item_thumb: Selector,
    item_title_attr: String,
    item_url_attr: String,
    item_poster_attr: String,

    detail_title: Selector,
    detail_title_cleanup: Option<String>,
    detail_description: Selector,
    detail_view_count: Selector,
    detail_plot: Selector,
    detail_plot_marker: String,
    detail_thumbs: Vec<Selector>,
    detail_year_marker: String,
    detail_playlist: Selector,

    episode_list: Selector,
    episode_title_inner: Option<Selector>,
    episode_url_attr: String,

    season_list: Selector,
    season_link: Selector,
    server_title: Option<Selector>,
    page_title: Selector,
}

impl Extractor {
    pub fn new(profile: &SiteProfile) -> Result<Self, ConfigError> {
        let s = &profile.selectors;

        let detail_thumbs = s
            .detail_thumbs
            .iter()
            .filter(|css| !css.trim().is_empty())
            .map(|css| compile("detailThumbs", css))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            index_url: profile.index_url(),
            hot_section: compile("hotSection", &s.hot_section)?,
            hot_movie_box: compile("hotMovieBox", &s.hot_movie_box)?,
            category_panel: compile("categoryPanel", &s.category_panel)?,
            category_title: compile("categoryTitle", &s.category_title)?,
            category_movie_box: compile("categoryMovieBox", &s.category_movie_box)?,
            item_thumb: compile("itemThumb", &s.item_thumb)?,
            item_title_attr: s.item_title_attr.clone(),
            item_url_attr: s.item_url_attr.clone(),
            item_poster_attr: s.item_poster_attr.clone(),
            detail_title: compile("detailTitle", &s.detail_title)?,
            detail_title_cleanup: s
                .detail_title_cleanup
                .clone()
                .filter(|marker| !marker.is_empty()),
            detail_description: compile("detailDescription", &s.detail_description)?,
            detail_view_count: compile("detailViewCount", &s.detail_view_count)?,
            detail_plot: compile("detailPlot", &s.detail_plot)?,
            detail_plot_marker: s.detail_plot_marker.clone(),
            detail_thumbs,
            detail_year_marker: s.detail_year_marker.clone(),
            detail_playlist: compile("detailPlaylist", &s.detail_playlist)?,
            episode_list: compile("episodeList", &s.episode_list)?,
            episode_title_inner: compile_optional("episodeTitleInner", s.episode_title_inner.as_deref())?,
            episode_url_attr: s.episode_url_attr.clone(),
            season_list: compile("seasonList", &s.season_list)?,
            season_link: compile("seasonLink", &s.season_link)?,
            server_title: compile_optional("serverTitle", s.server_title.as_deref())?,
            page_title: compile("pageTitle", &s.page_title)?,
        })
    }

    /// Site index page, which listings are read from
    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    /// Movies in the hot section of the index page
    pub fn parse_hot_movies(&self, doc: &Html) -> Vec<Movie> {
        let Some(section) = doc.select(&self.hot_section).next() else {
            debug!("Hot section not found on {}", self.index_url);
            return Vec::new();
        };

        section
            .select(&self.hot_movie_box)
            .filter_map(|item| self.parse_movie_item(item))
            .collect()
    }

    /// Named shelves of the index page, skipping untitled or empty panels
    pub fn parse_categories(&self, doc: &Html) -> Vec<MovieCategory> {
        doc.select(&self.category_panel)
            .filter_map(|panel| {
                let title = panel
                    .select(&self.category_title)
                    .map(text_of)
                    .collect::<Vec<_>>()
                    .join(" ")
                    .trim()
                    .to_string();
                if title.is_empty() {
                    return None;
                }

                let movies: Vec<Movie> = panel
                    .select(&self.category_movie_box)
                    .filter_map(|item| self.parse_movie_item(item))
                    .collect();
                if movies.is_empty() {
                    debug!("Category '{}' has no parsable movies", title);
                    return None;
                }

                Some(MovieCategory { title, movies })
            })
            .collect()
    }

    /// One listing box; `None` drops the box without affecting its siblings
    fn parse_movie_item(&self, item: ElementRef<'_>) -> Option<Movie> {
        let Some(thumb) = item.select(&self.item_thumb).next() else {
            debug!("Listing item without thumbnail link skipped");
            return None;
        };

        let href = attr(thumb, &self.item_url_attr);
        if href.is_empty() {
            debug!("Listing item without '{}' skipped", self.item_url_attr);
            return None;
        }

        let mut poster = attr(thumb, &self.item_poster_attr).to_string();
        if poster.is_empty() {
            poster = extract_url_from_style(attr(thumb, "style"));
        }
        let poster_url = if poster.is_empty() {
            poster
        } else {
            resolve_url(&self.index_url, &poster)
        };

        Some(Movie {
            id: extract_id(href),
            title: attr(thumb, &self.item_title_attr).to_string(),
            url: resolve_url(&self.index_url, href),
            poster_url,
            ..Default::default()
        })
    }

    fn clean_title(&self, text: &str) -> String {
        let text = match &self.detail_title_cleanup {
            Some(marker) => text.split(marker.as_str()).next().unwrap_or_default(),
            None => text,
        };
        text.trim().to_string()
    }

    /// Full record from a detail page, `None` when the page has no title
    /// element (not a detail page, or the markup changed)
    pub fn parse_movie_detail(&self, doc: &Html, url: &str) -> Option<Movie> {
        // server titles are read with their annotations stripped, wherever they appear
        let server_titles: Vec<ElementRef<'_>> = match &self.server_title {
            Some(selector) => doc.select(selector).collect(),
            None => Vec::new(),
        };
        let read = |el: ElementRef<'_>| {
            let text = text_of(el);
            if server_titles.contains(&el) {
                strip_annotations(&text)
            } else {
                text
            }
        };

        let Some(title_el) = doc.select(&self.detail_title).next() else {
            debug!("No title element on {}", url);
            return None;
        };
        let title = self.clean_title(&read(title_el));

        let description = select_text(doc, &self.detail_description);
        let view_count = select_text(doc, &self.detail_view_count);

        let paragraphs: Vec<String> = doc.select(&self.detail_plot).map(read).collect();

        let plot = paragraphs
            .iter()
            .find(|p| p.contains(&self.detail_plot_marker))
            .map(|p| after_colon(p).to_string())
            .unwrap_or_else(|| description.clone());

        let year = paragraphs
            .iter()
            .find(|p| p.contains(&self.detail_year_marker))
            .map(|p| digits_only(p))
            .unwrap_or(0);

        Some(Movie {
            id: extract_id(url),
            title,
            url: url.to_string(),
            year,
            poster_url: self.parse_detail_poster(doc, url),
            plot,
            description,
            view_count,
            episode_groups: self.parse_episode_groups(doc, url),
        })
    }

    /// First non-empty poster among the candidate selectors
    fn parse_detail_poster(&self, doc: &Html, url: &str) -> String {
        self.detail_thumbs
            .iter()
            .filter_map(|selector| doc.select(selector).next())
            .map(|img| {
                let poster = attr(img, &self.item_poster_attr);
                if poster.is_empty() {
                    attr(img, "src")
                } else {
                    poster
                }
            })
            .find(|poster| !poster.is_empty())
            .map(|poster| resolve_url(url, poster))
            .unwrap_or_default()
    }

    /// The related-parts block, normalized against the page `<title>`
    pub fn parse_related_parts(&self, doc: &Html) -> RelatedParts {
        let links: Vec<RawLink> = doc
            .select(&self.season_list)
            .next()
            .map(|block| {
                block
                    .select(&self.season_link)
                    .map(|a| RawLink {
                        text: text_of(a),
                        href: attr(a, "href").to_string(),
                        marked_active: a.value().classes().any(|c| c.contains("active")),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let page_title = doc.select(&self.page_title).next().map(text_of).unwrap_or_default();

        normalize_related_parts(&links, annotation(&page_title))
    }

    /// Episode groups of a detail page
    ///
    /// The page's own playlist becomes the first group, inline when the page
    /// lists its episodes and remote (pointing back at the page) otherwise.
    /// Each other related part becomes a remote group.
    pub fn parse_episode_groups(&self, doc: &Html, page_url: &str) -> Vec<EpisodeGroup> {
        let mut groups: Vec<EpisodeGroup> = Vec::new();

        let default_title = self
            .server_title
            .as_ref()
            .and_then(|selector| doc.select(selector).next())
            .or_else(|| doc.select(&self.detail_title).next())
            .map(|el| self.clean_title(&strip_annotations(&text_of(el))))
            .unwrap_or_default();

        if !default_title.is_empty() {
            let episodes = self.parse_episodes(doc, page_url);
            groups.push(if episodes.is_empty() {
                EpisodeGroup::remote(default_title, page_url)
            } else {
                EpisodeGroup::inline(default_title, episodes)
            });
        }

        for part in self.parse_related_parts(doc).others() {
            if part.label.is_empty() || part.href.is_empty() {
                continue;
            }
            let url = resolve_url(page_url, &part.href);
            if url == page_url || groups.iter().any(|g| g.title == part.label || g.url == url) {
                continue;
            }
            groups.push(EpisodeGroup::remote(part.label.clone(), url));
        }

        groups
    }

    /// Episodes in the page's playlist, with absolute URLs
    pub fn parse_episodes(&self, doc: &Html, page_url: &str) -> Vec<Episode> {
        let Some(playlist) = doc.select(&self.detail_playlist).next() else {
            debug!("No playlist on {}", page_url);
            return Vec::new();
        };

        playlist
            .select(&self.episode_list)
            .filter_map(|link| {
                let href = attr(link, &self.episode_url_attr);
                if href.is_empty() {
                    return None;
                }

                let title = self
                    .episode_title_inner
                    .as_ref()
                    .and_then(|inner| link.select(inner).next())
                    .map(text_of)
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| text_of(link));

                Some(Episode {
                    title,
                    url: resolve_url(page_url, href),
                })
            })
            .collect()
    }
}
