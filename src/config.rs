//! Configuration module for the stream finder
//!
//! Process settings come from environment variables; the per-site selector
//! profile comes from a JSON document (or the built-in reference profile).

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::constants::{cache, site};

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read site profile {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid site profile: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("Selector '{field}' is empty")]
    EmptySelector { field: &'static str },

    #[error("Selector '{field}' ('{selector}') does not parse: {reason}")]
    InvalidSelector {
        field: &'static str,
        selector: String,
        reason: String,
    },
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Site profile JSON, built-in reference profile when absent
    pub site_profile: Option<PathBuf>,
    /// Remote headless-browser function endpoint
    pub browserless_endpoint: String,
    /// API token for the endpoint, empty to omit
    pub browserless_api_key: String,
    /// Root directory of the stream cache
    pub cache_dir: PathBuf,
    /// Directory overriding the bundled automation scripts
    pub script_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            site_profile: env::var("SITE_PROFILE").ok().map(PathBuf::from),
            browserless_endpoint: env::var("BROWSERLESS_ENDPOINT")
                .unwrap_or_else(|_| "http://127.0.0.1:3000/function".to_string()),
            browserless_api_key: env::var("BROWSERLESS_API_KEY").unwrap_or_default(),
            cache_dir: env::var("STREAM_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join(cache::DEFAULT_DIR_NAME)),
            script_dir: env::var("SCRIPT_DIR").ok().map(PathBuf::from),
        }
    }

    /// Site profile named by `SITE_PROFILE`, or the reference profile
    pub fn load_site_profile(&self) -> Result<SiteProfile, ConfigError> {
        match &self.site_profile {
            Some(path) => SiteProfile::load(path),
            None => Ok(SiteProfile::reference()),
        }
    }
}

/// A site's name, base URL and selectors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SiteProfile {
    pub site_name: String,
    pub base_url: String,
    pub selectors: SelectorsConfig,
}

fn default_title_attr() -> String {
    "title".to_string()
}

fn default_href_attr() -> String {
    "href".to_string()
}

fn default_poster_attr() -> String {
    "data-original".to_string()
}

fn default_page_title() -> String {
    "title".to_string()
}

/// Where each piece of data lives in the site's markup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SelectorsConfig {
    // Hot listing on the index page
    pub hot_section: String,
    pub hot_movie_box: String,

    // Categorized shelves on the index page
    pub category_panel: String,
    pub category_title: String,
    pub category_movie_box: String,

    // Listing items
    pub item_thumb: String,
    #[serde(default = "default_title_attr")]
    pub item_title_attr: String,
    #[serde(default = "default_href_attr")]
    pub item_url_attr: String,
    #[serde(default = "default_poster_attr")]
    pub item_poster_attr: String,

    // Detail page
    pub detail_title: String,
    /// Text after which the title is boilerplate (e.g. a view counter)
    #[serde(default)]
    pub detail_title_cleanup: Option<String>,
    pub detail_description: String,
    pub detail_view_count: String,
    pub detail_plot: String,
    pub detail_plot_marker: String,
    /// Poster candidates, tried in order
    pub detail_thumbs: Vec<String>,
    pub detail_year_marker: String,
    pub detail_playlist: String,

    // Episodes
    pub episode_list: String,
    #[serde(default)]
    pub episode_title_inner: Option<String>,
    #[serde(default = "default_href_attr")]
    pub episode_url_attr: String,

    // Seasons and related parts
    pub season_list: String,
    pub season_link: String,

    /// Elements whose text names the current server/part
    #[serde(default)]
    pub server_title: Option<String>,
    #[serde(default = "default_page_title")]
    pub page_title: String,
}

impl SiteProfile {
    /// Parse and validate a profile document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let profile: SiteProfile = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Read a profile document from disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Profile for the reference site
    pub fn reference() -> Self {
        Self {
            site_name: site::SITE_NAME.to_string(),
            base_url: site::BASE_URL.to_string(),
            selectors: SelectorsConfig {
                hot_section: site::HOT_SECTION.to_string(),
                hot_movie_box: site::HOT_MOVIE_BOX.to_string(),
                category_panel: site::CATEGORY_PANEL.to_string(),
                category_title: site::CATEGORY_TITLE.to_string(),
                category_movie_box: site::CATEGORY_MOVIE_BOX.to_string(),
                item_thumb: site::ITEM_THUMB.to_string(),
                item_title_attr: default_title_attr(),
                item_url_attr: default_href_attr(),
                item_poster_attr: default_poster_attr(),
                detail_title: site::DETAIL_TITLE.to_string(),
                detail_title_cleanup: Some(site::DETAIL_TITLE_CLEANUP.to_string()),
                detail_description: site::DETAIL_DESCRIPTION.to_string(),
                detail_view_count: site::DETAIL_VIEW_COUNT.to_string(),
                detail_plot: site::DETAIL_PLOT.to_string(),
                detail_plot_marker: site::DETAIL_PLOT_MARKER.to_string(),
                detail_thumbs: site::DETAIL_THUMBS.iter().map(|s| s.to_string()).collect(),
                detail_year_marker: site::DETAIL_YEAR_MARKER.to_string(),
                detail_playlist: site::DETAIL_PLAYLIST.to_string(),
                episode_list: site::EPISODE_LIST.to_string(),
                episode_title_inner: Some(site::EPISODE_TITLE_INNER.to_string()),
                episode_url_attr: default_href_attr(),
                season_list: site::SEASON_LIST.to_string(),
                season_link: site::SEASON_LINK.to_string(),
                server_title: Some(site::SERVER_TITLE.to_string()),
                page_title: default_page_title(),
            },
        }
    }

    /// Base URL with a trailing slash, the page listings are fetched from
    pub fn index_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let base = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        if !base.has_host() {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }

        let s = &self.selectors;
        let required: [(&'static str, &str); 17] = [
            ("hotSection", &s.hot_section),
            ("hotMovieBox", &s.hot_movie_box),
            ("categoryPanel", &s.category_panel),
            ("categoryTitle", &s.category_title),
            ("categoryMovieBox", &s.category_movie_box),
            ("itemThumb", &s.item_thumb),
            ("detailTitle", &s.detail_title),
            ("detailDescription", &s.detail_description),
            ("detailViewCount", &s.detail_view_count),
            ("detailPlot", &s.detail_plot),
            ("detailPlotMarker", &s.detail_plot_marker),
            ("detailYearMarker", &s.detail_year_marker),
            ("detailPlaylist", &s.detail_playlist),
            ("episodeList", &s.episode_list),
            ("seasonList", &s.season_list),
            ("seasonLink", &s.season_link),
            ("pageTitle", &s.page_title),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptySelector { field });
            }
        }
        if s.detail_thumbs.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::EmptySelector {
                field: "detailThumbs",
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_profile_json() -> String {
        serde_json::json!({
            "siteName": "demo",
            "baseUrl": "https://demo.example",
            "selectors": {
                "hotSection": "#hot",
                "hotMovieBox": ".box",
                "categoryPanel": ".panel",
                "categoryTitle": "h3",
                "categoryMovieBox": ".box",
                "itemThumb": ".thumb",
                "detailTitle": "h1",
                "detailDescription": ".desc",
                "detailViewCount": ".views",
                "detailPlot": ".detail p",
                "detailPlotMarker": "Plot",
                "detailThumbs": [".poster img"],
                "detailYearMarker": "Year",
                "detailPlaylist": "#playlist",
                "episodeList": "li a",
                "seasonList": ".seasons",
                "seasonLink": "a"
            }
        })
        .to_string()
    }

    #[test]
    fn test_profile_defaults_applied() {
        let profile = SiteProfile::from_json(&minimal_profile_json()).unwrap();
        let s = &profile.selectors;
        assert_eq!(s.item_title_attr, "title");
        assert_eq!(s.item_url_attr, "href");
        assert_eq!(s.item_poster_attr, "data-original");
        assert_eq!(s.episode_url_attr, "href");
        assert_eq!(s.page_title, "title");
        assert!(s.detail_title_cleanup.is_none());
        assert!(s.episode_title_inner.is_none());
        assert!(s.server_title.is_none());
    }

    #[test]
    fn test_missing_required_field_is_fatal() {
        let mut value: serde_json::Value = serde_json::from_str(&minimal_profile_json()).unwrap();
        value["selectors"]
            .as_object_mut()
            .unwrap()
            .remove("detailPlaylist");

        let err = SiteProfile::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_empty_selector_rejected() {
        let mut value: serde_json::Value = serde_json::from_str(&minimal_profile_json()).unwrap();
        value["selectors"]["seasonLink"] = serde_json::json!("  ");

        let err = SiteProfile::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::EmptySelector { field: "seasonLink" }));
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut value: serde_json::Value = serde_json::from_str(&minimal_profile_json()).unwrap();
        value["baseUrl"] = serde_json::json!("not a url");

        let err = SiteProfile::from_json(&value.to_string()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl(_)));
    }

    #[test]
    fn test_reference_profile_round_trips_through_json() {
        let reference = SiteProfile::reference();
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(SiteProfile::from_json(&json).unwrap(), reference);
    }

    #[test]
    fn test_index_url_has_single_trailing_slash() {
        let mut profile = SiteProfile::reference();
        assert_eq!(profile.index_url(), "https://hhhtq.team/");
        profile.base_url = "https://hhhtq.team/".to_string();
        assert_eq!(profile.index_url(), "https://hhhtq.team/");
    }

    #[test]
    fn test_load_missing_file() {
        let err = SiteProfile::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
