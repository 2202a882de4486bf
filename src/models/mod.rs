//! Data models for the stream finder
//!
//! Catalog records produced by the extraction engine, stream sources produced
//! by the sniffer, and the response envelopes used by the HTTP surface.

use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::constants::DEFAULT_QUALITY;

/// A title listed on the site, with whatever detail was available where it was found
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct Movie {
    /// Last path segment of the canonical URL (e.g. "115" for ".../phim/115/")
    pub id: String,
    pub title: String,
    /// Canonical detail-page URL
    pub url: String,
    /// Release year, 0 when unknown
    pub year: i32,
    pub poster_url: String,
    pub plot: String,
    pub description: String,
    /// Free-text view counter as shown on the page
    pub view_count: String,
    pub episode_groups: Vec<EpisodeGroup>,
}

/// A named bucket of episodes: a server, a season, an OVA, a dub variant
///
/// A group is either inline (`episodes` populated, `url` empty) or remote
/// (`url` set, episodes fetched lazily). Use [`EpisodeGroup::kind`] instead of
/// checking the fields directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct EpisodeGroup {
    pub title: String,
    pub episodes: Vec<Episode>,
    pub url: String,
}

/// Where the episodes of a group live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Episodes are carried in the group itself
    Inline,
    /// Episodes must be fetched from the group's URL
    Remote,
}

impl EpisodeGroup {
    /// Group whose episodes are already known
    pub fn inline(title: impl Into<String>, episodes: Vec<Episode>) -> Self {
        Self {
            title: title.into(),
            episodes,
            url: String::new(),
        }
    }

    /// Group whose episodes live on another page
    pub fn remote(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            episodes: Vec::new(),
            url: url.into(),
        }
    }

    pub fn kind(&self) -> GroupKind {
        if self.url.is_empty() {
            GroupKind::Inline
        } else {
            GroupKind::Remote
        }
    }

    pub fn is_remote(&self) -> bool {
        self.kind() == GroupKind::Remote
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub title: String,
    /// Absolute episode page URL
    pub url: String,
}

/// A named shelf of titles from the listing page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MovieCategory {
    pub title: String,
    pub movies: Vec<Movie>,
}

/// Playback flavour of a [`StreamSource`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamType {
    /// HTTP Live Streaming playlist (.m3u8)
    Hls,
    /// MPEG-DASH manifest (.mpd)
    Dash,
    /// Progressive file (.mp4, .mov, .m4v)
    Mp4,
    /// Page to embed as-is when nothing playable was found
    Iframe,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamType::Hls => "HLS",
            StreamType::Dash => "DASH",
            StreamType::Mp4 => "MP4",
            StreamType::Iframe => "IFRAME",
        };
        f.write_str(name)
    }
}

fn default_quality() -> String {
    DEFAULT_QUALITY.to_string()
}

/// A playable or embeddable URL with the headers needed to request it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamSource {
    pub url: String,
    #[serde(rename = "type")]
    pub stream_type: StreamType,
    /// Free-text quality label, "auto" unless known
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Request headers, notably `referer`
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl StreamSource {
    pub fn new(url: impl Into<String>, stream_type: StreamType) -> Self {
        Self {
            url: url.into(),
            stream_type,
            quality: default_quality(),
            headers: HashMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Fallback source that asks the player to embed the episode page itself
    pub fn iframe_fallback(episode_url: impl Into<String>) -> Self {
        Self::new(episode_url, StreamType::Iframe)
    }
}

/// Persisted stream resolution result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub sources: Vec<StreamSource>,
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl CacheEntry {
    /// Whether the entry is still trusted at `now_ms` for a window of `ttl_ms`
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.timestamp_ms < ttl_ms
    }
}

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the operation was successful (always true for this type)
    pub success: bool,
    /// The response payload
    pub data: T,
    /// ISO timestamp of when data was produced
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    /// Create a new successful API response with the current timestamp
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Whether the operation was successful (always false for errors)
    pub success: bool,
    /// Error message describing what went wrong
    pub error: String,
    /// ISO timestamp of when the error occurred
    pub timestamp: String,
}

impl ApiError {
    /// Create a new API error response with the current timestamp
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movie_serialization_is_camel_case() {
        let movie = Movie {
            id: "115".to_string(),
            title: "Linh Khế".to_string(),
            url: "https://site.com/phim/115/".to_string(),
            poster_url: "https://site.com/p.jpg".to_string(),
            view_count: "10 lượt xem".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_string(&movie).unwrap();
        assert!(json.contains("\"posterUrl\""));
        assert!(json.contains("\"viewCount\""));
        assert!(json.contains("\"episodeGroups\":[]"));
        assert!(json.contains("\"year\":0"));
    }

    #[test]
    fn test_group_kind_follows_url() {
        let inline = EpisodeGroup::inline("Server 1", vec![Episode::default()]);
        assert_eq!(inline.kind(), GroupKind::Inline);
        assert!(!inline.is_remote());

        let remote = EpisodeGroup::remote("Phần 2", "https://site.com/phim/2/");
        assert_eq!(remote.kind(), GroupKind::Remote);
        assert!(remote.episodes.is_empty());
    }

    #[test]
    fn test_stream_type_wire_names() {
        let json = serde_json::to_string(&[
            StreamType::Hls,
            StreamType::Dash,
            StreamType::Mp4,
            StreamType::Iframe,
        ])
        .unwrap();
        assert_eq!(json, r#"["HLS","DASH","MP4","IFRAME"]"#);
        assert_eq!(StreamType::Mp4.to_string(), "MP4");
    }

    #[test]
    fn test_stream_source_defaults_on_decode() {
        let source: StreamSource =
            serde_json::from_str(r#"{"url":"https://cdn.com/a.m3u8","type":"HLS"}"#).unwrap();
        assert_eq!(source.quality, "auto");
        assert!(source.headers.is_empty());
        assert_eq!(source.stream_type, StreamType::Hls);
    }

    #[test]
    fn test_iframe_fallback() {
        let source = StreamSource::iframe_fallback("https://site.com/xem/1-sv1-ep1/");
        assert_eq!(source.stream_type, StreamType::Iframe);
        assert_eq!(source.quality, "auto");
        assert_eq!(source.url, "https://site.com/xem/1-sv1-ep1/");
    }

    #[test]
    fn test_cache_entry_freshness() {
        let entry = CacheEntry {
            sources: vec![],
            timestamp_ms: 1_000,
        };
        assert!(entry.is_fresh(1_999, 1_000));
        assert!(!entry.is_fresh(2_000, 1_000));
    }

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::new("Something went wrong");

        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error\":\"Something went wrong\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn test_api_response_serialization() {
        let response = ApiResponse::new(vec!["item1", "item2"]);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"data\""));
        assert!(json.contains("\"timestamp\""));
    }
}
