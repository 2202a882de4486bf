//! Decoding of automation endpoint responses

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::constants::sniff::{
    DASH_MARKER, EXCLUDED_FRAME_HOSTS, HLS_MARKER, MIN_PLAYER_HEIGHT, MIN_PLAYER_WIDTH,
};
use crate::constants::REFERER_HEADER;
use crate::models::{StreamSource, StreamType};

/// One response captured by the sniff script
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SniffedStream {
    pub url: String,
    pub headers: HashMap<String, String>,
}

/// Shape the sniff response body turned out to have
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SniffOutcome {
    /// `[{url, headers}, ...]`
    Objects(Vec<SniffedStream>),
    /// `["https://...", ...]`
    Urls(Vec<String>),
    /// A single non-array body taken as one URL
    Bare(String),
    Empty,
}

impl SniffOutcome {
    pub fn into_streams(self) -> Vec<SniffedStream> {
        match self {
            SniffOutcome::Objects(streams) => streams,
            SniffOutcome::Urls(urls) => urls
                .into_iter()
                .map(|url| SniffedStream {
                    url,
                    headers: HashMap::new(),
                })
                .collect(),
            SniffOutcome::Bare(url) => vec![SniffedStream {
                url,
                headers: HashMap::new(),
            }],
            SniffOutcome::Empty => Vec::new(),
        }
    }
}

/// Decode a sniff response: objects, then bare URL strings, then the whole body as one URL
pub fn decode_sniff_response(body: &str) -> SniffOutcome {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return SniffOutcome::Empty;
    }

    if let Ok(streams) = serde_json::from_str::<Vec<SniffedStream>>(trimmed) {
        return SniffOutcome::Objects(streams);
    }
    if let Ok(urls) = serde_json::from_str::<Vec<String>>(trimmed) {
        return SniffOutcome::Urls(urls);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(url)) => SniffOutcome::Bare(url),
        Ok(Value::Array(_)) | Ok(Value::Object(_)) => {
            warn!("Unrecognised sniff response: {}", trimmed);
            SniffOutcome::Empty
        }
        Ok(Value::Null) => SniffOutcome::Empty,
        Ok(_) => SniffOutcome::Bare(trimmed.to_string()),
        // broken JSON structure, never a URL
        Err(e) if trimmed.starts_with(['[', '{']) => {
            warn!("Undecodable sniff response ({}): {}", e, trimmed);
            SniffOutcome::Empty
        }
        Err(_) => SniffOutcome::Bare(trimmed.to_string()),
    }
}

/// Classify a captured URL by substring: HLS, DASH, anything else MP4
pub fn classify_stream_url(url: &str) -> StreamType {
    let lower = url.to_ascii_lowercase();
    if lower.contains(HLS_MARKER) {
        StreamType::Hls
    } else if lower.contains(DASH_MARKER) {
        StreamType::Dash
    } else {
        StreamType::Mp4
    }
}

/// Turn a decoded response into stream sources for `target_url`
///
/// Blank URLs are dropped, duplicates keep their first occurrence and every
/// source gets `referer: target_url` in place of any captured referer.
pub fn to_stream_sources(outcome: SniffOutcome, target_url: &str) -> Vec<StreamSource> {
    let mut seen = HashSet::new();

    outcome
        .into_streams()
        .into_iter()
        .filter_map(|stream| {
            let url = stream.url.trim().to_string();
            if url.is_empty() || !seen.insert(url.clone()) {
                return None;
            }

            let mut headers: HashMap<String, String> = stream
                .headers
                .into_iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case(REFERER_HEADER))
                .collect();
            headers.insert(REFERER_HEADER.to_string(), target_url.to_string());

            Some(StreamSource::new(&url, classify_stream_url(&url)).with_headers(headers))
        })
        .collect()
}

/// An iframe as measured in the rendered page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrameCandidate {
    pub src: String,
    pub width: f64,
    pub height: f64,
}

impl FrameCandidate {
    fn is_excluded(&self) -> bool {
        let src = self.src.to_ascii_lowercase();
        EXCLUDED_FRAME_HOSTS.iter().any(|host| src.contains(host))
    }

    fn is_player_sized(&self) -> bool {
        self.width > MIN_PLAYER_WIDTH && self.height > MIN_PLAYER_HEIGHT
    }
}

/// What the iframe script saw on the page
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct IframeReport {
    /// URL from the page's global player descriptor, if any
    pub player: Option<String>,
    pub frames: Vec<FrameCandidate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IframeOutcome {
    Report(IframeReport),
    /// Plain URL returned directly by the script
    Url(String),
    Empty,
}

/// Decode an iframe response
///
/// The endpoint may wrap the script's string result in a JSON string, so one
/// layer of string encoding is peeled before the report is read.
pub fn decode_iframe_response(body: &str) -> IframeOutcome {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return IframeOutcome::Empty;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(inner)) => decode_iframe_response(&inner),
        Ok(value @ Value::Object(_)) => match serde_json::from_value::<IframeReport>(value) {
            Ok(report) => IframeOutcome::Report(report),
            Err(e) => {
                warn!("Malformed iframe report: {}", e);
                IframeOutcome::Empty
            }
        },
        Ok(_) => IframeOutcome::Empty,
        Err(e) if trimmed.starts_with(['[', '{']) => {
            warn!("Undecodable iframe response ({}): {}", e, trimmed);
            IframeOutcome::Empty
        }
        Err(_) => IframeOutcome::Url(trimmed.to_string()),
    }
}

/// Pick the player frame out of a report
///
/// The player descriptor wins. Otherwise the first non-excluded frame larger
/// than the minimum player size, falling back to the first non-excluded frame.
pub fn choose_player_frame(report: &IframeReport) -> Option<String> {
    if let Some(player) = report.player.as_deref().map(str::trim) {
        if !player.is_empty() {
            debug!("Using player descriptor URL {}", player);
            return Some(player.to_string());
        }
    }

    let candidates: Vec<&FrameCandidate> = report
        .frames
        .iter()
        .filter(|frame| !frame.src.trim().is_empty() && !frame.is_excluded())
        .collect();

    candidates
        .iter()
        .find(|frame| frame.is_player_sized())
        .or_else(|| candidates.first())
        .map(|frame| frame.src.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "https://player.site.com/embed/1";

    fn frame(src: &str, width: f64, height: f64) -> FrameCandidate {
        FrameCandidate {
            src: src.to_string(),
            width,
            height,
        }
    }

    #[test]
    fn test_decode_objects() {
        let body = r#"[{"url":"https://cdn.x/a.m3u8","headers":{"origin":"https://player.site.com"}}]"#;
        let SniffOutcome::Objects(streams) = decode_sniff_response(body) else {
            panic!("expected objects");
        };
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].headers["origin"], "https://player.site.com");
    }

    #[test]
    fn test_decode_falls_back_to_url_list_then_bare() {
        assert_eq!(
            decode_sniff_response(r#"["https://cdn.x/a.mp4","https://cdn.x/b.mpd"]"#),
            SniffOutcome::Urls(vec![
                "https://cdn.x/a.mp4".to_string(),
                "https://cdn.x/b.mpd".to_string()
            ])
        );
        assert_eq!(
            decode_sniff_response(r#""https://cdn.x/a.m3u8""#),
            SniffOutcome::Bare("https://cdn.x/a.m3u8".to_string())
        );
        assert_eq!(
            decode_sniff_response("https://cdn.x/a.m3u8\n"),
            SniffOutcome::Bare("https://cdn.x/a.m3u8".to_string())
        );
    }

    #[test]
    fn test_decode_empty_bodies() {
        assert_eq!(decode_sniff_response(""), SniffOutcome::Empty);
        assert_eq!(decode_sniff_response("null"), SniffOutcome::Empty);
        assert_eq!(decode_sniff_response("[]"), SniffOutcome::Objects(Vec::new()));
        assert_eq!(decode_sniff_response(r#"{"error":"boom"}"#), SniffOutcome::Empty);
    }

    #[test]
    fn test_truncated_json_yields_no_sources() {
        let truncated = r#"[{"url":"https://cdn.x/a.m3u8","headers":{}"#;
        assert_eq!(decode_sniff_response(truncated), SniffOutcome::Empty);
        assert!(to_stream_sources(decode_sniff_response(truncated), TARGET).is_empty());

        assert_eq!(decode_sniff_response(r#"{"url":"https://cdn.x/a"#), SniffOutcome::Empty);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify_stream_url("https://cdn.x/master.m3u8?token=1"), StreamType::Hls);
        assert_eq!(classify_stream_url("https://cdn.x/MANIFEST.MPD"), StreamType::Dash);
        assert_eq!(classify_stream_url("https://cdn.x/video.mp4"), StreamType::Mp4);
        assert_eq!(classify_stream_url("https://cdn.x/stream?id=4"), StreamType::Mp4);
    }

    #[test]
    fn test_referer_overrides_captured_value() {
        let body = r#"[{"url":"https://cdn.x/a.m3u8","headers":{"Referer":"https://elsewhere/","accept":"*/*"}}]"#;
        let sources = to_stream_sources(decode_sniff_response(body), TARGET);
        assert_eq!(sources.len(), 1);
        let headers = &sources[0].headers;
        assert_eq!(headers.get("referer").map(String::as_str), Some(TARGET));
        assert!(!headers.contains_key("Referer"));
        assert_eq!(headers["accept"], "*/*");
        assert_eq!(sources[0].stream_type, StreamType::Hls);
        assert_eq!(sources[0].quality, "auto");
    }

    #[test]
    fn test_sources_deduped_and_blank_dropped() {
        let outcome = SniffOutcome::Urls(vec![
            "https://cdn.x/a.mp4".to_string(),
            "  ".to_string(),
            "https://cdn.x/a.mp4".to_string(),
            "https://cdn.x/b.mpd".to_string(),
        ]);
        let sources = to_stream_sources(outcome, TARGET);
        let urls: Vec<&str> = sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["https://cdn.x/a.mp4", "https://cdn.x/b.mpd"]);
        assert!(sources.iter().all(|s| s.headers["referer"] == TARGET));
    }

    #[test]
    fn test_large_frame_beats_ad_frame() {
        let report = IframeReport {
            player: None,
            frames: vec![
                frame("https://ads.example/pixel", 10.0, 10.0),
                frame("https://player.example/embed/9", 800.0, 600.0),
            ],
        };
        assert_eq!(
            choose_player_frame(&report).as_deref(),
            Some("https://player.example/embed/9")
        );
    }

    #[test]
    fn test_excluded_frames_skipped() {
        let report = IframeReport {
            player: None,
            frames: vec![
                frame("https://www.google.com/recaptcha/api2/anchor", 900.0, 700.0),
                frame("https://challenges.cloudflare.com/x", 900.0, 700.0),
                frame("https://player.example/small", 200.0, 150.0),
            ],
        };
        // no large candidate left, first non-excluded frame wins
        assert_eq!(
            choose_player_frame(&report).as_deref(),
            Some("https://player.example/small")
        );
    }

    #[test]
    fn test_player_descriptor_wins() {
        let report = IframeReport {
            player: Some("https://player.example/descriptor".to_string()),
            frames: vec![frame("https://player.example/embed/9", 800.0, 600.0)],
        };
        assert_eq!(
            choose_player_frame(&report).as_deref(),
            Some("https://player.example/descriptor")
        );
    }

    #[test]
    fn test_no_frames() {
        assert_eq!(choose_player_frame(&IframeReport::default()), None);
        let report = IframeReport {
            player: Some("  ".to_string()),
            frames: vec![frame("", 800.0, 600.0)],
        };
        assert_eq!(choose_player_frame(&report), None);
    }

    #[test]
    fn test_decode_iframe_shapes() {
        let report_json = r#"{"player":null,"frames":[{"src":"https://p.x/e","width":640,"height":360}]}"#;
        let IframeOutcome::Report(report) = decode_iframe_response(report_json) else {
            panic!("expected report");
        };
        assert_eq!(report.frames[0].width, 640.0);

        // string-wrapped report
        let wrapped = serde_json::to_string(report_json).unwrap();
        assert!(matches!(decode_iframe_response(&wrapped), IframeOutcome::Report(_)));

        assert_eq!(
            decode_iframe_response("https://p.x/e"),
            IframeOutcome::Url("https://p.x/e".to_string())
        );
        assert_eq!(
            decode_iframe_response(r#""https://p.x/e""#),
            IframeOutcome::Url("https://p.x/e".to_string())
        );
        assert_eq!(decode_iframe_response("null"), IframeOutcome::Empty);
        assert_eq!(
            decode_iframe_response(r#"{"player":null,"frames":[{"src":"https://p.x/e""#),
            IframeOutcome::Empty
        );
        assert_eq!(decode_iframe_response(""), IframeOutcome::Empty);
    }
}
