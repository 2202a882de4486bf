//! Constants for the stream finder
//!
//! Reference site profile defaults, stream sniffing patterns and the
//! markers used by the related-parts normalization.

/// Quality label used when the source does not advertise one
pub const DEFAULT_QUALITY: &str = "auto";

/// Placeholder in bundled scripts replaced with the page to visit
pub const TARGET_URL_PLACEHOLDER: &str = "__TARGET_URL__";

/// Header forced onto every sniffed stream
pub const REFERER_HEADER: &str = "referer";

/// Reference site profile, used when no profile file is configured
pub mod site {
    pub const SITE_NAME: &str = "hhhtq";
    pub const BASE_URL: &str = "https://hhhtq.team";

    pub const HOT_SECTION: &str = "#index-hot";
    pub const HOT_MOVIE_BOX: &str = ".myui-vodlist__box";
    pub const CATEGORY_PANEL: &str = ".myui-panel.myui-panel-bg";
    pub const CATEGORY_TITLE: &str = "h3";
    pub const CATEGORY_MOVIE_BOX: &str = ".myui-vodlist__box";
    pub const ITEM_THUMB: &str = ".myui-vodlist__thumb";

    pub const DETAIL_TITLE: &str = "h1.title";
    pub const DETAIL_TITLE_CLEANUP: &str = "lượt xem";
    pub const DETAIL_DESCRIPTION: &str = "#desc > div > div > div > span.sketch.content";
    pub const DETAIL_VIEW_COUNT: &str = "body > div.container > div:nth-child(1) > div > div.myui-content__detail > h1:nth-child(3)";
    pub const DETAIL_PLOT: &str = ".myui-content__detail p";
    pub const DETAIL_PLOT_MARKER: &str = "Nội dung";
    pub const DETAIL_THUMBS: &[&str] = &[".myui-vodlist__thumb img", ".myui-content__thumb img"];
    pub const DETAIL_YEAR_MARKER: &str = "Năm";
    pub const DETAIL_PLAYLIST: &str = "#playlist1";

    pub const EPISODE_LIST: &str = "li a";
    pub const EPISODE_TITLE_INNER: &str = "b";

    pub const SEASON_LIST: &str = ".list-episode";
    pub const SEASON_LINK: &str = "a";
    pub const SERVER_TITLE: &str = ".title";
}

/// Related-parts normalization
pub mod related {
    /// Link count (or distinct label count) that the reference site emits
    /// when a title has no real related parts. It is a pagination artifact
    /// of that site's markup and may not hold for other profiles.
    pub const NO_GROUPS_SENTINEL: usize = 10;

    /// Label of the single item left when a block has no real parts
    pub const PLACEHOLDER_LABEL: &str = "Không có phần liên quan";

    pub const PART_PREFIX: &str = "Phần";
    pub const OVA_PREFIX: &str = "OVA";
}

/// Stream sniffing
pub mod sniff {
    /// Fragments marking a captured URL as HLS
    pub const HLS_MARKER: &str = ".m3u8";

    /// Fragments marking a captured URL as DASH
    pub const DASH_MARKER: &str = ".mpd";

    /// Iframe sources that never host the player
    pub const EXCLUDED_FRAME_HOSTS: &[&str] = &["cloudflare", "recaptcha", "google", "chat"];

    /// Minimum on-screen size (CSS pixels) for an iframe to count as the player
    pub const MIN_PLAYER_WIDTH: f64 = 300.0;
    pub const MIN_PLAYER_HEIGHT: f64 = 200.0;

    /// Content type expected by the automation endpoint for raw scripts
    pub const JAVASCRIPT_CONTENT_TYPE: &str = "application/javascript";

    pub const STREAM_SNIFFER_SCRIPT: &str = "stream-sniffer.js";
    pub const IFRAME_EXTRACTOR_SCRIPT: &str = "iframe-extractor.js";
}

/// Stream cache
pub mod cache {
    /// Freshness window for a cached resolution
    pub const DEFAULT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

    pub const KEY_PREFIX: &str = "stream_";
    pub const KEY_EXTENSION: &str = "json";

    /// Hex characters of the URL digest kept in the file name
    pub const KEY_DIGEST_LEN: usize = 16;

    pub const DEFAULT_DIR_NAME: &str = "stream_finder_cache";
}
