//! Automation script templates
//!
//! Both scripts are bundled into the binary. A script directory can override
//! either of them without a rebuild; files missing from it fall back to the
//! bundled copy.

use std::io::ErrorKind;
use std::path::Path;

use tracing::info;

use super::SnifferError;
use crate::constants::sniff::{IFRAME_EXTRACTOR_SCRIPT, STREAM_SNIFFER_SCRIPT};
use crate::constants::TARGET_URL_PLACEHOLDER;

const BUNDLED_STREAM_SNIFFER: &str = include_str!("../../resources/scripts/stream-sniffer.js");
const BUNDLED_IFRAME_EXTRACTOR: &str = include_str!("../../resources/scripts/iframe-extractor.js");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptTemplates {
    stream_sniffer: String,
    iframe_extractor: String,
}

impl ScriptTemplates {
    pub fn bundled() -> Self {
        Self {
            stream_sniffer: BUNDLED_STREAM_SNIFFER.to_string(),
            iframe_extractor: BUNDLED_IFRAME_EXTRACTOR.to_string(),
        }
    }

    /// Templates from `dir`, bundled copies for files it does not contain
    pub async fn load(dir: &Path) -> Result<Self, SnifferError> {
        Ok(Self {
            stream_sniffer: load_one(dir, STREAM_SNIFFER_SCRIPT, BUNDLED_STREAM_SNIFFER).await?,
            iframe_extractor: load_one(dir, IFRAME_EXTRACTOR_SCRIPT, BUNDLED_IFRAME_EXTRACTOR)
                .await?,
        })
    }

    /// Stream sniff script aimed at `target_url`
    pub fn stream_sniffer(&self, target_url: &str) -> String {
        render(&self.stream_sniffer, target_url)
    }

    /// Iframe extraction script aimed at `target_url`
    pub fn iframe_extractor(&self, target_url: &str) -> String {
        render(&self.iframe_extractor, target_url)
    }
}

async fn load_one(dir: &Path, name: &str, bundled: &str) -> Result<String, SnifferError> {
    let path = dir.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(script) => {
            info!("Loaded script override {}", path.display());
            Ok(script)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(bundled.to_string()),
        Err(source) => Err(SnifferError::Script {
            name: path.display().to_string(),
            source,
        }),
    }
}

/// Substitute the target into a template. The placeholder sits inside a
/// single-quoted JS string literal.
fn render(template: &str, target_url: &str) -> String {
    let escaped = target_url.replace('\\', "\\\\").replace('\'', "\\'");
    template.replace(TARGET_URL_PLACEHOLDER, &escaped)
}
