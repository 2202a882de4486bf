//! Stream sniffing through a remote headless-browser endpoint
//!
//! The endpoint accepts a script, runs it in a real browser and returns the
//! script's result. Two scripts are used: one records media responses while a
//! page plays, the other reports the iframes embedded in a page so the player
//! frame can be picked. Nothing raises past this module: failures are logged
//! and become an empty list or `None`.

mod decode;
mod scripts;

pub use decode::{
    choose_player_frame, classify_stream_url, decode_iframe_response, decode_sniff_response,
    to_stream_sources, FrameCandidate, IframeOutcome, IframeReport, SniffOutcome, SniffedStream,
};
pub use scripts::ScriptTemplates;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::constants::sniff::JAVASCRIPT_CONTENT_TYPE;
use crate::models::StreamSource;

/// Errors talking to the automation endpoint
#[derive(Error, Debug)]
pub enum SnifferError {
    #[error("Request to automation endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Automation endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to load script template {name}: {source}")]
    Script {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Stream resolution consumed by the stream facade
#[async_trait]
pub trait StreamSniffer: Send + Sync {
    /// Find the player frame of `episode_url` and sniff the streams it loads
    async fn sniff_stream_via_iframe(&self, episode_url: &str) -> Vec<StreamSource>;
}

#[derive(Serialize)]
struct FunctionRequest<'a> {
    code: &'a str,
}

/// Client for a browserless-style `/function` endpoint
pub struct BrowserlessSniffer {
    client: Client,
    endpoint: String,
    api_key: String,
    scripts: ScriptTemplates,
}

impl BrowserlessSniffer {
    /// Sniffer with the bundled scripts and a two minute request timeout
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_scripts(endpoint, api_key, ScriptTemplates::bundled())
    }

    pub fn with_scripts(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        scripts: ScriptTemplates,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            scripts,
        }
    }

    fn post(&self) -> RequestBuilder {
        let request = self.client.post(&self.endpoint).header(ACCEPT, "*/*");
        if self.api_key.trim().is_empty() {
            request
        } else {
            request.query(&[("token", self.api_key.as_str())])
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, SnifferError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SnifferError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn try_sniff_stream(&self, target_url: &str) -> Result<Vec<StreamSource>, SnifferError> {
        let code = self.scripts.stream_sniffer(target_url);
        debug!("Sending sniff request for {} to {}", target_url, self.endpoint);

        let body = self.send(self.post().json(&FunctionRequest { code: &code })).await?;
        let sources = to_stream_sources(decode_sniff_response(&body), target_url);

        for source in &sources {
            info!("Found stream URL: {} ({})", source.url, source.stream_type);
            debug!("Stream headers: {:?}", source.headers);
        }
        Ok(sources)
    }

    /// Media URLs the page at `target_url` requests while it plays
    ///
    /// Every source carries `referer: target_url`.
    pub async fn sniff_stream(&self, target_url: &str) -> Vec<StreamSource> {
        match self.try_sniff_stream(target_url).await {
            Ok(sources) => sources,
            Err(e) => {
                error!("Error sniffing stream from {}: {}", target_url, e);
                Vec::new()
            }
        }
    }

    async fn try_extract_iframe(&self, target_url: &str) -> Result<Option<String>, SnifferError> {
        let code = self.scripts.iframe_extractor(target_url);
        debug!("Sending iframe extraction request for {} to {}", target_url, self.endpoint);

        let request = self
            .post()
            .header(CONTENT_TYPE, JAVASCRIPT_CONTENT_TYPE)
            .body(code);
        let body = self.send(request).await?;

        Ok(match decode_iframe_response(&body) {
            IframeOutcome::Report(report) => choose_player_frame(&report),
            IframeOutcome::Url(url) => Some(url),
            IframeOutcome::Empty => None,
        })
    }

    /// URL of the player frame embedded in `target_url`
    pub async fn extract_iframe(&self, target_url: &str) -> Option<String> {
        match self.try_extract_iframe(target_url).await {
            Ok(Some(url)) => {
                info!("Found iframe URL: {}", url);
                Some(url)
            }
            Ok(None) => None,
            Err(e) => {
                error!("Error extracting iframe from {}: {}", target_url, e);
                None
            }
        }
    }
}

#[async_trait]
impl StreamSniffer for BrowserlessSniffer {
    async fn sniff_stream_via_iframe(&self, episode_url: &str) -> Vec<StreamSource> {
        match self.extract_iframe(episode_url).await {
            Some(iframe_url) => {
                info!("Sniffing stream from iframe {} of {}", iframe_url, episode_url);
                self.sniff_stream(&iframe_url).await
            }
            None => {
                warn!("No iframe found on {}", episode_url);
                Vec::new()
            }
        }
    }
}
