use anyhow::{Context, Result};
use axum::body::Bytes;
use reqwest::Url;
use serde::de::IgnoredAny;

pub const USGS_FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_week.geojson";

/// Client for the upstream earthquake feed.
#[derive(Clone)]
pub struct FeedClient {
    url: Url,
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }

    pub fn usgs() -> Result<Self> {
        let url = Url::parse(USGS_FEED_URL).context("invalid upstream feed url")?;
        Ok(Self::new(url))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetches the feed and returns the body exactly as received. The body is
    /// checked to be JSON but never re-serialized.
    pub async fn fetch(&self) -> Result<Bytes> {
        let body = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?
            .error_for_status()
            .context("upstream returned an error status")?
            .bytes()
            .await
            .context("failed to read upstream body")?;

        serde_json::from_slice::<IgnoredAny>(&body)
            .context("upstream body is not valid json")?;

        Ok(body)
    }
}
