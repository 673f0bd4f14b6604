// src/sources/mod.rs
pub mod feed;
pub mod video;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;

use crate::config::Settings;
use crate::types::RawItem;

/// Capability interface implemented per source kind. An empty batch is a
/// valid result; `Err` means transport failure for this source only.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<RawItem>>;
    fn name(&self) -> &str;
}

/// Build the adapter registry from configuration: one adapter per article
/// feed, one per video channel.
pub fn build_adapters(settings: &Settings, client: &reqwest::Client) -> Vec<Box<dyn SourceAdapter>> {
    let mut adapters: Vec<Box<dyn SourceAdapter>> = Vec::new();
    for spec in &settings.feeds {
        adapters.push(Box::new(feed::FeedAdapter::from_url(
            &spec.name,
            &spec.url,
            client.clone(),
        )));
    }
    for channel_id in &settings.video_channels {
        adapters.push(Box::new(video::ChannelAdapter::from_channel_id(
            channel_id,
            client.clone(),
        )));
    }
    adapters
}

/// Normalize feed-provided text: decode HTML entities, strip tags, collapse
/// whitespace, cap length.
pub(crate) fn scrub_html(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }
    out
}

/// Named entities that trip strict XML parsers in real-world feeds.
pub(crate) fn scrub_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
