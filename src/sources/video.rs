//! Video channel adapter: parses a channel's Atom `videos.xml` feed.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::debug;

use super::{scrub_html, SourceAdapter};
use crate::types::{RawItem, SourceKind};

// quick-xml strips namespace prefixes; elements are matched by local name.
#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    published: Option<String>,
    #[serde(rename = "group")]
    media: Option<MediaGroup>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@href")]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaGroup {
    #[serde(rename = "description")]
    description: Option<String>,
}

fn parse_rfc3339_utc(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts, &Rfc3339).ok()?;
    DateTime::from_timestamp(dt.unix_timestamp(), 0)
}

/// Pull the video id out of a watch URL when the feed omits `yt:videoId`.
fn extract_video_id(url: &str) -> Option<String> {
    for marker in ["watch?v=", "youtu.be/", "shorts/"] {
        if let Some(pos) = url.find(marker) {
            let tail = &url[pos + marker.len()..];
            let id = tail
                .split(['&', '?', '#'])
                .next()
                .unwrap_or_default();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

pub struct ChannelAdapter {
    name: String,
    channel_id: String,
    mode: Mode,
}

enum Mode {
    Http { client: reqwest::Client },
    Fixture(String),
}

impl ChannelAdapter {
    pub fn from_channel_id(channel_id: &str, client: reqwest::Client) -> Self {
        Self {
            name: format!("youtube:{channel_id}"),
            channel_id: channel_id.to_string(),
            mode: Mode::Http { client },
        }
    }

    pub fn from_fixture(channel_id: &str, xml: &str) -> Self {
        Self {
            name: format!("youtube:{channel_id}"),
            channel_id: channel_id.to_string(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn feed_url(&self) -> String {
        format!(
            "https://www.youtube.com/feeds/videos.xml?channel_id={}",
            self.channel_id
        )
    }

    fn parse_entries(&self, xml: &str, since: DateTime<Utc>) -> Result<Vec<RawItem>> {
        let feed: AtomFeed =
            from_str(xml).with_context(|| format!("parsing atom feed for {}", self.name))?;

        let mut out = Vec::with_capacity(feed.entries.len());
        for entry in feed.entries {
            let link = entry
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .and_then(|l| l.href.clone())
                .unwrap_or_default();

            // Shorts are noise for a digest.
            if link.contains("/shorts/") {
                continue;
            }

            let published = match entry.published.as_deref().and_then(parse_rfc3339_utc) {
                Some(ts) => ts,
                None => {
                    debug!(channel = %self.name, "entry without parsable published, skipping");
                    continue;
                }
            };
            if published < since {
                continue;
            }

            let video_id = match entry.video_id.or_else(|| extract_video_id(&link)) {
                Some(id) => id,
                None => {
                    debug!(channel = %self.name, link = %link, "entry without video id, skipping");
                    continue;
                }
            };

            out.push(RawItem {
                kind: SourceKind::Video,
                natural_id: video_id,
                title: scrub_html(&entry.title.unwrap_or_default()),
                url: link,
                description: scrub_html(
                    &entry.media.and_then(|m| m.description).unwrap_or_default(),
                ),
                category: None,
                published_at: published,
                derived_content: None,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for ChannelAdapter {
    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<RawItem>> {
        match &self.mode {
            Mode::Fixture(xml) => self.parse_entries(xml, since),
            Mode::Http { client } => {
                let url = self.feed_url();
                let body = client
                    .get(&url)
                    .send()
                    .await
                    .and_then(|resp| resp.error_for_status())
                    .with_context(|| format!("fetching channel feed {}", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("reading channel feed body for {}", self.name))?;
                self.parse_entries(&body, since)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
