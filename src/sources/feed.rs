//! RSS article feed adapter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use tracing::debug;

use super::{scrub_entities_for_xml, scrub_html, SourceAdapter};
use crate::types::{RawItem, SourceKind};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
}

// guid and category carry attributes in the wild (isPermaLink, domain).
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "@isPermaLink")]
    _is_perma_link: Option<String>,
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@domain")]
    _domain: Option<String>,
    #[serde(rename = "$text")]
    value: Option<String>,
}

fn parse_rfc2822_utc(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts, &Rfc2822).ok()?;
    DateTime::from_timestamp(dt.unix_timestamp(), 0)
}

pub struct FeedAdapter {
    name: String,
    mode: Mode,
}

enum Mode {
    Http { url: String, client: reqwest::Client },
    Fixture(String),
}

impl FeedAdapter {
    pub fn from_url(name: &str, url: &str, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }

    pub fn from_fixture(name: &str, xml: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    fn parse_items(&self, xml: &str, since: DateTime<Utc>) -> Result<Vec<RawItem>> {
        let xml_clean = scrub_entities_for_xml(xml);
        let rss: Rss =
            from_str(&xml_clean).with_context(|| format!("parsing rss for {}", self.name))?;

        let mut out = Vec::with_capacity(rss.channel.items.len());
        for it in rss.channel.items {
            let published = match it.pub_date.as_deref().and_then(parse_rfc2822_utc) {
                Some(ts) => ts,
                None => {
                    debug!(feed = %self.name, "entry without parsable pubDate, skipping");
                    continue;
                }
            };
            if published < since {
                continue;
            }

            let link = it.link.unwrap_or_default();
            let natural_id = it
                .guid
                .and_then(|g| g.value)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| link.clone());
            if natural_id.is_empty() {
                debug!(feed = %self.name, "entry without guid or link, skipping");
                continue;
            }

            out.push(RawItem {
                kind: SourceKind::Article,
                natural_id,
                title: scrub_html(&it.title.unwrap_or_default()),
                url: link,
                description: scrub_html(&it.description.unwrap_or_default()),
                category: it
                    .categories
                    .into_iter()
                    .find_map(|c| c.value)
                    .filter(|v| !v.is_empty()),
                published_at: published,
                derived_content: None,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    async fn fetch(&self, since: DateTime<Utc>) -> Result<Vec<RawItem>> {
        match &self.mode {
            Mode::Fixture(xml) => self.parse_items(xml, since),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|resp| resp.error_for_status())
                    .with_context(|| format!("fetching feed {}", self.name))?
                    .text()
                    .await
                    .with_context(|| format!("reading feed body for {}", self.name))?;
                self.parse_items(&body, since)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
