// src/enrich/article.rs
//! Fetches an article's page and converts it to readable text.

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{ContentFetcher, FetchOutcome};
use crate::types::RawItem;

pub struct ArticleFetcher {
    client: reqwest::Client,
}

impl ArticleFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentFetcher for ArticleFetcher {
    async fn fetch(&self, item: &RawItem) -> Result<FetchOutcome> {
        let html = self
            .client
            .get(&item.url)
            .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .with_context(|| format!("fetching article {}", item.url))?
            .text()
            .await
            .with_context(|| format!("reading article body {}", item.url))?;

        let text = html2text::from_read(html.as_bytes(), 80);
        if text.trim().is_empty() {
            return Ok(FetchOutcome::Absent);
        }
        Ok(FetchOutcome::Content(text))
    }

    fn stage_name(&self) -> &'static str {
        "article-body"
    }
}
