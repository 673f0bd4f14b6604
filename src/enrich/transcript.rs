// src/enrich/transcript.rs
//! Fetches a video's caption track and flattens it into one transcript
//! string. A missing track is a fact about the video, not an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use serde::Deserialize;

use super::{ContentFetcher, FetchOutcome};
use crate::types::RawItem;

#[derive(Debug, Deserialize)]
struct TranscriptXml {
    #[serde(rename = "text", default)]
    lines: Vec<Line>,
}

#[derive(Debug, Deserialize)]
struct Line {
    #[serde(rename = "@start")]
    _start: Option<String>,
    #[serde(rename = "@dur")]
    _dur: Option<String>,
    #[serde(rename = "$text")]
    body: Option<String>,
}

pub struct TranscriptFetcher {
    client: reqwest::Client,
    lang: String,
}

impl TranscriptFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            lang: "en".to_string(),
        }
    }

    fn track_url(&self, video_id: &str) -> String {
        format!(
            "https://video.google.com/timedtext?lang={}&v={}",
            self.lang, video_id
        )
    }

    fn flatten(xml: &str) -> Result<Option<String>> {
        let parsed: TranscriptXml = from_str(xml).context("parsing caption track xml")?;
        let joined = parsed
            .lines
            .into_iter()
            .filter_map(|line| line.body)
            .map(|text| html_escape::decode_html_entities(&text).into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
        let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
        let flat = re_ws.replace_all(&joined, " ").trim().to_string();

        Ok(if flat.is_empty() { None } else { Some(flat) })
    }
}

#[async_trait]
impl ContentFetcher for TranscriptFetcher {
    async fn fetch(&self, item: &RawItem) -> Result<FetchOutcome> {
        let url = self.track_url(&item.natural_id);
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .with_context(|| format!("fetching caption track for {}", item.natural_id))?
            .text()
            .await
            .with_context(|| format!("reading caption track for {}", item.natural_id))?;

        // The endpoint answers 200 with an empty body when no track exists.
        if body.trim().is_empty() {
            return Ok(FetchOutcome::Absent);
        }

        match Self::flatten(&body)? {
            Some(transcript) => Ok(FetchOutcome::Content(transcript)),
            None => Ok(FetchOutcome::Absent),
        }
    }

    fn stage_name(&self) -> &'static str {
        "video-transcript"
    }
}
