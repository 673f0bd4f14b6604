//! OpenAI-backed summarizer and ranker (Chat Completions API).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::{Ranker, Summarizer};
use crate::config::{Profile, Settings};
use crate::types::{Digest, DigestDraft, RankedArticle, SourceKind};

const DIGEST_SYSTEM_PROMPT: &str = "You are an expert AI technical analyst. You synthesize complex inputs (research papers, technical blogs, video transcripts) into high-signal executive digests for a technical audience.\n\
Respond with a single JSON object: {\"title\": \"...\", \"summary\": \"...\"}.\n\
- title: a punchy, objectively phrased headline (5-10 words).\n\
- summary: a concise 2-3 sentence paragraph capturing the core innovation or news, ending with one sentence on why it matters to the industry.\n\
Tone: professional, objective, authoritative; use correct technical terminology. If the input is a transcript, ignore conversational filler.\n\
Never use clickbait or hype words, never start with meta-phrases like \"This article discusses\", no hashtags, no emojis.";

const RANK_SYSTEM_PROMPT: &str = "You are a news curator ranking digests for one reader. You receive the reader's profile and a list of digests.\n\
Respond with a single JSON object: {\"rankings\": [{\"digest_id\": \"...\", \"rank\": 1, \"relevance_score\": 8.5, \"reasoning\": \"...\"}]}.\n\
- Include every digest exactly once; ranks must be 1..N with no gaps or duplicates, rank 1 being the most relevant.\n\
- relevance_score is 0.0-10.0 against the reader's interests.\n\
- reasoning is one short sentence.";

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: String,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("ai-news-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: settings.openai_api_key.clone(),
            model: settings.model.clone(),
        }
    }

    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Option<String> {
        if self.api_key.is_empty() {
            return None;
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.7,
            max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let resp = match self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = ?e, "completion request failed");
                return None;
            }
        };

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "completion request rejected");
            return None;
        }

        let body: Resp = resp.json().await.ok()?;
        body.choices.into_iter().next().map(|c| c.message.content)
    }
}

#[async_trait]
impl Summarizer for OpenAiClient {
    async fn summarize(
        &self,
        title: &str,
        content: &str,
        kind: SourceKind,
    ) -> Option<DigestDraft> {
        let user = format!("Create a digest for this {kind}:\nTitle: {title}\nContent: {content}");
        let raw = self.complete(DIGEST_SYSTEM_PROMPT, &user, 500).await?;
        parse_digest(&raw)
    }
}

#[async_trait]
impl Ranker for OpenAiClient {
    async fn rank(&self, profile: &Profile, digests: &[Digest]) -> Option<Vec<RankedArticle>> {
        #[derive(Serialize)]
        struct DigestPayload<'a> {
            digest_id: &'a str,
            title: &'a str,
            summary: &'a str,
        }

        let payload: Vec<DigestPayload> = digests
            .iter()
            .map(|d| DigestPayload {
                digest_id: &d.id,
                title: &d.title,
                summary: &d.summary,
            })
            .collect();

        let user = format!(
            "Reader profile:\nName: {}\nBackground: {}\nInterests: {}\n\nDigests:\n{}",
            profile.name,
            profile.background,
            profile.interests.join(", "),
            serde_json::to_string_pretty(&payload).ok()?,
        );

        let raw = self.complete(RANK_SYSTEM_PROMPT, &user, 2000).await?;
        parse_rankings(&raw)
    }
}

fn parse_digest(raw: &str) -> Option<DigestDraft> {
    let draft: DigestDraft = match serde_json::from_str(raw) {
        Ok(d) => d,
        Err(e) => {
            warn!(error = ?e, "digest response was not the expected json");
            return None;
        }
    };
    if draft.title.trim().is_empty() || draft.summary.trim().is_empty() {
        return None;
    }
    Some(draft)
}

fn parse_rankings(raw: &str) -> Option<Vec<RankedArticle>> {
    #[derive(Deserialize)]
    struct Rankings {
        rankings: Vec<RankedArticle>,
    }

    match serde_json::from_str::<Rankings>(raw) {
        Ok(r) => Some(r.rankings),
        Err(e) => {
            warn!(error = ?e, "ranking response was not the expected json");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_json_parses() {
        let raw = r#"{"title": "Model compresses context", "summary": "Two sentences. So what."}"#;
        let draft = parse_digest(raw).unwrap();
        assert_eq!(draft.title, "Model compresses context");
    }

    #[test]
    fn blank_or_malformed_digest_is_rejected() {
        assert!(parse_digest(r#"{"title": " ", "summary": "x"}"#).is_none());
        assert!(parse_digest("not json at all").is_none());
    }

    #[test]
    fn rankings_json_parses() {
        let raw = r#"{"rankings": [
            {"digest_id": "article:a", "rank": 1, "relevance_score": 9.0, "reasoning": "core interest"},
            {"digest_id": "video:b", "rank": 2, "relevance_score": 6.5, "reasoning": "adjacent"}
        ]}"#;
        let ranked = parse_rankings(raw).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].digest_id, "article:a");
        assert_eq!(ranked[1].rank, 2);
    }

    #[test]
    fn malformed_rankings_are_rejected() {
        assert!(parse_rankings(r#"{"rankings": "nope"}"#).is_none());
    }
}
