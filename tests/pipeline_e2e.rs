// tests/pipeline_e2e.rs
// Drives the whole pipeline against fixture feeds and scripted
// collaborators: scrape -> dedupe/store -> enrich -> summarize -> rank ->
// compose -> deliver.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ai_news_digest::config::Profile;
use ai_news_digest::enrich::{ContentFetcher, FetchOutcome};
use ai_news_digest::llm::{Ranker, Summarizer};
use ai_news_digest::notify::Delivery;
use ai_news_digest::pipeline::Pipeline;
use ai_news_digest::sources::{feed::FeedAdapter, video::ChannelAdapter, SourceAdapter};
use ai_news_digest::store::ItemStore;
use ai_news_digest::types::{Digest, DigestDraft, RankedArticle, RawItem, SourceKind};

const ARTICLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Vendor News</title>
    <item>
      <title>Context caching lands</title>
      <link>https://example.com/a1</link>
      <guid>a1</guid>
      <pubDate>Mon, 02 Jun 2025 09:00:00 GMT</pubDate>
      <description>Cache hits for long prompts.</description>
    </item>
    <item>
      <title>Evals get a harness</title>
      <link>https://example.com/a2</link>
      <guid>a2</guid>
      <pubDate>Mon, 02 Jun 2025 10:00:00 GMT</pubDate>
      <description>A new eval harness ships.</description>
    </item>
    <item>
      <title>Flaky launch post</title>
      <link>https://example.com/a3</link>
      <guid>a3</guid>
      <pubDate>Mon, 02 Jun 2025 11:00:00 GMT</pubDate>
      <description>Summarization will trip on this one.</description>
    </item>
  </channel>
</rss>"#;

const VIDEOS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <yt:videoId>v1</yt:videoId>
    <title>Scaling talk</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=v1"/>
    <published>2025-06-02T08:00:00+00:00</published>
    <media:group><media:description>A talk on scaling laws.</media:description></media:group>
  </entry>
  <entry>
    <yt:videoId>v2</yt:videoId>
    <title>Captionless interview</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=v2"/>
    <published>2025-06-02T09:30:00+00:00</published>
    <media:group><media:description>An interview with no captions.</media:description></media:group>
  </entry>
  <entry>
    <yt:videoId>v3</yt:videoId>
    <title>Some short</title>
    <link rel="alternate" href="https://www.youtube.com/shorts/v3"/>
    <published>2025-06-02T10:00:00+00:00</published>
  </entry>
</feed>"#;

// Window wide enough to cover the fixture dates regardless of "now".
const WINDOW_HOURS: i64 = 24 * 365 * 50;

struct ScriptedArticleFetcher;

#[async_trait]
impl ContentFetcher for ScriptedArticleFetcher {
    async fn fetch(&self, item: &RawItem) -> Result<FetchOutcome> {
        Ok(FetchOutcome::Content(format!("full body of {}", item.natural_id)))
    }
    fn stage_name(&self) -> &'static str {
        "article-body"
    }
}

struct ScriptedTranscriptFetcher;

#[async_trait]
impl ContentFetcher for ScriptedTranscriptFetcher {
    async fn fetch(&self, item: &RawItem) -> Result<FetchOutcome> {
        match item.natural_id.as_str() {
            "v2" => Ok(FetchOutcome::Absent),
            id => Ok(FetchOutcome::Content(format!("transcript of {id}"))),
        }
    }
    fn stage_name(&self) -> &'static str {
        "video-transcript"
    }
}

struct ScriptedSummarizer {
    calls: AtomicUsize,
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(
        &self,
        title: &str,
        content: &str,
        _kind: SourceKind,
    ) -> Option<DigestDraft> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(!content.is_empty(), "summarizer must never see empty content");
        if title.contains("Flaky") {
            return None;
        }
        Some(DigestDraft {
            title: format!("digest: {title}"),
            summary: format!("Summary built from: {}", &content[..content.len().min(40)]),
        })
    }
}

struct OrderRanker;

#[async_trait]
impl Ranker for OrderRanker {
    async fn rank(&self, _profile: &Profile, digests: &[Digest]) -> Option<Vec<RankedArticle>> {
        Some(
            digests
                .iter()
                .enumerate()
                .map(|(i, d)| RankedArticle {
                    digest_id: d.id.clone(),
                    rank: (i + 1) as u32,
                    relevance_score: 9.0 - i as f64,
                    reasoning: "matches interests".to_string(),
                })
                .collect(),
        )
    }
}

#[derive(Default)]
struct RecordingDelivery {
    fail: bool,
    sent: Mutex<Vec<(String, String)>>, // (subject, text body)
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn send(
        &self,
        subject: &str,
        text_body: &str,
        _html_body: &str,
        recipients: &[String],
    ) -> Result<()> {
        assert!(!recipients.is_empty());
        if self.fail {
            bail!("smtp refused the message");
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), text_body.to_string()));
        Ok(())
    }
}

fn profile() -> Profile {
    Profile {
        name: "Alex".into(),
        background: "ML engineer".into(),
        interests: vec!["agents".into(), "inference".into()],
    }
}

fn adapters() -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(FeedAdapter::from_fixture("vendor-news", ARTICLES_XML)),
        Box::new(ChannelAdapter::from_fixture("UCtest", VIDEOS_XML)),
        // A broken source must cost only itself, not the run.
        Box::new(FeedAdapter::from_fixture("broken-feed", "<rss><chan")),
    ]
}

fn pipeline(store: ItemStore, delivery: Arc<RecordingDelivery>) -> Pipeline {
    Pipeline::new(
        store,
        adapters(),
        Arc::new(ScriptedArticleFetcher),
        Arc::new(ScriptedTranscriptFetcher),
        Arc::new(ScriptedSummarizer {
            calls: AtomicUsize::new(0),
        }),
        Arc::new(OrderRanker),
        delivery,
        profile(),
        vec!["reader@example.com".to_string()],
        4,
    )
}

#[tokio::test]
async fn full_run_delivers_top_n_despite_partial_failures() {
    let store = ItemStore::connect("sqlite::memory:").await.unwrap();
    let delivery = Arc::new(RecordingDelivery::default());
    let pipe = pipeline(store.clone(), delivery.clone());

    let report = pipe.run(WINDOW_HOURS, 3).await;

    // 3 articles + 2 videos ingested; the short and the broken feed cost
    // nothing.
    assert_eq!(report.stored_new, 5);
    assert_eq!(report.scraped.get("broken-feed"), Some(&0));

    assert_eq!(report.articles_enriched.total, 3);
    assert_eq!(report.articles_enriched.processed, 3);
    assert_eq!(report.videos_enriched.total, 2);
    assert_eq!(report.videos_enriched.processed, 1);
    assert_eq!(report.videos_enriched.unavailable, 1);

    // All five items are eligible (the captionless video via its description
    // fallback); one summarization fails and stays eligible for next run.
    assert_eq!(report.digests.total, 5);
    assert_eq!(report.digests.processed, 4);
    assert_eq!(report.digests.failed, 1);
    assert_eq!(store.count_digests().await.unwrap(), 4);

    assert_eq!(report.ranked, 4);
    assert_eq!(report.delivered, 3);
    assert!(report.success);
    assert!(report.error.is_none());

    let sent = delivery.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (_subject, body) = &sent[0];
    assert!(body.contains("1. "));
    assert!(body.contains("Hi Alex,"));
    // Only the top 3 of 4 ranked digests made it in.
    assert_eq!(body.matches("Read more:").count(), 3);
}

#[tokio::test]
async fn second_run_is_idempotent_and_only_retries_failures() {
    let store = ItemStore::connect("sqlite::memory:").await.unwrap();
    let delivery = Arc::new(RecordingDelivery::default());

    let first = pipeline(store.clone(), delivery.clone())
        .run(WINDOW_HOURS, 3)
        .await;
    assert_eq!(first.stored_new, 5);

    let second = pipeline(store.clone(), delivery.clone())
        .run(WINDOW_HOURS, 3)
        .await;

    // Same window, nothing new: no duplicate rows, no re-enrichment, only
    // the failed summarization is retried.
    assert_eq!(second.stored_new, 0);
    assert_eq!(store.count_items().await.unwrap(), 5);
    assert_eq!(second.articles_enriched.total, 0);
    assert_eq!(second.videos_enriched.total, 0);
    assert_eq!(second.digests.total, 1);
    assert_eq!(second.digests.failed, 1);
    assert_eq!(store.count_digests().await.unwrap(), 4);
    assert!(second.success);
}

#[tokio::test]
async fn delivery_failure_fails_the_run_even_when_stages_succeeded() {
    let store = ItemStore::connect("sqlite::memory:").await.unwrap();
    let delivery = Arc::new(RecordingDelivery {
        fail: true,
        ..Default::default()
    });

    let report = pipeline(store.clone(), delivery).run(WINDOW_HOURS, 3).await;

    assert!(!report.success);
    let err = report.error.expect("error must be recorded");
    assert!(err.contains("delivering email digest"), "got: {err}");

    // Durable writes from earlier stages survive the failed delivery.
    assert_eq!(store.count_items().await.unwrap(), 5);
    assert_eq!(store.count_digests().await.unwrap(), 4);
}
