//! Pipeline orchestration: five sequential stages, one run report.
//!
//! Stages never branch on each other's partial failures; the only abort
//! path is an uncaught stage error, which stops forward progress but keeps
//! every per-item write already committed. The run counts as successful iff
//! the final delivery succeeded.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::compose;
use crate::config::Profile;
use crate::curate;
use crate::enrich::{self, ContentFetcher, EnrichReport};
use crate::llm::{Ranker, Summarizer};
use crate::notify::Delivery;
use crate::sources::SourceAdapter;
use crate::store::ItemStore;
use crate::summarize::{self, DigestReport};
use crate::types::SourceKind;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Items fetched per source, in source registration order.
    pub scraped: BTreeMap<String, usize>,
    pub stored_new: usize,
    pub articles_enriched: EnrichReport,
    pub videos_enriched: EnrichReport,
    pub digests: DigestReport,
    pub digests_in_window: usize,
    pub ranked: usize,
    pub delivered: usize,
    pub success: bool,
    pub error: Option<String>,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            duration_secs: 0.0,
            scraped: BTreeMap::new(),
            stored_new: 0,
            articles_enriched: EnrichReport::default(),
            videos_enriched: EnrichReport::default(),
            digests: DigestReport::default(),
            digests_in_window: 0,
            ranked: 0,
            delivered: 0,
            success: false,
            error: None,
        }
    }
}

pub struct Pipeline {
    store: ItemStore,
    adapters: Vec<Box<dyn SourceAdapter>>,
    article_fetcher: Arc<dyn ContentFetcher>,
    transcript_fetcher: Arc<dyn ContentFetcher>,
    summarizer: Arc<dyn Summarizer>,
    ranker: Arc<dyn Ranker>,
    delivery: Arc<dyn Delivery>,
    profile: Profile,
    recipients: Vec<String>,
    transcript_concurrency: usize,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: ItemStore,
        adapters: Vec<Box<dyn SourceAdapter>>,
        article_fetcher: Arc<dyn ContentFetcher>,
        transcript_fetcher: Arc<dyn ContentFetcher>,
        summarizer: Arc<dyn Summarizer>,
        ranker: Arc<dyn Ranker>,
        delivery: Arc<dyn Delivery>,
        profile: Profile,
        recipients: Vec<String>,
        transcript_concurrency: usize,
    ) -> Self {
        Self {
            store,
            adapters,
            article_fetcher,
            transcript_fetcher,
            summarizer,
            ranker,
            delivery,
            profile,
            recipients,
            transcript_concurrency,
        }
    }

    /// Run the whole pipeline once. Never panics outward; any stage error
    /// ends up as `error` on the report with `success == false`.
    pub async fn run(&self, hours: i64, top_n: usize) -> RunReport {
        let started_at = Utc::now();
        let mut report = RunReport::new(started_at);

        info!("starting daily digest pipeline (window {hours}h, top {top_n})");

        if let Err(e) = self.run_inner(hours, top_n, &mut report).await {
            error!(error = ?e, "pipeline aborted");
            report.error = Some(format!("{e:#}"));
            report.success = false;
        }

        report.finished_at = Utc::now();
        report.duration_secs =
            (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;

        info!(
            duration_secs = report.duration_secs,
            stored_new = report.stored_new,
            digests = report.digests.processed,
            delivered = report.delivered,
            success = report.success,
            "pipeline finished"
        );
        report
    }

    async fn run_inner(
        &self,
        hours: i64,
        top_n: usize,
        report: &mut RunReport,
    ) -> Result<()> {
        let since = Utc::now() - Duration::hours(hours);

        // Each source is wrapped individually: transport failure on one is
        // that source's problem, not the run's.
        info!("[1/5] scraping sources");
        let mut batch = Vec::new();
        for adapter in &self.adapters {
            let name = adapter.name().to_string();
            match adapter.fetch(since).await {
                Ok(items) => {
                    info!(source = %name, items = items.len(), "source scraped");
                    report.scraped.insert(name, items.len());
                    batch.extend(items);
                }
                Err(e) => {
                    warn!(source = %name, error = ?e, "source failed, continuing without it");
                    report.scraped.insert(name, 0);
                }
            }
        }
        report.stored_new = self
            .store
            .insert_new(&batch)
            .await
            .context("storing scraped items")?;
        info!(
            scraped = batch.len(),
            stored_new = report.stored_new,
            "dedup and store complete"
        );

        info!("[2/5] enriching article bodies");
        let pending_articles = self
            .store
            .items_missing_content(SourceKind::Article)
            .await
            .context("selecting articles pending enrichment")?;
        report.articles_enriched = enrich::run_stage(
            &self.store,
            Arc::clone(&self.article_fetcher),
            pending_articles,
            1,
        )
        .await;

        info!("[3/5] enriching video transcripts");
        let pending_videos = self
            .store
            .items_missing_content(SourceKind::Video)
            .await
            .context("selecting videos pending enrichment")?;
        report.videos_enriched = enrich::run_stage(
            &self.store,
            Arc::clone(&self.transcript_fetcher),
            pending_videos,
            self.transcript_concurrency,
        )
        .await;

        info!("[4/5] generating digests");
        report.digests = summarize::run(&self.store, self.summarizer.as_ref())
            .await
            .context("digest generation")?;

        info!("[5/5] curating and sending the email digest");
        let curation = curate::rank_recent(&self.store, self.ranker.as_ref(), &self.profile, since)
            .await
            .context("ranking digests")?;
        report.digests_in_window = curation.digests.len();
        report.ranked = curation.ranked.len();

        let email = compose::compose(
            &curation.ranked,
            &curation.digests,
            top_n,
            &self.profile,
            Utc::now(),
        );
        let text = compose::render_text(&email);
        let html = compose::render_html(&email);

        self.delivery
            .send(&email.subject, &text, &html, &self.recipients)
            .await
            .context("delivering email digest")?;

        report.delivered = email.articles.len();
        report.success = true;
        info!(articles = report.delivered, "email digest delivered");
        Ok(())
    }
}
