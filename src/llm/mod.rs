// src/llm/mod.rs
//! Generative collaborators: summarization and ranking. Both are opaque
//! behind traits so the pipeline can run against mocks in tests.

pub mod openai;

use async_trait::async_trait;

use crate::config::Profile;
use crate::types::{Digest, DigestDraft, RankedArticle, SourceKind};

/// Turns one enriched item into a digest draft. `None` means "could not
/// summarize"; recoverable issues never surface as errors, the item simply
/// stays eligible for the next run.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        title: &str,
        content: &str,
        kind: SourceKind,
    ) -> Option<DigestDraft>;
}

/// Orders a whole digest batch against the interest profile in one call, so
/// relative comparisons are possible. `None` means the collaborator failed.
#[async_trait]
pub trait Ranker: Send + Sync {
    async fn rank(&self, profile: &Profile, digests: &[Digest]) -> Option<Vec<RankedArticle>>;
}
