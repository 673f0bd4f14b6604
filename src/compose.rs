//! Turns the ranked digest set into the delivery artifact: an introduction
//! plus an ordered article list, rendered as plaintext and HTML.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;

use crate::config::Profile;
use crate::types::{Digest, RankedArticle};

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedArticle {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub rank: u32,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailDigest {
    pub subject: String,
    pub greeting: String,
    pub introduction: String,
    pub articles: Vec<ComposedArticle>,
}

/// Join ranked entries back to their digests, keep the top `top_n`, and
/// build the artifact. A ranked id with no matching digest is skipped, not
/// fatal; when `top_n` exceeds the ranked count, everything ranked is
/// included with no padding.
pub fn compose(
    ranked: &[RankedArticle],
    digests: &[Digest],
    top_n: usize,
    profile: &Profile,
    date: DateTime<Utc>,
) -> EmailDigest {
    let by_id: HashMap<&str, &Digest> = digests.iter().map(|d| (d.id.as_str(), d)).collect();

    let mut articles = Vec::new();
    for entry in ranked {
        if articles.len() >= top_n {
            break;
        }
        let Some(digest) = by_id.get(entry.digest_id.as_str()) else {
            warn!(digest_id = %entry.digest_id, "ranked id without a digest, skipping");
            continue;
        };
        articles.push(ComposedArticle {
            title: digest.title.clone(),
            summary: digest.summary.clone(),
            url: digest.source_url.clone(),
            rank: entry.rank,
            score: entry.relevance_score,
        });
    }

    let day = date.format("%B %d, %Y");
    let introduction = if articles.is_empty() {
        format!("No new stories made the cut for {day}. A quiet day in AI news.")
    } else {
        format!(
            "Here are your top {} AI stories for {day}, picked from {} fresh digests against your interests.",
            articles.len(),
            digests.len(),
        )
    };

    EmailDigest {
        subject: format!("Daily AI digest for {}", date.format("%Y-%m-%d")),
        greeting: format!("Hi {},", profile.name),
        introduction,
        articles,
    }
}

pub fn render_text(digest: &EmailDigest) -> String {
    let mut out = String::new();
    out.push_str(&digest.greeting);
    out.push_str("\n\n");
    out.push_str(&digest.introduction);
    out.push_str("\n\n");

    for article in &digest.articles {
        out.push_str(&format!(
            "{}. {} (score {:.1}/10)\n{}\nRead more: {}\n\n",
            article.rank, article.title, article.score, article.summary, article.url
        ));
    }
    out.trim_end().to_string()
}

pub fn render_html(digest: &EmailDigest) -> String {
    use html_escape::{encode_double_quoted_attribute, encode_text};

    let mut body = String::new();
    body.push_str(&format!(
        "<p class=\"greeting\">{}</p>\n",
        encode_text(&digest.greeting)
    ));
    body.push_str(&format!(
        "<p class=\"introduction\">{}</p>\n<hr>\n",
        encode_text(&digest.introduction)
    ));

    for article in &digest.articles {
        body.push_str(&format!(
            "<h3>{}. {}</h3>\n",
            article.rank,
            encode_text(&article.title)
        ));
        body.push_str(&format!("<p>{}</p>\n", encode_text(&article.summary)));
        body.push_str(&format!(
            "<p><a class=\"article-link\" href=\"{}\">Read more</a></p>\n<hr>\n",
            encode_double_quoted_attribute(&article.url)
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<style>
body {{ font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
h3 {{ font-size: 16px; font-weight: 600; color: #1a1a1a; margin: 20px 0 8px; }}
p {{ margin: 8px 0; color: #4a4a4a; }}
a {{ color: #0066cc; text-decoration: none; font-weight: 500; }}
hr {{ border: none; border-top: 1px solid #e5e5e5; margin: 20px 0; }}
.greeting {{ font-size: 16px; font-weight: 500; color: #1a1a1a; }}
</style>
</head>
<body>
{body}</body>
</html>"#
    )
}
