//! Harvest stage
//!
//! Keyword search on the video platform, fast keyword filtering, channel
//! stat collection, and insertion of new leads. The store's primary key
//! is the dedup mechanism: a channel seen under any earlier keyword is
//! skipped before we spend API quota on its statistics.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use outreach_common::config::OutreachConfig;
use outreach_common::db::{keywords, leads};
use outreach_common::models::{Lead, SourceVideo};
use outreach_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::services::youtube_client::{engagement_rate, VideoHit, YouTubeClient};

const DEFAULT_MAX_VIDEOS_PER_KEYWORD: u32 = 50;
const ENGAGEMENT_SAMPLE_SIZE: u32 = 10;

/// Harvest run totals
#[derive(Debug, Default)]
pub struct HarvestSummary {
    pub keywords: usize,
    pub videos_seen: usize,
    pub filtered_out: usize,
    pub already_known: usize,
    pub new_leads: usize,
    pub errors: usize,
}

/// First plausible email address in free text. Channel descriptions are
/// the only contact source we get without scraping, so this stays
/// deliberately loose: a token with one @, a dot after it, and no
/// obvious junk.
pub fn extract_email(text: &str) -> Option<String> {
    for token in text.split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == '<' || c == '>' || c == '(' || c == ')')
    {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric());
        let Some(at) = token.find('@') else { continue };
        if at == 0 || token[at + 1..].contains('@') {
            continue;
        }
        let domain = &token[at + 1..];
        let Some(dot) = domain.rfind('.') else { continue };
        if dot == 0 || dot == domain.len() - 1 {
            continue;
        }
        if domain.contains("..") {
            continue;
        }
        return Some(token.to_lowercase());
    }
    None
}

/// Whether a search hit trips the fast disqualification keywords
fn keyword_filtered(hit: &VideoHit, disqualify_keywords: &[String]) -> bool {
    let haystack = format!("{} {}", hit.title, hit.description).to_lowercase();
    disqualify_keywords.iter().any(|kw| haystack.contains(kw))
}

async fn build_lead(
    client: &YouTubeClient,
    hit: &VideoHit,
    keyword: &str,
) -> std::result::Result<Lead, crate::services::youtube_client::YtError> {
    let now = Utc::now();
    let detail = client.channel_detail(&hit.channel_id).await?;

    // Engagement over a small sample of recent videos; a failure here is
    // tolerable, the metric is optional
    let engagement = match client
        .recent_video_ids(&hit.channel_id, ENGAGEMENT_SAMPLE_SIZE)
        .await
    {
        Ok(ids) => client
            .video_stats(&ids)
            .await
            .ok()
            .as_deref()
            .and_then(engagement_rate),
        Err(e) => {
            warn!(channel_id = %hit.channel_id, error = %e, "Engagement sample failed");
            None
        }
    };

    let mut lead = Lead::harvested(&detail.channel_id, &detail.title, now);
    lead.channel_url = Some(detail.url());
    lead.channel_description = Some(detail.description.clone());
    lead.keyword_source = Some(keyword.to_string());
    lead.source_video = Some(SourceVideo {
        video_id: hit.video_id.clone(),
        title: hit.title.clone(),
        description: hit.description.clone(),
        url: hit.url(),
    });
    lead.email = extract_email(&detail.description);

    lead.metrics.subscriber_count = detail.subscriber_count;
    lead.metrics.view_count = detail.view_count;
    lead.metrics.video_count = detail.video_count;
    lead.metrics.channel_published_at = detail.published_at;
    lead.metrics.engagement_rate = engagement;
    lead.metrics.country = detail.country.clone();
    lead.metrics.uploads_per_month = detail.video_count.zip(detail.published_at).and_then(
        |(count, published)| {
            let months = (now - published).num_days() as f64 / 30.44;
            (months >= 1.0).then(|| count as f64 / months)
        },
    );

    Ok(lead)
}

/// Run the harvest stage over the given keywords; with none given, the
/// stored keyword list is used, stalest first
pub async fn run(
    pool: &SqlitePool,
    config: &OutreachConfig,
    cli_keywords: Vec<String>,
) -> Result<HarvestSummary> {
    let api_key = config.require_youtube()?;
    let client = YouTubeClient::new(api_key, config.youtube.request_interval_ms)
        .map_err(|e| outreach_common::Error::External(e.to_string()))?;

    let keyword_list = if cli_keywords.is_empty() {
        keywords::list(pool)
            .await?
            .into_iter()
            .map(|k| k.keyword)
            .collect()
    } else {
        cli_keywords
    };

    if keyword_list.is_empty() {
        return Err(outreach_common::Error::InvalidInput(
            "no keywords given and none stored; add some with `outreach manage keywords add`"
                .into(),
        ));
    }

    let max_videos = config
        .youtube
        .max_videos_per_keyword
        .unwrap_or(DEFAULT_MAX_VIDEOS_PER_KEYWORD);

    let mut summary = HarvestSummary {
        keywords: keyword_list.len(),
        ..Default::default()
    };

    for keyword in &keyword_list {
        info!(keyword = %keyword, "Harvesting keyword");

        let hits = match client.search_videos(keyword, max_videos).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "Keyword search failed");
                summary.errors += 1;
                continue;
            }
        };
        summary.videos_seen += hits.len();

        // Collect hits worth a stats fetch: not keyword-filtered, channel
        // not already in the store, one hit per channel
        let mut candidates: Vec<VideoHit> = Vec::new();
        for hit in hits {
            if keyword_filtered(&hit, &config.harvest.disqualify_keywords) {
                summary.filtered_out += 1;
                continue;
            }
            if candidates.iter().any(|c| c.channel_id == hit.channel_id) {
                continue;
            }
            if leads::get(pool, &hit.channel_id).await?.is_some() {
                summary.already_known += 1;
                continue;
            }
            candidates.push(hit);
        }

        // Bounded fan-out for channel stats
        let results: Vec<_> = stream::iter(candidates.iter())
            .map(|hit| build_lead(&client, hit, keyword))
            .buffer_unordered(config.harvest.workers)
            .collect()
            .await;

        for built in results {
            match built {
                Ok(lead) => {
                    // Channels below the subscriber floor can never
                    // qualify; skip them before they hit the store
                    if lead
                        .metrics
                        .subscriber_count
                        .is_some_and(|subs| subs < config.scoring.min_subscribers)
                    {
                        summary.filtered_out += 1;
                        continue;
                    }
                    if leads::insert_harvested(pool, &lead).await? {
                        summary.new_leads += 1;
                    } else {
                        summary.already_known += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Channel stat fetch failed");
                    summary.errors += 1;
                }
            }
        }

        keywords::mark_harvested(pool, keyword).await?;
    }

    info!(
        new_leads = summary.new_leads,
        filtered = summary.filtered_out,
        known = summary.already_known,
        errors = summary.errors,
        "Harvest complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_email_from_description() {
        let text = "Business inquiries: Contact.Me@Example.com (serious only)";
        assert_eq!(extract_email(text), Some("contact.me@example.com".into()));
    }

    #[test]
    fn test_extract_email_rejects_junk() {
        assert_eq!(extract_email("follow @mychannel on social"), None);
        assert_eq!(extract_email("no contact info here"), None);
        assert_eq!(extract_email("broken@@example.com"), None);
        assert_eq!(extract_email("trailing@dot."), None);
    }

    #[test]
    fn test_keyword_filter_is_case_insensitive() {
        let hit = VideoHit {
            video_id: "v1".into(),
            title: "My GAMING Setup Tour".into(),
            description: String::new(),
            channel_id: "UC1".into(),
            channel_title: "c".into(),
        };
        assert!(keyword_filtered(&hit, &["gaming".to_string()]));

        let hit = VideoHit {
            video_id: "v2".into(),
            title: "Fourier transforms visualized".into(),
            description: "A deep dive".into(),
            channel_id: "UC2".into(),
            channel_title: "c".into(),
        };
        assert!(!keyword_filtered(&hit, &["gaming".to_string()]));
    }
}
