//! Outreach email drafter
//!
//! Generates the personalized initial email from lead context. Same seam
//! pattern as the classifier: a trait with a live chat-completions
//! implementation and a canned one for tests.

use chrono::Utc;
use outreach_common::models::{DraftEmail, Lead};
use serde::Deserialize;

use super::llm_client::{LlmClient, LlmError};

const SYSTEM_PROMPT: &str = "You write short, personal outreach emails to educational \
YouTube creators, offering them a free custom math animation rendered from one of their \
videos. Tone: one creator to another, specific to their content, no marketing speak, \
under 150 words. The email must mention the animation preview link naturally. Respond \
with strict JSON only, no markdown fences: {\"subject\": string, \"body\": string}.";

#[derive(Debug, Deserialize)]
struct DraftResponse {
    subject: String,
    body: String,
}

fn render_prompt(lead: &Lead) -> String {
    let mut prompt = format!(
        "Creator name: {}\nChannel: {}\n",
        lead.display_name(),
        lead.channel_name
    );
    if let Some(classification) = &lead.classification {
        prompt.push_str(&format!(
            "Subject area: {}\nContent depth: {}\n",
            classification.content.subject_area, classification.content.content_depth
        ));
    }
    if let Some(video) = &lead.source_video {
        prompt.push_str(&format!("Their video we animated: {}\n", video.title));
    }
    // Uploaded leads link the hosted page, everyone else the raw player
    if let Some(link) = lead.hosted_url.as_deref().or(lead.player_url.as_deref()) {
        prompt.push_str(&format!("Animation preview link: {}\n", link));
    }
    prompt
}

/// Static template used when the generation service is down. Generic on
/// purpose; the operator reviews every draft before it can be sent.
pub fn fallback_draft(lead: &Lead) -> DraftEmail {
    let link = lead
        .hosted_url
        .as_deref()
        .or(lead.player_url.as_deref())
        .unwrap_or_default();
    let video = lead
        .source_video
        .as_ref()
        .map(|v| format!("\"{}\"", v.title))
        .unwrap_or_else(|| "one of your videos".to_string());

    DraftEmail {
        subject: format!("A custom animation for {}", lead.channel_name),
        body: format!(
            "Hi {},\n\nI've been following {} for a while and made a custom \
             animation based on {}. You can watch it here: {}\n\nIt's yours to \
             use however you like. If more of these would be useful for your \
             channel, I'd love to talk.\n",
            lead.display_name(),
            lead.channel_name,
            video,
            link
        ),
        drafted_at: Utc::now(),
    }
}

/// Drafter seam
pub trait Drafter: Send + Sync {
    fn draft(
        &self,
        lead: &Lead,
    ) -> impl std::future::Future<Output = Result<DraftEmail, LlmError>> + Send;
}

/// Live drafter backed by the chat-completions client
pub struct LlmDrafter {
    client: LlmClient,
}

impl LlmDrafter {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

impl Drafter for LlmDrafter {
    async fn draft(&self, lead: &Lead) -> Result<DraftEmail, LlmError> {
        let response: DraftResponse = self
            .client
            .complete_json(SYSTEM_PROMPT, &render_prompt(lead))
            .await?;

        if response.subject.trim().is_empty() || response.body.trim().is_empty() {
            return Err(LlmError::MalformedCompletion(
                "empty subject or body".into(),
            ));
        }

        Ok(DraftEmail {
            subject: response.subject,
            body: response.body,
            drafted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;

    /// Canned drafter producing a deterministic draft per lead
    pub struct MockDrafter;

    impl Drafter for MockDrafter {
        async fn draft(&self, lead: &Lead) -> Result<DraftEmail, LlmError> {
            Ok(DraftEmail {
                subject: format!("An animation for {}", lead.channel_name),
                body: format!(
                    "Hi {}, we made you something: {}",
                    lead.display_name(),
                    lead.player_url.as_deref().unwrap_or("(preview)")
                ),
                drafted_at: Utc::now(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_common::models::SourceVideo;

    #[test]
    fn test_prompt_carries_player_url_and_video() {
        let mut lead = Lead::harvested("UC1", "Math Channel", Utc::now());
        lead.creator_name = Some("Grant".into());
        lead.player_url = Some("https://player.example/v/abc".into());
        lead.source_video = Some(SourceVideo {
            video_id: "v1".into(),
            title: "Eigenvalues explained".into(),
            description: String::new(),
            url: "https://youtube.com/watch?v=v1".into(),
        });

        let prompt = render_prompt(&lead);
        assert!(prompt.contains("Creator name: Grant"));
        assert!(prompt.contains("Eigenvalues explained"));
        assert!(prompt.contains("https://player.example/v/abc"));
    }
}
