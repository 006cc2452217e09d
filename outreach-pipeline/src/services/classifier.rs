//! Content classifier
//!
//! Wraps the text-generation service behind a trait so the refine runner
//! and the aggregator tests do not need a live endpoint.

use outreach_common::models::Classification;

use super::llm_client::{LlmClient, LlmError};

const SYSTEM_PROMPT: &str = "You evaluate YouTube channels as potential partners for a \
math-animation rendering product. Respond with strict JSON only, no prose, no markdown \
fences. Use exactly this shape:\n\
{\n\
  \"creator_first_name\": string or null,\n\
  \"language\": {\"primary_language\": string, \"is_english\": bool},\n\
  \"content\": {\n\
    \"is_educational\": bool,\n\
    \"subject_area\": string,\n\
    \"content_depth\": \"deep_conceptual\" | \"tutorial\" | \"surface\",\n\
    \"needs_visual_animation\": bool,\n\
    \"compatibility\": \"perfect\" | \"good\" | \"possible\" | \"poor\"\n\
  },\n\
  \"location\": string or null,\n\
  \"disqualify\": {\"should_disqualify\": bool, \"reason\": string or null},\n\
  \"overall_assessment\": string or null\n\
}\n\
Compatibility tiers: perfect = math/physics built around equations and derivations; \
good = science content that clearly benefits from visualization; possible = might \
benefit but unclear; poor = does not benefit from animation.";

/// Everything the classifier gets to see about a lead
#[derive(Debug, Clone)]
pub struct ClassifyInput {
    pub channel_name: String,
    pub channel_description: String,
    pub video_title: Option<String>,
    pub video_description: Option<String>,
    pub country: Option<String>,
    pub subscriber_count: Option<i64>,
}

impl ClassifyInput {
    fn render(&self) -> String {
        let mut prompt = format!(
            "Channel: {}\nChannel description: {}\n",
            self.channel_name, self.channel_description
        );
        if let Some(title) = &self.video_title {
            prompt.push_str(&format!("Sample video title: {}\n", title));
        }
        if let Some(description) = &self.video_description {
            prompt.push_str(&format!("Sample video description: {}\n", description));
        }
        if let Some(country) = &self.country {
            prompt.push_str(&format!("Declared country: {}\n", country));
        }
        if let Some(subs) = self.subscriber_count {
            prompt.push_str(&format!("Subscribers: {}\n", subs));
        }
        prompt
    }
}

/// Classifier seam. The live implementation calls the text-generation
/// service; tests substitute a canned one.
pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        input: &ClassifyInput,
    ) -> impl std::future::Future<Output = Result<Classification, LlmError>> + Send;
}

/// Live classifier backed by the chat-completions client
pub struct LlmClassifier {
    client: LlmClient,
}

impl LlmClassifier {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

impl Classifier for LlmClassifier {
    async fn classify(&self, input: &ClassifyInput) -> Result<Classification, LlmError> {
        self.client
            .complete_json(SYSTEM_PROMPT, &input.render())
            .await
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Canned classifier for runner tests. Pops responses in order; an
    /// exhausted queue yields a malformed-completion error.
    pub struct MockClassifier {
        responses: Mutex<Vec<Result<Classification, LlmError>>>,
    }

    impl MockClassifier {
        pub fn new(mut responses: Vec<Result<Classification, LlmError>>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    impl Classifier for MockClassifier {
        async fn classify(&self, _input: &ClassifyInput) -> Result<Classification, LlmError> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(LlmError::MalformedCompletion("mock exhausted".into())))
        }
    }
}
