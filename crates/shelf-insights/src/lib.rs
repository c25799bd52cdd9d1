//! Book insight generation.
//!
//! A [`TextGenerator`] turns a prompt into free text; [`InsightGenerator`]
//! builds the prompt, calls the generator and pulls a JSON object out of
//! whatever comes back. Providers are free to wrap the JSON in prose or code
//! fences, and when nothing usable is found a fixed fallback is returned.
//!
//! # Providers
//!
//! - [`gemini::GeminiGenerator`]: Google Generative Language REST API
//! - [`UnconfiguredGenerator`]: stands in when no credential is configured

pub mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use shelf_types::models::Insight;

#[derive(Debug, Error)]
pub enum InsightError {
    /// No credential configured. Retrying will not help.
    #[error("AI provider is not configured. Please check your API key.")]
    ProviderUnavailable,

    /// The provider was reached but the call failed. May be transient.
    #[error("Failed to generate insights: {0}")]
    GenerationFailed(String),
}

/// Anything that can answer a prompt with text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError>;
}

/// Used when no provider credential is available.
pub struct UnconfiguredGenerator;

#[async_trait]
impl TextGenerator for UnconfiguredGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, InsightError> {
        Err(InsightError::ProviderUnavailable)
    }
}

#[derive(Clone)]
pub struct InsightGenerator {
    provider: Arc<dyn TextGenerator>,
}

impl InsightGenerator {
    pub fn new(provider: Arc<dyn TextGenerator>) -> Self {
        Self { provider }
    }

    /// Gemini-backed generator when `api_key` is set, otherwise one that
    /// always reports [`InsightError::ProviderUnavailable`].
    pub fn from_credentials(api_key: Option<String>, model: &str) -> Self {
        match api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => {
                info!("Insight provider: Gemini ({})", model);
                Self::new(Arc::new(gemini::GeminiGenerator::new(key, model)))
            }
            None => {
                warn!("No AI provider key configured. Insights are disabled.");
                Self::new(Arc::new(UnconfiguredGenerator))
            }
        }
    }

    pub async fn generate(
        &self,
        title: &str,
        author: &str,
        description: &str,
    ) -> Result<Insight, InsightError> {
        let prompt = build_prompt(title, author, description);
        debug!("Requesting insights for {:?} by {:?}", title, author);

        let text = self.provider.generate(&prompt).await?;
        Ok(extract_insight(&text))
    }
}

pub fn build_prompt(title: &str, author: &str, description: &str) -> String {
    let description = if description.trim().is_empty() {
        "No description available".to_string()
    } else {
        format!("Description: {}", description.trim())
    };

    format!(
        "Generate analytical insights about the following book.
Focus on key themes, the author's approach, and why someone might want to read it.
DO NOT provide a detailed plot summary.

Book: {title} by {author}
{description}

Please provide insights in this JSON format:
{{
  \"keyThemes\": [\"theme1\", \"theme2\", \"theme3\"],
  \"authorsApproach\": \"brief description\",
  \"whyRead\": \"brief explanation\",
  \"readingExperience\": \"what to expect\"
}}"
    )
}

/// Text from the first `{` to the last `}`, inclusive.
fn json_candidate(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parse the provider's reply, falling back to [`fallback_insight`].
pub fn extract_insight(text: &str) -> Insight {
    let Some(candidate) = json_candidate(text) else {
        warn!("No JSON object in provider response, using fallback insight");
        return fallback_insight();
    };

    match serde_json::from_str::<Insight>(candidate) {
        Ok(insight) => insight,
        Err(e) => {
            warn!("Provider response is not a valid insight ({}), using fallback", e);
            fallback_insight()
        }
    }
}

pub fn fallback_insight() -> Insight {
    Insight {
        key_themes: vec![
            "Literature".into(),
            "Cultural themes".into(),
            "Historical context".into(),
        ],
        authors_approach: "The author employs a narrative style that explores complex themes"
            .into(),
        why_read: "This book offers valuable insights into its subject matter".into(),
        reading_experience: "Readers can expect an engaging and thought-provoking experience"
            .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
            assert!(prompt.contains("keyThemes"));
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _prompt: &str) -> Result<String, InsightError> {
            Err(InsightError::GenerationFailed("upstream 503".into()))
        }
    }

    #[tokio::test]
    async fn parses_json_wrapped_in_prose() {
        let generator = InsightGenerator::new(Arc::new(Canned(
            "Sure! Here you go:\n```json\n{\"keyThemes\": [\"Memory\", \"Loss\"], \"authorsApproach\": \"Fragmented\", \
             \"whyRead\": \"Haunting\", \"readingExperience\": \"Slow\"}\n```\nEnjoy.",
        )));

        let insight = generator.generate("Title", "Author", "").await.unwrap();
        assert_eq!(insight.key_themes, vec!["Memory", "Loss"]);
        assert_eq!(insight.authors_approach, "Fragmented");
    }

    #[tokio::test]
    async fn malformed_json_yields_fallback() {
        let generator = InsightGenerator::new(Arc::new(Canned(
            "{\"keyThemes\": [\"Memory\", \"authorsApproach\": }",
        )));
        let insight = generator.generate("Title", "Author", "desc").await.unwrap();
        assert_eq!(insight, fallback_insight());
    }

    #[tokio::test]
    async fn missing_json_yields_fallback() {
        let generator = InsightGenerator::new(Arc::new(Canned("I cannot help with that.")));
        let insight = generator.generate("Title", "Author", "desc").await.unwrap();
        assert_eq!(insight, fallback_insight());
    }

    #[tokio::test]
    async fn incomplete_object_yields_fallback() {
        let generator = InsightGenerator::new(Arc::new(Canned("{\"keyThemes\": [\"Memory\"]}")));
        let insight = generator.generate("Title", "Author", "desc").await.unwrap();
        assert_eq!(insight, fallback_insight());
    }

    #[tokio::test]
    async fn unconfigured_provider_is_distinguishable() {
        let generator = InsightGenerator::from_credentials(None, "gemini-2.5-flash");
        let err = generator.generate("Title", "Author", "").await.unwrap_err();
        assert!(matches!(err, InsightError::ProviderUnavailable));

        let generator = InsightGenerator::from_credentials(Some("   ".into()), "gemini-2.5-flash");
        let err = generator.generate("Title", "Author", "").await.unwrap_err();
        assert!(matches!(err, InsightError::ProviderUnavailable));
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let generator = InsightGenerator::new(Arc::new(Failing));
        let err = generator.generate("Title", "Author", "").await.unwrap_err();
        assert!(matches!(err, InsightError::GenerationFailed(_)));
    }

    #[test]
    fn prompt_mentions_book_and_description() {
        let prompt = build_prompt("Dune", "Frank Herbert", "  Spice.  ");
        assert!(prompt.contains("Book: Dune by Frank Herbert"));
        assert!(prompt.contains("Description: Spice."));
        assert!(build_prompt("Dune", "Frank Herbert", "").contains("No description available"));
    }

    #[test]
    fn reversed_braces_are_not_a_candidate() {
        assert_eq!(json_candidate("} nothing {"), None);
        assert_eq!(json_candidate("a {b} c"), Some("{b}"));
    }
}
