//! Stateless text-analysis capability over a review corpus.
//!
//! Three operations — sentiment scoring, reference extraction, and
//! sentence-pattern mining — each a two-stage protocol: build a structured
//! generation request with an explicit output-format contract, then parse
//! the response under its declared output kind via [`crate::parse`].
//!
//! Parsing here is *tolerant*: a malformed response never propagates as an
//! error. It degrades to an empty/default value and the raw response is
//! logged for diagnosis. Transport failures from the completion capability
//! always propagate.

use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::llm::{CompletionClient, Prompt};
use crate::models::{fallback_patterns, SentencePattern, SentimentScores};
use crate::parse;

const SENTIMENT_TEMPERATURE: f32 = 0.3;
const REFERENCES_TEMPERATURE: f32 = 0.2;
const PATTERNS_TEMPERATURE: f32 = 0.3;

const SENTIMENT_PROMPT: &str = "\
Analyze the sentiment in this text and return only a JSON object with these scores (must sum to 1.0):
- positive
- negative
- neutral";

const REFERENCES_PROMPT: &str = "\
Extract all movie references from this text and return them as a comma-separated list.
Include direct mentions, director references, and clear film allusions.

IMPORTANT: Return ONLY the comma-separated list of strings. Do not include any explanatory text before or after.
Format must be exactly as shown in this example:
[
    \"Before Sunrise\",
    \"Before Sunset\",
    \"The Matrix\",
    \"The Lord of the Rings\"
]";

const PATTERNS_PROMPT: &str = "\
Analyze this collection of movie reviews and identify the most common writing patterns.

For each category below, identify EXACTLY ONE recurring pattern that appears frequently across multiple reviews:

1. How do the reviews typically start? (e.g., \"Starts with director's name\", \"Opens with plot setup\")
2. What phrases are commonly used to transition between thoughts? (e.g., \"However,\", \"While\", \"Despite\")
3. How do the reviews usually conclude? (e.g., \"Ends with recommendation\", \"Closes with rating justification\")
4. How are comparisons typically made? (e.g., \"Reminds me of...\", \"Unlike [other film]...\")

Return EXACTLY 4 patterns total (one per category) in a JSON array.
Format must be exactly as shown in this example:
[
    {\"type\": \"opening\", \"pattern\": \"Begins with emotional reaction\"},
    {\"type\": \"transition\", \"pattern\": \"Uses 'However' to contrast points\"},
    {\"type\": \"closing\", \"pattern\": \"Ends with recommendation\"},
    {\"type\": \"comparative\", \"pattern\": \"Reminds me of...\"}
]";

/// Stateless analysis service over an injected completion capability.
pub struct TextAnalyzer {
    llm: Arc<dyn CompletionClient>,
}

impl TextAnalyzer {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    /// Sentiment distribution over the text.
    ///
    /// `Ok(None)` means the response did not parse (or violated the
    /// sum-to-1.0 contract) — unknown, not an error.
    pub async fn analyze_sentiment(&self, text: &str) -> Result<Option<SentimentScores>> {
        let prompt = Prompt::new(SENTIMENT_PROMPT, text);
        let response = self.llm.complete(&prompt, SENTIMENT_TEMPERATURE).await?;

        match parse::parse_json::<SentimentScores>(&response) {
            Ok(scores) if scores.is_valid() => Ok(Some(scores)),
            Ok(scores) => {
                warn!(?scores, raw = %response, "sentiment scores violate the analysis contract");
                Ok(None)
            }
            Err(e) => {
                warn!(error = %e, raw = %response, "failed to parse sentiment response");
                Ok(None)
            }
        }
    }

    /// Distinct film/director references, in order of first mention.
    /// Degrades to an empty list when the response is unusable.
    pub async fn extract_references(&self, text: &str) -> Result<Vec<String>> {
        let prompt = Prompt::new(REFERENCES_PROMPT, text);
        let response = self.llm.complete(&prompt, REFERENCES_TEMPERATURE).await?;

        let mut references = Vec::new();
        for item in parse::parse_delimited_list(&response) {
            if !references.contains(&item) {
                references.push(item);
            }
        }
        Ok(references)
    }

    /// Exactly four sentence patterns, one per category. A response that
    /// does not yield exactly four entries is replaced by the canonical
    /// fallback set — a robustness policy, not an error.
    pub async fn analyze_sentence_patterns(&self, text: &str) -> Result<Vec<SentencePattern>> {
        let prompt = Prompt::new(PATTERNS_PROMPT, text);
        let response = self.llm.complete(&prompt, PATTERNS_TEMPERATURE).await?;

        match parse::parse_json::<Vec<SentencePattern>>(&response) {
            Ok(patterns) if patterns.len() == 4 => Ok(patterns),
            Ok(patterns) => {
                warn!(
                    count = patterns.len(),
                    "pattern analysis yielded wrong count, substituting fallback set"
                );
                Ok(fallback_patterns())
            }
            Err(e) => {
                warn!(error = %e, raw = %response, "failed to parse pattern response, substituting fallback set");
                Ok(fallback_patterns())
            }
        }
    }
}
