//! Retrieval-augmented review generation with style-fidelity scoring.
//!
//! Retrieves the nearest watched movies for the target, builds a
//! style-conditioned two-part prompt, generates the review at a
//! variety-biased temperature, then scores the output against the learned
//! style. Unlike the tolerant corpus analyses, fidelity scoring is *strict*:
//! a confidence response that does not parse, or carries a score outside
//! `[0, 1]`, fails the generation call — a missing confidence breakdown is a
//! contract violation the caller cannot safely ignore.

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::index::{SimilarMovie, VectorIndex};
use crate::llm::{CompletionClient, Prompt};
use crate::models::{
    ConfidenceBreakdown, GeneratedReview, PatternKind, QueryContext, StyleProfile,
};
use crate::parse;

/// Nearest watched movies retrieved per generation.
const SIMILAR_MOVIES: usize = 5;
/// Common references surfaced in the style prompt.
const REFERENCE_CAP: usize = 5;
/// Low temperature for the deterministic-leaning scoring call.
const SCORING_TEMPERATURE: f32 = 0.1;

/// Generates reviews in a learned personal style.
pub struct ReviewGenerator {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingClient>,
    llm: Arc<dyn CompletionClient>,
    temperature: f32,
}

/// Strictly parsed pattern scores from the scoring call.
#[derive(Debug, Deserialize)]
struct PatternScores {
    opening: f64,
    transition: f64,
    closing: f64,
    comparative: f64,
}

impl ReviewGenerator {
    /// `temperature` is the sampling temperature for the generation call
    /// (the config default of 0.9 biases toward variety).
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn CompletionClient>,
        temperature: f32,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            temperature,
        }
    }

    /// Generate a review for `query` in the style described by `profile`.
    pub async fn generate_review(
        &self,
        profile: &StyleProfile,
        query: &QueryContext,
    ) -> Result<GeneratedReview> {
        let query_embedding = self.embedder.embed(&query.embedding_context()).await?;
        let similar = self.index.query(&query_embedding, SIMILAR_MOVIES, None).await;
        debug!(count = similar.len(), title = %query.title, "retrieved similar watched movies");

        let prompt = build_generation_prompt(profile, query, &similar);
        let text = self.llm.complete(&prompt, self.temperature).await?;

        let confidence = self.score_confidence(profile, &text).await?;
        let key_elements_used = extract_key_elements(profile, &text);

        Ok(GeneratedReview {
            text,
            confidence,
            key_elements_used,
        })
    }

    /// Compute the confidence breakdown: the length score locally, the four
    /// pattern scores via a second, low-temperature structured call.
    async fn score_confidence(
        &self,
        profile: &StyleProfile,
        text: &str,
    ) -> Result<ConfidenceBreakdown> {
        let target = profile.average_length.max(1) as f64;
        let actual = text.split_whitespace().count() as f64;
        let length = 1.0 - (target - actual).abs() / target;

        let prompt = build_scoring_prompt(profile, text);
        let response = self.llm.complete(&prompt, SCORING_TEMPERATURE).await?;

        let scores: PatternScores = parse::parse_json(&response).map_err(|e| {
            Error::StyleAnalysis(format!("confidence response did not parse as JSON: {e}"))
        })?;

        for (name, value) in [
            ("opening", scores.opening),
            ("transition", scores.transition),
            ("closing", scores.closing),
            ("comparative", scores.comparative),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::StyleAnalysis(format!(
                    "{name} score {value} outside [0, 1]"
                )));
            }
        }

        Ok(ConfidenceBreakdown {
            length,
            opening: scores.opening,
            transition: scores.transition,
            closing: scores.closing,
            comparative: scores.comparative,
        })
    }
}

fn pattern_text(profile: &StyleProfile, kind: PatternKind) -> &str {
    profile
        .pattern(kind)
        .map(|p| p.pattern.as_str())
        .unwrap_or_default()
}

fn build_generation_prompt(
    profile: &StyleProfile,
    query: &QueryContext,
    similar: &[SimilarMovie],
) -> Prompt {
    let references = profile
        .common_references
        .iter()
        .take(REFERENCE_CAP)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");

    let system = format!(
        "You are a Letterboxd user reviewing movies in my personal style, no need to be formal.\n\
         \n\
         My writing style characteristics:\n\
         - Sentiment preferences: {}\n\
         - Common references: {}\n\
         \n\
         Use these specific sentence patterns:\n\
         1. Opening: {}\n\
         2. Transitions: {}\n\
         3. Comparisons: {}\n\
         4. Closing: {}",
        format_sentiment(profile),
        references,
        pattern_text(profile, PatternKind::Opening),
        pattern_text(profile, PatternKind::Transition),
        pattern_text(profile, PatternKind::Comparative),
        pattern_text(profile, PatternKind::Closing),
    );

    let user = format!(
        "Generate a review for '{}'\n\
         \n\
         Similar movies I've watched:\n\
         {}\n\
         \n\
         Consider these movies' genres, and themes when writing the review.\n\
         \n\
         The review must:\n\
         - Recreate vibe and feeling of my reviews\n\
         - Use the specified sentence patterns\n\
         - Be approximately {} words long\n\
         - Consider my experience with similar films\n\
         - Match my sentiment preferences",
        query.title,
        format_similar_movies(similar),
        profile.average_length,
    );

    Prompt::new(system, user)
}

fn build_scoring_prompt(profile: &StyleProfile, text: &str) -> Prompt {
    let system = format!(
        "Rate how well the given movie review matches each of these sentence patterns, \
         each as a score from 0.0 to 1.0:\n\
         1. opening: {}\n\
         2. transition: {}\n\
         3. closing: {}\n\
         4. comparative: {}\n\
         \n\
         Return ONLY a JSON object with the keys \"opening\", \"transition\", \"closing\" \
         and \"comparative\".",
        pattern_text(profile, PatternKind::Opening),
        pattern_text(profile, PatternKind::Transition),
        pattern_text(profile, PatternKind::Closing),
        pattern_text(profile, PatternKind::Comparative),
    );

    Prompt::new(system, text)
}

fn format_sentiment(profile: &StyleProfile) -> String {
    match profile.sentiment_scores {
        Some(scores) => format!(
            "positive: {:.2}, negative: {:.2}, neutral: {:.2}",
            scores.positive, scores.negative, scores.neutral
        ),
        None => "mixed".to_string(),
    }
}

/// Format the retrieved movies for the task prompt, one bullet per movie
/// with its genres and runtime pulled from stored metadata.
fn format_similar_movies(similar: &[SimilarMovie]) -> String {
    similar
        .iter()
        .map(|movie| {
            let metadata = &movie.metadata;
            let title = metadata
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown");
            let year = metadata
                .get("year")
                .and_then(|v| v.as_i64())
                .map(|y| y.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            let genres = metadata
                .get("genres")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            let runtime = metadata
                .get("runtime")
                .and_then(|v| v.as_i64())
                .map(|r| r.to_string())
                .unwrap_or_else(|| "N/A".to_string());

            format!(
                "• {} ({})\n  Genres: {}\n  Runtime: {} minutes",
                title, year, genres, runtime
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Every common reference from the profile echoed (case-insensitively) in
/// the generated text, in profile order.
fn extract_key_elements(profile: &StyleProfile, text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    profile
        .common_references
        .iter()
        .filter(|reference| !reference.is_empty() && lowered.contains(&reference.to_lowercase()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{fallback_patterns, SentimentScores};

    fn profile() -> StyleProfile {
        StyleProfile {
            sentence_patterns: fallback_patterns(),
            average_length: 100,
            sentiment_scores: Some(SentimentScores {
                positive: 0.5,
                negative: 0.3,
                neutral: 0.2,
            }),
            common_references: vec!["The Matrix".to_string(), "Heat".to_string()],
        }
    }

    #[test]
    fn test_extract_key_elements_is_case_insensitive() {
        let elements = extract_key_elements(&profile(), "This reminded me of THE MATRIX a lot.");
        assert_eq!(elements, vec!["The Matrix"]);
    }

    #[test]
    fn test_extract_key_elements_only_from_common_references() {
        let elements = extract_key_elements(&profile(), "Pure heat, like Heat and The Matrix.");
        assert_eq!(elements, vec!["The Matrix", "Heat"]);
        for element in &elements {
            assert!(profile().common_references.contains(element));
        }
    }

    #[test]
    fn test_generation_prompt_mentions_target_and_patterns() {
        let query = QueryContext {
            title: "Gattaca".to_string(),
            year: 1997,
            genres: vec!["Drama".to_string(), "Sci-Fi".to_string()],
            runtime: 106,
        };
        let prompt = build_generation_prompt(&profile(), &query, &[]);
        assert!(prompt.user.contains("Generate a review for 'Gattaca'"));
        assert!(prompt.user.contains("approximately 100 words"));
        assert!(prompt.system.contains("Reminds me of..."));
        assert!(prompt.system.contains("The Matrix, Heat"));
        assert!(prompt.system.contains("positive: 0.50"));
    }

    #[test]
    fn test_format_similar_movies_shape() {
        let similar = vec![SimilarMovie {
            id: "inception-2010".to_string(),
            document: "Inception".to_string(),
            metadata: serde_json::json!({
                "id": "inception-2010",
                "title": "Inception",
                "year": 2010,
                "genres": "Action,Sci-Fi",
                "runtime": 148,
            }),
            distance: 0.12,
        }];
        let formatted = format_similar_movies(&similar);
        assert_eq!(
            formatted,
            "• Inception (2010)\n  Genres: Action, Sci-Fi\n  Runtime: 148 minutes"
        );
    }

    #[test]
    fn test_format_sentiment_handles_unknown() {
        let mut p = profile();
        p.sentiment_scores = None;
        assert_eq!(format_sentiment(&p), "mixed");
    }
}
