//! Core data models used throughout the review pipeline.
//!
//! These types represent the catalog rows, watched movies, style profiles,
//! and generated reviews that flow through the learning and generation
//! pipeline, plus the era/runtime bucketing used to build embedding text.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// One row of the review corpus: a single free-text review.
#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub text: String,
}

/// One raw row of the watched-movie catalog before normalization.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    pub name: String,
    pub year: i32,
    /// Raw genre string as exported, e.g. `"Action,Sci-Fi"`.
    pub genres: String,
    /// Runtime in minutes.
    pub runtime: u32,
}

/// The review corpus consumed by the style learner.
#[derive(Debug, Clone, Default)]
pub struct ReviewCorpus {
    pub rows: Vec<ReviewRow>,
}

impl ReviewCorpus {
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rows: texts
                .into_iter()
                .map(|t| ReviewRow { text: t.into() })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All review texts joined with single spaces, the corpus snapshot the
    /// analysis operations run over.
    pub fn concatenated(&self) -> String {
        self.rows
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Mean word count across the corpus, truncated to an integer.
    pub fn mean_word_count(&self) -> u32 {
        if self.rows.is_empty() {
            return 0;
        }
        let total: usize = self
            .rows
            .iter()
            .map(|r| r.text.split_whitespace().count())
            .sum();
        (total as f64 / self.rows.len() as f64) as u32
    }
}

/// The watched-movie catalog consumed by the style learner.
#[derive(Debug, Clone, Default)]
pub struct WatchedCatalog {
    pub rows: Vec<CatalogRow>,
}

impl WatchedCatalog {
    pub fn from_rows(rows: Vec<CatalogRow>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A normalized watched movie ready for the vector index.
///
/// Immutable once constructed; the id is content-derived so the same logical
/// movie always maps to the same record across runs.
#[derive(Debug, Clone)]
pub struct WatchedMovie {
    /// Slug of `"{name}-{year}"`, the dedup/primary key.
    pub id: String,
    pub title: String,
    pub year: i32,
    pub genres: String,
    pub runtime: u32,
    /// Derived text the embedding is computed from.
    pub embedding_context: String,
}

impl WatchedMovie {
    pub fn from_row(row: &CatalogRow) -> Self {
        let id = slug(&format!("{}-{}", row.name, row.year));
        let embedding_context = format!(
            "{} {} {} {}",
            row.name,
            row.genres,
            era_description(row.year),
            runtime_category(row.runtime)
        );
        Self {
            id,
            title: row.name.clone(),
            year: row.year,
            genres: row.genres.clone(),
            runtime: row.runtime,
            embedding_context,
        }
    }

    /// Metadata projection persisted alongside the embedding: every field
    /// except the embedding context, plus the two derived buckets.
    pub fn to_metadata(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "title": self.title,
            "year": self.year,
            "genres": self.genres,
            "runtime": self.runtime,
            "era": era_description(self.year),
            "length_category": runtime_category(self.runtime),
        })
    }
}

/// The movie to generate a review for.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub title: String,
    pub year: i32,
    pub genres: Vec<String>,
    /// Runtime in minutes.
    pub runtime: u32,
}

impl QueryContext {
    /// Derives the same embedding text shape as ingestion, so query and index
    /// vectors are computed from comparable input.
    pub fn embedding_context(&self) -> String {
        format!(
            "{} {} {} {}",
            self.title,
            self.genres.join(" "),
            era_description(self.year),
            runtime_category(self.runtime)
        )
    }
}

/// Stylistic dimension a sentence pattern describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Opening,
    Transition,
    Closing,
    Comparative,
}

impl PatternKind {
    pub const ALL: [PatternKind; 4] = [
        PatternKind::Opening,
        PatternKind::Transition,
        PatternKind::Closing,
        PatternKind::Comparative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Opening => "opening",
            PatternKind::Transition => "transition",
            PatternKind::Closing => "closing",
            PatternKind::Comparative => "comparative",
        }
    }
}

/// One recurring sentence pattern mined from the review corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentencePattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub pattern: String,
}

/// Canonical fallback set substituted when pattern mining does not yield
/// exactly four entries.
pub fn fallback_patterns() -> Vec<SentencePattern> {
    vec![
        SentencePattern {
            kind: PatternKind::Opening,
            pattern: "Starts with director mention".to_string(),
        },
        SentencePattern {
            kind: PatternKind::Transition,
            pattern: "However, despite the".to_string(),
        },
        SentencePattern {
            kind: PatternKind::Closing,
            pattern: "Ends with rating justification".to_string(),
        },
        SentencePattern {
            kind: PatternKind::Comparative,
            pattern: "Reminds me of...".to_string(),
        },
    ]
}

/// Sentiment distribution over a review corpus. A valid result has each
/// score in `[0, 1]` and the three summing to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl SentimentScores {
    /// Whether the scores satisfy the analysis contract.
    pub fn is_valid(&self) -> bool {
        let in_range =
            |v: f64| (0.0..=1.0).contains(&v);
        in_range(self.positive)
            && in_range(self.negative)
            && in_range(self.neutral)
            && ((self.positive + self.negative + self.neutral) - 1.0).abs() <= 1e-6
    }
}

/// Aggregate description of a person's review-writing habits.
///
/// Produced once per learning run; immutable for the lifetime of a
/// generation session.
#[derive(Debug, Clone)]
pub struct StyleProfile {
    /// Always exactly four entries, one per [`PatternKind`].
    pub sentence_patterns: Vec<SentencePattern>,
    /// Mean word count across the reference reviews.
    pub average_length: u32,
    /// `None` when sentiment analysis degraded to an unknown result.
    pub sentiment_scores: Option<SentimentScores>,
    /// Distinct film/director references, in order of first mention.
    pub common_references: Vec<String>,
}

impl StyleProfile {
    pub fn pattern(&self, kind: PatternKind) -> Option<&SentencePattern> {
        self.sentence_patterns.iter().find(|p| p.kind == kind)
    }
}

/// Per-dimension scores describing how closely a generated review matches
/// the learned style. The four pattern scores are in `[0, 1]`; `length` is
/// unclamped and can go negative when the output length is wildly off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub length: f64,
    pub opening: f64,
    pub transition: f64,
    pub closing: f64,
    pub comparative: f64,
}

/// Output of the review generator.
#[derive(Debug, Clone)]
pub struct GeneratedReview {
    pub text: String,
    pub confidence: ConfidenceBreakdown,
    /// Common references from the style profile echoed in the text.
    pub key_elements_used: Vec<String>,
}

/// Coarse decade bucket used in embedding text and stored metadata.
pub fn era_description(year: i32) -> &'static str {
    match year {
        y if y >= 2020 => "2020s contemporary film",
        y if y >= 2010 => "2010s modern film",
        y if y >= 2000 => "2000s film",
        y if y >= 1990 => "1990s film",
        y if y >= 1980 => "1980s film",
        y if y >= 1970 => "1970s film",
        y if y >= 1960 => "1960s film",
        _ => "pre-1960 classic film",
    }
}

/// Coarse runtime bucket used in embedding text and stored metadata.
pub fn runtime_category(minutes: u32) -> &'static str {
    match minutes {
        m if m < 40 => "short_film",
        m if m < 80 => "featurette",
        m if m < 120 => "theatrical_film",
        m if m < 160 => "directors_cut",
        _ => "cinematic_epic",
    }
}

/// Content-derived identifier: lowercase, alphanumeric runs kept, everything
/// else collapsed into single hyphens.
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_era_boundaries() {
        let cases = [
            (2050, "2020s contemporary film"),
            (2023, "2020s contemporary film"),
            (2020, "2020s contemporary film"),
            (2019, "2010s modern film"),
            (2010, "2010s modern film"),
            (2009, "2000s film"),
            (2000, "2000s film"),
            (1990, "1990s film"),
            (1980, "1980s film"),
            (1970, "1970s film"),
            (1960, "1960s film"),
            (1959, "pre-1960 classic film"),
            (1900, "pre-1960 classic film"),
            (0, "pre-1960 classic film"),
        ];
        for (year, expected) in cases {
            assert_eq!(era_description(year), expected, "year {}", year);
        }
    }

    #[test]
    fn test_runtime_boundaries() {
        let cases = [
            (0, "short_film"),
            (39, "short_film"),
            (40, "featurette"),
            (79, "featurette"),
            (80, "theatrical_film"),
            (119, "theatrical_film"),
            (120, "directors_cut"),
            (159, "directors_cut"),
            (160, "cinematic_epic"),
            (500, "cinematic_epic"),
        ];
        for (minutes, expected) in cases {
            assert_eq!(runtime_category(minutes), expected, "minutes {}", minutes);
        }
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Inception-2010"), "inception-2010");
        assert_eq!(slug("The Lord of the Rings-2001"), "the-lord-of-the-rings-2001");
        assert_eq!(slug("  WALL·E-2008 "), "wall-e-2008");
        assert_eq!(slug("8½-1963"), "8-1963");
    }

    #[test]
    fn test_watched_movie_from_row() {
        let row = CatalogRow {
            name: "Inception".to_string(),
            year: 2010,
            genres: "Action,Sci-Fi".to_string(),
            runtime: 148,
        };
        let movie = WatchedMovie::from_row(&row);
        assert_eq!(movie.id, "inception-2010");
        assert_eq!(
            movie.embedding_context,
            "Inception Action,Sci-Fi 2010s modern film directors_cut"
        );
    }

    #[test]
    fn test_metadata_projection() {
        let movie = WatchedMovie::from_row(&CatalogRow {
            name: "Inception".to_string(),
            year: 2010,
            genres: "Action,Sci-Fi".to_string(),
            runtime: 148,
        });
        let metadata = movie.to_metadata();
        assert_eq!(metadata["id"], "inception-2010");
        assert_eq!(metadata["title"], "Inception");
        assert_eq!(metadata["year"], 2010);
        assert_eq!(metadata["genres"], "Action,Sci-Fi");
        assert_eq!(metadata["runtime"], 148);
        assert_eq!(metadata["era"], "2010s modern film");
        assert_eq!(metadata["length_category"], "directors_cut");
        // The embedding context is never projected into metadata.
        assert!(metadata.get("embedding_context").is_none());
    }

    #[test]
    fn test_query_context_matches_ingestion_shape() {
        let query = QueryContext {
            title: "Inception".to_string(),
            year: 2010,
            genres: vec!["Action".to_string(), "Sci-Fi".to_string()],
            runtime: 148,
        };
        assert_eq!(
            query.embedding_context(),
            "Inception Action Sci-Fi 2010s modern film directors_cut"
        );
    }

    #[test]
    fn test_mean_word_count_truncates() {
        let corpus = ReviewCorpus::from_texts(["one two three", "one two three four"]);
        // (3 + 4) / 2 = 3.5 -> 3
        assert_eq!(corpus.mean_word_count(), 3);
    }

    #[test]
    fn test_sentiment_contract() {
        let ok = SentimentScores {
            positive: 0.5,
            negative: 0.3,
            neutral: 0.2,
        };
        assert!(ok.is_valid());

        let bad_sum = SentimentScores {
            positive: 0.5,
            negative: 0.3,
            neutral: 0.1,
        };
        assert!(!bad_sum.is_valid());

        let out_of_range = SentimentScores {
            positive: 1.2,
            negative: -0.4,
            neutral: 0.2,
        };
        assert!(!out_of_range.is_valid());
    }

    #[test]
    fn test_fallback_patterns_cover_all_kinds() {
        let fallback = fallback_patterns();
        assert_eq!(fallback.len(), 4);
        for kind in PatternKind::ALL {
            assert!(fallback.iter().any(|p| p.kind == kind));
        }
    }
}
