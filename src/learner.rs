//! Style learning: batch ingestion of the watched catalog plus analysis
//! fan-out over the review corpus.
//!
//! Ingestion is idempotent (dedup by content-derived id) and tolerant of
//! partial failure: each batch runs under a bounded retry policy, and a
//! batch that exhausts its budget is logged and skipped — it never aborts
//! the run. The corpus analyses are the opposite: a transport failure there
//! fails the whole call, because a partial profile is never returned.

use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::analysis::TextAnalyzer;
use crate::config::IngestConfig;
use crate::embedding::EmbeddingClient;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::llm::CompletionClient;
use crate::models::{
    CatalogRow, ReviewCorpus, SentimentScores, StyleProfile, WatchedCatalog, WatchedMovie,
};
use crate::retry::RetryPolicy;

/// Learns a [`StyleProfile`] from a review corpus while ingesting the
/// watched catalog into the vector index.
pub struct StyleLearner {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingClient>,
    analyzer: TextAnalyzer,
    batch_size: usize,
    retry: RetryPolicy,
}

/// Vocabulary half of the dual analysis fan-out.
struct VocabularyAnalysis {
    average_length: u32,
    sentiment: Option<SentimentScores>,
    references: Vec<String>,
}

impl StyleLearner {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingClient>,
        llm: Arc<dyn CompletionClient>,
        ingest: &IngestConfig,
    ) -> Self {
        Self {
            index,
            embedder,
            analyzer: TextAnalyzer::new(llm),
            batch_size: ingest.batch_size,
            retry: RetryPolicy::new(
                ingest.max_attempts,
                Duration::from_secs(ingest.backoff_base_secs),
                Duration::from_secs(ingest.backoff_cap_secs),
            ),
        }
    }

    /// Ingest the catalog and produce the style profile.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyDataset`] when either input has no rows; any transport
    /// failure from the corpus analyses. Batch-level ingestion failures are
    /// logged and tolerated instead.
    pub async fn learn_style(
        &self,
        corpus: &ReviewCorpus,
        catalog: &WatchedCatalog,
    ) -> Result<StyleProfile> {
        validate_inputs(corpus, catalog)?;

        self.ingest_catalog(catalog).await;

        let text = corpus.concatenated();
        let (vocabulary, sentence_patterns) = tokio::try_join!(
            self.analyze_vocabulary(corpus, &text),
            self.analyzer.analyze_sentence_patterns(&text),
        )?;

        Ok(StyleProfile {
            sentence_patterns,
            average_length: vocabulary.average_length,
            sentiment_scores: vocabulary.sentiment,
            common_references: vocabulary.references,
        })
    }

    /// Process the catalog in fixed-size batches, strictly sequentially.
    /// A batch that fails all its retry attempts is skipped; its movies are
    /// simply absent from the index until a later run.
    async fn ingest_catalog(&self, catalog: &WatchedCatalog) {
        let total_batches = catalog.rows.len().div_ceil(self.batch_size);

        for (i, batch) in catalog.rows.chunks(self.batch_size).enumerate() {
            info!(batch = i + 1, total_batches, "processing watched-movie batch");

            if let Err(e) = self.retry.run(|| self.process_batch(batch)).await {
                error!(batch = i + 1, error = %e, "batch failed after retries, skipping");
            }
        }
    }

    async fn process_batch(&self, batch: &[CatalogRow]) -> Result<()> {
        // Dedup check is ordered before any embedding work: only rows whose
        // id is absent from the index survive.
        let mut new_movies = Vec::new();
        for row in batch {
            let movie = WatchedMovie::from_row(row);
            if self.index.get_by_id(&movie.id).await?.is_none() {
                new_movies.push(movie);
            }
        }

        if new_movies.is_empty() {
            debug!("all movies in batch already exist in the index");
            return Ok(());
        }

        debug!(count = new_movies.len(), "generating embeddings for new movies");

        let embeddings = try_join_all(
            new_movies
                .iter()
                .map(|movie| self.embedder.embed(&movie.embedding_context)),
        )
        .await?;

        let outcomes = join_all(new_movies.iter().zip(&embeddings).map(|(movie, embedding)| {
            self.index
                .store(&movie.id, &movie.title, movie.to_metadata(), embedding)
        }))
        .await;

        let rejected = outcomes.iter().filter(|stored| !**stored).count();
        if rejected > 0 {
            return Err(Error::Storage(format!(
                "{rejected} of {} records rejected by the index",
                outcomes.len()
            )));
        }

        Ok(())
    }

    async fn analyze_vocabulary(
        &self,
        corpus: &ReviewCorpus,
        text: &str,
    ) -> Result<VocabularyAnalysis> {
        let average_length = corpus.mean_word_count();

        let (sentiment, references) = tokio::try_join!(
            self.analyzer.analyze_sentiment(text),
            self.analyzer.extract_references(text),
        )?;

        Ok(VocabularyAnalysis {
            average_length,
            sentiment,
            references,
        })
    }
}

/// Validation step preceding the pipeline: empty inputs are configuration
/// errors naming the offending dataset, reported before any work starts.
fn validate_inputs(corpus: &ReviewCorpus, catalog: &WatchedCatalog) -> Result<()> {
    if corpus.is_empty() {
        return Err(Error::EmptyDataset {
            input: "review corpus",
        });
    }
    if catalog.is_empty() {
        return Err(Error::EmptyDataset {
            input: "watched catalog",
        });
    }
    Ok(())
}
