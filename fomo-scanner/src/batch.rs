//! Bounded parallel scoring.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, info};

use fomo_common::config::BatchConfig;

use crate::data::Candidate;
use crate::scoring::{ScoreError, ScoredOpportunity, ScoringPipeline};

/// Scores candidates concurrently, one spawned task each.
///
/// A failing or panicking task drops its candidate and never affects the rest.
pub struct BatchScorer {
    pipeline: Arc<ScoringPipeline>,
    max_concurrency: usize,
    min_keep_score: u8,
}

impl BatchScorer {
    pub fn new(pipeline: Arc<ScoringPipeline>, config: &BatchConfig) -> Self {
        Self {
            pipeline,
            max_concurrency: config.max_concurrency.max(1),
            min_keep_score: config.min_keep_score,
        }
    }

    pub async fn score_all(&self, candidates: Vec<Candidate>) -> Vec<ScoredOpportunity> {
        let total = candidates.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::with_capacity(total);

        for candidate in candidates {
            let sem = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&self.pipeline);
            let id = candidate.id.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed
                let _permit = sem.acquire_owned().await.ok();
                pipeline.score(&candidate).await
            });
            handles.push((id, handle));
        }

        let mut kept = Vec::new();
        let mut failed = 0usize;
        let mut below_threshold = 0usize;

        for (id, handle) in handles {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(join_error) => {
                    debug!(id = %id, error = %join_error, "Scoring task aborted");
                    Err(ScoreError::Panicked { id: id.clone() })
                }
            };

            match outcome {
                Ok(opp) if opp.fomo_score >= self.min_keep_score => kept.push(opp),
                Ok(_) => below_threshold += 1,
                Err(e) => {
                    debug!(id = %id, error = %e, "Candidate dropped");
                    failed += 1;
                }
            }
        }

        info!(
            candidates = total,
            kept = kept.len(),
            failed,
            below_threshold,
            "Batch scoring complete"
        );
        kept
    }
}
