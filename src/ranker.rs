use crate::error::{RankError, RankResult};
use crate::models::{RankedResult, ScoredCandidate};
use crate::providers::EmbeddingProvider;
use crate::similarity::{cosine_similarity, pairwise_matrix};
use std::cmp::Ordering;
use std::sync::Arc;

pub const DEFAULT_ALPHA: f64 = 0.8;
pub const DEFAULT_BETA: f64 = 0.2;

/// Sort best-first by final score; equal scores keep their input order
pub(crate) fn sort_by_final_score(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
    });
}

/// Reject an empty seed or an empty candidate list
pub(crate) fn check_input(seed: &str, candidates: &[String]) -> RankResult<()> {
    if seed.trim().is_empty() {
        return Err(RankError::EmptyInput("seed prompt is empty".to_string()));
    }
    if candidates.is_empty() {
        return Err(RankError::EmptyInput("no candidate prompts".to_string()));
    }
    Ok(())
}

/// Ranks candidates by `alpha * relevance + beta * diversity`
pub struct EmbeddingRanker {
    provider: Arc<dyn EmbeddingProvider>,
    alpha: f64,
    beta: f64,
}

impl EmbeddingRanker {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
        }
    }

    pub fn with_weights(mut self, alpha: f64, beta: f64) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    /// Score and rank `candidates` against `seed`.
    ///
    /// Relevance is the cosine similarity between seed and candidate. Diversity is
    /// one minus the mean of the candidate's row in the pairwise similarity
    /// matrix; the row includes the candidate's similarity to itself.
    pub async fn rank(
        &self,
        seed: &str,
        candidates: &[String],
    ) -> RankResult<RankedResult<ScoredCandidate>> {
        check_input(seed, candidates)?;

        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(seed.to_string());
        texts.extend(candidates.iter().cloned());

        let mut vectors = self.provider.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(RankError::Provider(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        let candidate_vectors = vectors.split_off(1);
        let seed_vector = &vectors[0];

        let pairwise = pairwise_matrix(&candidate_vectors)?;
        let n = candidate_vectors.len() as f64;

        let mut scored = Vec::with_capacity(candidates.len());
        for (i, prompt) in candidates.iter().enumerate() {
            let relevance = cosine_similarity(seed_vector, &candidate_vectors[i])?;
            let diversity = 1.0 - pairwise[i].iter().sum::<f64>() / n;

            scored.push(ScoredCandidate {
                prompt: prompt.clone(),
                relevance,
                diversity,
                final_score: self.alpha * relevance + self.beta * diversity,
            });
        }

        sort_by_final_score(&mut scored);
        RankedResult::from_sorted(scored)
            .ok_or_else(|| RankError::EmptyInput("no candidate prompts".to_string()))
    }
}
