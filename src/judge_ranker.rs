use crate::error::{RankError, RankResult};
use crate::judge::JudgeScorer;
use crate::models::{CANDIDATE_METRICS, JudgedCandidate, Metric, RankedResult, ScoredCandidate};
use crate::providers::CompletionProvider;
use crate::ranker::{DEFAULT_ALPHA, DEFAULT_BETA, check_input, sort_by_final_score};
use crate::templates::story_instruction;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Best-first by average score. Candidates without any parsed score go last.
fn compare_average(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub struct JudgeRanker {
    completion: Arc<dyn CompletionProvider>,
    scorer: JudgeScorer,
    story_temperature: f64,
    story_max_tokens: u32,
    alpha: f64,
    beta: f64,
}

impl JudgeRanker {
    pub fn new(completion: Arc<dyn CompletionProvider>, scorer: JudgeScorer) -> Self {
        Self {
            completion,
            scorer,
            story_temperature: 0.2,
            story_max_tokens: 1000,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
        }
    }

    pub fn with_story_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.story_temperature = temperature;
        self.story_max_tokens = max_tokens;
        self
    }

    pub fn with_weights(mut self, alpha: f64, beta: f64) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    pub fn scorer(&self) -> &JudgeScorer {
        &self.scorer
    }

    /// Write a finished story from a structured prompt
    pub async fn generate_story(&self, prompt: &str) -> RankResult<String> {
        self.completion
            .complete(
                &story_instruction(prompt),
                self.story_max_tokens,
                self.story_temperature,
            )
            .await
    }

    /// Generate a story per candidate, judge it against `reference_story`, and
    /// rank candidates by average judge score.
    ///
    /// Returns the ranking and a copy of its best entry.
    pub async fn rank_candidates(
        &self,
        seed: &str,
        candidates: &[String],
        reference_story: &str,
    ) -> RankResult<(RankedResult<JudgedCandidate>, JudgedCandidate)> {
        check_input(seed, candidates)?;

        let mut judged = Vec::with_capacity(candidates.len());
        for (i, candidate) in candidates.iter().enumerate() {
            debug!(candidate = i + 1, "Generating story for candidate");
            let story = self.generate_story(candidate).await?;

            debug!(candidate = i + 1, "Judging generated story");
            let verdict = self
                .scorer
                .judge(candidate, &story, Some(reference_story))
                .await?;

            judged.push(JudgedCandidate {
                prompt: candidate.clone(),
                story,
                average_score: verdict.average(),
                verdict,
            });
        }

        judged.sort_by(|a, b| compare_average(a.average_score, b.average_score));

        let ranked = RankedResult::from_sorted(judged)
            .ok_or_else(|| RankError::EmptyInput("no candidate prompts".to_string()))?;
        let best = ranked.best().clone();
        Ok((ranked, best))
    }

    /// Rank candidates by judge-rated relevance (0-5) and diversity (0-5).
    ///
    /// A candidate whose reply lacks either score cannot be ranked, so the
    /// whole call fails with [`RankError::PartialJudgeResult`].
    pub async fn rank_by_judged_relevance(
        &self,
        seed: &str,
        candidates: &[String],
    ) -> RankResult<RankedResult<ScoredCandidate>> {
        check_input(seed, candidates)?;

        let mut scored = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let verdict = self.scorer.judge_candidate(seed, candidate).await?;

            let missing: Vec<Metric> = CANDIDATE_METRICS
                .iter()
                .copied()
                .filter(|m| verdict.score(*m).is_none())
                .collect();
            if !missing.is_empty() {
                return Err(RankError::PartialJudgeResult { missing });
            }

            let relevance = f64::from(verdict.score(Metric::Relevance).unwrap_or_default());
            let diversity = f64::from(verdict.score(Metric::Diversity).unwrap_or_default());
            scored.push(ScoredCandidate {
                prompt: candidate.clone(),
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
