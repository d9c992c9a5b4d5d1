use crate::error::RankResult;
use crate::models::{
    CANDIDATE_METRICS, JudgeMetricSet, JudgeScale, JudgeVerdict, Metric, ParseWarning,
    ParseWarningKind, STORY_METRICS,
};
use crate::providers::CompletionProvider;
use std::sync::Arc;
use tracing::debug;

/// Question shown to the judge for each story metric
fn story_question(metric: Metric) -> &'static str {
    match metric {
        Metric::Helpfulness => {
            "Does the story contribute to the plot, character development, or themes?"
        }
        Metric::Directness => "Does the story stay focused and move the plot forward?",
        Metric::Grammaticality => "Is the story grammatically correct and easy to read?",
        Metric::Relevance => "Does the story stay on-topic and relevant to its theme or prompt?",
        Metric::Edge => "Does the story include unique or surprising elements?",
        Metric::Supposition => "Does the story explore hypothetical situations or provoke analysis?",
        Metric::Creativity => "How original and imaginative is the story?",
        Metric::Coherence => "Is the language in the story coherent for the reader?",
        Metric::Diversity => "Does the story differ from other stories written for the same prompt?",
    }
}

fn candidate_question(metric: Metric) -> &'static str {
    match metric {
        Metric::Relevance => "How closely the prompt relates to the starting prompt (scale: 0 to 5).",
        Metric::Diversity => {
            "How unique and distinct the prompt is compared to other prompts (scale: 0 to 5)."
        }
        _ => "How well the prompt satisfies this metric (scale: 0 to 5).",
    }
}

fn metric_lines(metrics: &[Metric], question: fn(Metric) -> &'static str) -> String {
    metrics
        .iter()
        .map(|m| format!("{}: {}", m, question(*m)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Instruction asking for binary story scores, optionally against a reference story
pub fn story_instruction(prompt: &str, story: &str, reference_story: Option<&str>) -> String {
    let metrics = metric_lines(&STORY_METRICS, story_question);

    match reference_story {
        Some(reference) => format!(
            "You are an evaluator. I will provide you with a prompt, a template story and a submission.\n\
             I will also provide a question for each of those metrics, and you will return 1 if the submission is better than the template story,\n\
             0 if template story is better than submission, as a score for that metric. Just answer with the name of the metric and the score, nothing else.\n\
             Answer with one line per metric in the form `Metric: score`.\n\n\
             Prompt:\n{prompt}\n\n\
             Template story:\n{reference}\n\n\
             Submission:\n{story}\n\n\
             Metrics:\n{metrics}\n"
        ),
        None => format!(
            "You are an evaluator. I will provide you with a prompt and a submission.\n\
             I will also provide a question for each of those metrics, and you will return 1 if the answer is positive,\n\
             0 if negative, as a score for that metric. Just answer with the name of the metric and the score, nothing else.\n\
             Answer with one line per metric in the form `Metric: score`.\n\n\
             Prompt:\n{prompt}\n\n\
             Submission:\n{story}\n\n\
             Metrics:\n{metrics}\n"
        ),
    }
}

/// Instruction asking for 0-5 relevance and diversity scores of a candidate prompt
pub fn candidate_instruction(seed: &str, candidate: &str) -> String {
    let metrics = metric_lines(&CANDIDATE_METRICS, candidate_question);

    format!(
        "You are an expert evaluator tasked with scoring prompts based on their relevance and diversity compared to the starting prompt.\n\
         I will provide you with a starting prompt and candidate prompt. I will also provide you with a metric name and a question for each of those on a scale of 0-5.\n\
         Just answer with the name of the metric and the score, nothing else.\n\
         Answer with one line per metric in the form `Metric: score`.\n\n\
         Starting Prompt: {seed}\n\
         Candidate Prompt: {candidate}\n\n\
         Metrics:\n{metrics}\n"
    )
}

/// Parse a judge reply into metric scores plus warnings for every unreadable line.
///
/// Each non-blank line is split on the first `": "`. Metric names are matched
/// case-insensitively against `rubric`; markdown bullets and bold markers around
/// the name or score are ignored. A repeated metric keeps its last score.
pub fn parse_judge_reply(reply: &str, scale: JudgeScale, rubric: &[Metric]) -> JudgeVerdict {
    let mut metrics = JudgeMetricSet::new();
    let mut warnings = Vec::new();

    for raw_line in reply.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line, scale, rubric) {
            Ok((metric, score)) => {
                metrics.insert(metric, score);
            }
            Err(kind) => warnings.push(ParseWarning {
                line: line.to_string(),
                kind,
            }),
        }
    }

    JudgeVerdict {
        metrics,
        warnings,
        raw_reply: reply.to_string(),
    }
}

fn parse_line(
    line: &str,
    scale: JudgeScale,
    rubric: &[Metric],
) -> Result<(Metric, u8), ParseWarningKind> {
    let (name, score_text) = line
        .split_once(": ")
        .ok_or(ParseWarningKind::MissingDelimiter)?;

    let name = strip_markup(name);
    let metric = name
        .parse::<Metric>()
        .ok()
        .filter(|m| rubric.contains(m))
        .ok_or_else(|| ParseWarningKind::UnknownMetric(name.to_string()))?;

    let score_text = strip_score_markup(score_text);
    let score: i64 = score_text
        .parse()
        .map_err(|_| ParseWarningKind::InvalidScore(score_text.to_string()))?;

    if score < 0 || score > i64::from(scale.max()) {
        return Err(ParseWarningKind::OutOfScale {
            score,
            max: scale.max(),
        });
    }

    Ok((metric, score as u8))
}

fn strip_markup(text: &str) -> &str {
    text.trim()
        .trim_start_matches(['-', '*', ' '])
        .trim_end_matches(['*', ' '])
}

/// Bold markers only; a leading `-` is the score's sign
fn strip_score_markup(text: &str) -> &str {
    text.trim().trim_matches('*').trim()
}

/// Scores stories and candidate prompts through a completion provider
pub struct JudgeScorer {
    completion: Arc<dyn CompletionProvider>,
    temperature: f64,
    max_tokens: u32,
    candidate_max_tokens: u32,
}

impl JudgeScorer {
    pub fn new(completion: Arc<dyn CompletionProvider>) -> Self {
        Self {
            completion,
            temperature: 0.01,
            max_tokens: 500,
            candidate_max_tokens: 200,
        }
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32, candidate_max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self.candidate_max_tokens = candidate_max_tokens;
        self
    }

    /// Judge a story on the binary story rubric.
    ///
    /// With a reference story each score says whether `story` beats the reference.
    pub async fn judge(
        &self,
        prompt: &str,
        story: &str,
        reference_story: Option<&str>,
    ) -> RankResult<JudgeVerdict> {
        let instruction = story_instruction(prompt, story, reference_story);
        let reply = self
            .completion
            .complete(&instruction, self.max_tokens, self.temperature)
            .await?;
        debug!(reply = %reply, "Story judge reply");

        Ok(parse_judge_reply(&reply, JudgeScale::Binary, &STORY_METRICS))
    }

    /// Judge a candidate prompt against its seed on the 0-5 relevance/diversity rubric
    pub async fn judge_candidate(&self, seed: &str, candidate: &str) -> RankResult<JudgeVerdict> {
        let instruction = candidate_instruction(seed, candidate);
        let reply = self
            .completion
            .complete(&instruction, self.candidate_max_tokens, self.temperature)
            .await?;
        debug!(reply = %reply, "Candidate judge reply");

        Ok(parse_judge_reply(&reply, JudgeScale::ZeroToFive, &CANDIDATE_METRICS))
    }
}
