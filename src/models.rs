use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Metric vocabulary understood by the judge parser.
///
/// Declaration order is the serialization order of a [`JudgeMetricSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    Helpfulness,
    Directness,
    Grammaticality,
    Relevance,
    Edge,
    Supposition,
    Creativity,
    Coherence,
    Diversity,
}

/// Rubric used when judging a generated story
pub const STORY_METRICS: [Metric; 8] = [
    Metric::Helpfulness,
    Metric::Directness,
    Metric::Grammaticality,
    Metric::Relevance,
    Metric::Edge,
    Metric::Supposition,
    Metric::Creativity,
    Metric::Coherence,
];

/// Rubric used when judging a candidate prompt before any story exists
pub const CANDIDATE_METRICS: [Metric; 2] = [Metric::Relevance, Metric::Diversity];

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Helpfulness => "Helpfulness",
            Metric::Directness => "Directness",
            Metric::Grammaticality => "Grammaticality",
            Metric::Relevance => "Relevance",
            Metric::Edge => "Edge",
            Metric::Supposition => "Supposition",
            Metric::Creativity => "Creativity",
            Metric::Coherence => "Coherence",
            Metric::Diversity => "Diversity",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ();

    /// Case-insensitive match against the metric vocabulary
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        STORY_METRICS
            .iter()
            .chain(CANDIDATE_METRICS.iter())
            .find(|m| m.name().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or(())
    }
}

/// Score scale a judge is asked to answer on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JudgeScale {
    /// 0 or 1
    Binary,
    /// 0 through 5
    ZeroToFive,
}

impl JudgeScale {
    pub fn max(&self) -> u8 {
        match self {
            JudgeScale::Binary => 1,
            JudgeScale::ZeroToFive => 5,
        }
    }
}

/// Parsed judge scores keyed by metric
pub type JudgeMetricSet = BTreeMap<Metric, u8>;

/// Why a judge reply line was excluded from the metric set
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ParseWarningKind {
    #[error("missing \": \" delimiter")]
    MissingDelimiter,
    #[error("score {0:?} is not an integer")]
    InvalidScore(String),
    #[error("unknown metric {0:?}")]
    UnknownMetric(String),
    #[error("score {score} is outside the 0-{max} scale")]
    OutOfScale { score: i64, max: u8 },
}

/// A single unparseable line from a judge reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub line: String,
    pub kind: ParseWarningKind,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.line, self.kind)
    }
}

/// Outcome of one judge call: whatever parsed plus what did not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub metrics: JudgeMetricSet,
    pub warnings: Vec<ParseWarning>,
    pub raw_reply: String,
}

impl JudgeVerdict {
    /// Mean of the parsed scores; `None` when nothing parsed
    pub fn average(&self) -> Option<f64> {
        if self.metrics.is_empty() {
            return None;
        }
        let sum: f64 = self.metrics.values().map(|&v| f64::from(v)).sum();
        Some(sum / self.metrics.len() as f64)
    }

    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn score(&self, metric: Metric) -> Option<u8> {
        self.metrics.get(&metric).copied()
    }
}

/// A candidate prompt with its relevance, diversity and combined score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub prompt: String,
    pub relevance: f64,
    pub diversity: f64,
    pub final_score: f64,
}

/// A candidate prompt ranked by the judged quality of the story it produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgedCandidate {
    pub prompt: String,
    pub story: String,
    pub verdict: JudgeVerdict,
    pub average_score: Option<f64>,
}

/// Candidates sorted best-first. Never empty.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult<T> {
    entries: Vec<T>,
}

impl<T> RankedResult<T> {
    /// Wrap entries that are already sorted. Returns `None` for an empty list.
    pub fn from_sorted(entries: Vec<T>) -> Option<Self> {
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn best(&self) -> &T {
        &self.entries[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// False for every value built by `from_sorted`
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }
}

/// Rows ready to be written as CSV
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Counters reported once a batch finishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub mode: String,
    pub rows_total: usize,
    pub rows_processed: usize,
    pub rows_skipped: usize,
    pub elapsed_secs: f64,
    /// Processed rows per second
    pub throughput: f64,
    pub mean_row_latency_secs: Option<f64>,
}
