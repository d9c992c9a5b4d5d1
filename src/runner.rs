use crate::config::Config;
use crate::dataset::{Dataset, DatasetRow};
use crate::error::RankResult;
use crate::judge::JudgeScorer;
use crate::judge_ranker::JudgeRanker;
use crate::models::{BatchSummary, JudgeVerdict, OutputTable, RankedResult, ScoredCandidate};
use crate::providers::{CompletionProvider, EmbeddingProvider};
use crate::ranker::EmbeddingRanker;
use crate::templates::{TemplateKind, expand};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What the batch driver does with each dataset row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Rank `Response N` candidates by embedding relevance and diversity
    #[default]
    Embedding,
    /// Rank `Response N` candidates by judge-rated relevance and diversity
    PreGeneration,
    /// Write a story per candidate and rank candidates by the judged story
    PostGeneration,
    /// Expand each prompt with a template and generate candidate responses
    Generate,
    /// Judge the human story against a chain-of-thought generated story
    Evaluate,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Embedding => "embedding",
            Mode::PreGeneration => "pre-generation",
            Mode::PostGeneration => "post-generation",
            Mode::Generate => "generate",
            Mode::Evaluate => "evaluate",
        }
    }

    /// Ranking modes read candidates from `Response N` columns
    pub fn needs_responses(&self) -> bool {
        matches!(
            self,
            Mode::Embedding | Mode::PreGeneration | Mode::PostGeneration
        )
    }
}

fn format_score(score: f64) -> String {
    score.to_string()
}

fn format_average(average: Option<f64>) -> String {
    average.map(format_score).unwrap_or_default()
}

fn format_latency(secs: f64) -> String {
    format!("{:.3}", secs)
}

/// Drives one mode over every dataset row
pub struct Runner {
    config: Config,
    mode: Mode,
    completion: Arc<dyn CompletionProvider>,
    embedding_ranker: EmbeddingRanker,
    judge_ranker: JudgeRanker,
}

impl Runner {
    /// Create a runner whose rankers share the given providers
    pub fn new(
        config: Config,
        mode: Mode,
        completion: Arc<dyn CompletionProvider>,
        embedding: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let scorer = JudgeScorer::new(completion.clone()).with_sampling(
            config.judge_temperature,
            config.judge_max_tokens,
            config.candidate_judge_max_tokens,
        );
        let judge_ranker = JudgeRanker::new(completion.clone(), scorer)
            .with_story_sampling(config.story_temperature, config.story_max_tokens)
            .with_weights(config.alpha, config.beta);
        let embedding_ranker =
            EmbeddingRanker::new(embedding).with_weights(config.alpha, config.beta);

        Self {
            config,
            mode,
            completion,
            embedding_ranker,
            judge_ranker,
        }
    }

    /// Output columns for this mode with `candidates` candidates per row
    pub fn headers(&self, candidates: usize) -> Vec<String> {
        let mut headers = Vec::new();
        match self.mode {
            Mode::Embedding | Mode::PreGeneration => {
                headers.extend(["Starting Prompt".to_string(), "Human Story".to_string()]);
                for i in 1..=candidates {
                    headers.push(format!("Prompt {}", i));
                    headers.push(format!("Relevance Score {}", i));
                    headers.push(format!("Diversity Score {}", i));
                    headers.push(format!("Final Score {}", i));
                }
                headers.extend(best_columns());
            }
            Mode::PostGeneration => {
                headers.extend(["Starting Prompt".to_string(), "Human Story".to_string()]);
                for i in 1..=candidates {
                    headers.push(format!("Prompt {}", i));
                    headers.push(format!("Average Score {}", i));
                }
                headers.extend(best_columns());
            }
            Mode::Generate => {
                headers.extend(["Prompt".to_string(), "Human Story".to_string()]);
                headers.extend((1..=candidates).map(|i| format!("Response {}", i)));
                headers.extend((1..=candidates).map(|i| format!("Latency {} (s)", i)));
            }
            Mode::Evaluate => {
                headers.extend(
                    [
                        "Prompt",
                        "Human Story",
                        "Generated Story",
                        "Human Story Score",
                        "Generated Story Score",
                        "Evaluation Latency",
                    ]
                    .map(String::from),
                );
            }
        }
        headers
    }

    /// Process every row in order.
    ///
    /// Rows failing with a row-scoped error are logged and left out of the
    /// table; any other error stops the batch.
    pub async fn run(&self, dataset: &Dataset) -> RankResult<(OutputTable, BatchSummary)> {
        let started = Instant::now();
        let rows = &dataset.rows;
        let total_rows = rows.len();
        let candidates = match self.mode {
            Mode::Generate => self.config.num_candidates,
            _ => dataset.response_columns,
        };

        let mut table = OutputTable {
            headers: self.headers(candidates),
            rows: Vec::with_capacity(total_rows),
        };
        let mut latencies = Vec::with_capacity(total_rows);
        let row_delay = Duration::try_from_secs_f64(self.config.row_delay_secs)
            .ok()
            .filter(|d| !d.is_zero());

        for (i, row) in rows.iter().enumerate() {
            info!(
                row = row.index,
                "Processing row {}/{} ({})",
                i + 1,
                total_rows,
                self.mode.name()
            );

            let row_started = Instant::now();
            match self.process_row(row).await {
                Ok(record) => {
                    latencies.push(row_started.elapsed().as_secs_f64());
                    table.rows.push(record);
                }
                Err(e) if e.is_row_scoped() => {
                    warn!(row = row.index, error = %e, "Skipping row");
                }
                Err(e) => {
                    error!(row = row.index, error = %e, "Aborting batch");
                    return Err(e);
                }
            }

            if let Some(delay) = row_delay.filter(|_| i + 1 < total_rows) {
                tokio::time::sleep(delay).await;
            }
        }

        let summary = self.summarize(total_rows, &latencies, started.elapsed().as_secs_f64());
        info!(
            processed = summary.rows_processed,
            skipped = summary.rows_skipped,
            "Batch finished in {:.2}s",
            summary.elapsed_secs
        );
        Ok((table, summary))
    }

    fn summarize(&self, total_rows: usize, latencies: &[f64], elapsed_secs: f64) -> BatchSummary {
        let processed = latencies.len();
        let throughput = if elapsed_secs > 0.0 {
            processed as f64 / elapsed_secs
        } else {
            0.0
        };
        let mean_row_latency_secs = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / processed as f64)
        };

        BatchSummary {
            mode: self.mode.name().to_string(),
            rows_total: total_rows,
            rows_processed: processed,
            rows_skipped: total_rows - processed,
            elapsed_secs,
            throughput,
            mean_row_latency_secs,
        }
    }

    async fn process_row(&self, row: &DatasetRow) -> RankResult<Vec<String>> {
        match self.mode {
            Mode::Embedding => {
                let started = Instant::now();
                let ranked = self
                    .embedding_ranker
                    .rank(&row.prompt, &row.responses)
                    .await?;
                Ok(scored_record(row, &ranked, started.elapsed().as_secs_f64()))
            }
            Mode::PreGeneration => {
                let started = Instant::now();
                let ranked = self
                    .judge_ranker
                    .rank_by_judged_relevance(&row.prompt, &row.responses)
                    .await?;
                Ok(scored_record(row, &ranked, started.elapsed().as_secs_f64()))
            }
            Mode::PostGeneration => self.post_generation_row(row).await,
            Mode::Generate => self.generate_row(row).await,
            Mode::Evaluate => self.evaluate_row(row).await,
        }
    }

    async fn post_generation_row(&self, row: &DatasetRow) -> RankResult<Vec<String>> {
        let started = Instant::now();
        let (ranked, best) = self
            .judge_ranker
            .rank_candidates(&row.prompt, &row.responses, &row.human_story)
            .await?;
        let latency = started.elapsed().as_secs_f64();
        debug!(row = row.index, candidates = ranked.len(), "Ranked candidates");

        for candidate in ranked.iter() {
            log_partial_verdict(row.index, &candidate.verdict);
        }

        let mut record = vec![row.prompt.clone(), row.human_story.clone()];
        for candidate in ranked.iter() {
            record.push(candidate.prompt.clone());
            record.push(format_average(candidate.average_score));
        }
        record.push(best.prompt);
        record.push(format_average(best.average_score));
        record.push(format_latency(latency));
        Ok(record)
    }

    async fn generate_row(&self, row: &DatasetRow) -> RankResult<Vec<String>> {
        let prompt = expand(self.config.template, &row.prompt);

        let mut responses = Vec::with_capacity(self.config.num_candidates);
        let mut latencies = Vec::with_capacity(self.config.num_candidates);
        for n in 1..=self.config.num_candidates {
            debug!(row = row.index, response = n, "Generating candidate");
            let started = Instant::now();
            let response = self
                .completion
                .complete(&prompt, self.config.max_tokens, self.config.temperature)
                .await?;
            latencies.push(format_latency(started.elapsed().as_secs_f64()));
            responses.push(response);
        }

        let mut record = vec![row.prompt.clone(), row.human_story.clone()];
        record.extend(responses);
        record.extend(latencies);
        Ok(record)
    }

    async fn evaluate_row(&self, row: &DatasetRow) -> RankResult<Vec<String>> {
        let started = Instant::now();
        let generated = self
            .judge_ranker
            .generate_story(&expand(TemplateKind::Cot, &row.prompt))
            .await?;

        let scorer = self.judge_ranker.scorer();
        let human = scorer.judge(&row.prompt, &row.human_story, None).await?;
        let machine = scorer.judge(&row.prompt, &generated, None).await?;
        let latency = started.elapsed().as_secs_f64();

        log_partial_verdict(row.index, &human);
        log_partial_verdict(row.index, &machine);

        Ok(vec![
            row.prompt.clone(),
            row.human_story.clone(),
            generated,
            format_average(human.average()),
            format_average(machine.average()),
            format_latency(latency),
        ])
    }
}

fn best_columns() -> [String; 3] {
    [
        "Best Prompt".to_string(),
        "Best Prompt Score".to_string(),
        "Latency".to_string(),
    ]
}

fn scored_record(row: &DatasetRow, ranked: &RankedResult<ScoredCandidate>, latency: f64) -> Vec<String> {
    let mut record = vec![row.prompt.clone(), row.human_story.clone()];
    for candidate in ranked.entries() {
        record.push(candidate.prompt.clone());
        record.push(format_score(candidate.relevance));
        record.push(format_score(candidate.diversity));
        record.push(format_score(candidate.final_score));
    }
    let best = ranked.best();
    record.push(best.prompt.clone());
    record.push(format_score(best.final_score));
    record.push(format_latency(latency));
    record
}

fn log_partial_verdict(row: usize, verdict: &JudgeVerdict) {
    if !verdict.is_partial() {
        return;
    }
    warn!(
        row,
        parsed = verdict.metrics.len(),
        "Judge reply only partially parsed"
    );
    for warning in &verdict.warnings {
        warn!(row, "Unreadable judge line: {}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RankError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Same vector for every text
    struct ConstantEmbedding;

    #[async_trait]
    impl EmbeddingProvider for ConstantEmbedding {
        async fn embed(&self, texts: &[String]) -> RankResult<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.6, 0.8]).collect())
        }
    }

    /// Fails any batch that contains `poisoned`
    struct PoisonedEmbedding {
        poisoned: String,
    }

    #[async_trait]
    impl EmbeddingProvider for PoisonedEmbedding {
        async fn embed(&self, texts: &[String]) -> RankResult<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t == &self.poisoned) {
                return Err(RankError::Provider("503 Service Unavailable".to_string()));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct QueuedCompletion {
        replies: Mutex<VecDeque<RankResult<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl QueuedCompletion {
        fn new(replies: Vec<RankResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for QueuedCompletion {
        async fn complete(&self, prompt: &str, _max_tokens: u32, _temperature: f64) -> RankResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RankError::Provider("no scripted reply".to_string())))
        }
    }

    fn row(index: usize, prompt: &str, responses: &[&str]) -> DatasetRow {
        DatasetRow {
            index,
            prompt: prompt.to_string(),
            human_story: format!("story {}", index),
            responses: responses.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn dataset(rows: Vec<DatasetRow>) -> Dataset {
        let response_columns = rows.first().map(|r| r.responses.len()).unwrap_or(0);
        Dataset {
            rows,
            response_columns,
        }
    }

    fn ok(text: &str) -> RankResult<String> {
        Ok(text.to_string())
    }

    fn column(table: &OutputTable, name: &str) -> usize {
        table.headers.iter().position(|h| h == name).unwrap()
    }

    #[tokio::test]
    async fn test_embedding_mode_identical_responses() {
        let runner = Runner::new(
            Config::default(),
            Mode::Embedding,
            QueuedCompletion::new(vec![]),
            Arc::new(ConstantEmbedding),
        );
        let rows = vec![row(0, "A hero's journey", &["same", "same", "same"])];

        let (table, summary) = runner.run(&dataset(rows)).await.unwrap();

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.headers.len(), 2 + 3 * 4 + 3);
        let record = &table.rows[0];
        assert_eq!(record.len(), table.headers.len());
        assert_eq!(record[column(&table, "Starting Prompt")], "A hero's journey");

        let finals: Vec<&String> = (1..=3)
            .map(|i| &record[column(&table, &format!("Final Score {}", i))])
            .collect();
        assert_eq!(finals[0], finals[1]);
        assert_eq!(finals[1], finals[2]);
        assert_eq!(record[column(&table, "Best Prompt")], "same");
        assert_eq!(record[column(&table, "Best Prompt Score")], *finals[0]);

        assert_eq!(summary.rows_processed, 1);
        assert_eq!(summary.rows_skipped, 0);
        assert_eq!(summary.mode, "embedding");
    }

    #[tokio::test]
    async fn test_embedding_mode_best_is_first_on_ties() {
        let runner = Runner::new(
            Config::default(),
            Mode::Embedding,
            QueuedCompletion::new(vec![]),
            Arc::new(ConstantEmbedding),
        );
        let rows = vec![row(0, "A hero's journey", &["first", "second", "third"])];

        let (table, _) = runner.run(&dataset(rows)).await.unwrap();

        let record = &table.rows[0];
        assert_eq!(record[column(&table, "Prompt 1")], "first");
        assert_eq!(record[column(&table, "Best Prompt")], "first");
    }

    #[tokio::test]
    async fn test_failing_row_is_skipped() {
        let runner = Runner::new(
            Config::default(),
            Mode::Embedding,
            QueuedCompletion::new(vec![]),
            Arc::new(PoisonedEmbedding {
                poisoned: "bad".to_string(),
            }),
        );
        let rows = vec![
            row(0, "first prompt", &["a", "b"]),
            row(1, "second prompt", &["bad", "c"]),
            row(2, "third prompt", &["d", "e"]),
        ];

        let (table, summary) = runner.run(&dataset(rows)).await.unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "first prompt");
        assert_eq!(table.rows[1][0], "third prompt");
        assert_eq!(summary.rows_total, 3);
        assert_eq!(summary.rows_processed, 2);
        assert_eq!(summary.rows_skipped, 1);
        assert!(summary.mean_row_latency_secs.is_some());
    }

    #[tokio::test]
    async fn test_empty_prompt_aborts_batch() {
        let runner = Runner::new(
            Config::default(),
            Mode::Embedding,
            QueuedCompletion::new(vec![]),
            Arc::new(ConstantEmbedding),
        );
        let rows = vec![row(0, "fine", &["a"]), row(1, "  ", &["b"])];

        let err = runner.run(&dataset(rows)).await.unwrap_err();
        assert!(matches!(err, RankError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn test_pre_generation_partial_reply_skips_row() {
        let completion = QueuedCompletion::new(vec![
            ok("Relevance: 4"),
            ok("Relevance: 5\nDiversity: 2"),
        ]);
        let runner = Runner::new(
            Config::default(),
            Mode::PreGeneration,
            completion,
            Arc::new(ConstantEmbedding),
        );
        let rows = vec![row(0, "skipped", &["x"]), row(1, "kept", &["y"])];

        let (table, summary) = runner.run(&dataset(rows)).await.unwrap();

        assert_eq!(summary.rows_skipped, 1);
        assert_eq!(table.rows.len(), 1);
        let record = &table.rows[0];
        assert_eq!(record[column(&table, "Relevance Score 1")], "5");
        assert_eq!(record[column(&table, "Diversity Score 1")], "2");
    }

    #[tokio::test]
    async fn test_post_generation_columns() {
        let completion = QueuedCompletion::new(vec![
            ok("story a"),
            ok("Helpfulness: 0"),
            ok("story b"),
            ok("Helpfulness: 1\nCoherence: 1"),
        ]);
        let runner = Runner::new(
            Config::default(),
            Mode::PostGeneration,
            completion,
            Arc::new(ConstantEmbedding),
        );
        let rows = vec![row(0, "seed", &["a", "b"])];

        let (table, _) = runner.run(&dataset(rows)).await.unwrap();

        assert_eq!(
            &table.headers[..6],
            &["Starting Prompt", "Human Story", "Prompt 1", "Average Score 1", "Prompt 2", "Average Score 2"]
        );
        let record = &table.rows[0];
        assert_eq!(record[2], "b");
        assert_eq!(record[3], "1");
        assert_eq!(record[4], "a");
        assert_eq!(record[5], "0");
        assert_eq!(record[column(&table, "Best Prompt")], "b");
    }

    #[tokio::test]
    async fn test_generate_mode_calls_once_per_candidate() {
        let completion = QueuedCompletion::new(vec![ok("one"), ok("two")]);
        let config = Config {
            num_candidates: 2,
            template: TemplateKind::Cot,
            ..Config::default()
        };
        let runner = Runner::new(
            config,
            Mode::Generate,
            completion.clone(),
            Arc::new(ConstantEmbedding),
        );
        let rows = vec![row(0, "A hero's journey", &[])];

        let (table, _) = runner.run(&dataset(rows)).await.unwrap();

        assert_eq!(
            table.headers,
            vec!["Prompt", "Human Story", "Response 1", "Response 2", "Latency 1 (s)", "Latency 2 (s)"]
        );
        assert_eq!(table.rows[0][2], "one");
        assert_eq!(table.rows[0][3], "two");
        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].starts_with("Please think step by step"));
        assert!(prompts[0].ends_with("A hero's journey"));
    }

    #[tokio::test]
    async fn test_generate_mode_failed_call_skips_row() {
        let completion = QueuedCompletion::new(vec![
            ok("one"),
            Err(RankError::Provider("timeout".to_string())),
        ]);
        let config = Config {
            num_candidates: 2,
            ..Config::default()
        };
        let runner = Runner::new(config, Mode::Generate, completion, Arc::new(ConstantEmbedding));

        let (table, summary) = runner.run(&dataset(vec![row(0, "seed", &[])])).await.unwrap();

        assert!(table.rows.is_empty());
        assert_eq!(summary.rows_skipped, 1);
    }

    #[tokio::test]
    async fn test_evaluate_mode_scores_both_stories() {
        let completion = QueuedCompletion::new(vec![
            ok("A generated tale."),
            ok("Helpfulness: 1\nDirectness: 0"),
            ok("Helpfulness: 1\nDirectness: 1"),
        ]);
        let runner = Runner::new(
            Config::default(),
            Mode::Evaluate,
            completion.clone(),
            Arc::new(ConstantEmbedding),
        );

        let (table, _) = runner.run(&dataset(vec![row(0, "A hero's journey", &[])])).await.unwrap();

        let record = &table.rows[0];
        assert_eq!(record[column(&table, "Generated Story")], "A generated tale.");
        assert_eq!(record[column(&table, "Human Story Score")], "0.5");
        assert_eq!(record[column(&table, "Generated Story Score")], "1");

        let prompts = completion.prompts.lock().unwrap();
        assert!(prompts[0].contains("Please think step by step"));
        assert!(prompts[1].contains("story 0"));
        assert!(!prompts[1].contains("Template story"));
    }

    #[tokio::test]
    async fn test_empty_dataset() {
        let runner = Runner::new(
            Config::default(),
            Mode::Embedding,
            QueuedCompletion::new(vec![]),
            Arc::new(ConstantEmbedding),
        );

        let empty = Dataset {
            rows: vec![],
            response_columns: 2,
        };
        let (table, summary) = runner.run(&empty).await.unwrap();

        assert!(table.rows.is_empty());
        assert_eq!(table.headers.len(), 2 + 2 * 4 + 3);
        assert!(table.headers.contains(&"Final Score 2".to_string()));
        assert_eq!(summary.rows_total, 0);
        assert_eq!(summary.mean_row_latency_secs, None);
    }

    #[tokio::test]
    async fn test_csv_round_trip_through_runner() {
        use crate::dataset::load_rows;
        use crate::output::write_table;
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("prompts.csv");
        let mut file = std::fs::File::create(&input).unwrap();
        write!(
            file,
            "Prompt,Human Story,Response 1,Response 2,Response 3\n\
             A hero's journey,Once upon a time,same,same,same\n"
        )
        .unwrap();

        let runner = Runner::new(
            Config::default(),
            Mode::Embedding,
            QueuedCompletion::new(vec![]),
            Arc::new(ConstantEmbedding),
        );
        let dataset = load_rows(&input, Mode::Embedding.needs_responses()).unwrap();
        let (table, summary) = runner.run(&dataset).await.unwrap();

        let output = dir.path().join("out").join("ranked.csv");
        write_table(&output, &table).unwrap();

        let mut reader = csv::Reader::from_path(&output).unwrap();
        let headers = reader.headers().unwrap().clone();
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(summary.rows_processed, 1);
        assert_eq!(records.len(), 1);

        let field = |name: &str| {
            let idx = headers.iter().position(|h| h == name).unwrap();
            records[0][idx].to_string()
        };
        assert_eq!(field("Starting Prompt"), "A hero's journey");
        assert_eq!(field("Final Score 1"), field("Final Score 2"));
        assert_eq!(field("Final Score 2"), field("Final Score 3"));
        assert_eq!(field("Best Prompt"), "same");
        assert_eq!(field("Best Prompt Score"), field("Final Score 1"));
    }

    #[test]
    fn test_mode_needs_responses() {
        assert!(Mode::Embedding.needs_responses());
        assert!(Mode::PostGeneration.needs_responses());
        assert!(!Mode::Generate.needs_responses());
        assert!(!Mode::Evaluate.needs_responses());
    }
}
