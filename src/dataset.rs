use crate::error::{RankError, RankResult};
use std::path::Path;

pub const PROMPT_COLUMN: &str = "Prompt";
pub const HUMAN_STORY_COLUMN: &str = "Human Story";
const RESPONSE_PREFIX: &str = "Response ";

/// One input row: a seed prompt, its human-written story and any candidate responses
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    /// Zero-based position in the input file
    pub index: usize,
    pub prompt: String,
    pub human_story: String,
    /// `Response N` cells ordered by N
    pub responses: Vec<String>,
}

/// Rows of one input file plus how many `Response N` columns it declares
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<DatasetRow>,
    pub response_columns: usize,
}

/// `Response N` columns as (N, column index), sorted by N
fn response_columns(headers: &csv::StringRecord) -> Vec<(usize, usize)> {
    let mut columns: Vec<(usize, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, h)| {
            h.trim()
                .strip_prefix(RESPONSE_PREFIX)
                .and_then(|n| n.trim().parse::<usize>().ok())
                .map(|n| (n, idx))
        })
        .collect();
    columns.sort_by_key(|(n, _)| *n);
    columns
}

fn find_column(headers: &csv::StringRecord, name: &str) -> RankResult<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| RankError::Configuration(format!("CSV must have a '{}' column", name)))
}

/// Load every row of a prompt/story CSV.
///
/// With `require_responses` at least one `Response N` column must be present.
/// Missing files and columns fail before any row is returned.
pub fn load_rows(path: impl AsRef<Path>, require_responses: bool) -> RankResult<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RankError::Configuration(format!(
            "Input file not found: {}",
            path.display()
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            RankError::Configuration(format!("Failed to open CSV file {}: {}", path.display(), e))
        })?;

    let headers = reader
        .headers()
        .map_err(|e| RankError::Configuration(format!("Failed to read CSV headers: {}", e)))?
        .clone();
    let prompt_idx = find_column(&headers, PROMPT_COLUMN)?;
    let story_idx = find_column(&headers, HUMAN_STORY_COLUMN)?;
    let responses = response_columns(&headers);
    if require_responses && responses.is_empty() {
        return Err(RankError::Configuration(
            "CSV must have at least one 'Response N' column".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|e| {
            RankError::Configuration(format!("Failed to read CSV row {}: {}", index + 1, e))
        })?;
        let cell = |idx: usize| record.get(idx).unwrap_or_default().to_string();

        rows.push(DatasetRow {
            index,
            prompt: cell(prompt_idx),
            human_story: cell(story_idx),
            responses: responses.iter().map(|(_, idx)| cell(*idx)).collect(),
        });
    }

    tracing::info!("Loaded {} rows from {:?}", rows.len(), path);
    Ok(Dataset {
        rows,
        response_columns: responses.len(),
    })
}
