use crate::error::{ResultsError, ResultsResult};
use crate::models::{CandidateRow, ColumnNames, Config, DataSourceMode};
use log::debug;
use std::fs;

pub struct ResultsScraper {
    client: reqwest::Client,
}

impl ResultsScraper {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Load the candidate rows from whichever source the configuration names.
    pub async fn load(&self, config: &Config) -> ResultsResult<Vec<CandidateRow>> {
        let content = match config.data_source_mode {
            DataSourceMode::Internet => self.fetch_url(&config.source_url).await?,
            DataSourceMode::Local => {
                let path = config
                    .local_file
                    .as_deref()
                    .ok_or_else(|| ResultsError::Config("local_file is not set".to_string()))?;
                self.read_file(path)?
            }
        };
        parse_candidates(&content, &config.columns)
    }

    pub fn read_file(&self, file_path: &str) -> ResultsResult<String> {
        println!("📄 Reading results from: {}", file_path);
        Ok(fs::read_to_string(file_path)?)
    }

    pub async fn fetch_url(&self, url: &str) -> ResultsResult<String> {
        println!("🌐 Fetching results from: {}", url);

        let response = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|source| ResultsError::Fetch { url: url.to_string(), source })?;

        if !response.status().is_success() {
            return Err(ResultsError::HttpStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let content = response
            .text()
            .await
            .map_err(|source| ResultsError::Fetch { url: url.to_string(), source })?;
        println!("   ✅ Received {} bytes", content.len());
        Ok(content)
    }
}

struct ColumnIndexes {
    district_code: usize,
    district_name: usize,
    candidate_name: usize,
    affiliation: usize,
    popular_vote: usize,
    final_totals: usize,
    count_status: usize,
}

impl ColumnIndexes {
    fn resolve(headers: &csv::StringRecord, columns: &ColumnNames) -> ResultsResult<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ResultsError::MissingField(name.to_string()))
        };
        Ok(Self {
            district_code: find(&columns.district_code)?,
            district_name: find(&columns.district_name)?,
            candidate_name: find(&columns.candidate_name)?,
            affiliation: find(&columns.affiliation)?,
            popular_vote: find(&columns.popular_vote)?,
            final_totals: find(&columns.final_totals)?,
            count_status: find(&columns.count_status)?,
        })
    }
}

/// Parse the feed body into candidate rows, dropping rows without a district code.
pub fn parse_candidates(content: &str, columns: &ColumnNames) -> ResultsResult<Vec<CandidateRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let idx = ColumnIndexes::resolve(&headers, columns)?;

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for record in reader.records() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or("").to_string();

        let district_code = cell(idx.district_code);
        if district_code.trim().is_empty() {
            dropped += 1;
            continue;
        }

        rows.push(CandidateRow {
            district_code,
            district_name: cell(idx.district_name),
            candidate_name: cell(idx.candidate_name),
            affiliation: cell(idx.affiliation),
            popular_vote_percentage: cell(idx.popular_vote),
            final_totals: cell(idx.final_totals),
            initial_count_status: cell(idx.count_status),
        });
    }

    debug!("parsed {} candidate rows, dropped {} without a district code", rows.len(), dropped);
    Ok(rows)
}
