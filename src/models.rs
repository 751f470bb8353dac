use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::{ResultsError, ResultsResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Data source configuration
    pub data_source_mode: DataSourceMode,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file: Option<String>,
    #[serde(default = "default_region_label")]
    pub region_label: String,
    #[serde(default)]
    pub leader_party: LeaderPartyLabel,
    #[serde(default)]
    pub seat_key: SeatKey,
    /// Parties that always get a column in the map output, zero-filled when absent.
    #[serde(default)]
    pub canonical_parties: Vec<String>,
    pub outputs: OutputPaths,
    #[serde(default)]
    pub columns: ColumnNames,
    pub party_table: PartyTable,
    #[serde(default)]
    pub colors: ColorScheme,
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataSourceMode {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "internet")]
    Internet,
}

/// Which label ends up in the `leadingParty` column of the map output.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum LeaderPartyLabel {
    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "canonical")]
    #[default]
    Canonical,
}

/// What the seat-count output is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SeatKey {
    #[serde(rename = "party")]
    #[default]
    Party,
    #[serde(rename = "color_category")]
    ColorCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPaths {
    pub map: String,
    pub seats: String,
}

/// Header names of the source feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub district_code: String,
    pub district_name: String,
    pub candidate_name: String,
    pub affiliation: String,
    pub popular_vote: String,
    pub final_totals: String,
    pub count_status: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            district_code: "Electoral District Code".to_string(),
            district_name: "Electoral District Name".to_string(),
            candidate_name: "Candidate's Ballot Name".to_string(),
            affiliation: "Affiliation".to_string(),
            popular_vote: "% of Popular Vote".to_string(),
            final_totals: "FinalTotals".to_string(),
            count_status: "Initial Count Status".to_string(),
        }
    }
}

/// Maps raw affiliation labels onto canonical party buckets.
///
/// Lookups use the trimmed label, so the `""` key covers blank and whitespace-only
/// affiliations. Labels with no mapping fall into `unmapped` when it is set and are
/// passed through verbatim otherwise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartyTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmapped: Option<String>,
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,
}

impl PartyTable {
    pub fn canonicalize(&self, label: &str) -> String {
        if let Some(bucket) = self.mappings.get(label.trim()) {
            return bucket.clone();
        }
        match &self.unmapped {
            Some(bucket) => bucket.clone(),
            None => label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorLabels {
    pub leading: String,
    pub won: String,
}

/// Derives the map color category from a canonical party and the count status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    pub complete_status: String,
    pub leading_suffix: String,
    pub won_suffix: String,
    pub labels: BTreeMap<String, ColorLabels>,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            complete_status: "Complete".to_string(),
            leading_suffix: "leading".to_string(),
            won_suffix: "won".to_string(),
            labels: BTreeMap::new(),
        }
    }
}

impl ColorScheme {
    pub fn category(&self, party: &str, status: &str) -> String {
        let won = status.trim() == self.complete_status;
        if let Some(labels) = self.labels.get(party) {
            return if won { labels.won.clone() } else { labels.leading.clone() };
        }
        let suffix = if won { &self.won_suffix } else { &self.leading_suffix };
        format!("{} {}", party, suffix)
    }
}

/// A named allow-list of district codes with its own output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub output: String,
    pub districts: Vec<String>,
}

fn default_region_label() -> String {
    "B.C.".to_string()
}

impl Default for Config {
    fn default() -> Self {
        let mappings = [
            ("Conservative Party", "Conservative"),
            ("BC NDP", "NDP"),
            ("BC Green Party", "Green"),
            ("Independent", "Independent/Unaffiliated"),
            ("", "Independent/Unaffiliated"),
        ]
        .into_iter()
        .map(|(raw, bucket)| (raw.to_string(), bucket.to_string()))
        .collect();

        Self {
            data_source_mode: DataSourceMode::Internet,
            source_url: "https://vs-postmedia-data.sfo2.digitaloceanspaces.com/elxn/elxn2024/elxn24-rest-results.csv".to_string(),
            local_file: None,
            region_label: default_region_label(),
            leader_party: LeaderPartyLabel::Canonical,
            seat_key: SeatKey::Party,
            canonical_parties: vec![
                "Conservative".to_string(),
                "NDP".to_string(),
                "Green".to_string(),
                "Independent/Unaffiliated".to_string(),
            ],
            outputs: OutputPaths {
                map: "data/output/current-results-map.csv".to_string(),
                seats: "data/output/current-results-seats.csv".to_string(),
            },
            columns: ColumnNames::default(),
            party_table: PartyTable {
                unmapped: None,
                mappings,
            },
            colors: ColorScheme::default(),
            regions: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> ResultsResult<()> {
        match self.data_source_mode {
            DataSourceMode::Internet if self.source_url.trim().is_empty() => {
                return Err(ResultsError::Config("source_url is empty".to_string()));
            }
            DataSourceMode::Local if self.local_file.as_deref().map_or(true, |f| f.trim().is_empty()) => {
                return Err(ResultsError::Config(
                    "local_file must be set when data_source_mode is \"local\"".to_string(),
                ));
            }
            _ => {}
        }

        let mut parties = std::collections::HashSet::new();
        for party in &self.canonical_parties {
            if !parties.insert(party.as_str()) {
                return Err(ResultsError::Config(format!("duplicate canonical party: {}", party)));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for region in &self.regions {
            if !seen.insert(region.name.as_str()) {
                return Err(ResultsError::Config(format!("duplicate region name: {}", region.name)));
            }
        }
        Ok(())
    }
}

/// One candidate in one district, as read from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub district_code: String,
    pub district_name: String,
    pub candidate_name: String,
    pub affiliation: String,
    pub popular_vote_percentage: String,
    pub final_totals: String,
    pub initial_count_status: String,
}

#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub candidate: CandidateRow,
    pub party: String,
    /// NaN when the feed value does not parse.
    pub vote_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistrictLeader {
    pub district_code: String,
    pub district_name: String,
    pub leading_affiliation: Option<String>,
    /// Canonical bucket of the leading affiliation.
    pub party: Option<String>,
    pub leading_candidate: Option<String>,
    pub leading_vote_pct: Option<f64>,
    pub final_totals: String,
    pub status: String,
    pub color_category: Option<String>,
}

impl DistrictLeader {
    pub fn leading_party(&self, label: LeaderPartyLabel) -> Option<&str> {
        match label {
            LeaderPartyLabel::Raw => self.leading_affiliation.as_deref(),
            LeaderPartyLabel::Canonical => self.party.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideDistrictRow {
    pub leader: DistrictLeader,
    /// Party -> vote percentage; parties with no value in this district are absent.
    pub party_votes: HashMap<String, f64>,
}

/// The district-level map table with its ordered party columns.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub party_columns: Vec<String>,
    pub rows: Vec<WideDistrictRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeatCountRow {
    pub region: String,
    /// Category -> districts led or won, in first-appearance order.
    pub counts: Vec<(String, usize)>,
}

impl SeatCountRow {
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, n)| n).sum()
    }

    #[cfg(test)]
    pub fn get(&self, category: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, n)| *n)
    }
}

/// Parse a `% of Popular Vote` cell; anything that is not a finite number becomes NaN.
pub fn parse_vote_percentage(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(f64::NAN)
}

pub fn normalize_row(row: &CandidateRow, table: &PartyTable) -> NormalizedRow {
    NormalizedRow {
        party: table.canonicalize(&row.affiliation),
        vote_pct: parse_vote_percentage(&row.popular_vote_percentage),
        candidate: row.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indy_only_table() -> PartyTable {
        PartyTable {
            unmapped: None,
            mappings: [("Independent", "Independent/Unaffiliated"), ("", "Independent/Unaffiliated")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn full_table() -> PartyTable {
        PartyTable {
            unmapped: Some("Other".to_string()),
            mappings: [
                ("Conservative Party", "Conservative"),
                ("BC NDP", "NDP"),
                ("BC Green Party", "Green"),
                ("Independent", "Independent"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        }
    }

    #[test]
    fn parses_percentages() {
        assert_eq!(parse_vote_percentage("54.8"), 54.8);
        assert_eq!(parse_vote_percentage("  12.5 "), 12.5);
        assert_eq!(parse_vote_percentage("100"), 100.0);
        assert!(parse_vote_percentage("N/A").is_nan());
        assert!(parse_vote_percentage("").is_nan());
        assert!(parse_vote_percentage("inf").is_nan());
    }

    #[test]
    fn independent_only_table_passes_other_labels_through() {
        let table = indy_only_table();
        assert_eq!(table.canonicalize(""), "Independent/Unaffiliated");
        assert_eq!(table.canonicalize(" "), "Independent/Unaffiliated");
        assert_eq!(table.canonicalize("Independent"), "Independent/Unaffiliated");
        assert_eq!(table.canonicalize("BC NDP"), "BC NDP");
    }

    #[test]
    fn full_table_buckets_unknown_labels() {
        let table = full_table();
        assert_eq!(table.canonicalize("Conservative Party"), "Conservative");
        assert_eq!(table.canonicalize("BC NDP"), "NDP");
        assert_eq!(table.canonicalize("BC Green Party"), "Green");
        assert_eq!(table.canonicalize("Independent"), "Independent");
        assert_eq!(table.canonicalize("Libertarian"), "Other");
        assert_eq!(table.canonicalize(""), "Other");
    }

    #[test]
    fn color_category_depends_on_status() {
        let mut scheme = ColorScheme::default();
        assert_eq!(scheme.category("NDP", "Complete"), "NDP won");
        assert_eq!(scheme.category("NDP", "In Progress"), "NDP leading");

        scheme.labels.insert(
            "Green".to_string(),
            ColorLabels { leading: "green-light".to_string(), won: "green-dark".to_string() },
        );
        assert_eq!(scheme.category("Green", "Complete"), "green-dark");
        assert_eq!(scheme.category("Green", ""), "green-light");
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.party_table.mappings, config.party_table.mappings);
        assert_eq!(parsed.canonical_parties, config.canonical_parties);
        assert_eq!(parsed.data_source_mode, DataSourceMode::Internet);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn validate_rejects_local_mode_without_file() {
        let config = Config {
            data_source_mode: DataSourceMode::Local,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ResultsError::Config(_))));
    }

    #[test]
    fn validate_rejects_duplicate_regions() {
        let region = RegionConfig {
            name: "metro".to_string(),
            output: "metro.csv".to_string(),
            districts: vec!["AAA".to_string()],
        };
        let config = Config {
            regions: vec![region.clone(), region],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_canonical_parties() {
        let config = Config {
            canonical_parties: vec!["NDP".to_string(), "Green".to_string(), "NDP".to_string()],
            ..Config::default()
        };
        match config.validate() {
            Err(ResultsError::Config(msg)) => assert!(msg.contains("NDP")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let text = r#"
data_source_mode = "local"
source_url = ""
local_file = "snapshot.csv"

[outputs]
map = "map.csv"
seats = "seats.csv"

[party_table]
unmapped = "Other"

[party_table.mappings]
"BC NDP" = "NDP"
"#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.region_label, "B.C.");
        assert_eq!(config.seat_key, SeatKey::Party);
        assert_eq!(config.columns.popular_vote, "% of Popular Vote");
        assert_eq!(config.colors.complete_status, "Complete");
        assert!(config.regions.is_empty());
        assert!(config.validate().is_ok());
    }
}
