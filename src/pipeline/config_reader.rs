use crate::pipeline::*;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    /// The offset of the local time, for example "-05:00".
    #[serde(rename = "timezoneOffset")]
    pub timezone_offset: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct TablePaths {
    pub districts: String,
    pub people: String,
    pub candidates: String,
    pub commissioners: String,
    #[serde(rename = "candidateStatuses")]
    pub candidate_statuses: String,
}

/// The accepted header names of each canonical column of a candidate export.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ExportColumns {
    #[serde(rename = "smdId")]
    pub smd_id: Vec<String>,
    #[serde(rename = "candidateName")]
    pub candidate_name: Vec<String>,
    #[serde(rename = "pickupDate")]
    pub pickup_date: Option<Vec<String>>,
    #[serde(rename = "filedDate")]
    pub filed_date: Option<Vec<String>>,
    #[serde(rename = "candidateStatus")]
    pub candidate_status: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ExportSource {
    /// "csv" or "xlsx"
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "smdPrefix")]
    pub smd_prefix: Option<String>,
    pub columns: ExportColumns,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResultColumns {
    #[serde(rename = "electionYear")]
    pub election_year: Option<Vec<String>>,
    #[serde(rename = "contestName")]
    pub contest_name: Vec<String>,
    #[serde(rename = "candidateName")]
    pub candidate_name: Vec<String>,
    pub votes: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ResultSource {
    #[serde(rename = "filePath")]
    pub file_path: String,
    /// Used when the file has no election year column.
    #[serde(rename = "electionYear")]
    pub election_year: Option<i32>,
    #[serde(rename = "smdPrefix")]
    pub smd_prefix: Option<String>,
    pub columns: ResultColumns,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BuildRules {
    #[serde(rename = "electionYear")]
    pub election_year: i32,
    #[serde(rename = "redistrictingYear")]
    pub redistricting_year: Option<i32>,
    #[serde(rename = "matchThreshold")]
    pub match_threshold: Option<u8>,
    #[serde(rename = "defaultCandidateStatus")]
    pub default_candidate_status: Option<String>,
    #[serde(rename = "excludedResultLabels")]
    pub excluded_result_labels: Option<Vec<String>>,
}

impl BuildRules {
    pub fn resolution_rules(&self) -> ResolutionRules {
        let mut rules = ResolutionRules::new(self.election_year);
        if let Some(t) = self.match_threshold {
            rules.match_threshold = t;
        }
        if let Some(s) = &self.default_candidate_status {
            rules.default_candidate_status = s.clone();
        }
        rules
    }

    pub fn result_rules(&self) -> ResultRules {
        match &self.excluded_result_labels {
            Some(l) => ResultRules {
                excluded_labels: l.clone(),
            },
            None => ResultRules::default(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub tables: TablePaths,
    #[serde(rename = "exportSources", default)]
    pub export_sources: Vec<ExportSource>,
    #[serde(rename = "resultSources", default)]
    pub result_sources: Vec<ResultSource>,
    pub rules: BuildRules,
}

impl BuildConfig {
    /// The configured offset, or UTC-5 when none is set.
    pub fn timezone(&self) -> PipelineResult<FixedOffset> {
        match &self.output_settings.timezone_offset {
            Some(s) => parse_offset(s),
            None => parse_offset(DEFAULT_OFFSET),
        }
    }
}

const DEFAULT_OFFSET: &str = "-05:00";

/// Parses offsets written as "+HH:MM" or "-HH:MM".
pub fn parse_offset(s: &str) -> PipelineResult<FixedOffset> {
    s.trim().parse::<FixedOffset>().map_err(|_| {
        InvalidTimezoneSnafu {
            value: s.to_string(),
        }
        .build()
    })
}

pub fn read_config(path: &str) -> PipelineResult<BuildConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: BuildConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        assert_eq!(parse_offset("-05:00").unwrap().local_minus_utc(), -5 * 3600);
        assert_eq!(parse_offset("+05:30").unwrap().local_minus_utc(), 5 * 3600 + 1800);
        assert!(parse_offset("05:00").is_err());
        assert!(parse_offset("-5").is_err());
        assert!(parse_offset("abc").is_err());
        assert!(parse_offset("").is_err());
        assert!(parse_offset("-99999999:00").is_err());
        assert!(parse_offset("+99999999:00").is_err());
    }

    #[test]
    fn minimal_config() {
        let js = r#"{
            "outputSettings": {"outputDirectory": "build"},
            "tables": {
                "districts": "districts.csv",
                "people": "people.csv",
                "candidates": "candidates.csv",
                "commissioners": "commissioners.csv",
                "candidateStatuses": "candidate_statuses.csv"
            },
            "rules": {"electionYear": 2024}
        }"#;
        let config: BuildConfig = serde_json::from_str(js).unwrap();
        assert!(config.export_sources.is_empty());
        assert_eq!(config.timezone().unwrap().local_minus_utc(), -5 * 3600);
        let rules = config.rules.resolution_rules();
        assert_eq!(rules.match_threshold, 80);
        assert_eq!(rules.default_candidate_status, "Pulled papers");
        assert_eq!(config.rules.result_rules(), ResultRules::default());
    }
}
