// Precinct-level results, as published after each election.

use std::path::Path;

use anc_core::builder::ResultsBuilder;

use crate::pipeline::config_reader::ResultSource;
use crate::pipeline::io_common::*;
use crate::pipeline::*;

fn parse_votes(s: &str) -> Result<u64, String> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<u64>()
        .map_err(|_| format!("invalid number of votes {:?}", s))
}

/// Adds the rows of one results file to the builder.
///
/// Contests that are not for a single member district are skipped.
pub fn read_results(
    path: &Path,
    source: &ResultSource,
    builder: &mut ResultsBuilder,
) -> PipelineResult<usize> {
    let rows = read_csv_rows(path)?;
    let header = match rows.first() {
        Some(h) => h,
        None => {
            warn!("read_results: {} is empty", path.display());
            return Ok(0);
        }
    };
    let cols = &source.columns;
    let contest_idx = require_column(path, header, "contestName", &cols.contest_name)?;
    let name_idx = require_column(path, header, "candidateName", &cols.candidate_name)?;
    let votes_idx = require_column(path, header, "votes", &cols.votes)?;
    let year_idx = optional_column(header, &cols.election_year);
    if year_idx.is_none() && source.election_year.is_none() {
        whatever!(
            "{}: no election year column and no electionYear in the configuration",
            path.display()
        )
    }
    let prefix = source.smd_prefix.as_deref().unwrap_or(DEFAULT_SMD_PREFIX);

    let mut issues = RowIssues::new(path);
    let mut kept: usize = 0;
    let mut other_contests: usize = 0;
    for (idx, row) in rows.iter().enumerate().skip(1) {
        let lineno = idx + 1;
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let contest = cell(row, Some(contest_idx)).trim();
        let smd_id = match smd_code(contest, prefix) {
            Some(x) => x,
            None => {
                other_contests += 1;
                continue;
            }
        };
        let candidate_name = match non_empty(cell(row, Some(name_idx))) {
            Some(x) => x,
            None => {
                issues.record(lineno, "empty candidate name".to_string());
                continue;
            }
        };
        let votes = match parse_votes(cell(row, Some(votes_idx))) {
            Ok(x) => x,
            Err(msg) => {
                issues.record(lineno, msg);
                continue;
            }
        };
        let year = match (non_empty(cell(row, year_idx)), source.election_year) {
            (Some(y), _) => match y.parse::<i32>() {
                Ok(x) => x,
                Err(_) => {
                    issues.record(lineno, format!("invalid election year {:?}", y));
                    continue;
                }
            },
            (None, Some(y)) => y,
            (None, None) => {
                issues.record(lineno, "missing election year".to_string());
                continue;
            }
        };
        if let Err(e) = builder.add_row(year, &smd_id, contest, &candidate_name, votes) {
            issues.record(lineno, e.to_string());
            continue;
        }
        kept += 1;
    }
    issues.finish(kept)?;
    debug!(
        "read_results: {}: {} rows kept, {} rows of other contests",
        path.display(),
        kept,
        other_contests
    );
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config_reader::ResultColumns;
    use std::fs;

    fn source(year: Option<i32>) -> ResultSource {
        ResultSource {
            file_path: "results.csv".to_string(),
            election_year: year,
            smd_prefix: None,
            columns: ResultColumns {
                election_year: Some(vec!["Year".to_string()]),
                contest_name: vec!["ContestName".to_string()],
                candidate_name: vec!["Candidate".to_string()],
                votes: vec!["Votes".to_string()],
            },
        }
    }

    fn write_results(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("results.csv");
        fs::write(&p, content).unwrap();
        (dir, p)
    }

    #[test]
    fn votes_with_separators() {
        assert_eq!(parse_votes("1,204"), Ok(1204));
        assert_eq!(parse_votes(" 7 "), Ok(7));
        assert!(parse_votes("-3").is_err());
    }

    #[test]
    fn rows_of_other_contests_are_skipped() {
        let (_dir, p) = write_results(
            "Year,ContestName,Candidate,Votes\n\
             2022,ADVISORY NEIGHBORHOOD COMMISSIONER 2B04,Ann Lee,\"1,020\"\n\
             2022,ADVISORY NEIGHBORHOOD COMMISSIONER 2B04,Bo Chen,980\n\
             2022,ADVISORY NEIGHBORHOOD COMMISSIONER 2B04,Under Votes,30\n\
             2022,MAYOR,Someone,5000\n\
             2022,ADVISORY NEIGHBORHOOD COMMISSIONER 2B04,Cy Diaz,many\n",
        );
        let mut builder = ResultsBuilder::new(&ResultRules::default());
        let kept = read_results(&p, &source(None), &mut builder).unwrap();
        assert_eq!(kept, 3);
        assert_eq!(builder.excluded_rows(), 1);
        let results = builder.build().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].smd_id, "smd_2B04");
        assert_eq!(results[0].candidate_name, "Ann Lee");
        assert_eq!(results[0].votes, 1020);
        assert_eq!(results[0].total_votes, 2000);
        assert_eq!(results[0].margin_of_victory, 40);
    }

    #[test]
    fn names_with_the_delimiter_are_row_issues() {
        let (_dir, p) = write_results(
            "Year,ContestName,Candidate,Votes\n\
             2022,ANC 3C02,Ann Lee,50\n\
             2022,ANC 3C02,Bo | Chen,70\n\
             2022,ANC 3C03,Cy Diaz,12\n",
        );
        let mut builder = ResultsBuilder::new(&ResultRules::default());
        let kept = read_results(&p, &source(None), &mut builder).unwrap();
        assert_eq!(kept, 2);
        let results = builder.build().unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.candidate_name.as_str()).collect();
        assert_eq!(names, vec!["Ann Lee", "Cy Diaz"]);
        assert_eq!(results[0].margin_of_victory, 50);
    }

    #[test]
    fn year_from_the_configuration() {
        let (_dir, p) = write_results(
            "ContestName,Candidate,Votes\nANC 1A01,Ann Lee,10\n",
        );
        let mut builder = ResultsBuilder::new(&ResultRules::default());
        read_results(&p, &source(Some(2020)), &mut builder).unwrap();
        let results = builder.build().unwrap();
        assert_eq!(results[0].election_year, 2020);

        let mut builder = ResultsBuilder::new(&ResultRules::default());
        assert!(read_results(&p, &source(None), &mut builder).is_err());
    }
}
