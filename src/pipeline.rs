use log::{debug, info, warn};

use anc_core::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};
use text_diff::print_diff;

use crate::pipeline::config_reader::*;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_export;
mod io_results;
mod io_review;

#[derive(Debug, Snafu)]
pub enum PipelineError {
    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Excel file {path} has no worksheet {sheet}"))]
    MissingWorksheet { path: String, sheet: String },
    #[snafu(display("Could not read {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Could not parse the configuration {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Could not open CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Could not serialize {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("Could not write {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Could not read the reference file {path}"))]
    ReadingReference {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("{path}: no column for {column} (tried {tried:?})"))]
    MissingColumn {
        path: String,
        column: String,
        tried: Vec<String>,
    },
    #[snafu(display("{path}: none of the rows could be read"))]
    NoSurvivingRows { path: String },
    #[snafu(display("Unknown provider {provider:?} for {path}"))]
    UnknownProvider { provider: String, path: String },
    #[snafu(display("Invalid timezone offset {value:?}, expected something like -05:00"))]
    InvalidTimezone { value: String },
    #[snafu(display("Invalid reference instant {value:?}"))]
    InvalidReferenceInstant {
        source: chrono::ParseError,
        value: String,
    },
    #[snafu(display("{source}"))]
    Core { source: CoreErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// The configuration and the directories of one run.
struct Workspace {
    config: BuildConfig,
    root: PathBuf,
    out_dir: PathBuf,
}

impl Workspace {
    fn open(config_path: &str, out: &Option<String>) -> PipelineResult<Workspace> {
        let config = read_config(config_path)?;
        let root = Path::new(config_path)
            .parent()
            .context(MissingParentDirSnafu {})?
            .to_path_buf();
        let out_dir = match (out, &config.output_settings.output_directory) {
            (Some(o), _) => PathBuf::from(o),
            (None, Some(o)) => root.join(o),
            (None, None) => root.join("build"),
        };
        info!("Workspace: root {:?}, output {:?}", root, out_dir);
        Ok(Workspace {
            config,
            root,
            out_dir,
        })
    }

    fn path(&self, p: &str) -> PathBuf {
        self.root.join(p)
    }

    fn load_tables(&self) -> PipelineResult<LoadedTables> {
        let paths = &self.config.tables;
        let mut districts = io_csv::read_districts(&self.path(&paths.districts))?;
        if let Some(year) = self.config.rules.redistricting_year {
            let before = districts.len();
            districts.retain(|d| d.redistricting_year.map(|y| y == year).unwrap_or(true));
            info!(
                "load_tables: {} of {} districts are from the {} redistricting",
                districts.len(),
                before,
                year
            );
        }
        let loaded = LoadedTables {
            districts,
            people: io_csv::read_people(&self.path(&paths.people))?,
            candidates: io_csv::read_candidates(&self.path(&paths.candidates))?,
            commissioners: io_csv::read_commissioners(&self.path(&paths.commissioners))?,
            statuses: io_csv::read_statuses(&self.path(&paths.candidate_statuses))?,
        };
        check_unique_ids(&loaded.people, &loaded.candidates).context(CoreSnafu {})?;
        Ok(loaded)
    }
}

struct LoadedTables {
    districts: Vec<District>,
    people: Vec<Person>,
    candidates: Vec<Candidate>,
    commissioners: Vec<Commissioner>,
    statuses: Vec<CandidateStatus>,
}

impl LoadedTables {
    fn tables(&self) -> Tables<'_> {
        Tables {
            districts: &self.districts,
            candidates: &self.candidates,
            people: &self.people,
            commissioners: &self.commissioners,
            statuses: &self.statuses,
        }
    }
}

/// Writes all the files, or none of them.
///
/// Each file is first written next to its destination and then renamed, so an
/// existing output is never replaced by a partial one.
fn write_outputs(files: &[(PathBuf, Vec<u8>)]) -> PipelineResult<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::new();
    for (path, content) in files.iter() {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context(WritingFileSnafu {
                path: dir.display().to_string(),
            })?;
        }
        let tmp = temp_path(path);
        let written = fs::write(&tmp, content).context(WritingFileSnafu {
            path: tmp.display().to_string(),
        });
        if let Err(e) = written {
            for (t, _) in staged.iter() {
                let _ = fs::remove_file(t);
            }
            return Err(e);
        }
        staged.push((tmp, path.as_path()));
    }
    for (tmp, path) in staged.iter() {
        fs::rename(tmp, path).context(WritingFileSnafu {
            path: path.display().to_string(),
        })?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Compares the produced content with a reference file, if one is given.
fn check_reference(produced: &[u8], reference: &Option<String>) -> PipelineResult<()> {
    if let Some(p) = reference {
        let expected = fs::read_to_string(p).context(ReadingReferenceSnafu { path: p })?;
        let actual = String::from_utf8_lossy(produced);
        if expected != actual {
            warn!("Found differences with the reference file {}", p);
            print_diff(expected.as_str(), actual.as_ref(), "\n");
            whatever!("Difference detected between the output and the reference {}", p)
        }
        info!("Output matches the reference {}", p);
    }
    Ok(())
}

fn reference_instant(at: &Option<String>, tz: FixedOffset) -> PipelineResult<DateTime<FixedOffset>> {
    match at {
        Some(s) => {
            let t = DateTime::parse_from_rfc3339(s).context(InvalidReferenceInstantSnafu { value: s })?;
            Ok(t.with_timezone(&tz))
        }
        None => Ok(Utc::now().with_timezone(&tz)),
    }
}

pub fn run_resolve(
    config_path: &str,
    out: &Option<String>,
    reference: &Option<String>,
) -> PipelineResult<()> {
    let ws = Workspace::open(config_path, out)?;
    let loaded = ws.load_tables()?;

    if ws.config.export_sources.is_empty() {
        whatever!("No export sources in {}", config_path)
    }
    let mut records: Vec<SourceRecord> = Vec::new();
    for source in ws.config.export_sources.iter() {
        let mut file_records = io_export::read_export(&ws.path(&source.file_path), source)?;
        records.append(&mut file_records);
    }
    debug!("run_resolve: {} records", records.len());

    let mut person_ids = IdSequence::for_people(&loaded.people);
    let mut candidate_ids = IdSequence::for_candidates(&loaded.candidates);
    let resolution = resolve_identities(
        &records,
        &loaded.tables(),
        &ws.config.rules.resolution_rules(),
        &mut person_ids,
        &mut candidate_ids,
    )
    .context(CoreSnafu {})?;

    if resolution.nothing_to_do() {
        info!(
            "Nothing to do: {} records already known, {} dropped",
            resolution.already_present,
            resolution.dropped.len()
        );
        return Ok(());
    }

    let review_dir = ws.out_dir.join("review");
    let new_people = io_review::proposals_csv(&resolution.new_people)?;
    let files = vec![
        (
            review_dir.join(io_review::HASH_CHANGES),
            io_review::hash_changes_csv(&resolution.hash_changes)?,
        ),
        (
            review_dir.join(io_review::NEW_CANDIDATES),
            io_review::proposals_csv(&resolution.new_candidates)?,
        ),
        (review_dir.join(io_review::NEW_PEOPLE), new_people.clone()),
    ];
    write_outputs(&files)?;
    info!(
        "Review the files in {} and set good_match to y or n",
        review_dir.display()
    );
    check_reference(&new_people, reference)
}

pub fn run_apply(
    config_path: &str,
    out: &Option<String>,
    review_dir: &Option<String>,
    reference: &Option<String>,
) -> PipelineResult<()> {
    let ws = Workspace::open(config_path, out)?;
    let loaded = ws.load_tables()?;
    let review_dir = match review_dir {
        Some(d) => PathBuf::from(d),
        None => ws.out_dir.join("review"),
    };

    let hash_changes = io_review::read_hash_changes(&review_dir.join(io_review::HASH_CHANGES))?;
    let mut proposals = io_review::read_proposals(&review_dir.join(io_review::NEW_CANDIDATES))?;
    proposals.append(&mut io_review::read_proposals(
        &review_dir.join(io_review::NEW_PEOPLE),
    )?);

    let applied = apply_review(
        &loaded.people,
        &loaded.candidates,
        &hash_changes,
        &proposals,
        &ws.config.rules.resolution_rules(),
    )
    .context(CoreSnafu {})?;

    let tables_dir = ws.out_dir.join("tables");
    let candidates = io_csv::candidates_csv(&applied.candidates)?;
    let files = vec![
        (tables_dir.join("people.csv"), io_csv::people_csv(&applied.people)?),
        (tables_dir.join("candidates.csv"), candidates.clone()),
    ];
    write_outputs(&files)?;
    check_reference(&candidates, reference)
}

pub fn run_districts(
    config_path: &str,
    out: &Option<String>,
    at: &Option<String>,
    reference: &Option<String>,
) -> PipelineResult<()> {
    let ws = Workspace::open(config_path, out)?;
    let loaded = ws.load_tables()?;
    let instant = reference_instant(at, ws.config.timezone()?)?;

    let rules = AggregationRules {
        election_year: Some(ws.config.rules.election_year),
    };
    let view = aggregate_districts(&loaded.tables(), &rules, &instant).context(CoreSnafu {})?;
    let content = io_csv::district_view_csv(&view)?;
    write_outputs(&[(ws.out_dir.join("districts.csv"), content.clone())])?;
    check_reference(&content, reference)
}

pub fn run_results(
    config_path: &str,
    out: &Option<String>,
    reference: &Option<String>,
) -> PipelineResult<()> {
    let ws = Workspace::open(config_path, out)?;
    if ws.config.result_sources.is_empty() {
        whatever!("No result sources in {}", config_path)
    }

    let mut builder = builder::ResultsBuilder::new(&ws.config.rules.result_rules());
    for source in ws.config.result_sources.iter() {
        io_results::read_results(&ws.path(&source.file_path), source, &mut builder)?;
    }
    if builder.excluded_rows() > 0 {
        info!(
            "run_results: {} over/under vote rows not counted",
            builder.excluded_rows()
        );
    }
    let results = builder.build().context(CoreSnafu {})?;
    let content = io_csv::election_results_csv(&results)?;
    write_outputs(&[(ws.out_dir.join("election_results.csv"), content.clone())])?;
    check_reference(&content, reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CONFIG: &str = r#"{
        "outputSettings": {"outputDirectory": "build", "timezoneOffset": "-05:00"},
        "tables": {
            "districts": "districts.csv",
            "people": "people.csv",
            "candidates": "candidates.csv",
            "commissioners": "commissioners.csv",
            "candidateStatuses": "candidate_statuses.csv"
        },
        "exportSources": [{
            "provider": "csv",
            "filePath": "export.csv",
            "columns": {
                "smdId": ["SMD", "ANC/SMD"],
                "candidateName": ["Candidate Name", "Name"],
                "pickupDate": ["Pick Up Date"]
            }
        }],
        "resultSources": [{
            "filePath": "results.csv",
            "electionYear": 2022,
            "columns": {
                "contestName": ["ContestName"],
                "candidateName": ["Candidate"],
                "votes": ["Votes"]
            }
        }],
        "rules": {"electionYear": 2024, "redistrictingYear": 2022}
    }"#;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let d = dir.path();
        write(d, "config.json", CONFIG);
        write(
            d,
            "districts.csv",
            "smd_id,anc_id,ward_id,redistricting_year,overlap_smds,overlap_percentage\n\
             smd_1A01,anc_1A,ward_1,2022,smd_2012_1A01,1.0\n\
             smd_1A02,anc_1A,ward_1,2022,\"smd_2012_1A02,smd_2012_1A03\",\"0.6,0.4\"\n\
             smd_2012_1A01,anc_1A,ward_1,2012,,\n",
        );
        write(
            d,
            "people.csv",
            "person_id,full_name\n1,Ann Lee\n2,Bo Chen\n",
        );
        write(
            d,
            "candidates.csv",
            "candidate_id,person_id,smd_id,dcboe_hash_id,candidate_status,election_year,pickup_date,filed_date\n\
             1,2,smd_1A01,,Pulled papers,2024,2024-06-20,\n",
        );
        write(
            d,
            "commissioners.csv",
            "person_id,smd_id,start_date,end_date\n1,smd_1A01,2023-01-02,2025-01-02\n",
        );
        write(
            d,
            "candidate_statuses.csv",
            "candidate_status,count_as_candidate,display_order\n\
             Filed signatures,TRUE,1\nPulled papers,TRUE,2\nWithdrew,FALSE,3\n",
        );
        write(
            d,
            "export.csv",
            "ANC/SMD,Name,Pick Up Date\n\
             1A01,BO CHEN,06/20/2024\n\
             SMD 1A02,Ann Lee,2024-06-21\n\
             1A02,Cy Diaz,\n\
             9Z99,Nobody Known,\n\
             ,No District,\n",
        );
        write(
            d,
            "results.csv",
            "ContestName,PrecinctNumber,Candidate,Votes\n\
             ADVISORY NEIGHBORHOOD COMMISSIONER 1A01,1,B,100\n\
             ADVISORY NEIGHBORHOOD COMMISSIONER 1A01,1,A,250\n\
             ADVISORY NEIGHBORHOOD COMMISSIONER 1A01,2,C,300\n\
             ADVISORY NEIGHBORHOOD COMMISSIONER 1A01,2,B,200\n\
             ADVISORY NEIGHBORHOOD COMMISSIONER 1A01,2,Over Votes,4\n\
             MAYOR,1,Someone,1000\n",
        );
        dir
    }

    fn config_path(dir: &tempfile::TempDir) -> String {
        dir.path().join("config.json").display().to_string()
    }

    fn read(dir: &tempfile::TempDir, rel: &str) -> String {
        fs::read_to_string(dir.path().join(rel)).unwrap()
    }

    #[test]
    fn resolve_then_apply() {
        let dir = fixture();
        let config = config_path(&dir);
        run_resolve(&config, &None, &None).unwrap();

        let new_candidates = read(&dir, "build/review/new_candidates.csv");
        let new_people = read(&dir, "build/review/new_people_and_candidates.csv");
        let hash_changes = read(&dir, "build/review/hash_changes.csv");
        // Bo Chen already runs in 1A01, without a hash.
        assert_eq!(hash_changes.lines().count(), 2);
        assert!(hash_changes.contains("BO CHEN"));
        assert_eq!(new_candidates.lines().count(), 2);
        assert!(new_candidates.contains("Ann Lee"));
        assert_eq!(new_people.lines().count(), 2);
        assert!(new_people.contains("Cy Diaz"));
        assert!(!new_people.contains("Nobody Known"));
        // Nothing is approved by default.
        for l in [&new_candidates, &new_people, &hash_changes] {
            assert!(l.lines().skip(1).all(|line| line.starts_with("?,")));
        }

        // The reviewer accepts everything.
        let approve = |rel: &str, v: &str| {
            let content = read(&dir, rel);
            let edited: Vec<String> = content
                .lines()
                .enumerate()
                .map(|(idx, line)| {
                    if idx == 0 {
                        line.to_string()
                    } else {
                        format!("{}{}", v, &line[1..])
                    }
                })
                .collect();
            fs::write(dir.path().join(rel), edited.join("\n") + "\n").unwrap();
        };
        approve("build/review/hash_changes.csv", "y");
        approve("build/review/new_candidates.csv", "y");
        approve("build/review/new_people_and_candidates.csv", "n");

        run_apply(&config, &None, &None, &None).unwrap();
        let people = read(&dir, "build/tables/people.csv");
        assert_eq!(people, "person_id,full_name\n1,Ann Lee\n2,Bo Chen\n3,Cy Diaz\n");
        let candidates = read(&dir, "build/tables/candidates.csv");
        assert_eq!(candidates.lines().count(), 4);
        assert!(candidates.contains(&candidate_external_id("smd_1A01", "BO CHEN").unwrap()));
        assert!(candidates.contains("2024-06-21"));
    }

    #[test]
    fn districts_view() {
        let dir = fixture();
        let config = config_path(&dir);
        run_districts(&config, &None, &Some("2024-07-01T12:00:00-04:00".to_string()), &None).unwrap();
        let view = read(&dir, "build/districts.csv");
        assert_eq!(
            view,
            "smd_id,current_commissioner,commissioner_elect,list_of_candidates,number_of_candidates\n\
             smd_1A01,Ann Lee,,Bo Chen,1\n\
             smd_1A02,(vacant),,(no known candidates),0\n"
        );

        // The same output matches itself as a reference.
        let reference = dir.path().join("build/districts.csv").display().to_string();
        run_districts(
            &config,
            &Some(dir.path().join("build2").display().to_string()),
            &Some("2024-07-01T12:00:00-04:00".to_string()),
            &Some(reference.clone()),
        )
        .unwrap();
        // Another instant does not.
        let res = run_districts(
            &config,
            &Some(dir.path().join("build3").display().to_string()),
            &Some("2025-07-01T12:00:00-04:00".to_string()),
            &Some(reference),
        );
        assert!(res.is_err());
    }

    #[test]
    fn bad_reference_instant() {
        let dir = fixture();
        let res = run_districts(&config_path(&dir), &None, &Some("tomorrow".to_string()), &None);
        assert!(matches!(res, Err(PipelineError::InvalidReferenceInstant { .. })));
        assert!(!dir.path().join("build/districts.csv").exists());
    }

    #[test]
    fn results() {
        let dir = fixture();
        run_results(&config_path(&dir), &None, &None).unwrap();
        let content = read(&dir, "build/election_results.csv");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "election_year,smd_id,external_id,candidate_name,votes,vote_share,ranking,winner,\
             margin_of_victory,margin_of_victory_percentage,num_candidates,total_votes"
        );
        assert_eq!(lines.len(), 4);
        // B has 300 votes like C, but was seen first. A tie is a zero margin.
        assert!(lines[1].contains(",B,300,"));
        assert!(lines[1].contains(",1,true,0,"));
        assert!(lines[2].contains(",C,300,"));
        assert!(lines[2].contains(",2,false,0,"));
        assert!(lines[3].contains(",A,250,"));
        assert!(lines[3].contains(",3,false,-50,"));
    }

    #[test]
    fn failed_integrity_writes_nothing() {
        let dir = fixture();
        write(
            dir.path(),
            "commissioners.csv",
            "person_id,smd_id,start_date,end_date\n1,smd_1A01,2023-01-02,\n2,smd_1A01,2023-01-02,\n",
        );
        let res = run_districts(
            &config_path(&dir),
            &None,
            &Some("2024-07-01T12:00:00-04:00".to_string()),
            &None,
        );
        assert!(matches!(
            res,
            Err(PipelineError::Core {
                source: CoreErrors::MultipleCurrentCommissioners(_)
            })
        ));
        assert!(!dir.path().join("build/districts.csv").exists());
    }

    #[test]
    fn duplicate_ids_stop_the_run() {
        let dir = fixture();
        write(dir.path(), "people.csv", "person_id,full_name\n1,Ann Lee\n1,Bo Chen\n");
        let res = run_resolve(&config_path(&dir), &None, &None);
        assert!(matches!(
            res,
            Err(PipelineError::Core {
                source: CoreErrors::DuplicatePersonId(PersonId(1))
            })
        ));
        assert!(!dir.path().join("build/review").exists());
    }

    #[test]
    fn temp_path_is_a_sibling() {
        assert_eq!(
            temp_path(Path::new("/a/b/districts.csv")),
            PathBuf::from("/a/b/districts.csv.tmp")
        );
    }
}
