// Reading and writing the canonical tables.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::pipeline::io_common::*;
use crate::pipeline::*;

/// Reads all the rows of a CSV file with a header, converting each of them.
///
/// Rows that fail to deserialize or to convert are skipped and reported.
pub fn read_table<T, U, F>(path: &Path, convert: F) -> PipelineResult<Vec<U>>
where
    T: DeserializeOwned,
    F: Fn(T) -> Result<U, String>,
{
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .context(CsvOpenSnafu {
            path: path.display().to_string(),
        })?;
    let mut issues = RowIssues::new(path);
    let mut res: Vec<U> = Vec::new();
    for (idx, row_r) in rdr.deserialize::<T>().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let converted = row_r
            .map_err(|e| e.to_string())
            .and_then(&convert);
        match converted {
            Ok(x) => res.push(x),
            Err(msg) => issues.record(lineno, msg),
        }
    }
    issues.finish(res.len())?;
    debug!("read_table: {}: {} rows", path.display(), res.len());
    Ok(res)
}

/// Serializes rows to CSV, with the header even when there are no rows.
pub fn to_csv<T: Serialize>(name: &str, header: &[&str], rows: &[T]) -> PipelineResult<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut buf);
        wtr.write_record(header).context(CsvWriteSnafu { path: name })?;
        for r in rows.iter() {
            wtr.serialize(r).context(CsvWriteSnafu { path: name })?;
        }
        wtr.flush().context(WritingFileSnafu { path: name })?;
    }
    Ok(buf)
}

#[derive(Debug, Deserialize, Serialize)]
struct PersonRow {
    person_id: u32,
    full_name: String,
}

pub fn read_people(path: &Path) -> PipelineResult<Vec<Person>> {
    read_table(path, |r: PersonRow| {
        let full_name = non_empty(&r.full_name).ok_or("empty full_name")?;
        Ok(Person {
            person_id: PersonId(r.person_id),
            full_name,
        })
    })
}

pub fn people_csv(people: &[Person]) -> PipelineResult<Vec<u8>> {
    let rows: Vec<PersonRow> = people
        .iter()
        .map(|p| PersonRow {
            person_id: p.person_id.0,
            full_name: p.full_name.clone(),
        })
        .collect();
    to_csv("people.csv", &["person_id", "full_name"], &rows)
}

#[derive(Debug, Deserialize, Serialize)]
struct CandidateRow {
    candidate_id: u32,
    person_id: u32,
    smd_id: String,
    dcboe_hash_id: Option<String>,
    candidate_status: String,
    election_year: i32,
    pickup_date: Option<String>,
    filed_date: Option<String>,
}

const CANDIDATE_HEADER: [&str; 8] = [
    "candidate_id",
    "person_id",
    "smd_id",
    "dcboe_hash_id",
    "candidate_status",
    "election_year",
    "pickup_date",
    "filed_date",
];

pub fn read_candidates(path: &Path) -> PipelineResult<Vec<Candidate>> {
    read_table(path, |r: CandidateRow| {
        Ok(Candidate {
            candidate_id: CandidateId(r.candidate_id),
            person_id: PersonId(r.person_id),
            smd_id: r.smd_id,
            external_id: r.dcboe_hash_id.as_deref().and_then(non_empty),
            candidate_status: r.candidate_status,
            election_year: r.election_year,
            pickup_date: parse_date(r.pickup_date.as_deref().unwrap_or(""))?,
            filed_date: parse_date(r.filed_date.as_deref().unwrap_or(""))?,
        })
    })
}

pub fn candidates_csv(candidates: &[Candidate]) -> PipelineResult<Vec<u8>> {
    let rows: Vec<CandidateRow> = candidates
        .iter()
        .map(|c| CandidateRow {
            candidate_id: c.candidate_id.0,
            person_id: c.person_id.0,
            smd_id: c.smd_id.clone(),
            dcboe_hash_id: c.external_id.clone(),
            candidate_status: c.candidate_status.clone(),
            election_year: c.election_year,
            pickup_date: Some(format_date(&c.pickup_date)),
            filed_date: Some(format_date(&c.filed_date)),
        })
        .collect();
    to_csv("candidates.csv", &CANDIDATE_HEADER, &rows)
}

#[derive(Debug, Deserialize)]
struct DistrictRow {
    smd_id: String,
    anc_id: Option<String>,
    ward_id: Option<String>,
    redistricting_year: Option<i32>,
    overlap_smds: Option<String>,
    overlap_percentage: Option<String>,
}

pub fn read_districts(path: &Path) -> PipelineResult<Vec<District>> {
    read_table(path, |r: DistrictRow| {
        let smd_id = non_empty(&r.smd_id).ok_or("empty smd_id")?;
        let overlap_smds = split_list(r.overlap_smds.as_deref().unwrap_or(""));
        let overlap_percentage = split_list(r.overlap_percentage.as_deref().unwrap_or(""))
            .iter()
            .map(|x| {
                x.parse::<f64>()
                    .map_err(|_| format!("invalid overlap percentage {:?}", x))
            })
            .collect::<Result<Vec<f64>, String>>()?;
        Ok(District {
            smd_id,
            anc_id: r.anc_id.as_deref().and_then(non_empty),
            ward_id: r.ward_id.as_deref().and_then(non_empty),
            redistricting_year: r.redistricting_year,
            overlap_smds,
            overlap_percentage,
        })
    })
}

#[derive(Debug, Deserialize)]
struct CommissionerRow {
    person_id: u32,
    smd_id: String,
    start_date: Option<String>,
    end_date: Option<String>,
}

pub fn read_commissioners(path: &Path) -> PipelineResult<Vec<Commissioner>> {
    read_table(path, |r: CommissionerRow| {
        Ok(Commissioner {
            person_id: PersonId(r.person_id),
            smd_id: r.smd_id,
            start_date: parse_date(r.start_date.as_deref().unwrap_or(""))?,
            end_date: parse_date(r.end_date.as_deref().unwrap_or(""))?,
        })
    })
}

#[derive(Debug, Deserialize)]
struct StatusRow {
    candidate_status: String,
    count_as_candidate: String,
    display_order: u32,
}

pub fn read_statuses(path: &Path) -> PipelineResult<Vec<CandidateStatus>> {
    read_table(path, |r: StatusRow| {
        Ok(CandidateStatus {
            candidate_status: r.candidate_status,
            count_as_candidate: parse_bool(&r.count_as_candidate)?,
            display_order: r.display_order,
        })
    })
}

#[derive(Debug, Serialize)]
struct DistrictViewRow<'a> {
    smd_id: &'a str,
    current_commissioner: &'a str,
    commissioner_elect: Option<&'a str>,
    list_of_candidates: &'a str,
    number_of_candidates: usize,
}

pub fn district_view_csv(view: &[DistrictView]) -> PipelineResult<Vec<u8>> {
    let rows: Vec<DistrictViewRow> = view
        .iter()
        .map(|v| DistrictViewRow {
            smd_id: &v.smd_id,
            current_commissioner: &v.current_commissioner,
            commissioner_elect: v.commissioner_elect.as_deref(),
            list_of_candidates: &v.list_of_candidates,
            number_of_candidates: v.number_of_candidates,
        })
        .collect();
    to_csv(
        "districts.csv",
        &[
            "smd_id",
            "current_commissioner",
            "commissioner_elect",
            "list_of_candidates",
            "number_of_candidates",
        ],
        &rows,
    )
}

#[derive(Debug, Serialize)]
struct ElectionResultRow<'a> {
    election_year: i32,
    smd_id: &'a str,
    external_id: &'a str,
    candidate_name: &'a str,
    votes: u64,
    vote_share: f64,
    ranking: u32,
    winner: bool,
    margin_of_victory: i64,
    margin_of_victory_percentage: f64,
    num_candidates: u32,
    total_votes: u64,
}

pub fn election_results_csv(results: &[ElectionResult]) -> PipelineResult<Vec<u8>> {
    let rows: Vec<ElectionResultRow> = results
        .iter()
        .map(|r| ElectionResultRow {
            election_year: r.election_year,
            smd_id: &r.smd_id,
            external_id: &r.external_id,
            candidate_name: &r.candidate_name,
            votes: r.votes,
            vote_share: r.vote_share,
            ranking: r.ranking,
            winner: r.winner,
            margin_of_victory: r.margin_of_victory,
            margin_of_victory_percentage: r.margin_of_victory_percentage,
            num_candidates: r.num_candidates,
            total_votes: r.total_votes,
        })
        .collect();
    to_csv(
        "election_results.csv",
        &[
            "election_year",
            "smd_id",
            "external_id",
            "candidate_name",
            "votes",
            "vote_share",
            "ranking",
            "winner",
            "margin_of_victory",
            "margin_of_victory_percentage",
            "num_candidates",
            "total_votes",
        ],
        &rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;

    fn table(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("table.csv");
        fs::write(&p, content).unwrap();
        (dir, p)
    }

    #[test]
    fn candidates_survive_a_write() {
        let (_dir, p) = table(
            "candidate_id,person_id,smd_id,dcboe_hash_id,candidate_status,election_year,pickup_date,filed_date\n\
             3,1,smd_1A01,abc,Filed signatures,2024,06/20/2024,2024-07-01\n\
             4,2,smd_1A02,,Pulled papers,2024,,\n",
        );
        let cands = read_candidates(&p).unwrap();
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].external_id.as_deref(), Some("abc"));
        assert_eq!(cands[0].pickup_date, NaiveDate::from_ymd_opt(2024, 6, 20));
        assert_eq!(cands[1].external_id, None);
        assert_eq!(cands[1].filed_date, None);

        let out = String::from_utf8(candidates_csv(&cands).unwrap()).unwrap();
        assert_eq!(
            out,
            "candidate_id,person_id,smd_id,dcboe_hash_id,candidate_status,election_year,pickup_date,filed_date\n\
             3,1,smd_1A01,abc,Filed signatures,2024,2024-06-20,2024-07-01\n\
             4,2,smd_1A02,,Pulled papers,2024,,\n"
        );
    }

    #[test]
    fn bad_rows_are_skipped() {
        let (_dir, p) = table("person_id,full_name\n1,Ann Lee\nx,Bo Chen\n3,\n4,Cy Diaz\n");
        let people = read_people(&p).unwrap();
        let ids: Vec<u32> = people.iter().map(|p| p.person_id.0).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn all_rows_bad_is_an_error() {
        let (_dir, p) = table("person_id,full_name\nx,Bo Chen\n");
        assert!(matches!(
            read_people(&p),
            Err(PipelineError::NoSurvivingRows { .. })
        ));
        // An empty table is fine.
        let (_dir, p) = table("person_id,full_name\n");
        assert!(read_people(&p).unwrap().is_empty());
    }

    #[test]
    fn districts_with_overlaps() {
        let (_dir, p) = table(
            "smd_id,anc_id,ward_id,redistricting_year,overlap_smds,overlap_percentage\n\
             smd_1A02,anc_1A,ward_1,2022,\"smd_2012_1A02, smd_2012_1A03\",\"0.6,0.4\"\n\
             smd_1A03,anc_1A,,,,\n",
        );
        let d = read_districts(&p).unwrap();
        assert_eq!(d[0].overlap_smds, vec!["smd_2012_1A02", "smd_2012_1A03"]);
        assert_eq!(d[0].overlap_percentage, vec![0.6, 0.4]);
        assert_eq!(d[0].redistricting_year, Some(2022));
        assert_eq!(d[1].ward_id, None);
        assert_eq!(d[1].redistricting_year, None);
    }

    #[test]
    fn empty_outputs_keep_the_header() {
        let out = district_view_csv(&[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "smd_id,current_commissioner,commissioner_elect,list_of_candidates,number_of_candidates\n"
        );
    }

    #[test]
    fn missing_table() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_statuses(&dir.path().join("nope.csv")),
            Err(PipelineError::CsvOpen { .. })
        ));
    }
}
