// The review files: written by the resolve step, edited by a person, and read
// back by the apply step.
//
// The first column of every file is good_match. It is written as "?" and the
// reviewer sets it to "y" or "n".

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pipeline::io_common::*;
use crate::pipeline::io_csv::{read_table, to_csv};
use crate::pipeline::*;

pub const HASH_CHANGES: &str = "hash_changes.csv";
pub const NEW_CANDIDATES: &str = "new_candidates.csv";
pub const NEW_PEOPLE: &str = "new_people_and_candidates.csv";

#[derive(Debug, Deserialize, Serialize)]
struct HashChangeRow {
    good_match: String,
    score: u8,
    candidate_name: String,
    matched_name: String,
    person_id: u32,
    candidate_id: u32,
    smd_id: String,
    old_external_id: Option<String>,
    new_external_id: String,
}

const HASH_CHANGE_HEADER: [&str; 9] = [
    "good_match",
    "score",
    "candidate_name",
    "matched_name",
    "person_id",
    "candidate_id",
    "smd_id",
    "old_external_id",
    "new_external_id",
];

#[derive(Debug, Deserialize, Serialize)]
struct ProposalRow {
    good_match: String,
    score: Option<u8>,
    candidate_name: String,
    matched_name: Option<String>,
    matched_person_id: Option<u32>,
    suggested_person_id: Option<u32>,
    suggested_candidate_id: u32,
    smd_id: String,
    external_id: String,
    candidate_status: Option<String>,
    pickup_date: Option<String>,
    filed_date: Option<String>,
}

const PROPOSAL_HEADER: [&str; 12] = [
    "good_match",
    "score",
    "candidate_name",
    "matched_name",
    "matched_person_id",
    "suggested_person_id",
    "suggested_candidate_id",
    "smd_id",
    "external_id",
    "candidate_status",
    "pickup_date",
    "filed_date",
];

fn review_state(s: &str) -> Result<ReviewState, String> {
    ReviewState::parse(s).ok_or_else(|| format!("good_match should be y, n or ?, found {:?}", s))
}

pub fn hash_changes_csv(changes: &[HashChange]) -> PipelineResult<Vec<u8>> {
    let rows: Vec<HashChangeRow> = changes
        .iter()
        .map(|hc| HashChangeRow {
            good_match: hc.good_match.label().to_string(),
            score: hc.score,
            candidate_name: hc.candidate_name.clone(),
            matched_name: hc.matched_name.clone(),
            person_id: hc.person_id.0,
            candidate_id: hc.candidate_id.0,
            smd_id: hc.smd_id.clone(),
            old_external_id: hc.old_external_id.clone(),
            new_external_id: hc.new_external_id.clone(),
        })
        .collect();
    to_csv(HASH_CHANGES, &HASH_CHANGE_HEADER, &rows)
}

/// A missing file has no changes.
pub fn read_hash_changes(path: &Path) -> PipelineResult<Vec<HashChange>> {
    if !path.exists() {
        info!("read_hash_changes: no file {}", path.display());
        return Ok(Vec::new());
    }
    read_table(path, |r: HashChangeRow| {
        Ok(HashChange {
            candidate_id: CandidateId(r.candidate_id),
            person_id: PersonId(r.person_id),
            smd_id: r.smd_id,
            candidate_name: r.candidate_name,
            matched_name: r.matched_name,
            score: r.score,
            old_external_id: r.old_external_id.as_deref().and_then(non_empty),
            new_external_id: r.new_external_id,
            good_match: review_state(&r.good_match)?,
        })
    })
}

pub fn proposals_csv(proposals: &[CandidateProposal]) -> PipelineResult<Vec<u8>> {
    let rows: Vec<ProposalRow> = proposals
        .iter()
        .map(|p| ProposalRow {
            good_match: p.good_match.label().to_string(),
            score: p.best_guess.as_ref().map(|m| m.score),
            candidate_name: p.record.candidate_name.clone(),
            matched_name: p.best_guess.as_ref().map(|m| m.full_name.clone()),
            matched_person_id: p.best_guess.as_ref().map(|m| m.person_id.0),
            suggested_person_id: p.suggested_person_id.map(|x| x.0),
            suggested_candidate_id: p.suggested_candidate_id.0,
            smd_id: p.record.smd_id.clone(),
            external_id: p.external_id.clone(),
            candidate_status: p.record.candidate_status.clone(),
            pickup_date: Some(format_date(&p.record.pickup_date)),
            filed_date: Some(format_date(&p.record.filed_date)),
        })
        .collect();
    to_csv("proposals", &PROPOSAL_HEADER, &rows)
}

/// A missing file has no proposals.
pub fn read_proposals(path: &Path) -> PipelineResult<Vec<CandidateProposal>> {
    if !path.exists() {
        info!("read_proposals: no file {}", path.display());
        return Ok(Vec::new());
    }
    read_table(path, |r: ProposalRow| {
        let best_guess = match r.matched_person_id {
            Some(pid) => Some(NameMatch {
                person_id: PersonId(pid),
                full_name: r.matched_name.clone().unwrap_or_default(),
                score: r.score.unwrap_or(0),
            }),
            None => None,
        };
        Ok(CandidateProposal {
            suggested_person_id: r.suggested_person_id.map(PersonId),
            suggested_candidate_id: CandidateId(r.suggested_candidate_id),
            best_guess,
            external_id: r.external_id,
            record: SourceRecord {
                smd_id: r.smd_id,
                candidate_name: r.candidate_name,
                pickup_date: parse_date(r.pickup_date.as_deref().unwrap_or(""))?,
                filed_date: parse_date(r.filed_date.as_deref().unwrap_or(""))?,
                candidate_status: r.candidate_status.as_deref().and_then(non_empty),
            },
            good_match: review_state(&r.good_match)?,
        })
    })
}
