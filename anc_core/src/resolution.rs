//! Identity resolution of newly observed candidates.
//!
//! Every record of an export is either already known (its external id is
//! in the candidates table), or it becomes a proposal in one of three review
//! lists. Nothing is applied until a reviewer has marked the proposal, see
//! [apply_review].

use log::{debug, info, warn};

use std::collections::{HashMap, HashSet};

use crate::config::*;
use crate::hash_id::candidate_external_id;
use crate::matcher::{best_match, sorted_pool, NameMatch};

/// Hands out increasing identifiers, starting after the largest one already
/// in use.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct IdSequence {
    next: u32,
}

impl IdSequence {
    pub fn after<I: IntoIterator<Item = u32>>(used: I) -> IdSequence {
        let max = used.into_iter().max().unwrap_or(0);
        IdSequence { next: max + 1 }
    }

    pub fn for_people(people: &[Person]) -> IdSequence {
        IdSequence::after(people.iter().map(|p| p.person_id.0))
    }

    pub fn for_candidates(candidates: &[Candidate]) -> IdSequence {
        IdSequence::after(candidates.iter().map(|c| c.candidate_id.0))
    }

    /// The value that the next call to [IdSequence::next_id] returns.
    pub fn peek(&self) -> u32 {
        self.next
    }

    pub fn next_id(&mut self) -> u32 {
        let res = self.next;
        self.next += 1;
        res
    }
}

/// The decision of a reviewer on a proposal.
///
/// For all the proposals, approving means "the best guess is the same
/// person as the record".
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ReviewState {
    Pending,
    Approved,
    Rejected,
}

impl ReviewState {
    pub fn label(&self) -> &'static str {
        match self {
            ReviewState::Pending => "?",
            ReviewState::Approved => "y",
            ReviewState::Rejected => "n",
        }
    }

    pub fn parse(s: &str) -> Option<ReviewState> {
        match s.trim().to_lowercase().as_str() {
            "" | "?" => Some(ReviewState::Pending),
            "y" | "yes" | "true" | "1" => Some(ReviewState::Approved),
            "n" | "no" | "false" | "0" => Some(ReviewState::Rejected),
            _ => None,
        }
    }
}

/// The person of a record already runs this year, but the name changed
/// upstream and produced another external id.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct HashChange {
    pub candidate_id: CandidateId,
    pub person_id: PersonId,
    pub smd_id: String,
    pub candidate_name: String,
    pub matched_name: String,
    pub score: u8,
    pub old_external_id: Option<String>,
    pub new_external_id: String,
    pub good_match: ReviewState,
}

/// A candidate to create, either for an existing person or for a new one.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateProposal {
    /// Only set when the record did not match anyone well enough.
    pub suggested_person_id: Option<PersonId>,
    pub suggested_candidate_id: CandidateId,
    pub best_guess: Option<NameMatch>,
    pub external_id: String,
    pub record: SourceRecord,
    pub good_match: ReviewState,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DroppedRecord {
    pub record: SourceRecord,
    pub reason: String,
}

/// The staged changes produced by one batch.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Resolution {
    pub hash_changes: Vec<HashChange>,
    pub new_candidates: Vec<CandidateProposal>,
    pub new_people: Vec<CandidateProposal>,
    pub dropped: Vec<DroppedRecord>,
    /// Records whose external id is already in the candidates table.
    pub already_present: usize,
}

impl Resolution {
    pub fn nothing_to_do(&self) -> bool {
        self.hash_changes.is_empty() && self.new_candidates.is_empty() && self.new_people.is_empty()
    }
}

/// Matches a batch of records against the existing people and candidates.
///
/// The sequences are advanced for every proposal, so that two proposals
/// never share an identifier. Records in unknown districts are dropped.
///
/// A record is already present when a candidate of the same election year
/// has its external id. A hash change only targets a run of the matched
/// person in the same district, and at most one record of a batch targets a
/// given candidate.
pub fn resolve_identities(
    records: &[SourceRecord],
    tables: &Tables,
    rules: &ResolutionRules,
    person_ids: &mut IdSequence,
    candidate_ids: &mut IdSequence,
) -> Result<Resolution, CoreErrors> {
    info!(
        "resolve_identities: {} records, {} people, {} candidates, election {}",
        records.len(),
        tables.people.len(),
        tables.candidates.len(),
        rules.election_year
    );
    let mut res = Resolution::default();

    let known_districts: HashSet<&str> = tables.districts.iter().map(|d| d.smd_id.as_str()).collect();
    let known_external_ids: HashSet<&str> = tables
        .candidates
        .iter()
        .filter(|c| c.election_year == rules.election_year)
        .filter_map(|c| c.external_id.as_deref())
        .collect();

    let mut batch_ids: HashSet<String> = HashSet::new();
    let mut unresolved: Vec<(&SourceRecord, String)> = Vec::new();
    for r in records.iter() {
        if !known_districts.contains(r.smd_id.as_str()) {
            res.dropped.push(DroppedRecord {
                record: r.clone(),
                reason: format!("unknown district {}", r.smd_id),
            });
            continue;
        }
        let external_id = match candidate_external_id(&r.smd_id, &r.candidate_name) {
            Ok(x) => x,
            Err(e) => {
                res.dropped.push(DroppedRecord {
                    record: r.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if known_external_ids.contains(external_id.as_str()) {
            res.already_present += 1;
            continue;
        }
        if !batch_ids.insert(external_id.clone()) {
            res.dropped.push(DroppedRecord {
                record: r.clone(),
                reason: format!("duplicate of an earlier record ({})", external_id),
            });
            continue;
        }
        unresolved.push((r, external_id));
    }

    if !res.dropped.is_empty() {
        warn!("resolve_identities: dropped {} records:", res.dropped.len());
        for d in res.dropped.iter() {
            warn!(
                "  {} {:?}: {}",
                d.record.smd_id, d.record.candidate_name, d.reason
            );
        }
    }

    if unresolved.is_empty() {
        info!(
            "resolve_identities: nothing to do ({} records already present)",
            res.already_present
        );
        return Ok(res);
    }

    let pool = sorted_pool(tables.people);
    let mut runs_this_year: HashMap<(PersonId, &str), &Candidate> = HashMap::new();
    for c in tables
        .candidates
        .iter()
        .filter(|c| c.election_year == rules.election_year)
    {
        runs_this_year
            .entry((c.person_id, c.smd_id.as_str()))
            .or_insert(c);
    }
    let mut changed_candidates: HashSet<CandidateId> = HashSet::new();

    for (record, external_id) in unresolved {
        let guess: Option<NameMatch> = if pool.is_empty() {
            None
        } else {
            Some(best_match(&record.candidate_name, &pool)?)
        };
        let accepted = guess
            .as_ref()
            .filter(|m| m.score >= rules.match_threshold);

        if let Some(m) = accepted {
            if let Some(run) = runs_this_year.get(&(m.person_id, record.smd_id.as_str())) {
                if !changed_candidates.insert(run.candidate_id) {
                    warn!(
                        "resolve_identities: dropping {} {:?}: candidate {} already has a hash change",
                        record.smd_id, record.candidate_name, run.candidate_id
                    );
                    res.dropped.push(DroppedRecord {
                        record: record.clone(),
                        reason: format!(
                            "candidate {} already has a hash change in this batch",
                            run.candidate_id
                        ),
                    });
                    continue;
                }
                debug!(
                    "resolve_identities: {:?} is candidate {} with another hash",
                    record.candidate_name, run.candidate_id
                );
                res.hash_changes.push(HashChange {
                    candidate_id: run.candidate_id,
                    person_id: m.person_id,
                    smd_id: record.smd_id.clone(),
                    candidate_name: record.candidate_name.clone(),
                    matched_name: m.full_name.clone(),
                    score: m.score,
                    old_external_id: run.external_id.clone(),
                    new_external_id: external_id,
                    good_match: ReviewState::Pending,
                });
                continue;
            }
            res.new_candidates.push(CandidateProposal {
                suggested_person_id: None,
                suggested_candidate_id: CandidateId(candidate_ids.next_id()),
                best_guess: Some(m.clone()),
                external_id,
                record: record.clone(),
                good_match: ReviewState::Pending,
            });
        } else {
            res.new_people.push(CandidateProposal {
                suggested_person_id: Some(PersonId(person_ids.next_id())),
                suggested_candidate_id: CandidateId(candidate_ids.next_id()),
                best_guess: guess,
                external_id,
                record: record.clone(),
                good_match: ReviewState::Pending,
            });
        }
    }

    info!(
        "resolve_identities: {} hash changes, {} new candidates, {} new people, {} already present",
        res.hash_changes.len(),
        res.new_candidates.len(),
        res.new_people.len(),
        res.already_present
    );
    Ok(res)
}

/// The tables after the reviewed proposals have been applied.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct AppliedReview {
    pub people: Vec<Person>,
    pub candidates: Vec<Candidate>,
    pub updated_hashes: usize,
    pub linked_candidates: usize,
    pub created_people: usize,
    /// Proposals still waiting for a decision.
    pub pending: usize,
    /// Proposals that could not or did not need to be applied.
    pub skipped: usize,
}

/// Fails on the first identifier that appears twice in the people or the
/// candidates.
pub fn check_unique_ids(people: &[Person], candidates: &[Candidate]) -> Result<(), CoreErrors> {
    let mut pids: HashSet<PersonId> = HashSet::new();
    for p in people.iter() {
        if !pids.insert(p.person_id) {
            return Err(CoreErrors::DuplicatePersonId(p.person_id));
        }
    }
    let mut cids: HashSet<CandidateId> = HashSet::new();
    for c in candidates.iter() {
        if !cids.insert(c.candidate_id) {
            return Err(CoreErrors::DuplicateCandidateId(c.candidate_id));
        }
    }
    Ok(())
}

/// Applies the decisions of the reviewer to copies of the people and
/// candidates tables.
///
/// The suggested identifiers are kept when they are still free. Otherwise,
/// new ones are allocated after all the existing and suggested ones.
pub fn apply_review(
    people: &[Person],
    candidates: &[Candidate],
    hash_changes: &[HashChange],
    proposals: &[CandidateProposal],
    rules: &ResolutionRules,
) -> Result<AppliedReview, CoreErrors> {
    check_unique_ids(people, candidates)?;

    let mut res = AppliedReview {
        people: people.to_vec(),
        candidates: candidates.to_vec(),
        ..Default::default()
    };

    let mut person_seq = IdSequence::after(
        people
            .iter()
            .map(|p| p.person_id.0)
            .chain(proposals.iter().filter_map(|p| p.suggested_person_id.map(|x| x.0))),
    );
    let mut candidate_seq = IdSequence::after(
        candidates
            .iter()
            .map(|c| c.candidate_id.0)
            .chain(proposals.iter().map(|p| p.suggested_candidate_id.0)),
    );
    let mut used_pids: HashSet<PersonId> = people.iter().map(|p| p.person_id).collect();
    let mut used_cids: HashSet<CandidateId> = candidates.iter().map(|c| c.candidate_id).collect();
    let mut external_ids: HashSet<String> = candidates
        .iter()
        .filter(|c| c.election_year == rules.election_year)
        .filter_map(|c| c.external_id.clone())
        .collect();
    let mut changed_candidates: HashSet<CandidateId> = HashSet::new();

    for hc in hash_changes.iter() {
        match hc.good_match {
            ReviewState::Pending => {
                res.pending += 1;
            }
            ReviewState::Rejected => {
                res.skipped += 1;
            }
            ReviewState::Approved if !changed_candidates.insert(hc.candidate_id) => {
                warn!(
                    "apply_review: candidate {} already has an approved hash change, skipping {}",
                    hc.candidate_id, hc.new_external_id
                );
                res.skipped += 1;
            }
            ReviewState::Approved => {
                match res
                    .candidates
                    .iter_mut()
                    .find(|c| c.candidate_id == hc.candidate_id)
                {
                    Some(c) => {
                        debug!(
                            "apply_review: candidate {}: {:?} -> {}",
                            c.candidate_id, c.external_id, hc.new_external_id
                        );
                        c.external_id = Some(hc.new_external_id.clone());
                        external_ids.insert(hc.new_external_id.clone());
                        res.updated_hashes += 1;
                    }
                    None => {
                        warn!(
                            "apply_review: hash change for unknown candidate {}, skipping",
                            hc.candidate_id
                        );
                        res.skipped += 1;
                    }
                }
            }
        }
    }

    for p in proposals.iter() {
        if p.good_match == ReviewState::Pending {
            res.pending += 1;
            continue;
        }
        if external_ids.contains(&p.external_id) {
            debug!(
                "apply_review: {:?} already in the candidates table",
                p.record.candidate_name
            );
            res.skipped += 1;
            continue;
        }

        let person_id = if p.good_match == ReviewState::Approved {
            let guess = p
                .best_guess
                .as_ref()
                .ok_or_else(|| CoreErrors::ApprovedWithoutMatch(p.record.candidate_name.clone()))?;
            if !used_pids.contains(&guess.person_id) {
                return Err(CoreErrors::UnknownPerson(guess.person_id));
            }
            res.linked_candidates += 1;
            guess.person_id
        } else {
            let pid = match p.suggested_person_id {
                Some(pid) if !used_pids.contains(&pid) => pid,
                _ => PersonId(person_seq.next_id()),
            };
            used_pids.insert(pid);
            res.people.push(Person {
                person_id: pid,
                full_name: p.record.candidate_name.trim().to_string(),
            });
            res.created_people += 1;
            pid
        };

        let cid = if used_cids.contains(&p.suggested_candidate_id) {
            CandidateId(candidate_seq.next_id())
        } else {
            p.suggested_candidate_id
        };
        used_cids.insert(cid);
        external_ids.insert(p.external_id.clone());
        res.candidates.push(Candidate {
            candidate_id: cid,
            person_id,
            smd_id: p.record.smd_id.clone(),
            external_id: Some(p.external_id.clone()),
            candidate_status: p
                .record
                .candidate_status
                .clone()
                .unwrap_or_else(|| rules.default_candidate_status.clone()),
            election_year: rules.election_year,
            pickup_date: p.record.pickup_date,
            filed_date: p.record.filed_date,
        });
    }

    if res.pending > 0 {
        warn!(
            "apply_review: {} proposals are still pending a review",
            res.pending
        );
    }
    info!(
        "apply_review: {} hashes updated, {} candidates linked to existing people, {} new people, {} skipped",
        res.updated_hashes, res.linked_candidates, res.created_people, res.skipped
    );
    Ok(res)
}
