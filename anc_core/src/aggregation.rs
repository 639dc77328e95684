//! The per-district view: who holds the seat, who will hold it, and who runs
//! for it.

use log::{debug, info, warn};

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::config::*;

pub const VACANT: &str = "(vacant)";
pub const NO_KNOWN_CANDIDATES: &str = "(no known candidates)";

/// Where a commissioner tenure stands at a given instant. Never stored.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Tenure {
    Former,
    Current,
    Future,
}

/// The tenure covers the local dates `[start_date, end_date)`, in the
/// timezone of the reference instant. Missing bounds are open.
pub fn tenure_at(commissioner: &Commissioner, reference: &DateTime<FixedOffset>) -> Tenure {
    let today: NaiveDate = reference.naive_local().date();
    match (commissioner.start_date, commissioner.end_date) {
        (Some(start), _) if today < start => Tenure::Future,
        (_, Some(end)) if end <= today => Tenure::Former,
        _ => Tenure::Current,
    }
}

/// The current and future commissioner of each district.
///
/// Fails if a district has more than one of either.
pub fn seated_commissioners<'a>(
    commissioners: &'a [Commissioner],
    reference: &DateTime<FixedOffset>,
) -> Result<HashMap<&'a str, (Option<&'a Commissioner>, Option<&'a Commissioner>)>, CoreErrors> {
    let mut res: HashMap<&str, (Option<&Commissioner>, Option<&Commissioner>)> = HashMap::new();
    for c in commissioners.iter() {
        let entry = res.entry(c.smd_id.as_str()).or_insert((None, None));
        match tenure_at(c, reference) {
            Tenure::Former => {}
            Tenure::Current => {
                if entry.0.is_some() {
                    return Err(CoreErrors::MultipleCurrentCommissioners(c.smd_id.clone()));
                }
                entry.0 = Some(c);
            }
            Tenure::Future => {
                if entry.1.is_some() {
                    return Err(CoreErrors::MultipleFutureCommissioners(c.smd_id.clone()));
                }
                entry.1 = Some(c);
            }
        }
    }
    Ok(res)
}

/// Builds one row per district, sorted by district.
pub fn aggregate_districts(
    tables: &Tables,
    rules: &AggregationRules,
    reference: &DateTime<FixedOffset>,
) -> Result<Vec<DistrictView>, CoreErrors> {
    info!(
        "aggregate_districts: {} districts at {}",
        tables.districts.len(),
        reference
    );
    let names: HashMap<PersonId, &str> = tables
        .people
        .iter()
        .map(|p| (p.person_id, p.full_name.as_str()))
        .collect();
    let name_of = |pid: PersonId| -> Result<String, CoreErrors> {
        names
            .get(&pid)
            .map(|s| s.to_string())
            .ok_or(CoreErrors::UnknownPerson(pid))
    };

    let seated = seated_commissioners(tables.commissioners, reference)?;

    let statuses: HashMap<&str, &CandidateStatus> = tables
        .statuses
        .iter()
        .map(|s| (s.candidate_status.as_str(), s))
        .collect();
    let mut unknown_statuses: HashSet<&str> = HashSet::new();

    // Active candidates by district, with their sort key.
    let mut running: HashMap<&str, Vec<(u32, Option<NaiveDate>, CandidateId, String)>> =
        HashMap::new();
    for c in tables.candidates.iter() {
        if let Some(year) = rules.election_year {
            if c.election_year != year {
                continue;
            }
        }
        let name = name_of(c.person_id)?;
        let status = match statuses.get(c.candidate_status.as_str()) {
            Some(s) => s,
            None => {
                unknown_statuses.insert(c.candidate_status.as_str());
                continue;
            }
        };
        if !status.count_as_candidate {
            debug!(
                "aggregate_districts: {} ({}) not counted: {}",
                name, c.smd_id, c.candidate_status
            );
            continue;
        }
        running.entry(c.smd_id.as_str()).or_default().push((
            status.display_order,
            c.pickup_date,
            c.candidate_id,
            name,
        ));
    }
    if !unknown_statuses.is_empty() {
        let mut l: Vec<&str> = unknown_statuses.into_iter().collect();
        l.sort_unstable();
        warn!(
            "aggregate_districts: candidates with unknown statuses are not counted: {:?}",
            l
        );
    }

    let mut res: Vec<DistrictView> = Vec::new();
    for d in tables.districts.iter() {
        let (current, future) = seated.get(d.smd_id.as_str()).cloned().unwrap_or((None, None));
        let current_commissioner = match current {
            Some(c) => name_of(c.person_id)?,
            None => VACANT.to_string(),
        };
        let commissioner_elect = match future {
            Some(c) => Some(name_of(c.person_id)?),
            None => None,
        };

        let mut cands = running.remove(d.smd_id.as_str()).unwrap_or_default();
        // Missing pickup dates sort last.
        cands.sort_by_key(|(order, pickup, cid, _)| (*order, pickup.is_none(), *pickup, *cid));
        let number_of_candidates = cands.len();
        let list_of_candidates = if cands.is_empty() {
            NO_KNOWN_CANDIDATES.to_string()
        } else {
            cands
                .into_iter()
                .map(|(_, _, _, name)| name)
                .collect::<Vec<String>>()
                .join(", ")
        };

        res.push(DistrictView {
            smd_id: d.smd_id.clone(),
            current_commissioner,
            commissioner_elect,
            list_of_candidates,
            number_of_candidates,
        });
    }
    res.sort_by(|a, b| a.smd_id.cmp(&b.smd_id));
    Ok(res)
}
