use log::{debug, info, warn};

use std::collections::HashMap;

use crate::config::*;
use crate::hash_id::candidate_external_id;

// The tally of one candidate, in the order it was first seen.
#[derive(Eq, PartialEq, Debug, Clone)]
struct Tally {
    election_year: i32,
    smd_id: String,
    contest_name: String,
    candidate_name: String,
    external_id: String,
    votes: u64,
}

/// Sums the precinct rows of each candidate, keeping the order in which the
/// candidates first appear.
///
/// Rows whose candidate cannot be given an external id are dropped.
fn sum_precincts(rows: &[PrecinctResult]) -> Vec<Tally> {
    let mut res: Vec<Tally> = Vec::new();
    let mut index: HashMap<(i32, &str, &str, &str), usize> = HashMap::new();
    for r in rows.iter() {
        let key = (
            r.election_year,
            r.smd_id.as_str(),
            r.contest_name.as_str(),
            r.candidate_name.as_str(),
        );
        if let Some(idx) = index.get(&key) {
            res[*idx].votes += r.votes;
            continue;
        }
        let external_id = match candidate_external_id(&r.smd_id, &r.candidate_name) {
            Ok(x) => x,
            Err(e) => {
                warn!(
                    "aggregate_results: dropping row {} {:?}: {}",
                    r.smd_id, r.candidate_name, e
                );
                continue;
            }
        };
        index.insert(key, res.len());
        res.push(Tally {
            election_year: r.election_year,
            smd_id: r.smd_id.clone(),
            contest_name: r.contest_name.clone(),
            candidate_name: r.candidate_name.clone(),
            external_id,
            votes: r.votes,
        });
    }
    res
}

fn ratio(num: f64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        num / (total as f64)
    }
}

/// Ranks the candidates of one district.
///
/// The ranking is a stable sort on the votes: candidates with the same number
/// of votes are ranked in the order they were first seen.
fn rank_district(mut tallies: Vec<Tally>) -> Vec<ElectionResult> {
    tallies.sort_by(|a, b| b.votes.cmp(&a.votes));
    let total_votes: u64 = tallies.iter().map(|t| t.votes).sum();
    let num_candidates = tallies.len() as u32;
    let first = tallies.first().map(|t| t.votes).unwrap_or(0) as i64;
    let second = tallies.get(1).map(|t| t.votes).unwrap_or(0) as i64;

    let mut res: Vec<ElectionResult> = Vec::new();
    for (idx, t) in tallies.into_iter().enumerate() {
        let winner = idx == 0;
        let margin_of_victory = if winner {
            first - second
        } else {
            (t.votes as i64) - first
        };
        res.push(ElectionResult {
            election_year: t.election_year,
            external_id: t.external_id,
            smd_id: t.smd_id,
            candidate_name: t.candidate_name,
            votes: t.votes,
            vote_share: ratio(t.votes as f64, total_votes),
            ranking: (idx + 1) as u32,
            winner,
            margin_of_victory,
            margin_of_victory_percentage: ratio(margin_of_victory as f64, total_votes),
            num_candidates,
            total_votes,
        });
    }
    res
}

/// Computes the results of every district from the precinct rows.
///
/// The output is sorted by election year, district and ranking.
pub fn aggregate_results(rows: &[PrecinctResult]) -> Result<Vec<ElectionResult>, CoreErrors> {
    let tallies = sum_precincts(rows);
    info!(
        "aggregate_results: {} precinct rows, {} candidate tallies",
        rows.len(),
        tallies.len()
    );

    // Group by district, keeping the first-seen order within each group.
    let mut groups: Vec<((i32, String), Vec<Tally>)> = Vec::new();
    let mut group_index: HashMap<(i32, String), usize> = HashMap::new();
    for t in tallies.into_iter() {
        let key = (t.election_year, t.smd_id.clone());
        match group_index.get(&key) {
            Some(idx) => groups[*idx].1.push(t),
            None => {
                group_index.insert(key.clone(), groups.len());
                groups.push((key, vec![t]));
            }
        }
    }
    groups.sort_by(|a, b| a.0.cmp(&b.0));

    let mut res: Vec<ElectionResult> = Vec::new();
    for ((year, smd_id), group) in groups.into_iter() {
        debug!(
            "aggregate_results: {} {}: {} candidates",
            year,
            smd_id,
            group.len()
        );
        res.extend(rank_district(group));
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(smd: &str, name: &str, votes: u64) -> PrecinctResult {
        PrecinctResult {
            election_year: 2022,
            smd_id: smd.to_string(),
            contest_name: format!("ANC {}", smd),
            candidate_name: name.to_string(),
            votes,
        }
    }

    #[test]
    fn ties_follow_input_order() {
        let rows = vec![
            row("smd_1A01", "B", 300),
            row("smd_1A01", "A", 500),
            row("smd_1A01", "C", 300),
        ];
        let res = aggregate_results(&rows).unwrap();
        let summary: Vec<(&str, u32, bool, i64)> = res
            .iter()
            .map(|r| (r.candidate_name.as_str(), r.ranking, r.winner, r.margin_of_victory))
            .collect();
        assert_eq!(
            summary,
            vec![("A", 1, true, 200), ("B", 2, false, -200), ("C", 3, false, -200)]
        );
        assert_eq!(res[0].total_votes, 1100);
        assert_eq!(res[0].num_candidates, 3);
        assert!((res[0].vote_share - 500.0 / 1100.0).abs() < 1e-12);
        assert!((res[0].margin_of_victory_percentage - 200.0 / 1100.0).abs() < 1e-12);
    }

    #[test]
    fn precincts_are_summed() {
        let rows = vec![
            row("smd_1A01", "A", 10),
            row("smd_1A01", "B", 4),
            row("smd_1A01", "A", 5),
            row("smd_1A01", "B", 12),
        ];
        let res = aggregate_results(&rows).unwrap();
        assert_eq!(res.len(), 2);
        assert_eq!(res[0].candidate_name, "B");
        assert_eq!(res[0].votes, 16);
        assert_eq!(res[0].margin_of_victory, 1);
        assert_eq!(res[1].votes, 15);
        assert_eq!(res[1].margin_of_victory, -1);
    }

    #[test]
    fn single_candidate_wins_by_all_votes() {
        let res = aggregate_results(&[row("smd_2B03", "Solo", 42)]).unwrap();
        assert_eq!(res.len(), 1);
        assert!(res[0].winner);
        assert_eq!(res[0].margin_of_victory, 42);
        assert_eq!(res[0].vote_share, 1.0);
        assert_eq!(
            res[0].external_id,
            candidate_external_id("smd_2B03", "Solo").unwrap()
        );
    }

    #[test]
    fn zero_votes_has_zero_share() {
        let res = aggregate_results(&[row("smd_2B03", "A", 0), row("smd_2B03", "B", 0)]).unwrap();
        assert_eq!(res[0].vote_share, 0.0);
        assert_eq!(res[0].margin_of_victory_percentage, 0.0);
        assert_eq!(res[0].candidate_name, "A");
    }

    #[test]
    fn name_with_the_delimiter_is_dropped_alone() {
        let rows = vec![
            row("smd_1A01", "A", 10),
            row("smd_1A01", "Bo | Chen", 40),
            row("smd_1A01", "C", 5),
            row("smd_1A02", "D", 7),
        ];
        let res = aggregate_results(&rows).unwrap();
        let names: Vec<&str> = res.iter().map(|r| r.candidate_name.as_str()).collect();
        assert_eq!(names, vec!["A", "C", "D"]);
        assert_eq!(res[0].total_votes, 15);
        assert_eq!(res[0].margin_of_victory, 5);
    }

    #[test]
    fn districts_are_ranked_separately_and_sorted() {
        let rows = vec![
            row("smd_1A02", "X", 1),
            row("smd_1A01", "Y", 2),
            row("smd_1A02", "Z", 3),
        ];
        let res = aggregate_results(&rows).unwrap();
        let summary: Vec<(&str, &str, u32)> = res
            .iter()
            .map(|r| (r.smd_id.as_str(), r.candidate_name.as_str(), r.ranking))
            .collect();
        assert_eq!(
            summary,
            vec![("smd_1A01", "Y", 1), ("smd_1A02", "Z", 1), ("smd_1A02", "X", 2)]
        );
        assert_eq!(res[0].num_candidates, 1);
        assert_eq!(res[1].num_candidates, 2);
    }
}
