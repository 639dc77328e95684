use log::debug;

use crate::config::{CoreErrors, Person, PersonId};

/// The best candidate found in a pool of names.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NameMatch {
    pub person_id: PersonId,
    pub full_name: String,
    /// Between 0 and 100.
    pub score: u8,
}

// Lower case, punctuation turned into spaces, runs of spaces collapsed.
fn simplify(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// The similarity ratio of two names, between 0 and 100.
///
/// Based on the normalized Levenshtein distance after both names have been
/// simplified, so that "SMITH, JOHN Q." and "smith john q" are identical.
pub fn similarity(a: &str, b: &str) -> u8 {
    let ratio = strsim::normalized_levenshtein(&simplify(a), &simplify(b));
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Finds the best match for a name in a pool of (id, name) pairs.
///
/// On equal scores, the first entry of the pool wins.
pub fn best_match(query_name: &str, pool: &[(PersonId, String)]) -> Result<NameMatch, CoreErrors> {
    let mut best: Option<NameMatch> = None;
    for (pid, name) in pool.iter() {
        let score = similarity(query_name, name);
        let better = match &best {
            Some(b) => score > b.score,
            None => true,
        };
        if better {
            best = Some(NameMatch {
                person_id: *pid,
                full_name: name.clone(),
                score,
            });
        }
    }
    let res = best.ok_or(CoreErrors::EmptyPool)?;
    debug!(
        "best_match: {:?} -> {:?} ({}) score {}",
        query_name, res.full_name, res.person_id, res.score
    );
    Ok(res)
}

/// The people as a pool, sorted by id so that ties are resolved the same way
/// on every run.
pub fn sorted_pool(people: &[Person]) -> Vec<(PersonId, String)> {
    let mut pool: Vec<(PersonId, String)> = people
        .iter()
        .map(|p| (p.person_id, p.full_name.clone()))
        .collect();
    pool.sort_by_key(|p| p.0);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(names: &[&str]) -> Vec<(PersonId, String)> {
        names
            .iter()
            .enumerate()
            .map(|(idx, n)| (PersonId((idx + 1) as u32), n.to_string()))
            .collect()
    }

    #[test]
    fn exact_name_scores_100() {
        let p = pool(&["Jane Doe", "John Smith", "Mary Major"]);
        let m = best_match("John Smith", &p).unwrap();
        assert_eq!(m.person_id, PersonId(2));
        assert_eq!(m.score, 100);
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        assert_eq!(similarity("JOHN SMITH", "John Smith"), 100);
        assert_eq!(similarity("Smith, John", "smith john"), 100);
        assert_eq!(similarity("  John   Smith ", "John Smith"), 100);
    }

    #[test]
    fn close_names_score_high() {
        let s = similarity("Jon Smith", "John Smith");
        assert!(s >= 80, "score was {}", s);
        assert!(s < 100);
        let s2 = similarity("Jon Smith", "Mary Major");
        assert!(s2 < s);
    }

    #[test]
    fn scores_are_bounded() {
        for (a, b) in [("", ""), ("", "abc"), ("abc", ""), ("x", "yyyyyyyy"), ("é", "e")] {
            let s = similarity(a, b);
            assert!(s <= 100);
        }
        assert_eq!(similarity("abc", "xyz"), 0);
    }

    #[test]
    fn ties_go_to_the_first_entry() {
        let p = pool(&["Ann Lee", "Ann Lee"]);
        let m = best_match("Ann Lee", &p).unwrap();
        assert_eq!(m.person_id, PersonId(1));
    }

    #[test]
    fn empty_pool_fails() {
        assert_eq!(best_match("Ann Lee", &[]), Err(CoreErrors::EmptyPool));
    }

    #[test]
    fn pool_is_sorted_by_id() {
        let people = vec![
            Person {
                person_id: PersonId(7),
                full_name: "B".to_string(),
            },
            Person {
                person_id: PersonId(3),
                full_name: "A".to_string(),
            },
        ];
        let p = sorted_pool(&people);
        assert_eq!(p[0].0, PersonId(3));
        assert_eq!(p[1].0, PersonId(7));
    }
}
