// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDate;

/// The stable identifier of a person.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct PersonId(pub u32);

/// The identifier of one run of a person in one district.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub u32);

impl Display for PersonId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique human. Never deleted.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Person {
    pub person_id: PersonId,
    pub full_name: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub candidate_id: CandidateId,
    pub person_id: PersonId,
    pub smd_id: String,
    /// The content hash of the district and the upper-cased name, as observed
    /// in the election authority export.
    pub external_id: Option<String>,
    pub candidate_status: String,
    pub election_year: i32,
    pub pickup_date: Option<NaiveDate>,
    pub filed_date: Option<NaiveDate>,
}

/// A single member district.
///
/// Districts from different redistricting cycles are distinct entities, even
/// when they share a code.
#[derive(PartialEq, Debug, Clone)]
pub struct District {
    pub smd_id: String,
    pub anc_id: Option<String>,
    pub ward_id: Option<String>,
    pub redistricting_year: Option<i32>,
    pub overlap_smds: Vec<String>,
    pub overlap_percentage: Vec<f64>,
}

impl District {
    /// A district with no parent or overlap information.
    pub fn new(smd_id: &str) -> District {
        District {
            smd_id: smd_id.to_string(),
            anc_id: None,
            ward_id: None,
            redistricting_year: None,
            overlap_smds: Vec::new(),
            overlap_percentage: Vec::new(),
        }
    }
}

/// One tenure of a person in the seat of a district.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Commissioner {
    pub person_id: PersonId,
    pub smd_id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateStatus {
    pub candidate_status: String,
    pub count_as_candidate: bool,
    pub display_order: u32,
}

/// All the canonical tables, borrowed for the duration of one run.
#[derive(Debug, Clone, Copy)]
pub struct Tables<'a> {
    pub districts: &'a [District],
    pub candidates: &'a [Candidate],
    pub people: &'a [Person],
    pub commissioners: &'a [Commissioner],
    pub statuses: &'a [CandidateStatus],
}

/// A candidate as observed in an export of the election authority, after the
/// columns have been mapped to the canonical names.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SourceRecord {
    pub smd_id: String,
    pub candidate_name: String,
    pub pickup_date: Option<NaiveDate>,
    pub filed_date: Option<NaiveDate>,
    pub candidate_status: Option<String>,
}

impl SourceRecord {
    pub fn new(smd_id: &str, candidate_name: &str) -> SourceRecord {
        SourceRecord {
            smd_id: smd_id.to_string(),
            candidate_name: candidate_name.to_string(),
            pickup_date: None,
            filed_date: None,
            candidate_status: None,
        }
    }
}

/// One row of precinct-level results.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PrecinctResult {
    pub election_year: i32,
    pub smd_id: String,
    pub contest_name: String,
    pub candidate_name: String,
    pub votes: u64,
}

// ******** Output data structures *********

/// One row per district, as consumed by the page builders.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DistrictView {
    pub smd_id: String,
    pub current_commissioner: String,
    pub commissioner_elect: Option<String>,
    pub list_of_candidates: String,
    pub number_of_candidates: usize,
}

/// The outcome of one candidate in one district.
#[derive(PartialEq, Debug, Clone)]
pub struct ElectionResult {
    pub election_year: i32,
    pub smd_id: String,
    pub external_id: String,
    pub candidate_name: String,
    pub votes: u64,
    pub vote_share: f64,
    /// Starts at 1. Ties are broken by the order in which candidates were first seen.
    pub ranking: u32,
    pub winner: bool,
    pub margin_of_victory: i64,
    pub margin_of_victory_percentage: f64,
    pub num_candidates: u32,
    pub total_votes: u64,
}

/// Errors that prevent the core from completing successfully.
///
/// Integrity violations are never corrected: the caller is expected to stop
/// writing any output.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CoreErrors {
    /// No person to match a name against.
    EmptyPool,
    /// A field to hash contains the field delimiter.
    DelimiterInField(String),
    MultipleCurrentCommissioners(String),
    MultipleFutureCommissioners(String),
    UnknownPerson(PersonId),
    DuplicatePersonId(PersonId),
    DuplicateCandidateId(CandidateId),
    /// A review item was approved, but there is no person to link it to.
    ApprovedWithoutMatch(String),
}

impl Error for CoreErrors {}

impl Display for CoreErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreErrors::EmptyPool => write!(f, "cannot match a name against an empty pool"),
            CoreErrors::DelimiterInField(s) => {
                write!(f, "field {:?} contains the delimiter {:?}", s, crate::FIELD_DELIMITER)
            }
            CoreErrors::MultipleCurrentCommissioners(smd) => {
                write!(f, "more than one current commissioner in {}", smd)
            }
            CoreErrors::MultipleFutureCommissioners(smd) => {
                write!(f, "more than one future commissioner in {}", smd)
            }
            CoreErrors::UnknownPerson(pid) => write!(f, "unknown person_id {}", pid),
            CoreErrors::DuplicatePersonId(pid) => write!(f, "duplicate person_id {}", pid),
            CoreErrors::DuplicateCandidateId(cid) => write!(f, "duplicate candidate_id {}", cid),
            CoreErrors::ApprovedWithoutMatch(name) => {
                write!(f, "review item for {:?} is approved but has no matched person", name)
            }
        }
    }
}

// ********* Configuration **********

/// The settings that control the identity resolution.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResolutionRules {
    /// The election for which the records are collected.
    pub election_year: i32,
    /// Scores at or above this value are proposed as an existing person.
    /// This only decides in which review list a proposal is placed.
    pub match_threshold: u8,
    /// The status given to new candidates when the export does not carry one.
    pub default_candidate_status: String,
}

impl ResolutionRules {
    pub const DEFAULT_MATCH_THRESHOLD: u8 = 80;

    pub fn new(election_year: i32) -> ResolutionRules {
        ResolutionRules {
            election_year,
            match_threshold: ResolutionRules::DEFAULT_MATCH_THRESHOLD,
            default_candidate_status: "Pulled papers".to_string(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct AggregationRules {
    /// When set, only the candidates of this election are listed.
    pub election_year: Option<i32>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ResultRules {
    /// Rows with these candidate labels are not votes for a candidate.
    pub excluded_labels: Vec<String>,
}

impl Default for ResultRules {
    fn default() -> Self {
        ResultRules {
            excluded_labels: vec!["Over Votes".to_string(), "Under Votes".to_string()],
        }
    }
}
