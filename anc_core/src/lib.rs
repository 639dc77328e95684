/*!
The data core of the ANC build: matching the candidates published by the
election authority to known people, and folding the candidates,
commissioners and results into one view per district.

The crate does no I/O. All the tables are passed as slices and all the
outputs are returned as new vectors, so a run can be repeated on the same
inputs with the same outcome.

See the [manual] for the review workflow.
*/
mod aggregation;
pub mod builder;
mod config;
mod hash_id;
pub mod manual;
mod matcher;
mod resolution;
mod results;

pub use crate::aggregation::{
    aggregate_districts, seated_commissioners, tenure_at, Tenure, NO_KNOWN_CANDIDATES, VACANT,
};
pub use crate::config::*;
pub use crate::hash_id::{
    candidate_external_id, hash_fields, normalize_candidate_name, FIELD_DELIMITER,
};
pub use crate::matcher::{best_match, similarity, sorted_pool, NameMatch};
pub use crate::resolution::{
    apply_review, check_unique_ids, resolve_identities, AppliedReview, CandidateProposal,
    DroppedRecord, HashChange, IdSequence, Resolution, ReviewState,
};
pub use crate::results::aggregate_results;
