//! Content-addressable identifiers.
//!
//! The identifier of a record is the SHA-224 digest of some of its fields,
//! joined by [FIELD_DELIMITER]. The same fields always produce the same
//! identifier, which makes it usable as a natural key when the same export
//! is imported several times.

use sha2::{Digest, Sha224};

use crate::config::CoreErrors;

/// The separator between the hashed fields.
pub const FIELD_DELIMITER: char = '|';

/// Hashes the fields, in order.
///
/// The fields are taken as they are: the caller is responsible for the
/// normalization (case, whitespace). A field that contains the delimiter is
/// rejected: `["a|b", "c"]` and `["a", "b|c"]` must not share a digest.
pub fn hash_fields(fields: &[&str]) -> Result<String, CoreErrors> {
    if let Some(f) = fields.iter().find(|f| f.contains(FIELD_DELIMITER)) {
        return Err(CoreErrors::DelimiterInField(f.to_string()));
    }
    let joined = fields.join(&FIELD_DELIMITER.to_string());
    let mut hasher = Sha224::new();
    hasher.update(joined.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Upper-cases a name and collapses the whitespaces.
pub fn normalize_candidate_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_uppercase()
}

/// The external identifier of a candidate: the hash of the district and the
/// normalized name.
pub fn candidate_external_id(smd_id: &str, candidate_name: &str) -> Result<String, CoreErrors> {
    let name = normalize_candidate_name(candidate_name);
    hash_fields(&[smd_id.trim(), name.as_str()])
}
