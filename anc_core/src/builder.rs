pub use crate::config::*;

/// A builder for collecting precinct results.
///
/// Rows with an excluded label (over votes, under votes) are not counted.
/// Rows that cannot be given an external id are refused.
///
/// ```
/// pub use anc_core::builder::ResultsBuilder;
/// pub use anc_core::ResultRules;
/// # use anc_core::CoreErrors;
///
/// let mut builder = ResultsBuilder::new(&ResultRules::default());
/// builder.add_row(2022, "smd_1A01", "ANC 1A01", "Anna", 120)?;
/// builder.add_row(2022, "smd_1A01", "ANC 1A01", "Over Votes", 3)?;
/// assert!(builder.add_row(2022, "smd_1A01", "ANC 1A01", "Bo | Chen", 8).is_err());
///
/// let results = builder.build()?;
/// assert_eq!(results.len(), 1);
/// # Ok::<(), CoreErrors>(())
/// ```
pub struct ResultsBuilder {
    pub(crate) _rules: ResultRules,
    pub(crate) _rows: Vec<PrecinctResult>,
    pub(crate) _excluded: usize,
}

impl ResultsBuilder {
    pub fn new(rules: &ResultRules) -> ResultsBuilder {
        ResultsBuilder {
            _rules: rules.clone(),
            _rows: Vec::new(),
            _excluded: 0,
        }
    }

    /// Adds the votes of a candidate in one precinct.
    pub fn add_row(
        &mut self,
        election_year: i32,
        smd_id: &str,
        contest_name: &str,
        candidate_name: &str,
        votes: u64,
    ) -> Result<(), CoreErrors> {
        self.add_precinct_result(&PrecinctResult {
            election_year,
            smd_id: smd_id.to_string(),
            contest_name: contest_name.to_string(),
            candidate_name: candidate_name.trim().to_string(),
            votes,
        })
    }

    pub fn add_precinct_result(&mut self, row: &PrecinctResult) -> Result<(), CoreErrors> {
        let excluded = self
            ._rules
            .excluded_labels
            .iter()
            .any(|l| l.eq_ignore_ascii_case(row.candidate_name.trim()));
        if excluded {
            self._excluded += 1;
            return Ok(());
        }
        crate::hash_id::candidate_external_id(&row.smd_id, &row.candidate_name)?;
        self._rows.push(row.clone());
        Ok(())
    }

    /// The number of rows that were not counted.
    pub fn excluded_rows(&self) -> usize {
        self._excluded
    }

    pub fn build(&self) -> Result<Vec<ElectionResult>, CoreErrors> {
        crate::results::aggregate_results(&self._rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_rows_are_not_counted() {
        let mut builder = ResultsBuilder::new(&ResultRules::default());
        builder.add_row(2022, "smd_1A01", "ANC 1A01", "Ann", 10).unwrap();
        let err = builder.add_row(2022, "smd_1A01", "ANC 1A01", "Bo | Chen", 40);
        assert_eq!(
            err,
            Err(CoreErrors::DelimiterInField("BO | CHEN".to_string()))
        );
        builder.add_row(2022, "smd_1A01", "ANC 1A01", "under votes", 4).unwrap();
        assert_eq!(builder.excluded_rows(), 1);
        let results = builder.build().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].candidate_name, "Ann");
        assert_eq!(results[0].total_votes, 10);
    }
}
