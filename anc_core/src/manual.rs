/*!

This is the long-form manual for `anc_core` and `ancbuild`.

## Tables

All the tables are CSV files with a header row.

* `districts`: `smd_id, anc_id, ward_id, redistricting_year, overlap_smds, overlap_percentage`
* `people`: `person_id, full_name`
* `candidates`: `candidate_id, person_id, smd_id, dcboe_hash_id, candidate_status, election_year, pickup_date, filed_date`
* `commissioners`: `person_id, smd_id, start_date, end_date`
* `candidate_statuses`: `candidate_status, count_as_candidate, display_order`

Dates are written `YYYY-MM-DD`. `overlap_smds` and `overlap_percentage` are
comma-separated lists.

## Candidate exports

The lists published by the election authority change their column names
from one year to the next. Each source in the configuration lists the
accepted names for every column:

```json
{
  "provider": "xlsx",
  "filePath": "dcboe/candidates.xlsx",
  "columns": {
    "smdId": ["SMD", "ANC/SMD"],
    "candidateName": ["Candidate Name", "Name"],
    "pickupDate": ["Date of Pick-up"],
    "filedDate": ["Date Filed"]
  }
}
```

District codes such as `1A01`, `SMD 1A01` or `smd_1A01` are all read as the
same district. The code must be the last word of the cell.

## Review workflow

`ancbuild resolve` writes three files in `review/`:

* `hash_changes.csv`: a candidate of this year, in the same district, whose
  name is written differently.
* `new_candidates.csv`: a known person running this year in a district
  where they have no run yet, including the district of an earlier year.
* `new_people_and_candidates.csv`: nobody matched well enough.

Every line carries the best guess and its score (0 to 100), and a
`good_match` column set to `?`. Nothing is applied until this column is
edited:

* `y`: the best guess is this person. The hash is updated, or the candidate
  is linked to the existing person.
* `n`: the best guess is someone else. For hash changes nothing happens;
  otherwise a new person is created.
* `?`: left for later.

`ancbuild apply` then writes the updated `people.csv` and `candidates.csv`
in `tables/`. Running it twice does not create duplicates.

The match threshold (`matchThreshold`, 80 by default) only decides in which
of the two candidate files a line is written.

## Commissioners

A tenure covers the dates from `start_date` included to `end_date` excluded,
in the configured timezone. Two commissioners that are current (or future)
in the same district at the same time stop the build.

*/
