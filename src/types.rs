/// Integer identifier shared by the click and metadata streams, used to align rows.
/// Example: `1523452`
pub type JoinKey = i64;
/// Integer user identifier used to group searches during validation-set derivation.
/// Example: `40543`
pub type UserId = i64;
/// Integer ad identifier referenced by the auxiliary lookup join.
/// Example: `8491`
pub type AdId = i64;
/// Click label emitted with each joined row (`0`/`1`; forced `0` for unlabeled streams).
pub type Label = i64;
/// Output feature name produced by an extractor.
/// Examples: `ad_id`, `position`, `hist_ctr`
pub type FieldName = String;
/// Human-readable stream tag used in errors and logs.
/// Examples: `trainSearchStream.tsv`, `search_info`
pub type StreamId = String;
/// Set of join keys denoting validation/exclusion membership.
/// Immutable once constructed; produced by the validation builder or supplied externally.
pub type IdentifierSet = std::collections::HashSet<JoinKey>;
