use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::tempdir;

use rolljoin::constants::columns;
use rolljoin::{
    AdsLookup, DatasetPaths, ExtractorSet, FeatureValue, Header, IdentifierSet, JoinError,
    JoinedRow, Label, MembershipMode, Record, RollingJoin, RowRouter, field_float, field_int,
};

const TRAIN: &str = "SearchID\tAdID\tObjectType\tIsClick\n\
                     1\t100\t3\t0\n\
                     1\t101\t1\t0\n\
                     2\t100\t3\t1\n\
                     4\t102\t3\t0\n\
                     4\t100\t3\t0\n";
const SEARCH_INFO: &str = "SearchID\tUserID\tSearchDate\n\
                           1\t7\t2015-05-10 11:00:00.0\n\
                           2\t8\t2015-05-11 12:30:00.0\n\
                           3\t7\t2015-05-12 13:00:00.0\n\
                           4\t9\t2015-05-13 14:45:00.0\n";

fn write_dataset(dir: &Path) -> DatasetPaths {
    fs::write(dir.join("trainSearchStream.tsv"), TRAIN).unwrap();
    fs::write(dir.join("SearchInfo.tsv"), SEARCH_INFO).unwrap();
    DatasetPaths::new(dir)
}

fn extractors() -> (ExtractorSet<Record>, ExtractorSet<Record>) {
    (
        ExtractorSet::new()
            .with("search_id", field_int(columns::SEARCH_ID))
            .with("ad_id", field_int(columns::AD_ID)),
        ExtractorSet::new().with("user_id", field_int(columns::USER_ID)),
    )
}

fn run_join(paths: &DatasetPaths, router: RowRouter) -> Vec<(JoinedRow, Label)> {
    let (primary_etl, secondary_etl) = extractors();
    RollingJoin::new(
        paths.open_train().unwrap(),
        paths.open_search_info().unwrap(),
    )
    .labeled(true)
    .with_router(router)
    .with_primary_extractors(primary_etl)
    .with_secondary_extractors(secondary_etl)
    .map(|item| item.unwrap())
    .collect()
}

fn search_ids(rows: &[(JoinedRow, Label)]) -> Vec<FeatureValue> {
    rows.iter().map(|(row, _)| row["search_id"].clone()).collect()
}

#[test]
fn join_emits_one_row_per_matching_primary_record() {
    let dir = tempdir().unwrap();
    let paths = write_dataset(dir.path());
    let rows = run_join(&paths, RowRouter::new());

    // Four contextual rows; the ObjectType=1 placement is skipped.
    assert_eq!(rows.len(), 4);
    assert_eq!(
        search_ids(&rows),
        vec![
            FeatureValue::Int(1),
            FeatureValue::Int(2),
            FeatureValue::Int(4),
            FeatureValue::Int(4),
        ]
    );
    let labels: Vec<Label> = rows.iter().map(|(_, label)| *label).collect();
    assert_eq!(labels, vec![0, 1, 0, 0]);
    // The joined user comes from the covering metadata stream.
    assert_eq!(rows[2].0["user_id"], FeatureValue::Int(9));
}

#[test]
fn membership_modes_partition_the_unfiltered_output() {
    let dir = tempdir().unwrap();
    let paths = write_dataset(dir.path());
    let validation: IdentifierSet = [1, 4].into_iter().collect();

    let all = run_join(&paths, RowRouter::new());
    let included = run_join(
        &paths,
        RowRouter::new().with_membership(MembershipMode::IncludeOnly, validation.clone()),
    );
    let excluded = run_join(
        &paths,
        RowRouter::new().with_membership(MembershipMode::ExcludeOnly, validation),
    );

    assert_eq!(included.len(), 3);
    assert_eq!(excluded.len(), 1);
    assert_eq!(included.len() + excluded.len(), all.len());

    // Same inputs, disjoint key sets, and the union preserves primary order.
    let mut merged = search_ids(&included);
    merged.extend(search_ids(&excluded));
    merged.sort_by_key(|value| match value {
        FeatureValue::Int(key) => *key,
        _ => unreachable!(),
    });
    let mut all_ids = search_ids(&all);
    all_ids.sort_by_key(|value| match value {
        FeatureValue::Int(key) => *key,
        _ => unreachable!(),
    });
    assert_eq!(merged, all_ids);
}

#[test]
fn repeated_runs_yield_byte_identical_output() {
    let dir = tempdir().unwrap();
    let paths = write_dataset(dir.path());

    let serialize = || -> Vec<String> {
        run_join(&paths, RowRouter::new())
            .into_iter()
            .map(|(row, label)| format!("{} {label}", serde_json::to_string(&row).unwrap()))
            .collect()
    };
    assert_eq!(serialize(), serialize());
}

#[test]
fn missing_secondary_coverage_aborts_the_pass() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("trainSearchStream.tsv"), TRAIN).unwrap();
    fs::write(
        dir.path().join("SearchInfo.tsv"),
        "SearchID\tUserID\tSearchDate\n\
         1\t7\t2015-05-10 11:00:00.0\n\
         3\t7\t2015-05-12 13:00:00.0\n\
         4\t9\t2015-05-13 14:45:00.0\n",
    )
    .unwrap();
    let paths = DatasetPaths::new(dir.path());

    let (primary_etl, secondary_etl) = extractors();
    let mut join = RollingJoin::new(
        paths.open_train().unwrap(),
        paths.open_search_info().unwrap(),
    )
    .labeled(true)
    .with_primary_extractors(primary_etl)
    .with_secondary_extractors(secondary_etl);

    // Key 1 joins fine; key 2 has no metadata row and must fail loudly.
    let first = join.next().unwrap();
    assert!(first.is_ok());
    let second = join.next().unwrap();
    assert!(matches!(
        second.unwrap_err(),
        JoinError::Desync { details, .. } if details.contains("expected key 2")
    ));
    assert!(join.next().is_none(), "nothing may be emitted after a desync");
}

#[test]
fn ads_lookup_extends_rows_and_rejects_unknown_ads() {
    let dir = tempdir().unwrap();
    let paths = write_dataset(dir.path());

    let header = Arc::new(Header::new("ads", ["AdID", "Price"]));
    let ad = |id: &str, price: &str| {
        Record::new(
            Arc::clone(&header),
            vec![id.to_string(), price.to_string()],
            0,
        )
    };
    let full_table: HashMap<i64, Record> = [
        (100, ad("100", "9.95")),
        (101, ad("101", "1.00")),
        (102, ad("102", "2.50")),
    ]
    .into_iter()
    .collect();

    let (primary_etl, secondary_etl) = extractors();
    let rows: Vec<(JoinedRow, Label)> = RollingJoin::new(
        paths.open_train().unwrap(),
        paths.open_search_info().unwrap(),
    )
    .labeled(true)
    .with_primary_extractors(primary_etl)
    .with_secondary_extractors(secondary_etl)
    .with_ads(AdsLookup::new(
        full_table.clone(),
        ExtractorSet::new().with("price", field_float("Price")),
    ))
    .map(|item| item.unwrap())
    .collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].0["price"], FeatureValue::Float(9.95));
    assert_eq!(rows[2].0["price"], FeatureValue::Float(2.50));

    // Drop ad 102 from the table: the pass must fail fast on the miss.
    let mut partial_table = full_table;
    partial_table.remove(&102);
    let (primary_etl, secondary_etl) = extractors();
    let results: Vec<_> = RollingJoin::new(
        paths.open_train().unwrap(),
        paths.open_search_info().unwrap(),
    )
    .labeled(true)
    .with_primary_extractors(primary_etl)
    .with_secondary_extractors(secondary_etl)
    .with_ads(AdsLookup::new(
        partial_table,
        ExtractorSet::new().with("price", field_float("Price")),
    ))
    .collect();
    let failure = results
        .iter()
        .find(|item| item.is_err())
        .expect("missing ad must fail the pass");
    assert!(matches!(
        failure.as_ref().unwrap_err(),
        JoinError::LookupMiss { key: 102 }
    ));
}

#[test]
fn early_consumer_termination_is_clean() {
    let dir = tempdir().unwrap();
    let paths = write_dataset(dir.path());

    let (primary_etl, secondary_etl) = extractors();
    let mut join = RollingJoin::new(
        paths.open_train().unwrap(),
        paths.open_search_info().unwrap(),
    )
    .labeled(true)
    .with_primary_extractors(primary_etl)
    .with_secondary_extractors(secondary_etl);

    // Pull a single row and walk away; sources are read-only and the
    // cursors release the files on drop.
    let first = join.next().unwrap().unwrap();
    assert_eq!(first.0["search_id"], FeatureValue::Int(1));
    drop(join);

    // The inputs are untouched, so a fresh pass sees the same data.
    let rows = run_join(&paths, RowRouter::new());
    assert_eq!(rows.len(), 4);
}
