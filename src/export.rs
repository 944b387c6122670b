//! Result table export: ordering, CSV encoding, and destination lookup.

use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::info;

use crate::{config::Config, storage::ObjectStore};

/// Stable sort by (`adm1_src`, `adm2_src`) when the table has district ids;
/// otherwise the input order is kept. Null ids sort last.
pub fn sort_for_export(df: &DataFrame) -> Result<DataFrame> {
    if df.column("adm2_src").is_err() {
        return Ok(df.clone())
    }

    let by = ["adm1_src", "adm2_src"].into_iter()
        .filter(|name| df.column(name).is_ok())
        .collect::<Vec<_>>();

    df.sort(by, SortMultipleOptions::default().with_maintain_order(true).with_nulls_last(true))
        .context("[export::sort_for_export] failed to sort result table")
}

/// Encode a table as CSV with a header row and no index column.
pub fn write_csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .include_header(true)
        .finish(&mut df.clone())
        .context("[export::write_csv_bytes] failed to write CSV to bytes")?;
    Ok(out)
}

/// Sort, encode, and store a hazard's result table at its configured key.
/// Returns the key written.
pub fn export_table<'a>(df: &DataFrame, hazard: &str, config: &'a Config, store: &dyn ObjectStore) -> Result<&'a str> {
    let key = config.output_path(hazard)?;
    let bytes = write_csv_bytes(&sort_for_export(df)?)?;
    store.put(key, &bytes)
        .with_context(|| format!("[export::export_table] failed to store {hazard} results"))?;

    info!(hazard, rows = df.height(), path = %store.locate(key), "[export] saved results");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::HazardError, storage::LocalStore};

    fn districts() -> DataFrame {
        df!(
            "adm1_src" => ["B", "A", "B", "A"],
            "adm2_src" => [Some("B2"), Some("A9"), None, Some("A1")],
            "pop_exp" => [1.0, 2.0, 3.0, 4.0],
        ).unwrap()
    }

    #[test]
    fn district_tables_sort_by_province_then_district() {
        let sorted = sort_for_export(&districts()).unwrap();
        let adm2 = sorted.column("adm2_src").unwrap().str().unwrap()
            .into_iter().collect::<Vec<_>>();
        assert_eq!(adm2, vec![Some("A1"), Some("A9"), Some("B2"), None]);
    }

    #[test]
    fn equal_keys_keep_input_order() {
        let df = df!(
            "adm1_src" => ["B", "A", "B", "A", "B", "A"],
            "adm2_src" => ["B1", "A1", "B1", "A1", "B1", "A1"],
            "pop_exp" => [0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        ).unwrap();
        let sorted = sort_for_export(&df).unwrap();
        let order = sorted.column("pop_exp").unwrap().f64().unwrap()
            .into_no_null_iter().collect::<Vec<_>>();
        assert_eq!(order, vec![1.0, 3.0, 5.0, 0.0, 2.0, 4.0]);
    }

    #[test]
    fn province_tables_keep_input_order() {
        let df = df!("adm1_src" => ["Z", "A", "M"], "max_speed" => [1.0, 2.0, 3.0]).unwrap();
        assert_eq!(sort_for_export(&df).unwrap(), df);
    }

    #[test]
    fn csv_has_header_and_no_index() {
        let df = df!("adm1_src" => ["A"], "exp_ratio" => [None::<f64>]).unwrap();
        let text = String::from_utf8(write_csv_bytes(&df).unwrap()).unwrap();
        assert_eq!(text, "adm1_src,exp_ratio\nA,\n");
    }

    #[test]
    fn export_writes_to_configured_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let config = Config::default();

        let key = export_table(&districts(), "flood", &config, &store).unwrap();
        assert_eq!(key, "output_data/flood/flood.csv");
        let text = String::from_utf8(store.get(key).unwrap()).unwrap();
        assert!(text.starts_with("adm1_src,adm2_src,pop_exp\nA,A1,4.0\n"));
    }

    #[test]
    fn unknown_hazard_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let err = export_table(&districts(), "tsunami", &Config::default(), &store).unwrap_err();
        assert!(matches!(err.downcast_ref::<HazardError>(), Some(HazardError::UnknownHazard(_))));
    }
}
