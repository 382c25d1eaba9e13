use assert_matches::assert_matches;
use niquery::error::NiqueryError;
use niquery::table::{Record, Table, read_table, read_table_from, write_table};
use tempfile::TempDir;

#[test]
fn round_trips_tab_separated_tables() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("out").join("runs.tsv");

    let mut table = Table::new(vec!["dataset".to_string(), "fullpath".to_string()]);
    table.push(Record::from_pairs([("dataset", "ds1"), ("fullpath", "a, b_bold.nii.gz")]));
    table.push(Record::from_pairs([("dataset", "ds2"), ("vols", "120")]));
    write_table(&path, &table, '\t').unwrap();

    let read = read_table(&path, '\t').unwrap();
    assert_eq!(read.columns(), &["dataset", "fullpath", "vols"]);
    assert_eq!(read.records()[0].get("fullpath"), Some("a, b_bold.nii.gz"));
    assert_eq!(read.records()[1].get("fullpath"), Some(""));
    assert_eq!(read.records()[1].get("vols"), Some("120"));
}

#[test]
fn short_rows_are_padded() {
    let table = read_table_from("a,b,c\n1,2\n".as_bytes(), ',').unwrap();
    assert_eq!(table.records()[0].get("c"), Some(""));
}

#[test]
fn missing_file_reports_path() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("absent.csv");
    let err = read_table(&path, ',').unwrap_err();
    assert_matches!(
        err,
        NiqueryError::TableRead { path: reported, .. } if reported.ends_with("absent.csv")
    );
}

#[test]
fn multibyte_separator_is_rejected() {
    let err = read_table_from("a\n".as_bytes(), '¦').unwrap_err();
    assert_matches!(err, NiqueryError::InvalidSeparator('¦'));
}
