use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use niquery::attributes::{FILENAME, FULLPATH};
use niquery::bold::{discover_listings, identify_bold, is_bold_filename};
use niquery::progress::NoopProgress;
use tempfile::TempDir;

fn write_listing(dir: &Utf8Path, name: &str, rows: &[(&str, &str)]) -> Utf8PathBuf {
    let mut content = format!("{FILENAME},{FULLPATH}\n");
    for (filename, full_path) in rows {
        content.push_str(&format!("{filename},{full_path}\n"));
    }
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
}

#[test]
fn suffix_match_is_anchored_and_case_sensitive() {
    assert!(is_bold_filename("sub-01_task-rest_bold.nii.gz"));
    assert!(!is_bold_filename("sub-01_task-rest_bold.nii"));
    assert!(!is_bold_filename("sub-01_task-rest_bold.json"));
    assert!(!is_bold_filename("sub-01_task-rest_bold.nii.gz.bak"));
    assert!(!is_bold_filename("sub-01_task-rest_BOLD.nii.gz"));
    assert!(!is_bold_filename("sub-01_T1w.nii.gz"));
}

#[test]
fn keeps_bold_rows_per_dataset_and_isolates_bad_listings() {
    let temp = TempDir::new().unwrap();
    let dir = utf8_dir(&temp);
    let ds1 = write_listing(
        &dir,
        "ds000001.csv",
        &[
            ("sub-01_task-rest_bold.nii.gz", "sub-01/func/sub-01_task-rest_bold.nii.gz"),
            ("sub-01_task-rest_bold.json", "sub-01/func/sub-01_task-rest_bold.json"),
            ("sub-01_T1w.nii.gz", "sub-01/anat/sub-01_T1w.nii.gz"),
        ],
    );
    let ds2 = write_listing(
        &dir,
        "ds000002.csv",
        &[("sub-01_dwi.nii.gz", "sub-01/dwi/sub-01_dwi.nii.gz")],
    );

    let mut listings = BTreeMap::new();
    listings.insert("ds000001".to_string(), ds1);
    listings.insert("ds000002".to_string(), ds2);
    listings.insert("ds000003".to_string(), dir.join("absent.csv"));

    let identification = identify_bold(&listings, ',', 2, &NoopProgress).unwrap();

    assert_eq!(identification.bold_count(), 1);
    let ds1 = &identification.datasets["ds000001"];
    assert_eq!(
        ds1.records()[0].get(FULLPATH),
        Some("sub-01/func/sub-01_task-rest_bold.nii.gz")
    );
    assert!(identification.datasets["ds000002"].is_empty());
    assert_eq!(identification.failures.len(), 1);
    assert_eq!(identification.failures[0].dataset_id, "ds000003");
}

#[test]
fn discovers_csv_and_tsv_listings_by_stem() {
    let temp = TempDir::new().unwrap();
    let dir = utf8_dir(&temp);
    write_listing(&dir, "ds000001.csv", &[]);
    write_listing(&dir, "ds000002.tsv", &[]);
    fs::write(dir.join("notes.txt"), "ignored").unwrap();
    fs::create_dir(dir.join("nested.csv")).unwrap();

    let listings = discover_listings(&dir).unwrap();
    let ids: Vec<&str> = listings.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["ds000001", "ds000002"]);
    assert_eq!(listings["ds000002"], dir.join("ds000002.tsv"));
}

#[test]
fn missing_listing_directory_is_an_error() {
    let temp = TempDir::new().unwrap();
    let dir = utf8_dir(&temp).join("nope");
    assert!(discover_listings(&dir).is_err());
}
