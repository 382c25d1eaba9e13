//! Column names shared by dataset, file and run tables.

pub const DATASETID: &str = "dataset";
pub const FILENAME: &str = "filename";
pub const FULLPATH: &str = "fullpath";
pub const SPECIES: &str = "species";
pub const MODALITIES: &str = "modalities";
pub const VOLS: &str = "vols";
pub const REMOTE: &str = "remote";

/// Lower-cased species labels accepted as human.
pub const HUMAN_SPECIES: &[&str] = &["human", "homo sapiens"];

/// Lower-cased modality labels that mark a dataset as functional MRI.
pub const FMRI_MODALITIES: &[&str] = &["bold", "fmri", "func", "functional", "mri"];

pub const BOLD_SUFFIX_PATTERN: &str = r"_bold\.nii\.gz$";
