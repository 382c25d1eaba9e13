//! Dataset-level filtering down to human functional-MRI datasets.

use crate::attributes::{FMRI_MODALITIES, HUMAN_SPECIES, MODALITIES, SPECIES};
use crate::table::Table;

pub fn is_human_species(species: &str) -> bool {
    let lowered = species.to_lowercase();
    HUMAN_SPECIES.contains(&lowered.as_str())
}

/// True when `modalities` is a list literal naming at least one fMRI modality.
/// Anything that does not parse as a list literal is no match.
pub fn has_fmri_modality(modalities: &str) -> bool {
    if !modalities.starts_with('[') {
        return false;
    }
    match parse_list_literal(modalities) {
        Some(items) => items
            .iter()
            .any(|item| FMRI_MODALITIES.contains(&item.to_lowercase().as_str())),
        None => false,
    }
}

pub fn human_mask(table: &Table) -> Vec<bool> {
    table
        .column_values(SPECIES)
        .map(|value| value.is_some_and(is_human_species))
        .collect()
}

pub fn fmri_mask(table: &Table) -> Vec<bool> {
    table
        .column_values(MODALITIES)
        .map(|value| value.is_some_and(has_fmri_modality))
        .collect()
}

/// Keeps the rows that are both human and functional MRI.
pub fn filter_relevant(table: &Table) -> Table {
    let species = human_mask(table);
    let modalities = fmri_mask(table);
    let total = table.len();

    let non_human = species.iter().filter(|keep| !**keep).count();
    let non_mri = modalities.iter().filter(|keep| !**keep).count();
    tracing::info!("Found {non_human}/{total} non-human datasets.");
    tracing::info!("Found {non_mri}/{total} non-MRI datasets.");

    let combined: Vec<bool> = species
        .iter()
        .zip(&modalities)
        .map(|(human, mri)| *human && *mri)
        .collect();
    table.select(&combined)
}

/// Parses a list literal of quoted strings such as `['bold', "T1w"]`.
///
/// Returns `None` for anything else, including lists holding non-string items.
pub fn parse_list_literal(text: &str) -> Option<Vec<String>> {
    let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(quote) = chars.next() else {
            return Some(items);
        };
        if quote != '\'' && quote != '"' {
            return None;
        }

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => item.push(unescape(chars.next()?)),
                c if c == quote => break,
                c => item.push(c),
            }
        }
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => return Some(items),
            Some(',') => continue,
            Some(_) => return None,
        }
    }
}

fn unescape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_lists() {
        assert_eq!(
            parse_list_literal("['bold', 'T1w']"),
            Some(vec!["bold".to_string(), "T1w".to_string()])
        );
        assert_eq!(parse_list_literal("[]"), Some(vec![]));
        assert_eq!(
            parse_list_literal(r#"["it\'s", 'x',]"#),
            Some(vec!["it's".to_string(), "x".to_string()])
        );
    }

    #[test]
    fn parse_rejects_malformed_lists() {
        assert_eq!(parse_list_literal("['bold'"), None);
        assert_eq!(parse_list_literal("[bold]"), None);
        assert_eq!(parse_list_literal("['bold' 'T1w']"), None);
        assert_eq!(parse_list_literal("[1, 2]"), None);
        assert_eq!(parse_list_literal("bold"), None);
    }

    #[test]
    fn modality_requires_leading_bracket() {
        assert!(has_fmri_modality("['MRI']"));
        assert!(!has_fmri_modality(" ['bold']"));
        assert!(!has_fmri_modality("bold"));
        assert!(!has_fmri_modality("['eeg', 'meg']"));
    }

    #[test]
    fn species_is_case_insensitive() {
        assert!(is_human_species("Human"));
        assert!(is_human_species("HOMO SAPIENS"));
        assert!(!is_human_species("Mouse"));
        assert!(!is_human_species(""));
    }
}
