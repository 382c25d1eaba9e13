use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::NiqueryError;

/// One row of a tabular source, keeping its column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::new();
        for (key, value) in pairs {
            record.set(key, value);
        }
        record
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == column)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value in place when the column exists, appends otherwise.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Ordered columns plus the rows that carry them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Builds a table whose columns are the union of the record columns in first-seen order.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut table = Self::default();
        for record in records {
            table.push(record);
        }
        table
    }

    /// Builds a table with a fixed column order; columns only found in records are appended.
    pub fn with_records(columns: Vec<String>, records: Vec<Record>) -> Self {
        let mut table = Self::new(columns);
        for record in records {
            table.push(record);
        }
        table
    }

    pub fn push(&mut self, record: Record) {
        for column in record.columns() {
            if !self.columns.iter().any(|known| known == column) {
                self.columns.push(column.to_string());
            }
        }
        self.records.push(record);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|known| known == column)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = Option<&'a str>> {
        self.records.iter().map(move |record| record.get(column))
    }

    /// Keeps the rows whose mask entry is true. Masks shorter than the table drop the tail.
    pub fn select(&self, mask: &[bool]) -> Table {
        let records = self
            .records
            .iter()
            .zip(mask)
            .filter(|(_, keep)| **keep)
            .map(|(record, _)| record.clone())
            .collect();
        Table {
            columns: self.columns.clone(),
            records,
        }
    }

    pub fn filter<F>(&self, mut predicate: F) -> Table
    where
        F: FnMut(&Record) -> bool,
    {
        let records = self
            .records
            .iter()
            .filter(|record| predicate(record))
            .cloned()
            .collect();
        Table {
            columns: self.columns.clone(),
            records,
        }
    }

    /// Moves the given columns to the front, in the order given; the rest keep their
    /// relative order. Columns the table does not have are ignored.
    pub fn move_to_front(&mut self, front: &[&str]) {
        let front: Vec<&str> = front
            .iter()
            .copied()
            .filter(|column| self.has_column(column))
            .collect();
        let mut ordered: Vec<String> = front.iter().map(|column| column.to_string()).collect();
        ordered.extend(
            self.columns
                .iter()
                .filter(|column| !front.contains(&column.as_str()))
                .cloned(),
        );
        self.columns = ordered;
    }
}

pub fn separator_byte(separator: char) -> Result<u8, NiqueryError> {
    if separator.is_ascii() {
        Ok(separator as u8)
    } else {
        Err(NiqueryError::InvalidSeparator(separator))
    }
}

pub fn read_table(path: &Path, separator: char) -> Result<Table, NiqueryError> {
    let file = File::open(path).map_err(|err| NiqueryError::TableRead {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    read_table_from(file, separator).map_err(|err| match err {
        NiqueryError::TableRead { message, .. } => NiqueryError::TableRead {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

pub fn read_table_from<R: Read>(reader: R, separator: char) -> Result<Table, NiqueryError> {
    let delimiter = separator_byte(separator)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let read_error = |err: csv::Error| NiqueryError::TableRead {
        path: "<stream>".to_string(),
        message: err.to_string(),
    };

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(read_error)?
        .iter()
        .map(|value| value.to_string())
        .collect();

    let mut table = Table::new(headers.clone());
    for row in csv_reader.records() {
        let row = row.map_err(read_error)?;
        let record = Record::from_pairs(
            headers
                .iter()
                .enumerate()
                .map(|(index, column)| (column.clone(), row.get(index).unwrap_or("").to_string())),
        );
        table.records.push(record);
    }
    Ok(table)
}

pub fn write_table(path: &Path, table: &Table, separator: char) -> Result<(), NiqueryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|err| NiqueryError::Filesystem(err.to_string()))?;
        }
    }
    let file = File::create(path).map_err(|err| NiqueryError::TableWrite {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    write_table_to(file, table, separator).map_err(|err| match err {
        NiqueryError::TableWrite { message, .. } => NiqueryError::TableWrite {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

pub fn write_table_to<W: Write>(
    writer: W,
    table: &Table,
    separator: char,
) -> Result<(), NiqueryError> {
    let delimiter = separator_byte(separator)?;
    let write_error = |message: String| NiqueryError::TableWrite {
        path: "<stream>".to_string(),
        message,
    };

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    csv_writer
        .write_record(table.columns())
        .map_err(|err| write_error(err.to_string()))?;
    for record in table.records() {
        let row = table
            .columns()
            .iter()
            .map(|column| record.get(column).unwrap_or(""));
        csv_writer
            .write_record(row)
            .map_err(|err| write_error(err.to_string()))?;
    }
    csv_writer
        .flush()
        .map_err(|err| write_error(err.to_string()))?;
    Ok(())
}
