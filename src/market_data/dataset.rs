// Final table: fixed column order, pure append, CSV out.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::ExportError;
use crate::market_data::types::{CanonicalRecord, Column};

/// Project a record onto `columns`, in that order. Unpopulated fields come
/// out as "".
pub fn project(record: &CanonicalRecord, columns: &[Column]) -> Vec<String> {
    columns.iter().map(|c| record.get(*c).to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// Append a batch as-is. No dedup, no reordering.
    pub fn append<I>(&mut self, batch: I)
    where
        I: IntoIterator<Item = CanonicalRecord>,
    {
        for record in batch {
            self.rows.push(project(&record, &self.columns));
        }
    }

    pub fn header(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Cell by column, if the column is part of this table.
    pub fn value(&self, row: usize, column: Column) -> Option<&str> {
        let idx = self.columns.iter().position(|c| *c == column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(self.header())?;
        for row in &self.rows {
            out.write_record(row)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let file = File::create(path.as_ref())?;
        self.write_to(file)?;
        tracing::info!(rows = self.len(), path = %path.as_ref().display(), "wrote dataset");
        Ok(())
    }
}
