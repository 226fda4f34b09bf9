//! Column-oriented table of derived features, indexed by date.
//!
//! A [`FeatureFrame`] keeps every column at full series length while features
//! are being computed, and records how many leading rows (lag and moving
//! average warm-up) and trailing rows (forward-looking labels) are undefined.
//! [`FeatureFrame::truncate`] drops those margins together with rows outside
//! the configured date bounds.

use crate::config::DateBounds;
use crate::error::{parse_date, PipelineError, Result};
use chrono::NaiveDate;
use ndarray::Array2;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

/// Name of the date column in feature CSVs.
pub const DATE_COLUMN: &str = "Date";

/// Date-indexed feature table.
#[derive(Debug, Clone, Default)]
pub struct FeatureFrame {
    dates: Vec<NaiveDate>,
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    index: HashMap<String, usize>,
    warmup: usize,
    lead: usize,
}

impl FeatureFrame {
    /// Create an empty frame over the given dates.
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            ..Default::default()
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column names in insertion order (excluding the date).
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn num_columns(&self) -> usize {
        self.names.len()
    }

    /// Rows at the start that depend on data before the series.
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// Rows at the end that depend on data after the series.
    pub fn lead(&self) -> usize {
        self.lead
    }

    /// Widen the undefined margins; margins only ever grow.
    pub fn extend_margins(&mut self, warmup: usize, lead: usize) {
        self.warmup = self.warmup.max(warmup);
        self.lead = self.lead.max(lead);
    }

    /// Append a column, replacing any existing column with the same name.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        let name = name.into();
        if values.len() != self.len() {
            return Err(PipelineError::Validation(format!(
                "column '{}' has {} values, frame has {} rows",
                name,
                values.len(),
                self.len()
            )));
        }
        match self.index.get(&name) {
            Some(&idx) => self.columns[idx] = values,
            None => {
                self.index.insert(name.clone(), self.names.len());
                self.names.push(name);
                self.columns.push(values);
            }
        }
        Ok(())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index.get(name).map(|&idx| self.columns[idx].as_slice())
    }

    /// Like [`column`](Self::column), but a missing column is an error.
    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Gather the named columns into a `(rows, keys.len())` matrix.
    pub fn select<S: AsRef<str>>(&self, keys: &[S]) -> Result<Array2<f64>> {
        let cols = keys
            .iter()
            .map(|k| self.require_column(k.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Array2::from_shape_fn((self.len(), cols.len()), |(row, col)| {
            cols[col][row]
        }))
    }

    /// Remove the named columns. Names that are not present are ignored.
    pub fn remove_columns<S: AsRef<str>>(&mut self, names: &[S]) {
        let drop: Vec<&str> = names.iter().map(|n| n.as_ref()).collect();
        let mut kept_names = Vec::with_capacity(self.names.len());
        let mut kept_columns = Vec::with_capacity(self.columns.len());
        for (name, column) in self.names.drain(..).zip(self.columns.drain(..)) {
            if !drop.contains(&name.as_str()) {
                kept_names.push(name);
                kept_columns.push(column);
            }
        }
        self.names = kept_names;
        self.columns = kept_columns;
        self.rebuild_index();
    }

    /// Copy of the rows in `range`. Margins are reset.
    pub fn slice_rows(&self, range: Range<usize>) -> FeatureFrame {
        let range = range.start.min(self.len())..range.end.min(self.len());
        let mut out = FeatureFrame::new(self.dates[range.clone()].to_vec());
        out.names = self.names.clone();
        out.columns = self
            .columns
            .iter()
            .map(|c| c[range.clone()].to_vec())
            .collect();
        out.rebuild_index();
        out
    }

    /// Drop undefined margin rows and rows outside `bounds`.
    pub fn truncate(&self, bounds: &DateBounds) -> FeatureFrame {
        let defined_end = self.len().saturating_sub(self.lead);
        let keep: Vec<usize> = (self.warmup.min(defined_end)..defined_end)
            .filter(|&i| bounds.contains(self.dates[i]))
            .collect();

        let mut out = FeatureFrame::new(keep.iter().map(|&i| self.dates[i]).collect());
        out.names = self.names.clone();
        out.columns = self
            .columns
            .iter()
            .map(|c| keep.iter().map(|&i| c[i]).collect())
            .collect();
        out.rebuild_index();
        out
    }

    /// Values of one row in column order.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[i]).collect()
    }

    /// Write the frame as CSV. Undefined values are written as empty cells.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.to_writer(File::create(path)?)?;
        tracing::info!(
            path = %path.display(),
            rows = self.len(),
            columns = self.num_columns(),
            "wrote feature CSV"
        );
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = Vec::with_capacity(self.names.len() + 1);
        header.push(DATE_COLUMN.to_string());
        header.extend(self.names.iter().cloned());
        wtr.write_record(&header)?;

        for i in 0..self.len() {
            let mut record = Vec::with_capacity(header.len());
            record.push(self.dates[i].format("%Y-%m-%d").to_string());
            for column in &self.columns {
                let v = column[i];
                record.push(if v.is_finite() { v.to_string() } else { String::new() });
            }
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Read a feature CSV written by [`write_csv`](Self::write_csv).
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<FeatureFrame> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::MissingInput(path.to_path_buf()));
        }
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<FeatureFrame> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.get(0) != Some(DATE_COLUMN) {
            return Err(PipelineError::MissingColumn(DATE_COLUMN.to_string()));
        }
        let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut dates = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            dates.push(parse_date(&record[0])?);
            for (col, raw) in columns.iter_mut().zip(record.iter().skip(1)) {
                let value = if raw.is_empty() {
                    f64::NAN
                } else {
                    raw.parse::<f64>().map_err(|e| {
                        PipelineError::Validation(format!(
                            "row {}: cannot parse '{}': {}",
                            line + 2,
                            raw,
                            e
                        ))
                    })?
                };
                col.push(value);
            }
        }

        let mut frame = FeatureFrame::new(dates);
        frame.names = names;
        frame.columns = columns;
        frame.rebuild_index();
        Ok(frame)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
    }
}
