//! CSV reading for vendor price files.

use super::record::{PriceRecord, PriceSeries};
use crate::error::{parse_date, PipelineError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of columns in the vendor layout, including the date.
const VENDOR_COLUMNS: usize = 13;

/// Read a vendor price CSV from disk.
pub fn read_price_csv<P: AsRef<Path>>(path: P) -> Result<PriceSeries> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::MissingInput(path.to_path_buf()));
    }
    let series = read_prices(File::open(path)?)?;
    tracing::debug!(path = %path.display(), rows = series.len(), "read price file");
    Ok(series)
}

/// Read vendor price rows from any reader.
///
/// Empty numeric cells are read as NaN so that the validation step reports
/// them instead of the reader silently inventing a value.
pub fn read_prices<R: Read>(reader: R) -> Result<PriceSeries> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line, row) in csv_reader.records().enumerate() {
        let row = row?;
        if row.len() < VENDOR_COLUMNS {
            return Err(PipelineError::Validation(format!(
                "row {} has {} columns, expected {}",
                line + 2,
                row.len(),
                VENDOR_COLUMNS
            )));
        }

        let mut values = [0.0f64; VENDOR_COLUMNS - 1];
        for (slot, raw) in values.iter_mut().zip(row.iter().skip(1)) {
            *slot = parse_cell(raw, line + 2)?;
        }

        records.push(PriceRecord {
            date: parse_date(&row[0])?,
            open: values[0],
            high: values[1],
            low: values[2],
            close: values[3],
            volume: values[4],
            ex_dividend: values[5],
            split_ratio: values[6],
            adj_open: values[7],
            adj_high: values[8],
            adj_low: values[9],
            adj_close: values[10],
            adj_volume: values[11],
        });
    }

    Ok(PriceSeries::new(records))
}

fn parse_cell(raw: &str, line: usize) -> Result<f64> {
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|e| {
        PipelineError::Validation(format!("row {line}: cannot parse '{raw}' as number: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::PriceField;

    const SAMPLE: &str = "\
Date,Open,High,Low,Close,Volume,Ex-Dividend,Split Ratio,Adj. Open,Adj. High,Adj. Low,Adj. Close,Adj. Volume
2017-01-04,10.5,11.0,10.0,10.8,1000,0.0,1.0,10.5,11.0,10.0,10.8,1000
2017-01-03,10.0,10.6,9.9,10.4,1200,0.0,1.0,10.0,10.6,9.9,10.4,1200
";

    #[test]
    fn test_read_sorts_newest_first_files() {
        let series = read_prices(SAMPLE.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.records()[0].date.to_string(), "2017-01-03");
        assert_eq!(series.column(PriceField::Close), vec![10.4, 10.8]);
    }

    #[test]
    fn test_empty_cell_reads_as_nan() {
        let data = "\
Date,Open,High,Low,Close,Volume,Ex-Dividend,Split Ratio,Adj_Open,Adj_High,Adj_Low,Adj_Close,Adj_Volume
2017-01-03,10.0,10.6,9.9,10.4,,0.0,1.0,10.0,10.6,9.9,10.4,
";
        let series = read_prices(data.as_bytes()).unwrap();
        assert!(series.records()[0].volume.is_nan());
    }

    #[test]
    fn test_short_row_rejected() {
        let data = "Date,Open,High\n2017-01-03,1.0,2.0\n";
        assert!(matches!(
            read_prices(data.as_bytes()),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_price_csv("/no/such/company.csv"),
            Err(PipelineError::MissingInput(_))
        ));
    }
}
