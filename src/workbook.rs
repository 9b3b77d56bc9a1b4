//! Spreadsheet input.
//!
//! A workbook is read whole into memory as an ordered list of sheets, each a
//! header row plus typed data rows. Readers are selected by file extension:
//! Excel and OpenDocument files go through `calamine`, `.csv`/`.tsv` files are
//! read as a single sheet named after the file stem.

use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;

use crate::{
    data::{Row, Value, parse_naive_datetime, parse_text_cell},
    io_utils,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

pub trait WorkbookReader {
    fn read(&self, path: &Path) -> Result<Workbook>;
}

const CALAMINE_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv"];

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Dispatches to the reader that understands the file's extension.
#[derive(Debug, Clone)]
pub struct SpreadsheetReader {
    excel: ExcelReader,
    delimited: DelimitedReader,
}

impl SpreadsheetReader {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            excel: ExcelReader,
            delimited: DelimitedReader::new(encoding),
        }
    }
}

impl Default for SpreadsheetReader {
    fn default() -> Self {
        Self::new(encoding_rs::UTF_8)
    }
}

impl WorkbookReader for SpreadsheetReader {
    fn read(&self, path: &Path) -> Result<Workbook> {
        let ext = extension_of(path);
        if CALAMINE_EXTENSIONS.contains(&ext.as_str()) {
            self.excel.read(path)
        } else if DELIMITED_EXTENSIONS.contains(&ext.as_str()) {
            self.delimited.read(path)
        } else {
            bail!("Unsupported spreadsheet extension '{ext}' for {path:?}")
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExcelReader;

impl WorkbookReader for ExcelReader {
    fn read(&self, path: &Path) -> Result<Workbook> {
        let mut workbook =
            open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&name)
                .with_context(|| format!("Reading sheet '{name}' of {path:?}"))?;
            let mut rows = range.rows();
            let columns = match rows.next() {
                Some(header) => header
                    .iter()
                    .enumerate()
                    .map(|(idx, cell)| header_name(cell, idx))
                    .collect::<Vec<_>>(),
                None => Vec::new(),
            };
            let data = rows
                .map(|cells| {
                    let mut row = cells.iter().map(cell_value).collect::<Row>();
                    row.resize(columns.len(), None);
                    row
                })
                .filter(|row| row.iter().any(Option::is_some))
                .collect();
            sheets.push(Sheet {
                name,
                columns,
                rows: data,
            });
        }
        Ok(Workbook { sheets })
    }
}

fn header_name(cell: &Data, idx: usize) -> String {
    match cell {
        Data::Empty => format!("Unnamed_{idx}"),
        Data::String(s) if s.trim().is_empty() => format!("Unnamed_{idx}"),
        Data::String(s) => s.clone(),
        Data::Float(f) => Value::from_number(*f).as_display(),
        other => other.to_string(),
    }
}

/// Maps one cell to a typed value; blanks and error cells are missing values.
pub fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.trim().is_empty() => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) => Some(Value::from_number(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) if dt.is_duration() => Some(Value::from_number(dt.as_f64())),
        Data::DateTime(dt) => Some(
            dt.as_datetime()
                .map(Value::DateTime)
                .unwrap_or_else(|| Value::from_number(dt.as_f64())),
        ),
        Data::DateTimeIso(s) => Some(
            parse_naive_datetime(s)
                .map(Value::DateTime)
                .unwrap_or_else(|_| Value::String(s.clone())),
        ),
        Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

#[derive(Debug, Clone)]
pub struct DelimitedReader {
    encoding: &'static Encoding,
}

impl DelimitedReader {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self { encoding }
    }
}

impl WorkbookReader for DelimitedReader {
    fn read(&self, path: &Path) -> Result<Workbook> {
        let mut reader =
            io_utils::open_csv_reader_from_path(path, io_utils::input_delimiter(path))?;
        let columns = io_utils::reader_headers(&mut reader, self.encoding)?
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                if name.trim().is_empty() {
                    format!("Unnamed_{idx}")
                } else {
                    name
                }
            })
            .collect::<Vec<_>>();
        let mut rows = Vec::new();
        for (row_idx, record) in reader.byte_records().enumerate() {
            let record =
                record.with_context(|| format!("Reading row {} in {:?}", row_idx + 2, path))?;
            let decoded = io_utils::decode_record(&record, self.encoding)
                .with_context(|| format!("Decoding row {} in {:?}", row_idx + 2, path))?;
            let row = decoded
                .iter()
                .map(|field| parse_text_cell(field))
                .collect::<Row>();
            if row.iter().any(Option::is_some) {
                rows.push(row);
            }
        }
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Sheet1".to_string());
        Ok(Workbook {
            sheets: vec![Sheet {
                name,
                columns,
                rows,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn cell_value_maps_blanks_and_numbers() {
        assert_eq!(cell_value(&Data::Empty), None);
        assert_eq!(cell_value(&Data::String("  ".into())), None);
        assert_eq!(cell_value(&Data::Float(12.0)), Some(Value::Integer(12)));
        assert_eq!(cell_value(&Data::Float(1.5)), Some(Value::Float(1.5)));
        assert_eq!(cell_value(&Data::Bool(true)), Some(Value::Boolean(true)));
        assert!(matches!(
            cell_value(&Data::DateTimeIso("2024-02-03T04:05:06".into())),
            Some(Value::DateTime(_))
        ));
    }

    #[test]
    fn header_name_fills_blank_headers() {
        assert_eq!(header_name(&Data::Empty, 3), "Unnamed_3");
        assert_eq!(header_name(&Data::Float(2024.0), 0), "2024");
        assert_eq!(header_name(&Data::String("Owner Name".into()), 0), "Owner Name");
    }

    #[test]
    fn delimited_files_become_single_sheet_workbooks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Parcels June.csv");
        fs::write(&path, "Parcel ID,Owner,\n1,Ann,\n,,\n2,,x\n").unwrap();

        let workbook = SpreadsheetReader::default().read(&path).unwrap();
        assert_eq!(workbook.sheets.len(), 1);
        let sheet = &workbook.sheets[0];
        assert_eq!(sheet.name, "Parcels June");
        assert_eq!(sheet.columns, vec!["Parcel ID", "Owner", "Unnamed_2"]);
        assert_eq!(
            sheet.rows,
            vec![
                vec![Some(Value::Integer(1)), Some(Value::String("Ann".into())), None],
                vec![Some(Value::Integer(2)), None, Some(Value::String("x".into()))],
            ]
        );
    }

    #[test]
    fn unreadable_workbooks_surface_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        fs::write(&path, b"not a zip archive").unwrap();
        assert!(SpreadsheetReader::default().read(&path).is_err());

        let other = dir.path().join("notes.txt");
        fs::write(&other, "hello").unwrap();
        assert!(SpreadsheetReader::default().read(&other).is_err());
    }
}
