use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_xlsxwriter::{Workbook, XlsxError};
use tracing::{debug, error};

use shared_models::error::AppError;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Rows read for a single export request.
pub const MAX_EXPORT_ROWS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Cell::Number(f64::from(value))
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Text(value.format("%Y-%m-%d").to_string())
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::Text(value.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// A single unstyled worksheet: one header row followed by data rows.
#[derive(Debug, Clone)]
pub struct Sheet {
    name: &'static str,
    headers: &'static [&'static str],
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: &'static str, headers: &'static [&'static str]) -> Self {
        Self {
            name,
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.headers.len());
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[&'static str] {
        self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn to_xlsx(&self) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(self.name)?;

        for (col, header) in (0u16..).zip(self.headers) {
            worksheet.write_string(0, col, *header)?;
        }

        for (row, cells) in (1u32..).zip(&self.rows) {
            for (col, cell) in (0u16..).zip(cells) {
                match cell {
                    Cell::Text(text) => {
                        worksheet.write_string(row, col, text.as_str())?;
                    }
                    Cell::Number(number) => {
                        worksheet.write_number(row, col, *number)?;
                    }
                    Cell::Empty => {}
                }
            }
        }

        workbook.save_to_buffer()
    }

    /// Renders the workbook as a download named `{file_stem}-{YYYYMMDD}.xlsx`.
    pub fn into_download(self, file_stem: &str, date: NaiveDate) -> Result<Response, AppError> {
        let bytes = self.to_xlsx().map_err(|e| {
            error!("Failed to render {} export: {}", file_stem, e);
            AppError::Internal(format!("Failed to render export: {}", e))
        })?;

        let filename = format!("{}-{}.xlsx", file_stem, date.format("%Y%m%d"));
        debug!("Exporting {} rows as {} ({} bytes)", self.rows.len(), filename, bytes.len());

        let headers = [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ];

        Ok((headers, bytes).into_response())
    }
}
