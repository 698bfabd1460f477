//! Uploaded tabular data.
//!
//! Cells are kept as the exact text from the upload so that writing the
//! table back out reproduces it value for value.

use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV has no header row")]
    MissingHeader,
    #[error("row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("CSV output is not UTF-8: {0}")]
    Encoding(String),
}

/// Inferred kind of a column, used for prompts and aggregate typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RowWidth {
                    row: i + 1,
                    found: row.len(),
                    expected: columns.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Parse CSV with a header row, keeping column names as written.
    ///
    /// Rows shorter than the header are padded with empty cells; longer rows
    /// are rejected.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() {
            return Err(TableError::MissingHeader);
        }
        let mut rows = Vec::new();
        for record in reader.records() {
            let mut row: Vec<String> = record?.iter().map(str::to_string).collect();
            if row.len() < columns.len() {
                row.resize(columns.len(), String::new());
            }
            rows.push(row);
        }
        Self::new(columns, rows)
    }

    /// Parse an uploaded file and clean its column names.
    pub fn from_upload(bytes: &[u8]) -> Result<Self, TableError> {
        let mut table = Self::from_csv(bytes)?;
        table.clean_columns();
        Ok(table)
    }

    pub fn to_csv(&self) -> Result<String, TableError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| TableError::Encoding(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| TableError::Encoding(e.to_string()))
    }

    pub fn clean_columns(&mut self) {
        for column in &mut self.columns {
            *column = clean_column_name(column);
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn head(&self, n: usize) -> &[Vec<String>] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[index].as_str())
    }

    pub fn column_kind(&self, index: usize) -> ColumnKind {
        let mut kind = ColumnKind::Empty;
        for cell in self.column_values(index).map(str::trim).filter(|c| !c.is_empty()) {
            let cell_kind = if cell.parse::<i64>().is_ok() {
                ColumnKind::Integer
            } else if cell.parse::<f64>().is_ok_and(f64::is_finite) {
                ColumnKind::Float
            } else {
                return ColumnKind::Text;
            };
            kind = match (kind, cell_kind) {
                (ColumnKind::Empty, k) => k,
                (ColumnKind::Float, _) | (_, ColumnKind::Float) => ColumnKind::Float,
                (k, _) => k,
            };
        }
        kind
    }

}

/// Remove `( ) " '`, trim, and join whitespace-separated parts with `_`.
pub fn clean_column_name(name: &str) -> String {
    let stripped: String = name
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '"' | '\''))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Short identifier for an uploaded file, derived from its name and size.
///
/// Two different files with the same name and byte length collide.
pub fn fingerprint(name: &str, byte_len: usize) -> String {
    let digest = Sha256::digest(format!("{}{}", name, byte_len).as_bytes());
    let hex = format!("{:x}", digest);
    hex[..8].to_string()
}
