//! Spreadsheet reader.
//!
//! Parses workbook bytes (xlsx, xlsm, xlsb, xls, ods) into named sheets.
//! Each [`Sheet`] exposes two views of the same cells:
//!
//! - header-keyed [`Row`] records, where the first row holds column names
//! - the raw grid at absolute coordinates, read with [`Sheet::block`] and an
//!   A1-style [`CellRange`] such as `B2:C7`

use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Range, Reader};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use tracing::debug;

/// Output format for date-time cells.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Error type for workbook reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkbookError {
    /// Bytes are not a parseable spreadsheet container.
    #[error("not a readable spreadsheet: {0}")]
    Format(String),
    /// A required sheet is absent.
    #[error("missing sheet `{0}`")]
    MissingSheet(String),
    /// A cell range is not valid A1 notation.
    #[error("invalid cell range `{0}`")]
    InvalidRange(String),
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Blank,
    Bool(bool),
    Number(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Blank)
    }

    /// Returns the numeric value, parsing numeric text.
    ///
    /// ```
    /// use fleet_routing_uploads::workbook::CellValue;
    ///
    /// assert_eq!(CellValue::Number(19.43).as_f64(), Some(19.43));
    /// assert_eq!(CellValue::Text(" -99.1 ".into()).as_f64(), Some(-99.1));
    /// assert_eq!(CellValue::Text("north".into()).as_f64(), None);
    /// ```
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as an integer when it is integral.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|n| n.is_finite() && n.fract() == 0.0)
            .map(|n| n as i64)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    /// Renders the cell the way a spreadsheet user reads it: integral numbers
    /// carry no decimal point.
    ///
    /// ```
    /// use fleet_routing_uploads::workbook::CellValue;
    ///
    /// assert_eq!(CellValue::Number(1500.0).to_string(), "1500");
    /// assert_eq!(CellValue::Number(2.5).to_string(), "2.5");
    /// assert_eq!(CellValue::Blank.to_string(), "");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Blank => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Blank
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// A row record keyed by column name. Blank cells are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: HashMap<String, CellValue>,
}

impl Row {
    /// Returns the value of a column, `None` when the cell is blank or the
    /// column does not exist.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, CellValue)>>(iter: I) -> Self {
        Self {
            cells: iter
                .into_iter()
                .filter(|(_, value)| !value.is_blank())
                .map(|(k, v)| (k.into(), v))
                .collect(),
        }
    }
}

/// Inclusive rectangular cell range with zero-based `(row, col)` corners.
///
/// # Examples
///
/// ```
/// use fleet_routing_uploads::workbook::CellRange;
///
/// let range: CellRange = "B2:C7".parse().unwrap();
/// assert_eq!(range.start, (1, 1));
/// assert_eq!(range.end, (6, 2));
///
/// let single: CellRange = "AA10".parse().unwrap();
/// assert_eq!(single.start, (9, 26));
/// assert_eq!(single.start, single.end);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct CellRange {
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl CellRange {
    pub fn height(&self) -> u32 {
        self.end.0 - self.start.0 + 1
    }

    pub fn width(&self) -> u32 {
        self.end.1 - self.start.1 + 1
    }
}

impl FromStr for CellRange {
    type Err = WorkbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WorkbookError::InvalidRange(s.to_string());
        let (first, last) = match s.split_once(':') {
            Some((a, b)) => (a, b),
            None => (s, s),
        };
        let start = parse_cell_ref(first).ok_or_else(invalid)?;
        let end = parse_cell_ref(last).ok_or_else(invalid)?;
        if start.0 > end.0 || start.1 > end.1 {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

impl TryFrom<String> for CellRange {
    type Error = WorkbookError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_letters(self.start.1),
            self.start.0 + 1,
            column_letters(self.end.1),
            self.end.0 + 1
        )
    }
}

/// Parses `B2` into zero-based `(row, col)`.
fn parse_cell_ref(s: &str) -> Option<(u32, u32)> {
    let s = s.trim().trim_start_matches('$');
    let split = s.find(|c: char| !c.is_ascii_alphabetic())?;
    let (letters, digits) = s.split_at(split);
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let col = letters
        .chars()
        .map(|c| c.to_ascii_uppercase() as u32 - 'A' as u32 + 1)
        .fold(0u32, |acc, d| acc * 26 + d);
    let row: u32 = digits.trim_start_matches('$').parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

fn column_letters(mut col: u32) -> String {
    let mut letters = Vec::new();
    col += 1;
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A named sheet with header-keyed rows and its absolute cell grid.
#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    rows: Vec<Row>,
    origin: (u32, u32),
    grid: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Creates a sheet whose first grid row sits at cell `A1`.
    pub fn new(name: impl Into<String>, grid: Vec<Vec<CellValue>>) -> Self {
        Self::with_origin(name, (0, 0), grid)
    }

    /// Creates a sheet whose grid starts at the absolute `(row, col)` origin.
    pub fn with_origin(name: impl Into<String>, origin: (u32, u32), grid: Vec<Vec<CellValue>>) -> Self {
        let rows = header_rows(&grid);
        Self {
            name: name.into(),
            rows,
            origin,
            grid,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute `(row, col)` of the first grid cell.
    pub fn origin(&self) -> (u32, u32) {
        self.origin
    }

    /// Raw cells, header row included.
    pub fn grid(&self) -> &[Vec<CellValue>] {
        &self.grid
    }

    /// Whether the header row names `column`.
    pub fn has_column(&self, column: &str) -> bool {
        self.grid
            .first()
            .is_some_and(|header| header.iter().any(|cell| cell.to_string().trim() == column))
    }

    /// Row records below the header row, fully blank rows skipped.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the cell at absolute zero-based `(row, col)`.
    pub fn cell(&self, row: u32, col: u32) -> &CellValue {
        static BLANK: CellValue = CellValue::Blank;
        if row < self.origin.0 || col < self.origin.1 {
            return &BLANK;
        }
        self.grid
            .get((row - self.origin.0) as usize)
            .and_then(|r| r.get((col - self.origin.1) as usize))
            .unwrap_or(&BLANK)
    }

    /// Reads a fixed block by absolute coordinates, skipping fully blank rows.
    pub fn block(&self, range: &CellRange) -> Vec<Vec<CellValue>> {
        (range.start.0..=range.end.0)
            .map(|row| {
                (range.start.1..=range.end.1)
                    .map(|col| self.cell(row, col).clone())
                    .collect::<Vec<_>>()
            })
            .filter(|cells| cells.iter().any(|c| !c.is_blank()))
            .collect()
    }
}

/// Builds row records from a grid whose first row holds the column names.
///
/// Blank header cells produce no column; repeated names get `_1`, `_2`, ...
fn header_rows(grid: &[Vec<CellValue>]) -> Vec<Row> {
    let Some((header, body)) = grid.split_first() else {
        return Vec::new();
    };

    let mut seen: HashMap<String, usize> = HashMap::new();
    let columns: Vec<Option<String>> = header
        .iter()
        .map(|cell| {
            let name = cell.to_string().trim().to_string();
            if name.is_empty() {
                return None;
            }
            let count = seen.entry(name.clone()).or_insert(0);
            let unique = if *count == 0 {
                name
            } else {
                format!("{}_{}", name, count)
            };
            *count += 1;
            Some(unique)
        })
        .collect();

    body.iter()
        .map(|cells| {
            columns
                .iter()
                .zip(cells)
                .filter_map(|(column, value)| column.clone().map(|c| (c, value.clone())))
                .collect::<Row>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

/// A parsed workbook: sheets in file order.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Looks up a sheet by exact name.
    pub fn sheet(&self, name: &str) -> Result<&Sheet, WorkbookError> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| WorkbookError::MissingSheet(name.to_string()))
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }
}

/// Parses raw workbook bytes.
pub fn read_workbook(bytes: &[u8]) -> Result<Workbook, WorkbookError> {
    let mut source = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| WorkbookError::Format(e.to_string()))?;

    let mut sheets = Vec::new();
    for name in source.sheet_names() {
        let range = source
            .worksheet_range(&name)
            .map_err(|e| WorkbookError::Format(e.to_string()))?;
        sheets.push(sheet_from_range(name, &range));
    }

    debug!(
        sheets = sheets.len(),
        names = ?sheets.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "Parsed workbook"
    );
    Ok(Workbook::new(sheets))
}

fn sheet_from_range(name: String, range: &Range<Data>) -> Sheet {
    let origin = range.start().unwrap_or((0, 0));
    let grid = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    Sheet::with_origin(name, origin, grid)
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Blank,
        Data::String(s) if s.is_empty() => CellValue::Blank,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => CellValue::Number(dt.as_f64()),
        Data::DateTime(dt) => datetime_cell(dt),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(CellValue::DateTime)
            .unwrap_or_else(|_| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

/// Serial date cell to a date-time, honoring the workbook's 1900 or 1904 system.
fn datetime_cell(dt: &ExcelDateTime) -> CellValue {
    dt.as_datetime()
        .map(CellValue::DateTime)
        .unwrap_or(CellValue::Number(dt.as_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::ExcelDateTimeType;

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    #[test]
    fn test_parse_cell_range() {
        let range: CellRange = "I2:J5".parse().unwrap();
        assert_eq!(range.start, (1, 8));
        assert_eq!(range.end, (4, 9));
        assert_eq!(range.height(), 4);
        assert_eq!(range.width(), 2);
        assert_eq!(range.to_string(), "I2:J5");
    }

    #[test]
    fn test_parse_cell_range_rejects_garbage() {
        assert!("".parse::<CellRange>().is_err());
        assert!("B0:C3".parse::<CellRange>().is_err());
        assert!("C7:B2".parse::<CellRange>().is_err());
        assert!("22".parse::<CellRange>().is_err());
    }

    #[test]
    fn test_header_rows_skip_blank_cells_and_rows() {
        let sheet = Sheet::new(
            "Ubicaciones",
            vec![
                vec![text("id"), text("latitude"), text("longitude")],
                vec![num(0.0), num(19.43), num(-99.13)],
                vec![CellValue::Blank, CellValue::Blank, CellValue::Blank],
                vec![num(1.0), CellValue::Blank, num(-99.2)],
            ],
        );

        assert_eq!(sheet.rows().len(), 2);
        assert_eq!(sheet.rows()[0].get("latitude"), Some(&num(19.43)));
        assert_eq!(sheet.rows()[1].get("latitude"), None);
        assert_eq!(sheet.rows()[1].get("longitude"), Some(&num(-99.2)));
    }

    #[test]
    fn test_duplicate_headers_get_suffix() {
        let sheet = Sheet::new(
            "TimeWindows",
            vec![
                vec![text("start"), text("start"), CellValue::Blank, text("start")],
                vec![num(1.0), num(2.0), num(9.0), num(3.0)],
            ],
        );

        let row = &sheet.rows()[0];
        assert_eq!(row.get("start"), Some(&num(1.0)));
        assert_eq!(row.get("start_1"), Some(&num(2.0)));
        assert_eq!(row.get("start_2"), Some(&num(3.0)));
    }

    #[test]
    fn test_block_uses_absolute_coordinates() {
        // Grid starts at B2, as calamine reports for a sheet with an empty first row/column.
        let sheet = Sheet::with_origin(
            "Ubicaciones",
            (1, 1),
            vec![
                vec![text("latitude"), text("longitude")],
                vec![num(19.1), num(-99.1)],
                vec![num(19.2), num(-99.2)],
            ],
        );

        let block = sheet.block(&"B3:C7".parse().unwrap());
        assert_eq!(block, vec![vec![num(19.1), num(-99.1)], vec![num(19.2), num(-99.2)]]);
        assert_eq!(sheet.cell(0, 0), &CellValue::Blank);
    }

    #[test]
    fn test_missing_sheet() {
        let workbook = Workbook::new(vec![Sheet::new("Modelo", vec![])]);
        assert!(workbook.sheet("Modelo").is_ok());
        let err = workbook.sheet("Unidades").unwrap_err();
        assert!(matches!(err, WorkbookError::MissingSheet(ref name) if name == "Unidades"));
    }

    #[test]
    fn test_read_workbook_rejects_non_spreadsheet() {
        let err = read_workbook(b"{\"model\": {}}").unwrap_err();
        assert!(matches!(err, WorkbookError::Format(_)));
    }

    #[test]
    fn test_read_xlsx() {
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        sheet.set_name("Ubicaciones").unwrap();
        sheet.write_string(0, 0, "id").unwrap();
        sheet.write_string(0, 1, "latitude").unwrap();
        sheet.write_string(0, 2, "longitude").unwrap();
        sheet.write_number(1, 0, 0).unwrap();
        sheet.write_number(1, 1, 19.4326).unwrap();
        sheet.write_number(1, 2, -99.1332).unwrap();
        sheet.write_number(2, 0, 1).unwrap();
        sheet.write_number(2, 1, 19.3).unwrap();
        sheet.write_number(2, 2, -99.2).unwrap();
        let other = book.add_worksheet();
        other.set_name("Modelo").unwrap();
        other.write_string(0, 0, "global_start").unwrap();
        other.write_string(1, 0, "2024-05-06T08:00:00Z").unwrap();
        let bytes = book.save_to_buffer().unwrap();

        let workbook = read_workbook(&bytes).unwrap();
        assert_eq!(workbook.sheet_names().collect::<Vec<_>>(), vec!["Ubicaciones", "Modelo"]);

        let locations = workbook.sheet("Ubicaciones").unwrap();
        assert_eq!(locations.rows().len(), 2);
        assert_eq!(locations.rows()[0].get("latitude").and_then(CellValue::as_f64), Some(19.4326));
        assert_eq!(locations.rows()[1].get("id").and_then(CellValue::as_i64), Some(1));

        let block = locations.block(&"B2:C7".parse().unwrap());
        assert_eq!(block.len(), 2);
        assert_eq!(block[1], vec![num(19.3), num(-99.2)]);

        let model = workbook.sheet("Modelo").unwrap();
        assert_eq!(
            model.rows()[0].get("global_start").and_then(CellValue::as_text),
            Some("2024-05-06T08:00:00Z")
        );
    }

    #[test]
    fn test_datetime_cell_1900_system() {
        let dt = ExcelDateTime::new(45418.3333333333, ExcelDateTimeType::DateTime, false);
        assert_eq!(datetime_cell(&dt).to_string(), "2024-05-06T08:00:00Z");
    }

    #[test]
    fn test_datetime_cell_1904_system() {
        let epoch = ExcelDateTime::new(0.0, ExcelDateTimeType::DateTime, true);
        assert_eq!(datetime_cell(&epoch).to_string(), "1904-01-01T00:00:00Z");

        // Same instant as the 1900-system serial 45418.333..., 1462 days apart.
        let dt = ExcelDateTime::new(43956.3333333333, ExcelDateTimeType::DateTime, true);
        assert_eq!(datetime_cell(&dt).to_string(), "2024-05-06T08:00:00Z");
    }

    #[test]
    fn test_duration_cell_stays_numeric() {
        let dt = ExcelDateTime::new(0.5, ExcelDateTimeType::TimeDelta, false);
        assert_eq!(cell_value(&Data::DateTime(dt)), CellValue::Number(0.5));
    }
}
