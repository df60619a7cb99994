use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The number of columns that can be addressed, `A` through `Z`.
pub const MAX_COLUMNS: usize = 26;

/// The first row that holds data. Row 1 is the header.
pub const FIRST_DATA_ROW: usize = 2;

/// Returns the column letter for a 1-based column number, e.g. `1` -> `A`, `6` -> `F`.
pub fn column_letter(column: usize) -> crate::error::Res<char> {
    if column == 0 || column > MAX_COLUMNS {
        bail!("Column {column} cannot be addressed, only columns 1 through {MAX_COLUMNS} are supported");
    }
    Ok((b'A' + (column - 1) as u8) as char)
}

/// An A1-style block of whole rows: `A{first}:{last_column}{last}`.
///
/// Rows are 1-based, as in the sheet. A single row `n` of a six column table is `A{n}:F{n}`.
/// Serializes to its A1 string for JSON compatibility.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RowRange {
    first: usize,
    last: usize,
    columns: usize,
}

impl RowRange {
    /// The range covering row `row` across `columns` columns.
    pub fn row(row: usize, columns: usize) -> crate::error::Res<Self> {
        Self::rows(row, row, columns)
    }

    /// The range covering rows `first..=last` across `columns` columns.
    pub fn rows(first: usize, last: usize, columns: usize) -> crate::error::Res<Self> {
        if first == 0 {
            bail!("Rows are numbered from 1");
        }
        if last < first {
            bail!("The last row ({last}) comes before the first row ({first})");
        }
        let _ = column_letter(columns)?;
        Ok(Self {
            first,
            last,
            columns,
        })
    }

    pub fn first(&self) -> usize {
        self.first
    }

    pub fn last(&self) -> usize {
        self.last
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// The range prefixed with a sheet name, e.g. `Budgets!A1:C10`.
    pub fn in_sheet(&self, sheet_name: &str) -> String {
        format!("{sheet_name}!{self}")
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The column count is validated on construction.
        let last_column = (b'A' + (self.columns - 1) as u8) as char;
        write!(f, "A{}:{}{}", self.first, last_column, self.last)
    }
}

impl FromStr for RowRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Expected format: "A2:F2"
        let s = s.trim();
        let (start, end) = s
            .split_once(':')
            .with_context(|| format!("A row range must look like 'A2:F2', got: {s}"))?;

        let first = start
            .strip_prefix('A')
            .with_context(|| format!("A row range must start at column A, got: {s}"))?
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid first row in '{s}': {e}"))?;

        let mut end_chars = end.chars();
        let column = end_chars
            .next()
            .filter(|c| c.is_ascii_uppercase())
            .with_context(|| format!("Missing end column in '{s}'"))?;
        let last = end_chars
            .as_str()
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid last row in '{s}': {e}"))?;

        let columns = (column as u8 - b'A') as usize + 1;
        RowRange::rows(first, last, columns)
    }
}

impl Serialize for RowRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RowRange {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RowRange::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1).unwrap(), 'A');
        assert_eq!(column_letter(6).unwrap(), 'F');
        assert_eq!(column_letter(26).unwrap(), 'Z');
        assert!(column_letter(0).is_err());
        assert!(column_letter(27).is_err());
    }

    #[test]
    fn test_row_range_display() {
        assert_eq!(RowRange::row(5, 6).unwrap().to_string(), "A5:F5");
        assert_eq!(RowRange::rows(1, 40, 3).unwrap().to_string(), "A1:C40");
        assert_eq!(
            RowRange::row(2, 3).unwrap().in_sheet("Budgets"),
            "Budgets!A2:C2"
        );
    }

    #[test]
    fn test_row_range_invalid() {
        assert!(RowRange::row(0, 3).is_err());
        assert!(RowRange::rows(5, 4, 3).is_err());
        assert!(RowRange::row(2, 27).is_err());
    }

    #[test]
    fn test_row_range_from_str() {
        let r: RowRange = "A12:F12".parse().unwrap();
        assert_eq!(r, RowRange::row(12, 6).unwrap());

        // Test with extra whitespace
        let r: RowRange = " A1:C9 ".parse().unwrap();
        assert_eq!(r, RowRange::rows(1, 9, 3).unwrap());
    }

    #[test]
    fn test_row_range_from_str_invalid() {
        assert!("A2F2".parse::<RowRange>().is_err()); // Missing colon
        assert!("B2:F2".parse::<RowRange>().is_err()); // Does not start at A
        assert!("A2:2".parse::<RowRange>().is_err()); // Missing column
        assert!("A3:F2".parse::<RowRange>().is_err()); // Backwards
    }

    #[test]
    fn test_row_range_serde() {
        let r = RowRange::row(7, 6).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#""A7:F7""#);
        let back: RowRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
