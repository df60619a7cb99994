use serde::de::Error as SerdeError;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MappingError(String);

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl StdError for MappingError {}

/// The header row of a sheet: the header names in column order plus a reverse lookup from header
/// name to its 0-based column index.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Mapping {
    headers: Vec<Header>,
    header_map: HashMap<Header, usize>,
}

impl Mapping {
    /// Create a new `Mapping` from a list of header strings. Trailing blank headers are dropped
    /// since the sheet reports them when a column has been formatted but never named.
    pub fn new<S, I>(headers: I) -> Result<Self, MappingError>
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let mut headers: Vec<Header> = headers
            .into_iter()
            .map(|s| Header::from(s.into().trim().to_string()))
            .collect();
        while headers.last().is_some_and(|h| h.as_ref().is_empty()) {
            headers.pop();
        }

        if headers.len() > crate::model::MAX_COLUMNS {
            return Err(MappingError(format!(
                "A sheet may have at most {} columns, found {}",
                crate::model::MAX_COLUMNS,
                headers.len()
            )));
        }

        let header_map: HashMap<Header, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, key)| (key.to_owned(), idx))
            .collect();

        if header_map.len() != headers.len() {
            return Err(MappingError(String::from("Encountered a duplicate header")));
        }

        Ok(Self {
            headers,
            header_map,
        })
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// The headers as owned strings, in column order.
    pub fn header_strings(&self) -> Vec<String> {
        self.headers.iter().map(|h| h.as_ref().to_string()).collect()
    }

    pub fn header_index(&self, header: impl Into<Header>) -> Option<usize> {
        let h = header.into();
        self.header_map.get(&h).cloned()
    }
}

impl Serialize for Mapping {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.headers.len()))?;
        for header in &self.headers {
            seq.serialize_element(header.as_ref())?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Mapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items: Vec<String> = Vec::deserialize(deserializer)?;
        let mapping = Mapping::new(items).map_err(D::Error::custom)?;
        Ok(mapping)
    }
}

/// Represents a header in the Google sheet, for example, `How Much?`
#[derive(Default, Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header(String);

impl AsRef<str> for Header {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl<S: Into<String>> From<S> for Header {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl FromStr for Header {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::transaction::AMOUNT_STR;

    #[test]
    fn test_mapping_index() {
        let mapping = Mapping::new(["Date", AMOUNT_STR, "Category"]).unwrap();
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.header_index(AMOUNT_STR), Some(1));
        assert_eq!(mapping.header_index("Nope"), None);
    }

    #[test]
    fn test_mapping_duplicate_header() {
        assert!(Mapping::new(["Date", "Date"]).is_err());
    }

    #[test]
    fn test_mapping_drops_trailing_blank_headers() {
        let mapping = Mapping::new(["Month", "Category", "Expected", "", " "]).unwrap();
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn test_mapping_too_wide() {
        let headers: Vec<String> = (0..27).map(|i| format!("h{i}")).collect();
        assert!(Mapping::new(headers).is_err());
    }

    #[test]
    fn test_mapping_serde() {
        let original_json = r##"["Date","How Much?","who recorded"]"##;
        let mapping: Mapping = serde_json::from_str(original_json).unwrap();
        let serialized = serde_json::to_string(&mapping).unwrap();
        assert_eq!(original_json, serialized);
        assert_eq!(mapping.header_index("who recorded"), Some(2));
    }
}
