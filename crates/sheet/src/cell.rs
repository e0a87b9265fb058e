use serde::{Deserialize, Serialize};
use std::fmt;

/// One workbook cell.
///
/// Serializes untagged, so a record renders as plain JSON
/// (`{"id": 1, "name": "Aurora", "flag": null}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl CellValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Empty cell or whitespace-only text. Zero and `false` are not blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(s) => s.trim().is_empty(),
            Self::Bool(_) | Self::Int(_) | Self::Float(_) => false,
        }
    }

    /// Integer view. Floats truncate; text must parse as an integer.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() => Some(*f as i64),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::String(s) => s.trim().parse().ok(),
            Self::Float(_) | Self::Null => None,
        }
    }

    /// Numeric view; text is parsed leniently around whitespace.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Bool(b) => Some(f64::from(u8::from(*b))),
            Self::String(s) => s.trim().parse().ok(),
            Self::Null => None,
        }
    }

    /// Text view; an empty cell is the empty string.
    #[must_use]
    pub fn as_str(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for CellValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(CellValue::Int(42).as_float(), Some(42.0));
        assert_eq!(CellValue::Float(3.0).as_int(), Some(3));
        assert_eq!(CellValue::Float(f64::NAN).as_int(), None);
        assert_eq!(CellValue::Bool(true).as_int(), Some(1));
        assert_eq!(CellValue::from(" 42 ").as_int(), Some(42));
        assert_eq!(CellValue::from("100.5").as_float(), Some(100.5));
        assert_eq!(CellValue::Null.as_float(), None);
    }

    #[test]
    fn test_text_view() {
        assert_eq!(CellValue::Null.as_str(), "");
        assert_eq!(CellValue::Float(111.11).as_str(), "111.11");
        assert_eq!(CellValue::from("PO-1").as_str(), "PO-1");
    }

    #[test]
    fn test_blank() {
        assert!(CellValue::Null.is_blank());
        assert!(CellValue::from("  ").is_blank());
        assert!(!CellValue::Int(0).is_blank());
        assert!(!CellValue::Bool(false).is_blank());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(CellValue::from(None::<&str>), CellValue::Null);
        assert_eq!(CellValue::from(Some(7_i64)), CellValue::Int(7));
    }

    #[test]
    fn test_serialize_untagged() {
        let json = serde_json::to_string(&vec![
            CellValue::Int(1),
            CellValue::String("x".to_string()),
            CellValue::Null,
        ])
        .unwrap();
        assert_eq!(json, r#"[1,"x",null]"#);
    }
}
