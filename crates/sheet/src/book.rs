use crate::error::{Result, SheetError};
use crate::sheet::Sheet;
use indexmap::IndexMap;

/// A book containing multiple sheets (preserves insertion order)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Book {
    sheets: IndexMap<String, Sheet>,
}

impl Book {
    /// Create a new empty book
    #[must_use]
    pub fn new() -> Self {
        Book {
            sheets: IndexMap::new(),
        }
    }

    /// Get the number of sheets
    #[must_use]
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Check if the book is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Get all sheet names in order
    #[must_use]
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.keys().map(String::as_str).collect()
    }

    /// Check if a sheet exists
    #[must_use]
    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.contains_key(name)
    }

    /// Get a sheet by name
    pub fn get_sheet(&self, name: &str) -> Result<&Sheet> {
        self.sheets
            .get(name)
            .ok_or_else(|| SheetError::SheetNotFound {
                name: name.to_string(),
            })
    }

    /// Get a mutable sheet by name
    pub fn get_sheet_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        self.sheets
            .get_mut(name)
            .ok_or_else(|| SheetError::SheetNotFound {
                name: name.to_string(),
            })
    }

    /// Add a sheet to the end of the book
    pub fn add_sheet(&mut self, name: &str, sheet: Sheet) -> Result<()> {
        if self.sheets.contains_key(name) {
            return Err(SheetError::SheetAlreadyExists {
                name: name.to_string(),
            });
        }

        let mut sheet = sheet;
        sheet.set_name(name);
        self.sheets.insert(name.to_string(), sheet);
        Ok(())
    }

    /// Iterate over `(name, sheet)` pairs in order
    pub fn sheets(&self) -> impl Iterator<Item = (&String, &Sheet)> {
        self.sheets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get_sheet() {
        let mut book = Book::new();
        book.add_sheet("users", Sheet::with_columns("x", &["id"]))
            .unwrap();

        assert_eq!(book.sheet_count(), 1);
        // The book name wins over whatever the sheet was called
        assert_eq!(book.get_sheet("users").unwrap().name(), "users");
        assert!(matches!(
            book.get_sheet("missing"),
            Err(SheetError::SheetNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_sheet_rejected() {
        let mut book = Book::new();
        book.add_sheet("a", Sheet::new()).unwrap();
        assert!(matches!(
            book.add_sheet("a", Sheet::new()),
            Err(SheetError::SheetAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_order_preserved() {
        let mut book = Book::new();
        book.add_sheet("b", Sheet::new()).unwrap();
        book.add_sheet("a", Sheet::new()).unwrap();
        book.add_sheet("c", Sheet::new()).unwrap();
        assert_eq!(book.sheet_names(), vec!["b", "a", "c"]);
    }
}
