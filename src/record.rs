//! Row values and ordinal row pairs

use serde::{Deserialize, Serialize};

/// One cell rendered to text. `None` is SQL NULL.
pub type Value = Option<String>;

/// A single row, in column order.
pub type Record = Vec<Value>;

/// Column information shared by all rows of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Rows at the same ordinal position of two compared streams.
///
/// Either side is `None` once that stream has run out of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordPair {
    pub index: usize,
    pub left: Option<Record>,
    pub right: Option<Record>,
}

impl RecordPair {
    pub fn new(index: usize, left: Option<Record>, right: Option<Record>) -> Self {
        Self { index, left, right }
    }

    /// Whether both sides hold the same row.
    pub fn equal(&self) -> bool {
        self.left == self.right
    }
}
