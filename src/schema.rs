//! Storage types and column type inference.
//!
//! Inference only runs when a destination table is first created. Columns
//! added to an existing table are always [`StorageType::Text`]; re-inferring
//! on growth could narrow or widen a column that already holds typed data.

use std::fmt;

use crate::data::{Row, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Text,
}

/// Type given to every column added to an existing table.
pub const ADDITIVE_COLUMN_TYPE: StorageType = StorageType::Text;

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Integer => "integer",
            StorageType::Float => "float",
            StorageType::Boolean => "boolean",
            StorageType::Timestamp => "timestamp",
            StorageType::Text => "text",
        }
    }

    /// Column declaration accepted by a `STRICT` SQLite table.
    pub fn sql_type(&self) -> &'static str {
        match self {
            StorageType::Integer | StorageType::Boolean => "INTEGER",
            StorageType::Float => "REAL",
            StorageType::Timestamp | StorageType::Text => "TEXT",
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    observed: bool,
    possible_integer: bool,
    possible_float: bool,
    possible_boolean: bool,
    possible_timestamp: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            observed: false,
            possible_integer: true,
            possible_float: true,
            possible_boolean: true,
            possible_timestamp: true,
        }
    }

    fn observe(&mut self, value: &Value) {
        self.observed = true;
        match value {
            Value::Integer(_) => {
                self.possible_boolean = false;
                self.possible_timestamp = false;
            }
            Value::Float(_) => {
                self.possible_integer = false;
                self.possible_boolean = false;
                self.possible_timestamp = false;
            }
            Value::Boolean(_) => {
                self.possible_integer = false;
                self.possible_float = false;
                self.possible_timestamp = false;
            }
            Value::DateTime(_) => {
                self.possible_integer = false;
                self.possible_float = false;
                self.possible_boolean = false;
            }
            Value::String(_) => {
                self.possible_integer = false;
                self.possible_float = false;
                self.possible_boolean = false;
                self.possible_timestamp = false;
            }
        }
    }

    fn decide(&self) -> StorageType {
        if !self.observed {
            StorageType::Text
        } else if self.possible_boolean {
            StorageType::Boolean
        } else if self.possible_integer {
            StorageType::Integer
        } else if self.possible_float {
            StorageType::Float
        } else if self.possible_timestamp {
            StorageType::Timestamp
        } else {
            StorageType::Text
        }
    }
}

/// Infers one storage type per column position. Missing values are ignored;
/// a column with no observed value falls back to text.
pub fn infer_column_types(column_count: usize, rows: &[Row]) -> Vec<StorageType> {
    let mut candidates = vec![TypeCandidate::new(); column_count];
    for row in rows {
        for (candidate, cell) in candidates.iter_mut().zip(row.iter()) {
            if let Some(value) = cell {
                candidate.observe(value);
            }
        }
    }
    candidates.iter().map(TypeCandidate::decide).collect()
}
