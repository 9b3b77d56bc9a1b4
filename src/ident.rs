//! Allow-listed SQL identifiers.
//!
//! Table and column names are embedded into DDL and DML text, so every name
//! passes through [`Identifier::parse`] before it reaches a statement. Data
//! values are always bound as parameters.

use std::{fmt, sync::OnceLock};

use regex::Regex;

use crate::error::IngestError;

static IDENTIFIER_PATTERN: OnceLock<Regex> = OnceLock::new();

fn pattern() -> &'static Regex {
    IDENTIFIER_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles")
    })
}

pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= 128 && pattern().is_match(name)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(kind: &'static str, name: &str) -> Result<Self, IngestError> {
        if is_valid_identifier(name) {
            Ok(Identifier(name.to_string()))
        } else {
            Err(IngestError::InvalidIdentifier {
                kind,
                name: name.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form, safe against reserved words such as `Use`.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_normalized_names() {
        for name in ["A", "Owner_Name", "_tmp", "Unit_No", "Bulk_Insert_DateTime"] {
            assert!(Identifier::parse("column", name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_injection_shapes() {
        for name in ["", "1st", "a b", "x\"; DROP TABLE t; --", "Rate_%", "a.b"] {
            let err = Identifier::parse("column", name).expect_err(name);
            assert!(matches!(err, IngestError::InvalidIdentifier { kind: "column", .. }));
        }
    }

    #[test]
    fn quoted_wraps_in_double_quotes() {
        let ident = Identifier::parse("table", "Probate").unwrap();
        assert_eq!(ident.quoted(), "\"Probate\"");
    }
}
