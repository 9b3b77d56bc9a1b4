//! Column name canonicalization.
//!
//! Raw spreadsheet headers are rewritten into storage-safe identifiers by a
//! fixed, order-sensitive substitution sequence followed by a reserved-word
//! rename. The result is idempotent: normalizing a normalized name returns it
//! unchanged.

use std::borrow::Cow;

/// Applied in order; ` - ` must collapse before lone spaces and hyphens.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    (" - ", " "),
    (" ", "_"),
    ("$", ""),
    ("-", "_"),
    (".", ""),
    ("#", "No"),
    ("(", ""),
    (")", ""),
];

const RESERVED_RENAMES: &[(&str, &str)] = &[("Use", "Uses")];

/// Canonicalizes a raw column name, borrowing the input when nothing changes.
pub fn normalize(raw: &str) -> Cow<'_, str> {
    let mut current = Cow::Borrowed(raw);
    for (from, to) in SUBSTITUTIONS {
        if current.contains(from) {
            current = Cow::Owned(current.replace(from, to));
        }
    }
    rename_reserved_tokens(current)
}

fn rename_reserved_tokens(name: Cow<'_, str>) -> Cow<'_, str> {
    let needs_rename = name
        .split('_')
        .any(|token| RESERVED_RENAMES.iter().any(|(word, _)| *word == token));
    if !needs_rename {
        return name;
    }
    let renamed = name
        .split('_')
        .map(|token| {
            RESERVED_RENAMES
                .iter()
                .find(|(word, _)| *word == token)
                .map_or(token, |(_, replacement)| *replacement)
        })
        .collect::<Vec<_>>()
        .join("_");
    Cow::Owned(renamed)
}
