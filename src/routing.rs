//! Where a file's rows go: which template governs it and which table receives
//! them.

use serde::{Deserialize, Serialize};

/// Maps a source-folder category keyword to its template table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryTemplate {
    pub keyword: String,
    pub template: String,
}

impl CategoryTemplate {
    pub fn new(keyword: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            template: template.into(),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// First mapping whose keyword occurs in `category`, compared without case.
pub fn resolve_template<'a>(mappings: &'a [CategoryTemplate], category: &str) -> Option<&'a str> {
    mappings
        .iter()
        .find(|mapping| contains_ignore_case(category, &mapping.keyword))
        .map(|mapping| mapping.template.as_str())
}

/// Destination table for a file. A special keyword found in the file name
/// wins (spaces become underscores); otherwise the folder category is used.
pub fn destination_table(file_name: &str, category: &str, special_keywords: &[String]) -> String {
    special_keywords
        .iter()
        .find(|keyword| contains_ignore_case(file_name, keyword))
        .map(|keyword| keyword.replace(' ', "_"))
        .unwrap_or_else(|| category.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings() -> Vec<CategoryTemplate> {
        vec![
            CategoryTemplate::new("Sauce3", "Sauce3Template"),
            CategoryTemplate::new("Sauce1", "Sauce1Template"),
            CategoryTemplate::new("Sauce2", "Sauce2Template"),
        ]
    }

    #[test]
    fn template_match_is_case_insensitive_substring() {
        assert_eq!(resolve_template(&mappings(), "Sauce1"), Some("Sauce1Template"));
        assert_eq!(
            resolve_template(&mappings(), "weekly-sauce2-list"),
            Some("Sauce2Template")
        );
        assert_eq!(resolve_template(&mappings(), "Gravy"), None);
    }

    #[test]
    fn first_mapping_wins() {
        assert_eq!(
            resolve_template(&mappings(), "Sauce1 and Sauce3"),
            Some("Sauce3Template")
        );
    }

    #[test]
    fn special_keyword_overrides_category() {
        let keywords = vec!["Probate".to_string(), "Tax".to_string()];
        assert_eq!(
            destination_table("June PROBATE leads.xlsx", "Sauce1", &keywords),
            "Probate"
        );
        assert_eq!(destination_table("june.xlsx", "Sauce1", &keywords), "Sauce1");
        assert_eq!(
            destination_table("x.xlsx", "Sauce1", &["Back Tax".to_string()]),
            "Sauce1"
        );
        assert_eq!(
            destination_table("back tax.xlsx", "Sauce1", &["Back Tax".to_string()]),
            "Back_Tax"
        );
    }
}
