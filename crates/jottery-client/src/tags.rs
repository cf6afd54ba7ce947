//! Tag normalization and matching.
//!
//! Tags are written with their case preserved and compared
//! case-insensitively on read. Normalization trims whitespace, drops empty
//! tags, and deduplicates keeping the first occurrence.

/// Normalize a tag sequence for storage.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut result = Vec::new();
    for tag in tags {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        let folded = trimmed.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        result.push(trimmed.to_string());
    }
    result
}

/// Case-insensitive tag equality.
pub fn tags_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Whether a note's tag list contains the given tag.
pub fn contains_tag(tags: &[String], tag: &str) -> bool {
    tags.iter().any(|t| tags_match(t, tag))
}

/// Case-insensitive prefix completion over a tag universe.
pub fn autocomplete<'a>(universe: &'a [String], prefix: &str) -> Vec<&'a String> {
    let folded = prefix.trim().to_lowercase();
    universe
        .iter()
        .filter(|t| t.to_lowercase().starts_with(&folded))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_drops_empty() {
        let tags = normalize_tags(["  work ", "", "   ", "home"]);
        assert_eq!(tags, vec!["work", "home"]);
    }

    #[test]
    fn test_normalize_preserves_case() {
        let tags = normalize_tags(["Rust", "TODO"]);
        assert_eq!(tags, vec!["Rust", "TODO"]);
    }

    #[test]
    fn test_normalize_dedupes_case_insensitively_keeping_first() {
        let tags = normalize_tags(["Work", "work", "WORK", "home"]);
        assert_eq!(tags, vec!["Work", "home"]);
    }

    #[test]
    fn test_contains_tag_case_insensitive() {
        let tags = vec!["Rust".to_string(), "notes".to_string()];
        assert!(contains_tag(&tags, "rust"));
        assert!(contains_tag(&tags, "NOTES"));
        assert!(!contains_tag(&tags, "go"));
    }

    #[test]
    fn test_autocomplete() {
        let universe = vec!["Work".to_string(), "workshop".to_string(), "home".to_string()];
        let hits = autocomplete(&universe, "wo");
        assert_eq!(hits, vec!["Work", "workshop"]);
        assert!(autocomplete(&universe, "zzz").is_empty());
    }
}
