//! Filename pattern inspection.
//!
//! Active file names are produced by formatting the current local time with a
//! strftime pattern. The literal text before the first directive and after the
//! last one defines the naming convention used to recognise sibling files.

use chrono::format::{Item, StrftimeItems};

/// Literal prefix and suffix of a filename pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternAffixes {
    /// Literal text before the first directive (`sensors_`).
    pub prefix: String,
    /// Literal text after the last directive (`.csv`).
    pub suffix: String,
    /// Whether the pattern contains any date/time directive.
    pub has_directives: bool,
}

impl PatternAffixes {
    /// Extension of the suffix including the dot, e.g. `.csv`.
    pub fn extension(&self) -> Option<&str> {
        let dot = self.suffix.rfind('.')?;
        let ext = &self.suffix[dot..];
        (ext.len() > 1).then_some(ext)
    }

    /// Whether a file name follows the naming convention.
    pub fn matches(&self, file_name: &str) -> bool {
        if !self.has_directives {
            return file_name == self.prefix;
        }
        file_name.len() >= self.prefix.len() + self.suffix.len()
            && file_name.starts_with(&self.prefix)
            && file_name.ends_with(&self.suffix)
    }
}

/// Errors from pattern inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    Empty,
    InvalidDirective,
    PathSeparator,
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::Empty => write!(f, "pattern is empty"),
            PatternError::InvalidDirective => write!(f, "pattern contains an invalid % directive"),
            PatternError::PathSeparator => write!(f, "pattern must not contain path separators"),
        }
    }
}

/// Split a pattern into its literal prefix and suffix.
pub fn pattern_affixes(pattern: &str) -> Result<PatternAffixes, PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    if pattern.contains('/') || pattern.contains('\\') {
        return Err(PatternError::PathSeparator);
    }

    let mut prefix = String::new();
    let mut trailing = String::new();
    let mut has_directives = false;

    for item in StrftimeItems::new(pattern) {
        match item {
            Item::Literal(s) | Item::Space(s) => trailing.push_str(s),
            Item::OwnedLiteral(s) | Item::OwnedSpace(s) => trailing.push_str(&s),
            Item::Error => return Err(PatternError::InvalidDirective),
            _ => {
                if !has_directives {
                    prefix = std::mem::take(&mut trailing);
                    has_directives = true;
                } else {
                    trailing.clear();
                }
            }
        }
    }

    if !has_directives {
        // A constant name: the whole pattern is both prefix and suffix.
        prefix = trailing.clone();
    }

    Ok(PatternAffixes {
        prefix,
        suffix: trailing,
        has_directives,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern_affixes() {
        let affixes = pattern_affixes("sensors_%Y%m%d.csv").unwrap();
        assert_eq!(affixes.prefix, "sensors_");
        assert_eq!(affixes.suffix, ".csv");
        assert_eq!(affixes.extension(), Some(".csv"));
        assert!(affixes.has_directives);
    }

    #[test]
    fn test_affixes_with_inner_literals() {
        let affixes = pattern_affixes("plant-a_%Y-%m-%d_%H.log.csv").unwrap();
        assert_eq!(affixes.prefix, "plant-a_");
        assert_eq!(affixes.suffix, ".log.csv");
        assert_eq!(affixes.extension(), Some(".csv"));
    }

    #[test]
    fn test_constant_pattern() {
        let affixes = pattern_affixes("readings.csv").unwrap();
        assert!(!affixes.has_directives);
        assert!(affixes.matches("readings.csv"));
        assert!(!affixes.matches("other.csv"));
    }

    #[test]
    fn test_matches_convention() {
        let affixes = pattern_affixes("sensors_%Y%m%d.csv").unwrap();
        assert!(affixes.matches("sensors_20250101.csv"));
        assert!(!affixes.matches("sensors_20250101.csv.zip"));
        assert!(!affixes.matches("notes.csv"));
        assert!(!affixes.matches("sensors_.txt"));
    }

    #[test]
    fn test_no_extension() {
        let affixes = pattern_affixes("sensors_%Y%m%d").unwrap();
        assert_eq!(affixes.extension(), None);
        let affixes = pattern_affixes("sensors_%Y%m%d.").unwrap();
        assert_eq!(affixes.extension(), None);
    }

    #[test]
    fn test_invalid_patterns() {
        assert_eq!(pattern_affixes(""), Err(PatternError::Empty));
        assert_eq!(
            pattern_affixes("logs/%Y.csv"),
            Err(PatternError::PathSeparator)
        );
        assert_eq!(
            pattern_affixes("sensors_%Q.csv"),
            Err(PatternError::InvalidDirective)
        );
    }
}
