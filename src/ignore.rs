//! Filename patterns that exclude statements from coverage figures.

use regex::Regex;

use crate::error::{CovtrendError, Result};

/// Ordered set of regexes matched against the file portion of a statement id.
#[derive(Debug, Clone, Default)]
pub struct IgnoreFilter {
    patterns: Vec<Regex>,
}

impl IgnoreFilter {
    /// Compile patterns in order. Surrounding whitespace is trimmed and blank
    /// entries are dropped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    CovtrendError::Config(format!("invalid ignore pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Index of the first pattern matching `file`, if any.
    pub fn first_match(&self, file: &str) -> Option<usize> {
        self.patterns.iter().position(|re| re.is_match(file))
    }

    pub fn is_ignored(&self, file: &str) -> bool {
        self.first_match(file).is_some()
    }
}
