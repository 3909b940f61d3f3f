//! Tag predicates - equality filters over run tags

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::RunRecord;

/// Conjunction of tag equality clauses.
///
/// A run matches when every clause matches (logical AND). The empty predicate
/// matches every run.
///
/// ```rust
/// use champion_registry::experiment::{RunRecord, TagPredicate};
///
/// let predicate = TagPredicate::new().tag_eq("candidate", "true");
/// let run = RunRecord::builder("run-1", "exp-1").tag("candidate", "true").build();
/// assert!(predicate.matches(&run));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPredicate {
    clauses: BTreeMap<String, String>,
}

impl TagPredicate {
    /// Create a predicate that matches every run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `tag = value` clause. A repeated tag name replaces the earlier clause.
    #[must_use]
    pub fn tag_eq(mut self, tag: impl Into<String>, value: impl Into<String>) -> Self {
        self.clauses.insert(tag.into(), value.into());
        self
    }

    /// Number of clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether the predicate has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Whether `run` satisfies every clause.
    #[must_use]
    pub fn matches(&self, run: &RunRecord) -> bool {
        self.clauses
            .iter()
            .all(|(tag, value)| run.tag(tag) == Some(value.as_str()))
    }
}

impl fmt::Display for TagPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return write!(f, "<all>");
        }
        let mut first = true;
        for (tag, value) in &self.clauses {
            if !first {
                write!(f, " AND ")?;
            }
            write!(f, "tags.{tag} = '{value}'")?;
            first = false;
        }
        Ok(())
    }
}
