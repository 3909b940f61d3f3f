//! Metric ordering for run queries
//!
//! Ordering is total and independent of storage order:
//! 1. runs carrying the metric, by value in the requested direction
//! 2. runs missing the metric, always last
//! 3. ties (equal values, or both missing) by ascending run id

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::RunRecord;

/// Sort direction for metric ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending order (smallest values first)
    Ascending,
    /// Descending order (largest values first)
    #[default]
    Descending,
}

/// `ORDER BY metrics.<metric> <order>` clause of a run query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOrder {
    metric: String,
    order: SortOrder,
}

impl RunOrder {
    /// Order by `metric`, largest first.
    #[must_use]
    pub fn descending(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            order: SortOrder::Descending,
        }
    }

    /// Order by `metric`, smallest first.
    #[must_use]
    pub fn ascending(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            order: SortOrder::Ascending,
        }
    }

    /// Get the metric name.
    #[must_use]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Get the sort direction.
    #[must_use]
    pub const fn order(&self) -> SortOrder {
        self.order
    }

    /// Compare two runs under this ordering.
    #[must_use]
    pub fn compare(&self, a: &RunRecord, b: &RunRecord) -> Ordering {
        let by_metric = match (a.metric(&self.metric), b.metric(&self.metric)) {
            (Some(x), Some(y)) => match self.order {
                SortOrder::Ascending => x.total_cmp(&y),
                SortOrder::Descending => y.total_cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_metric.then_with(|| a.run_id().cmp(b.run_id()))
    }
}

/// Ordered, finite result of a run query.
///
/// The sequence is materialized once and can be iterated any number of
/// times; each call to [`RunQuery::iter`] restarts from the top-ranked run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunQuery {
    runs: Vec<RunRecord>,
}

impl RunQuery {
    /// Sort `runs` under `order`.
    #[must_use]
    pub fn sorted(mut runs: Vec<RunRecord>, order: &RunOrder) -> Self {
        runs.sort_by(|a, b| order.compare(a, b));
        Self { runs }
    }

    /// Iterate from the top-ranked run.
    pub fn iter(&self) -> std::slice::Iter<'_, RunRecord> {
        self.runs.iter()
    }

    /// Top-ranked run, if any.
    #[must_use]
    pub fn first(&self) -> Option<&RunRecord> {
        self.runs.first()
    }

    /// Number of matching runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no run matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Consume the query, returning the ordered runs.
    #[must_use]
    pub fn into_vec(self) -> Vec<RunRecord> {
        self.runs
    }
}

impl IntoIterator for RunQuery {
    type Item = RunRecord;
    type IntoIter = std::vec::IntoIter<RunRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.into_iter()
    }
}

impl<'a> IntoIterator for &'a RunQuery {
    type Item = &'a RunRecord;
    type IntoIter = std::slice::Iter<'a, RunRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.runs.iter()
    }
}
