//! Label pagination
//!
//! Splits a requested label count across pages of a fixed-capacity grid.

use crate::label::LabelError;

/// Labels placed on each page, in page order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePlan {
    /// Slots per page in the template grid
    pub capacity: usize,
    /// Labels to place on page N (index N-1)
    pub quotas: Vec<usize>,
}

impl PagePlan {
    pub fn total_pages(&self) -> usize {
        self.quotas.len()
    }

    /// `(page number, quota)` pairs, page numbers 1-indexed
    pub fn pages(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.quotas.iter().enumerate().map(|(i, q)| (i + 1, *q))
    }
}

/// Plan pages for `requested` labels on a grid with `capacity` slots
///
/// Page count is `ceil(requested / capacity)`; every page but the last is
/// full. A zero request yields no pages. A zero capacity is a template
/// structure error.
///
/// # Examples
/// ```
/// use brewlabel::label::paginator::plan_pages;
///
/// // 14 labels on a 6-slot grid = 3 pages (6 + 6 + 2)
/// let plan = plan_pages(14, 6).unwrap();
/// assert_eq!(plan.quotas, vec![6, 6, 2]);
/// ```
pub fn plan_pages(requested: usize, capacity: usize) -> Result<PagePlan, LabelError> {
    if capacity == 0 {
        return Err(LabelError::Structure(
            "template grid has no label slots".to_string(),
        ));
    }

    let total_pages = requested.div_ceil(capacity);
    let mut remaining = requested;
    let mut quotas = Vec::with_capacity(total_pages);
    for _ in 0..total_pages {
        let quota = remaining.min(capacity);
        quotas.push(quota);
        remaining -= quota;
    }

    Ok(PagePlan { capacity, quotas })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_partial_last_page() {
        let plan = plan_pages(14, 6).unwrap();
        assert_eq!(plan.quotas, vec![6, 6, 2]);
        assert_eq!(plan.total_pages(), 3);
    }

    #[test]
    fn test_plan_exact_page_boundary() {
        let plan = plan_pages(12, 6).unwrap();
        assert_eq!(plan.quotas, vec![6, 6]);
    }

    #[test]
    fn test_plan_single_partial_page() {
        let plan = plan_pages(1, 6).unwrap();
        assert_eq!(plan.quotas, vec![1]);
        assert_eq!(plan.pages().collect::<Vec<_>>(), vec![(1, 1)]);
    }

    #[test]
    fn test_plan_empty() {
        let plan = plan_pages(0, 6).unwrap();
        assert!(plan.quotas.is_empty());
        assert_eq!(plan.total_pages(), 0);
    }

    #[test]
    fn test_zero_capacity_is_structure_error() {
        assert!(matches!(plan_pages(3, 0), Err(LabelError::Structure(_))));
    }
}
