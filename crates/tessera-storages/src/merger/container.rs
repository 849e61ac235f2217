//! Key-ordered, deduplicating entry container and its pagination

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

/// A listing row that can be merged across backends
pub trait ListEntry {
    /// Identity used for deduplication
    type Id: Eq + Hash;

    /// Key the row sorts under
    fn key(&self) -> &str;

    /// Identity of the row
    fn id(&self) -> Self::Id;
}

/// Union of listing rows from several backends
///
/// Rows iterate in ascending key order; rows sharing a key keep the order
/// they were first seen in unless reordered through [`EntryContainer::groups_mut`].
/// A row whose identity was already seen is dropped.
#[derive(Debug)]
pub struct EntryContainer<E: ListEntry> {
    by_key: BTreeMap<String, Vec<E>>,
    seen: HashSet<E::Id>,
    len: usize,
}

impl<E: ListEntry> Default for EntryContainer<E> {
    fn default() -> Self {
        Self {
            by_key: BTreeMap::new(),
            seen: HashSet::new(),
            len: 0,
        }
    }
}

impl<E: ListEntry> EntryContainer<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row; returns false when it duplicates one already held
    pub fn push(&mut self, entry: E) -> bool {
        if !self.seen.insert(entry.id()) {
            return false;
        }
        self.by_key
            .entry(entry.key().to_string())
            .or_default()
            .push(entry);
        self.len += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rows grouped by key, in key order, for in-place reordering
    pub fn groups_mut(&mut self) -> impl Iterator<Item = &mut [E]> + '_ {
        self.by_key.values_mut().map(Vec::as_mut_slice)
    }

    /// Cut the first page of `page_size` rows
    pub fn paginate(self, page_size: usize) -> Page<E> {
        let mut rows = self.by_key.into_values().flatten().take(page_size.saturating_add(1));
        let entries: Vec<E> = rows.by_ref().take(page_size).collect();
        let next = rows.next();
        Page { entries, next }
    }
}

impl<E: ListEntry> Extend<E> for EntryContainer<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        for entry in iter {
            self.push(entry);
        }
    }
}

/// One page cut from a container
#[derive(Debug)]
pub struct Page<E> {
    /// Rows to emit, in order
    pub entries: Vec<E>,
    /// First row that did not fit, present only when the page is truncated
    pub next: Option<E>,
}

impl<E> Page<E> {
    pub fn is_truncated(&self) -> bool {
        self.next.is_some()
    }

    /// Last emitted row
    pub fn last(&self) -> Option<&E> {
        self.entries.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(&'static str, u32);

    impl ListEntry for Row {
        type Id = (&'static str, u32);

        fn key(&self) -> &str {
            self.0
        }

        fn id(&self) -> Self::Id {
            (self.0, self.1)
        }
    }

    #[test]
    fn test_orders_by_key_and_keeps_first_seen_order_within_key() {
        let mut container = EntryContainer::new();
        container.extend([Row("b", 2), Row("a", 9), Row("b", 1), Row("a", 3)]);
        let page = container.paginate(10);
        assert_eq!(
            page.entries,
            vec![Row("a", 9), Row("a", 3), Row("b", 2), Row("b", 1)]
        );
        assert!(!page.is_truncated());
    }

    #[test]
    fn test_groups_reorder_rows_within_their_key() {
        let mut container = EntryContainer::new();
        container.extend([Row("b", 1), Row("a", 1), Row("b", 3), Row("a", 2)]);
        for rows in container.groups_mut() {
            rows.sort_by(|x, y| y.1.cmp(&x.1));
        }
        let page = container.paginate(10);
        assert_eq!(
            page.entries,
            vec![Row("a", 2), Row("a", 1), Row("b", 3), Row("b", 1)]
        );
    }

    #[test]
    fn test_deduplicates_by_identity() {
        let mut container = EntryContainer::new();
        assert!(container.push(Row("a", 1)));
        assert!(!container.push(Row("a", 1)));
        assert!(container.push(Row("a", 2)));
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_paginate_truncates() {
        let mut container = EntryContainer::new();
        container.extend([Row("e", 1), Row("d", 1), Row("c", 1), Row("b", 1), Row("a", 1)]);
        let page = container.paginate(3);
        assert_eq!(page.entries.len(), 3);
        assert_eq!(page.last(), Some(&Row("c", 1)));
        assert_eq!(page.next, Some(Row("d", 1)));
    }

    #[test]
    fn test_paginate_exact_fit_is_not_truncated() {
        let mut container = EntryContainer::new();
        container.extend([Row("a", 1), Row("b", 1)]);
        let page = container.paginate(2);
        assert_eq!(page.entries.len(), 2);
        assert!(!page.is_truncated());
    }

    #[test]
    fn test_paginate_zero() {
        let mut container = EntryContainer::new();
        container.push(Row("a", 1));
        let page = container.paginate(0);
        assert!(page.entries.is_empty());
        assert_eq!(page.next, Some(Row("a", 1)));

        let page = EntryContainer::<Row>::new().paginate(0);
        assert!(page.last().is_none());
        assert!(!page.is_truncated());
    }
}
