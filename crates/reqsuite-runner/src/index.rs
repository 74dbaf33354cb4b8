//! Grouping/ordering index and group filters
//!
//! Tests are bucketed by group name, then by order within the group.
//! Groups iterate by name; orders iterate ascending and empty orders are
//! never visited. Insertion order is kept inside a bucket.

use std::collections::BTreeMap;

use reqsuite_core::Test;

/// Anything that carries a group name and an order.
pub trait Grouped {
    fn group(&self) -> &str;
    fn order(&self) -> u32;
}

impl Grouped for Test {
    fn group(&self) -> &str {
        &self.group
    }

    fn order(&self) -> u32 {
        self.order
    }
}

impl<T: Grouped> Grouped for &T {
    fn group(&self) -> &str {
        (**self).group()
    }

    fn order(&self) -> u32 {
        (**self).order()
    }
}

/// One group's tests keyed by order.
#[derive(Debug, Clone)]
pub struct GroupBucket<T> {
    min_order: Option<u32>,
    max_order: Option<u32>,
    orders: BTreeMap<u32, Vec<T>>,
}

impl<T> Default for GroupBucket<T> {
    fn default() -> Self {
        Self {
            min_order: None,
            max_order: None,
            orders: BTreeMap::new(),
        }
    }
}

impl<T: Grouped> GroupBucket<T> {
    fn insert(&mut self, item: T) {
        let order = item.order();
        self.min_order = Some(self.min_order.map_or(order, |m| m.min(order)));
        self.max_order = Some(self.max_order.map_or(order, |m| m.max(order)));
        self.orders.entry(order).or_default().push(item);
    }
}

impl<T> GroupBucket<T> {
    /// Lowest order present, `None` when the bucket is empty.
    #[must_use]
    pub const fn min_order(&self) -> Option<u32> {
        self.min_order
    }

    /// Highest order present, `None` when the bucket is empty.
    #[must_use]
    pub const fn max_order(&self) -> Option<u32> {
        self.max_order
    }

    /// Number of tests in the bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Occupied orders, ascending.
    pub fn orders(&self) -> impl Iterator<Item = (u32, &[T])> {
        self.orders.iter().map(|(order, items)| (*order, items.as_slice()))
    }

    /// Consume the bucket, yielding occupied orders ascending.
    pub fn into_orders(self) -> impl Iterator<Item = (u32, Vec<T>)> {
        self.orders.into_iter()
    }
}

/// Group name → [`GroupBucket`].
#[derive(Debug, Clone)]
pub struct GroupIndex<T> {
    groups: BTreeMap<String, GroupBucket<T>>,
}

impl<T> Default for GroupIndex<T> {
    fn default() -> Self {
        Self {
            groups: BTreeMap::new(),
        }
    }
}

impl<T: Grouped> GroupIndex<T> {
    #[must_use]
    pub fn build(items: impl IntoIterator<Item = T>) -> Self {
        let mut index = Self::default();
        for item in items {
            index.insert(item);
        }
        index
    }

    pub fn insert(&mut self, item: T) {
        self.groups
            .entry(item.group().to_string())
            .or_default()
            .insert(item);
    }
}

impl<T> GroupIndex<T> {
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupBucket<T>> {
        self.groups.get(name)
    }

    /// Groups sorted by name.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &GroupBucket<T>)> {
        self.groups.iter().map(|(name, bucket)| (name.as_str(), bucket))
    }

    pub fn into_groups(self) -> impl Iterator<Item = (String, GroupBucket<T>)> {
        self.groups.into_iter()
    }

    /// Total number of tests across all groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(GroupBucket::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Group allow-list and deny-list, applied before dispatch.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    /// Only these groups run (empty = all)
    pub allow: Vec<String>,
    /// These groups never run
    pub deny: Vec<String>,
}

impl GroupFilter {
    #[must_use]
    pub fn allows(&self, group: &str) -> bool {
        (self.allow.is_empty() || self.allow.iter().any(|g| g == group))
            && !self.deny.iter().any(|g| g == group)
    }

    /// Split `items` into the kept ones and the number filtered out.
    pub fn apply<T: Grouped>(&self, items: impl IntoIterator<Item = T>) -> (Vec<T>, usize) {
        let mut removed = 0;
        let kept = items
            .into_iter()
            .filter(|item| {
                let keep = self.allows(item.group());
                if !keep {
                    removed += 1;
                }
                keep
            })
            .collect();
        (kept, removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        group: String,
        order: u32,
        id: usize,
    }

    impl Grouped for Item {
        fn group(&self) -> &str {
            &self.group
        }

        fn order(&self) -> u32 {
            self.order
        }
    }

    fn item(group: &str, order: u32, id: usize) -> Item {
        Item {
            group: group.into(),
            order,
            id,
        }
    }

    #[test]
    fn buckets_by_group_and_order() {
        let index = GroupIndex::build(vec![
            item("users", 2, 0),
            item("orders", 0, 1),
            item("users", 0, 2),
            item("users", 2, 3),
        ]);

        let names: Vec<&str> = index.groups().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["orders", "users"]);

        let users = index.group("users").unwrap();
        assert_eq!(users.min_order(), Some(0));
        assert_eq!(users.max_order(), Some(2));
        let orders: Vec<(u32, Vec<usize>)> = users
            .orders()
            .map(|(o, items)| (o, items.iter().map(|i| i.id).collect()))
            .collect();
        assert_eq!(orders, vec![(0, vec![2]), (2, vec![0, 3])]);
    }

    #[test]
    fn empty_bucket() {
        let bucket: GroupBucket<Item> = GroupBucket::default();
        assert_eq!(bucket.min_order(), None);
        assert_eq!(bucket.max_order(), None);
        assert!(bucket.is_empty());
        assert!(GroupIndex::<Item>::build(vec![]).is_empty());
    }

    #[test]
    fn indexes_borrowed_tests() {
        let tests = vec![
            Test::new("a", reqsuite_core::RequestSpec::new("GET", "http://x/")).with_order(1),
            Test::new("b", reqsuite_core::RequestSpec::new("GET", "http://x/")),
        ];
        let index = GroupIndex::build(tests.iter());
        let bucket = index.group("default").unwrap();
        assert_eq!(bucket.min_order(), Some(0));
        assert_eq!(bucket.max_order(), Some(1));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn filter_allow_and_deny() {
        let filter = GroupFilter {
            allow: vec!["a".into(), "b".into()],
            deny: vec!["b".into()],
        };
        assert!(filter.allows("a"));
        assert!(!filter.allows("b"));
        assert!(!filter.allows("c"));
        assert!(GroupFilter::default().allows("anything"));

        let (kept, removed) = filter.apply(vec![item("a", 0, 0), item("b", 0, 1), item("c", 0, 2)]);
        assert_eq!(kept, vec![item("a", 0, 0)]);
        assert_eq!(removed, 2);
    }

    fn arb_items() -> impl Strategy<Value = Vec<Item>> {
        prop::collection::vec((0..4usize, 0..6u32), 0..40).prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(id, (g, order))| item(&format!("g{g}"), order, id))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn every_item_indexed_once(items in arb_items()) {
            let index = GroupIndex::build(items.clone());
            prop_assert_eq!(index.len(), items.len());

            let mut seen: Vec<usize> = index
                .groups()
                .flat_map(|(_, b)| b.orders().flat_map(|(_, i)| i.iter().map(|x| x.id)).collect::<Vec<_>>())
                .collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..items.len()).collect::<Vec<_>>());
        }

        #[test]
        fn orders_within_bounds_and_ascending(items in arb_items()) {
            let index = GroupIndex::build(items);
            for (name, bucket) in index.groups() {
                let (Some(min), Some(max)) = (bucket.min_order(), bucket.max_order()) else {
                    return Err(TestCaseError::fail("indexed group without bounds"));
                };
                let orders: Vec<u32> = bucket.orders().map(|(o, _)| o).collect();
                prop_assert!(orders.windows(2).all(|w| w[0] < w[1]));
                prop_assert_eq!(orders.first().copied(), Some(min));
                prop_assert_eq!(orders.last().copied(), Some(max));
                for (order, items) in bucket.orders() {
                    prop_assert!(!items.is_empty());
                    for item in items {
                        prop_assert_eq!(item.group.as_str(), name);
                        prop_assert_eq!(item.order, order);
                    }
                }
            }
        }

        #[test]
        fn insertion_order_kept_in_bucket(items in arb_items()) {
            let index = GroupIndex::build(items);
            for (_, bucket) in index.groups() {
                for (_, items) in bucket.orders() {
                    prop_assert!(items.windows(2).all(|w| w[0].id < w[1].id));
                }
            }
        }
    }
}
