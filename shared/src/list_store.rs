use std::collections::BTreeSet;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// An item with a stable identity inside a [`ListStore`].
pub trait Keyed: Clone {
    type Id: Copy + Ord + Hash + Debug + Display;

    fn key(&self) -> Self::Id;
}

/// Ordered, id-unique collection of the items a screen renders.
///
/// Reads are public. Mutation is crate-private so every removal and
/// restoration goes through the coordinator, which keeps the pending-delete
/// and reveal invariants.
#[derive(Debug, Clone)]
pub struct ListStore<T: Keyed> {
    items: Vec<T>,
}

impl<T: Keyed> Default for ListStore<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Keyed> ListStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.items.iter().find(|item| item.key() == *id)
    }

    #[must_use]
    pub fn contains(&self, id: &T::Id) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<T::Id> {
        self.items.iter().map(Keyed::key).collect()
    }

    /// Appends, or replaces in place when the id is already present.
    pub(crate) fn upsert(&mut self, item: T) {
        let key = item.key();
        match self.items.iter_mut().find(|existing| existing.key() == key) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub(crate) fn update<F>(&mut self, id: &T::Id, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        match self.items.iter_mut().find(|item| item.key() == *id) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }

    /// Removes every item whose id is in `ids` and returns them in list order.
    pub(crate) fn take(&mut self, ids: &BTreeSet<T::Id>) -> Vec<T> {
        let (taken, kept): (Vec<T>, Vec<T>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|item| ids.contains(&item.key()));
        self.items = kept;
        taken
    }

    /// Appends items that are not already present. Returns how many were added.
    pub(crate) fn restore(&mut self, items: Vec<T>) -> usize {
        let mut restored = 0;
        for item in items {
            if !self.contains(&item.key()) {
                self.items.push(item);
                restored += 1;
            }
        }
        restored
    }

    /// Replaces the contents with an authoritative list, leaving out `hidden`
    /// ids and duplicate entries.
    pub(crate) fn reconcile(&mut self, authoritative: Vec<T>, hidden: &BTreeSet<T::Id>) {
        let mut seen = BTreeSet::new();
        self.items = authoritative
            .into_iter()
            .filter(|item| {
                let key = item.key();
                !hidden.contains(&key) && seen.insert(key)
            })
            .collect();
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}
