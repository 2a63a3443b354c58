// container.rs — Ordered child containers.
//
// A `ChildList` keeps its members in wire order, not insertion order: each
// container type has a `ChildOrder` table ranking the kinds it knows, and a
// new member is inserted before the first existing member of a strictly
// higher rank. Kinds missing from the table share the rank after the last
// listed kind, so they keep their relative insertion order and always
// follow the ranked kinds.
//
// Which kinds a container accepts is decided by the owning type (closed
// enums for built-in kinds, the extension registry for open ones); the list
// itself only orders.

use crate::xml::QName;

/// Something that can report the qualified name of the element it writes.
pub trait Kind {
    fn kind(&self) -> QName;
}

/// Per-container ranking of child kinds.
#[derive(Debug)]
pub struct ChildOrder {
    table: &'static [(&'static str, &'static str)],
}

impl ChildOrder {
    pub const fn new(table: &'static [(&'static str, &'static str)]) -> Self {
        Self { table }
    }

    /// Rank of a kind; unlisted kinds rank after every listed one.
    pub fn rank(&self, kind: &QName) -> usize {
        self.table
            .iter()
            .position(|(ns, local)| kind.is(ns, local))
            .unwrap_or(self.table.len())
    }
}

/// No ranking: members stay in insertion order.
pub static UNORDERED: ChildOrder = ChildOrder::new(&[]);

/// Members of one container, kept in wire order.
#[derive(Debug, Clone)]
pub struct ChildList<T> {
    items: Vec<T>,
    // Rank of each member, parallel to `items`.
    ranks: Vec<usize>,
    order: &'static ChildOrder,
}

impl<T: Kind> ChildList<T> {
    pub fn new(order: &'static ChildOrder) -> Self {
        Self {
            items: Vec::new(),
            ranks: Vec::new(),
            order,
        }
    }

    /// Insert a member at its wire position.
    pub fn add(&mut self, item: T) {
        if self.order.table.is_empty() {
            self.items.push(item);
            self.ranks.push(0);
            return;
        }
        let rank = self.order.rank(&item.kind());
        let position = self
            .ranks
            .iter()
            .position(|&existing| existing > rank)
            .unwrap_or(self.items.len());
        self.items.insert(position, item);
        self.ranks.insert(position, rank);
    }

    /// Insert every member of `items`, in order.
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.add(item);
        }
    }

    /// Replace the contents.
    pub fn update(&mut self, items: impl IntoIterator<Item = T>) {
        self.clear();
        self.extend(items);
    }

    /// Remove and return the first member matching `predicate`.
    pub fn remove_where(&mut self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let index = self.items.iter().position(predicate)?;
        self.ranks.remove(index);
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.ranks.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    // Mutable access cannot change a member's position, so callers must not
    // change its kind either; only crate-internal accessors use it.
    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Kind + PartialEq> ChildList<T> {
    /// Remove the first member equal to `item`.
    pub fn remove(&mut self, item: &T) -> Option<T> {
        self.remove_where(|existing| existing == item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.iter().any(|existing| existing == item)
    }
}

// Equality is over members only; the ordering table is a property of the type.
impl<T: PartialEq> PartialEq for ChildList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<'a, T> IntoIterator for &'a ChildList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
