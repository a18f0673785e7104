//! An indexable skip map: an ordered key-value store with rank queries.
//!
//! [`SkipMap`] keeps its entries sorted by a comparison function over
//! the keys.  On top of the classic skip-list operations (expected
//! `O(log n)` insert, lookup and removal) it maintains a span counter on
//! every link, which makes two more queries cheap: [`SkipMap::rank`]
//! (the 1-based position of a key) and [`SkipMap::cursor_at_rank`]
//! (select-by-rank), both expected `O(log n)`.  The bottom level is
//! doubly linked, so cursors can walk in either direction, and the
//! greatest node is cached for `O(1)` [`SkipMap::seek_to_last`].

use std::cmp::Ordering;
use std::fmt;
use std::iter;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::level_generator::{Geometric, LevelGenerator};
use crate::skipnode::{Level, SkipNode};

/// The fraction of nodes at level `i` that also reach level `i + 1`.
/// 1/4 is the classic trade-off between speed and space.
const P: f64 = 0.25;

/// The default advisory cap on node levels.  A map with this cap
/// efficiently supports roughly `4^32` elements.
pub const DEFAULT_MAX_LEVEL: usize = 32;

// ////////////////////////////////////////////////////////////////////////////
// SkipMap
// ////////////////////////////////////////////////////////////////////////////

/// An ordered map with expected-logarithmic insertion, lookup, removal,
/// rank and select-by-rank.
///
/// The order is given by a comparison function fixed at construction:
/// [`SkipMap::new`] uses the key type's `Ord` implementation, while
/// [`SkipMap::with_comp`] accepts an arbitrary function.  Key equality
/// is always decided by that function returning [`Ordering::Equal`],
/// never by `PartialEq`, so keys only need to be comparable.
///
/// A `SkipMap` is a single-threaded structure: it is not `Send` or
/// `Sync`, and all synchronization is the caller's business.
///
/// # Safety
///
/// The map relies on a well-behaved comparison function.  Given some
/// ordering function `f(a, b)`, it **must** satisfy the following
/// properties:
///
/// - Be well defined: `f(a, b)` should always return the same value
/// - Be anti-symmetric: `f(a, b) == Greater` if and only if
///   `f(b, a) == Less`, and `f(a, b) == Equal == f(b, a)`.
/// - Be transitive: If `f(a, b) == Greater` and `f(b, c) == Greater`
///   then `f(a, c) == Greater`.
///
/// Failure to satisfy these properties will corrupt the ordering, the
/// span bookkeeping, and every query built on them.
pub struct SkipMap<K, V> {
    /// Sentinel node originating the forward chain at every live level.
    /// Its tower always has exactly `top level + 1` slots.
    head: NonNull<SkipNode<K, V>>,
    /// The greatest node, or `None` iff the map is empty.
    footer: Option<NonNull<SkipNode<K, V>>>,
    len: usize,
    /// Advisory cap on the level of new nodes; see
    /// [`SkipMap::set_max_level`].
    max_level: usize,
    compare: Box<dyn Fn(&K, &K) -> Ordering>,
    level_generator: Geometric,
    /// The raw pointers above own every node.
    marker: PhantomData<Box<SkipNode<K, V>>>,
}

// ///////////////////////////////////////////////
// Inherent methods
// ///////////////////////////////////////////////

impl<K, V> SkipMap<K, V>
where
    K: Ord,
{
    /// Create a new skip map ordered by the key type's `Ord`
    /// implementation.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map: SkipMap<i64, String> = SkipMap::new();
    /// map.insert(1, "one".to_string());
    /// assert_eq!(map.get(&1).map(String::as_str), Some("one"));
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self::with_parts(Box::new(|a: &K, b: &K| a.cmp(b)), Geometric::new(P))
    }

    /// Like [`SkipMap::new`], but with a fixed seed for the level
    /// generator, making the internal structure reproducible.
    #[inline]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_parts(
            Box::new(|a: &K, b: &K| a.cmp(b)),
            Geometric::with_seed(P, seed),
        )
    }
}

impl<K, V> SkipMap<K, V> {
    /// Create a new skip map using the provided function to order keys.
    ///
    /// # Safety
    ///
    /// The function must be a total order over all keys that will ever
    /// enter the map, as described in the [type-level
    /// documentation](SkipMap#safety).  An inconsistent function does
    /// not cause memory unsafety here, but it leaves the map in a state
    /// where lookups, ranks and ranges return arbitrary results.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// // A map over floats, which are not `Ord`.
    /// let mut map = unsafe {
    ///     SkipMap::with_comp(|a: &f64, b: &f64| a.partial_cmp(b).unwrap())
    /// };
    /// map.insert(2.5, "high");
    /// map.insert(0.5, "low");
    /// assert_eq!(map.rank(&2.5), 2);
    /// ```
    #[inline]
    pub unsafe fn with_comp<F>(f: F) -> Self
    where
        F: Fn(&K, &K) -> Ordering + 'static,
    {
        Self::with_parts(Box::new(f), Geometric::new(P))
    }

    /// Like [`SkipMap::with_comp`], but with a fixed seed for the level
    /// generator.
    ///
    /// # Safety
    ///
    /// Same contract as [`SkipMap::with_comp`].
    #[inline]
    pub unsafe fn with_comp_seeded<F>(f: F, seed: u64) -> Self
    where
        F: Fn(&K, &K) -> Ordering + 'static,
    {
        Self::with_parts(Box::new(f), Geometric::with_seed(P, seed))
    }

    fn with_parts(
        compare: Box<dyn Fn(&K, &K) -> Ordering>,
        generator: Result<Geometric, crate::level_generator::GeometricError>,
    ) -> Self {
        SkipMap {
            head: NonNull::from(Box::leak(Box::new(SkipNode::head()))),
            footer: None,
            len: 0,
            max_level: DEFAULT_MAX_LEVEL,
            compare,
            level_generator: generator.expect("the default probability is in (0, 1)"),
            marker: PhantomData,
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.extend((0..10).map(|x| (x, x)));
    /// assert_eq!(map.len(), 10);
    /// ```
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The advisory cap on node levels.
    #[inline]
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Adjust the advisory cap on node levels.
    ///
    /// Raising the cap lets the map stay efficient as it grows past
    /// `4^max_level` elements.  Lowering it below the current top level
    /// only takes effect as new elements are inserted: the operative
    /// ceiling is always `max(current top level, max_level)`.  A cap of
    /// 0 degrades the map to a doubly-linked list, making every query,
    /// including [`SkipMap::rank`], `O(n)`.
    #[inline]
    pub fn set_max_level(&mut self, max_level: usize) {
        self.max_level = max_level;
    }

    /// Remove all entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.extend((0..10).map(|x| (x, x)));
    /// map.clear();
    /// assert!(map.is_empty());
    /// ```
    pub fn clear(&mut self) {
        self.free_nodes();
        let head = unsafe { &mut *self.head.as_ptr() };
        head.levels.clear();
        head.levels.push(Level {
            forward: None,
            span: 0,
        });
        self.footer = None;
        self.len = 0;
    }

    /// Returns a reference to the value associated with `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.insert(1, "one");
    /// assert_eq!(map.get(&1), Some(&"one"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get(&self, key: &K) -> Option<&V> {
        let node = self.lower_bound_from(self.head, key)?;
        let node = unsafe { &*node.as_ptr() };
        if (self.compare)(node.key_unchecked(), key) == Ordering::Equal {
            node.value.as_ref()
        } else {
            None
        }
    }

    /// Returns a mutable reference to the value associated with `key`.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let node = self.lower_bound_from(self.head, key)?;
        let node = unsafe { &mut *node.as_ptr() };
        if (self.compare)(node.key_unchecked(), key) == Ordering::Equal {
            node.value.as_mut()
        } else {
            None
        }
    }

    /// Returns `true` if the map contains `key`.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns the first entry whose key is greater than or equal to
    /// `key`, or `None` if every key is smaller.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.extend([(10, "a"), (20, "b")]);
    /// assert_eq!(map.get_greater_or_equal(&15), Some((&20, &"b")));
    /// assert_eq!(map.get_greater_or_equal(&25), None);
    /// ```
    pub fn get_greater_or_equal(&self, key: &K) -> Option<(&K, &V)> {
        let node = self.lower_bound_from(self.head, key)?;
        Some(unsafe { &*node.as_ptr() }.entry())
    }

    /// The entry with the smallest key, or `None` if the map is empty.
    #[inline]
    pub fn front(&self) -> Option<(&K, &V)> {
        let first = unsafe { self.head.as_ref() }.next()?;
        Some(unsafe { &*first.as_ptr() }.entry())
    }

    /// The entry with the greatest key, or `None` if the map is empty.
    #[inline]
    pub fn back(&self) -> Option<(&K, &V)> {
        let last = self.footer?;
        Some(unsafe { &*last.as_ptr() }.entry())
    }

    /// Insert a key-value pair, returning the previous value if the key
    /// was already present.
    ///
    /// An existing entry keeps its node and its position: only the
    /// value is replaced.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// assert_eq!(map.insert(1, "one"), None);
    /// assert_eq!(map.insert(1, "uno"), Some("one"));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let top = self.level();
        let mut update: Vec<NonNull<SkipNode<K, V>>> = vec![self.head; top + 1];
        let mut rank: Vec<usize> = vec![0; top + 1];

        let mut current = self.head;
        for i in (0..=top).rev() {
            rank[i] = if i == top { 0 } else { rank[i + 1] };
            loop {
                let forward = unsafe { current.as_ref() }.levels[i].forward;
                let Some(f) = forward else { break };
                match (self.compare)(unsafe { f.as_ref() }.key_unchecked(), &key) {
                    Ordering::Less => {
                        rank[i] += unsafe { current.as_ref() }.levels[i].span;
                        current = f;
                    }
                    Ordering::Equal => {
                        return unsafe { (*f.as_ptr()).value.replace(value) };
                    }
                    Ordering::Greater => break,
                }
            }
            update[i] = current;
        }

        let new_level = self.level_generator.level(self.effective_max_level());
        if new_level > top {
            let head = unsafe { &mut *self.head.as_ptr() };
            for _ in top..new_level {
                // A fresh head level spans the whole list.
                head.levels.push(Level {
                    forward: None,
                    span: self.len,
                });
                rank.push(0);
                update.push(self.head);
            }
        }

        let new_node = NonNull::from(Box::leak(Box::new(SkipNode::new(key, value, new_level))));
        for i in 0..=new_level {
            let upd = update[i].as_ptr();
            let node = new_node.as_ptr();
            unsafe {
                (&mut (*node).levels)[i].forward = (&(*upd).levels)[i].forward;
                (&mut (*upd).levels)[i].forward = Some(new_node);
                (&mut (*node).levels)[i].span = (&(*upd).levels)[i].span - (rank[0] - rank[i]);
                (&mut (*upd).levels)[i].span = (rank[0] - rank[i]) + 1;
            }
        }
        // The new node adds one level-0 step under every link that
        // skips over it.
        for i in (new_level + 1)..=self.level() {
            unsafe {
                (&mut (*update[i].as_ptr()).levels)[i].span += 1;
            }
        }
        self.len += 1;

        if update[0] != self.head {
            unsafe {
                (*new_node.as_ptr()).backward = Some(update[0]);
            }
        }
        if let Some(next) = unsafe { new_node.as_ref() }.next() {
            unsafe {
                (*next.as_ptr()).backward = Some(new_node);
            }
        }

        let is_new_back = match self.footer {
            None => true,
            Some(f) => {
                let footer_key = unsafe { f.as_ref() }.key_unchecked();
                let new_key = unsafe { new_node.as_ref() }.key_unchecked();
                (self.compare)(footer_key, new_key) == Ordering::Less
            }
        };
        if is_new_back {
            self.footer = Some(new_node);
        }
        None
    }

    /// Remove the entry for `key`, returning its value if it was
    /// present.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.insert(1, "one");
    /// assert_eq!(map.remove(&1), Some("one"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let top = self.level();
        let mut update: Vec<NonNull<SkipNode<K, V>>> = vec![self.head; top + 1];

        let mut current = self.head;
        for i in (0..=top).rev() {
            loop {
                let forward = unsafe { current.as_ref() }.levels[i].forward;
                let Some(f) = forward else { break };
                if (self.compare)(unsafe { f.as_ref() }.key_unchecked(), key) == Ordering::Less {
                    current = f;
                } else {
                    break;
                }
            }
            update[i] = current;
        }

        let candidate = unsafe { current.as_ref() }.next()?;
        if (self.compare)(unsafe { candidate.as_ref() }.key_unchecked(), key) != Ordering::Equal {
            return None;
        }

        let previous = unsafe { candidate.as_ref() }.backward;
        if self.footer == Some(candidate) {
            self.footer = previous;
        }
        if let Some(next) = unsafe { candidate.as_ref() }.next() {
            unsafe {
                (*next.as_ptr()).backward = previous;
            }
        }

        for i in 0..=top {
            let upd = update[i].as_ptr();
            unsafe {
                if (&(*upd).levels)[i].forward == Some(candidate) {
                    let absorbed = candidate.as_ref().levels[i].span;
                    (&mut (*upd).levels)[i].span = (&(*upd).levels)[i].span + absorbed - 1;
                    (&mut (*upd).levels)[i].forward = candidate.as_ref().levels[i].forward;
                } else {
                    (&mut (*upd).levels)[i].span -= 1;
                }
            }
        }

        let head = unsafe { &mut *self.head.as_ptr() };
        while head.levels.len() > 1 && head.levels.last().is_some_and(|l| l.forward.is_none()) {
            head.levels.pop();
        }
        self.len -= 1;

        let node = unsafe { Box::from_raw(candidate.as_ptr()) };
        node.value
    }

    /// Returns the 1-based position of `key` in ascending order, or 0
    /// if the key is absent.
    ///
    /// Expected `O(log n)`: the query descends the tower adding up link
    /// spans instead of walking the bottom chain.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.extend([(10, ()), (20, ()), (30, ())]);
    /// assert_eq!(map.rank(&20), 2);
    /// assert_eq!(map.rank(&25), 0);
    /// ```
    pub fn rank(&self, key: &K) -> usize {
        let mut current = self.head;
        let mut rank = 0;
        for i in (0..=self.level()).rev() {
            loop {
                let forward = unsafe { current.as_ref() }.levels[i].forward;
                let Some(f) = forward else { break };
                match (self.compare)(unsafe { f.as_ref() }.key_unchecked(), key) {
                    Ordering::Less => {
                        rank += unsafe { current.as_ref() }.levels[i].span;
                        current = f;
                    }
                    Ordering::Equal => {
                        return rank + unsafe { current.as_ref() }.levels[i].span;
                    }
                    Ordering::Greater => break,
                }
            }
        }
        0
    }

    /// Returns a cursor positioned at the entry of 1-based rank `rank`,
    /// or `None` if the rank is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.extend([(10, "a"), (20, "b"), (30, "c")]);
    /// let cursor = map.cursor_at_rank(2).unwrap();
    /// assert_eq!(cursor.key(), Some(&20));
    /// ```
    pub fn cursor_at_rank(&self, rank: usize) -> Option<Cursor<'_, K, V>> {
        let node = self.node_at_rank(rank)?;
        Some(Cursor {
            list: self,
            current: Some(node),
        })
    }

    /// Returns a cursor positioned before the first entry; the first
    /// call to [`Cursor::next`] yields the smallest key.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.extend([(1, "a"), (2, "b")]);
    ///
    /// let mut cursor = map.cursor();
    /// while let Some((key, value)) = cursor.next() {
    ///     println!("{key}: {value}");
    /// }
    /// ```
    #[inline]
    pub fn cursor(&self) -> Cursor<'_, K, V> {
        Cursor {
            list: self,
            current: None,
        }
    }

    /// Returns a cursor at the first entry whose key is greater than or
    /// equal to `key`, or `None` if there is none.
    pub fn seek(&self, key: &K) -> Option<Cursor<'_, K, V>> {
        let node = self.lower_bound_from(self.head, key)?;
        Some(Cursor {
            list: self,
            current: Some(node),
        })
    }

    /// Returns a cursor at the first entry, or `None` if the map is
    /// empty.
    pub fn seek_to_first(&self) -> Option<Cursor<'_, K, V>> {
        let first = unsafe { self.head.as_ref() }.next()?;
        Some(Cursor {
            list: self,
            current: Some(first),
        })
    }

    /// Returns a cursor at the last entry, or `None` if the map is
    /// empty.  `O(1)`.
    pub fn seek_to_last(&self) -> Option<Cursor<'_, K, V>> {
        let last = self.footer?;
        Some(Cursor {
            list: self,
            current: Some(last),
        })
    }

    /// Returns a cursor over the entries with `lower <= key < upper`.
    ///
    /// The cursor starts before the first in-range entry and refuses to
    /// step outside the bounds in either direction.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.extend((0..10).map(|x| (x, x * 10)));
    ///
    /// let mut range = map.range(3, 6);
    /// let mut keys = Vec::new();
    /// while let Some((key, _)) = range.next() {
    ///     keys.push(*key);
    /// }
    /// assert_eq!(keys, vec![3, 4, 5]);
    /// ```
    pub fn range(&self, lower: K, upper: K) -> RangeCursor<'_, K, V> {
        let first = self.lower_bound_from(self.head, &lower);
        RangeCursor {
            list: self,
            current: None,
            first,
            lower,
            upper,
        }
    }

    /// Returns a double-ended iterator over the entries in ascending
    /// key order.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.extend([(2, "b"), (1, "a")]);
    /// let keys: Vec<_> = map.iter().map(|(k, _)| *k).collect();
    /// assert_eq!(keys, vec![1, 2]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            first: unsafe { self.head.as_ref() }
                .next()
                .map(|p| unsafe { &*p.as_ptr() }),
            last: self.footer.map(|p| unsafe { &*p.as_ptr() }),
            size: self.len,
        }
    }

    /// Fill an empty map from entries already sorted in strictly
    /// ascending key order.
    ///
    /// Every entry is appended at the back without any traversal, so
    /// the whole fill is `O(n)` amortized, against `O(n log n)` for
    /// repeated [`SkipMap::insert`].
    ///
    /// # Panics
    ///
    /// Panics if the map is not empty, or if the input is not strictly
    /// ascending under the map's comparison function.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::SkipMap;
    ///
    /// let mut map = SkipMap::new();
    /// map.fill_sorted((0..100).map(|x| (x, x * 10)));
    /// assert_eq!(map.len(), 100);
    /// assert_eq!(map.rank(&99), 100);
    /// ```
    pub fn fill_sorted<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        assert!(self.is_empty(), "can only fill an empty map");

        // Per-level cursor to the current tail at that level.
        let mut update: Vec<NonNull<SkipNode<K, V>>> = vec![self.head];
        for (position, (key, value)) in entries.into_iter().enumerate() {
            let new_level = self.level_generator.level(self.effective_max_level());
            let top = self.level();
            if new_level > top {
                let head = unsafe { &mut *self.head.as_ptr() };
                for _ in top..new_level {
                    // A fresh head level spans all elements inserted
                    // so far.
                    head.levels.push(Level {
                        forward: None,
                        span: position,
                    });
                    update.push(self.head);
                }
            }

            if update[0] != self.head {
                let previous_key = unsafe { update[0].as_ref() }.key_unchecked();
                assert!(
                    (self.compare)(previous_key, &key) == Ordering::Less,
                    "fill_sorted requires strictly ascending input"
                );
            }

            let new_node =
                NonNull::from(Box::leak(Box::new(SkipNode::new(key, value, new_level))));
            if update[0] != self.head {
                unsafe {
                    (*new_node.as_ptr()).backward = Some(update[0]);
                }
            }

            for (i, tail) in update.iter_mut().enumerate().take(new_level + 1) {
                unsafe {
                    (&mut (*tail.as_ptr()).levels)[i].forward = Some(new_node);
                    (&mut (*tail.as_ptr()).levels)[i].span += 1;
                }
                *tail = new_node;
            }
            for (i, tail) in update.iter().enumerate().skip(new_level + 1) {
                unsafe {
                    (&mut (*tail.as_ptr()).levels)[i].span += 1;
                }
            }

            self.footer = Some(new_node);
            self.len += 1;
        }
    }
}

// ///////////////////////////////////////////////
// Internal methods
// ///////////////////////////////////////////////

impl<K, V> SkipMap<K, V> {
    /// The current top level: one less than the head's tower height.
    #[inline]
    fn level(&self) -> usize {
        unsafe { self.head.as_ref() }.levels.len() - 1
    }

    /// The operative ceiling for new level draws.
    #[inline]
    fn effective_max_level(&self) -> usize {
        self.level().max(self.max_level)
    }

    /// Find the first node with key greater than or equal to `key`,
    /// descending from `start`'s own tower.  `start` must be the head
    /// or a node with key less than `key`.
    fn lower_bound_from(
        &self,
        start: NonNull<SkipNode<K, V>>,
        key: &K,
    ) -> Option<NonNull<SkipNode<K, V>>> {
        let mut current = start;
        let depth = unsafe { current.as_ref() }.levels.len();
        for i in (0..depth).rev() {
            loop {
                let forward = unsafe { current.as_ref() }.levels[i].forward;
                let Some(f) = forward else { break };
                match (self.compare)(unsafe { f.as_ref() }.key_unchecked(), key) {
                    Ordering::Less => current = f,
                    Ordering::Equal => return Some(f),
                    Ordering::Greater => break,
                }
            }
        }
        unsafe { current.as_ref() }.next()
    }

    /// Find the node of 1-based rank `rank` by descending the tower and
    /// adding up spans.
    fn node_at_rank(&self, rank: usize) -> Option<NonNull<SkipNode<K, V>>> {
        if rank == 0 || rank > self.len {
            return None;
        }
        let mut current = self.head;
        let mut traversed = 0;
        for i in (0..=self.level()).rev() {
            loop {
                let level = &unsafe { &*current.as_ptr() }.levels[i];
                let Some(f) = level.forward else { break };
                if traversed + level.span < rank {
                    traversed += level.span;
                    current = f;
                } else {
                    break;
                }
            }
            let level = &unsafe { &*current.as_ptr() }.levels[i];
            if let Some(f) = level.forward {
                if traversed + level.span == rank {
                    return Some(f);
                }
            }
        }
        None
    }

    /// Free every live node, leaving the head's links dangling.  The
    /// caller must reset or drop the head afterwards.
    fn free_nodes(&mut self) {
        let mut current = unsafe { self.head.as_ref() }.next();
        while let Some(node) = current {
            let boxed = unsafe { Box::from_raw(node.as_ptr()) };
            current = boxed.levels[0].forward;
        }
    }

    /// Verify every structural invariant, panicking on the first
    /// violation.  Meant for tests; `O(n)` per level.
    #[allow(dead_code)]
    pub(crate) fn check(&self) {
        use std::collections::HashMap;

        let head = unsafe { self.head.as_ref() };
        assert!(!head.levels.is_empty(), "the head must keep one level");

        // Walk level 0 to assign 1-based positions and verify order,
        // backward links and the footer.
        let mut positions: HashMap<NonNull<SkipNode<K, V>>, usize> = HashMap::new();
        let mut previous: Option<NonNull<SkipNode<K, V>>> = None;
        let mut current = head.next();
        let mut count = 0;
        while let Some(ptr) = current {
            count += 1;
            positions.insert(ptr, count);
            let node = unsafe { &*ptr.as_ptr() };
            match previous {
                Some(prev) => {
                    assert_eq!(
                        node.backward,
                        Some(prev),
                        "backward links must mirror the level-0 chain"
                    );
                    let prev_key = unsafe { prev.as_ref() }.key_unchecked();
                    assert!(
                        (self.compare)(prev_key, node.key_unchecked()) == Ordering::Less,
                        "keys must be strictly ascending at level 0"
                    );
                }
                None => {
                    assert!(
                        node.backward.is_none(),
                        "the first node must have no backward link"
                    );
                }
            }
            assert!(
                node.levels.len() <= head.levels.len(),
                "no node may out-tower the head"
            );
            previous = current;
            current = node.next();
        }
        assert_eq!(count, self.len, "length must match the level-0 chain");
        assert_eq!(self.footer, previous, "the footer must be the last node");

        // Verify that every span counts exactly the level-0 distance to
        // its target (or to the end of the list), and that each level's
        // spans sum to the length.
        for i in 0..head.levels.len() {
            let mut node = head;
            let mut position = 0;
            let mut total = 0;
            loop {
                let level = &node.levels[i];
                total += level.span;
                match level.forward {
                    Some(f) => {
                        let target = positions[&f];
                        assert_eq!(
                            level.span,
                            target - position,
                            "span must count level-0 steps to its target"
                        );
                        position = target;
                        node = unsafe { &*f.as_ptr() };
                        assert!(node.levels.len() > i, "forward target below its level");
                    }
                    None => {
                        assert_eq!(
                            level.span,
                            self.len - position,
                            "a tail span must reach the end of the list"
                        );
                        break;
                    }
                }
            }
            assert_eq!(total, self.len, "spans at each level must sum to len");
        }
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Cursors
// ////////////////////////////////////////////////////////////////////////////

/// A bidirectional cursor over a [`SkipMap`].
///
/// A cursor is positioned either before the first entry (as returned by
/// [`SkipMap::cursor`]) or at a live entry.  [`Cursor::next`] and
/// [`Cursor::prev`] return the entry they move to, or `None` without
/// moving when the cursor is at the corresponding end.
///
/// Cursors borrow the map, so the borrow checker statically rules out
/// mutating the map while one is alive.
pub struct Cursor<'a, K, V> {
    list: &'a SkipMap<K, V>,
    /// `None` means "before the first entry".
    current: Option<NonNull<SkipNode<K, V>>>,
}

impl<'a, K, V> Cursor<'a, K, V> {
    #[inline]
    fn node(&self) -> Option<&'a SkipNode<K, V>> {
        self.current.map(|p| unsafe { &*p.as_ptr() })
    }

    /// The key at the current position.
    #[inline]
    pub fn key(&self) -> Option<&'a K> {
        self.node().map(SkipNode::key_unchecked)
    }

    /// The value at the current position.
    #[inline]
    pub fn value(&self) -> Option<&'a V> {
        self.node().and_then(|node| node.value.as_ref())
    }

    /// Advance to the next entry and return it, or return `None`
    /// without moving if there is none.
    pub fn next(&mut self) -> Option<(&'a K, &'a V)> {
        let next = match self.current {
            None => unsafe { self.list.head.as_ref() }.next(),
            Some(c) => unsafe { c.as_ref() }.next(),
        }?;
        self.current = Some(next);
        Some(unsafe { &*next.as_ptr() }.entry())
    }

    /// Step back to the previous entry and return it, or return `None`
    /// without moving if the cursor is at the first entry.
    pub fn prev(&mut self) -> Option<(&'a K, &'a V)> {
        let previous = unsafe { self.current?.as_ref() }.backward?;
        self.current = Some(previous);
        Some(unsafe { &*previous.as_ptr() }.entry())
    }

    /// Reposition the cursor at the first entry with key greater than
    /// or equal to `key`.  Returns `false`, leaving the position
    /// unchanged, if no such entry exists.
    ///
    /// When the target is not less than the current key the search
    /// starts from the current position instead of the head, so a
    /// forward scan interleaved with seeks costs a single traversal
    /// overall.
    pub fn seek(&mut self, key: &K) -> bool {
        let hint = match self.current {
            Some(c)
                if (self.list.compare)(key, unsafe { c.as_ref() }.key_unchecked())
                    != Ordering::Less =>
            {
                c
            }
            _ => self.list.head,
        };
        // Back up one node so a seek to the current key can find it.
        let start = unsafe { hint.as_ref() }.backward.unwrap_or(self.list.head);
        match self.list.lower_bound_from(start, key) {
            Some(node) => {
                self.current = Some(node);
                true
            }
            None => false,
        }
    }
}

/// A [`Cursor`] restricted to the half-open key range `[lower, upper)`.
///
/// Returned by [`SkipMap::range`].  The cursor starts before the first
/// in-range entry; `next` and `prev` refuse to step outside the bounds.
pub struct RangeCursor<'a, K, V> {
    list: &'a SkipMap<K, V>,
    /// `None` means "before the first in-range entry".
    current: Option<NonNull<SkipNode<K, V>>>,
    /// The first node with key >= `lower`, resolved at construction.
    first: Option<NonNull<SkipNode<K, V>>>,
    lower: K,
    upper: K,
}

impl<'a, K, V> RangeCursor<'a, K, V> {
    /// The key at the current position.
    #[inline]
    pub fn key(&self) -> Option<&'a K> {
        self.current
            .map(|p| unsafe { &*p.as_ptr() }.key_unchecked())
    }

    /// The value at the current position.
    #[inline]
    pub fn value(&self) -> Option<&'a V> {
        self.current.and_then(|p| unsafe { &*p.as_ptr() }.value.as_ref())
    }

    /// Advance to the next entry inside the range and return it, or
    /// return `None` without moving when the range is exhausted.
    pub fn next(&mut self) -> Option<(&'a K, &'a V)> {
        let candidate = match self.current {
            None => self.first,
            Some(c) => unsafe { c.as_ref() }.next(),
        }?;
        let node = unsafe { &*candidate.as_ptr() };
        if (self.list.compare)(node.key_unchecked(), &self.upper) != Ordering::Less {
            return None;
        }
        self.current = Some(candidate);
        Some(node.entry())
    }

    /// Step back to the previous entry inside the range and return it,
    /// or return `None` without moving when the lower bound or the
    /// initial position is reached.
    pub fn prev(&mut self) -> Option<(&'a K, &'a V)> {
        let candidate = unsafe { self.current?.as_ref() }.backward?;
        let node = unsafe { &*candidate.as_ptr() };
        if (self.list.compare)(node.key_unchecked(), &self.lower) == Ordering::Less {
            return None;
        }
        self.current = Some(candidate);
        Some(node.entry())
    }

    /// Reposition the cursor at the first entry with key greater than
    /// or equal to `key`, which must itself lie inside `[lower,
    /// upper)`.  Returns `false`, leaving the position unchanged, if
    /// the key is out of bounds or the landing entry would be.
    pub fn seek(&mut self, key: &K) -> bool {
        if (self.list.compare)(key, &self.lower) == Ordering::Less {
            return false;
        }
        if (self.list.compare)(key, &self.upper) != Ordering::Less {
            return false;
        }
        let hint = match self.current {
            Some(c)
                if (self.list.compare)(key, unsafe { c.as_ref() }.key_unchecked())
                    != Ordering::Less =>
            {
                c
            }
            _ => self.list.head,
        };
        let start = unsafe { hint.as_ref() }.backward.unwrap_or(self.list.head);
        match self.list.lower_bound_from(start, key) {
            Some(node)
                if (self.list.compare)(unsafe { node.as_ref() }.key_unchecked(), &self.upper)
                    == Ordering::Less =>
            {
                self.current = Some(node);
                true
            }
            _ => false,
        }
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Iterators
// ////////////////////////////////////////////////////////////////////////////

/// A double-ended iterator over the entries of a [`SkipMap`], in
/// ascending key order.
pub struct Iter<'a, K, V> {
    first: Option<&'a SkipNode<K, V>>,
    last: Option<&'a SkipNode<K, V>>,
    size: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.first?;
        self.size -= 1;
        if self.size == 0 {
            self.first = None;
            self.last = None;
        } else {
            self.first = node.next().map(|p| unsafe { &*p.as_ptr() });
        }
        Some(node.entry())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.size, Some(self.size))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let node = self.last?;
        self.size -= 1;
        if self.size == 0 {
            self.first = None;
            self.last = None;
        } else {
            self.last = node.backward.map(|p| unsafe { &*p.as_ptr() });
        }
        Some(node.entry())
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

// ///////////////////////////////////////////////
// Trait implementations
// ///////////////////////////////////////////////

impl<K, V> Drop for SkipMap<K, V> {
    fn drop(&mut self) {
        self.free_nodes();
        unsafe {
            drop(Box::from_raw(self.head.as_ptr()));
        }
    }
}

impl<K, V> Default for SkipMap<K, V>
where
    K: Ord,
{
    fn default() -> Self {
        SkipMap::new()
    }
}

impl<K, V> Extend<(K, V)> for SkipMap<K, V> {
    #[inline]
    fn extend<I: iter::IntoIterator<Item = (K, V)>>(&mut self, iterable: I) {
        for (key, value) in iterable {
            self.insert(key, value);
        }
    }
}

impl<K, V> iter::FromIterator<(K, V)> for SkipMap<K, V>
where
    K: Ord,
{
    #[inline]
    fn from_iter<I>(iterable: I) -> SkipMap<K, V>
    where
        I: iter::IntoIterator<Item = (K, V)>,
    {
        let mut map = SkipMap::new();
        map.extend(iterable);
        map
    }
}

impl<'a, K, V> iter::IntoIterator for &'a SkipMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<K, V> fmt::Debug for SkipMap<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {:?}", key, value)?;
        }
        write!(f, "}}")
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Tests
// ////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::seq::SliceRandom;

    use super::SkipMap;

    fn shuffled(n: i64) -> Vec<i64> {
        let mut keys: Vec<i64> = (0..n).collect();
        keys.shuffle(&mut rand::thread_rng());
        keys
    }

    #[test]
    fn insert_get_remove() {
        let mut map = SkipMap::new();
        assert!(map.is_empty());
        for key in shuffled(100) {
            assert_eq!(map.insert(key, key * 2), None);
        }
        map.check();
        assert_eq!(map.len(), 100);

        for key in 0..100 {
            assert_eq!(map.get(&key), Some(&(key * 2)));
        }
        assert_eq!(map.get(&100), None);

        for key in shuffled(100) {
            assert_eq!(map.remove(&key), Some(key * 2));
            map.check();
        }
        assert!(map.is_empty());
        assert_eq!(map.remove(&0), None);
    }

    #[test]
    fn upsert_keeps_length() {
        let mut map = SkipMap::new();
        assert_eq!(map.insert(7, "a"), None);
        assert_eq!(map.insert(7, "a"), Some("a"));
        assert_eq!(map.insert(7, "b"), Some("a"));
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&7), Some(&"b"));
        map.check();
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut map = SkipMap::new();
        map.insert(1, vec![1]);
        map.get_mut(&1).unwrap().push(2);
        assert_eq!(map.get(&1), Some(&vec![1, 2]));
    }

    #[test]
    fn rank_is_one_based() {
        let mut map = SkipMap::new();
        for key in shuffled(100) {
            map.insert(key, key * 10);
        }
        for key in 0..100 {
            assert_eq!(map.rank(&key), (key + 1) as usize);
        }
        assert_eq!(map.rank(&-1), 0);
        assert_eq!(map.rank(&100), 0);
    }

    #[test]
    fn rank_select_round_trip() {
        let mut map = SkipMap::new();
        for key in shuffled(500) {
            map.insert(key, ());
        }
        for key in 0..500 {
            let rank = map.rank(&key);
            let cursor = map.cursor_at_rank(rank).unwrap();
            assert_eq!(cursor.key(), Some(&key));
        }
        for rank in 1..=500 {
            let cursor = map.cursor_at_rank(rank).unwrap();
            assert_eq!(map.rank(cursor.key().unwrap()), rank);
        }
        assert!(map.cursor_at_rank(0).is_none());
        assert!(map.cursor_at_rank(501).is_none());
    }

    #[test]
    fn ranks_survive_removals() {
        let mut map = SkipMap::new();
        for key in shuffled(200) {
            map.insert(key, ());
        }
        for key in (0..200).filter(|k| k % 2 == 0) {
            map.remove(&key);
        }
        map.check();
        for (i, key) in (0..200).filter(|k| k % 2 == 1).enumerate() {
            assert_eq!(map.rank(&key), i + 1);
        }
    }

    #[test]
    fn get_greater_or_equal() {
        let mut map = SkipMap::new();
        map.extend([(10, "a"), (20, "b"), (30, "c")]);
        assert_eq!(map.get_greater_or_equal(&5), Some((&10, &"a")));
        assert_eq!(map.get_greater_or_equal(&10), Some((&10, &"a")));
        assert_eq!(map.get_greater_or_equal(&11), Some((&20, &"b")));
        assert_eq!(map.get_greater_or_equal(&30), Some((&30, &"c")));
        assert_eq!(map.get_greater_or_equal(&31), None);
    }

    #[test]
    fn front_and_back() {
        let mut map = SkipMap::new();
        assert_eq!(map.front(), None);
        assert_eq!(map.back(), None);
        for key in shuffled(50) {
            map.insert(key, ());
        }
        assert_eq!(map.front(), Some((&0, &())));
        assert_eq!(map.back(), Some((&49, &())));
        map.remove(&49);
        assert_eq!(map.back(), Some((&48, &())));
        map.remove(&0);
        assert_eq!(map.front(), Some((&1, &())));
        map.check();
    }

    #[test]
    fn cursor_walks_both_ways() {
        let mut map = SkipMap::new();
        for key in shuffled(100) {
            map.insert(key, ());
        }

        let mut cursor = map.seek_to_first().unwrap();
        assert_eq!(cursor.key(), Some(&0));
        let mut forward = vec![0];
        while let Some((key, _)) = cursor.next() {
            forward.push(*key);
        }
        assert_eq!(forward, (0..100).collect::<Vec<_>>());

        // Exhausted cursors stay put.
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.key(), Some(&99));

        let mut backward = vec![99];
        while let Some((key, _)) = cursor.prev() {
            backward.push(*key);
        }
        assert_eq!(backward, (0..100).rev().collect::<Vec<_>>());
        assert_eq!(cursor.prev(), None);
        assert_eq!(cursor.key(), Some(&0));
    }

    #[test]
    fn cursor_before_first() {
        let mut map = SkipMap::new();
        map.extend([(1, "a"), (2, "b")]);
        let mut cursor = map.cursor();
        assert_eq!(cursor.key(), None);
        assert_eq!(cursor.prev(), None);
        assert_eq!(cursor.next(), Some((&1, &"a")));
        assert_eq!(cursor.next(), Some((&2, &"b")));
    }

    #[test]
    fn cursor_seek_with_hint() {
        let mut map = SkipMap::new();
        map.extend((0..100).map(|x| (x * 2, x)));

        let mut cursor = map.cursor();
        assert!(cursor.seek(&50));
        assert_eq!(cursor.key(), Some(&50));

        // Seeking to the current key lands on it.
        assert!(cursor.seek(&50));
        assert_eq!(cursor.key(), Some(&50));

        // Forward seek reuses the position, odd targets land on the
        // next even key.
        assert!(cursor.seek(&51));
        assert_eq!(cursor.key(), Some(&52));

        // Backward seek restarts from the head.
        assert!(cursor.seek(&3));
        assert_eq!(cursor.key(), Some(&4));

        // Nothing at or above 199.
        assert!(!cursor.seek(&199));
        assert_eq!(cursor.key(), Some(&4));
    }

    #[test]
    fn seek_on_empty_map() {
        let map: SkipMap<i64, ()> = SkipMap::new();
        assert!(map.seek(&1).is_none());
        assert!(map.seek_to_first().is_none());
        assert!(map.seek_to_last().is_none());
        let mut cursor = map.cursor();
        assert!(!cursor.seek(&1));
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn range_respects_bounds() {
        let mut map = SkipMap::new();
        map.extend((0..20).map(|x| (x, x)));

        let mut range = map.range(5, 10);
        let mut keys = Vec::new();
        while let Some((key, _)) = range.next() {
            keys.push(*key);
        }
        assert_eq!(keys, vec![5, 6, 7, 8, 9]);
        assert_eq!(range.next(), None);
        assert_eq!(range.key(), Some(&9));

        // And back down to the lower bound.
        assert_eq!(range.prev(), Some((&8, &8)));
        assert_eq!(range.prev(), Some((&7, &7)));
        assert_eq!(range.prev(), Some((&6, &6)));
        assert_eq!(range.prev(), Some((&5, &5)));
        assert_eq!(range.prev(), None);
        assert_eq!(range.key(), Some(&5));
    }

    #[test]
    fn range_prev_from_start_yields_nothing() {
        let mut map = SkipMap::new();
        map.extend((0..20).map(|x| (x, ())));
        let mut range = map.range(5, 10);
        assert_eq!(range.prev(), None);
        assert_eq!(range.next(), Some((&5, &())));
    }

    #[test]
    fn range_seek() {
        let mut map = SkipMap::new();
        map.extend((0..20).map(|x| (x * 2, ())));

        let mut range = map.range(4, 20);
        assert!(range.seek(&10));
        assert_eq!(range.key(), Some(&10));
        assert!(range.seek(&11));
        assert_eq!(range.key(), Some(&12));
        // Out of bounds on either side.
        assert!(!range.seek(&2));
        assert!(!range.seek(&20));
        // In bounds, but the landing node would not be.
        let mut sparse: SkipMap<i64, ()> = SkipMap::new();
        sparse.extend([(0, ()), (100, ())]);
        let mut range = sparse.range(0, 50);
        assert!(!range.seek(&10));
        assert_eq!(range.key(), None);
    }

    #[test]
    fn range_empty_window() {
        let mut map = SkipMap::new();
        map.extend((0..10).map(|x| (x, ())));
        let mut range = map.range(7, 7);
        assert_eq!(range.next(), None);
        let mut range = map.range(100, 200);
        assert_eq!(range.next(), None);
    }

    #[test]
    fn iter_both_directions() {
        let mut map = SkipMap::new();
        for key in shuffled(1000) {
            map.insert(key, key);
        }
        let size = map.len();

        let mut iter = map.iter();
        assert_eq!(iter.size_hint(), (size, Some(size)));
        let forward: Vec<i64> = map.iter().map(|(k, _)| *k).collect();
        assert_eq!(forward, (0..1000).collect::<Vec<_>>());

        let backward: Vec<i64> = map.iter().rev().map(|(k, _)| *k).collect();
        assert_eq!(backward, (0..1000).rev().collect::<Vec<_>>());

        // Mixed consumption meets in the middle without overlap.
        let mut remaining = size;
        loop {
            if iter.next().is_none() {
                break;
            }
            remaining -= 1;
            if iter.next_back().is_none() {
                break;
            }
            remaining -= 1;
        }
        assert_eq!(remaining, 0);
    }

    #[test]
    fn fill_sorted_matches_insert() {
        let mut filled = SkipMap::new();
        filled.fill_sorted((0..500).map(|x| (x, x * 3)));
        filled.check();
        assert_eq!(filled.len(), 500);
        for key in 0..500 {
            assert_eq!(filled.get(&key), Some(&(key * 3)));
            assert_eq!(filled.rank(&key), (key + 1) as usize);
        }
        assert_eq!(filled.back(), Some((&499, &1497)));

        // The filled map behaves like one built by insertion.
        filled.insert(500, 1500);
        filled.remove(&0);
        filled.check();
        assert_eq!(filled.rank(&500), 500);
    }

    #[test]
    #[should_panic(expected = "can only fill an empty map")]
    fn fill_sorted_rejects_non_empty() {
        let mut map = SkipMap::new();
        map.insert(1, 1);
        map.fill_sorted([(2, 2)]);
    }

    #[test]
    #[should_panic(expected = "strictly ascending")]
    fn fill_sorted_rejects_unsorted_input() {
        let mut map = SkipMap::new();
        map.fill_sorted([(1, ()), (3, ()), (2, ())]);
    }

    #[test]
    #[should_panic(expected = "strictly ascending")]
    fn fill_sorted_rejects_duplicates() {
        let mut map = SkipMap::new();
        map.fill_sorted([(1, ()), (1, ())]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut map = SkipMap::new();
        map.extend((0..100).map(|x| (x, x)));
        map.clear();
        map.check();
        assert!(map.is_empty());
        assert_eq!(map.rank(&5), 0);
        assert!(map.seek_to_last().is_none());
        // The map is fully usable afterwards.
        map.insert(1, 1);
        assert_eq!(map.rank(&1), 1);
    }

    #[test]
    fn custom_comparator_reverses_order() {
        let mut map = unsafe { SkipMap::with_comp(|a: &i64, b: &i64| b.cmp(a)) };
        for key in shuffled(100) {
            map.insert(key, ());
        }
        map.check();
        assert_eq!(map.rank(&99), 1);
        assert_eq!(map.rank(&0), 100);
        assert_eq!(map.front(), Some((&99, &())));
        assert_eq!(map.back(), Some((&0, &())));
    }

    #[test]
    fn max_level_zero_degrades_to_linked_list() {
        let mut map: SkipMap<i64, ()> = SkipMap::new();
        map.set_max_level(0);
        for key in shuffled(100) {
            map.insert(key, ());
        }
        map.check();
        for key in 0..100 {
            assert_eq!(map.rank(&key), (key + 1) as usize);
        }
    }

    #[test]
    fn lowering_max_level_keeps_live_towers_working() {
        let mut map: SkipMap<i64, ()> = SkipMap::new();
        for key in shuffled(500) {
            map.insert(key, ());
        }
        map.set_max_level(1);
        for key in 500..600 {
            map.insert(key, ());
        }
        map.check();
        for key in 0..600 {
            assert_eq!(map.rank(&key), (key + 1) as usize);
        }
    }

    #[test]
    fn seeded_maps_are_structurally_identical() {
        let mut a: SkipMap<i64, i64> = SkipMap::with_seed(42);
        let mut b: SkipMap<i64, i64> = SkipMap::with_seed(42);
        for key in 0..100 {
            a.insert(key, key);
            b.insert(key, key);
        }
        assert!(a.iter().eq(b.iter()));
    }

    #[test]
    fn mixed_churn_keeps_invariants() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut map: SkipMap<u32, u32> = SkipMap::new();
        let mut shadow = std::collections::BTreeMap::new();
        for _ in 0..2000 {
            let key = rng.gen_range(0..500);
            if rng.gen_bool(0.6) {
                map.insert(key, key);
                shadow.insert(key, key);
            } else {
                assert_eq!(map.remove(&key), shadow.remove(&key));
            }
        }
        map.check();
        assert_eq!(map.len(), shadow.len());
        assert!(map.iter().map(|(k, _)| *k).eq(shadow.keys().copied()));
        for (i, key) in shadow.keys().enumerate() {
            assert_eq!(map.rank(key), i + 1);
        }
    }

    #[test]
    fn debug_formatting() {
        let mut map = SkipMap::new();
        map.extend([(2, "b"), (1, "a")]);
        assert_eq!(format!("{:?}", map), r#"{1: "a", 2: "b"}"#);
    }

    #[test]
    fn comparator_equality_decides_identity() {
        // Keys are compared only on their first component.
        let mut map =
            unsafe { SkipMap::with_comp(|a: &(i64, i64), b: &(i64, i64)| a.0.cmp(&b.0)) };
        map.insert((1, 100), "first");
        assert_eq!(map.insert((1, 200), "second"), Some("first"));
        assert_eq!(map.len(), 1);
        // The original key is retained on upsert.
        assert_eq!(map.iter().next(), Some((&(1, 100), &"second")));
    }
}
