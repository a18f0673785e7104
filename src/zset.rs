//! A Redis-style sorted set over the indexable skip map.
//!
//! A [`ZSet`] maps an application key to a score and keeps the keys
//! ordered by score, with ties broken by insertion order.  It is a dual
//! index: a hash map gives `O(1)` key-to-score lookups, while the skip
//! map gives expected-logarithmic rank queries, range-by-rank and
//! range-by-score.
//!
//! Internally every live key is represented by a *score cell*: the
//! score paired with a monotonically increasing tiebreaker.  The cell
//! is the engine key, shared between both indexes, so two entries with
//! equal scores still have a total order, and the order is the order in
//! which they were (re)inserted.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use ahash::AHashMap;

use crate::skipmap::SkipMap;

/// At most this many retired cells are kept for reuse.
const POOL_CAPACITY: usize = 128;

// ////////////////////////////////////////////////////////////////////////////
// Score cells
// ////////////////////////////////////////////////////////////////////////////

/// The engine key of a sorted-set entry: the score plus a tiebreaker
/// unique among live cells.
struct ScoreCell<S> {
    score: S,
    count: i64,
}

/// A bounded pool of retired score cells.
///
/// The pool owns the tiebreaker counter.  Every acquisition, whether it
/// reuses an allocation or not, increments the counter and stamps the
/// cell with it, so tiebreakers are unique and monotonically increasing
/// across the life of the set.  The counter is never reset while the
/// set is alive.
struct CellPool<S> {
    free: VecDeque<Rc<ScoreCell<S>>>,
    counter: i64,
}

impl<S> CellPool<S> {
    fn new() -> Self {
        CellPool {
            free: VecDeque::with_capacity(POOL_CAPACITY),
            counter: 0,
        }
    }

    /// Acquire a cell for `score` with a fresh tiebreaker.
    fn get(&mut self, score: S) -> Rc<ScoreCell<S>> {
        // Keeping the counter below i64::MAX keeps the sentinel used by
        // range-by-score strictly above every live tiebreaker.
        assert!(self.counter < i64::MAX, "score cell tiebreaker exhausted");
        self.counter += 1;
        let count = self.counter;
        if let Some(mut cell) = self.free.pop_front() {
            if let Some(slot) = Rc::get_mut(&mut cell) {
                slot.score = score;
                slot.count = count;
                return cell;
            }
        }
        Rc::new(ScoreCell { score, count })
    }

    /// Retire a cell, keeping it for reuse if there is room.
    fn put(&mut self, cell: Rc<ScoreCell<S>>) {
        if self.free.len() < POOL_CAPACITY {
            self.free.push_back(cell);
        }
    }
}

// ////////////////////////////////////////////////////////////////////////////
// ZSet
// ////////////////////////////////////////////////////////////////////////////

/// A sorted set: every key carries a score, and keys are ordered by
/// (score, insertion order).
///
/// Lookup of a key's score or rank, insertion, score updates and
/// removal are all `O(1)` or expected `O(log n)`; range queries cost
/// the same plus the size of their output.
///
/// Like the map it is built on, a `ZSet` is a single-threaded
/// structure.
///
/// # Examples
///
/// ```
/// use zskip::ZSet;
///
/// let mut board: ZSet<&str, i64> = ZSet::new();
/// board.add("alice", 1500);
/// board.add("bob", 900);
/// board.add("carol", 2100);
///
/// assert_eq!(board.rank(&"bob"), 1);
/// assert_eq!(board.rank(&"carol"), 3);
///
/// board.update(&"bob", 2500);
/// assert_eq!(board.rank(&"bob"), 3);
/// ```
pub struct ZSet<K, S> {
    /// Key-to-cell index; the authoritative membership record.
    scores: AHashMap<K, Rc<ScoreCell<S>>>,
    /// Score-ordered index; engine keys are the shared cells, engine
    /// values the application keys.
    list: SkipMap<Rc<ScoreCell<S>>, K>,
    pool: CellPool<S>,
    score_cmp: Rc<dyn Fn(&S, &S) -> Ordering>,
}

impl<K, S> ZSet<K, S>
where
    K: Hash + Eq + Clone,
    S: Ord + 'static,
{
    /// Create a new sorted set ordered by the score type's `Ord`
    /// implementation.
    #[inline]
    pub fn new() -> Self {
        Self::with_comp(|a: &S, b: &S| a.cmp(b))
    }
}

impl<K, S> ZSet<K, S>
where
    K: Hash + Eq + Clone,
    S: 'static,
{
    /// Create a new sorted set using the provided function to order
    /// scores.
    ///
    /// The function must be a total order over all scores; in return,
    /// keys with equal scores are kept in insertion order.  Unlike the
    /// raw map constructors this is safe: the tiebreaker turns any
    /// well-behaved score order into a strict total order over entries,
    /// and an ill-behaved one yields wrong query results, nothing
    /// worse.
    pub fn with_comp<F>(score_cmp: F) -> Self
    where
        F: Fn(&S, &S) -> Ordering + 'static,
    {
        let score_cmp: Rc<dyn Fn(&S, &S) -> Ordering> = Rc::new(score_cmp);
        let cell_cmp = Rc::clone(&score_cmp);
        // SAFETY: cells are ordered by (score, tiebreaker); distinct
        // live cells always have distinct tiebreakers, so this is a
        // total order whenever `score_cmp` is consistent.
        let list = unsafe {
            SkipMap::with_comp(move |l: &Rc<ScoreCell<S>>, r: &Rc<ScoreCell<S>>| {
                cell_cmp(&l.score, &r.score).then_with(|| l.count.cmp(&r.count))
            })
        };
        ZSet {
            scores: AHashMap::new(),
            list,
            pool: CellPool::new(),
            score_cmp,
        }
    }

    /// Insert `key` with `score`, or move an existing key to `score`.
    ///
    /// When the key is already present with an equal score this is a
    /// no-op and the key keeps its position among its score peers.
    /// Otherwise the key is (re)inserted and ordered after any existing
    /// entries with an equal score.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::ZSet;
    ///
    /// let mut set: ZSet<&str, i64> = ZSet::new();
    /// set.add("foo", 12);
    /// set.add("bar", 12);
    /// // Same score: insertion order decides.
    /// assert_eq!(set.rank(&"foo"), 1);
    /// assert_eq!(set.rank(&"bar"), 2);
    /// ```
    pub fn add(&mut self, key: K, score: S) {
        if self.holds_score(&key, &score) {
            return;
        }
        if let Some(old) = self.scores.remove(&key) {
            self.list.remove(&old);
            self.pool.put(old);
        }
        let cell = self.pool.get(score);
        self.scores.insert(key.clone(), Rc::clone(&cell));
        self.list.insert(cell, key);
    }

    /// Move an existing key to `score`.  Returns `false` if the key is
    /// absent; a `ZSet` never inserts through `update`.
    pub fn update(&mut self, key: &K, score: S) -> bool {
        if !self.scores.contains_key(key) {
            return false;
        }
        if !self.holds_score(key, &score) {
            if let Some(old) = self.scores.remove(key) {
                self.list.remove(&old);
                self.pool.put(old);
            }
            let cell = self.pool.get(score);
            self.scores.insert(key.clone(), Rc::clone(&cell));
            self.list.insert(cell, key.clone());
        }
        true
    }

    /// Remove `key`, returning `true` if it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.scores.remove(key) {
            Some(cell) => {
                self.list.remove(&cell);
                self.pool.put(cell);
                true
            }
            None => false,
        }
    }

    /// Returns the 1-based rank of `key` in (score, insertion) order,
    /// or 0 if the key is absent.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::ZSet;
    ///
    /// let mut set: ZSet<&str, i64> = ZSet::new();
    /// set.add("a", 10);
    /// set.add("b", 5);
    /// assert_eq!(set.rank(&"a"), 2);
    /// assert_eq!(set.rank(&"missing"), 0);
    /// ```
    #[inline]
    pub fn rank(&self, key: &K) -> usize {
        self.scores.get(key).map_or(0, |cell| self.list.rank(cell))
    }

    /// Returns the current score of `key`, or `None` if it is absent.
    #[inline]
    pub fn score(&self, key: &K) -> Option<&S> {
        self.scores.get(key).map(|cell| &cell.score)
    }

    /// Returns `true` if the set contains `key`.
    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.scores.contains_key(key)
    }

    /// Returns the number of keys in the set.
    #[inline]
    pub fn card(&self) -> usize {
        self.scores.len()
    }

    /// Returns `true` if the set contains no keys.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Remove every key.
    pub fn clear(&mut self) {
        self.scores.clear();
        self.list.clear();
    }

    /// Call `f` with every (key, score) pair in ascending (score,
    /// insertion) order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &S),
    {
        for (cell, key) in self.list.iter() {
            f(key, &cell.score);
        }
    }
}

impl<K, S> ZSet<K, S>
where
    K: Hash + Eq + Clone,
    S: Clone,
{
    /// Returns the (key, score) pairs with 1-based ranks in `[from,
    /// to]`, both inclusive.
    ///
    /// `to` is clamped to the cardinality; an inverted or out-of-range
    /// window yields an empty vector.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::ZSet;
    ///
    /// let mut set: ZSet<&str, i64> = ZSet::new();
    /// set.add("a", 1);
    /// set.add("b", 2);
    /// set.add("c", 3);
    /// assert_eq!(set.range_by_rank(2, 100), vec![("b", 2), ("c", 3)]);
    /// assert!(set.range_by_rank(3, 2).is_empty());
    /// ```
    pub fn range_by_rank(&self, from: usize, to: usize) -> Vec<(K, S)> {
        let to = to.min(self.list.len());
        if to < from {
            return Vec::new();
        }
        let Some(mut cursor) = self.list.cursor_at_rank(from) else {
            return Vec::new();
        };
        let mut pairs = Vec::with_capacity(to - from + 1);
        let mut entry = cursor.key().zip(cursor.value());
        while let Some((cell, key)) = entry {
            pairs.push((key.clone(), cell.score.clone()));
            if pairs.len() == to - from + 1 {
                break;
            }
            entry = cursor.next();
        }
        pairs
    }

    /// Returns the keys whose scores lie in `[from, to]`, both
    /// inclusive, in ascending (score, insertion) order.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::ZSet;
    ///
    /// let mut set: ZSet<&str, i64> = ZSet::new();
    /// set.add("a", 1);
    /// set.add("b", 2);
    /// set.add("c", 3);
    /// assert_eq!(set.range_by_score(&2, &3), vec!["b", "c"]);
    /// ```
    pub fn range_by_score(&self, from: &S, to: &S) -> Vec<K> {
        // Synthetic bounds: tiebreaker 0 sorts before every live cell
        // with score `from`, and the i64::MAX sentinel after every live
        // cell with score `to` (the pool never issues it).
        let lower = Rc::new(ScoreCell {
            score: from.clone(),
            count: 0,
        });
        let upper = Rc::new(ScoreCell {
            score: to.clone(),
            count: i64::MAX,
        });
        let mut cursor = self.list.range(lower, upper);
        let mut keys = Vec::new();
        while let Some((_, key)) = cursor.next() {
            keys.push(key.clone());
        }
        keys
    }

    /// Returns every (key, score) pair in ascending (score, insertion)
    /// order.  The result can be fed back through [`ZSet::load`].
    pub fn snapshot(&self) -> Vec<(K, S)> {
        self.list
            .iter()
            .map(|(cell, key)| (key.clone(), cell.score.clone()))
            .collect()
    }

    /// Fill an empty set from (key, score) pairs sorted ascending by
    /// score, preserving the input order among equal scores.
    ///
    /// Each pair is stamped with a fresh tiebreaker in sequence order
    /// and the engine is bulk-filled in `O(n)`.
    ///
    /// # Panics
    ///
    /// Panics if the set is not empty, or if the scores are not
    /// ascending under the set's score order.
    ///
    /// # Examples
    ///
    /// ```
    /// use zskip::ZSet;
    ///
    /// let mut set: ZSet<String, i64> = ZSet::new();
    /// set.add("a".to_string(), 1);
    /// set.add("b".to_string(), 2);
    ///
    /// let saved = set.snapshot();
    /// set.clear();
    /// set.load(saved);
    /// assert_eq!(set.rank(&"b".to_string()), 2);
    /// ```
    pub fn load<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, S)>,
    {
        assert!(self.scores.is_empty(), "can only load an empty sorted set");
        let entries = entries.into_iter();
        let mut pairs = Vec::with_capacity(entries.size_hint().0);
        for (key, score) in entries {
            let cell = self.pool.get(score);
            self.scores.insert(key.clone(), Rc::clone(&cell));
            pairs.push((cell, key));
        }
        // Monotonic tiebreakers make the cells strictly ascending iff
        // the scores were; fill_sorted enforces it.
        self.list.fill_sorted(pairs);
    }
}

// ///////////////////////////////////////////////
// Internal methods
// ///////////////////////////////////////////////

impl<K, S> ZSet<K, S>
where
    K: Hash + Eq + Clone,
{
    /// Whether `key` is present with a score equal to `score` under the
    /// set's score order.
    fn holds_score(&self, key: &K, score: &S) -> bool {
        self.scores
            .get(key)
            .is_some_and(|cell| (self.score_cmp)(&cell.score, score) == Ordering::Equal)
    }
}

// ///////////////////////////////////////////////
// Trait implementations
// ///////////////////////////////////////////////

impl<K, S> Default for ZSet<K, S>
where
    K: Hash + Eq + Clone,
    S: Ord + 'static,
{
    fn default() -> Self {
        ZSet::new()
    }
}

impl<K, S> fmt::Debug for ZSet<K, S>
where
    K: fmt::Debug,
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (cell, key)) in self.list.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {:?}", key, cell.score)?;
        }
        write!(f, "}}")
    }
}

// ////////////////////////////////////////////////////////////////////////////
// Tests
// ////////////////////////////////////////////////////////////////////////////
