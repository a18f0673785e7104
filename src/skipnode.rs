//! The node type shared by every structure in this crate.
//!
//! A node is a tower of links: level 0 participates in the full
//! doubly-linked chain of elements, and each level above it links to the
//! next node that reaches at least that high.  Alongside every forward
//! pointer the node stores a *span*: the number of level-0 steps that
//! pointer covers, counting the target node itself.  Spans are what turn
//! an ordinary skip list into an indexable one, as rank and
//! select-by-rank queries can add them up instead of walking the bottom
//! chain.

use std::ptr::NonNull;

/// A single slot in a node's tower: a forward pointer and the number of
/// level-0 steps it covers.  A span of 1 means the forward pointer
/// targets the immediate level-0 successor; a `None` forward pointer
/// carries the distance to the end of the list.
#[derive(Debug)]
pub struct Level<K, V> {
    pub forward: Option<NonNull<SkipNode<K, V>>>,
    pub span: usize,
}

/// A node in the list.
///
/// `key` and `value` are `None` only on the head sentinel, which exists
/// purely to originate the forward chains.  The head is never the target
/// of a forward or backward pointer, so any node reached by following
/// links is guaranteed to carry a key and value.
///
/// The owning list allocates nodes with `Box::into_raw` and is the only
/// thing that ever frees them; all pointers held here are non-owning.
#[derive(Debug)]
pub struct SkipNode<K, V> {
    pub key: Option<K>,
    pub value: Option<V>,
    /// The immediately previous node in the level-0 chain.  `None` on
    /// the head and on the first element.
    pub backward: Option<NonNull<SkipNode<K, V>>>,
    /// The tower.  Always at least one entry; entry `i` is the link at
    /// level `i`.
    pub levels: Vec<Level<K, V>>,
}

impl<K, V> SkipNode<K, V> {
    /// Create a head sentinel with a single, empty level.
    pub fn head() -> Self {
        SkipNode {
            key: None,
            value: None,
            backward: None,
            levels: vec![Level {
                forward: None,
                span: 0,
            }],
        }
    }

    /// Create a node reaching `level` (inclusive), so with `level + 1`
    /// tower slots.  Links start empty and must be spliced in by the
    /// caller.
    pub fn new(key: K, value: V, level: usize) -> Self {
        SkipNode {
            key: Some(key),
            value: Some(value),
            backward: None,
            levels: (0..=level)
                .map(|_| Level {
                    forward: None,
                    span: 0,
                })
                .collect(),
        }
    }

    /// The immediate level-0 successor.
    #[inline]
    pub fn next(&self) -> Option<NonNull<SkipNode<K, V>>> {
        self.levels[0].forward
    }

    /// Key of a live node.  Must not be called on the head sentinel.
    #[inline]
    pub fn key_unchecked(&self) -> &K {
        self.key.as_ref().expect("the head sentinel has no key")
    }

    /// Key and value of a live node.  Must not be called on the head
    /// sentinel.
    #[inline]
    pub fn entry(&self) -> (&K, &V) {
        (
            self.key.as_ref().expect("the head sentinel has no key"),
            self.value.as_ref().expect("the head sentinel has no value"),
        )
    }
}
