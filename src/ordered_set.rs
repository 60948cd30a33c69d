//! OrderedSet: a red-black tree with top-down recursive fix-up.
//!
//! Nodes are boxed and uniquely owned by their parent; there are no parent
//! pointers. Insertion and deletion each descend once and repair the tree on
//! the way back up, one level at a time, keyed on the direction taken.
//!
//! Mutations detach the root while they run, so protocol callbacks invoked
//! during a mutation must not touch the same set (debug builds panic if they
//! do).

use crate::error::InvariantViolation;
use crate::protocol::{ElementProtocol, Natural};
use crate::reentrancy::DebugReentrancy;
use core::cmp::Ordering;
use core::fmt;
use core::mem;

const LEFT: usize = 0;
const RIGHT: usize = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

type Link<T> = Option<Box<Node<T>>>;

struct Node<T> {
    data: T,
    child: [Link<T>; 2],
    color: Color,
}

impl<T> Node<T> {
    fn leaf(data: T) -> Box<Self> {
        Box::new(Node {
            data,
            child: [None, None],
            color: Color::Red,
        })
    }
}

fn is_red<T>(link: &Link<T>) -> bool {
    matches!(link, Some(n) if n.color == Color::Red)
}

/// Rotate `node` toward `dir`: its child on the other side becomes the
/// subtree root, takes `node`'s color, and `node` turns red.
fn rotate<T>(mut node: Box<Node<T>>, dir: usize) -> Box<Node<T>> {
    let mut top = node.child[1 - dir]
        .take()
        .expect("rotation requires a child opposite the rotation direction");
    node.child[1 - dir] = top.child[dir].take();
    top.color = node.color;
    node.color = Color::Red;
    top.child[dir] = Some(node);
    top
}

fn double_rotate<T>(mut node: Box<Node<T>>, dir: usize) -> Box<Node<T>> {
    let inner = node.child[1 - dir]
        .take()
        .expect("double rotation requires a child opposite the rotation direction");
    node.child[1 - dir] = Some(rotate(inner, 1 - dir));
    rotate(node, dir)
}

/// Insertion fix-up at `node` after descending toward `dir`.
fn fix_insert<T>(mut node: Box<Node<T>>, dir: usize) -> Box<Node<T>> {
    if !is_red(&node.child[dir]) {
        return node;
    }
    if is_red(&node.child[1 - dir]) {
        let child_has_red = node.child[dir]
            .as_ref()
            .map_or(false, |c| is_red(&c.child[LEFT]) || is_red(&c.child[RIGHT]));
        if child_has_red {
            node.color = Color::Red;
            for c in node.child.iter_mut().flatten() {
                c.color = Color::Black;
            }
        }
        return node;
    }
    let (outer_red, inner_red) = match node.child[dir].as_ref() {
        Some(c) => (is_red(&c.child[dir]), is_red(&c.child[1 - dir])),
        None => (false, false),
    };
    if outer_red {
        rotate(node, 1 - dir)
    } else if inner_red {
        double_rotate(node, 1 - dir)
    } else {
        node
    }
}

/// Deletion fix-up at `node` after its `dir` subtree lost one black level.
fn fix_remove<T>(node: Box<Node<T>>, dir: usize, balanced: &mut bool) -> Box<Node<T>> {
    if is_red(&node.child[1 - dir]) {
        let mut top = rotate(node, dir);
        let parent = top.child[dir]
            .take()
            .expect("rotated parent sits on the deletion side");
        top.child[dir] = Some(absorb_deficit(parent, dir, balanced));
        top
    } else {
        absorb_deficit(node, dir, balanced)
    }
}

/// Deficit handling once the sibling of the short side is black.
fn absorb_deficit<T>(mut parent: Box<Node<T>>, dir: usize, balanced: &mut bool) -> Box<Node<T>> {
    let nephews = match parent.child[1 - dir].as_ref() {
        Some(s) => (is_red(&s.child[dir]), is_red(&s.child[1 - dir])),
        None => return parent,
    };
    match nephews {
        (false, false) => {
            if parent.color == Color::Red {
                *balanced = true;
            }
            parent.color = Color::Black;
            if let Some(s) = parent.child[1 - dir].as_mut() {
                s.color = Color::Red;
            }
            parent
        }
        (_, far_red) => {
            let initial = parent.color;
            let mut top = if far_red {
                rotate(parent, dir)
            } else {
                double_rotate(parent, dir)
            };
            top.color = initial;
            for c in top.child.iter_mut().flatten() {
                c.color = Color::Black;
            }
            *balanced = true;
            top
        }
    }
}

fn maximum_of<T>(mut node: &Node<T>) -> &T {
    while let Some(next) = node.child[RIGHT].as_deref() {
        node = next;
    }
    &node.data
}

#[derive(Default)]
struct Removal {
    balanced: bool,
    removed: bool,
}

pub struct OrderedSet<T, P = Natural>
where
    P: ElementProtocol<T>,
{
    protocol: P,
    root: Link<T>,
    len: usize,
    reentrancy: DebugReentrancy,
}

impl<T> OrderedSet<T>
where
    Natural: ElementProtocol<T>,
{
    pub fn new() -> Self {
        Self::with_protocol(Natural::new())
    }
}

impl<T> Default for OrderedSet<T>
where
    Natural: ElementProtocol<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P> OrderedSet<T, P>
where
    P: ElementProtocol<T>,
{
    pub fn with_protocol(protocol: P) -> Self {
        Self {
            protocol,
            root: None,
            len: 0,
            reentrancy: DebugReentrancy::new(),
        }
    }

    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The stored copy equal to `x`, if any.
    pub fn find(&self, x: &T) -> Option<&T> {
        let _g = self.reentrancy.enter();
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            match self.protocol.compare(x, &node.data) {
                Ordering::Equal => return Some(&node.data),
                Ordering::Less => cur = node.child[LEFT].as_deref(),
                Ordering::Greater => cur = node.child[RIGHT].as_deref(),
            }
        }
        None
    }

    pub fn contains(&self, x: &T) -> bool {
        self.find(x).is_some()
    }

    pub fn minimum(&self) -> Option<&T> {
        let mut node = self.root.as_deref()?;
        while let Some(next) = node.child[LEFT].as_deref() {
            node = next;
        }
        Some(&node.data)
    }

    pub fn maximum(&self) -> Option<&T> {
        self.root.as_deref().map(maximum_of)
    }

    /// Store a copy of `x` unless an equal element is present. Returns
    /// whether the set changed.
    pub fn add(&mut self, x: &T) -> bool {
        let root = self.root.take();
        let mut inserted = false;
        let mut root = {
            let _g = self.reentrancy.enter();
            self.insert_at(root, x, &mut inserted)
        };
        root.color = Color::Black;
        self.root = Some(root);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    fn insert_at(&self, link: Link<T>, x: &T, inserted: &mut bool) -> Box<Node<T>> {
        let Some(mut node) = link else {
            *inserted = true;
            return Node::leaf(self.protocol.copy(x));
        };
        let dir = match self.protocol.compare(x, &node.data) {
            Ordering::Equal => return node,
            Ordering::Less => LEFT,
            Ordering::Greater => RIGHT,
        };
        let below = node.child[dir].take();
        node.child[dir] = Some(self.insert_at(below, x, inserted));
        fix_insert(node, dir)
    }

    /// Destroy the element equal to `x`. Returns whether one was present.
    pub fn remove(&mut self, x: &T) -> bool {
        let root = self.root.take();
        let mut state = Removal::default();
        self.root = {
            let _g = self.reentrancy.enter();
            self.remove_at(root, x, &mut state)
        };
        if let Some(root) = self.root.as_mut() {
            root.color = Color::Black;
        }
        if state.removed {
            self.len -= 1;
        }
        state.removed
    }

    fn remove_at(&self, link: Link<T>, x: &T, state: &mut Removal) -> Link<T> {
        let Some(mut node) = link else {
            state.balanced = true;
            return None;
        };
        let ord = self.protocol.compare(x, &node.data);
        let dir = if ord == Ordering::Equal {
            if node.child[LEFT].is_none() || node.child[RIGHT].is_none() {
                return self.splice(node, state);
            }
            // Two children: take over a copy of the predecessor, then delete
            // the predecessor from the left subtree.
            if let Some(left) = node.child[LEFT].as_deref() {
                let predecessor = self.protocol.copy(maximum_of(left));
                let old = mem::replace(&mut node.data, predecessor);
                self.protocol.destroy(old);
            }
            let Node { data, child, .. } = &mut *node;
            child[LEFT] = self.remove_at(child[LEFT].take(), data, state);
            LEFT
        } else {
            let dir = if ord == Ordering::Less { LEFT } else { RIGHT };
            node.child[dir] = self.remove_at(node.child[dir].take(), x, state);
            dir
        };
        if state.balanced {
            Some(node)
        } else {
            Some(fix_remove(node, dir, &mut state.balanced))
        }
    }

    /// Unlink a node with at most one child, returning its replacement.
    fn splice(&self, mut node: Box<Node<T>>, state: &mut Removal) -> Link<T> {
        let side = if node.child[LEFT].is_none() { RIGHT } else { LEFT };
        let mut replacement = node.child[side].take();
        if node.color == Color::Red {
            state.balanced = true;
        } else if let Some(r) = replacement.as_mut() {
            if r.color == Color::Red {
                r.color = Color::Black;
                state.balanced = true;
            }
        }
        state.removed = true;
        let Node { data, .. } = *node;
        self.protocol.destroy(data);
        replacement
    }

    /// Destroy every element.
    pub fn clear(&mut self) {
        let root = self.root.take();
        self.len = 0;
        let mut stack: Vec<Box<Node<T>>> = root.into_iter().collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(node.child.iter_mut().filter_map(Option::take));
            let Node { data, .. } = *node;
            self.protocol.destroy(data);
        }
    }

    /// In-order iteration.
    pub fn iter(&self) -> Iter<'_, T> {
        let mut it = Iter {
            stack: Vec::new(),
            remaining: self.len,
        };
        it.push_left(self.root.as_deref());
        it
    }

    /// Copy every element into a new set governed by `protocol`.
    pub fn clone_with<Q>(&self, protocol: Q) -> OrderedSet<T, Q>
    where
        Q: ElementProtocol<T>,
    {
        let mut clone = OrderedSet::with_protocol(protocol);
        for x in self.iter() {
            clone.add(x);
        }
        clone
    }

    /// `self ∪= other`.
    pub fn add_all<Q>(&mut self, other: &OrderedSet<T, Q>)
    where
        Q: ElementProtocol<T>,
    {
        for x in other.iter() {
            self.add(x);
        }
    }

    /// `self \= other`.
    pub fn remove_all<Q>(&mut self, other: &OrderedSet<T, Q>)
    where
        Q: ElementProtocol<T>,
    {
        for x in other.iter() {
            self.remove(x);
        }
    }

    /// A new set holding every element of either set, under `self`'s protocol.
    pub fn union<Q>(&self, other: &OrderedSet<T, Q>) -> Self
    where
        P: Clone,
        Q: ElementProtocol<T>,
    {
        let mut out = self.clone_with(self.protocol.clone());
        out.add_all(other);
        out
    }

    pub fn intersection<Q>(&self, other: &OrderedSet<T, Q>) -> Self
    where
        P: Clone,
        Q: ElementProtocol<T>,
    {
        let mut out = OrderedSet::with_protocol(self.protocol.clone());
        if self.len <= other.len() {
            for x in self.iter().filter(|x| other.contains(x)) {
                out.add(x);
            }
        } else {
            for x in other.iter().filter(|x| self.contains(x)) {
                out.add(x);
            }
        }
        out
    }

    /// `self \ other` as a new set.
    pub fn complement<Q>(&self, other: &OrderedSet<T, Q>) -> Self
    where
        P: Clone,
        Q: ElementProtocol<T>,
    {
        let mut out = OrderedSet::with_protocol(self.protocol.clone());
        for x in self.iter().filter(|x| !other.contains(x)) {
            out.add(x);
        }
        out
    }

    /// Whether `other ⊆ self`.
    pub fn subset<Q>(&self, other: &OrderedSet<T, Q>) -> bool
    where
        Q: ElementProtocol<T>,
    {
        other.len() <= self.len && other.iter().all(|x| self.contains(x))
    }

    pub fn equals<Q>(&self, other: &OrderedSet<T, Q>) -> bool
    where
        Q: ElementProtocol<T>,
    {
        self.len == other.len() && self.subset(other)
    }

    /// Total order over sets: smaller sets first, then element-wise in
    /// ascending order under `self`'s protocol.
    pub fn compare<Q>(&self, other: &OrderedSet<T, Q>) -> Ordering
    where
        Q: ElementProtocol<T>,
    {
        self.len.cmp(&other.len()).then_with(|| {
            self.iter()
                .zip(other.iter())
                .map(|(a, b)| self.protocol.compare(a, b))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
    }

    /// Check the red-black invariants, strict in-order ordering and the
    /// recorded length.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if is_red(&self.root) {
            return Err(InvariantViolation::RedRoot);
        }
        black_height(&self.root)?;
        let mut counted = 0;
        let mut prev: Option<&T> = None;
        for x in self.iter() {
            if let Some(p) = prev {
                if self.protocol.compare(p, x) != Ordering::Less {
                    return Err(InvariantViolation::Ordering);
                }
            }
            prev = Some(x);
            counted += 1;
        }
        if counted != self.len || count_nodes(&self.root) != self.len {
            return Err(InvariantViolation::LengthMismatch {
                recorded: self.len,
                counted: count_nodes(&self.root),
            });
        }
        Ok(())
    }
}

fn black_height<T>(link: &Link<T>) -> Result<usize, InvariantViolation> {
    let Some(node) = link else {
        return Ok(1);
    };
    if node.color == Color::Red && (is_red(&node.child[LEFT]) || is_red(&node.child[RIGHT])) {
        return Err(InvariantViolation::RedRed);
    }
    let left = black_height(&node.child[LEFT])?;
    let right = black_height(&node.child[RIGHT])?;
    if left != right {
        return Err(InvariantViolation::BlackHeight);
    }
    Ok(left + usize::from(node.color == Color::Black))
}

fn count_nodes<T>(link: &Link<T>) -> usize {
    link.as_ref().map_or(0, |n| {
        1 + count_nodes(&n.child[LEFT]) + count_nodes(&n.child[RIGHT])
    })
}

impl<T, P> Drop for OrderedSet<T, P>
where
    P: ElementProtocol<T>,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: fmt::Debug, P> fmt::Debug for OrderedSet<T, P>
where
    P: ElementProtocol<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// In-order iterator over an [`OrderedSet`].
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    fn push_left(&mut self, mut cur: Option<&'a Node<T>>) {
        while let Some(node) = cur {
            self.stack.push(node);
            cur = node.child[LEFT].as_deref();
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.child[RIGHT].as_deref());
        self.remaining -= 1;
        Some(&node.data)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<'a, T, P> IntoIterator for &'a OrderedSet<T, P>
where
    P: ElementProtocol<T>,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OrderBy;
    use std::cell::Cell;
    use std::rc::Rc;

    fn set_of(xs: &[i32]) -> OrderedSet<i32> {
        let mut s = OrderedSet::new();
        for x in xs {
            s.add(x);
        }
        s
    }

    fn contents<P: ElementProtocol<i32>>(s: &OrderedSet<i32, P>) -> Vec<i32> {
        s.iter().copied().collect()
    }

    /// Invariant: each insertion keeps the tree balanced and the traversal
    /// sorted.
    #[test]
    fn scenario_insert_sequence_stays_balanced() {
        let mut s = OrderedSet::new();
        for x in [10, 20, 30, 15, 25, 5, 1, 8, 12, 18] {
            assert!(s.add(&x));
            s.validate().unwrap();
        }
        assert_eq!(contents(&s), vec![1, 5, 8, 10, 12, 15, 18, 20, 25, 30]);
        assert_eq!(s.len(), 10);
    }

    /// Invariant: removing an internal node and a leaf keeps the tree valid.
    #[test]
    fn scenario_removals_stay_balanced() {
        let mut s = set_of(&[10, 20, 30, 15, 25, 5, 1, 8, 12, 18]);
        assert!(s.remove(&15));
        s.validate().unwrap();
        assert!(s.remove(&1));
        s.validate().unwrap();
        assert_eq!(contents(&s), vec![5, 8, 10, 12, 18, 20, 25, 30]);
        assert_eq!(s.len(), 8);
    }

    /// Invariant: duplicate adds and absent removals change nothing,
    /// including the length.
    #[test]
    fn duplicates_and_absent_removals_are_noops() {
        let mut s = set_of(&[3, 1, 2]);
        assert!(!s.add(&2));
        assert!(!s.remove(&7));
        assert_eq!(s.len(), 3);
        s.validate().unwrap();

        let mut empty: OrderedSet<i32> = OrderedSet::new();
        assert!(!empty.remove(&1));
        assert_eq!(empty.len(), 0);
    }

    #[test]
    fn min_max_find() {
        let s = set_of(&[4, -2, 9, 0]);
        assert_eq!(s.minimum(), Some(&-2));
        assert_eq!(s.maximum(), Some(&9));
        assert_eq!(s.find(&0), Some(&0));
        assert_eq!(s.find(&5), None);
        let empty: OrderedSet<i32> = OrderedSet::new();
        assert_eq!(empty.minimum(), None);
        assert_eq!(empty.maximum(), None);
    }

    /// Invariant: ascending and descending bulk loads, then draining from
    /// alternating ends, keep the tree valid throughout.
    #[test]
    fn monotone_loads_and_drains() {
        let mut s = OrderedSet::new();
        for x in 0..200 {
            s.add(&x);
        }
        for x in (200..400).rev() {
            s.add(&x);
        }
        s.validate().unwrap();
        let mut lo = 0;
        let mut hi = 399;
        while lo <= hi {
            assert!(s.remove(&lo));
            s.validate().unwrap();
            if lo != hi {
                assert!(s.remove(&hi));
                s.validate().unwrap();
            }
            lo += 1;
            hi -= 1;
        }
        assert!(s.is_empty());
    }

    #[test]
    fn set_algebra() {
        let a = set_of(&[1, 2, 3, 4]);
        let b = set_of(&[3, 4, 5]);
        assert_eq!(contents(&a.union(&b)), vec![1, 2, 3, 4, 5]);
        assert_eq!(contents(&a.intersection(&b)), vec![3, 4]);
        assert_eq!(contents(&a.complement(&b)), vec![1, 2]);
        assert_eq!(contents(&b.complement(&a)), vec![5]);
        assert!(a.union(&b).subset(&a));
        assert!(!a.subset(&b));
        assert!(a.subset(&set_of(&[])));
        assert!(a.equals(&set_of(&[4, 3, 2, 1])));
        assert!(!a.equals(&b));
    }

    /// Invariant: a larger set is never a subset of a smaller one.
    #[test]
    fn subset_rejects_larger_other() {
        let small = set_of(&[1, 2]);
        let big = set_of(&[1, 2, 3]);
        assert!(!small.subset(&big));
        assert!(big.subset(&small));
    }

    #[test]
    fn in_place_union_and_difference() {
        let mut a = set_of(&[1, 2, 3]);
        a.add_all(&set_of(&[3, 4]));
        assert_eq!(contents(&a), vec![1, 2, 3, 4]);
        a.remove_all(&set_of(&[1, 4, 9]));
        assert_eq!(contents(&a), vec![2, 3]);
        a.validate().unwrap();
    }

    #[test]
    fn compare_orders_by_size_then_elements() {
        assert_eq!(set_of(&[9]).compare(&set_of(&[1, 2])), Ordering::Less);
        assert_eq!(set_of(&[1, 3]).compare(&set_of(&[1, 2])), Ordering::Greater);
        assert_eq!(set_of(&[2, 1]).compare(&set_of(&[1, 2])), Ordering::Equal);
    }

    /// Invariant: clones are rebuilt under the new protocol's ordering.
    #[test]
    fn clone_with_reorders_under_new_protocol() {
        let s = set_of(&[1, 2, 3]);
        let rev = s.clone_with(OrderBy::new(|a: &i32, b: &i32| b.cmp(a)));
        assert_eq!(contents(&rev), vec![3, 2, 1]);
        rev.validate().unwrap();
        assert_eq!(contents(&s), vec![1, 2, 3]);
    }

    #[derive(Clone, Default)]
    struct Counting {
        copies: Rc<Cell<usize>>,
        destroys: Rc<Cell<usize>>,
    }

    impl ElementProtocol<i32> for Counting {
        fn create_default(&self) -> i32 {
            0
        }
        fn copy(&self, elem: &i32) -> i32 {
            self.copies.set(self.copies.get() + 1);
            *elem
        }
        fn compare(&self, a: &i32, b: &i32) -> Ordering {
            a.cmp(b)
        }
        fn hash(&self, elem: &i32) -> u64 {
            *elem as u64
        }
        fn destroy(&self, _elem: i32) {
            self.destroys.set(self.destroys.get() + 1);
        }
    }

    /// Invariant: every stored copy is destroyed exactly once, including the
    /// copies made when an internal node takes over its predecessor.
    #[test]
    fn every_copy_destroyed_once() {
        let p = Counting::default();
        {
            let mut s = OrderedSet::with_protocol(p.clone());
            for x in 0..64 {
                s.add(&x);
            }
            s.add(&10);
            for x in (0..64).step_by(3) {
                s.remove(&x);
            }
            assert_eq!(p.copies.get() - p.destroys.get(), s.len());
            s.clear();
            assert_eq!(p.copies.get(), p.destroys.get());
            for x in 0..8 {
                s.add(&x);
            }
        }
        assert_eq!(p.copies.get(), p.destroys.get());
    }

    #[test]
    fn iter_is_exact_and_restartable() {
        let s = set_of(&[5, 3, 8]);
        let it = s.iter();
        assert_eq!(it.len(), 3);
        assert_eq!(s.iter().count(), 3);
        assert_eq!(contents(&s), contents(&s));
        assert_eq!(format!("{:?}", s), "{3, 5, 8}");
    }
}
