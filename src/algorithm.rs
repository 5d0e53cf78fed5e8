//! Search primitives over generic cursors.
//!
//! A [`Cursor`] is a position in a sequence that can be read and moved
//! forward. The bounds searches only ever move forward from the start of the
//! range, so they work on forward-only cursors too, at linear rather than
//! logarithmic stepping cost.

/// A forward position in a sequence.
///
/// Two cursors compare equal when they denote the same position. A range is
/// a pair `first, last` where `last` is reachable from `first` by stepping;
/// `last` itself is never read.
pub trait Cursor: Clone + PartialEq {
    /// The element type this cursor reads.
    type Item: ?Sized;

    /// Reads the element at this position.
    ///
    /// Panics when called on the past-the-end position.
    fn get(&self) -> &Self::Item;

    /// Moves one position forward.
    fn step(&mut self);

    /// Moves `n` positions forward.
    ///
    /// The default steps `n` times; random-access cursors override it.
    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Number of steps from `self` to `last`.
    ///
    /// The default walks the range; random-access cursors override it.
    fn distance(&self, last: &Self) -> usize {
        let mut cursor = self.clone();
        let mut n = 0;
        while cursor != *last {
            cursor.step();
            n += 1;
        }
        n
    }
}

/// A random-access cursor into a slice.
#[derive(Debug)]
pub struct SliceCursor<'a, T> {
    slice: &'a [T],
    index: usize,
}

impl<'a, T> SliceCursor<'a, T> {
    /// Cursor at the first element of `slice`.
    pub fn begin(slice: &'a [T]) -> Self {
        Self { slice, index: 0 }
    }

    /// Cursor one past the last element of `slice`.
    pub fn end(slice: &'a [T]) -> Self {
        Self {
            slice,
            index: slice.len(),
        }
    }

    /// Index of this position within the slice.
    pub fn position(&self) -> usize {
        self.index
    }
}

impl<T> Clone for SliceCursor<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SliceCursor<'_, T> {}

impl<T> PartialEq for SliceCursor<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.slice.as_ptr(), other.slice.as_ptr()) && self.index == other.index
    }
}

impl<T> Cursor for SliceCursor<'_, T> {
    type Item = T;

    fn get(&self) -> &T {
        assert!(
            self.index < self.slice.len(),
            "dereferenced a past-the-end cursor"
        );
        &self.slice[self.index]
    }

    fn step(&mut self) {
        self.index += 1;
    }

    fn advance(&mut self, n: usize) {
        self.index += n;
    }

    fn distance(&self, last: &Self) -> usize {
        debug_assert!(core::ptr::eq(self.slice.as_ptr(), last.slice.as_ptr()));
        last.index - self.index
    }
}

/// Checks that `less` behaves as a strict ordering on `(a, b)`.
#[inline(always)]
fn debug_less<T: ?Sized>(less: &impl Fn(&T, &T) -> bool, a: &T, b: &T) -> bool {
    let result = less(a, b);
    debug_assert!(
        !(result && less(b, a)),
        "comparison predicate is not asymmetric"
    );
    result
}

#[cfg(debug_assertions)]
fn debug_check_ordering<C: Cursor>(first: &C, last: &C, less: &impl Fn(&C::Item, &C::Item) -> bool) {
    if first == last {
        return;
    }

    let mut prev = first.clone();
    let mut next = first.clone();
    next.step();
    while next != *last {
        assert!(
            !less(next.get(), prev.get()),
            "search range is not ordered by the predicate"
        );
        prev = next.clone();
        next.step();
    }
}

#[cfg(not(debug_assertions))]
#[inline(always)]
fn debug_check_ordering<C: Cursor>(_: &C, _: &C, _: &impl Fn(&C::Item, &C::Item) -> bool) {}

/// Returns the first position `p` in `[first, last)` with `!less(p, value)`.
///
/// This is the first position where `value` could be inserted while keeping
/// the range ordered, ahead of any run of equal elements. The range must
/// already be ordered by `less`; debug builds check this and panic otherwise.
///
/// # Examples
///
/// ```rust
/// # use open_hash::algorithm::{lower_bound, SliceCursor};
/// let data = [1, 3, 3, 3, 8];
/// let pos = lower_bound(
///     SliceCursor::begin(&data),
///     &SliceCursor::end(&data),
///     &3,
///     |a, b| a < b,
/// );
/// assert_eq!(pos.position(), 1);
/// ```
pub fn lower_bound<C, F>(mut first: C, last: &C, value: &C::Item, less: F) -> C
where
    C: Cursor,
    F: Fn(&C::Item, &C::Item) -> bool,
{
    debug_check_ordering(&first, last, &less);

    let mut dist = first.distance(last);
    while dist > 0 {
        let half = dist >> 1;
        let mut mid = first.clone();
        mid.advance(half);
        if debug_less(&less, mid.get(), value) {
            mid.step();
            first = mid;
            dist -= half + 1;
        } else {
            dist = half;
        }
    }

    first
}

/// Returns the first position `p` in `[first, last)` with `less(value, p)`,
/// i.e. the position just past every element equal to `value`.
///
/// Same ordering requirement as [`lower_bound`].
pub fn upper_bound<C, F>(mut first: C, last: &C, value: &C::Item, less: F) -> C
where
    C: Cursor,
    F: Fn(&C::Item, &C::Item) -> bool,
{
    debug_check_ordering(&first, last, &less);

    let mut dist = first.distance(last);
    while dist > 0 {
        let half = dist >> 1;
        let mut mid = first.clone();
        mid.advance(half);
        if !debug_less(&less, value, mid.get()) {
            mid.step();
            first = mid;
            dist -= half + 1;
        } else {
            dist = half;
        }
    }

    first
}

/// Linear scan for the first position whose element equals `value`.
///
/// Returns `last` when nothing matches.
pub fn find<C>(mut first: C, last: &C, value: &C::Item) -> C
where
    C: Cursor,
    C::Item: PartialEq,
{
    while first != *last {
        if first.get() == value {
            break;
        }
        first.step();
    }
    first
}

/// Linear scan for the first position `p` where `pred(p, value)` holds.
///
/// Returns `last` when nothing matches.
pub fn find_if<C, T, F>(mut first: C, last: &C, value: &T, pred: F) -> C
where
    C: Cursor,
    T: ?Sized,
    F: Fn(&C::Item, &T) -> bool,
{
    while first != *last {
        if pred(first.get(), value) {
            break;
        }
        first.step();
    }
    first
}
