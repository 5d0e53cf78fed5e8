//! A growable array over an [`Allocator`].
//!
//! [`Vector`] keeps its storage as raw memory and drives element lifetimes
//! through [`crate::lifetime`], so bulk operations on [`TypeTraits`] types
//! turn into block copies and fills.

use core::alloc::Layout;
use core::fmt::Debug;
use core::marker::PhantomData;
use core::mem;
use core::ops::Deref;
use core::ops::DerefMut;
use core::ops::Range;
use core::ptr;
use core::ptr::NonNull;
use core::slice;

use crate::algorithm;
use crate::algorithm::SliceCursor;
use crate::allocator::Allocator;
use crate::allocator::Heap;
use crate::error::Fallibility;
use crate::error::TryReserveError;
use crate::lifetime;
use crate::lifetime::TypeTraits;

/// Capacity of the first allocation made by a growing push.
pub const INITIAL_CAPACITY: usize = 16;

#[inline(always)]
const fn is_zst<T>() -> bool {
    mem::size_of::<T>() == 0
}

/// A contiguous growable array.
///
/// Growth doubles the capacity, or jumps straight to the required size when
/// doubling is not enough. The first allocation holds
/// [`INITIAL_CAPACITY`] elements.
///
/// Copying operations ([`extend_from_slice`](Vector::extend_from_slice),
/// [`assign`](Vector::assign), [`Clone`]) require [`TypeTraits`] on the
/// element type.
///
/// # Examples
///
/// ```rust
/// use open_hash::Vector;
///
/// let mut v: Vector<u32> = Vector::new();
/// v.push(3);
/// v.extend_from_slice(&[5, 8]);
/// v.insert(0, 1);
///
/// assert_eq!(&v[..], &[1, 3, 5, 8]);
/// assert_eq!(v.capacity(), 16);
/// assert_eq!(v.index_of(&5), Some(2));
/// ```
pub struct Vector<T, A: Allocator = Heap> {
    ptr: NonNull<T>,
    capacity: usize,
    len: usize,
    alloc: A,
    _phantom: PhantomData<T>,
}

// SAFETY: The vector owns its elements.
unsafe impl<T: Send, A: Allocator + Send> Send for Vector<T, A> {}
// SAFETY: See above.
unsafe impl<T: Sync, A: Allocator + Sync> Sync for Vector<T, A> {}

impl<T> Vector<T, Heap> {
    /// Creates an empty vector without allocating.
    pub const fn new() -> Self {
        Self::new_in(Heap)
    }

    /// Creates an empty vector with room for exactly `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Heap)
    }

    /// Creates a vector holding clones of `items`.
    pub fn from_slice(items: &[T]) -> Self
    where
        T: TypeTraits + Clone,
    {
        Self::from_slice_in(items, Heap)
    }
}

impl<T, A: Allocator> Vector<T, A> {
    /// Creates an empty vector backed by `alloc`.
    pub const fn new_in(alloc: A) -> Self {
        Self {
            ptr: NonNull::dangling(),
            capacity: 0,
            len: 0,
            alloc,
            _phantom: PhantomData,
        }
    }

    /// Creates an empty vector backed by `alloc` with room for exactly
    /// `capacity` elements.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        let mut vector = Self::new_in(alloc);
        vector.set_capacity(capacity);
        vector
    }

    /// Creates a vector backed by `alloc` holding clones of `items`.
    pub fn from_slice_in(items: &[T], alloc: A) -> Self
    where
        T: TypeTraits + Clone,
    {
        let mut vector = Self::with_capacity_in(items.len(), alloc);
        vector.extend_from_slice(items);
        vector
    }

    /// The allocator backing this vector.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the vector holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the storage holds without reallocating.
    pub fn capacity(&self) -> usize {
        if is_zst::<T>() {
            usize::MAX
        } else {
            self.capacity
        }
    }

    /// The live elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: The first `len` slots are live.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The live elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: The first `len` slots are live.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Raw pointer to the first slot.
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Raw mutable pointer to the first slot.
    #[inline(always)]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Moves the live elements into a block of exactly `new_capacity` slots.
    fn realloc(
        &mut self,
        new_capacity: usize,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        debug_assert!(new_capacity >= self.len);
        if is_zst::<T>() || new_capacity == self.capacity {
            return Ok(());
        }

        let new_ptr = if new_capacity == 0 {
            NonNull::dangling()
        } else {
            let layout = Layout::array::<T>(new_capacity)
                .map_err(|_| fallibility.capacity_overflow())?;
            let ptr = self
                .alloc
                .allocate(layout)
                .map_err(|_| fallibility.alloc_err(layout))?
                .cast::<T>();
            // SAFETY: The fresh block has room for `len` elements and cannot
            // overlap the old one. The old copies are never read again.
            unsafe { lifetime::move_construct_n(self.ptr.as_ptr(), self.len, ptr.as_ptr()) };
            ptr
        };

        self.free_buffer();
        self.ptr = new_ptr;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Returns the storage block to the allocator without touching elements.
    fn free_buffer(&mut self) {
        if is_zst::<T>() || self.capacity == 0 {
            return;
        }
        if let Ok(layout) = Layout::array::<T>(self.capacity) {
            // SAFETY: The block came from `self.alloc` with this layout.
            unsafe { self.alloc.deallocate(self.ptr.cast(), layout) };
        }
        self.ptr = NonNull::dangling();
        self.capacity = 0;
    }

    fn reserve_inner(
        &mut self,
        additional: usize,
        fallibility: Fallibility,
    ) -> Result<(), TryReserveError> {
        let Some(required) = self.len.checked_add(additional) else {
            return Err(fallibility.capacity_overflow());
        };
        if required <= self.capacity() {
            return Ok(());
        }

        let doubled = if self.capacity == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity.saturating_mul(2)
        };
        self.realloc(required.max(doubled), fallibility)
    }

    /// Reserves room for at least `additional` more elements.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows, and aborts through
    /// [`alloc::alloc::handle_alloc_error`] if the allocator fails.
    pub fn reserve(&mut self, additional: usize) {
        let _ = self.reserve_inner(additional, Fallibility::Abort);
    }

    /// Fallible version of [`reserve`](Vector::reserve).
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.reserve_inner(additional, Fallibility::Return)
    }

    /// Reallocates to exactly `new_capacity` slots.
    ///
    /// Elements past `new_capacity` are dropped first. A capacity of zero
    /// frees the storage.
    pub fn set_capacity(&mut self, new_capacity: usize) {
        self.truncate(new_capacity);
        let _ = self.realloc(new_capacity, Fallibility::Abort);
    }

    /// Shrinks the storage to the number of live elements.
    pub fn shrink_to_fit(&mut self) {
        self.set_capacity(self.len);
    }

    /// Appends `value`.
    pub fn push(&mut self, value: T) {
        if self.len == self.capacity() {
            self.reserve(1);
        }
        // SAFETY: Slot `len` is inside the storage and uninitialized.
        unsafe { self.as_mut_ptr().add(self.len).write(value) };
        self.len += 1;
    }

    /// Appends `T::default()` and returns a reference to it.
    pub fn push_default(&mut self) -> &mut T
    where
        T: Default,
    {
        if self.len == self.capacity() {
            self.reserve(1);
        }
        let index = self.len;
        // SAFETY: Slot `index` is inside the storage and uninitialized.
        unsafe { lifetime::construct(self.as_mut_ptr().add(index)) };
        self.len += 1;
        &mut self.as_mut_slice()[index]
    }

    /// Removes and returns the last element.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: Slot `len` was live and is now outside the live range.
        Some(unsafe { self.as_mut_ptr().add(self.len).read() })
    }

    /// Inserts `value` at `index`, shifting later elements up.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) {
        assert!(
            index <= self.len,
            "insertion index (is {index}) should be <= len (is {})",
            self.len
        );
        if self.len == self.capacity() {
            self.reserve(1);
        }
        // SAFETY: There is room for one more element; the tail shift stays in
        // bounds.
        unsafe {
            let slot = self.as_mut_ptr().add(index);
            ptr::copy(slot, slot.add(1), self.len - index);
            slot.write(value);
        }
        self.len += 1;
    }

    /// Inserts `count` clones of `value` at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert_n(&mut self, index: usize, count: usize, value: &T)
    where
        T: TypeTraits + Clone,
    {
        assert!(
            index <= self.len,
            "insertion index (is {index}) should be <= len (is {})",
            self.len
        );
        if count == 0 {
            return;
        }
        self.reserve(count);

        let len = self.len;
        // A panicking clone leaks the shifted tail instead of dropping it twice.
        self.len = index;
        // SAFETY: `reserve` made room for `count` more elements. The gap left
        // by the shift is uninitialized and gets filled.
        unsafe {
            let slot = self.as_mut_ptr().add(index);
            ptr::copy(slot, slot.add(count), len - index);
            lifetime::fill_construct_n(slot, count, value);
        }
        self.len = len + count;
    }

    /// Removes and returns the element at `index`, shifting later elements
    /// down.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn remove(&mut self, index: usize) -> T {
        assert!(
            index < self.len,
            "removal index (is {index}) should be < len (is {})",
            self.len
        );
        // SAFETY: `index` is live. The tail shift stays inside the live range.
        unsafe {
            let slot = self.as_mut_ptr().add(index);
            let value = slot.read();
            ptr::copy(slot.add(1), slot, self.len - index - 1);
            self.len -= 1;
            value
        }
    }

    /// Removes the elements in `range`, shifting later elements down.
    ///
    /// # Panics
    ///
    /// Panics if the range is decreasing or ends past `len`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use open_hash::Vector;
    /// let mut v: Vector<i32> = (0..8).collect();
    /// v.erase_range(2..5);
    /// assert_eq!(&v[..], &[0, 1, 5, 6, 7]);
    /// ```
    pub fn erase_range(&mut self, range: Range<usize>) {
        let Range { start, end } = range;
        assert!(
            start <= end && end <= self.len,
            "range {start}..{end} out of bounds for length {}",
            self.len
        );
        if start == end {
            return;
        }

        let len = self.len;
        let new_len = len - (end - start);
        self.len = start;
        let base = self.as_mut_ptr();
        // SAFETY: `move_n` drops the removed elements it overwrites. Any
        // removed elements left beyond the moved tail are dropped by hand.
        unsafe {
            lifetime::move_n(base.add(end), len - end, base.add(start));
            lifetime::destruct_n(base.add(new_len), end.saturating_sub(new_len));
        }
        self.len = new_len;
    }

    /// Removes the element at `index` by moving the last element into its
    /// place. Does not preserve order.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn swap_remove(&mut self, index: usize) -> T {
        assert!(
            index < self.len,
            "swap_remove index (is {index}) should be < len (is {})",
            self.len
        );
        let last = self.len - 1;
        // SAFETY: Both `index` and `last` are live; the last slot is vacated.
        unsafe {
            let base = self.as_mut_ptr();
            let value = base.add(index).read();
            if index != last {
                ptr::copy_nonoverlapping(base.add(last), base.add(index), 1);
            }
            self.len = last;
            value
        }
    }

    /// Resizes to `new_len`, default-constructing new elements or dropping
    /// the excess.
    pub fn resize(&mut self, new_len: usize)
    where
        T: TypeTraits + Default,
    {
        if new_len <= self.len {
            self.truncate(new_len);
            return;
        }
        let extra = new_len - self.len;
        self.reserve(extra);
        // SAFETY: `reserve` made room for `extra` uninitialized slots.
        unsafe { lifetime::construct_n(self.as_mut_ptr().add(self.len), extra) };
        self.len = new_len;
    }

    /// Drops every element past `new_len`. Capacity is unchanged.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len >= self.len {
            return;
        }
        let tail = self.len - new_len;
        self.len = new_len;
        // SAFETY: The tail was live and is now outside the live range.
        unsafe { lifetime::destruct_n(self.as_mut_ptr().add(new_len), tail) };
    }

    /// Drops every element. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Replaces the contents with clones of `items`, reusing live elements
    /// through `clone_from`.
    pub fn assign(&mut self, items: &[T])
    where
        T: TypeTraits + Clone,
    {
        let common = self.len.min(items.len());
        // SAFETY: Both ranges hold `common` live elements and cannot overlap,
        // since `items` is borrowed while `self` is borrowed mutably.
        unsafe { lifetime::copy_n(items.as_ptr(), common, self.as_mut_ptr()) };
        if items.len() > common {
            self.extend_from_slice(&items[common..]);
        } else {
            self.truncate(common);
        }
    }

    /// Appends clones of `items`.
    pub fn extend_from_slice(&mut self, items: &[T])
    where
        T: TypeTraits + Clone,
    {
        self.reserve(items.len());
        // SAFETY: `reserve` made room; the new slots are uninitialized.
        unsafe {
            lifetime::copy_construct_n(
                items.as_ptr(),
                items.len(),
                self.as_mut_ptr().add(self.len),
            )
        };
        self.len += items.len();
    }

    /// Assigns clones of the elements in `src` over the elements starting at
    /// `dest`. The two ranges may overlap.
    ///
    /// # Panics
    ///
    /// Panics if either range is out of bounds.
    pub fn copy_within(&mut self, src: Range<usize>, dest: usize)
    where
        T: TypeTraits + Clone,
    {
        let Range { start, end } = src;
        assert!(
            start <= end && end <= self.len,
            "range {start}..{end} out of bounds for length {}",
            self.len
        );
        let count = end - start;
        assert!(dest <= self.len - count, "destination {dest} out of bounds");
        if count == 0 || dest == start {
            return;
        }

        if dest + count <= start || end <= dest {
            let base = self.as_mut_ptr();
            // SAFETY: Both ranges are live and disjoint.
            unsafe { lifetime::copy_n(base.add(start), count, base.add(dest)) };
        } else if dest < start {
            for i in 0..count {
                let value = self[start + i].clone();
                self[dest + i] = value;
            }
        } else {
            for i in (0..count).rev() {
                let value = self[start + i].clone();
                self[dest + i] = value;
            }
        }
    }

    /// Index of the first element equal to `value`.
    pub fn index_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        let last = SliceCursor::end(self.as_slice());
        let found = algorithm::find(SliceCursor::begin(self.as_slice()), &last, value);
        (found != last).then(|| found.position())
    }

    /// The first element equal to `value`.
    pub fn find(&self, value: &T) -> Option<&T>
    where
        T: PartialEq,
    {
        self.index_of(value).map(|index| &self.as_slice()[index])
    }

    /// First index whose element is not less than `value`. The elements must
    /// be sorted.
    pub fn lower_bound(&self, value: &T) -> usize
    where
        T: Ord,
    {
        algorithm::lower_bound(
            SliceCursor::begin(self.as_slice()),
            &SliceCursor::end(self.as_slice()),
            value,
            |a, b| a < b,
        )
        .position()
    }

    /// First index whose element is greater than `value`. The elements must
    /// be sorted.
    pub fn upper_bound(&self, value: &T) -> usize
    where
        T: Ord,
    {
        algorithm::upper_bound(
            SliceCursor::begin(self.as_slice()),
            &SliceCursor::end(self.as_slice()),
            value,
            |a, b| a < b,
        )
        .position()
    }

    /// Deep-copies the vector into one backed by `alloc`.
    pub fn clone_in(&self, alloc: A) -> Self
    where
        T: TypeTraits + Clone,
    {
        Self::from_slice_in(self.as_slice(), alloc)
    }
}

impl<T, A: Allocator> Drop for Vector<T, A> {
    fn drop(&mut self) {
        // SAFETY: The first `len` slots are live and never touched again.
        unsafe { lifetime::destruct_n(self.ptr.as_ptr(), self.len) };
        self.free_buffer();
    }
}

impl<T, A: Allocator + Default> Default for Vector<T, A> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T, A> Clone for Vector<T, A>
where
    T: TypeTraits + Clone,
    A: Allocator + Default,
{
    /// Copies the elements into a vector using a fresh `A::default()`.
    fn clone(&self) -> Self {
        self.clone_in(A::default())
    }

    /// Copies `source`'s elements into `self`, which keeps its allocator.
    fn clone_from(&mut self, source: &Self) {
        self.assign(source.as_slice());
    }
}

impl<T, A: Allocator> Deref for Vector<T, A> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, A: Allocator> DerefMut for Vector<T, A> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Debug, A: Allocator> Debug for Vector<T, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, U, A, B> PartialEq<Vector<U, B>> for Vector<T, A>
where
    T: PartialEq<U>,
    A: Allocator,
    B: Allocator,
{
    fn eq(&self, other: &Vector<U, B>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, A: Allocator> Eq for Vector<T, A> {}

impl<T, A: Allocator> Extend<T> for Vector<T, A> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve(lower);
        for value in iter {
            self.push(value);
        }
    }
}

impl<T, A: Allocator + Default> FromIterator<T> for Vector<T, A> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vector = Self::default();
        vector.extend(iter);
        vector
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a Vector<T, A> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T, A: Allocator> IntoIterator for &'a mut Vector<T, A> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}
