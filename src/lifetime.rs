//! Element lifetime primitives over raw memory.
//!
//! Containers keep storage as raw, possibly uninitialized memory and manage
//! element lifetimes explicitly. The functions here construct, destroy, copy
//! and relocate runs of elements. Each one picks a block memory operation when
//! the element type allows it and falls back to an element-wise loop
//! otherwise; the observable result is the same either way.
//!
//! Two families exist and must not be mixed up:
//!
//! - *constructing* functions (`construct*`, `copy_construct*`,
//!   `move_construct_n`, `fill_construct_n`) write into uninitialized memory;
//! - *assigning* functions (`copy_n`, `copy`, `move_n`, `move_range`) write
//!   over live elements.
//!
//! Destruction cost is taken from [`core::mem::needs_drop`]. Construction and
//! copy cost come from [`TypeTraits`].

use core::mem::needs_drop;
use core::ptr;

/// Compile-time classification of an element type.
///
/// Both flags default to `false`, which is always correct and only costs
/// speed. Implement it with an empty body for your own types:
///
/// ```rust
/// # use open_hash::TypeTraits;
/// struct Particle {
///     name: String,
/// }
///
/// // SAFETY: Both flags keep their conservative defaults.
/// unsafe impl TypeTraits for Particle {}
/// ```
///
/// # Safety
///
/// - `TRIVIAL_CONSTRUCT = true` asserts that the all-zero bit pattern is a
///   valid value of the type and equals `Default::default()`.
/// - `TRIVIAL_COPY = true` asserts that the type has no drop glue and that
///   `clone` and `clone_from` are equivalent to a bitwise copy.
pub unsafe trait TypeTraits {
    /// Default construction is a zero fill.
    const TRIVIAL_CONSTRUCT: bool = false;
    /// Copying is a byte copy.
    const TRIVIAL_COPY: bool = false;
}

macro_rules! trivial_type_traits {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: Zero is the default value and copies are bitwise.
            unsafe impl TypeTraits for $ty {
                const TRIVIAL_CONSTRUCT: bool = true;
                const TRIVIAL_COPY: bool = true;
            }
        )*
    };
}

trivial_type_traits!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, (),
);

// SAFETY: Null is all zeroes and pointers copy bitwise.
unsafe impl<T: ?Sized> TypeTraits for *const T {
    const TRIVIAL_CONSTRUCT: bool = true;
    const TRIVIAL_COPY: bool = true;
}

// SAFETY: Null is all zeroes and pointers copy bitwise.
unsafe impl<T: ?Sized> TypeTraits for *mut T {
    const TRIVIAL_CONSTRUCT: bool = true;
    const TRIVIAL_COPY: bool = true;
}

// SAFETY: Shared references are `Copy`. They have no zero value.
unsafe impl<T: ?Sized> TypeTraits for &T {
    const TRIVIAL_COPY: bool = true;
}

// SAFETY: An array is zeroed or copied exactly when its elements are.
unsafe impl<T: TypeTraits, const N: usize> TypeTraits for [T; N] {
    const TRIVIAL_CONSTRUCT: bool = T::TRIVIAL_CONSTRUCT;
    const TRIVIAL_COPY: bool = T::TRIVIAL_COPY;
}

macro_rules! tuple_type_traits {
    ($($name:ident),+) => {
        // SAFETY: Padding bytes do not take part in either property, so a tuple
        // is trivial exactly when every field is.
        unsafe impl<$($name: TypeTraits),+> TypeTraits for ($($name,)+) {
            const TRIVIAL_CONSTRUCT: bool = true $(&& $name::TRIVIAL_CONSTRUCT)+;
            const TRIVIAL_COPY: bool = true $(&& $name::TRIVIAL_COPY)+;
        }
    };
}

tuple_type_traits!(A);
tuple_type_traits!(A, B);
tuple_type_traits!(A, B, C);
tuple_type_traits!(A, B, C, D);

// SAFETY: Conservative defaults.
unsafe impl TypeTraits for alloc::string::String {}
// SAFETY: Conservative defaults.
unsafe impl<T> TypeTraits for alloc::vec::Vec<T> {}
// SAFETY: Conservative defaults.
unsafe impl<T: ?Sized> TypeTraits for alloc::boxed::Box<T> {}
// SAFETY: Conservative defaults.
unsafe impl<T> TypeTraits for Option<T> {}

#[inline(always)]
fn overlaps<T>(a: *const T, b: *const T, n: usize) -> bool {
    let bytes = n * core::mem::size_of::<T>();
    let (a, b) = (a as usize, b as usize);
    a < b + bytes && b < a + bytes
}

/// Default-constructs one element in place.
///
/// # Safety
///
/// `mem` must be valid for writes and properly aligned. Any previous value is
/// overwritten without being dropped.
#[inline]
pub unsafe fn construct<T: Default>(mem: *mut T) {
    // SAFETY: Caller guarantees `mem` is writable.
    unsafe { mem.write(T::default()) }
}

/// Default-constructs `count` elements starting at `to`.
///
/// Types marked [`TypeTraits::TRIVIAL_CONSTRUCT`] are zero filled in one pass.
///
/// # Safety
///
/// `to` must be valid for writes of `count` elements and properly aligned.
pub unsafe fn construct_n<T: TypeTraits + Default>(to: *mut T, count: usize) {
    if T::TRIVIAL_CONSTRUCT {
        // SAFETY: Caller guarantees the range is writable; zero is a valid `T`.
        unsafe { ptr::write_bytes(to, 0, count) }
    } else {
        for i in 0..count {
            // SAFETY: `i < count`.
            unsafe { to.add(i).write(T::default()) }
        }
    }
}

/// Drops one element in place.
///
/// # Safety
///
/// `mem` must point to a live `T`, which is dead afterwards.
#[inline]
pub unsafe fn destruct<T>(mem: *mut T) {
    if needs_drop::<T>() {
        // SAFETY: Caller guarantees `mem` is live.
        unsafe { ptr::drop_in_place(mem) }
    }
}

/// Drops `count` elements starting at `first`, lowest address first.
///
/// # Safety
///
/// The range must hold `count` live elements, which are dead afterwards.
pub unsafe fn destruct_n<T>(first: *mut T, count: usize) {
    if !needs_drop::<T>() {
        return;
    }

    for i in 0..count {
        // SAFETY: `i < count` and the element is live.
        unsafe { ptr::drop_in_place(first.add(i)) }
    }
}

/// Clones `orig` into uninitialized memory.
///
/// # Safety
///
/// `mem` must be valid for writes and properly aligned.
#[inline]
pub unsafe fn copy_construct<T: Clone>(mem: *mut T, orig: &T) {
    // SAFETY: Caller guarantees `mem` is writable.
    unsafe { mem.write(orig.clone()) }
}

/// Clones `count` elements from `first` into uninitialized memory at `result`.
///
/// If a clone panics the elements constructed so far are leaked, not dropped.
///
/// # Safety
///
/// - `first` must point to `count` live elements.
/// - `result` must be valid for writes of `count` elements.
/// - The two ranges must not overlap.
pub unsafe fn copy_construct_n<T: TypeTraits + Clone>(first: *const T, count: usize, result: *mut T) {
    debug_assert!(
        !overlaps(first, result, count),
        "copy_construct_n ranges overlap"
    );

    if T::TRIVIAL_COPY {
        // SAFETY: Non-overlapping, valid ranges; `T` copies bitwise.
        unsafe { ptr::copy_nonoverlapping(first, result, count) }
    } else {
        for i in 0..count {
            // SAFETY: `i < count` for both ranges.
            unsafe { result.add(i).write((*first.add(i)).clone()) }
        }
    }
}

/// Relocates `count` elements from `first` into uninitialized memory at
/// `result`.
///
/// Every Rust move is a bitwise copy, so this is always a block copy. The
/// source elements are logically uninitialized afterwards and must not be
/// dropped.
///
/// # Safety
///
/// - `first` must point to `count` live elements.
/// - `result` must be valid for writes of `count` elements.
/// - The two ranges must not overlap.
#[inline]
pub unsafe fn move_construct_n<T>(first: *const T, count: usize, result: *mut T) {
    debug_assert!(
        !overlaps(first, result, count),
        "move_construct_n ranges overlap"
    );
    // SAFETY: Caller upholds validity and non-overlap.
    unsafe { ptr::copy_nonoverlapping(first, result, count) }
}

/// Clones `value` into `count` uninitialized slots starting at `result`.
///
/// # Safety
///
/// `result` must be valid for writes of `count` elements, and `value` must not
/// live inside that range.
pub unsafe fn fill_construct_n<T: TypeTraits + Clone>(result: *mut T, count: usize, value: &T) {
    for i in 0..count {
        if T::TRIVIAL_COPY {
            // SAFETY: `i < count`; `T` copies bitwise.
            unsafe { ptr::copy_nonoverlapping(value, result.add(i), 1) }
        } else {
            // SAFETY: `i < count`.
            unsafe { result.add(i).write(value.clone()) }
        }
    }
}

/// Assigns clones of `count` elements from `first` over the live elements at
/// `result`.
///
/// # Safety
///
/// - Both ranges must hold `count` live elements.
/// - The two ranges must not overlap.
pub unsafe fn copy_n<T: TypeTraits + Clone>(first: *const T, count: usize, result: *mut T) {
    debug_assert!(!overlaps(first, result, count), "copy_n ranges overlap");

    if T::TRIVIAL_COPY {
        // SAFETY: `T` has no drop glue, so overwriting live values is fine.
        unsafe { ptr::copy_nonoverlapping(first, result, count) }
    } else {
        for i in 0..count {
            // SAFETY: `i < count`; both elements are live.
            unsafe { (*result.add(i)).clone_from(&*first.add(i)) }
        }
    }
}

/// Range form of [`copy_n`]: assigns `[first, last)` over `result`.
///
/// # Safety
///
/// See [`copy_n`]. `last` must be reachable from `first` within one allocation.
#[inline]
pub unsafe fn copy<T: TypeTraits + Clone>(first: *const T, last: *const T, result: *mut T) {
    // SAFETY: Caller guarantees `first..last` is one valid range.
    let count = unsafe { last.offset_from(first) } as usize;
    // SAFETY: Forwarded contract.
    unsafe { copy_n(first, count, result) }
}

/// Moves `count` elements from `first` over the elements at `result`.
///
/// The ranges may overlap. Destination elements that lie outside the source
/// range are live and get dropped before being overwritten. Afterwards,
/// source elements outside the destination range are logically uninitialized.
///
/// When the destination starts after the source and the ranges overlap, the
/// elements are moved from the back; otherwise from the front.
///
/// # Safety
///
/// - `first` must point to `count` live elements.
/// - `result` must point to `count` elements, each either live or inside the
///   source range.
pub unsafe fn move_n<T>(first: *mut T, count: usize, result: *mut T) {
    if count == 0 || first == result {
        return;
    }

    let overlapping = overlaps(first, result, count);

    if needs_drop::<T>() {
        for i in 0..count {
            // SAFETY: `i < count`.
            let slot = unsafe { result.add(i) };
            let in_source = overlapping && slot >= first && {
                // SAFETY: Both pointers belong to the same allocation when overlapping.
                (unsafe { slot.offset_from(first) } as usize) < count
            };
            if !in_source {
                // SAFETY: Slot is live and outside the source range.
                unsafe { ptr::drop_in_place(slot) }
            }
        }
    }

    if overlapping && result > first {
        for i in (0..count).rev() {
            // SAFETY: Moving from the back never reads a slot already written.
            unsafe { result.add(i).write(first.add(i).read()) }
        }
    } else if overlapping {
        for i in 0..count {
            // SAFETY: Moving from the front never reads a slot already written.
            unsafe { result.add(i).write(first.add(i).read()) }
        }
    } else {
        // SAFETY: Disjoint ranges.
        unsafe { ptr::copy_nonoverlapping(first, result, count) }
    }
}

/// Range form of [`move_n`]: moves `[first, last)` over `result`.
///
/// # Safety
///
/// See [`move_n`]. `last` must be reachable from `first` within one allocation.
#[inline]
pub unsafe fn move_range<T>(first: *mut T, last: *mut T, result: *mut T) {
    // SAFETY: Caller guarantees `first..last` is one valid range.
    let count = unsafe { last.offset_from(first) } as usize;
    // SAFETY: Forwarded contract.
    unsafe { move_n(first, count, result) }
}
