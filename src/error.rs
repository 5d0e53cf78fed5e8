use core::alloc::Layout;
use core::fmt;

/// The allocator could not satisfy a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("memory allocation failed")
    }
}

impl core::error::Error for AllocError {}

/// Error returned by the `try_reserve` family of methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TryReserveError {
    /// The requested capacity does not fit in `usize`, or the resulting
    /// allocation would exceed `isize::MAX` bytes.
    CapacityOverflow,
    /// The allocator returned an error for the given layout.
    AllocError {
        /// Layout of the failed allocation request.
        layout: Layout,
    },
}

impl fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryReserveError::CapacityOverflow => {
                f.write_str("memory allocation failed because the computed capacity overflowed")
            }
            TryReserveError::AllocError { layout } => write!(
                f,
                "memory allocation of {} bytes (align {}) failed",
                layout.size(),
                layout.align()
            ),
        }
    }
}

impl core::error::Error for TryReserveError {}

/// How an allocation path reacts to failure.
///
/// Infallible entry points (`insert`, `reserve`, `push`) use `Abort`, the
/// `try_*` methods use `Return`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fallibility {
    Abort,
    Return,
}

impl Fallibility {
    #[cold]
    pub(crate) fn capacity_overflow(self) -> TryReserveError {
        match self {
            Fallibility::Abort => panic!("capacity overflow"),
            Fallibility::Return => TryReserveError::CapacityOverflow,
        }
    }

    #[cold]
    pub(crate) fn alloc_err(self, layout: Layout) -> TryReserveError {
        match self {
            Fallibility::Abort => alloc::alloc::handle_alloc_error(layout),
            Fallibility::Return => TryReserveError::AllocError { layout },
        }
    }
}
