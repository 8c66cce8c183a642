//! Aligned, contiguous multi-dimensional arrays.
//!
//! An [`FftArray`] is a shared handle to one zero-initialised block of
//! memory aligned to [`ALIGNMENT`] bytes and laid out in row-major order with
//! no padding, which is what the engine expects when it is handed nothing but
//! a base pointer and extents. Cloning the handle shares the block; the
//! memory is released when the last handle (including the ones held by
//! plans) is dropped.
//!
//! Element access goes through [`FftArray::read`] and [`FftArray::write`],
//! which return lock guards dereferencing to `ndarray` views of the exact
//! shape, so rows and planes are individually addressable while still being
//! backed by a single block.

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use std::alloc::{self, Layout};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use ndarray::{ArrayView, ArrayViewMut, Dimension, Ix1, Ix2, Ix3};

use crate::num::{Complex, Float};

/// Byte alignment of every array allocation; wide enough for 512-bit vector
/// loads.
pub const ALIGNMENT: usize = 64;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl<T: crate::num::Float> Sealed for crate::num::Complex<T> {}
}

/// Cell types an [`FftArray`] can hold.
///
/// # Safety
/// The all-zero bit pattern must be a valid value of the type, since
/// storage is handed out straight from a zeroed allocation.
pub unsafe trait Element: sealed::Sealed + Copy + Send + Sync + fmt::Debug + 'static {}

unsafe impl Element for f32 {}
unsafe impl Element for f64 {}
unsafe impl<T: Float> Element for Complex<T> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// An extent was zero; `axis` is its position in the shape.
    ZeroExtent { axis: usize },
    /// The element count or byte size overflows `usize`.
    TooLarge,
    /// The system allocator could not satisfy the request.
    OutOfMemory { bytes: usize },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::ZeroExtent { axis } => write!(f, "extent of axis {axis} must be positive"),
            AllocError::TooLarge => write!(f, "requested array size overflows the address space"),
            AllocError::OutOfMemory { bytes } => write!(f, "failed to allocate {bytes} bytes"),
        }
    }
}

impl std::error::Error for AllocError {}

/// Owned, aligned, zeroed block of `len` elements.
struct AlignedBuf<E> {
    ptr: NonNull<E>,
    len: usize,
    layout: Layout,
}

// SAFETY: the buffer owns its allocation exclusively; access is coordinated
// by the lock in `Storage`.
unsafe impl<E: Send> Send for AlignedBuf<E> {}
unsafe impl<E: Sync> Sync for AlignedBuf<E> {}

impl<E: Element> AlignedBuf<E> {
    fn zeroed(len: usize) -> Result<Self, AllocError> {
        debug_assert!(len > 0);
        let bytes = len
            .checked_mul(core::mem::size_of::<E>())
            .ok_or(AllocError::TooLarge)?;
        let align = ALIGNMENT.max(core::mem::align_of::<E>());
        let layout = Layout::from_size_align(bytes, align).map_err(|_| AllocError::TooLarge)?;
        // SAFETY: `len > 0` and every element type is non-zero-sized, so the
        // layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw.cast::<E>()).ok_or(AllocError::OutOfMemory { bytes })?;
        Ok(Self { ptr, len, layout })
    }
}

impl<E> Drop for AlignedBuf<E> {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with exactly this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout) }
    }
}

struct Storage<E> {
    buf: AlignedBuf<E>,
    lock: RwLock<()>,
}

/// Shared handle to an aligned row-major array of rank `D`.
pub struct FftArray<E: Element, D: Dimension> {
    storage: Arc<Storage<E>>,
    dim: D,
}

pub type FftArray1<E> = FftArray<E, Ix1>;
pub type FftArray2<E> = FftArray<E, Ix2>;
pub type FftArray3<E> = FftArray<E, Ix3>;

impl<E: Element, D: Dimension> Clone for FftArray<E, D> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            dim: self.dim.clone(),
        }
    }
}

impl<E: Element, D: Dimension> fmt::Debug for FftArray<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftArray")
            .field("extents", &self.extents())
            .field("ptr", &self.as_ptr())
            .finish()
    }
}

/// Non-owning view of an array's base pointer and extents, lent to the
/// planner. The pointer stays valid for as long as the array it came from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawParts<'a, E> {
    pub ptr: NonNull<E>,
    pub extents: &'a [usize],
}

impl<E: Element, D: Dimension> FftArray<E, D> {
    pub(crate) fn zeroed(dim: D) -> Result<Self, AllocError> {
        if let Some(axis) = dim.slice().iter().position(|&n| n == 0) {
            return Err(AllocError::ZeroExtent { axis });
        }
        let len = dim.size_checked().ok_or(AllocError::TooLarge)?;
        let buf = AlignedBuf::zeroed(len)?;
        Ok(Self {
            storage: Arc::new(Storage {
                buf,
                lock: RwLock::new(()),
            }),
            dim,
        })
    }

    /// Extents, outermost first.
    pub fn extents(&self) -> &[usize] {
        self.dim.slice()
    }

    /// Extents in `ndarray` pattern form: `n`, `(n0, n1)` or `(n0, n1, n2)`.
    pub fn dims(&self) -> D::Pattern {
        self.dim.clone().into_pattern()
    }

    pub fn ndim(&self) -> usize {
        self.dim.ndim()
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.storage.buf.len
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Base pointer to the first cell. Stable for the lifetime of the
    /// allocation; the storage never moves.
    pub fn as_ptr(&self) -> *const E {
        self.storage.buf.ptr.as_ptr()
    }

    pub(crate) fn raw_parts(&self) -> RawParts<'_, E> {
        RawParts {
            ptr: self.storage.buf.ptr,
            extents: self.extents(),
        }
    }

    /// Whether both handles refer to the same block of memory, regardless of
    /// element type.
    pub fn shares_storage<F: Element, D2: Dimension>(&self, other: &FftArray<F, D2>) -> bool {
        self.as_ptr().cast::<u8>() == other.as_ptr().cast::<u8>()
    }

    /// Shared access. Blocks while a writer (or an executing plan writing
    /// into this array) holds the lock.
    pub fn read(&self) -> ArrayRead<'_, E, D> {
        let guard = self
            .storage
            .lock
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        // SAFETY: the pointer covers `dim.size()` initialised cells in
        // standard layout, and the read lock excludes writers for `'_`.
        let view = unsafe { ArrayView::from_shape_ptr(self.dim.clone(), self.as_ptr()) };
        ArrayRead {
            view,
            _guard: guard,
        }
    }

    /// Exclusive access.
    pub fn write(&self) -> ArrayWrite<'_, E, D> {
        let guard = self
            .storage
            .lock
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // SAFETY: as in `read`, and the write lock excludes every other
        // accessor for `'_`.
        let view = unsafe {
            ArrayViewMut::from_shape_ptr(self.dim.clone(), self.storage.buf.ptr.as_ptr())
        };
        ArrayWrite {
            view,
            _guard: guard,
        }
    }

    /// Copy of the cells in row-major order.
    pub fn to_vec(&self) -> Vec<E> {
        self.read().iter().copied().collect()
    }

    /// Overwrite every cell with `value`.
    pub fn fill(&self, value: E) {
        self.write().fill(value);
    }
}

impl<E> Storage<E> {
    fn try_lock_shared(&self) -> Option<BufferLock<'_>> {
        match self.lock.try_read() {
            Ok(g) => Some(BufferLock::Shared(g)),
            Err(TryLockError::Poisoned(p)) => Some(BufferLock::Shared(p.into_inner())),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn try_lock_exclusive(&self) -> Option<BufferLock<'_>> {
        match self.lock.try_write() {
            Ok(g) => Some(BufferLock::Exclusive(g)),
            Err(TryLockError::Poisoned(p)) => Some(BufferLock::Exclusive(p.into_inner())),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

/// Lock held on a bound buffer while a plan touches it.
#[allow(dead_code)]
pub(crate) enum BufferLock<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
}

/// Read guard returned by [`FftArray::read`].
pub struct ArrayRead<'a, E, D: Dimension> {
    view: ArrayView<'a, E, D>,
    _guard: RwLockReadGuard<'a, ()>,
}

impl<'a, E, D: Dimension> Deref for ArrayRead<'a, E, D> {
    type Target = ArrayView<'a, E, D>;
    fn deref(&self) -> &Self::Target {
        &self.view
    }
}

/// Write guard returned by [`FftArray::write`].
pub struct ArrayWrite<'a, E, D: Dimension> {
    view: ArrayViewMut<'a, E, D>,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl<'a, E, D: Dimension> Deref for ArrayWrite<'a, E, D> {
    type Target = ArrayViewMut<'a, E, D>;
    fn deref(&self) -> &Self::Target {
        &self.view
    }
}

impl<'a, E, D: Dimension> DerefMut for ArrayWrite<'a, E, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.view
    }
}

/// Array storage bound into a plan. Holding it keeps the base pointer
/// valid no matter what happens to the caller's handles.
pub(crate) struct Binding<E: Element> {
    storage: Arc<Storage<E>>,
}

impl<E: Element> Binding<E> {
    pub(crate) fn of<D: Dimension>(array: &FftArray<E, D>) -> Self {
        Self {
            storage: Arc::clone(&array.storage),
        }
    }

    pub(crate) fn ptr(&self) -> NonNull<E> {
        self.storage.buf.ptr
    }

    pub(crate) fn same_storage<F: Element>(&self, other: &Binding<F>) -> bool {
        self.ptr().cast::<u8>() == other.ptr().cast::<u8>()
    }

    /// Non-blocking; `None` while a writer holds the array.
    pub(crate) fn try_lock_shared(&self) -> Option<BufferLock<'_>> {
        self.storage.try_lock_shared()
    }

    /// Non-blocking; `None` while any guard is held on the array.
    pub(crate) fn try_lock_exclusive(&self) -> Option<BufferLock<'_>> {
        self.storage.try_lock_exclusive()
    }

    /// Number of live handles (arrays and bindings) on the storage.
    #[cfg(test)]
    pub(crate) fn holders(&self) -> usize {
        Arc::strong_count(&self.storage)
    }
}
