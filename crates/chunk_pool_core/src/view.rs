//! # Typed Views
//!
//! Thin layer mapping `(T, count)` requests onto byte requests and
//! reinterpreting the granted bytes as `[T]`. No allocation logic lives
//! here; the pools stay byte oriented.

use std::fmt;
use std::marker::PhantomData;

use bytemuck::Pod;

use crate::chunk::{BytePtr, WORD_SIZE};
use crate::error::{PoolError, PoolResult};
use crate::multi_pool::MultiPool;
use crate::storage::StorageProvider;

/// Length-tagged handle to an array of `T` living in a [`MultiPool`].
///
/// The view does not borrow the pool; element access goes through
/// [`MultiPool::view`] and [`MultiPool::view_mut`].
pub struct TypedView<T> {
    ptr: BytePtr,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> TypedView<T> {
    /// Address of the first element.
    #[inline]
    #[must_use]
    pub const fn ptr(&self) -> BytePtr {
        self.ptr
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the view holds no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the elements in bytes.
    #[inline]
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.len * std::mem::size_of::<T>()
    }
}

impl<T> Clone for TypedView<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedView<T> {}

impl<T> PartialEq for TypedView<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.len == other.len
    }
}

impl<T> Eq for TypedView<T> {}

impl<T> fmt::Debug for TypedView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedView")
            .field("type", &std::any::type_name::<T>())
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Byte length of `count` elements of `T`, checking that `T` can live
/// in word-aligned pool memory.
fn element_bytes<T: Pod>(count: usize) -> PoolResult<usize> {
    if std::mem::size_of::<T>() == 0 {
        return Err(PoolError::ViewCast(format!(
            "zero-sized element type {}",
            std::any::type_name::<T>()
        )));
    }
    if std::mem::align_of::<T>() > WORD_SIZE {
        return Err(PoolError::ViewCast(format!(
            "{} needs {}-byte alignment, pool chunks guarantee {WORD_SIZE}",
            std::any::type_name::<T>(),
            std::mem::align_of::<T>()
        )));
    }
    count.checked_mul(std::mem::size_of::<T>()).ok_or_else(|| {
        PoolError::ViewCast(format!(
            "{count} x {} overflows the address space",
            std::any::type_name::<T>()
        ))
    })
}

impl<S: StorageProvider> MultiPool<S> {
    /// Allocates room for `count` elements of `T`.
    ///
    /// The elements start out as whatever bytes the chunks hold: zero
    /// for fresh heap buffers, stale data for reused chunks.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ViewCast`] for zero-sized or over-aligned
    /// element types and propagates [`MultiPool::allocate`] errors.
    pub fn allocate_view<T: Pod>(&mut self, count: usize) -> PoolResult<TypedView<T>> {
        let bytes = element_bytes::<T>(count)?;
        let ptr = self.allocate(bytes)?;
        Ok(TypedView {
            ptr,
            len: count,
            _marker: PhantomData,
        })
    }

    /// Frees the allocation behind a view.
    ///
    /// # Panics
    ///
    /// Panics if the view was already freed.
    pub fn deallocate_view<T>(&mut self, view: TypedView<T>) {
        self.deallocate(view.ptr);
    }

    /// Elements of a live view.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Dangling`] if the view was freed.
    pub fn view<T: Pod>(&self, view: &TypedView<T>) -> PoolResult<&[T]> {
        let bytes = self
            .bytes(view.ptr)
            .ok_or(PoolError::Dangling { ptr: view.ptr })?;
        bytemuck::try_cast_slice(&bytes[..view.byte_len()])
            .map_err(|err| PoolError::ViewCast(format!("{err:?}")))
    }

    /// Mutable elements of a live view.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Dangling`] if the view was freed.
    pub fn view_mut<T: Pod>(&mut self, view: &TypedView<T>) -> PoolResult<&mut [T]> {
        let byte_len = view.byte_len();
        let bytes = self
            .bytes_mut(view.ptr)
            .ok_or(PoolError::Dangling { ptr: view.ptr })?;
        bytemuck::try_cast_slice_mut(&mut bytes[..byte_len])
            .map_err(|err| PoolError::ViewCast(format!("{err:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C)]
    struct Particle {
        x: f32,
        y: f32,
        life: f32,
        id: u32,
    }

    #[allow(dead_code)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    #[repr(C, align(16))]
    struct Wide {
        lanes: [u32; 4],
    }

    #[test]
    fn test_view_of_ints() {
        let mut pool = MultiPool::new(4);
        let view = pool.allocate_view::<i32>(1).unwrap();

        assert_eq!(view.len(), 1);
        assert_eq!(pool.allocated_chunks(), 1);
        assert_eq!(pool.allocation_count(), 1);

        pool.view_mut(&view).unwrap()[0] = 69;
        assert_eq!(pool.view(&view).unwrap(), &[69]);
    }

    #[test]
    fn test_view_of_structs() {
        let mut pool = MultiPool::new(4);
        let view = pool.allocate_view::<Particle>(10).unwrap();
        assert_eq!(view.byte_len(), 160);
        assert_eq!(pool.allocated_chunks(), 2);

        let particles = pool.view_mut(&view).unwrap();
        particles[9] = Particle {
            x: 1.0,
            y: 2.0,
            life: 0.5,
            id: 9,
        };
        let stored = pool.view(&view).unwrap()[9];
        assert_eq!(
            (stored.x, stored.y, stored.life, stored.id),
            (1.0, 2.0, 0.5, 9)
        );
    }

    #[test]
    fn test_dangling_view() {
        let mut pool = MultiPool::new(4);
        let view = pool.allocate_view::<u64>(4).unwrap();
        pool.deallocate_view(view);

        assert_eq!(
            pool.view(&view).unwrap_err(),
            PoolError::Dangling { ptr: view.ptr() }
        );
    }

    #[test]
    #[should_panic(expected = "invalid free")]
    fn test_view_double_free_panics() {
        let mut pool = MultiPool::new(4);
        let view = pool.allocate_view::<u32>(8).unwrap();
        pool.deallocate_view(view);
        pool.deallocate_view(view);
    }

    #[test]
    fn test_over_aligned_rejected() {
        let mut pool = MultiPool::new(4);
        assert!(matches!(
            pool.allocate_view::<Wide>(1),
            Err(PoolError::ViewCast(_))
        ));
        assert_eq!(pool.allocation_count(), 0);
    }

    #[test]
    fn test_zero_sized_rejected() {
        let mut pool = MultiPool::new(4);
        assert!(matches!(
            pool.allocate_view::<()>(3),
            Err(PoolError::ViewCast(_))
        ));
    }

    #[test]
    fn test_empty_view() {
        let mut pool = MultiPool::new(4);
        let view = pool.allocate_view::<u32>(0).unwrap();
        assert!(view.is_empty());
        assert!(pool.view(&view).unwrap().is_empty());
        assert_eq!(pool.allocated_chunks(), 1);
    }
}
