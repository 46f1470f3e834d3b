//! Pointers into the managed heap
//!
//! `GcPtr<T>` is the address of a GC-managed object. Visitors never dereference it; they only
//! observe the address and optionally rewrite the slot that holds it.

use std::{hash::Hash, ptr::NonNull};

/// A pointer to a GC-managed object.
///
/// This is a thin wrapper around a non-null raw pointer. The `#[repr(transparent)]` layout means
/// `Option<GcPtr<T>>` is a single nullable machine word for every sized `T`.
#[repr(transparent)]
pub struct GcPtr<T> {
    ptr: NonNull<T>,
}

/// An untyped root pointer slot. `None` is a null root.
pub type RootPtr = Option<GcPtr<u8>>;

impl<T> GcPtr<T> {
    /// Get the raw pointer
    #[inline]
    pub const fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Create from a raw pointer
    ///
    /// # Safety
    /// The pointer must be non-null. It is never dereferenced by this crate.
    #[inline]
    pub const unsafe fn from_ptr(ptr: *mut T) -> GcPtr<T> {
        GcPtr {
            ptr: NonNull::new_unchecked(ptr),
        }
    }

    /// Create from a NonNull pointer
    #[inline]
    pub const fn from_non_null(ptr: NonNull<T>) -> GcPtr<T> {
        GcPtr { ptr }
    }

    /// Create from an address, returning `None` for the null address
    #[inline]
    pub fn from_addr(addr: usize) -> Option<GcPtr<T>> {
        NonNull::new(addr as *mut T).map(GcPtr::from_non_null)
    }

    /// The address of the object
    #[inline]
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Check pointer equality
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }

    /// Cast to another type
    #[inline]
    pub fn cast<U>(&self) -> GcPtr<U> {
        GcPtr {
            ptr: self.ptr.cast(),
        }
    }

    /// Get the underlying NonNull
    #[inline]
    pub fn as_non_null(&self) -> NonNull<T> {
        self.ptr
    }
}

/// Reinterpret a typed root pointer slot as an untyped one.
///
/// Writes through the returned slot land in `ptr` itself, so a visitor that relocates the root
/// updates the caller's typed pointer.
///
/// # Safety
/// Anything written back through the returned slot must be null or the address of a `T`.
#[inline]
pub unsafe fn erase_root_ptr<T>(ptr: &mut Option<GcPtr<T>>) -> &mut RootPtr {
    &mut *(ptr as *mut Option<GcPtr<T>> as *mut RootPtr)
}

impl<T> Clone for GcPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for GcPtr<T> {}

impl<T> PartialEq for GcPtr<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for GcPtr<T> {}

impl<T> Hash for GcPtr<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

impl<T> std::fmt::Debug for GcPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GcPtr({:p})", self.ptr)
    }
}

impl<T> std::fmt::Pointer for GcPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Pointer::fmt(&self.ptr, f)
    }
}
