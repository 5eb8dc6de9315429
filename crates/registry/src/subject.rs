//! Wrapper stripping.
//!
//! Registry operations accept anything that can expose the real object behind it.
//! Identity comparisons and storage always use the stripped [`Arc`], never the
//! wrapper, so a proxied object and its target resolve to the same id.

use std::sync::Arc;

/// A possibly wrapped reference to a registrable object.
pub trait Subject<T: ?Sized> {
	/// Returns the underlying object.
	fn subject(&self) -> &Arc<T>;
}

impl<T: ?Sized> Subject<T> for Arc<T> {
	fn subject(&self) -> &Arc<T> {
		self
	}
}

impl<T: ?Sized, S: Subject<T> + ?Sized> Subject<T> for &S {
	fn subject(&self) -> &Arc<T> {
		(**self).subject()
	}
}

/// Returns the address used as the object's identity.
pub(crate) fn identity<T: ?Sized>(object: &Arc<T>) -> usize {
	Arc::as_ptr(object).cast::<()>() as usize
}
