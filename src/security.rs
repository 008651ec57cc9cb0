//! Opaque per-call security context threaded through the source stack.

// std
use std::{
	any::Any,
	fmt::{Debug, Formatter, Result as FmtResult},
};
// self
use crate::_prelude::*;

/// Opaque context forwarded through every source call and attached to events and health reports.
///
/// The pipeline never inspects the payload; it exists so callers can correlate events and reports
/// with the request that triggered them. Cloning is cheap (a reference count).
#[derive(Clone, Default)]
pub struct SecurityContext {
	inner: Option<Arc<dyn Any + Send + Sync>>,
}
impl SecurityContext {
	/// A context carrying no payload.
	pub fn empty() -> Self {
		Self::default()
	}

	/// Wrap an arbitrary payload.
	pub fn new<T>(value: T) -> Self
	where
		T: Any + Send + Sync,
	{
		Self { inner: Some(Arc::new(value)) }
	}

	/// Whether a payload is attached.
	pub fn is_empty(&self) -> bool {
		self.inner.is_none()
	}

	/// Borrow the payload as a concrete type, if one of that type is attached.
	pub fn downcast_ref<T>(&self) -> Option<&T>
	where
		T: Any,
	{
		self.inner.as_deref().and_then(|payload| payload.downcast_ref())
	}
}
impl Debug for SecurityContext {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		if self.inner.is_some() {
			write!(f, "SecurityContext(<opaque>)")
		} else {
			write!(f, "SecurityContext(<empty>)")
		}
	}
}
