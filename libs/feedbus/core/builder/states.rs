/// Type-state markers for the builder pattern
///
/// These types track which required fields have been set in the builder at
/// compile time, preventing a consumer without queue binding or router.

use std::marker::PhantomData;

/// Marker trait for binding state
pub trait BindingState {}

/// Queue binding has not been set
pub struct NoBinding;
impl BindingState for NoBinding {}

/// Queue binding has been set
pub struct HasBinding;
impl BindingState for HasBinding {}

/// Marker trait for Router state
pub trait RouterState {}

/// Router has not been set
pub struct NoRouter;
impl RouterState for NoRouter {}

/// Router has been set
pub struct HasRouter;
impl RouterState for HasRouter {}

/// Phantom marker to prevent direct construction
#[derive(Debug, Clone, Copy)]
pub struct TypeState<B, R> {
    _binding: PhantomData<B>,
    _router: PhantomData<R>,
}

impl<B, R> TypeState<B, R> {
    pub(crate) fn new() -> Self {
        Self {
            _binding: PhantomData,
            _router: PhantomData,
        }
    }
}
