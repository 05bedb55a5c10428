//! Internal data structures.
//!
//! This module provides low-level utilities used internally by the runtime.
//! In particular, it exposes a [`Slab`] used for keyed storage with reuse
//! of freed slots.

mod slab;

pub(crate) use slab::Slab;
