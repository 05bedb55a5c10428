//! Work-stealing scheduler queues.
//!
//! - [`injector`]: the global queue fed by wake-ups and by spawns from
//!   outside the workers; it also parks idle workers,
//! - [`queue`]: one local queue per worker, popped by its owner and
//!   stolen from by the others.

pub(crate) mod injector;
pub(crate) mod queue;
