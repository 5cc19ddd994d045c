//! Shared building blocks: lock-guarded shared state and panic payload handling.

mod atomic;
mod fault;

pub use atomic::*;
pub use fault::*;
