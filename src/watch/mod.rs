//! Self-re-arming watchers over the store's one-shot watch primitive.
//!
//! The store delivers a single notification per registration, so continuous
//! observation wraps re-registration inside the fire handler itself: each
//! fire triggers a fresh read-with-watch, forming a self-perpetuating loop.
//! A watcher whose target disappears simply stops re-arming and retires;
//! that is loop termination, not an error.

mod children;
mod node;

pub use children::*;
pub use node::*;
