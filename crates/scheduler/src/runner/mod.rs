//! Keyed scheduler runner -- owns the worker pool and dispatcher and exposes
//! the submission and result-retrieval API.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructors, accessors and teardown
//! - `submit`: single, pre-built and batch submission
//! - `drain`: draining, `await_all` and shutdown

mod core;
mod drain;
mod submit;
#[cfg(test)]
mod tests;

pub use self::core::Scheduler;
