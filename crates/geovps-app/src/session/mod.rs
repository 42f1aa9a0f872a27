//! Session lifecycle: controller, polling loop, and queries
//!
//! - [`SessionController`] - the single owner of the engine session
//! - `polling` - background loop advancing the engine while tracking
//! - `queries` - pose and VPS availability lookups

mod controller;
mod shared;
mod polling;
mod queries;

#[cfg(test)]
mod tests;

pub use controller::SessionController;
