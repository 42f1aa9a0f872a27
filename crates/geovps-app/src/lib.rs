//! geovps-app - Session orchestration for GeoVPS
//!
//! This crate implements the session lifecycle controller, the background
//! polling loop that drives the tracking engine, pose and VPS availability
//! queries, event delivery, and configuration loading.

pub mod config;
pub mod event_bus;
pub mod services;
pub mod session;

// Re-export primary types
pub use config::{load_settings, Settings};
pub use event_bus::{EventBus, Subscription};
pub use services::{LocalVpsSession, VpsSession};
pub use session::SessionController;
