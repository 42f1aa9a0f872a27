//! # geovps-engine - Tracking Engine Boundary
//!
//! Defines the capability the session controller consumes from the
//! hardware-backed tracking engine, the engine-level fault type, and a
//! deterministic simulated engine.
//!
//! Depends on [`geovps_core`] for domain types and the error taxonomy.
//!
//! ## Public API
//!
//! ### Engine Capability
//! - [`TrackingEngine`] - Synchronous engine primitives plus a callback-based
//!   availability query
//! - [`EngineHandle`] - Opaque reference to a live engine session
//! - [`EarthState`], [`TrackingState`], [`EngineAvailability`],
//!   [`InstallStatus`] - Conditions reported by the engine
//! - [`SessionConfig`], [`GeoConfig`] - Options passed to the engine
//!
//! ### Errors
//! - [`EngineError`] - Engine fault with `From` mappings into each
//!   operation's error taxonomy
//!
//! ### Simulation
//! - [`SimulatedEngine`], [`SimulationConfig`] - In-process engine for demos

pub mod engine;
pub mod error;
pub mod simulated;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use engine::{
    next_handle_id, AvailabilityCallback, CameraFacing, EarthState, EngineAvailability,
    EngineHandle, GeoConfig, GeospatialMode, InstallStatus, SessionConfig, TrackingEngine,
    TrackingState,
};
#[cfg(any(test, feature = "test-helpers"))]
pub use engine::MockTrackingEngine;
pub use error::EngineError;
pub use simulated::{SimulatedEngine, SimulationConfig};
