//! # geovps-core - Core Domain Types
//!
//! Foundation crate for GeoVPS. Provides the session domain types, the
//! per-operation error taxonomy, event definitions, and logging setup.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, thiserror, tracing, toml).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`SessionState`] - Lifecycle state of the tracking session
//! - [`GeospatialPose`] - Camera pose in geospatial coordinates
//! - [`VpsAvailability`] - Positioning coverage at a coordinate
//!
//! ### Events (`events`)
//! - [`SessionEvent`] - State-change and diagnostic notifications
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Infrastructure errors (IO, configuration) wrapping the session taxonomy
//! - [`ResultExt`] - Logs an error with context as it propagates
//! - [`SetupError`], [`StartError`], [`PoseError`], [`AvailabilityError`],
//!   [`CloseError`] - Tagged results of each session operation
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//!
//! ## Prelude
//!
//! ```rust
//! use geovps_core::prelude::*;
//! ```

pub mod error;
pub mod events;
pub mod logging;
pub mod types;

/// Prelude for common imports used throughout all GeoVPS crates
pub mod prelude {
    pub use super::error::{Error, Result, ResultExt};
    pub use tracing::{debug, error, info, instrument, trace, warn};
}

pub use error::{
    AvailabilityError, CloseError, Error, OutdatedPackage, PoseError, Result, ResultExt,
    SetupError, StartError,
};
pub use events::SessionEvent;
pub use types::{GeospatialPose, SessionState, UnknownStateTag, VpsAvailability};
