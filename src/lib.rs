//! GeoVPS Library
//!
//! Headless front end for geospatial tracking sessions. The session logic
//! lives in the `geovps-app` crate; this crate drives it and reports what
//! happens as NDJSON.

pub mod headless;

// Re-export main entry points
pub use headless::runner::{report_availability, run_session, setup_with_retry, RunOptions};
pub use headless::HeadlessEvent;
