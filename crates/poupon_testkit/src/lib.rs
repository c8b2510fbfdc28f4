//! # Poupon Testkit
//!
//! Test utilities for the poupon analytics API client.
//!
//! This crate provides:
//! - [`FakePlatform`], an in-memory stand-in for the platform's REST API
//!   that plugs into the engine as an HTTP transport
//! - Fixtures for the common master/slave sync scenarios
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use poupon_testkit::prelude::*;
//!
//! #[test]
//! fn syncs_tagged_metrics() {
//!     let fixture = SyncFixture::reference();
//!     let orchestrator = fixture.orchestrator();
//!     orchestrator.sync_metrics(MASTER, SLAVE, "sync").unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod platform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::platform::*;
}

pub use fixtures::*;
pub use generators::*;
pub use platform::*;
