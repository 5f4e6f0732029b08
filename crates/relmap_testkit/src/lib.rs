//! # relmap Testkit
//!
//! Test utilities for relmap.
//!
//! This crate provides:
//! - Test connections over in-memory and file-backed SQLite
//! - Sample record types covering keys, hooks and every field kind
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use relmap_testkit::prelude::*;
//!
//! with_test_conn(|t| {
//!     let mut user = t.workarea::<User>();
//!     user.lock().email.set("ada@example.com");
//!     user.append(&t.ctx, &t.conn).unwrap();
//!     assert!(!user.changed());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;
pub mod records;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use crate::records::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
pub use records::*;
