//! # Arena Common
//!
//! Common types, utilities, and shared abstractions for the arena simulation.
//!
//! This crate provides foundational types used across all arena crates:
//! - ID types (EntityId, MatchId, Uid)
//! - Team and unit class tags
//! - Geometry helpers (rotation, rectangles, triangles, circle tests)
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod geometry;
pub mod ids;
pub mod tags;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::geometry::*;
    pub use crate::ids::*;
    pub use crate::tags::*;
}

pub use prelude::*;
