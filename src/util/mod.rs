//! Basic types shared by all exporters: errors and math re-exports.

mod error;

pub use error::{Error, Result};

// Re-export the vector types the mesh model is built from.
pub use glam::Vec3;
