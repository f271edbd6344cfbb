//! # meshport
//!
//! Multi-format 3D mesh exporter. A set of colored triangle meshes goes in;
//! USDZ (binary USD Crate wrapped in an aligned STORED zip), glTF 2.0 binary
//! (GLB), or OBJ/MTL text comes out. All exporters are pure, in-memory,
//! single-threaded transformations with byte-deterministic output.
//!
//! ## Modules
//!
//! - [`util`] - Errors and math re-exports
//! - [`mesh`] - Exporter input model (colors, meshes, validation)
//! - [`usdc`] - USD Crate serialization and the USDZ container
//! - [`gltf`] - glTF 2.0 binary export
//! - [`obj`] - OBJ/MTL text export
//!
//! ## Example
//!
//! ```ignore
//! use meshport::{Color, Mesh, MeshSet};
//!
//! let mut meshes = MeshSet::new();
//! meshes.insert(Color::from_rgb24(0xFF0000), mesh);
//!
//! let usdz = meshport::export_usdz(&meshes)?;
//! let glb = meshport::export_glb(&meshes)?;
//! let obj = meshport::export_obj(&meshes, "scene")?;
//! ```

pub mod gltf;
pub mod mesh;
pub mod obj;
pub mod usdc;
pub mod util;

// Re-export the exporter surface.
pub use gltf::export_glb;
pub use mesh::{Color, Mesh, MeshSet};
pub use obj::{export_obj, ObjArtifacts};
pub use usdc::export_usdz;
pub use util::{Error, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::gltf::export_glb;
    pub use crate::mesh::{Color, Mesh, MeshSet};
    pub use crate::obj::{export_obj, ObjArtifacts};
    pub use crate::usdc::export_usdz;
    pub use crate::util::{Error, Result, Vec3};
}
