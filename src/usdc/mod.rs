//! USD Crate format family: scene tree, binary Crate serialization, and the
//! USDZ archive wrapper.

pub mod coding;
pub mod lz4;
pub mod scene;
pub mod sink;
pub mod tree;
pub mod usdz;
pub mod value;
pub mod writer;

pub use scene::build_scene;
pub use sink::Sink;
pub use tree::{Attribute, Prim};
pub use value::{Meta, MetaMap, SpecType, Specifier, Value, ValueRep, ValueType};
pub use writer::CrateWriter;

use log::info;

use crate::mesh::MeshSet;
use crate::util::Result;

/// Export a mesh set as a USDZ archive.
///
/// Builds the scene tree, serializes it into a Crate layer, and wraps the
/// layer in a STORED zip with a 64-byte-aligned payload.
pub fn export_usdz(meshes: &MeshSet) -> Result<Vec<u8>> {
    meshes.validate()?;
    info!("exporting {} meshes to USDZ", meshes.len());

    let mut root = scene::build_scene(meshes);
    let layer = writer::encode(&mut root)?;
    Ok(usdz::pack(&layer))
}
