//! glTF 2.0 binary (GLB) export.
//!
//! The manifest is one scene, one node, one mesh; every color of the set
//! becomes a primitive with its own index/position/normal buffer views and a
//! PBR material. The container is the standard two-chunk GLB envelope: JSON
//! padded with spaces, binary padded with zeros, both to 4 bytes.

use log::info;
use serde::Serialize;

use crate::mesh::MeshSet;
use crate::util::Result;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const COMPONENT_F32: u32 = 5126;
const COMPONENT_U32: u32 = 5125;
const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest {
    asset: Asset,
    scene: usize,
    scenes: Vec<Scene>,
    nodes: Vec<Node>,
    meshes: Vec<MeshOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    materials: Vec<Material>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    accessors: Vec<Accessor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffer_views: Vec<BufferView>,
    buffers: Vec<Buffer>,
}

#[derive(Serialize)]
struct Asset {
    version: &'static str,
    generator: &'static str,
}

#[derive(Serialize)]
struct Scene {
    nodes: Vec<usize>,
}

#[derive(Serialize)]
struct Node {
    mesh: usize,
}

#[derive(Serialize)]
struct MeshOut {
    primitives: Vec<Primitive>,
}

#[derive(Serialize)]
struct Primitive {
    attributes: Attributes,
    indices: usize,
    material: usize,
}

#[derive(Serialize)]
struct Attributes {
    #[serde(rename = "POSITION")]
    position: usize,
    #[serde(rename = "NORMAL")]
    normal: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Material {
    pbr_metallic_roughness: PbrMetallicRoughness,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PbrMetallicRoughness {
    base_color_factor: [f32; 4],
    metallic_factor: f32,
    roughness_factor: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<[f32; 3]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    target: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Buffer {
    byte_length: usize,
}

/// Export a mesh set as a GLB byte buffer.
pub fn export_glb(meshes: &MeshSet) -> Result<Vec<u8>> {
    meshes.validate()?;
    info!("exporting {} meshes to GLB", meshes.len());

    let mut bin = Vec::new();
    let mut buffer_views = Vec::new();
    let mut accessors = Vec::new();
    let mut materials = Vec::new();
    let mut primitives = Vec::new();

    for (color, mesh) in meshes.iter() {
        // Indices.
        let offset = bin.len();
        bin.extend_from_slice(bytemuck::cast_slice(&mesh.faces));
        buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: offset,
            byte_length: bin.len() - offset,
            target: ELEMENT_ARRAY_BUFFER,
        });
        accessors.push(Accessor {
            buffer_view: buffer_views.len() - 1,
            component_type: COMPONENT_U32,
            count: mesh.faces.len(),
            kind: "SCALAR",
            min: None,
            max: None,
        });
        let indices = accessors.len() - 1;

        // Positions, with their bounding box.
        let offset = bin.len();
        bin.extend_from_slice(bytemuck::cast_slice(&mesh.positions));
        buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: offset,
            byte_length: bin.len() - offset,
            target: ARRAY_BUFFER,
        });
        let (min, max) = bounds(&mesh.positions);
        accessors.push(Accessor {
            buffer_view: buffer_views.len() - 1,
            component_type: COMPONENT_F32,
            count: mesh.positions.len(),
            kind: "VEC3",
            min: Some(min),
            max: Some(max),
        });
        let position = accessors.len() - 1;

        // Normals.
        let offset = bin.len();
        bin.extend_from_slice(bytemuck::cast_slice(&mesh.normals));
        buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: offset,
            byte_length: bin.len() - offset,
            target: ARRAY_BUFFER,
        });
        accessors.push(Accessor {
            buffer_view: buffer_views.len() - 1,
            component_type: COMPONENT_F32,
            count: mesh.normals.len(),
            kind: "VEC3",
            min: None,
            max: None,
        });
        let normal = accessors.len() - 1;

        let [r, g, b] = color.normalized();
        materials.push(Material {
            pbr_metallic_roughness: PbrMetallicRoughness {
                base_color_factor: [r, g, b, 1.0],
                metallic_factor: 0.0,
                roughness_factor: 0.5,
            },
        });

        primitives.push(Primitive {
            attributes: Attributes { position, normal },
            indices,
            material: materials.len() - 1,
        });
    }

    let manifest = Manifest {
        asset: Asset { version: "2.0", generator: env!("CARGO_PKG_NAME") },
        scene: 0,
        scenes: vec![Scene { nodes: vec![0] }],
        nodes: vec![Node { mesh: 0 }],
        meshes: vec![MeshOut { primitives }],
        materials,
        accessors,
        buffer_views,
        buffers: vec![Buffer { byte_length: bin.len() }],
    };
    let json = serde_json::to_vec(&manifest)?;

    Ok(assemble(&json, &bin))
}

fn bounds(points: &[glam::Vec3]) -> ([f32; 3], [f32; 3]) {
    if points.is_empty() {
        return ([0.0; 3], [0.0; 3]);
    }
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for p in points {
        for (i, v) in p.to_array().into_iter().enumerate() {
            min[i] = min[i].min(v);
            max[i] = max[i].max(v);
        }
    }
    (min, max)
}

/// Assemble the GLB envelope from the serialized manifest and buffer.
fn assemble(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let json_padded = (json.len() + 3) & !3;
    let bin_padded = (bin.len() + 3) & !3;
    let total = 12 + 8 + json_padded + 8 + bin_padded;

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_padded as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(json);
    out.resize(out.len() + json_padded - json.len(), 0x20);

    out.extend_from_slice(&(bin_padded as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(bin);
    out.resize(out.len() + bin_padded - bin.len(), 0);

    out
}
