//! Mesh set to USD scene tree.
//!
//! The layout is fixed: an `ar` component Xform holding a `Materials` scope
//! (one Material + UsdPreviewSurface shader per color) followed by one Mesh
//! prim per color, bound to its material by relationship.

use glam::Vec3;

use crate::mesh::{Color, Mesh, MeshSet};
use crate::usdc::tree::{Attribute, Prim};
use crate::usdc::value::{Meta, Value};

/// Build the scene tree for a mesh set. The tree is not yet finalized.
pub fn build_scene(meshes: &MeshSet) -> Prim {
    let mut root = Prim::root();
    let ar = root.add_child(Prim::new("ar", "Xform"));
    ar.metadata.set(
        "assetInfo",
        Meta::Dict(vec![("name".to_string(), "ar".to_string())]),
    );
    ar.metadata.set("kind", Meta::String("component".to_string()));

    let materials = ar.add_child(Prim::new("Materials", "Scope"));
    for (id, (color, _)) in meshes.iter().enumerate() {
        materials.add_child(material_prim(id, *color));
    }
    for (id, (_, mesh)) in meshes.iter().enumerate() {
        ar.add_child(mesh_prim(id, mesh));
    }
    root
}

fn material_prim(id: usize, color: Color) -> Prim {
    let name = format!("k{}", id);
    let shader_path = format!("/ar/Materials/{}/surfaceShader", name);
    let mut material = Prim::new(name, "Material");

    let mut shader = Prim::new("surfaceShader", "Shader");
    shader.add_attribute(
        Attribute::new(
            "info:id",
            "token",
            Some(Value::Token("UsdPreviewSurface".to_string())),
        )
        .uniform(),
    );
    let [r, g, b] = color.normalized();
    shader.add_attribute(Attribute::new(
        "inputs:diffuseColor",
        "color3f",
        Some(Value::Vec3f(Vec3::new(r, g, b))),
    ));
    shader.add_attribute(Attribute::new(
        "inputs:roughness",
        "float",
        Some(Value::Float(0.2)),
    ));
    shader.add_attribute(Attribute::new("outputs:surface", "token", None));
    material.add_child(shader);

    material.add_attribute(Attribute::connection("outputs:surface", "token", shader_path));
    material
}

fn mesh_prim(id: usize, mesh: &Mesh) -> Prim {
    let mut prim = Prim::new(format!("m{}", id), "Mesh");
    prim.add_attribute(Attribute::relationship(
        "material:binding",
        format!("/ar/Materials/k{}", id),
    ));
    prim.add_attribute(Attribute::new("doubleSided", "bool", Some(Value::Bool(false))));
    prim.add_attribute(Attribute::new(
        "faceVertexCounts",
        "int[]",
        Some(Value::IntArray(vec![3; mesh.face_count()])),
    ));
    prim.add_attribute(Attribute::new(
        "faceVertexIndices",
        "int[]",
        Some(Value::IntArray(mesh.faces.iter().map(|&i| i as i32).collect())),
    ));
    prim.add_attribute(Attribute::new(
        "points",
        "point3f[]",
        Some(Value::Vec3fArray(mesh.positions.clone())),
    ));
    prim.add_attribute(
        Attribute::new(
            "primvars:normals",
            "normal3f[]",
            Some(Value::Vec3fArray(mesh.normals.clone())),
        )
        .with_meta("interpolation", Meta::String("vertex".to_string())),
    );
    prim.add_attribute(
        Attribute::new("subdivisionScheme", "token", Some(Value::Token("none".to_string())))
            .uniform(),
    );
    prim
}
