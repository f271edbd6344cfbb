//! OBJ/MTL ASCII export.
//!
//! One `g`/`usemtl` block per color; face indices are 1-based and keep
//! growing across colors, so each block offsets into the global vertex list.

use log::info;

use crate::mesh::MeshSet;
use crate::util::Result;

/// The two text artifacts of an OBJ export.
#[derive(Debug)]
pub struct ObjArtifacts {
    pub obj: String,
    pub mtl: String,
}

/// Export a mesh set as OBJ + MTL text.
///
/// `name` is the stem referenced by the `mtllib` directive.
pub fn export_obj(meshes: &MeshSet, name: &str) -> Result<ObjArtifacts> {
    meshes.validate()?;
    info!("exporting {} meshes to OBJ", meshes.len());

    let mut obj = format!("mtllib {}.mtl", name);
    let mut mtl = String::new();
    let mut vertex_offset = 0u32;

    for (id, (color, mesh)) in meshes.iter().enumerate() {
        obj.push_str(&format!("\ng m{}\nusemtl k{}", id, id));
        for p in &mesh.positions {
            obj.push_str(&format!("\nv {} {} {}", p.x, p.y, p.z));
        }
        for n in &mesh.normals {
            obj.push_str(&format!("\nvn {} {} {}", n.x, n.y, n.z));
        }
        for face in mesh.faces.chunks_exact(3) {
            obj.push_str(&format!(
                "\nf {0}//{0} {1}//{1} {2}//{2}",
                face[0] + vertex_offset + 1,
                face[1] + vertex_offset + 1,
                face[2] + vertex_offset + 1
            ));
        }
        vertex_offset += mesh.positions.len() as u32;

        let [r, g, b] = color.normalized();
        if id > 0 {
            mtl.push('\n');
        }
        mtl.push_str(&format!(
            "newmtl k{}\nNs 163\nNi 0.001\nillum 2\nKa 0.20 0.20 0.20\nKd {} {} {}\nKs 0.25 0.25 0.25",
            id, r, g, b
        ));
    }

    Ok(ObjArtifacts { obj, mtl })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Color, Mesh};
    use glam::Vec3;

    fn triangle() -> Mesh {
        Mesh::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec3::Z, Vec3::Z, Vec3::Z],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn test_single_triangle_literal() {
        let mut set = MeshSet::new();
        set.insert(Color::from_rgb24(0xFF0000), triangle());

        let out = export_obj(&set, "foo").unwrap();
        assert_eq!(
            out.obj,
            "mtllib foo.mtl\ng m0\nusemtl k0\nv 0 0 0\nv 1 0 0\nv 0 1 0\n\
             vn 0 0 1\nvn 0 0 1\nvn 0 0 1\nf 1//1 2//2 3//3"
        );
        assert_eq!(
            out.mtl,
            "newmtl k0\nNs 163\nNi 0.001\nillum 2\nKa 0.20 0.20 0.20\nKd 1 0 0\n\
             Ks 0.25 0.25 0.25"
        );
    }

    #[test]
    fn test_face_indices_accumulate_across_colors() {
        let mut set = MeshSet::new();
        set.insert(Color::rgb(255, 0, 0), triangle());
        set.insert(Color::rgb(0, 255, 0), triangle());

        let out = export_obj(&set, "scene").unwrap();
        // The second block's faces continue after the first three vertices.
        assert!(out.obj.contains("g m1\nusemtl k1"));
        assert!(out.obj.ends_with("f 4//4 5//5 6//6"));

        // Every face index stays within the cumulative vertex count.
        let total = 6;
        for line in out.obj.lines().filter(|l| l.starts_with("f ")) {
            for part in line[2..].split(' ') {
                let index: u32 = part.split("//").next().unwrap().parse().unwrap();
                assert!(index >= 1 && index <= total);
            }
        }

        assert!(out.mtl.contains("newmtl k0"));
        assert!(out.mtl.contains("newmtl k1"));
        assert!(out.mtl.contains("Kd 0 1 0"));
    }

    #[test]
    fn test_zero_face_mesh_emits_group_only() {
        let mut set = MeshSet::new();
        set.insert(
            Color::rgb(0, 0, 255),
            Mesh::new(vec![Vec3::ZERO], vec![Vec3::Z], vec![]),
        );
        let out = export_obj(&set, "empty").unwrap();
        assert!(out.obj.contains("g m0"));
        assert!(!out.obj.contains("\nf "));
    }
}
