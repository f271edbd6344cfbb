//! Exporter input model: colored triangle meshes.
//!
//! All three exporters consume the same shape: an insertion-ordered mapping
//! from a 24-bit color to a triangle mesh with per-vertex normals.

use glam::Vec3;

use crate::util::{Error, Result};

/// 24-bit RGB color keying one mesh of the set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Create a color from its components.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from a packed 24-bit value (`0xRRGGBB`).
    #[inline]
    pub const fn from_rgb24(v: u32) -> Self {
        Self {
            r: (v >> 16) as u8,
            g: (v >> 8) as u8,
            b: v as u8,
        }
    }

    /// Components normalized to `[0, 1]`.
    #[inline]
    pub fn normalized(&self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

/// Triangle mesh with per-vertex normals and a flat face index list.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Per-vertex normals, same length as `positions`.
    pub normals: Vec<Vec3>,
    /// Vertex indices, three per triangle.
    pub faces: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from its components.
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, faces: Vec<u32>) -> Self {
        Self { positions, normals, faces }
    }

    /// Number of triangles.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len() / 3
    }

    /// Check the intake invariants. Meshes with zero faces are valid.
    pub fn validate(&self) -> Result<()> {
        if self.positions.len() != self.normals.len() {
            return Err(Error::NormalCountMismatch {
                positions: self.positions.len(),
                normals: self.normals.len(),
            });
        }
        if self.faces.len() % 3 != 0 {
            return Err(Error::RaggedFaceList(self.faces.len()));
        }
        let count = self.positions.len();
        for &index in &self.faces {
            if index as usize >= count {
                return Err(Error::FaceIndexOutOfRange { index, count });
            }
        }
        Ok(())
    }
}

/// Insertion-ordered mapping from color to mesh.
///
/// Re-inserting an existing color replaces its mesh in place; the color keeps
/// its original position, which also fixes the `m<id>`/`k<id>` numbering the
/// exporters derive from iteration order.
#[derive(Clone, Debug, Default)]
pub struct MeshSet {
    entries: Vec<(Color, Mesh)>,
}

impl MeshSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the mesh for a color.
    pub fn insert(&mut self, color: Color, mesh: Mesh) {
        for (c, m) in &mut self.entries {
            if *c == color {
                *m = mesh;
                return;
            }
        }
        self.entries.push((color, mesh));
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the set holds no meshes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the mesh for a color.
    pub fn get(&self, color: Color) -> Option<&Mesh> {
        self.entries.iter().find(|(c, _)| *c == color).map(|(_, m)| m)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Color, &Mesh)> {
        self.entries.iter().map(|(c, m)| (c, m))
    }

    /// Validate every mesh in the set. Fatal on the first violation.
    pub fn validate(&self) -> Result<()> {
        for (_, mesh) in &self.entries {
            mesh.validate()?;
        }
        Ok(())
    }
}
