//! End-to-end exporter tests.
//!
//! The USDZ checks walk the produced archive with a minimal Crate reader:
//! zip offsets by hand, sections via the table of contents, compressed
//! streams through the reference LZ4 decoder and the inverse integer coding.

use glam::Vec3;
use meshport::{export_glb, export_obj, export_usdz, Color, Mesh, MeshSet};
use std::collections::HashMap;

fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(data[offset..offset + 8].try_into().unwrap())
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

/// Inverse of the delta + common-value integer coding.
fn decode_ints(data: &[u8], count: usize) -> Vec<i32> {
    if count == 0 {
        return Vec::new();
    }
    let common = i32::from_le_bytes(data[0..4].try_into().unwrap());
    let table_len = (count * 2 + 7) / 8;
    let mut cursor = 4 + table_len;
    let mut out = Vec::with_capacity(count);
    let mut prev = 0i32;
    for i in 0..count {
        let slot = i + 16;
        let code = (data[slot >> 2] >> ((slot & 3) * 2)) & 3;
        let delta = match code {
            0 => common,
            1 => {
                cursor += 1;
                data[cursor - 1] as i8 as i32
            }
            2 => {
                cursor += 2;
                i16::from_le_bytes(data[cursor - 2..cursor].try_into().unwrap()) as i32
            }
            _ => {
                cursor += 4;
                i32::from_le_bytes(data[cursor - 4..cursor].try_into().unwrap())
            }
        };
        prev = prev.wrapping_add(delta);
        out.push(prev);
    }
    out
}

/// Strip the chunk-count byte and run the reference block decoder.
fn decompress(blob: &[u8], uncompressed_len: usize) -> Vec<u8> {
    assert_eq!(blob[0], 0, "single-block chunk marker");
    if uncompressed_len == 0 {
        return Vec::new();
    }
    lz4_flex::block::decompress(&blob[1..], uncompressed_len).expect("reference LZ4 decoder")
}

/// Read a `[u64 length][prefixed LZ4 of int-coded data]` stream.
fn read_compressed_ints(data: &[u8], cursor: &mut usize, count: usize) -> Vec<i32> {
    let blob_len = read_u64(data, *cursor) as usize;
    *cursor += 8;
    let blob = &data[*cursor..*cursor + blob_len];
    *cursor += blob_len;
    if count == 0 {
        return Vec::new();
    }
    // Worst case: common value, full code table, all deltas at 4 bytes.
    let worst = 4 + (count * 2 + 7) / 8 + 4 * count;
    let mut raw = vec![0u8; worst];
    let n = lz4_flex::block::decompress_into(&blob[1..], &mut raw).expect("int stream");
    decode_ints(&raw[..n], count)
}

struct CrateFile<'a> {
    data: &'a [u8],
    tokens: Vec<String>,
    /// `(token index, rep bits)` pairs.
    fields: Vec<(i32, u64)>,
    /// `(path index, token index, jump)` triples.
    paths: Vec<(i32, i32, i32)>,
    /// `(path index, field set index, spec type)` triples.
    specs: Vec<(i32, i32, i32)>,
    field_sets: Vec<i32>,
}

impl<'a> CrateFile<'a> {
    fn parse(data: &'a [u8]) -> Self {
        assert_eq!(&data[0..8], b"PXR-USDC");
        assert_eq!(&data[8..16], &[0, 7, 0, 0, 0, 0, 0, 0]);

        let toc = read_u64(data, 16) as usize;
        let section_count = read_u64(data, toc) as usize;
        let mut sections = HashMap::new();
        for i in 0..section_count {
            let base = toc + 8 + i * 32;
            let name: Vec<u8> = data[base..base + 16]
                .iter()
                .copied()
                .take_while(|&b| b != 0)
                .collect();
            sections.insert(
                String::from_utf8(name).unwrap(),
                (read_u64(data, base + 16) as usize, read_u64(data, base + 24) as usize),
            );
        }

        // TOKENS: count, raw length, compressed length, blob.
        let (start, _) = sections["TOKENS"];
        let count = read_u64(data, start) as usize;
        let raw_len = read_u64(data, start + 8) as usize;
        let comp_len = read_u64(data, start + 16) as usize;
        let raw = decompress(&data[start + 24..start + 24 + comp_len], raw_len);
        let mut tokens: Vec<String> = raw
            .split(|&b| b == 0)
            .map(|s| String::from_utf8(s.to_vec()).unwrap())
            .collect();
        tokens.truncate(count);

        // FIELDS: count, int-coded token indices, compressed rep words.
        let (start, _) = sections["FIELDS"];
        let count = read_u64(data, start) as usize;
        let mut cursor = start + 8;
        let field_tokens = read_compressed_ints(data, &mut cursor, count);
        let comp_len = read_u64(data, cursor) as usize;
        cursor += 8;
        let reps_raw = decompress(&data[cursor..cursor + comp_len], count * 8);
        let fields = field_tokens
            .into_iter()
            .zip(reps_raw.chunks_exact(8).map(|c| u64::from_le_bytes(c.try_into().unwrap())))
            .collect();

        // FIELDSETS.
        let (start, _) = sections["FIELDSETS"];
        let count = read_u64(data, start) as usize;
        let mut cursor = start + 8;
        let field_sets = read_compressed_ints(data, &mut cursor, count);

        // PATHS: the count is written twice.
        let (start, _) = sections["PATHS"];
        let count = read_u64(data, start) as usize;
        assert_eq!(read_u64(data, start + 8) as usize, count);
        let mut cursor = start + 16;
        let indices = read_compressed_ints(data, &mut cursor, count);
        let path_tokens = read_compressed_ints(data, &mut cursor, count);
        let jumps = read_compressed_ints(data, &mut cursor, count);
        let paths = indices
            .into_iter()
            .zip(path_tokens)
            .zip(jumps)
            .map(|((a, b), c)| (a, b, c))
            .collect();

        // SPECS.
        let (start, _) = sections["SPECS"];
        let count = read_u64(data, start) as usize;
        let mut cursor = start + 8;
        let indices = read_compressed_ints(data, &mut cursor, count);
        let sets = read_compressed_ints(data, &mut cursor, count);
        let types = read_compressed_ints(data, &mut cursor, count);
        let specs = indices
            .into_iter()
            .zip(sets)
            .zip(types)
            .map(|((a, b), c)| (a, b, c))
            .collect();

        Self { data, tokens, fields, paths, specs, field_sets }
    }

    fn token_index(&self, token: &str) -> i32 {
        self.tokens.iter().position(|t| t == token).expect(token) as i32
    }

    /// Reps of every field named `name`.
    fn field_reps(&self, name: &str) -> Vec<u64> {
        let token = self.token_index(name);
        self.fields
            .iter()
            .filter(|(t, _)| *t == token)
            .map(|(_, rep)| *rep)
            .collect()
    }
}

const PAYLOAD_MASK: u64 = (1 << 48) - 1;
const ARRAY_BIT: u64 = 1 << 63;
const INLINE_BIT: u64 = 1 << 62;
const COMPRESSED_BIT: u64 = 1 << 61;

fn rep_type(rep: u64) -> u8 {
    (rep >> 48) as u8
}

/// Unwrap the USDZ archive: check STORED layout and 64-byte alignment, and
/// return the layer payload.
fn unzip_layer(archive: &[u8]) -> &[u8] {
    assert_eq!(read_u32(archive, 0), 0x0403_4B50);
    assert_eq!(read_u16(archive, 8), 0, "stored entry");
    let size = read_u32(archive, 18) as usize;
    assert_eq!(read_u32(archive, 22) as usize, size);
    let name_len = read_u16(archive, 26) as usize;
    let extra_len = read_u16(archive, 28) as usize;
    assert_eq!(&archive[30..30 + name_len], b"tmp.usdc");

    let payload = 30 + name_len + extra_len;
    assert_eq!(payload % 64, 0, "usdz payload alignment");
    &archive[payload..payload + size]
}

fn triangles(count: usize, origin: Vec3) -> Mesh {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut faces = Vec::new();
    for i in 0..count {
        let base = origin + Vec3::new(i as f32, 0.0, 0.0);
        positions.push(base);
        positions.push(base + Vec3::X);
        positions.push(base + Vec3::Y);
        normals.extend([Vec3::Z; 3]);
        let v = (i * 3) as u32;
        faces.extend([v, v + 1, v + 2]);
    }
    Mesh::new(positions, normals, faces)
}

#[test]
fn test_empty_set_produces_valid_archive() {
    let archive = export_usdz(&MeshSet::new()).unwrap();
    let layer = unzip_layer(&archive);
    let file = CrateFile::parse(layer);

    // Root, ar, Materials; nothing else.
    assert_eq!(file.paths.len(), 3);
    assert_eq!(file.specs.len(), 3);
    assert_eq!(file.paths[0], (0, 0, -1));

    for token in ["ar", "Materials", "Xform", "Scope", "component"] {
        assert!(file.tokens.iter().any(|t| t == token), "missing {}", token);
    }
    assert!(!file.tokens.iter().any(|t| t == "Mesh" || t == "Material"));

    // Spec types: one pseudo-root and two prims.
    let mut types: Vec<i32> = file.specs.iter().map(|s| s.2).collect();
    types.sort_unstable();
    assert_eq!(types, vec![6, 6, 7]);
}

#[test]
fn test_two_color_archive_structure() {
    let mut meshes = MeshSet::new();
    meshes.insert(Color::from_rgb24(0xFF0000), triangles(100, Vec3::ZERO));
    meshes.insert(Color::from_rgb24(0x0080FF), triangles(100, Vec3::new(0.0, 0.0, 5.0)));

    let archive = export_usdz(&meshes).unwrap();
    let layer = unzip_layer(&archive);
    let file = CrateFile::parse(layer);

    // 9 prims + 24 attribute entries, specs in lockstep.
    assert_eq!(file.paths.len(), 33);
    assert_eq!(file.specs.len(), 33);

    // Prim path tokens are negated, attribute tokens are not.
    for name in ["ar", "Materials", "k0", "k1", "m0", "m1", "surfaceShader"] {
        let token = file.token_index(name);
        assert!(
            file.paths.iter().any(|&(_, t, _)| t == -token),
            "no prim entry for {}",
            name
        );
    }
    for name in ["points", "inputs:diffuseColor", "material:binding"] {
        let token = file.token_index(name);
        assert!(
            file.paths.iter().any(|&(_, t, _)| t == token),
            "no attribute entry for {}",
            name
        );
    }

    // Materials jumps over both material subtrees to its mesh sibling.
    let materials_token = file.token_index("Materials");
    let &(_, _, jump) = file
        .paths
        .iter()
        .find(|&&(_, t, _)| t == -materials_token)
        .unwrap();
    assert_eq!(jump, 15);

    // Spec types: 1 pseudo-root, 8 prims, 2 relationships, 22 attributes.
    let count = |ty: i32| file.specs.iter().filter(|s| s.2 == ty).count();
    assert_eq!(count(7), 1);
    assert_eq!(count(6), 8);
    assert_eq!(count(8), 2);
    assert_eq!(count(1), 22);

    // Attribute specs reuse their prim's path index.
    let m0_token = file.token_index("m0");
    let &(m0_path, _, _) = file.paths.iter().find(|&&(_, t, _)| t == -m0_token).unwrap();
    let m0_specs = file.specs.iter().filter(|s| s.0 == m0_path).count();
    assert_eq!(m0_specs, 8); // the prim plus its seven attributes

    // Field sets: every group ends in a -1 sentinel.
    assert_eq!(*file.field_sets.last().unwrap(), -1);
    // Shape-identical prims share their `properties` token vector field.
    assert_eq!(file.field_reps("properties").len(), 3);
}

#[test]
fn test_two_color_archive_values() {
    let red = Color::from_rgb24(0xFF0000);
    let blue = Color::from_rgb24(0x0000FF);
    let mut meshes = MeshSet::new();
    meshes.insert(red, triangles(100, Vec3::ZERO));
    meshes.insert(blue, triangles(100, Vec3::new(0.0, 0.0, 5.0)));

    let archive = export_usdz(&meshes).unwrap();
    let layer = unzip_layer(&archive);
    let file = CrateFile::parse(layer);

    // Diffuse colors: out-of-line vec3f scalars among the `default` fields.
    let mut colors = Vec::new();
    for rep in file.field_reps("default") {
        if rep_type(rep) == 24 && rep & (ARRAY_BIT | INLINE_BIT) == 0 {
            let offset = (rep & PAYLOAD_MASK) as usize;
            colors.push([
                read_f32(file.data, offset),
                read_f32(file.data, offset + 4),
                read_f32(file.data, offset + 8),
            ]);
        }
    }
    assert!(colors.contains(&red.normalized()));
    assert!(colors.contains(&blue.normalized()));

    // Large int arrays are compressed and round-trip through the coding.
    let mut int_arrays = Vec::new();
    for rep in file.field_reps("default") {
        if rep_type(rep) == 3 && rep & ARRAY_BIT != 0 {
            assert!(rep & COMPRESSED_BIT != 0, "300-element arrays compress");
            let offset = (rep & PAYLOAD_MASK) as usize;
            let count = read_u64(file.data, offset) as usize;
            let mut cursor = offset + 8;
            int_arrays.push(read_compressed_ints(file.data, &mut cursor, count));
        }
    }
    let faces: Vec<i32> = (0..300).collect();
    assert!(int_arrays.contains(&faces));
    assert!(int_arrays.contains(&vec![3; 100]));
    // Identical arrays were deduplicated into single fields.
    assert_eq!(int_arrays.len(), 2);

    // Vec3f arrays: two point sets and two normal sets, 300 elements each.
    // The first element's z tells them apart: 0 and 5 for the two point
    // sets, 1 for both (undeduplicated) normal sets.
    let mut first_z = Vec::new();
    for rep in file.field_reps("default") {
        if rep_type(rep) == 24 && rep & ARRAY_BIT != 0 {
            let offset = (rep & PAYLOAD_MASK) as usize;
            assert_eq!(read_u64(file.data, offset), 300);
            first_z.push(read_f32(file.data, offset + 8 + 2 * 4));
        }
    }
    first_z.sort_by(f32::total_cmp);
    assert_eq!(first_z, vec![0.0, 1.0, 1.0, 5.0]);

    // The shader id is an inline token default.
    let preview = file.token_index("UsdPreviewSurface");
    assert!(file.field_reps("default").iter().any(|&rep| {
        rep & INLINE_BIT != 0 && rep_type(rep) == 11 && (rep & PAYLOAD_MASK) as i32 == preview
    }));
}

#[test]
fn test_glb_and_obj_agree_with_usdz_on_input() {
    let mut meshes = MeshSet::new();
    meshes.insert(Color::from_rgb24(0xFF0000), triangles(2, Vec3::ZERO));

    let glb = export_glb(&meshes).unwrap();
    assert_eq!(&glb[0..4], b"glTF");
    assert_eq!(read_u32(&glb, 8) as usize, glb.len());

    let obj = export_obj(&meshes, "scene").unwrap();
    assert!(obj.obj.starts_with("mtllib scene.mtl\ng m0\nusemtl k0\n"));
    assert!(obj.mtl.starts_with("newmtl k0\n"));

    let usdz = export_usdz(&meshes).unwrap();
    assert_eq!(read_u32(&usdz, 0), 0x0403_4B50);
}

#[test]
fn test_malformed_mesh_rejected_by_every_exporter() {
    let mut meshes = MeshSet::new();
    meshes.insert(
        Color::from_rgb24(0x00FF00),
        Mesh::new(vec![Vec3::ZERO], vec![Vec3::Z], vec![0, 0, 9]),
    );

    assert!(export_usdz(&meshes).is_err());
    assert!(export_glb(&meshes).is_err());
    assert!(export_obj(&meshes, "bad").is_err());
}
