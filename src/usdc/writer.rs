//! Crate file writer.
//!
//! Walks a finalized scene tree, interning tokens, strings, fields, field
//! sets, paths and specs, while streaming out-of-line value payloads into the
//! sink. The six body sections and the table of contents are emitted last and
//! the bootstrap's TOC offset is back-patched.

use std::collections::HashMap;

use log::debug;

use crate::usdc::coding;
use crate::usdc::lz4;
use crate::usdc::sink::Sink;
use crate::usdc::tree::{Attribute, Prim};
use crate::usdc::value::{Meta, SpecType, Value, ValueRep, ValueType};
use crate::util::{Error, Result};

/// File magic.
pub const MAGIC: &[u8; 8] = b"PXR-USDC";
/// Format version 0.7.0.
pub const VERSION: [u8; 8] = [0, 7, 0, 0, 0, 0, 0, 0];
/// Byte offset of the back-patched TOC offset slot in the bootstrap.
pub const TOC_OFFSET_SLOT: u64 = 16;
/// Reserved bootstrap tail.
const BOOTSTRAP_RESERVED: usize = 64;

/// Int arrays at or above this length are stored delta-coded + LZ4.
const INT_COMPRESS_THRESHOLD: usize = 16;

/// Marker written after each dictionary value slot: the high half of an
/// inline token rep.
const DICT_VALUE_TAG: i32 = 0x400B_0000;

struct Field {
    token: i32,
    rep: ValueRep,
}

struct PathEntry {
    path: u32,
    token: i32,
    jump: i32,
}

struct SpecEntry {
    path: u32,
    field_set: i32,
    spec_type: SpecType,
}

struct TocEntry {
    name: &'static str,
    start: u64,
    size: u64,
}

/// Serialize a scene tree into a Crate file.
///
/// Assigns path indices and jumps, then writes the whole tree once.
pub fn encode(root: &mut Prim) -> Result<Vec<u8>> {
    root.finalize();
    CrateWriter::new().write(root)
}

/// One-shot Crate serializer with its intern tables.
pub struct CrateWriter {
    sink: Sink,
    tokens: Vec<String>,
    token_map: HashMap<String, i32>,
    strings: Vec<i32>,
    string_map: HashMap<i32, i32>,
    fields: Vec<Field>,
    field_map: HashMap<(i32, u64), i32>,
    field_sets: Vec<i32>,
    field_set_map: HashMap<Vec<i32>, i32>,
    paths: Vec<PathEntry>,
    specs: Vec<SpecEntry>,
    token_vector_map: HashMap<Vec<i32>, u64>,
    int_array_map: HashMap<Vec<i32>, u64>,
    /// Prim path -> path index, for connection/relationship targets.
    path_targets: HashMap<String, u32>,
    /// Offset of the first written time-samples frame block.
    frames_block: Option<u64>,
}

impl CrateWriter {
    pub fn new() -> Self {
        Self {
            sink: Sink::new(),
            tokens: Vec::new(),
            token_map: HashMap::new(),
            strings: Vec::new(),
            string_map: HashMap::new(),
            fields: Vec::new(),
            field_map: HashMap::new(),
            field_sets: Vec::new(),
            field_set_map: HashMap::new(),
            paths: Vec::new(),
            specs: Vec::new(),
            token_vector_map: HashMap::new(),
            int_array_map: HashMap::new(),
            path_targets: HashMap::new(),
            frames_block: None,
        }
    }

    /// Write the complete file for a finalized tree.
    pub fn write(mut self, root: &Prim) -> Result<Vec<u8>> {
        self.sink.write_bytes(MAGIC);
        self.sink.write_bytes(&VERSION);
        self.sink.write_u64(0); // TOC offset, patched below.
        self.sink.write_bytes(&[0u8; BOOTSTRAP_RESERVED]);

        self.path_targets = root.collect_paths();
        self.write_prim(root)?;

        let toc = self.write_sections()?;
        let toc_start = self.sink.pos();
        self.sink.write_u64(toc.len() as u64);
        for entry in &toc {
            let mut name = [0u8; 16];
            name[..entry.name.len()].copy_from_slice(entry.name.as_bytes());
            self.sink.write_bytes(&name);
            self.sink.write_u64(entry.start);
            self.sink.write_u64(entry.size);
        }
        self.sink.patch_u64(TOC_OFFSET_SLOT, toc_start);

        debug!(
            "crate body: {} tokens, {} strings, {} fields, {} specs, {} bytes",
            self.tokens.len(),
            self.strings.len(),
            self.fields.len(),
            self.specs.len(),
            self.sink.pos()
        );
        Ok(self.sink.into_bytes())
    }

    // ---- tree traversal ------------------------------------------------

    fn write_prim(&mut self, prim: &Prim) -> Result<()> {
        let name_token = self.token(&prim.name);
        let mut fields = Vec::new();

        if prim.is_root() {
            for (key, meta) in prim.metadata.iter() {
                fields.push(self.meta_field(key, meta)?);
            }
            if !prim.children.is_empty() {
                fields.push(self.child_names_field("primChildren", &prim.children));
            }
        } else {
            let rep = ValueRep::new(ValueType::Specifier)
                .inlined()
                .with_payload(prim.specifier as u64);
            fields.push(self.field_for("specifier", rep));

            let type_token = self.token(&prim.type_name);
            let rep = ValueRep::new(ValueType::Token)
                .inlined()
                .with_payload(type_token as u32 as u64);
            fields.push(self.field_for("typeName", rep));

            for (key, meta) in prim.metadata.iter() {
                fields.push(self.meta_field(key, meta)?);
            }
            if !prim.attributes.is_empty() {
                let names: Vec<&str> =
                    prim.attributes.iter().map(|a| a.name.as_str()).collect();
                fields.push(self.token_vector_field("properties", &names));
            }
            if !prim.children.is_empty() {
                fields.push(self.child_names_field("primChildren", &prim.children));
            }
        }

        let field_set = self.field_set(&fields);
        let spec_type = if prim.is_root() { SpecType::PseudoRoot } else { SpecType::Prim };
        self.specs.push(SpecEntry { path: prim.path_index(), field_set, spec_type });
        self.paths.push(PathEntry {
            path: prim.path_index(),
            token: -name_token,
            jump: prim.jump(),
        });

        for child in &prim.children {
            self.write_prim(child)?;
        }
        for attribute in &prim.attributes {
            self.write_attribute(attribute)?;
        }
        Ok(())
    }

    fn write_attribute(&mut self, attr: &Attribute) -> Result<()> {
        let name_token = self.token(&attr.name);
        let mut fields = Vec::new();

        let spec_type = match &attr.value {
            Some(Value::Connection(target)) => {
                let type_token = self.token(&attr.type_name);
                let rep = ValueRep::new(ValueType::Token)
                    .inlined()
                    .with_payload(type_token as u32 as u64);
                fields.push(self.field_for("typeName", rep));
                for qualifier in &attr.qualifiers {
                    fields.push(self.qualifier_field(qualifier)?);
                }
                let index = self.resolve(target)?;
                let offset = self.write_path_list_op(index);
                let rep = ValueRep::new(ValueType::PathListOp).with_payload(offset);
                fields.push(self.field_for("connectionPaths", rep));
                let offset = self.write_path_vector(index);
                let rep = ValueRep::new(ValueType::PathVector).with_payload(offset);
                fields.push(self.field_for("connectionChildren", rep));
                SpecType::Attribute
            }
            Some(Value::Relationship(target)) => {
                let rep = ValueRep::new(ValueType::Variability).inlined().with_payload(1);
                fields.push(self.field_for("variability", rep));
                let index = self.resolve(target)?;
                let offset = self.write_path_list_op(index);
                let rep = ValueRep::new(ValueType::PathListOp).with_payload(offset);
                fields.push(self.field_for("targetPaths", rep));
                let offset = self.write_path_vector(index);
                let rep = ValueRep::new(ValueType::PathVector).with_payload(offset);
                fields.push(self.field_for("targetChildren", rep));
                SpecType::Relationship
            }
            value => {
                let string = self.string_index(&attr.type_name);
                let rep = ValueRep::new(ValueType::String)
                    .inlined()
                    .with_payload(string as u32 as u64);
                fields.push(self.field_for("typeName", rep));
                for qualifier in &attr.qualifiers {
                    fields.push(self.qualifier_field(qualifier)?);
                }
                for (key, meta) in attr.metadata.iter() {
                    fields.push(self.meta_field(key, meta)?);
                }
                if let Some(value) = value {
                    let rep = self.value_rep(value)?;
                    fields.push(self.field_for("default", rep));
                }
                if !attr.samples.is_empty() {
                    let rep = self.time_samples_rep(&attr.samples)?;
                    fields.push(self.field_for("timeSamples", rep));
                }
                SpecType::Attribute
            }
        };

        let field_set = self.field_set(&fields);
        self.specs.push(SpecEntry { path: attr.path_index(), field_set, spec_type });
        // Attribute path tokens keep the source's sign convention: no flip.
        // Readers distinguish prims from properties by the spec type.
        self.paths.push(PathEntry {
            path: attr.path_index(),
            token: name_token,
            jump: attr.jump(),
        });
        Ok(())
    }

    // ---- field construction --------------------------------------------

    fn meta_field(&mut self, key: &str, meta: &Meta) -> Result<i32> {
        if key == "references" {
            return Err(Error::UnimplementedMetadata(key.to_string()));
        }
        let rep = match meta {
            Meta::Dict(entries) => {
                let offset = self.write_dictionary(entries);
                ValueRep::new(ValueType::Dictionary).with_payload(offset)
            }
            Meta::String(s) => {
                let token = self.token(s);
                ValueRep::new(ValueType::Token)
                    .inlined()
                    .with_payload(token as u32 as u64)
            }
            Meta::Float(f) => ValueRep::new(ValueType::Float)
                .inlined()
                .with_payload(u64::from(f.to_bits())),
            Meta::Bool(b) => ValueRep::new(ValueType::Bool)
                .inlined()
                .with_payload(u64::from(*b)),
            Meta::PrimRef(path) => {
                let index = self.resolve(path)?;
                let offset = self.write_path_list_op(index);
                ValueRep::new(ValueType::PathListOp).with_payload(offset)
            }
        };
        Ok(self.field_for(key, rep))
    }

    fn qualifier_field(&mut self, qualifier: &str) -> Result<i32> {
        match qualifier {
            "uniform" => {
                let rep = ValueRep::new(ValueType::Variability).inlined().with_payload(1);
                Ok(self.field_for("variability", rep))
            }
            "custom" => {
                let rep = ValueRep::new(ValueType::Bool).inlined().with_payload(1);
                Ok(self.field_for("custom", rep))
            }
            other => Err(Error::UnsupportedQualifier(other.to_string())),
        }
    }

    fn child_names_field(&mut self, name: &'static str, children: &[Prim]) -> i32 {
        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        self.token_vector_field(name, &names)
    }

    fn token_vector_field(&mut self, name: &str, names: &[&str]) -> i32 {
        let indices: Vec<i32> = names.iter().map(|n| self.token(n)).collect();
        let offset = self.token_vector_offset(indices);
        let rep = ValueRep::new(ValueType::TokenVector).with_payload(offset);
        self.field_for(name, rep)
    }

    // ---- value payloads ------------------------------------------------

    fn value_rep(&mut self, value: &Value) -> Result<ValueRep> {
        match value {
            Value::Token(s) => {
                let token = self.token(s);
                Ok(ValueRep::new(ValueType::Token)
                    .inlined()
                    .with_payload(token as u32 as u64))
            }
            Value::TokenArray(items) => {
                let indices: Vec<i32> = items.iter().map(|s| self.token(s)).collect();
                let offset = self.sink.pos();
                self.sink.write_u64(indices.len() as u64);
                for index in indices {
                    self.sink.write_i32(index);
                }
                Ok(ValueRep::new(ValueType::Token).array().with_payload(offset))
            }
            Value::TokenVector(items) => {
                let indices: Vec<i32> = items.iter().map(|s| self.token(s)).collect();
                let offset = self.token_vector_offset(indices);
                Ok(ValueRep::new(ValueType::TokenVector).with_payload(offset))
            }
            Value::IntArray(items) => {
                let offset = self.int_array_offset(items)?;
                let mut rep = ValueRep::new(ValueType::Int).array().with_payload(offset);
                if items.len() >= INT_COMPRESS_THRESHOLD {
                    rep = rep.compressed();
                }
                Ok(rep)
            }
            Value::Float(f) => Ok(ValueRep::new(ValueType::Float)
                .inlined()
                .with_payload(u64::from(f.to_bits()))),
            Value::Vec3f(v) => {
                let offset = self.sink.pos();
                self.sink.write_f32(v.x);
                self.sink.write_f32(v.y);
                self.sink.write_f32(v.z);
                Ok(ValueRep::new(ValueType::Vec3f).with_payload(offset))
            }
            Value::Vec3fArray(items) => {
                let offset = self.sink.pos();
                self.sink.write_u64(items.len() as u64);
                self.sink.write_bytes(bytemuck::cast_slice(items));
                Ok(ValueRep::new(ValueType::Vec3f).array().with_payload(offset))
            }
            Value::Bool(b) => Ok(ValueRep::new(ValueType::Bool)
                .inlined()
                .with_payload(u64::from(*b))),
            Value::Specifier(s) => Ok(ValueRep::new(ValueType::Specifier)
                .inlined()
                .with_payload(*s as u64)),
            Value::Variability(v) => Ok(ValueRep::new(ValueType::Variability)
                .inlined()
                .with_payload(u64::from(*v))),
            Value::Dictionary(entries) => {
                let offset = self.write_dictionary(entries);
                Ok(ValueRep::new(ValueType::Dictionary).with_payload(offset))
            }
            Value::Connection(_) | Value::Relationship(_) => Err(Error::UnsupportedValueType(
                "path reference outside an attribute".to_string(),
            )),
        }
    }

    fn int_array_offset(&mut self, items: &[i32]) -> Result<u64> {
        if let Some(&offset) = self.int_array_map.get(items) {
            return Ok(offset);
        }
        let offset = self.sink.pos();
        self.sink.write_u64(items.len() as u64);
        if items.len() >= INT_COMPRESS_THRESHOLD {
            let blob = lz4::compress_prefixed(&coding::encode_ints(items))?;
            self.sink.write_u64(blob.len() as u64);
            self.sink.write_bytes(&blob);
        } else {
            for &item in items {
                self.sink.write_i32(item);
            }
        }
        self.int_array_map.insert(items.to_vec(), offset);
        Ok(offset)
    }

    fn token_vector_offset(&mut self, indices: Vec<i32>) -> u64 {
        if let Some(&offset) = self.token_vector_map.get(&indices) {
            return offset;
        }
        let offset = self.sink.pos();
        self.sink.write_u64(indices.len() as u64);
        for &index in &indices {
            self.sink.write_i32(index);
        }
        self.sink.write_bytes(&[0u8; 4]);
        self.token_vector_map.insert(indices, offset);
        offset
    }

    fn write_dictionary(&mut self, entries: &[(String, String)]) -> u64 {
        // Intern up front so the payload bytes are contiguous.
        let indices: Vec<(i32, i32)> = entries
            .iter()
            .map(|(k, v)| (self.string_index(k), self.string_index(v)))
            .collect();
        let offset = self.sink.pos();
        self.sink.write_u64(indices.len() as u64);
        for (key, value) in indices {
            self.sink.write_i32(key);
            self.sink.write_u64(8);
            self.sink.write_i32(value);
            self.sink.write_i32(DICT_VALUE_TAG);
        }
        offset
    }

    fn write_path_list_op(&mut self, index: u32) -> u64 {
        let offset = self.sink.pos();
        self.sink.write_u8(3); // explicit list with explicit items
        self.sink.write_u64(1);
        self.sink.write_i32(index as i32);
        offset
    }

    fn write_path_vector(&mut self, index: u32) -> u64 {
        let offset = self.sink.pos();
        self.sink.write_u64(1);
        self.sink.write_i32(index as i32);
        offset
    }

    /// Time-sample block: frame times (written once per file and shared),
    /// then per-sample value reps as 6+1+1 pointer triples.
    fn time_samples_rep(&mut self, samples: &[(f64, Value)]) -> Result<ValueRep> {
        let mut reps = Vec::with_capacity(samples.len());
        for (_, value) in samples {
            reps.push(self.value_rep(value)?);
        }

        let start = self.sink.pos();
        match self.frames_block {
            None => {
                let count = samples.len() as u64;
                self.sink.write_u64(8 * count + 16);
                let times_block = self.sink.pos();
                self.sink.write_u64(count);
                for (time, _) in samples {
                    self.sink.write_f64(*time);
                }
                self.frames_block = Some(times_block);
                let times_rep = ValueRep::new(ValueType::DoubleVector).with_payload(times_block);
                write_rep_parts(&mut self.sink, times_rep);
            }
            Some(times_block) => {
                self.sink.write_u64(8);
                let times_rep = ValueRep::new(ValueType::DoubleVector).with_payload(times_block);
                write_rep_parts(&mut self.sink, times_rep);
            }
        }
        self.sink.write_u64(8); // value rep stride
        self.sink.write_u64(samples.len() as u64);
        for rep in reps {
            write_rep_parts(&mut self.sink, rep);
        }
        Ok(ValueRep::new(ValueType::TimeSamples).with_payload(start))
    }

    // ---- intern tables -------------------------------------------------

    fn token(&mut self, s: &str) -> i32 {
        if let Some(&index) = self.token_map.get(s) {
            return index;
        }
        let index = self.tokens.len() as i32;
        self.tokens.push(s.to_string());
        self.token_map.insert(s.to_string(), index);
        index
    }

    fn string_index(&mut self, s: &str) -> i32 {
        let token = self.token(s);
        if let Some(&index) = self.string_map.get(&token) {
            return index;
        }
        let index = self.strings.len() as i32;
        self.strings.push(token);
        self.string_map.insert(token, index);
        index
    }

    fn field_for(&mut self, name: &str, rep: ValueRep) -> i32 {
        let token = self.token(name);
        let key = (token, rep.bits());
        if let Some(&index) = self.field_map.get(&key) {
            return index;
        }
        let index = self.fields.len() as i32;
        self.fields.push(Field { token, rep });
        self.field_map.insert(key, index);
        index
    }

    fn field_set(&mut self, group: &[i32]) -> i32 {
        if let Some(&index) = self.field_set_map.get(group) {
            return index;
        }
        let index = self.field_sets.len() as i32;
        self.field_sets.extend_from_slice(group);
        self.field_sets.push(-1);
        self.field_set_map.insert(group.to_vec(), index);
        index
    }

    fn resolve(&self, path: &str) -> Result<u32> {
        self.path_targets
            .get(path)
            .copied()
            .ok_or_else(|| Error::UnresolvedTarget(path.to_string()))
    }

    // ---- sections ------------------------------------------------------

    fn write_sections(&mut self) -> Result<Vec<TocEntry>> {
        let mut toc = Vec::with_capacity(6);

        // TOKENS
        let start = self.sink.pos();
        let mut raw = Vec::new();
        for token in &self.tokens {
            raw.extend_from_slice(token.as_bytes());
            raw.push(0);
        }
        let compressed = lz4::compress_prefixed(&raw)?;
        self.sink.write_u64(self.tokens.len() as u64);
        self.sink.write_u64(raw.len() as u64);
        self.sink.write_u64(compressed.len() as u64);
        self.sink.write_bytes(&compressed);
        toc.push(TocEntry { name: "TOKENS", start, size: self.sink.pos() - start });

        // STRINGS
        let start = self.sink.pos();
        self.sink.write_u64(self.strings.len() as u64);
        for &token in &self.strings {
            self.sink.write_i32(token);
        }
        toc.push(TocEntry { name: "STRINGS", start, size: self.sink.pos() - start });

        // FIELDS
        let start = self.sink.pos();
        self.sink.write_u64(self.fields.len() as u64);
        let tokens: Vec<i32> = self.fields.iter().map(|f| f.token).collect();
        self.write_compressed_ints(&tokens)?;
        let mut reps = Vec::with_capacity(self.fields.len() * 8);
        for field in &self.fields {
            reps.extend_from_slice(&field.rep.bits().to_le_bytes());
        }
        let compressed = lz4::compress_prefixed(&reps)?;
        self.sink.write_u64(compressed.len() as u64);
        self.sink.write_bytes(&compressed);
        toc.push(TocEntry { name: "FIELDS", start, size: self.sink.pos() - start });

        // FIELDSETS
        let start = self.sink.pos();
        self.sink.write_u64(self.field_sets.len() as u64);
        let sets = std::mem::take(&mut self.field_sets);
        self.write_compressed_ints(&sets)?;
        self.field_sets = sets;
        toc.push(TocEntry { name: "FIELDSETS", start, size: self.sink.pos() - start });

        // PATHS
        let start = self.sink.pos();
        self.sink.write_u64(self.paths.len() as u64);
        self.sink.write_u64(self.paths.len() as u64);
        let indices: Vec<i32> = self.paths.iter().map(|p| p.path as i32).collect();
        self.write_compressed_ints(&indices)?;
        let tokens: Vec<i32> = self.paths.iter().map(|p| p.token).collect();
        self.write_compressed_ints(&tokens)?;
        let jumps: Vec<i32> = self.paths.iter().map(|p| p.jump).collect();
        self.write_compressed_ints(&jumps)?;
        toc.push(TocEntry { name: "PATHS", start, size: self.sink.pos() - start });

        // SPECS
        let start = self.sink.pos();
        self.sink.write_u64(self.specs.len() as u64);
        let indices: Vec<i32> = self.specs.iter().map(|s| s.path as i32).collect();
        self.write_compressed_ints(&indices)?;
        let sets: Vec<i32> = self.specs.iter().map(|s| s.field_set).collect();
        self.write_compressed_ints(&sets)?;
        let types: Vec<i32> = self.specs.iter().map(|s| s.spec_type as i32).collect();
        self.write_compressed_ints(&types)?;
        toc.push(TocEntry { name: "SPECS", start, size: self.sink.pos() - start });

        Ok(toc)
    }

    /// Delta-code, compress, and emit with a compressed-length prefix.
    fn write_compressed_ints(&mut self, values: &[i32]) -> Result<()> {
        let blob = lz4::compress_prefixed(&coding::encode_ints(values))?;
        self.sink.write_u64(blob.len() as u64);
        self.sink.write_bytes(&blob);
        Ok(())
    }
}

impl Default for CrateWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a rep as its 6+1+1 triple: 48-bit payload, type byte, flag byte.
fn write_rep_parts(sink: &mut Sink, rep: ValueRep) {
    let bits = rep.bits();
    sink.write_u48(bits & ValueRep::PAYLOAD_MASK);
    sink.write_u8((bits >> 48) as u8);
    sink.write_u8((bits >> 56) as u8);
}
