//! Crate value model: type tags, the rep64 value-representation word, and
//! the tagged sums carried by scene-tree attributes and metadata.

use glam::Vec3;
use smallvec::SmallVec;

/// Crate value-type tags, numerically matching the format's enum.
///
/// Only the subset the exporter emits is listed; anything else in a tree is
/// rejected at write time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    Bool = 1,
    Int = 3,
    Float = 8,
    Double = 9,
    String = 10,
    Token = 11,
    Vec3f = 24,
    Dictionary = 31,
    PathListOp = 34,
    PathVector = 40,
    TokenVector = 41,
    Specifier = 42,
    Variability = 44,
    TimeSamples = 46,
    DoubleVector = 48,
}

/// Prim specifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Specifier {
    #[default]
    Def = 0,
    Over = 1,
    Class = 2,
}

/// Spec kinds bound to path entries, numerically matching the format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SpecType {
    Attribute = 1,
    Prim = 6,
    PseudoRoot = 7,
    Relationship = 8,
}

/// 64-bit value representation: low 48 bits of payload (inline value or file
/// offset), type tag in bits 48..55, compressed/inline/array flags on top.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueRep(u64);

impl ValueRep {
    pub const ARRAY_BIT: u64 = 1 << 63;
    pub const INLINE_BIT: u64 = 1 << 62;
    pub const COMPRESSED_BIT: u64 = 1 << 61;
    pub const PAYLOAD_MASK: u64 = (1 << 48) - 1;

    /// Start a rep for the given value type.
    pub fn new(ty: ValueType) -> Self {
        Self((ty as u64) << 48)
    }

    pub fn array(self) -> Self {
        Self(self.0 | Self::ARRAY_BIT)
    }

    pub fn inlined(self) -> Self {
        Self(self.0 | Self::INLINE_BIT)
    }

    pub fn compressed(self) -> Self {
        Self(self.0 | Self::COMPRESSED_BIT)
    }

    pub fn with_payload(self, payload: u64) -> Self {
        Self((self.0 & !Self::PAYLOAD_MASK) | (payload & Self::PAYLOAD_MASK))
    }

    /// The raw 64-bit word as written to the file.
    #[inline]
    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_array(self) -> bool {
        self.0 & Self::ARRAY_BIT != 0
    }

    pub fn is_inlined(self) -> bool {
        self.0 & Self::INLINE_BIT != 0
    }

    pub fn is_compressed(self) -> bool {
        self.0 & Self::COMPRESSED_BIT != 0
    }

    pub fn payload(self) -> u64 {
        self.0 & Self::PAYLOAD_MASK
    }
}

/// Attribute value: a tagged sum over the closed set of cases the USDZ
/// exporter emits. The Crate writer dispatches on the variant; connection
/// and relationship targets are absolute prim paths resolved at write time.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Token(String),
    TokenArray(Vec<String>),
    TokenVector(Vec<String>),
    IntArray(Vec<i32>),
    Float(f32),
    Vec3f(Vec3),
    Vec3fArray(Vec<Vec3>),
    Bool(bool),
    Specifier(Specifier),
    Variability(bool),
    Dictionary(Vec<(String, String)>),
    /// Attribute-to-attribute edge, addressed by the owning prim's path.
    Connection(String),
    /// Attribute-to-prim edge.
    Relationship(String),
}

impl Value {
    /// The Crate type tag this value serializes under.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Token(_) | Value::TokenArray(_) => ValueType::Token,
            Value::TokenVector(_) => ValueType::TokenVector,
            Value::IntArray(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Vec3f(_) | Value::Vec3fArray(_) => ValueType::Vec3f,
            Value::Bool(_) => ValueType::Bool,
            Value::Specifier(_) => ValueType::Specifier,
            Value::Variability(_) => ValueType::Variability,
            Value::Dictionary(_) => ValueType::Dictionary,
            Value::Connection(_) | Value::Relationship(_) => ValueType::PathListOp,
        }
    }

    /// Whether the value serializes with the array flag set.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Value::TokenArray(_) | Value::IntArray(_) | Value::Vec3fArray(_)
        )
    }
}

/// Metadata value attached to a prim or attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum Meta {
    String(String),
    Float(f32),
    Bool(bool),
    /// String-to-string dictionary (e.g. `assetInfo`).
    Dict(Vec<(String, String)>),
    /// Reference to another prim by absolute path (e.g. `inherits`).
    PrimRef(String),
}

/// Insertion-ordered metadata map.
///
/// Small inline storage: prim and attribute metadata rarely exceeds a couple
/// of entries.
#[derive(Clone, Debug, Default)]
pub struct MetaMap {
    entries: SmallVec<[(String, Meta); 4]>,
}

impl MetaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a metadata value, replacing an existing key in place.
    pub fn set(&mut self, key: impl Into<String>, value: Meta) {
        let key = key.into();
        for (k, v) in &mut self.entries {
            if *k == key {
                *v = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&Meta> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Meta)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
