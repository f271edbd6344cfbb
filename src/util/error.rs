//! Error types for the exporter library.

use thiserror::Error;

/// Main error type for export operations.
///
/// Every variant is fatal for the export that raised it; no partial output
/// is ever returned alongside an error.
#[derive(Error, Debug)]
pub enum Error {
    /// LZ4 block input exceeds the format's hard size limit
    #[error("input of {0} bytes exceeds the LZ4 block limit")]
    InputTooLarge(usize),

    /// Attribute value carries a type the Crate writer does not emit
    #[error("unsupported value type: {0}")]
    UnsupportedValueType(String),

    /// Prim metadata key with no serialization path (e.g. `references`)
    #[error("prim metadata `{0}` is not implemented")]
    UnimplementedMetadata(String),

    /// Attribute qualifier outside the closed set the writer understands
    #[error("unknown attribute qualifier `{0}`")]
    UnsupportedQualifier(String),

    /// Mesh has differing position and normal counts
    #[error("positions/normals length mismatch: {positions} positions, {normals} normals")]
    NormalCountMismatch { positions: usize, normals: usize },

    /// Face index list length is not a multiple of three
    #[error("face list length {0} is not divisible by 3")]
    RaggedFaceList(usize),

    /// Face references a vertex past the end of the position list
    #[error("face index {index} out of range (vertex count {count})")]
    FaceIndexOutOfRange { index: u32, count: usize },

    /// Connection or relationship names a path absent from the scene tree
    #[error("connection or relationship target not found: {0}")]
    UnresolvedTarget(String),

    /// glTF manifest serialization failed
    #[error("JSON serialize error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, Error>;
