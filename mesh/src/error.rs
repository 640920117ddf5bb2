//! Error types for mesh compilation.

use thiserror::Error;

/// Errors that can occur while importing, compiling, or restoring a mesh.
///
/// Recoverable conditions (unmatched bones, conflicting weights, degenerate
/// strips, ...) are never reported through this type. They are logged and
/// compilation continues.
#[derive(Debug, Error)]
pub enum MeshError {
    /// An imported attribute array does not match the position count.
    #[error("attribute '{attribute}' has {found} elements, expected {expected}")]
    AttributeCountMismatch {
        /// Attribute name (e.g. `normal`, `uv1`).
        attribute: String,
        /// Number of positions in the mesh.
        expected: usize,
        /// Number of elements actually supplied.
        found: usize,
    },
    /// A face was declared with no indices.
    #[error("face {face} has no indices")]
    EmptyFace {
        /// Face index in the import list.
        face: usize,
    },
    /// An index references a vertex that does not exist.
    #[error("{context} references vertex {index}, but only {vertex_count} vertices exist")]
    IndexOutOfRange {
        /// Where the index was found (face, bone weight, blendshape).
        context: String,
        /// The offending index.
        index: u32,
        /// Number of vertices available.
        vertex_count: usize,
    },
    /// A buffer with the given binding name is already registered.
    #[error("buffer '{0}' is already registered")]
    DuplicateBuffer(String),
    /// A required buffer is missing.
    #[error("required buffer '{0}' is missing")]
    MissingBuffer(String),
    /// A buffer's storage does not match its declared shape.
    #[error("buffer '{name}': {message}")]
    InvalidBuffer {
        /// Binding name of the buffer.
        name: String,
        /// Description of the mismatch.
        message: String,
    },
    /// The canonical vertex list is not retained (e.g. mesh restored from a snapshot).
    #[error("canonical vertices are not available; recompile the mesh from source")]
    SourceVerticesUnavailable,
    /// Snapshot encoding or decoding failed.
    #[error("format error: {0}")]
    Format(String),
}
