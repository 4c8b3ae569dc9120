//! Merged vertex and index regions of one render group
//!
//! The vertex buffer is non-interleaved: one contiguous stream per attribute,
//! each stream starting on a 4-byte boundary. Each stream holds the data of
//! every mesh in processing order. Indices are concatenated without rebasing;
//! draws add the mesh's `base_vertex` instead.

use crate::render::mesh::{AttributeFormat, IndexType, Mesh};

use super::struct_layout::align_up;

/// Alignment of each attribute stream inside the merged vertex buffer
pub const STREAM_ALIGNMENT: usize = 4;

/// One attribute stream inside the merged vertex buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedAttribute {
    /// Element layout
    pub format: AttributeFormat,
    /// Byte offset of the stream
    pub byte_offset: usize,
    /// Byte length of the stream
    pub byte_len: usize,
}

/// Merged geometry ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedGeometry {
    /// Vertex bytes, streams laid out back to back
    pub vertex_bytes: Vec<u8>,
    /// Index bytes, in mesh order
    pub index_bytes: Vec<u8>,
    /// Stream table, in attribute declaration order
    pub attributes: Vec<MergedAttribute>,
    /// Index width of every mesh
    pub index_type: IndexType,
    /// Total vertices
    pub vertex_count: usize,
    /// Total indices
    pub index_count: usize,
}

/// Concatenate meshes into one vertex and one index region
///
/// All meshes must share `formats` and `index_type`; the splitter checks this
/// before any merging happens.
pub fn merge(meshes: &[&Mesh], formats: &[AttributeFormat], index_type: IndexType) -> MergedGeometry {
    let vertex_count: usize = meshes.iter().map(|mesh| mesh.vertex_count()).sum();
    let index_count: usize = meshes.iter().map(|mesh| mesh.index_count()).sum();

    let mut vertex_bytes = Vec::new();
    let mut attributes = Vec::with_capacity(formats.len());

    for (position, format) in formats.iter().enumerate() {
        vertex_bytes.resize(align_up(vertex_bytes.len(), STREAM_ALIGNMENT), 0);
        let byte_offset = vertex_bytes.len();

        for mesh in meshes {
            if let Some(attribute) = mesh.attributes().get(position) {
                vertex_bytes.extend_from_slice(attribute.data().as_bytes());
            }
        }

        attributes.push(MergedAttribute {
            format: format.clone(),
            byte_offset,
            byte_len: vertex_bytes.len() - byte_offset,
        });
    }

    let mut index_bytes = Vec::with_capacity(index_count * index_type.size());
    for mesh in meshes {
        index_bytes.extend_from_slice(mesh.indices().as_bytes());
    }

    MergedGeometry {
        vertex_bytes,
        index_bytes,
        attributes,
        index_type,
        vertex_count,
        index_count,
    }
}
