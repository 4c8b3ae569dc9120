//! Mesh representation for batched rendering
//!
//! A mesh is a set of non-interleaved, typed vertex attribute streams that
//! all share one vertex count, plus one index buffer and a topology tag.
//! Attribute storage is a sum type over the numeric element types so that
//! every consumer (layout checks, merging, upload) matches exhaustively.
//!
//! Construction validates the shared vertex count and the index range, so a
//! `Mesh` that exists is always internally consistent.

use std::collections::HashSet;

/// Largest index value stored in a 16-bit index buffer
///
/// `0xFFFF` is kept free for primitive restart, so a mesh whose maximum index
/// reaches it is stored with 32-bit indices.
pub const MAX_U16_INDEX: u32 = 0xFFFE;

/// Number of texture coordinate channels a mesh may alias
pub const MAX_TEXCOORD_CHANNELS: u8 = 8;

/// Errors raised while constructing a mesh
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// Mesh declared without any vertex attribute
    #[error("Mesh has no vertex attributes")]
    NoAttributes,

    /// Component count outside 1..=4
    #[error("Attribute '{name}' has invalid component count {components}")]
    InvalidComponentCount {
        /// Attribute name
        name: String,
        /// Declared component count
        components: u8,
    },

    /// Element count is not a whole number of vertices
    #[error("Attribute '{name}' has {elements} elements, not a multiple of {components} components")]
    PartialVertex {
        /// Attribute name
        name: String,
        /// Number of scalar elements supplied
        elements: usize,
        /// Declared component count
        components: u8,
    },

    /// Attribute vertex count disagrees with the first attribute
    #[error("Attribute '{name}' has {found} vertices, expected {expected}")]
    VertexCountMismatch {
        /// Attribute name
        name: String,
        /// Vertex count established by the first attribute
        expected: usize,
        /// Vertex count of this attribute
        found: usize,
    },

    /// Two attributes share a name
    #[error("Duplicate attribute '{0}'")]
    DuplicateAttribute(String),

    /// Texture coordinate alias beyond the supported channel count
    #[error("Texture coordinate channel {0} is out of range")]
    InvalidTexCoordChannel(u8),

    /// Index references a vertex that does not exist
    #[error("Index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Offending index value
        index: u32,
        /// Shared vertex count
        vertex_count: usize,
    },
}

/// Primitive topology of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    /// Independent triangles
    TriangleList,
    /// Independent line segments
    LineList,
    /// Connected line strip
    LineStrip,
}

/// Semantic role a vertex attribute can be aliased to
///
/// Roles are what the program generator keys shader inputs on; the attribute
/// name itself is free-form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeRole {
    /// Vertex position
    Position,
    /// Vertex normal
    Normal,
    /// Tangent vector
    Tangent,
    /// Bitangent vector
    Bitangent,
    /// Vertex color
    Color,
    /// Texture coordinate channel (0..8)
    TexCoord(u8),
}

/// Scalar element type of an attribute stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// 32-bit float
    F32,
    /// 32-bit signed integer
    I32,
    /// 32-bit unsigned integer
    U32,
    /// 16-bit signed integer
    I16,
    /// 16-bit unsigned integer
    U16,
    /// 8-bit signed integer
    I8,
    /// 8-bit unsigned integer
    U8,
}

impl ScalarType {
    /// Size of one element in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::I16 | Self::U16 => 2,
            Self::I8 | Self::U8 => 1,
        }
    }
}

/// Typed storage for one attribute stream
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    /// 32-bit floats
    F32(Vec<f32>),
    /// 32-bit signed integers
    I32(Vec<i32>),
    /// 32-bit unsigned integers
    U32(Vec<u32>),
    /// 16-bit signed integers
    I16(Vec<i16>),
    /// 16-bit unsigned integers
    U16(Vec<u16>),
    /// 8-bit signed integers
    I8(Vec<i8>),
    /// 8-bit unsigned integers
    U8(Vec<u8>),
}

impl AttributeData {
    /// Element type tag
    pub const fn scalar_type(&self) -> ScalarType {
        match self {
            Self::F32(_) => ScalarType::F32,
            Self::I32(_) => ScalarType::I32,
            Self::U32(_) => ScalarType::U32,
            Self::I16(_) => ScalarType::I16,
            Self::U16(_) => ScalarType::U16,
            Self::I8(_) => ScalarType::I8,
            Self::U8(_) => ScalarType::U8,
        }
    }

    /// Number of scalar elements
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I8(v) => v.len(),
            Self::U8(v) => v.len(),
        }
    }

    /// Whether the stream holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes in native order, as uploaded to a vertex buffer
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::F32(v) => bytemuck::cast_slice(v),
            Self::I32(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
            Self::I16(v) => bytemuck::cast_slice(v),
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::I8(v) => bytemuck::cast_slice(v),
            Self::U8(v) => v.as_slice(),
        }
    }
}

/// Layout description of an attribute, without its data
///
/// Two meshes can share a merged vertex region only if their attribute
/// formats are equal element-wise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeFormat {
    /// Attribute name
    pub name: String,
    /// Element type
    pub scalar: ScalarType,
    /// Components per vertex (1..=4)
    pub components: u8,
    /// Integer data is normalized to [0, 1] / [-1, 1] when read
    pub normalized: bool,
    /// Semantic alias, if any
    pub role: Option<AttributeRole>,
}

impl AttributeFormat {
    /// Bytes per vertex for this attribute
    pub const fn vertex_stride(&self) -> usize {
        self.scalar.size() * self.components as usize
    }
}

/// A named vertex attribute stream
#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    name: String,
    data: AttributeData,
    components: u8,
    normalized: bool,
    role: Option<AttributeRole>,
}

impl VertexAttribute {
    /// Create a new attribute stream
    pub fn new(name: impl Into<String>, data: AttributeData, components: u8) -> Self {
        Self {
            name: name.into(),
            data,
            components,
            normalized: false,
            role: None,
        }
    }

    /// Mark integer data as normalized
    #[must_use]
    pub fn normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Alias this attribute to a semantic role
    #[must_use]
    pub fn with_role(mut self, role: AttributeRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute data
    pub fn data(&self) -> &AttributeData {
        &self.data
    }

    /// Semantic alias
    pub fn role(&self) -> Option<AttributeRole> {
        self.role
    }

    /// Layout description of this attribute
    pub fn format(&self) -> AttributeFormat {
        AttributeFormat {
            name: self.name.clone(),
            scalar: self.data.scalar_type(),
            components: self.components,
            normalized: self.normalized,
            role: self.role,
        }
    }

    fn vertex_count(&self) -> Result<usize, MeshError> {
        if !(1..=4).contains(&self.components) {
            return Err(MeshError::InvalidComponentCount {
                name: self.name.clone(),
                components: self.components,
            });
        }
        let elements = self.data.len();
        let components = usize::from(self.components);
        if elements % components != 0 {
            return Err(MeshError::PartialVertex {
                name: self.name.clone(),
                elements,
                components: self.components,
            });
        }
        Ok(elements / components)
    }
}

/// Index element width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// 16-bit indices
    U16,
    /// 32-bit indices
    U32,
}

impl IndexType {
    /// Size of one index in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Index storage, width chosen from the largest index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexBuffer {
    /// 16-bit indices
    U16(Vec<u16>),
    /// 32-bit indices
    U32(Vec<u32>),
}

impl IndexBuffer {
    /// Pick the narrowest width able to hold every index
    pub fn from_indices(indices: &[u32]) -> Self {
        let max = indices.iter().copied().max().unwrap_or(0);
        if max <= MAX_U16_INDEX {
            Self::U16(indices.iter().map(|&i| i as u16).collect())
        } else {
            Self::U32(indices.to_vec())
        }
    }

    /// Element width
    pub const fn index_type(&self) -> IndexType {
        match self {
            Self::U16(_) => IndexType::U16,
            Self::U32(_) => IndexType::U32,
        }
    }

    /// Number of indices
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }

    /// Whether there are no indices
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes in native order
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Indexed mesh with typed, non-interleaved attribute streams
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    attributes: Vec<VertexAttribute>,
    indices: IndexBuffer,
    topology: Topology,
    vertex_count: usize,
}

impl Mesh {
    /// Create a mesh, validating attribute and index consistency
    pub fn new(
        topology: Topology,
        attributes: Vec<VertexAttribute>,
        indices: &[u32],
    ) -> Result<Self, MeshError> {
        let first = attributes.first().ok_or(MeshError::NoAttributes)?;
        let vertex_count = first.vertex_count()?;

        let mut names = HashSet::with_capacity(attributes.len());
        for attribute in &attributes {
            if !names.insert(attribute.name.as_str()) {
                return Err(MeshError::DuplicateAttribute(attribute.name.clone()));
            }
            if let Some(AttributeRole::TexCoord(channel)) = attribute.role {
                if channel >= MAX_TEXCOORD_CHANNELS {
                    return Err(MeshError::InvalidTexCoordChannel(channel));
                }
            }
            let found = attribute.vertex_count()?;
            if found != vertex_count {
                return Err(MeshError::VertexCountMismatch {
                    name: attribute.name.clone(),
                    expected: vertex_count,
                    found,
                });
            }
        }

        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::IndexOutOfRange { index, vertex_count });
        }

        Ok(Self {
            attributes,
            indices: IndexBuffer::from_indices(indices),
            topology,
            vertex_count,
        })
    }

    /// Shared vertex count of every attribute
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of indices
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Index element width
    pub fn index_type(&self) -> IndexType {
        self.indices.index_type()
    }

    /// Index storage
    pub fn indices(&self) -> &IndexBuffer {
        &self.indices
    }

    /// Primitive topology
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Attribute streams in declaration order
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attribute layout in declaration order
    pub fn attribute_formats(&self) -> Vec<AttributeFormat> {
        self.attributes.iter().map(VertexAttribute::format).collect()
    }
}
