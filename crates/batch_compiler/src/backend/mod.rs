//! Backend abstraction traits for the batch compiler
//!
//! The compiler never talks to a graphics API directly. GPU object lifetime
//! (buffers, texture arrays, vertex arrays) and program generation are
//! external collaborators reached through the two traits defined here; the
//! compiler only supplies byte offsets, sizes and raw byte spans.
//!
//! ## Implementations
//!
//! - [`headless::HeadlessBackend`]: records every call and keeps buffer
//!   contents in memory. Used by tests and tools that inspect compiled output.

pub mod headless;

use crate::render::batching::{DrawElementsIndirectCommand, FeatureSignature, InstancedDraw, MultiDrawParams};
use crate::render::mesh::{AttributeFormat, IndexType, Topology};

/// Handle for a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Handle for a GPU 2D array texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureArrayHandle(pub u32);

/// Handle for a vertex array (attribute bindings + index buffer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayHandle(pub u32);

/// Opaque handle for a compiled GPU program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// Intended use of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Merged vertex attribute region
    Vertex,
    /// Merged index region
    Index,
    /// Per-object uniform data
    Uniform,
    /// Indirect draw command list
    DrawIndirect,
}

/// Storage description for a 2D array texture (RGBA8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureArrayDesc {
    /// Width of every layer
    pub width: u32,
    /// Height of every layer
    pub height: u32,
    /// Number of layers
    pub layers: u32,
    /// Allocated mip levels
    pub mip_levels: u32,
}

/// One attribute stream inside a merged vertex buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexAttributeBinding {
    /// Shader input location
    pub location: u32,
    /// Element layout
    pub format: AttributeFormat,
    /// Byte offset of the stream inside the vertex buffer
    pub byte_offset: usize,
}

/// Everything needed to create a vertex array object
#[derive(Debug, Clone, Copy)]
pub struct VertexArrayDesc<'a> {
    /// Merged vertex buffer
    pub vertex_buffer: BufferHandle,
    /// Merged index buffer
    pub index_buffer: BufferHandle,
    /// Index element width
    pub index_type: IndexType,
    /// Attribute streams, tightly packed per stream
    pub attributes: &'a [VertexAttributeBinding],
}

/// A uniform block required by a compiled program
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniformBlock {
    /// Block name inside the program
    pub name: String,
    /// What the block holds, e.g. `"mvps"` or `"diffuseMapIndices"`
    pub purpose: String,
}

impl UniformBlock {
    /// Create a new uniform block requirement
    pub fn new(name: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            purpose: purpose.into(),
        }
    }
}

/// Output of program generation: a handle plus its uniform block manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    /// Program handle
    pub handle: ProgramHandle,
    /// Uniform blocks the program declares
    pub uniform_blocks: Vec<UniformBlock>,
}

/// Errors reported by a program generator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    /// Source generation or compilation failed
    #[error("Program generation failed: {0}")]
    Generation(String),

    /// The generator has no program for this feature combination
    #[error("Unsupported feature combination: {0}")]
    Unsupported(String),
}

/// Generates GPU programs for feature signatures
pub trait ProgramGenerator {
    /// Build (or fetch) a program for the given signature
    fn generate(&mut self, signature: &FeatureSignature) -> Result<CompiledProgram, ProgramError>;
}

/// GPU resource and draw primitives used by the compiler
///
/// Creation calls allocate storage and upload the initial contents in one
/// step. All calls are synchronous.
pub trait GpuBackend {
    /// Create a buffer initialized with `data`
    fn create_buffer(&mut self, usage: BufferUsage, data: &[u8]) -> BufferHandle;

    /// Overwrite part of a buffer starting at `offset` bytes
    fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]);

    /// Release a buffer
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Create a vertex array over merged buffers
    fn create_vertex_array(&mut self, desc: &VertexArrayDesc<'_>) -> VertexArrayHandle;

    /// Release a vertex array
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Allocate storage for a 2D array texture
    fn create_texture_array(&mut self, desc: &TextureArrayDesc) -> TextureArrayHandle;

    /// Upload RGBA8 pixels into mip level 0 of one layer, at the origin
    fn upload_texture_layer(&mut self, texture: TextureArrayHandle, layer: u32, width: u32, height: u32, pixels: &[u8]);

    /// Generate the mip chain of every layer
    fn generate_mipmaps(&mut self, texture: TextureArrayHandle);

    /// Release a texture array
    fn delete_texture_array(&mut self, texture: TextureArrayHandle);

    /// Bind a program's uniform block to a binding point
    fn bind_uniform_block(&mut self, program: ProgramHandle, block_name: &str, binding: u32);

    /// Make a program current
    fn use_program(&mut self, program: ProgramHandle);

    /// Make a vertex array current
    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle);

    /// Attach a uniform buffer to a binding point
    fn bind_uniform_buffer(&mut self, binding: u32, buffer: BufferHandle);

    /// Attach a texture array to a texture unit
    fn bind_texture_array(&mut self, unit: u32, texture: TextureArrayHandle);

    /// Issue `draw_count` commands read from an indirect buffer
    fn multi_draw_indexed_indirect(
        &mut self,
        topology: Topology,
        index_type: IndexType,
        commands: BufferHandle,
        draw_count: u32,
    );

    /// Issue one multi-draw from parallel count/offset/base-vertex arrays
    fn multi_draw_indexed(&mut self, topology: Topology, index_type: IndexType, params: &MultiDrawParams);

    /// Issue one instanced draw
    fn draw_indexed_instanced(&mut self, topology: Topology, index_type: IndexType, draw: &InstancedDraw);
}

/// Bytes of an indirect command list, in upload order
pub fn indirect_bytes(commands: &[DrawElementsIndirectCommand]) -> &[u8] {
    bytemuck::cast_slice(commands)
}
