//! Headless GPU backend for testing and offline inspection
//!
//! Performs no GPU work. Every call is recorded in order, and buffer contents,
//! texture array descriptions and uploaded layers are kept in memory so tests
//! can check the exact bytes the compiler produced.

use std::collections::{BTreeMap, HashMap};

use crate::render::batching::{FeatureSignature, InstancedDraw, MultiDrawParams};
use crate::render::mesh::{IndexType, Topology};

use super::{
    BufferHandle, BufferUsage, CompiledProgram, GpuBackend, ProgramError, ProgramGenerator, ProgramHandle,
    TextureArrayDesc, TextureArrayHandle, UniformBlock, VertexArrayDesc, VertexArrayHandle, VertexAttributeBinding,
};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// Buffer created
    CreateBuffer {
        /// New handle
        buffer: BufferHandle,
        /// Intended use
        usage: BufferUsage,
        /// Initial size in bytes
        size: usize,
    },
    /// Buffer region overwritten
    UpdateBuffer {
        /// Target buffer
        buffer: BufferHandle,
        /// Byte offset
        offset: usize,
        /// Bytes written
        size: usize,
    },
    /// Buffer released
    DeleteBuffer(BufferHandle),
    /// Vertex array created
    CreateVertexArray(VertexArrayHandle),
    /// Vertex array released
    DeleteVertexArray(VertexArrayHandle),
    /// Texture array allocated
    CreateTextureArray {
        /// New handle
        texture: TextureArrayHandle,
        /// Storage description
        desc: TextureArrayDesc,
    },
    /// One layer uploaded
    UploadTextureLayer {
        /// Target array
        texture: TextureArrayHandle,
        /// Layer index
        layer: u32,
        /// Source width
        width: u32,
        /// Source height
        height: u32,
    },
    /// Mip chain generated
    GenerateMipmaps(TextureArrayHandle),
    /// Texture array released
    DeleteTextureArray(TextureArrayHandle),
    /// Uniform block bound to a binding point
    BindUniformBlock {
        /// Program
        program: ProgramHandle,
        /// Block name
        block: String,
        /// Binding point
        binding: u32,
    },
    /// Program made current
    UseProgram(ProgramHandle),
    /// Vertex array made current
    BindVertexArray(VertexArrayHandle),
    /// Uniform buffer attached to a binding point
    BindUniformBuffer {
        /// Binding point
        binding: u32,
        /// Buffer
        buffer: BufferHandle,
    },
    /// Texture array attached to a unit
    BindTextureArray {
        /// Texture unit
        unit: u32,
        /// Array texture
        texture: TextureArrayHandle,
    },
    /// Indirect multi-draw
    MultiDrawIndexedIndirect {
        /// Topology
        topology: Topology,
        /// Index width
        index_type: IndexType,
        /// Command buffer
        commands: BufferHandle,
        /// Commands drawn
        draw_count: u32,
    },
    /// Direct multi-draw
    MultiDrawIndexed {
        /// Topology
        topology: Topology,
        /// Index width
        index_type: IndexType,
        /// Parallel draw arrays
        params: MultiDrawParams,
    },
    /// Direct instanced draw
    DrawIndexedInstanced {
        /// Topology
        topology: Topology,
        /// Index width
        index_type: IndexType,
        /// Draw parameters
        draw: InstancedDraw,
    },
}

impl BackendCall {
    /// Whether this call issues a draw
    pub const fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::MultiDrawIndexedIndirect { .. } | Self::MultiDrawIndexed { .. } | Self::DrawIndexedInstanced { .. }
        )
    }
}

#[derive(Debug)]
struct StoredBuffer {
    usage: BufferUsage,
    data: Vec<u8>,
}

/// Backend that records calls and keeps resource contents in memory
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_handle: u32,
    calls: Vec<BackendCall>,
    buffers: BTreeMap<BufferHandle, StoredBuffer>,
    vertex_arrays: BTreeMap<VertexArrayHandle, Vec<VertexAttributeBinding>>,
    textures: BTreeMap<TextureArrayHandle, TextureArrayDesc>,
    layers: HashMap<(TextureArrayHandle, u32), Vec<u8>>,
}

impl HeadlessBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the backend name
    pub fn name(&self) -> &'static str {
        "Headless Backend"
    }

    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Calls recorded so far, in order
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Forget recorded calls, keeping resources
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of draw calls recorded
    pub fn draw_calls(&self) -> usize {
        self.calls.iter().filter(|call| call.is_draw()).count()
    }

    /// Current contents of a live buffer
    pub fn buffer(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|stored| stored.data.as_slice())
    }

    /// Usage a live buffer was created with
    pub fn buffer_usage(&self, buffer: BufferHandle) -> Option<BufferUsage> {
        self.buffers.get(&buffer).map(|stored| stored.usage)
    }

    /// Number of live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live buffers created with `usage`
    pub fn live_buffers_with_usage(&self, usage: BufferUsage) -> usize {
        self.buffers.values().filter(|stored| stored.usage == usage).count()
    }

    /// Number of live vertex arrays
    pub fn live_vertex_arrays(&self) -> usize {
        self.vertex_arrays.len()
    }

    /// Number of live texture arrays
    pub fn live_texture_arrays(&self) -> usize {
        self.textures.len()
    }

    /// Attribute streams of a live vertex array
    pub fn vertex_array(&self, vertex_array: VertexArrayHandle) -> Option<&[VertexAttributeBinding]> {
        self.vertex_arrays.get(&vertex_array).map(Vec::as_slice)
    }

    /// Storage description of a live texture array
    pub fn texture_desc(&self, texture: TextureArrayHandle) -> Option<&TextureArrayDesc> {
        self.textures.get(&texture)
    }

    /// Pixels uploaded to one layer
    pub fn layer_pixels(&self, texture: TextureArrayHandle, layer: u32) -> Option<&[u8]> {
        self.layers.get(&(texture, layer)).map(Vec::as_slice)
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_buffer(&mut self, usage: BufferUsage, data: &[u8]) -> BufferHandle {
        let buffer = BufferHandle(self.allocate());
        log::trace!("HeadlessBackend: creating {:?} buffer {:?} ({} bytes)", usage, buffer, data.len());
        self.buffers.insert(buffer, StoredBuffer { usage, data: data.to_vec() });
        self.calls.push(BackendCall::CreateBuffer {
            buffer,
            usage,
            size: data.len(),
        });
        buffer
    }

    fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) {
        let Some(stored) = self.buffers.get_mut(&buffer) else {
            log::warn!("HeadlessBackend: update of unknown buffer {:?}", buffer);
            return;
        };
        let end = offset + data.len();
        if stored.data.len() < end {
            stored.data.resize(end, 0);
        }
        stored.data[offset..end].copy_from_slice(data);
        self.calls.push(BackendCall::UpdateBuffer {
            buffer,
            offset,
            size: data.len(),
        });
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_none() {
            log::warn!("HeadlessBackend: delete of unknown buffer {:?}", buffer);
        }
        self.calls.push(BackendCall::DeleteBuffer(buffer));
    }

    fn create_vertex_array(&mut self, desc: &VertexArrayDesc<'_>) -> VertexArrayHandle {
        let vertex_array = VertexArrayHandle(self.allocate());
        self.vertex_arrays.insert(vertex_array, desc.attributes.to_vec());
        self.calls.push(BackendCall::CreateVertexArray(vertex_array));
        vertex_array
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array);
        self.calls.push(BackendCall::DeleteVertexArray(vertex_array));
    }

    fn create_texture_array(&mut self, desc: &TextureArrayDesc) -> TextureArrayHandle {
        let texture = TextureArrayHandle(self.allocate());
        log::trace!(
            "HeadlessBackend: creating texture array {:?} ({}x{}x{})",
            texture,
            desc.width,
            desc.height,
            desc.layers
        );
        self.textures.insert(texture, *desc);
        self.calls.push(BackendCall::CreateTextureArray { texture, desc: *desc });
        texture
    }

    fn upload_texture_layer(&mut self, texture: TextureArrayHandle, layer: u32, width: u32, height: u32, pixels: &[u8]) {
        self.layers.insert((texture, layer), pixels.to_vec());
        self.calls.push(BackendCall::UploadTextureLayer {
            texture,
            layer,
            width,
            height,
        });
    }

    fn generate_mipmaps(&mut self, texture: TextureArrayHandle) {
        self.calls.push(BackendCall::GenerateMipmaps(texture));
    }

    fn delete_texture_array(&mut self, texture: TextureArrayHandle) {
        self.textures.remove(&texture);
        self.layers.retain(|(owner, _), _| *owner != texture);
        self.calls.push(BackendCall::DeleteTextureArray(texture));
    }

    fn bind_uniform_block(&mut self, program: ProgramHandle, block_name: &str, binding: u32) {
        self.calls.push(BackendCall::BindUniformBlock {
            program,
            block: block_name.to_string(),
            binding,
        });
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.calls.push(BackendCall::UseProgram(program));
    }

    fn bind_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.calls.push(BackendCall::BindVertexArray(vertex_array));
    }

    fn bind_uniform_buffer(&mut self, binding: u32, buffer: BufferHandle) {
        self.calls.push(BackendCall::BindUniformBuffer { binding, buffer });
    }

    fn bind_texture_array(&mut self, unit: u32, texture: TextureArrayHandle) {
        self.calls.push(BackendCall::BindTextureArray { unit, texture });
    }

    fn multi_draw_indexed_indirect(
        &mut self,
        topology: Topology,
        index_type: IndexType,
        commands: BufferHandle,
        draw_count: u32,
    ) {
        self.calls.push(BackendCall::MultiDrawIndexedIndirect {
            topology,
            index_type,
            commands,
            draw_count,
        });
    }

    fn multi_draw_indexed(&mut self, topology: Topology, index_type: IndexType, params: &MultiDrawParams) {
        self.calls.push(BackendCall::MultiDrawIndexed {
            topology,
            index_type,
            params: params.clone(),
        });
    }

    fn draw_indexed_instanced(&mut self, topology: Topology, index_type: IndexType, draw: &InstancedDraw) {
        self.calls.push(BackendCall::DrawIndexedInstanced {
            topology,
            index_type,
            draw: *draw,
        });
    }
}

/// Program generator producing a fixed uniform block manifest
///
/// Every program declares `mvps`, `models`, `normals` and `materials`, plus one
/// layer index block per active map slot. Block names are the purpose with a
/// `Block` suffix.
#[derive(Debug, Default)]
pub struct HeadlessProgramGenerator {
    next_handle: u32,
    generated: usize,
    unsupported_flags: Vec<String>,
}

impl HeadlessProgramGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse signatures that enable `flag`
    #[must_use]
    pub fn with_unsupported_flag(mut self, flag: impl Into<String>) -> Self {
        self.unsupported_flags.push(flag.into());
        self
    }

    /// Programs generated so far
    pub fn generated(&self) -> usize {
        self.generated
    }

    /// Block manifest of a signature
    pub fn manifest(signature: &FeatureSignature) -> Vec<UniformBlock> {
        ["mvps", "models", "normals", "materials"]
            .into_iter()
            .chain(signature.maps().slots().map(|slot| slot.indices_purpose()))
            .map(|purpose| UniformBlock::new(format!("{purpose}Block"), purpose))
            .collect()
    }
}

impl ProgramGenerator for HeadlessProgramGenerator {
    fn generate(&mut self, signature: &FeatureSignature) -> Result<CompiledProgram, ProgramError> {
        if let Some(flag) = self.unsupported_flags.iter().find(|flag| signature.flags().contains(*flag)) {
            return Err(ProgramError::Unsupported(format!("flag '{flag}'")));
        }

        self.next_handle += 1;
        self.generated += 1;
        Ok(CompiledProgram {
            handle: ProgramHandle(self.next_handle),
            uniform_blocks: Self::manifest(signature),
        })
    }
}
