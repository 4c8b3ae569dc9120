//! Draw command synthesis
//!
//! The draw mode is fixed once from the device capabilities. Both modes walk
//! the same mesh-usage units in the same order (batched meshes first, then
//! instanced meshes) and accumulate `first_index`, `base_vertex` and
//! `base_instance` monotonically across the group.
//!
//! ## Modes
//!
//! - **Indirect**: one [`DrawElementsIndirectCommand`] per unit, uploaded as a
//!   tightly packed command buffer and drawn with one call
//! - **Direct**: parallel count/offset/base-vertex arrays for the batch, drawn
//!   with one multi-draw, plus one [`InstancedDraw`] per instanced mesh

use bytemuck::{Pod, Zeroable};

use crate::render::mesh::IndexType;

/// How a group's draws reach the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    /// Commands read from a GPU-resident buffer
    Indirect,
    /// Parameters supplied with each call
    Direct,
}

/// One indexed indirect draw record
///
/// Field order and width match the command layout consumed by indexed
/// multi-draw-indirect: five tightly packed 32-bit unsigned integers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct DrawElementsIndirectCommand {
    /// Indices per instance
    pub index_count: u32,
    /// Instances to draw
    pub instance_count: u32,
    /// First index in the merged index region
    pub first_index: u32,
    /// Added to every index before vertex fetch
    pub base_vertex: u32,
    /// First per-object record of this draw
    pub base_instance: u32,
}

/// Parallel multi-draw arrays for the batch list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultiDrawParams {
    /// Indices per draw
    pub counts: Vec<u32>,
    /// Byte offset of each draw into the index buffer
    pub byte_offsets: Vec<usize>,
    /// Base vertex of each draw
    pub base_vertices: Vec<i32>,
}

impl MultiDrawParams {
    /// Number of draws
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Whether there are no draws
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// One instanced draw in direct mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstancedDraw {
    /// Indices per instance
    pub count: u32,
    /// First index in the merged index region
    pub first_index: u32,
    /// Instances to draw
    pub instance_count: u32,
    /// Base vertex
    pub base_vertex: i32,
    /// First per-object record
    pub base_instance: u32,
}

/// Synthesized draws of one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawCommands {
    /// Indirect command list
    Indirect(Vec<DrawElementsIndirectCommand>),
    /// Batch multi-draw arrays plus explicit instanced draws
    Direct {
        /// Batch list multi-draw
        batch: MultiDrawParams,
        /// One draw per instanced mesh
        instanced: Vec<InstancedDraw>,
    },
}

impl DrawCommands {
    /// Number of mesh-usage units
    pub fn unit_count(&self) -> usize {
        match self {
            Self::Indirect(commands) => commands.len(),
            Self::Direct { batch, instanced } => batch.len() + instanced.len(),
        }
    }

    /// Indirect command list, if in indirect mode
    pub fn indirect(&self) -> Option<&[DrawElementsIndirectCommand]> {
        match self {
            Self::Indirect(commands) => Some(commands),
            Self::Direct { .. } => None,
        }
    }
}

/// Accumulates mesh-usage units into draw commands
#[derive(Debug)]
pub struct DrawCommandBuilder {
    mode: DrawMode,
    index_type: IndexType,
    first_index: u32,
    base_vertex: u32,
    base_instance: u32,
    commands: DrawCommands,
}

impl DrawCommandBuilder {
    /// Start an empty command list
    pub fn new(mode: DrawMode, index_type: IndexType) -> Self {
        let commands = match mode {
            DrawMode::Indirect => DrawCommands::Indirect(Vec::new()),
            DrawMode::Direct => DrawCommands::Direct {
                batch: MultiDrawParams::default(),
                instanced: Vec::new(),
            },
        };
        Self {
            mode,
            index_type,
            first_index: 0,
            base_vertex: 0,
            base_instance: 0,
            commands,
        }
    }

    /// Selected mode
    pub fn mode(&self) -> DrawMode {
        self.mode
    }

    /// Append a batch-list mesh, drawn once
    ///
    /// Call for every batch mesh before the first instanced mesh.
    pub fn push_batch_mesh(&mut self, index_count: u32, vertex_count: u32) {
        match &mut self.commands {
            DrawCommands::Indirect(commands) => commands.push(DrawElementsIndirectCommand {
                index_count,
                instance_count: 1,
                first_index: self.first_index,
                base_vertex: self.base_vertex,
                base_instance: self.base_instance,
            }),
            DrawCommands::Direct { batch, .. } => {
                batch.counts.push(index_count);
                batch.byte_offsets.push(self.first_index as usize * self.index_type.size());
                batch.base_vertices.push(self.base_vertex as i32);
            }
        }
        self.advance(index_count, vertex_count, 1);
    }

    /// Append a mesh drawn `instance_count` times
    pub fn push_instanced_mesh(&mut self, index_count: u32, vertex_count: u32, instance_count: u32) {
        match &mut self.commands {
            DrawCommands::Indirect(commands) => commands.push(DrawElementsIndirectCommand {
                index_count,
                instance_count,
                first_index: self.first_index,
                base_vertex: self.base_vertex,
                base_instance: self.base_instance,
            }),
            DrawCommands::Direct { instanced, .. } => instanced.push(InstancedDraw {
                count: index_count,
                first_index: self.first_index,
                instance_count,
                base_vertex: self.base_vertex as i32,
                base_instance: self.base_instance,
            }),
        }
        self.advance(index_count, vertex_count, instance_count);
    }

    fn advance(&mut self, index_count: u32, vertex_count: u32, instances: u32) {
        self.first_index += index_count;
        self.base_vertex += vertex_count;
        self.base_instance += instances;
    }

    /// Finish the list
    pub fn finish(self) -> DrawCommands {
        self.commands
    }
}
