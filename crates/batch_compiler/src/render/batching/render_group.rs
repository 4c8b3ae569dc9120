//! # Render Groups
//!
//! A render group is the compiled output unit: one program, one merged vertex
//! region, one merged index region, per-object uniform buffers, one texture
//! array per active map slot and the draw commands that tie them together.
//!
//! ## Build Order
//!
//! 1. Split into batch and instance lists (checks the structural precondition)
//! 2. Resolve every uniform block purpose to a binding point
//! 3. Merge and upload geometry, create the vertex array
//! 4. Upload per-object matrices, packed materials and layer index records
//! 5. Pack and upload texture arrays
//! 6. Synthesize draw commands (and the indirect buffer, in indirect mode)
//!
//! Steps 1 and 2 touch no GPU storage, so a structural mismatch or an
//! exhausted binding pool leaves nothing behind.
//!
//! ## Per-object Order
//!
//! Every per-object buffer lists batch members first, then each instance list
//! in first-seen order. Draw `base_instance` values index into this order.

use crate::backend::{
    indirect_bytes, BufferHandle, BufferUsage, CompiledProgram, GpuBackend, ProgramHandle, TextureArrayHandle,
    VertexArrayDesc, VertexArrayHandle, VertexAttributeBinding,
};
use crate::foundation::collections::{MaterialKey, MeshKey};
use crate::foundation::math::{matrix_bytes, normal_matrix, Mat4, MAT4_SIZE};
use crate::render::material::{MapSlot, MaterialParameter, ProgramKind};
use crate::render::mesh::{IndexType, Mesh, Topology};
use crate::render::scene::{Renderable, Scene};

use super::draw_commands::{DrawCommandBuilder, DrawCommands, DrawMode};
use super::error::{BuildError, BuildResult};
use super::geometry;
use super::observers::GroupId;
use super::signature::FeatureSignature;
use super::splitter::{self, SplitGroup};
use super::struct_layout::{FieldDecl, FieldValue, StructArray, StructLayout};
use super::texture_packer::{self, LayerRecord};
use super::bindings::BindingAllocator;

/// Uniform purpose of the MVP matrix buffer
pub const MVPS_PURPOSE: &str = "mvps";
/// Uniform purpose of the model matrix buffer
pub const MODELS_PURPOSE: &str = "models";
/// Uniform purpose of the normal matrix buffer
pub const NORMALS_PURPOSE: &str = "normals";
/// Uniform purpose of the packed material buffer
pub const MATERIALS_PURPOSE: &str = "materials";

/// Options fixed for the compiler's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Draw command mode
    pub draw_mode: DrawMode,
    /// Allocate and generate full mip chains
    pub generate_mipmaps: bool,
    /// Device limit on one uniform block, in bytes
    pub max_uniform_block_size: usize,
}

/// A uniform block of the group's program, resolved to a binding point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundBlock {
    /// Block purpose
    pub purpose: String,
    /// Binding point
    pub binding: u32,
}

/// Texture array of one map slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTextures {
    /// Map slot
    pub slot: MapSlot,
    /// Array texture
    pub texture: TextureArrayHandle,
    /// Layer index buffer
    pub indices: BufferHandle,
    /// Layer record per object
    pub records: Vec<LayerRecord>,
}

/// Per-object matrix buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MatrixBuffers {
    mvps: BufferHandle,
    models: BufferHandle,
    normals: BufferHandle,
}

/// Packed per-object matrices, 64 bytes per object
#[derive(Debug, Default)]
struct MatrixData {
    mvps: Vec<u8>,
    models: Vec<u8>,
    normals: Vec<u8>,
}

impl MatrixData {
    fn compute(objects: &[Renderable], scene: &Scene, view_projection: &Mat4) -> BuildResult<Self> {
        let capacity = objects.len() * MAT4_SIZE;
        let mut data = Self {
            mvps: Vec::with_capacity(capacity),
            models: Vec::with_capacity(capacity),
            normals: Vec::with_capacity(capacity),
        };

        for object in objects {
            let transform = scene
                .transform(object.transform)
                .ok_or(BuildError::MissingResource("transform"))?;
            let model = transform.to_matrix();
            data.mvps.extend_from_slice(matrix_bytes(&(view_projection * model)));
            data.models.extend_from_slice(matrix_bytes(&model));
            data.normals.extend_from_slice(matrix_bytes(&normal_matrix(&model)));
        }

        Ok(data)
    }
}

/// Struct layout of the material parameters of a program kind
pub fn material_layout(kind: &ProgramKind) -> StructLayout {
    StructLayout::new(
        kind.declared_parameters()
            .iter()
            .filter_map(|decl| FieldDecl::for_parameter(decl.name, decl.kind)),
    )
}

/// One compiled, GPU-ready group
#[derive(Debug)]
pub struct RenderGroup {
    id: GroupId,
    signature: FeatureSignature,
    program: ProgramHandle,
    blocks: Vec<BoundBlock>,
    topology: Topology,
    index_type: IndexType,
    objects: Vec<Renderable>,
    batch_len: usize,
    instance_lists: Vec<(MeshKey, usize)>,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    vertex_array: VertexArrayHandle,
    matrices: MatrixBuffers,
    materials: StructArray,
    materials_buffer: BufferHandle,
    textures: Vec<SlotTextures>,
    commands: DrawCommands,
    indirect_buffer: Option<BufferHandle>,
    dropped_field_writes: usize,
    materials_oversized: bool,
}

impl RenderGroup {
    /// Build a group from one capacity-bounded, dimension-compatible sub-group
    ///
    /// A structural mismatch or an exhausted binding pool returns before any
    /// buffer, vertex array or texture is created.
    pub fn build(
        id: GroupId,
        members: &[&Renderable],
        signature: &FeatureSignature,
        program: &CompiledProgram,
        scene: &Scene,
        bindings: &mut BindingAllocator,
        options: BuildOptions,
        backend: &mut dyn GpuBackend,
    ) -> BuildResult<Self> {
        let split = splitter::split(members, scene)?;

        let blocks = program
            .uniform_blocks
            .iter()
            .map(|block| {
                bindings.allocate(&block.purpose).map(|binding| BoundBlock {
                    purpose: block.purpose.clone(),
                    binding,
                })
            })
            .collect::<BuildResult<Vec<_>>>()?;
        for (block, bound) in program.uniform_blocks.iter().zip(&blocks) {
            backend.bind_uniform_block(program.handle, &block.name, bound.binding);
        }

        let objects: Vec<Renderable> = split.ordered_members().copied().collect();
        let meshes = unit_meshes(&split, scene)?;

        let merged = geometry::merge(&meshes, &split.attributes, split.index_type);
        let vertex_buffer = backend.create_buffer(BufferUsage::Vertex, &merged.vertex_bytes);
        let index_buffer = backend.create_buffer(BufferUsage::Index, &merged.index_bytes);
        let attribute_bindings: Vec<VertexAttributeBinding> = merged
            .attributes
            .iter()
            .enumerate()
            .map(|(location, attribute)| VertexAttributeBinding {
                location: location as u32,
                format: attribute.format.clone(),
                byte_offset: attribute.byte_offset,
            })
            .collect();
        let vertex_array = backend.create_vertex_array(&VertexArrayDesc {
            vertex_buffer,
            index_buffer,
            index_type: split.index_type,
            attributes: &attribute_bindings,
        });

        let matrix_data = MatrixData::compute(&objects, scene, &Mat4::identity())?;
        let matrices = MatrixBuffers {
            mvps: backend.create_buffer(BufferUsage::Uniform, &matrix_data.mvps),
            models: backend.create_buffer(BufferUsage::Uniform, &matrix_data.models),
            normals: backend.create_buffer(BufferUsage::Uniform, &matrix_data.normals),
        };

        let (materials, dropped_field_writes) = pack_materials(&objects, signature.kind(), scene)?;
        let materials_buffer = backend.create_buffer(BufferUsage::Uniform, materials.bytes());
        // Object capacity is bounded by matrix size only, so wide material structs can overrun
        let materials_oversized = materials.bytes().len() > options.max_uniform_block_size;
        if materials_oversized {
            log::warn!(
                "Render group {:?}: materials block of {} bytes exceeds the {}-byte uniform block limit",
                id,
                materials.bytes().len(),
                options.max_uniform_block_size
            );
        }

        let member_refs: Vec<&Renderable> = objects.iter().collect();
        let packings = texture_packer::pack(&member_refs, signature.maps(), scene, options.generate_mipmaps)?;
        let mut textures = Vec::with_capacity(packings.len());
        for packing in packings {
            let texture = texture_packer::upload(&packing, scene, backend)?;
            let indices = backend.create_buffer(BufferUsage::Uniform, packing.record_bytes());
            textures.push(SlotTextures {
                slot: packing.slot,
                texture,
                indices,
                records: packing.records,
            });
        }

        let mut builder = DrawCommandBuilder::new(options.draw_mode, split.index_type);
        for (mesh, _) in meshes.iter().zip(&split.batch) {
            builder.push_batch_mesh(mesh.index_count() as u32, mesh.vertex_count() as u32);
        }
        for (mesh, list) in meshes[split.batch.len()..].iter().zip(&split.instances) {
            builder.push_instanced_mesh(
                mesh.index_count() as u32,
                mesh.vertex_count() as u32,
                list.instance_count() as u32,
            );
        }
        let commands = builder.finish();
        let indirect_buffer = commands
            .indirect()
            .map(|list| backend.create_buffer(BufferUsage::DrawIndirect, indirect_bytes(list)));

        log::debug!(
            "Built render group {:?}: {} objects ({} batched, {} instance lists), {} draws",
            id,
            objects.len(),
            split.batch.len(),
            split.instances.len(),
            commands.unit_count()
        );

        Ok(Self {
            id,
            signature: signature.clone(),
            program: program.handle,
            blocks,
            topology: split.topology,
            index_type: split.index_type,
            batch_len: split.batch.len(),
            instance_lists: split
                .instances
                .iter()
                .map(|list| (list.mesh, list.instance_count()))
                .collect(),
            objects,
            vertex_buffer,
            index_buffer,
            vertex_array,
            matrices,
            materials,
            materials_buffer,
            textures,
            commands,
            indirect_buffer,
            dropped_field_writes,
            materials_oversized,
        })
    }

    /// Recompute and re-upload the three matrix buffers
    pub fn update_transforms(
        &self,
        scene: &Scene,
        view_projection: &Mat4,
        backend: &mut dyn GpuBackend,
    ) -> BuildResult<()> {
        let data = MatrixData::compute(&self.objects, scene, view_projection)?;
        backend.update_buffer(self.matrices.mvps, 0, &data.mvps);
        backend.update_buffer(self.matrices.models, 0, &data.models);
        backend.update_buffer(self.matrices.normals, 0, &data.normals);
        Ok(())
    }

    /// Rewrite one material parameter for every object using `material`
    ///
    /// Returns the number of objects whose field write was dropped.
    pub fn apply_material_parameter(
        &mut self,
        material: MaterialKey,
        name: &str,
        value: &MaterialParameter,
        backend: &mut dyn GpuBackend,
    ) -> usize {
        let Some(field_value) = FieldValue::from_parameter(value) else {
            return 0;
        };

        let mut dropped = 0;
        let mut written = false;
        for (index, object) in self.objects.iter().enumerate() {
            if object.material != material {
                continue;
            }
            if self.materials.set(index, name, field_value) {
                written = true;
            } else {
                dropped += 1;
            }
        }

        if written {
            backend.update_buffer(self.materials_buffer, 0, self.materials.bytes());
        }
        dropped
    }

    /// Bind everything the group draws with and issue its draws
    pub fn submit(&self, backend: &mut dyn GpuBackend) {
        backend.use_program(self.program);
        backend.bind_vertex_array(self.vertex_array);

        for block in &self.blocks {
            match self.uniform_buffer(&block.purpose) {
                Some(buffer) => backend.bind_uniform_buffer(block.binding, buffer),
                None => log::warn!("No buffer supplies uniform purpose '{}'", block.purpose),
            }
        }

        for (unit, slot) in self.textures.iter().enumerate() {
            backend.bind_texture_array(unit as u32, slot.texture);
        }

        match (&self.commands, self.indirect_buffer) {
            (DrawCommands::Indirect(list), Some(buffer)) => {
                backend.multi_draw_indexed_indirect(self.topology, self.index_type, buffer, list.len() as u32);
            }
            (DrawCommands::Direct { batch, instanced }, _) => {
                if !batch.is_empty() {
                    backend.multi_draw_indexed(self.topology, self.index_type, batch);
                }
                for draw in instanced {
                    backend.draw_indexed_instanced(self.topology, self.index_type, draw);
                }
            }
            (DrawCommands::Indirect(_), None) => {
                log::warn!("Render group {:?} has no indirect buffer", self.id);
            }
        }
    }

    /// Release every GPU object the group created
    ///
    /// The program belongs to the compiler's program cache and is kept.
    pub fn release(self, backend: &mut dyn GpuBackend) {
        backend.delete_vertex_array(self.vertex_array);
        for buffer in [
            self.vertex_buffer,
            self.index_buffer,
            self.matrices.mvps,
            self.matrices.models,
            self.matrices.normals,
            self.materials_buffer,
        ] {
            backend.delete_buffer(buffer);
        }
        for slot in self.textures {
            backend.delete_texture_array(slot.texture);
            backend.delete_buffer(slot.indices);
        }
        if let Some(buffer) = self.indirect_buffer {
            backend.delete_buffer(buffer);
        }
    }

    /// Buffer holding the data of a uniform purpose
    pub fn uniform_buffer(&self, purpose: &str) -> Option<BufferHandle> {
        match purpose {
            MVPS_PURPOSE => Some(self.matrices.mvps),
            MODELS_PURPOSE => Some(self.matrices.models),
            NORMALS_PURPOSE => Some(self.matrices.normals),
            MATERIALS_PURPOSE => Some(self.materials_buffer),
            other => self
                .textures
                .iter()
                .find(|slot| slot.slot.indices_purpose() == other)
                .map(|slot| slot.indices),
        }
    }

    /// Group id
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Shared feature signature
    pub fn signature(&self) -> &FeatureSignature {
        &self.signature
    }

    /// Program the group draws with
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Uniform blocks and their binding points
    pub fn blocks(&self) -> &[BoundBlock] {
        &self.blocks
    }

    /// Objects in per-object buffer order
    pub fn objects(&self) -> &[Renderable] {
        &self.objects
    }

    /// Number of objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Objects drawn through the batch list
    pub fn batched_count(&self) -> usize {
        self.batch_len
    }

    /// `(mesh, instance count)` of every instance list
    pub fn instance_lists(&self) -> &[(MeshKey, usize)] {
        &self.instance_lists
    }

    /// Objects drawn through instancing
    pub fn instanced_count(&self) -> usize {
        self.instance_lists.iter().map(|(_, count)| count).sum()
    }

    /// Primitive topology
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Index width
    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Merged vertex buffer
    pub fn vertex_buffer(&self) -> BufferHandle {
        self.vertex_buffer
    }

    /// Merged index buffer
    pub fn index_buffer(&self) -> BufferHandle {
        self.index_buffer
    }

    /// Packed per-object material structs
    pub fn materials(&self) -> &StructArray {
        &self.materials
    }

    /// Texture arrays, in texture unit order
    pub fn textures(&self) -> &[SlotTextures] {
        &self.textures
    }

    /// Layer index of every object for one slot
    pub fn layer_indices(&self, slot: MapSlot) -> Option<Vec<i32>> {
        self.textures
            .iter()
            .find(|textures| textures.slot == slot)
            .map(|textures| textures.records.iter().map(|record| record[0]).collect())
    }

    /// Synthesized draw commands
    pub fn commands(&self) -> &DrawCommands {
        &self.commands
    }

    /// Indirect command buffer, in indirect mode
    pub fn indirect_buffer(&self) -> Option<BufferHandle> {
        self.indirect_buffer
    }

    /// Material field writes dropped while packing
    pub fn dropped_field_writes(&self) -> usize {
        self.dropped_field_writes
    }

    /// Whether the packed material structs outgrow one uniform block
    pub fn materials_oversized(&self) -> bool {
        self.materials_oversized
    }

    /// Materials referenced by the group's objects, first-seen order
    pub fn materials_used(&self) -> Vec<MaterialKey> {
        let mut used = Vec::new();
        for object in &self.objects {
            if !used.contains(&object.material) {
                used.push(object.material);
            }
        }
        used
    }
}

/// Meshes in draw-unit order: one per batch member, then one per instance list
fn unit_meshes<'s>(split: &SplitGroup<'_>, scene: &'s Scene) -> BuildResult<Vec<&'s Mesh>> {
    split
        .batch
        .iter()
        .map(|member| member.mesh)
        .chain(split.instances.iter().map(|list| list.mesh))
        .map(|key| scene.mesh(key).ok_or(BuildError::MissingResource("mesh")))
        .collect()
}

/// Pack every object's material parameters; returns the dropped write count
fn pack_materials(objects: &[Renderable], kind: &ProgramKind, scene: &Scene) -> BuildResult<(StructArray, usize)> {
    let mut array = StructArray::new(material_layout(kind), objects.len());
    let mut dropped = 0;

    for (index, object) in objects.iter().enumerate() {
        let material = scene
            .material(object.material)
            .ok_or(BuildError::MissingResource("material"))?;
        for (name, _, value) in material.uniform_parameters() {
            let Some(field_value) = FieldValue::from_parameter(value) else {
                continue;
            };
            if !array.set(index, name, field_value) {
                dropped += 1;
            }
        }
    }

    Ok((array, dropped))
}
