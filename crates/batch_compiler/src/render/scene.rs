//! Scene-owned resources and the renderables that reference them
//!
//! The scene owns every mesh, material, texture and transform in slot maps.
//! A [`Renderable`] is just three keys, so the compiler can group and sort
//! renderables without copying any geometry until a group is finalized.

use slotmap::SlotMap;

use crate::foundation::collections::{MaterialKey, MeshKey, TextureKey, TransformKey};
use crate::foundation::math::Transform;
use crate::render::material::Material;
use crate::render::mesh::Mesh;
use crate::render::texture::TextureImage;

/// Immutable (mesh, material, transform) pairing drawn by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Renderable {
    /// Geometry to draw
    pub mesh: MeshKey,
    /// Material and program family
    pub material: MaterialKey,
    /// World transform
    pub transform: TransformKey,
}

impl Renderable {
    /// Create a new renderable
    pub fn new(mesh: MeshKey, material: MaterialKey, transform: TransformKey) -> Self {
        Self { mesh, material, transform }
    }
}

/// Resource storage plus the renderables visible this compile
#[derive(Debug, Default)]
pub struct Scene {
    meshes: SlotMap<MeshKey, Mesh>,
    materials: SlotMap<MaterialKey, Material>,
    textures: SlotMap<TextureKey, TextureImage>,
    transforms: SlotMap<TransformKey, Transform>,
    renderables: Vec<Renderable>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a mesh
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    /// Store a material
    pub fn add_material(&mut self, material: Material) -> MaterialKey {
        self.materials.insert(material)
    }

    /// Store a texture image
    pub fn add_texture(&mut self, texture: TextureImage) -> TextureKey {
        self.textures.insert(texture)
    }

    /// Store a transform
    pub fn add_transform(&mut self, transform: Transform) -> TransformKey {
        self.transforms.insert(transform)
    }

    /// Append a renderable; insertion order is compile order
    pub fn add_renderable(&mut self, renderable: Renderable) {
        self.renderables.push(renderable);
    }

    /// Convenience: store a transform and append a renderable using it
    pub fn spawn(&mut self, mesh: MeshKey, material: MaterialKey, transform: Transform) -> TransformKey {
        let transform = self.add_transform(transform);
        self.add_renderable(Renderable::new(mesh, material, transform));
        transform
    }

    /// Remove every renderable, keeping resources
    pub fn clear_renderables(&mut self) {
        self.renderables.clear();
    }

    /// Renderables in insertion order
    pub fn renderables(&self) -> &[Renderable] {
        &self.renderables
    }

    /// Look up a mesh
    pub fn mesh(&self, key: MeshKey) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    /// Look up a material
    pub fn material(&self, key: MaterialKey) -> Option<&Material> {
        self.materials.get(key)
    }

    /// Mutable material access
    pub fn material_mut(&mut self, key: MaterialKey) -> Option<&mut Material> {
        self.materials.get_mut(key)
    }

    /// Look up a texture
    pub fn texture(&self, key: TextureKey) -> Option<&TextureImage> {
        self.textures.get(key)
    }

    /// Look up a transform
    pub fn transform(&self, key: TransformKey) -> Option<&Transform> {
        self.transforms.get(key)
    }

    /// Mutable transform access, for per-frame animation
    pub fn transform_mut(&mut self, key: TransformKey) -> Option<&mut Transform> {
        self.transforms.get_mut(key)
    }
}
