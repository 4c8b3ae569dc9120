//! Stable handle types for scene-owned resources
//!
//! Renderables never own their mesh, material or transform; they hold one of
//! these keys into the [`Scene`](crate::render::Scene) slot maps. Key equality
//! is resource identity, which is what instancing and texture-layer
//! deduplication compare.

pub use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Handle to a [`Mesh`](crate::render::Mesh) owned by a scene
    pub struct MeshKey;

    /// Handle to a [`Material`](crate::render::Material) owned by a scene
    pub struct MaterialKey;

    /// Handle to a [`TextureImage`](crate::render::TextureImage) owned by a scene
    pub struct TextureKey;

    /// Handle to a world [`Transform`](crate::foundation::math::Transform) owned by a scene
    pub struct TransformKey;
}
