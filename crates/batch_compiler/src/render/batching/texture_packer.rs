//! Texture array packing
//!
//! Every active map slot of a group gets one 2D array texture. Each distinct
//! source image of the slot takes the next free layer, in first-seen object
//! order, and every object gets a `[layer, 0, 0, 0]` record per slot that the
//! program uses to pick its layer.

use std::collections::{HashMap, HashSet};

use crate::backend::{GpuBackend, TextureArrayDesc, TextureArrayHandle};
use crate::foundation::collections::TextureKey;
use crate::render::material::MapSlot;
use crate::render::scene::{Renderable, Scene};
use crate::render::texture::full_mip_chain;

use super::error::{BuildError, BuildResult};
use super::signature::MapSlots;

/// Per-object layer index record; only the first component is used
pub type LayerRecord = [i32; 4];

/// Layer assignment of one map slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPacking {
    /// Map slot
    pub slot: MapSlot,
    /// Distinct textures, indexed by layer
    pub layers: Vec<TextureKey>,
    /// Texture of each object, in per-object order
    pub object_textures: Vec<TextureKey>,
    /// One record per object
    pub records: Vec<LayerRecord>,
    /// Largest width seen
    pub width: u32,
    /// Largest height seen
    pub height: u32,
    /// Allocated mip levels
    pub mip_levels: u32,
}

impl SlotPacking {
    /// Layer assigned to a texture
    pub fn layer_of(&self, texture: TextureKey) -> Option<u32> {
        self.layers.iter().position(|key| *key == texture).map(|layer| layer as u32)
    }

    /// Array storage description
    pub fn desc(&self) -> TextureArrayDesc {
        TextureArrayDesc {
            width: self.width,
            height: self.height,
            layers: self.layers.len() as u32,
            mip_levels: self.mip_levels,
        }
    }

    /// Record bytes, one 16-byte tuple per object
    pub fn record_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }
}

/// Assign layers for every active slot of `maps`
///
/// `members` must be in per-object order. With `mipmaps` set, arrays are
/// allocated with a full mip chain for their size.
pub fn pack(members: &[&Renderable], maps: MapSlots, scene: &Scene, mipmaps: bool) -> BuildResult<Vec<SlotPacking>> {
    maps.slots().map(|slot| pack_slot(members, slot, scene, mipmaps)).collect()
}

fn pack_slot(members: &[&Renderable], slot: MapSlot, scene: &Scene, mipmaps: bool) -> BuildResult<SlotPacking> {
    let mut layer_of: HashMap<TextureKey, i32> = HashMap::new();
    let mut layers = Vec::new();
    let mut object_textures = Vec::with_capacity(members.len());
    let mut records = Vec::with_capacity(members.len());
    let (mut width, mut height) = (0, 0);

    for member in members {
        let key = scene
            .material(member.material)
            .and_then(|material| material.texture(slot))
            .ok_or(BuildError::MissingResource("texture map"))?;
        let image = scene.texture(key).ok_or(BuildError::MissingResource("texture image"))?;

        let layer = *layer_of.entry(key).or_insert_with(|| {
            layers.push(key);
            width = width.max(image.width());
            height = height.max(image.height());
            layers.len() as i32 - 1
        });

        object_textures.push(key);
        records.push([layer, 0, 0, 0]);
    }

    let mip_levels = if mipmaps { full_mip_chain(width, height) } else { 1 };

    log::debug!(
        "Packed {} {} textures into a {}x{} array ({} mip levels)",
        layers.len(),
        slot.name(),
        width,
        height,
        mip_levels
    );

    Ok(SlotPacking {
        slot,
        layers,
        object_textures,
        records,
        width,
        height,
        mip_levels,
    })
}

/// Allocate the slot's array and upload each distinct image once
pub fn upload(packing: &SlotPacking, scene: &Scene, backend: &mut dyn GpuBackend) -> BuildResult<TextureArrayHandle> {
    let handle = backend.create_texture_array(&packing.desc());
    let mut stored: HashSet<TextureKey> = HashSet::with_capacity(packing.layers.len());

    for (key, record) in packing.object_textures.iter().zip(&packing.records) {
        if !stored.insert(*key) {
            continue;
        }
        let image = scene.texture(*key).ok_or(BuildError::MissingResource("texture image"))?;
        backend.upload_texture_layer(handle, record[0] as u32, image.width(), image.height(), image.pixels());
    }

    if packing.mip_levels > 1 {
        backend.generate_mipmaps(handle);
    }

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{BackendCall, HeadlessBackend};
    use crate::foundation::collections::MaterialKey;
    use crate::foundation::collections::MeshKey;
    use crate::foundation::math::Transform;
    use crate::render::material::Material;
    use crate::render::mesh::{AttributeData, Mesh, Topology, VertexAttribute};
    use crate::render::texture::TextureImage;

    fn scene_with(textures: &[(u32, u8)], uses: &[usize]) -> Scene {
        let mut scene = Scene::new();
        let mesh: MeshKey = scene.add_mesh(
            Mesh::new(
                Topology::TriangleList,
                vec![VertexAttribute::new("position", AttributeData::F32(vec![0.0; 9]), 3)],
                &[0, 1, 2],
            )
            .unwrap(),
        );
        let materials: Vec<MaterialKey> = textures
            .iter()
            .map(|(size, shade)| {
                let texture = scene.add_texture(TextureImage::solid(*size, *size, [*shade; 4]));
                let mut material = Material::standard();
                material.set_texture(MapSlot::Diffuse, Some(texture)).unwrap();
                scene.add_material(material)
            })
            .collect();
        for &use_index in uses {
            scene.spawn(mesh, materials[use_index], Transform::identity());
        }
        scene
    }

    #[test]
    fn test_layers_follow_first_seen_order() {
        let scene = scene_with(&[(4, 1), (4, 2)], &[1, 0, 1, 1]);
        let members: Vec<_> = scene.renderables().iter().collect();
        let packing = pack(&members, MapSlots::DIFFUSE, &scene, false).unwrap();

        assert_eq!(packing.len(), 1);
        let diffuse = &packing[0];
        assert_eq!(diffuse.layers.len(), 2);
        let layers: Vec<_> = diffuse.records.iter().map(|r| r[0]).collect();
        assert_eq!(layers, vec![0, 1, 0, 0]);
        assert_eq!(diffuse.record_bytes().len(), 4 * 16);
        assert_eq!(diffuse.mip_levels, 1);
    }

    #[test]
    fn test_upload_stores_each_texture_once() {
        let scene = scene_with(&[(8, 1), (8, 2)], &[0, 0, 1, 0, 1]);
        let members: Vec<_> = scene.renderables().iter().collect();
        let packing = pack(&members, MapSlots::DIFFUSE, &scene, true).unwrap();
        assert_eq!(packing[0].mip_levels, 4);

        let mut backend = HeadlessBackend::new();
        let handle = upload(&packing[0], &scene, &mut backend).unwrap();

        let uploads = backend
            .calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::UploadTextureLayer { .. }))
            .count();
        assert_eq!(uploads, 2);
        assert!(backend.calls().contains(&BackendCall::GenerateMipmaps(handle)));
        assert_eq!(backend.texture_desc(handle).map(|d| d.layers), Some(2));
    }

    #[test]
    fn test_no_mipmaps_for_single_level() {
        let scene = scene_with(&[(1, 9)], &[0]);
        let members: Vec<_> = scene.renderables().iter().collect();
        let packing = pack(&members, MapSlots::DIFFUSE, &scene, true).unwrap();
        let mut backend = HeadlessBackend::new();
        upload(&packing[0], &scene, &mut backend).unwrap();
        assert!(!backend.calls().iter().any(|call| matches!(call, BackendCall::GenerateMipmaps(_))));
    }

    #[test]
    fn test_inactive_slots_are_not_packed() {
        let scene = scene_with(&[(4, 1)], &[0]);
        let members: Vec<_> = scene.renderables().iter().collect();
        assert!(pack(&members, MapSlots::empty(), &scene, false).unwrap().is_empty());
    }
}
