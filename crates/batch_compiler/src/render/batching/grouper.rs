//! Capacity-bounded grouping
//!
//! A signature group is cut into sub-groups that respect two hard limits:
//! the object count a per-object matrix buffer can hold, and the number of
//! distinct textures a single texture array can hold per map slot.
//!
//! ## Algorithm
//!
//! 1. Partition the members by their texture-dimension key, the ordered list
//!    of `(slot, width, height)` of their resolved maps. Partitions keep
//!    first-seen order; members of different partitions can share a program
//!    but never a texture array.
//! 2. Walk each partition in insertion order and admit members greedily into
//!    the current sub-group until admitting the next one would break a limit,
//!    then seal it and start a new one. Members are never reordered for a
//!    tighter packing.

use std::collections::{HashMap, HashSet};

use crate::foundation::collections::TextureKey;
use crate::render::material::MapSlot;
use crate::render::scene::{Renderable, Scene};

use super::signature::resolved_maps;

/// Hard limits applied while grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLimits {
    /// Maximum members per sub-group
    pub max_objects_per_group: usize,
    /// Maximum distinct textures per map slot per sub-group
    pub max_distinct_textures: usize,
}

impl GroupLimits {
    /// Create limits; both values are clamped to at least 1
    pub fn new(max_objects_per_group: usize, max_distinct_textures: usize) -> Self {
        Self {
            max_objects_per_group: max_objects_per_group.max(1),
            max_distinct_textures: max_distinct_textures.max(1),
        }
    }
}

/// Ordered `(slot, width, height)` of a member's resolved maps
pub type DimensionKey = Vec<(MapSlot, u32, u32)>;

/// Texture-dimension key of one renderable
pub fn dimension_key(renderable: &Renderable, scene: &Scene) -> DimensionKey {
    scene
        .material(renderable.material)
        .map(|material| {
            resolved_maps(material, scene)
                .map(|(slot, _, image)| (slot, image.width(), image.height()))
                .collect()
        })
        .unwrap_or_default()
}

/// Split members into dimension-compatible partitions, first-seen order
pub fn partition_by_dimensions<'a>(members: &[&'a Renderable], scene: &Scene) -> Vec<Vec<&'a Renderable>> {
    let mut partitions: Vec<Vec<&'a Renderable>> = Vec::new();
    let mut index_of: HashMap<DimensionKey, usize> = HashMap::new();

    for &member in members {
        let key = dimension_key(member, scene);
        let slot = *index_of.entry(key).or_insert_with(|| {
            partitions.push(Vec::new());
            partitions.len() - 1
        });
        partitions[slot].push(member);
    }

    partitions
}

/// Per-slot texture sets of the sub-group being filled
#[derive(Debug, Default)]
struct TextureSets {
    slots: HashMap<MapSlot, HashSet<TextureKey>>,
}

impl TextureSets {
    /// Whether adding `textures` keeps every slot within `limit`
    fn admits(&self, textures: &[(MapSlot, TextureKey)], limit: usize) -> bool {
        MapSlot::ALL.iter().all(|slot| {
            let existing = self.slots.get(slot);
            let current = existing.map_or(0, HashSet::len);
            let added = textures
                .iter()
                .filter(|(s, key)| s == slot && !existing.is_some_and(|set| set.contains(key)))
                .map(|(_, key)| key)
                .collect::<HashSet<_>>()
                .len();
            current + added <= limit
        })
    }

    fn insert(&mut self, textures: &[(MapSlot, TextureKey)]) {
        for (slot, key) in textures {
            self.slots.entry(*slot).or_default().insert(*key);
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Greedy single-pass grouping of one partition under `limits`
///
/// Only textures present in the scene count toward the per-slot limit.
pub fn group_by_capacity<'a>(
    members: &[&'a Renderable],
    scene: &Scene,
    limits: GroupLimits,
) -> Vec<Vec<&'a Renderable>> {
    let mut sealed = Vec::new();
    let mut current: Vec<&'a Renderable> = Vec::new();
    let mut textures = TextureSets::default();

    for &member in members {
        let member_textures: Vec<(MapSlot, TextureKey)> = scene
            .material(member.material)
            .map(|material| resolved_maps(material, scene).map(|(slot, key, _)| (slot, key)).collect())
            .unwrap_or_default();

        let fits = current.len() < limits.max_objects_per_group
            && textures.admits(&member_textures, limits.max_distinct_textures);

        if !fits && !current.is_empty() {
            log::debug!("Sealing sub-group of {} members", current.len());
            sealed.push(std::mem::take(&mut current));
            textures.clear();
        }

        textures.insert(&member_textures);
        current.push(member);
    }

    if !current.is_empty() {
        sealed.push(current);
    }

    sealed
}

/// Dimension partitioning followed by greedy grouping
pub fn group<'a>(members: &[&'a Renderable], scene: &Scene, limits: GroupLimits) -> Vec<Vec<&'a Renderable>> {
    partition_by_dimensions(members, scene)
        .iter()
        .flat_map(|partition| group_by_capacity(partition, scene, limits))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::MaterialKey;
    use crate::foundation::math::Transform;
    use crate::render::material::Material;
    use crate::render::mesh::{AttributeData, AttributeRole, Mesh, Topology, VertexAttribute};
    use crate::render::texture::TextureImage;

    fn quad() -> Mesh {
        Mesh::new(
            Topology::TriangleList,
            vec![VertexAttribute::new("position", AttributeData::F32(vec![0.0; 12]), 3)
                .with_role(AttributeRole::Position)],
            &[0, 1, 2, 2, 3, 0],
        )
        .unwrap()
    }

    fn textured(scene: &mut Scene, texture: TextureKey) -> MaterialKey {
        let mut material = Material::standard();
        material.set_texture(MapSlot::Diffuse, Some(texture)).unwrap();
        scene.add_material(material)
    }

    fn members(scene: &Scene) -> Vec<&Renderable> {
        scene.renderables().iter().collect()
    }

    #[test]
    fn test_third_texture_starts_new_group() {
        let mut scene = Scene::new();
        let mesh_a = scene.add_mesh(quad());
        let mesh_b = scene.add_mesh(quad());
        let t1 = scene.add_texture(TextureImage::solid(8, 8, [255, 0, 0, 255]));
        let t2 = scene.add_texture(TextureImage::solid(8, 8, [0, 255, 0, 255]));
        let t3 = scene.add_texture(TextureImage::solid(8, 8, [0, 0, 255, 255]));
        let (m1, m2, m3) = (textured(&mut scene, t1), textured(&mut scene, t2), textured(&mut scene, t3));

        scene.spawn(mesh_a, m1, Transform::identity());
        scene.spawn(mesh_a, m2, Transform::identity());
        scene.spawn(mesh_b, m3, Transform::identity());

        let groups = group(&members(&scene), &scene, GroupLimits::new(100, 2));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert!(groups[0].iter().all(|r| r.mesh == mesh_a));
        assert_eq!(groups[1].len(), 1);
        assert_eq!(groups[1][0].mesh, mesh_b);
    }

    #[test]
    fn test_object_limit_seals_groups() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(quad());
        let material = scene.add_material(Material::unlit());
        for _ in 0..7 {
            scene.spawn(mesh, material, Transform::identity());
        }

        let sizes: Vec<_> = group(&members(&scene), &scene, GroupLimits::new(3, 4))
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_limits_hold_for_many_textures() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(quad());
        let textures: Vec<_> = (0..5u8)
            .map(|i| scene.add_texture(TextureImage::solid(4, 4, [i, 0, 0, 255])))
            .collect();
        let materials: Vec<_> = textures.iter().map(|t| textured(&mut scene, *t)).collect();
        for i in 0..40 {
            scene.spawn(mesh, materials[(i * 7) % materials.len()], Transform::identity());
        }

        let limits = GroupLimits::new(6, 3);
        let groups = group(&members(&scene), &scene, limits);
        assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), 40);
        for sub_group in &groups {
            assert!(sub_group.len() <= limits.max_objects_per_group);
            let distinct: HashSet<_> = sub_group
                .iter()
                .filter_map(|r| scene.material(r.material).and_then(|m| m.texture(MapSlot::Diffuse)))
                .collect();
            assert!(distinct.len() <= limits.max_distinct_textures);
        }
    }

    #[test]
    fn test_different_dimensions_never_share_a_group() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(quad());
        let small = scene.add_texture(TextureImage::solid(4, 4, [0; 4]));
        let large = scene.add_texture(TextureImage::solid(16, 16, [0; 4]));
        let (ms, ml) = (textured(&mut scene, small), textured(&mut scene, large));
        scene.spawn(mesh, ms, Transform::identity());
        scene.spawn(mesh, ml, Transform::identity());
        scene.spawn(mesh, ms, Transform::identity());

        let groups = group(&members(&scene), &scene, GroupLimits::new(100, 100));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
    }

    #[test]
    fn test_admission_is_order_dependent() {
        // Greedy admission never reorders, so the split follows input order
        let split = |order: &[usize]| {
            let mut scene = Scene::new();
            let mesh = scene.add_mesh(quad());
            let textures: Vec<_> = (0..3u8)
                .map(|i| scene.add_texture(TextureImage::solid(8, 8, [i, 0, 0, 255])))
                .collect();
            let materials: Vec<_> = textures.iter().map(|t| textured(&mut scene, *t)).collect();
            for &i in order {
                scene.spawn(mesh, materials[i], Transform::identity());
            }
            group(&members(&scene), &scene, GroupLimits::new(100, 2))
                .iter()
                .map(Vec::len)
                .collect::<Vec<_>>()
        };

        assert_eq!(split(&[0, 1, 0, 2]), vec![3, 1]);
        assert_eq!(split(&[0, 2, 1, 0]), vec![2, 2]);
    }

    #[test]
    fn test_limits_are_clamped() {
        assert_eq!(GroupLimits::new(0, 0), GroupLimits::new(1, 1));
    }
}
