//! Feature signatures and signature classification
//!
//! A [`FeatureSignature`] says which vertex inputs, material map slots and
//! boolean flags a renderable activates. Renderables with equal signatures can
//! share one program; classification partitions the scene's renderables into
//! signature-equal groups, in first-seen order.

use std::collections::{BTreeSet, HashMap};

use bitflags::bitflags;

use crate::foundation::collections::TextureKey;
use crate::render::material::{MapSlot, Material, ProgramKind};
use crate::render::mesh::{AttributeRole, Mesh};
use crate::render::scene::{Renderable, Scene};
use crate::render::texture::TextureImage;

bitflags! {
    /// Vertex attribute roles a program reads
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttributeRoles: u16 {
        /// Position input
        const POSITION = 1 << 0;
        /// Normal input
        const NORMAL = 1 << 1;
        /// Tangent input
        const TANGENT = 1 << 2;
        /// Bitangent input
        const BITANGENT = 1 << 3;
        /// Vertex color input
        const COLOR = 1 << 4;
        /// Texture coordinate channel 0
        const UV0 = 1 << 5;
        /// Texture coordinate channel 1
        const UV1 = 1 << 6;
        /// Texture coordinate channel 2
        const UV2 = 1 << 7;
        /// Texture coordinate channel 3
        const UV3 = 1 << 8;
        /// Texture coordinate channel 4
        const UV4 = 1 << 9;
        /// Texture coordinate channel 5
        const UV5 = 1 << 10;
        /// Texture coordinate channel 6
        const UV6 = 1 << 11;
        /// Texture coordinate channel 7
        const UV7 = 1 << 12;
    }
}

impl AttributeRoles {
    /// Flag for a single role
    pub fn from_role(role: AttributeRole) -> Self {
        match role {
            AttributeRole::Position => Self::POSITION,
            AttributeRole::Normal => Self::NORMAL,
            AttributeRole::Tangent => Self::TANGENT,
            AttributeRole::Bitangent => Self::BITANGENT,
            AttributeRole::Color => Self::COLOR,
            AttributeRole::TexCoord(channel) => Self::from_bits_truncate(Self::UV0.bits() << channel.min(7)),
        }
    }
}

bitflags! {
    /// Material map slots a program samples
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MapSlots: u8 {
        /// Diffuse map
        const DIFFUSE = 1 << 0;
        /// Normal map
        const NORMAL = 1 << 1;
        /// Specular map
        const SPECULAR = 1 << 2;
        /// Emissive map
        const EMISSIVE = 1 << 3;
    }
}

impl MapSlots {
    /// Flag for a single slot
    pub const fn from_slot(slot: MapSlot) -> Self {
        match slot {
            MapSlot::Diffuse => Self::DIFFUSE,
            MapSlot::Normal => Self::NORMAL,
            MapSlot::Specular => Self::SPECULAR,
            MapSlot::Emissive => Self::EMISSIVE,
        }
    }

    /// Active slots in texture unit order
    pub fn slots(self) -> impl Iterator<Item = MapSlot> {
        MapSlot::ALL.into_iter().filter(move |slot| self.contains(Self::from_slot(*slot)))
    }
}

/// Program-compatibility key of a renderable
///
/// Equality is structural; two renderables with equal signatures can be drawn
/// by the same compiled program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureSignature {
    kind: ProgramKind,
    attributes: AttributeRoles,
    maps: MapSlots,
    flags: BTreeSet<String>,
}

impl FeatureSignature {
    /// Derive the signature of a mesh/material pairing
    ///
    /// Map slots whose texture is not present in `scene` are inactive.
    pub fn of(mesh: &Mesh, material: &Material, scene: &Scene) -> Self {
        let attributes = mesh
            .attributes()
            .iter()
            .filter_map(|attribute| attribute.role())
            .fold(AttributeRoles::empty(), |acc, role| acc | AttributeRoles::from_role(role));

        let maps = resolved_maps(material, scene)
            .fold(MapSlots::empty(), |acc, (slot, _, _)| acc | MapSlots::from_slot(slot));

        let flags = material
            .flags()
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(name, _)| name.clone())
            .collect();

        Self {
            kind: material.kind().clone(),
            attributes,
            maps,
            flags,
        }
    }

    /// Program family
    pub fn kind(&self) -> &ProgramKind {
        &self.kind
    }

    /// Active vertex inputs
    pub fn attributes(&self) -> AttributeRoles {
        self.attributes
    }

    /// Active map slots
    pub fn maps(&self) -> MapSlots {
        self.maps
    }

    /// Enabled feature flags, sorted
    pub fn flags(&self) -> &BTreeSet<String> {
        &self.flags
    }

    /// Whether a map slot is active
    pub fn has_map(&self, slot: MapSlot) -> bool {
        self.maps.contains(MapSlots::from_slot(slot))
    }
}

/// Map slots of a material whose texture image exists in the scene
pub(crate) fn resolved_maps<'a>(
    material: &'a Material,
    scene: &'a Scene,
) -> impl Iterator<Item = (MapSlot, TextureKey, &'a TextureImage)> + 'a {
    material
        .active_maps()
        .filter_map(move |(slot, key)| scene.texture(key).map(|image| (slot, key, image)))
}

/// Renderables sharing one feature signature, in scene order
#[derive(Debug, Clone)]
pub struct SignatureGroup<'a> {
    /// Shared signature
    pub signature: FeatureSignature,
    /// Members, referenced from the scene
    pub members: Vec<&'a Renderable>,
}

/// Result of classifying a scene
#[derive(Debug, Default)]
pub struct Classification<'a> {
    /// Signature groups in first-seen order
    pub groups: Vec<SignatureGroup<'a>>,
    /// Renderables skipped (unbatchable program kind or dangling keys)
    pub dropped: usize,
}

/// Partition the scene's renderables into signature-equal groups
pub fn classify(scene: &Scene) -> Classification<'_> {
    let mut classification = Classification::default();
    let mut index_of: HashMap<FeatureSignature, usize> = HashMap::new();

    for renderable in scene.renderables() {
        let (Some(mesh), Some(material)) = (scene.mesh(renderable.mesh), scene.material(renderable.material)) else {
            log::warn!("Dropping renderable with dangling mesh or material key: {:?}", renderable);
            classification.dropped += 1;
            continue;
        };

        if scene.transform(renderable.transform).is_none() {
            log::warn!("Dropping renderable with dangling transform key: {:?}", renderable);
            classification.dropped += 1;
            continue;
        }

        if !material.kind().is_batchable() {
            log::debug!(
                "Dropping renderable with unbatchable program kind {:?}",
                material.kind()
            );
            classification.dropped += 1;
            continue;
        }

        let signature = FeatureSignature::of(mesh, material, scene);
        let slot = *index_of.entry(signature.clone()).or_insert_with(|| {
            classification.groups.push(SignatureGroup {
                signature,
                members: Vec::new(),
            });
            classification.groups.len() - 1
        });
        classification.groups[slot].members.push(renderable);
    }

    log::debug!(
        "Classified {} renderables into {} signature groups ({} dropped)",
        scene.renderables().len(),
        classification.groups.len(),
        classification.dropped
    );

    classification
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::render::mesh::{AttributeData, Topology, VertexAttribute};
    use crate::render::texture::TextureImage;

    fn triangle(with_uv: bool) -> Mesh {
        let mut attributes = vec![
            VertexAttribute::new("position", AttributeData::F32(vec![0.0; 9]), 3).with_role(AttributeRole::Position),
        ];
        if with_uv {
            attributes.push(
                VertexAttribute::new("uv", AttributeData::F32(vec![0.0; 6]), 2).with_role(AttributeRole::TexCoord(0)),
            );
        }
        Mesh::new(Topology::TriangleList, attributes, &[0, 1, 2]).unwrap()
    }

    #[test]
    fn test_signature_reads_roles_maps_and_flags() {
        let mut scene = Scene::new();
        let texture = scene.add_texture(TextureImage::solid(4, 4, [255; 4]));
        let mut material = Material::standard().with_flag("alphaTest", true).unwrap();
        material.set_texture(MapSlot::Diffuse, Some(texture)).unwrap();

        let signature = FeatureSignature::of(&triangle(true), &material, &scene);
        assert_eq!(signature.attributes(), AttributeRoles::POSITION | AttributeRoles::UV0);
        assert_eq!(signature.maps(), MapSlots::DIFFUSE);
        assert!(signature.flags().contains("alphaTest"));
        assert_eq!(signature.maps().slots().collect::<Vec<_>>(), vec![MapSlot::Diffuse]);
    }

    #[test]
    fn test_texcoord_roles_map_to_channels() {
        assert_eq!(AttributeRoles::from_role(AttributeRole::TexCoord(3)), AttributeRoles::UV3);
        assert_eq!(AttributeRoles::from_role(AttributeRole::TexCoord(7)), AttributeRoles::UV7);
    }

    #[test]
    fn test_classify_groups_equal_signatures_in_order() {
        let mut scene = Scene::new();
        let plain = scene.add_mesh(triangle(false));
        let uv = scene.add_mesh(triangle(true));
        let material = scene.add_material(Material::unlit());

        scene.spawn(plain, material, Transform::identity());
        scene.spawn(uv, material, Transform::identity());
        scene.spawn(plain, material, Transform::identity());

        let classification = classify(&scene);
        assert_eq!(classification.groups.len(), 2);
        assert_eq!(classification.groups[0].members.len(), 2);
        assert_eq!(classification.groups[1].members.len(), 1);
        assert_eq!(classification.dropped, 0);
    }

    #[test]
    fn test_missing_texture_leaves_slot_inactive() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(triangle(true));
        let mut empty = Material::standard();
        empty.set_texture(MapSlot::Diffuse, None).unwrap();
        let with_nothing = scene.add_material(empty);
        let plain = scene.add_material(Material::standard());
        scene.spawn(mesh, with_nothing, Transform::identity());
        scene.spawn(mesh, plain, Transform::identity());

        let classification = classify(&scene);
        assert_eq!(classification.groups.len(), 1);
        assert!(!classification.groups[0].signature.has_map(MapSlot::Diffuse));
    }

    #[test]
    fn test_unbatchable_kind_is_dropped() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(triangle(false));
        let external = scene.add_material(Material::new(ProgramKind::External("sky".into())));
        scene.spawn(mesh, external, Transform::identity());

        let classification = classify(&scene);
        assert!(classification.groups.is_empty());
        assert_eq!(classification.dropped, 1);
    }
}
