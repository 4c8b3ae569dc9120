//! Batch/instance splitting
//!
//! Within one sub-group, a mesh referenced by exactly one member is drawn as
//! part of the multi-draw batch; a mesh referenced by two or more members is
//! drawn once with GPU instancing. Before splitting, every member's mesh must
//! agree on topology, index width and attribute layout, since all of them end
//! up in one merged vertex region and one merged index region.

use std::collections::HashMap;

use crate::foundation::collections::MeshKey;
use crate::render::mesh::{AttributeFormat, IndexType, Topology};
use crate::render::scene::{Renderable, Scene};

use super::error::{BuildError, BuildResult, Mismatch};

/// Members sharing one mesh, drawn with a single instanced call
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceList<'a> {
    /// Shared mesh
    pub mesh: MeshKey,
    /// Every member using the mesh, in sub-group order
    pub members: Vec<&'a Renderable>,
}

impl InstanceList<'_> {
    /// Instance count of the draw
    pub fn instance_count(&self) -> usize {
        self.members.len()
    }
}

/// A sub-group split into its batch list and instance lists
#[derive(Debug, Clone, PartialEq)]
pub struct SplitGroup<'a> {
    /// Members whose mesh is used once
    pub batch: Vec<&'a Renderable>,
    /// One list per repeated mesh, first-seen order
    pub instances: Vec<InstanceList<'a>>,
    /// Shared topology
    pub topology: Topology,
    /// Shared index width
    pub index_type: IndexType,
    /// Shared attribute layout
    pub attributes: Vec<AttributeFormat>,
}

impl<'a> SplitGroup<'a> {
    /// Total members across the batch and instance lists
    pub fn object_count(&self) -> usize {
        self.batch.len() + self.instances.iter().map(InstanceList::instance_count).sum::<usize>()
    }

    /// Members in per-object buffer order: batch first, then each instance list
    pub fn ordered_members(&self) -> impl Iterator<Item = &'a Renderable> + '_ {
        self.batch
            .iter()
            .copied()
            .chain(self.instances.iter().flat_map(|list| list.members.iter().copied()))
    }
}

/// Check the structural precondition and split a sub-group
pub fn split<'a>(members: &[&'a Renderable], scene: &Scene) -> BuildResult<SplitGroup<'a>> {
    let first = members.first().ok_or(BuildError::EmptyGroup)?;
    let reference = scene.mesh(first.mesh).ok_or(BuildError::MissingResource("mesh"))?;
    let topology = reference.topology();
    let index_type = reference.index_type();
    let attributes = reference.attribute_formats();

    let mut order: Vec<MeshKey> = Vec::new();
    let mut users: HashMap<MeshKey, Vec<&'a Renderable>> = HashMap::new();

    for &member in members {
        let mesh = scene.mesh(member.mesh).ok_or(BuildError::MissingResource("mesh"))?;

        if mesh.topology() != topology {
            return Err(Mismatch::Topology {
                expected: topology,
                found: mesh.topology(),
            }
            .into());
        }

        if mesh.index_type() != index_type {
            return Err(Mismatch::IndexWidth {
                expected: index_type,
                found: mesh.index_type(),
            }
            .into());
        }

        let formats = mesh.attribute_formats();
        if formats != attributes {
            let position = formats
                .iter()
                .zip(&attributes)
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| formats.len().min(attributes.len()));
            return Err(Mismatch::AttributeLayout { position }.into());
        }

        users
            .entry(member.mesh)
            .or_insert_with(|| {
                order.push(member.mesh);
                Vec::new()
            })
            .push(member);
    }

    let mut batch = Vec::new();
    let mut instances = Vec::new();
    for mesh in order {
        let Some(mut used_by) = users.remove(&mesh) else {
            continue;
        };
        if used_by.len() == 1 {
            batch.append(&mut used_by);
        } else {
            instances.push(InstanceList { mesh, members: used_by });
        }
    }

    log::debug!(
        "Split {} members into {} batched and {} instance lists",
        members.len(),
        batch.len(),
        instances.len()
    );

    Ok(SplitGroup {
        batch,
        instances,
        topology,
        index_type,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::render::material::Material;
    use crate::render::mesh::{AttributeData, AttributeRole, Mesh, VertexAttribute};

    fn mesh(vertex_count: usize, indices: &[u32], topology: Topology) -> Mesh {
        Mesh::new(
            topology,
            vec![VertexAttribute::new("position", AttributeData::F32(vec![0.0; vertex_count * 3]), 3)
                .with_role(AttributeRole::Position)],
            indices,
        )
        .unwrap()
    }

    #[test]
    fn test_shared_mesh_is_instanced() {
        let mut scene = Scene::new();
        let shared = scene.add_mesh(mesh(3, &[0, 1, 2], Topology::TriangleList));
        let material = scene.add_material(Material::unlit());
        scene.spawn(shared, material, Transform::identity());
        scene.spawn(shared, material, Transform::identity());

        let members: Vec<_> = scene.renderables().iter().collect();
        let split = split(&members, &scene).unwrap();
        assert!(split.batch.is_empty());
        assert_eq!(split.instances.len(), 1);
        assert_eq!(split.instances[0].instance_count(), 2);
        assert_eq!(split.object_count(), 2);
    }

    #[test]
    fn test_unique_and_repeated_meshes() {
        let mut scene = Scene::new();
        let a = scene.add_mesh(mesh(3, &[0, 1, 2], Topology::TriangleList));
        let b = scene.add_mesh(mesh(3, &[0, 1, 2], Topology::TriangleList));
        let c = scene.add_mesh(mesh(3, &[2, 1, 0], Topology::TriangleList));
        let material = scene.add_material(Material::unlit());
        for key in [a, b, a, c, a] {
            scene.spawn(key, material, Transform::identity());
        }

        let members: Vec<_> = scene.renderables().iter().collect();
        let split = split(&members, &scene).unwrap();
        let batch_meshes: Vec<_> = split.batch.iter().map(|r| r.mesh).collect();
        assert_eq!(batch_meshes, vec![b, c]);
        assert_eq!(split.instances[0].mesh, a);
        assert_eq!(split.instances[0].instance_count(), 3);
        assert_eq!(split.object_count(), members.len());
        assert_eq!(split.ordered_members().count(), members.len());
    }

    #[test]
    fn test_mixed_index_width_is_a_mismatch() {
        let mut scene = Scene::new();
        let narrow = scene.add_mesh(mesh(3, &[0, 1, 2], Topology::TriangleList));
        let wide = scene.add_mesh(mesh(70_000, &[0, 1, 69_999], Topology::TriangleList));
        let material = scene.add_material(Material::unlit());
        scene.spawn(narrow, material, Transform::identity());
        scene.spawn(wide, material, Transform::identity());

        let members: Vec<_> = scene.renderables().iter().collect();
        assert_eq!(
            split(&members, &scene).unwrap_err(),
            BuildError::StructuralMismatch(Mismatch::IndexWidth {
                expected: IndexType::U16,
                found: IndexType::U32,
            })
        );
    }

    #[test]
    fn test_mixed_topology_is_a_mismatch() {
        let mut scene = Scene::new();
        let tris = scene.add_mesh(mesh(3, &[0, 1, 2], Topology::TriangleList));
        let lines = scene.add_mesh(mesh(2, &[0, 1], Topology::LineList));
        let material = scene.add_material(Material::unlit());
        scene.spawn(tris, material, Transform::identity());
        scene.spawn(lines, material, Transform::identity());

        let members: Vec<_> = scene.renderables().iter().collect();
        assert!(matches!(
            split(&members, &scene),
            Err(BuildError::StructuralMismatch(Mismatch::Topology { .. }))
        ));
    }

    #[test]
    fn test_attribute_layout_must_match() {
        let mut scene = Scene::new();
        let plain = scene.add_mesh(mesh(3, &[0, 1, 2], Topology::TriangleList));
        let colored = scene.add_mesh(
            Mesh::new(
                Topology::TriangleList,
                vec![
                    VertexAttribute::new("position", AttributeData::F32(vec![0.0; 9]), 3),
                    VertexAttribute::new("color", AttributeData::U8(vec![0; 12]), 4).normalized(true),
                ],
                &[0, 1, 2],
            )
            .unwrap(),
        );
        let material = scene.add_material(Material::unlit());
        scene.spawn(plain, material, Transform::identity());
        scene.spawn(colored, material, Transform::identity());

        let members: Vec<_> = scene.renderables().iter().collect();
        assert_eq!(
            split(&members, &scene).unwrap_err(),
            BuildError::StructuralMismatch(Mismatch::AttributeLayout { position: 0 })
        );
    }
}
