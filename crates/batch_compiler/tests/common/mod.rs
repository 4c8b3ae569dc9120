//! Scene builders shared by the integration tests

#![allow(dead_code)]

use batch_compiler::foundation::collections::{MaterialKey, MeshKey, TextureKey};
use batch_compiler::prelude::*;

/// Indexed mesh with a position and a UV stream
pub fn textured_mesh(vertex_count: usize, indices: &[u32]) -> Mesh {
    Mesh::new(
        Topology::TriangleList,
        vec![
            VertexAttribute::new("position", AttributeData::F32(vec![0.5; vertex_count * 3]), 3)
                .with_role(AttributeRole::Position),
            VertexAttribute::new("uv", AttributeData::F32(vec![0.0; vertex_count * 2]), 2)
                .with_role(AttributeRole::TexCoord(0)),
        ],
        indices,
    )
    .expect("test mesh is valid")
}

/// Standard material with a diffuse map
pub fn diffuse_material(scene: &mut Scene, texture: TextureKey) -> MaterialKey {
    let mut material = Material::standard();
    material
        .set_texture(MapSlot::Diffuse, Some(texture))
        .expect("standard materials have a diffuse slot");
    scene.add_material(material)
}

/// Four renderables over three meshes and two diffuse textures
pub struct MixedScene {
    /// The scene
    pub scene: Scene,
    /// Quad used twice (instanced)
    pub quad: MeshKey,
    /// Triangle used once
    pub triangle: MeshKey,
    /// Second quad used once
    pub other_quad: MeshKey,
    /// Red-textured material
    pub red: MaterialKey,
    /// Green-textured material
    pub green: MaterialKey,
}

impl MixedScene {
    /// Renderables in scene order: triangle/green, other_quad/red, quad/red, quad/green
    pub fn new() -> Self {
        let mut scene = Scene::new();
        let quad = scene.add_mesh(textured_mesh(4, &[0, 1, 2, 2, 3, 0]));
        let triangle = scene.add_mesh(textured_mesh(3, &[0, 1, 2]));
        let other_quad = scene.add_mesh(textured_mesh(4, &[0, 1, 2, 2, 3, 0]));

        let red_texture = scene.add_texture(TextureImage::solid(4, 4, [255, 0, 0, 255]));
        let green_texture = scene.add_texture(TextureImage::solid(4, 4, [0, 255, 0, 255]));
        let red = diffuse_material(&mut scene, red_texture);
        let green = diffuse_material(&mut scene, green_texture);

        scene.spawn(triangle, green, Transform::from_position(Vec3::new(1.0, 2.0, 3.0)));
        scene.spawn(other_quad, red, Transform::identity());
        scene.spawn(quad, red, Transform::identity());
        scene.spawn(quad, green, Transform::identity());

        Self {
            scene,
            quad,
            triangle,
            other_quad,
            red,
            green,
        }
    }
}

/// Read a native-endian f32 at a byte offset
pub fn f32_at(bytes: &[u8], offset: usize) -> f32 {
    f32::from_ne_bytes(bytes[offset..offset + 4].try_into().expect("four bytes"))
}

/// Compiler with the given device, mipmaps off
pub fn compiler(device: DeviceCapabilities) -> BatchCompiler {
    BatchCompiler::new(CompilerConfig::new().with_device(device).with_mipmaps(false)).expect("valid config")
}
