//! Indirect and direct draw synthesis over the same scene

mod common;

use batch_compiler::backend::headless::BackendCall;
use batch_compiler::backend::BufferUsage;
use batch_compiler::prelude::*;
use batch_compiler::render::batching::{DrawCommands, InstancedDraw};

use common::{compiler, MixedScene};

#[test]
fn test_direct_mode_emits_multi_draw_and_instanced_calls() {
    let fixture = MixedScene::new();
    let mut compiler = compiler(DeviceCapabilities::default().with_multi_draw_indirect(false));
    assert_eq!(compiler.draw_mode(), DrawMode::Direct);

    let mut backend = HeadlessBackend::new();
    compiler.compile(&fixture.scene, &mut HeadlessProgramGenerator::new(), &mut backend);
    assert_eq!(backend.live_buffers_with_usage(BufferUsage::DrawIndirect), 0);

    let group = &compiler.groups()[0];
    assert!(group.indirect_buffer().is_none());
    let DrawCommands::Direct { batch, instanced } = group.commands() else {
        panic!("expected direct commands");
    };
    assert_eq!(batch.counts, vec![3, 6]);
    assert_eq!(batch.byte_offsets, vec![0, 6]);
    assert_eq!(batch.base_vertices, vec![0, 3]);
    assert_eq!(
        instanced,
        &vec![InstancedDraw {
            count: 6,
            first_index: 9,
            instance_count: 2,
            base_vertex: 7,
            base_instance: 2,
        }]
    );

    backend.clear_calls();
    compiler.submit(&mut backend);
    let draws: Vec<_> = backend.calls().iter().filter(|call| call.is_draw()).collect();
    assert_eq!(draws.len(), 2);
    assert!(matches!(draws[0], BackendCall::MultiDrawIndexed { params, .. } if params.len() == 2));
    assert!(matches!(draws[1], BackendCall::DrawIndexedInstanced { draw, .. } if draw.instance_count == 2));
}

#[test]
fn test_modes_agree_on_draw_units() {
    let fixture = MixedScene::new();
    let mut indirect = compiler(DeviceCapabilities::default());
    let mut direct = compiler(DeviceCapabilities::default().with_multi_draw_indirect(false));
    let mut backend = HeadlessBackend::new();

    let indirect_stats = indirect.compile(&fixture.scene, &mut HeadlessProgramGenerator::new(), &mut backend).clone();
    let direct_stats = direct.compile(&fixture.scene, &mut HeadlessProgramGenerator::new(), &mut backend).clone();
    assert_eq!(indirect_stats.draw_commands, direct_stats.draw_commands);

    let commands = indirect.groups()[0].commands().indirect().unwrap().to_vec();
    let DrawCommands::Direct { batch, instanced } = direct.groups()[0].commands() else {
        panic!("expected direct commands");
    };
    for (i, command) in commands.iter().take(batch.len()).enumerate() {
        assert_eq!(command.index_count, batch.counts[i]);
        assert_eq!(command.base_vertex as i32, batch.base_vertices[i]);
        assert_eq!(command.first_index as usize * 2, batch.byte_offsets[i]);
    }
    let last = commands.last().unwrap();
    assert_eq!(last.instance_count, instanced[0].instance_count);
    assert_eq!(last.base_instance, instanced[0].base_instance);
}

#[test]
fn test_batch_only_scene_issues_no_instanced_draws() {
    let mut scene = Scene::new();
    let material = scene.add_material(Material::unlit());
    for _ in 0..3 {
        let mesh = scene.add_mesh(common::textured_mesh(3, &[0, 1, 2]));
        scene.spawn(mesh, material, Transform::identity());
    }

    let mut compiler = compiler(DeviceCapabilities::default().with_multi_draw_indirect(false));
    let mut backend = HeadlessBackend::new();
    compiler.compile(&scene, &mut HeadlessProgramGenerator::new(), &mut backend);
    backend.clear_calls();
    compiler.submit(&mut backend);

    assert_eq!(backend.draw_calls(), 1);
    assert!(!backend
        .calls()
        .iter()
        .any(|call| matches!(call, BackendCall::DrawIndexedInstanced { .. })));
}
