//! # Batch Compiler
//!
//! Compiles a scene's drawable objects (mesh + material + transform) into the
//! minimal set of GPU draw operations, sharing programs, vertex buffers and
//! texture arrays as aggressively as the device limits allow.
//!
//! ## Features
//!
//! - **Feature Signatures**: program reuse keyed on active attributes, maps and flags
//! - **Capacity Grouping**: groups bounded by uniform block size and texture array layers
//! - **Batching and Instancing**: unique meshes multi-drawn, repeated meshes instanced
//! - **Packed Uniforms**: aligned per-object material structs and matrix arrays
//! - **Indirect or Direct Draws**: selected once from device capabilities
//! - **Backend Agnostic**: GPU calls go through the [`backend::GpuBackend`] trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_compiler::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scene = Scene::new();
//!     let mesh = scene.add_mesh(Mesh::new(
//!         Topology::TriangleList,
//!         vec![VertexAttribute::new("position", AttributeData::F32(vec![0.0; 9]), 3)
//!             .with_role(AttributeRole::Position)],
//!         &[0, 1, 2],
//!     )?);
//!     let material = scene.add_material(Material::unlit());
//!     scene.spawn(mesh, material, Transform::identity());
//!
//!     let mut backend = HeadlessBackend::new();
//!     let mut programs = HeadlessProgramGenerator::new();
//!     let config = CompilerConfig::default().with_log_level("debug");
//!     config.init_logging();
//!     let mut compiler = BatchCompiler::new(config)?;
//!     compiler.compile(&scene, &mut programs, &mut backend);
//!     compiler.update_frame(&scene, &Mat4::identity(), &mut backend);
//!     compiler.submit(&mut backend);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;

pub mod foundation;
pub mod config;
pub mod render;
pub mod backend;

/// Common imports for compiler users
pub mod prelude {
    pub use crate::{
        backend::{
            headless::{HeadlessBackend, HeadlessProgramGenerator},
            GpuBackend, ProgramGenerator,
        },
        config::Config,
        core::{CompilerConfig, DeviceCapabilities},
        foundation::math::{Mat4, Transform, Vec3},
        render::{
            batching::{CompileStats, DrawMode},
            AttributeData, AttributeRole, BatchCompiler, MapSlot, Material, MaterialParameter, Mesh, ProgramKind,
            Scene, TextureImage, Topology, VertexAttribute,
        },
    };
}
